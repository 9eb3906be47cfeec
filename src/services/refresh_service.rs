//! URL Refresh Gateway: hands out a usable download URL for a record,
//! re-deriving it from the remote store when the stored one has expired.
//!
//! Per request:
//! - fresh URL → returned untouched, no network call
//! - stale, no credential → `AuthRequired`
//! - stale, credential → re-derive, persist through `update_url`, return
//! - stale, re-derive failed → previous URL if there is one, else the error

use crate::{
    errors::{ClipError, ClipResult},
    models::video::{UrlState, VideoRecord},
    services::{
        graph_client::{RemoteItem, RemoteStore},
        metadata_store::MetadataStore,
        share_service::ShareResolver,
    },
};
use std::sync::Arc;
use tracing::{info, warn};

/// Where a resolved URL came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlResolution {
    Fresh(String),
    Refreshed(String),
    /// Refresh failed; this is the expired URL served as a degraded fallback.
    Fallback(String),
}

impl UrlResolution {
    pub fn url(&self) -> &str {
        match self {
            Self::Fresh(url) | Self::Refreshed(url) | Self::Fallback(url) => url,
        }
    }

    pub fn into_url(self) -> String {
        match self {
            Self::Fresh(url) | Self::Refreshed(url) | Self::Fallback(url) => url,
        }
    }
}

#[derive(Clone)]
pub struct UrlRefreshGateway {
    store: Arc<dyn MetadataStore>,
    remote: Arc<dyn RemoteStore>,
    shares: ShareResolver,
}

impl UrlRefreshGateway {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        remote: Arc<dyn RemoteStore>,
        shares: ShareResolver,
    ) -> Self {
        Self {
            store,
            remote,
            shares,
        }
    }

    pub fn store(&self) -> &Arc<dyn MetadataStore> {
        &self.store
    }

    pub async fn resolve_download_url(
        &self,
        record: &VideoRecord,
        credential: Option<&str>,
    ) -> ClipResult<UrlResolution> {
        if record.url_state() == UrlState::Fresh {
            if let Some(url) = &record.download_url {
                return Ok(UrlResolution::Fresh(url.clone()));
            }
        }

        let Some(token) = credential.filter(|t| !t.is_empty()) else {
            return Err(ClipError::AuthRequired);
        };

        let derived = self
            .rederive(record, token)
            .await
            .and_then(|item| {
                item.download_url.ok_or_else(|| {
                    ClipError::RemoteStore(format!("item `{}` has no download url", item.id))
                })
            });

        match derived {
            Ok(url) => {
                self.store.update_url(&record.id, &url).await?;
                info!(id = %record.id, "download url refreshed");
                Ok(UrlResolution::Refreshed(url))
            }
            Err(err) => match &record.download_url {
                Some(previous) => {
                    warn!(id = %record.id, error = %err, "refresh failed, serving previous url");
                    Ok(UrlResolution::Fallback(previous.clone()))
                }
                None => {
                    warn!(id = %record.id, error = %err, "refresh failed with no url to fall back to");
                    Err(err)
                }
            },
        }
    }

    /// Fetch the current item through its object id, or its share id when
    /// that is all the record holds.
    async fn rederive(&self, record: &VideoRecord, token: &str) -> ClipResult<RemoteItem> {
        if !record.remote_object_id.is_empty() {
            return self.remote.get_item(token, &record.remote_object_id).await;
        }
        match &record.share_id {
            Some(share_id) => self.shares.resolve(token, share_id).await,
            None => Err(ClipError::RemoteStore(format!(
                "video `{}` has neither an object id nor a share id",
                record.id
            ))),
        }
    }
}
