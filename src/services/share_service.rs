//! Share Resolver: turns a finished remote object into a public, time-unlimited
//! share reference, and maps that reference back onto an addressable item.
//!
//! Share web URLs look like `{share_base}s!{shareId}`. The share id is the path
//! segment after the `s!` marker; rebuilding `{share_base}s!{shareId}` and
//! encoding it as `u!{base64url}` yields the locator the `/shares` endpoint takes.

use crate::{
    errors::{ClipError, ClipResult},
    services::graph_client::{RemoteItem, RemoteStore},
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use std::sync::Arc;
use tracing::{info, warn};

pub const DEFAULT_SHARE_BASE_URL: &str = "https://1drv.ms/v/";

/// Marker token preceding the share id inside a share web URL.
pub const SHARE_MARKER: &str = "s!";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLink {
    pub share_id: String,
    pub web_url: String,
}

#[derive(Clone)]
pub struct ShareResolver {
    remote: Arc<dyn RemoteStore>,
    share_base: String,
}

impl ShareResolver {
    pub fn new(remote: Arc<dyn RemoteStore>, share_base: impl Into<String>) -> Self {
        let mut share_base = share_base.into();
        if !share_base.ends_with('/') {
            share_base.push('/');
        }
        Self { remote, share_base }
    }

    /// Request an anonymous view link for `remote_object_id`. No retry here.
    pub async fn make_public(&self, token: &str, remote_object_id: &str) -> ClipResult<ShareLink> {
        let web_url = match self.remote.create_share_link(token, remote_object_id).await {
            Ok(url) => url,
            Err(err) => {
                warn!(remote_object_id, error = %err, "share link request rejected");
                return Err(match err {
                    ClipError::ShareCreation(_) => err,
                    other => ClipError::ShareCreation(other.to_string()),
                });
            }
        };

        let share_id = parse_share_id(&web_url).ok_or_else(|| {
            ClipError::ShareCreation(format!("unrecognized share url `{}`", web_url))
        })?;

        // Only the id is stored, so the link must be rebuildable from it.
        let expected = self.share_url(&share_id);
        if strip_query(&web_url) != expected {
            warn!(
                remote_object_id,
                web_url = %web_url,
                expected = %expected,
                "share url outside the configured share base"
            );
            return Err(ClipError::ShareCreation(format!(
                "share url `{}` does not match `{}`",
                web_url, expected
            )));
        }
        info!(remote_object_id, share_id = %share_id, "share link created");

        Ok(ShareLink { share_id, web_url })
    }

    /// The canonical web URL for `share_id`.
    pub fn share_url(&self, share_id: &str) -> String {
        format!("{}{}{}", self.share_base, SHARE_MARKER, share_id)
    }

    /// API locator for `share_id`, usable with `RemoteStore::get_shared_item`.
    pub fn share_locator(&self, share_id: &str) -> String {
        encode_sharing_url(&self.share_url(share_id))
    }

    /// Resolve the item a share id points at.
    pub async fn resolve(&self, token: &str, share_id: &str) -> ClipResult<RemoteItem> {
        let locator = self.share_locator(share_id);
        self.remote.get_shared_item(token, &locator).await
    }
}

/// Extract the share id: the path segment following the `s!` marker.
pub fn parse_share_id(web_url: &str) -> Option<String> {
    let marker = format!("/{}", SHARE_MARKER);
    let start = web_url.find(&marker)? + marker.len();
    let rest = &web_url[start..];
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let id = &rest[..end];
    (!id.is_empty()).then(|| id.to_string())
}

fn strip_query(url: &str) -> &str {
    url.find(['?', '#']).map_or(url, |end| &url[..end])
}

/// Encode a sharing URL as a `u!`-prefixed unpadded base64url token.
pub fn encode_sharing_url(url: &str) -> String {
    format!("u!{}", URL_SAFE_NO_PAD.encode(url))
}

/// Inverse of [`encode_sharing_url`].
pub fn decode_sharing_url(locator: &str) -> Option<String> {
    let encoded = locator.strip_prefix("u!")?;
    let bytes = URL_SAFE_NO_PAD.decode(encoded).ok()?;
    String::from_utf8(bytes).ok()
}
