//! Publish pipeline: upload → share → download URL → metadata record.
//!
//! The record is written last, and only when every earlier step succeeded,
//! so a failed upload never shows up in the video list.

use crate::{
    errors::{ClipError, ClipResult},
    models::{upload::UploadProgress, video::NewVideo},
    services::{
        credentials::CredentialProvider, graph_client::RemoteStore,
        metadata_store::MetadataStore, share_service::ShareResolver,
        upload_service::ChunkedUploader,
    },
};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{error, info};

/// Destination for the metadata record of a finished upload.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn register(&self, video: NewVideo) -> ClipResult<String>;
}

/// Writes records straight into a [`MetadataStore`].
pub struct StoreSink(pub Arc<dyn MetadataStore>);

#[async_trait]
impl RecordSink for StoreSink {
    async fn register(&self, video: NewVideo) -> ClipResult<String> {
        self.0.create(video).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedVideo {
    pub id: String,
    pub remote_object_id: String,
    pub share_id: String,
    pub web_url: String,
    pub download_url: String,
}

#[derive(Clone)]
pub struct PublishService {
    uploader: ChunkedUploader,
    shares: ShareResolver,
    remote: Arc<dyn RemoteStore>,
    credentials: Arc<dyn CredentialProvider>,
    sink: Arc<dyn RecordSink>,
    owner_id: String,
}

impl PublishService {
    pub fn new(
        uploader: ChunkedUploader,
        shares: ShareResolver,
        remote: Arc<dyn RemoteStore>,
        credentials: Arc<dyn CredentialProvider>,
        sink: Arc<dyn RecordSink>,
        owner_id: impl Into<String>,
    ) -> Self {
        Self {
            uploader,
            shares,
            remote,
            credentials,
            sink,
            owner_id: owner_id.into(),
        }
    }

    pub async fn publish<F>(
        &self,
        recording: Bytes,
        file_name: &str,
        on_progress: F,
    ) -> ClipResult<PublishedVideo>
    where
        F: FnMut(UploadProgress) + Send,
    {
        let token = self
            .credentials
            .get_access_token()
            .await
            .ok_or(ClipError::AuthRequired)?;

        let remote_object_id = self.uploader.upload(recording, file_name, on_progress).await?;
        let share = self.shares.make_public(&token, &remote_object_id).await?;

        let item = self
            .remote
            .get_item(&token, &remote_object_id)
            .await
            .inspect_err(|err| error!(remote_object_id = %remote_object_id, error = %err, "could not fetch download url"))?;
        let download_url = item.download_url.ok_or_else(|| {
            ClipError::RemoteStore(format!("item `{}` has no download url", remote_object_id))
        })?;

        let id = self
            .sink
            .register(NewVideo {
                remote_object_id: remote_object_id.clone(),
                owner_id: self.owner_id.clone(),
                download_url: Some(download_url.clone()),
                share_id: Some(share.share_id.clone()),
                name: Some(file_name.to_string()),
            })
            .await
            .inspect_err(|err| error!(remote_object_id = %remote_object_id, error = %err, "could not record video"))?;
        info!(id = %id, remote_object_id = %remote_object_id, "recording published");

        Ok(PublishedVideo {
            id,
            remote_object_id,
            share_id: share.share_id,
            web_url: share.web_url,
            download_url,
        })
    }
}
