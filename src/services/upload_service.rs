//! Chunked Upload Client: drives one resumable upload session from open to
//! finalized object.
//!
//! Chunks go out strictly in offset order, one request in flight at a time.
//! Any non-success response aborts the whole session; nothing is resumed.

use crate::{
    errors::{ClipError, ClipResult},
    models::upload::{ChunkAck, UploadProgress, UploadSession, chunk_ranges},
    services::{credentials::CredentialProvider, graph_client::RemoteStore},
};
use bytes::Bytes;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const DEFAULT_CHUNK_SIZE: usize = 5 * 1024 * 1024;

#[derive(Clone)]
pub struct ChunkedUploader {
    remote: Arc<dyn RemoteStore>,
    credentials: Arc<dyn CredentialProvider>,
    chunk_size: usize,
}

impl ChunkedUploader {
    pub fn new(remote: Arc<dyn RemoteStore>, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            remote,
            credentials,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Upload `blob` as `file_name` and return the finalized remote object id.
    ///
    /// `on_progress` fires after every acknowledged chunk with non-decreasing
    /// values; it reaches 100% only on the final acknowledgement.
    pub async fn upload<F>(&self, blob: Bytes, file_name: &str, on_progress: F) -> ClipResult<String>
    where
        F: FnMut(UploadProgress) + Send,
    {
        self.run(blob, file_name, on_progress, None).await
    }

    /// Like [`upload`](Self::upload), but stops between chunks once `cancel` fires.
    pub async fn upload_with_cancel<F>(
        &self,
        blob: Bytes,
        file_name: &str,
        on_progress: F,
        cancel: CancellationToken,
    ) -> ClipResult<String>
    where
        F: FnMut(UploadProgress) + Send,
    {
        self.run(blob, file_name, on_progress, Some(cancel)).await
    }

    async fn run<F>(
        &self,
        blob: Bytes,
        file_name: &str,
        mut on_progress: F,
        cancel: Option<CancellationToken>,
    ) -> ClipResult<String>
    where
        F: FnMut(UploadProgress) + Send,
    {
        let total = blob.len() as u64;
        if total == 0 {
            return Err(ClipError::upload(None, "recording is empty"));
        }

        let token = self
            .credentials
            .get_access_token()
            .await
            .ok_or(ClipError::AuthRequired)?;

        let session = self
            .remote
            .create_upload_session(&token, file_name, total)
            .await
            .inspect_err(|err| error!(file_name, error = %err, "could not open upload session"))?;
        info!(file_name, total_bytes = total, "upload session opened");

        let ranges = chunk_ranges(total, self.chunk_size as u64);
        let chunk_count = ranges.len();

        for (index, range) in ranges.into_iter().enumerate() {
            if cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
                warn!(file_name, range = %range, "upload cancelled");
                self.abort(&session).await;
                return Err(ClipError::Cancelled);
            }

            let chunk = blob.slice(range.start as usize..=range.end as usize);
            let ack = match self.remote.upload_chunk(&session, range, chunk).await {
                Ok(ack) => ack,
                Err(err) => {
                    error!(
                        file_name,
                        range = %range,
                        chunk = index + 1,
                        chunks = chunk_count,
                        error = %err,
                        "chunk upload failed, aborting session"
                    );
                    self.abort(&session).await;
                    return Err(err);
                }
            };

            match (ack, range.is_last()) {
                (ChunkAck::Accepted { .. }, false) => {
                    debug!(file_name, range = %range, "chunk accepted");
                    on_progress(UploadProgress {
                        bytes_sent: range.end + 1,
                        total_bytes: total,
                    });
                }
                (ChunkAck::Completed { remote_object_id }, true) => {
                    on_progress(UploadProgress {
                        bytes_sent: total,
                        total_bytes: total,
                    });
                    info!(file_name, remote_object_id = %remote_object_id, "upload finalized");
                    return Ok(remote_object_id);
                }
                (ChunkAck::Completed { remote_object_id }, false) => {
                    error!(file_name, range = %range, remote_object_id = %remote_object_id, "remote store finalized early");
                    return Err(ClipError::upload(
                        None,
                        format!("object finalized before byte {}", range.end + 1),
                    ));
                }
                (ChunkAck::Accepted { next_expected_ranges }, true) => {
                    error!(file_name, range = %range, ?next_expected_ranges, "final chunk not finalized");
                    self.abort(&session).await;
                    return Err(ClipError::upload(
                        None,
                        "final chunk acknowledged without an object id",
                    ));
                }
            }
        }

        Err(ClipError::upload(None, "upload ended without a final chunk"))
    }

    /// Best-effort discard of the remote session.
    async fn abort(&self, session: &UploadSession) {
        if let Err(err) = self.remote.cancel_upload_session(session).await {
            debug!(error = %err, "failed to cancel upload session");
        }
    }
}
