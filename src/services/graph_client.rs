//! Remote object store client speaking the Graph drive API.
//!
//! ## Endpoints used
//! - `POST {base}/me/drive/root:/{path}:/createUploadSession` - open an upload session
//! - `PUT  {uploadUrl}` with `Content-Range` - send one chunk
//! - `DELETE {uploadUrl}` - discard an unfinished session
//! - `POST {base}/me/drive/items/{id}/createLink` - anonymous view link
//! - `GET  {base}/me/drive/items/{id}` - item incl. time-limited download URL
//! - `GET  {base}/shares/{locator}/driveItem` - item addressed through a share link

use crate::{
    errors::{ClipError, ClipResult},
    models::upload::{ByteRange, ChunkAck, UploadSession},
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode, Url, header};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

/// Item metadata returned by the remote store.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteItem {
    pub id: String,
    pub name: Option<String>,
    pub size: Option<u64>,
    pub download_url: Option<String>,
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Open an upload session for `file_name`, renaming on collision.
    async fn create_upload_session(
        &self,
        token: &str,
        file_name: &str,
        total_size: u64,
    ) -> ClipResult<UploadSession>;

    /// PUT one chunk covering `range` into the session.
    async fn upload_chunk(
        &self,
        session: &UploadSession,
        range: ByteRange,
        chunk: Bytes,
    ) -> ClipResult<ChunkAck>;

    /// Ask the remote store to drop an unfinished session.
    async fn cancel_upload_session(&self, session: &UploadSession) -> ClipResult<()>;

    /// Create an anonymous, view-scoped link and return its web URL.
    async fn create_share_link(&self, token: &str, remote_object_id: &str) -> ClipResult<String>;

    async fn get_item(&self, token: &str, remote_object_id: &str) -> ClipResult<RemoteItem>;

    /// Resolve an item through an encoded share locator (`u!…`).
    async fn get_shared_item(&self, token: &str, share_locator: &str) -> ClipResult<RemoteItem>;
}

/// HTTP implementation of [`RemoteStore`].
#[derive(Clone, Debug)]
pub struct GraphClient {
    client: Client,
    base_url: String,
    upload_folder: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadSessionBody {
    upload_url: String,
    expiration_date_time: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PendingChunkBody {
    #[serde(default)]
    next_expected_ranges: Vec<String>,
}

#[derive(Deserialize)]
struct DriveItemBody {
    id: Option<String>,
    name: Option<String>,
    size: Option<u64>,
    #[serde(rename = "@microsoft.graph.downloadUrl")]
    download_url: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SharingLinkBody {
    link: SharingLink,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SharingLink {
    web_url: String,
}

impl GraphClient {
    pub fn new(base_url: impl Into<String>) -> ClipResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| ClipError::RemoteStore(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            upload_folder: None,
        })
    }

    /// Upload into `folder` (relative to the drive root) instead of the root itself.
    pub fn with_upload_folder(mut self, folder: impl Into<String>) -> Self {
        let folder = folder.into().trim_matches('/').to_string();
        self.upload_folder = (!folder.is_empty()).then_some(folder);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base}/me/drive/root:/{folder}/{file_name}:/createUploadSession`, with
    /// every path segment percent-encoded.
    fn upload_session_url(&self, file_name: &str) -> ClipResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ClipError::upload(None, format!("invalid base url: {}", e)))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ClipError::upload(None, "base url cannot carry a path"))?;
            segments.pop_if_empty().extend(["me", "drive", "root:"]);
            if let Some(folder) = &self.upload_folder {
                segments.extend(folder.split('/').filter(|s| !s.is_empty()));
            }
            segments
                .push(&format!("{}:", file_name))
                .push("createUploadSession");
        }
        Ok(url)
    }

    async fn fetch_item(&self, token: &str, url: String) -> ClipResult<RemoteItem> {
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ClipError::RemoteStore(format!("GET {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!(url = %url, status = %status, "get item failed");
            return Err(ClipError::RemoteStore(format!(
                "GET {} returned {}: {}",
                url, status, detail
            )));
        }

        let body: DriveItemBody = response
            .json()
            .await
            .map_err(|e| ClipError::RemoteStore(format!("malformed item response: {}", e)))?;
        Ok(RemoteItem {
            id: body.id.unwrap_or_default(),
            name: body.name,
            size: body.size,
            download_url: body.download_url,
        })
    }
}

#[async_trait]
impl RemoteStore for GraphClient {
    async fn create_upload_session(
        &self,
        token: &str,
        file_name: &str,
        total_size: u64,
    ) -> ClipResult<UploadSession> {
        let url = self.upload_session_url(file_name)?;
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&json!({
                "item": {
                    "@microsoft.graph.conflictBehavior": "rename",
                    "name": file_name,
                }
            }))
            .send()
            .await
            .map_err(|e| ClipError::upload(None, format!("create upload session: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClipError::upload(
                Some(status.as_u16()),
                format!("failed to create upload session: {}", status),
            ));
        }

        let body: UploadSessionBody = response
            .json()
            .await
            .map_err(|e| ClipError::upload(None, format!("malformed upload session: {}", e)))?;
        debug!(file_name, "upload session created");

        Ok(UploadSession {
            upload_url: body.upload_url,
            created_at: Utc::now(),
            expires_at: body.expiration_date_time,
            total_size_hint: Some(total_size),
        })
    }

    async fn upload_chunk(
        &self,
        session: &UploadSession,
        range: ByteRange,
        chunk: Bytes,
    ) -> ClipResult<ChunkAck> {
        // Upload URLs are pre-authorized; sending a bearer token here is rejected.
        let response = self
            .client
            .put(&session.upload_url)
            .header(header::CONTENT_LENGTH, chunk.len())
            .header(header::CONTENT_RANGE, range.content_range())
            .body(chunk)
            .send()
            .await
            .map_err(|e| ClipError::upload(None, format!("bytes {}: {}", range, e)))?;

        let status = response.status();
        match status {
            StatusCode::ACCEPTED => {
                let body: PendingChunkBody = response.json().await.unwrap_or(PendingChunkBody {
                    next_expected_ranges: Vec::new(),
                });
                Ok(ChunkAck::Accepted {
                    next_expected_ranges: body.next_expected_ranges,
                })
            }
            StatusCode::OK | StatusCode::CREATED => {
                let body: DriveItemBody = response.json().await.map_err(|e| {
                    ClipError::upload(Some(status.as_u16()), format!("malformed final response: {}", e))
                })?;
                match body.id {
                    Some(id) => Ok(ChunkAck::Completed {
                        remote_object_id: id,
                    }),
                    None => Err(ClipError::upload(
                        Some(status.as_u16()),
                        "final response carried no item id",
                    )),
                }
            }
            other => Err(ClipError::upload(
                Some(other.as_u16()),
                format!("upload failed: {}", other),
            )),
        }
    }

    async fn cancel_upload_session(&self, session: &UploadSession) -> ClipResult<()> {
        let response = self
            .client
            .delete(&session.upload_url)
            .send()
            .await
            .map_err(|e| ClipError::RemoteStore(format!("cancel upload session: {}", e)))?;
        if !response.status().is_success() {
            return Err(ClipError::RemoteStore(format!(
                "cancel upload session returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn create_share_link(&self, token: &str, remote_object_id: &str) -> ClipResult<String> {
        let url = format!(
            "{}/me/drive/items/{}/createLink",
            self.base_url, remote_object_id
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&json!({ "type": "view", "scope": "anonymous" }))
            .send()
            .await
            .map_err(|e| ClipError::ShareCreation(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ClipError::ShareCreation(format!(
                "createLink returned {}: {}",
                status, detail
            )));
        }

        let body: SharingLinkBody = response
            .json()
            .await
            .map_err(|e| ClipError::ShareCreation(format!("malformed link response: {}", e)))?;
        Ok(body.link.web_url)
    }

    async fn get_item(&self, token: &str, remote_object_id: &str) -> ClipResult<RemoteItem> {
        let url = format!("{}/me/drive/items/{}", self.base_url, remote_object_id);
        self.fetch_item(token, url).await
    }

    async fn get_shared_item(&self, token: &str, share_locator: &str) -> ClipResult<RemoteItem> {
        let url = format!("{}/shares/{}/driveItem", self.base_url, share_locator);
        self.fetch_item(token, url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_folder_is_normalized() {
        let client = GraphClient::new("https://graph.example/v1.0/")
            .unwrap()
            .with_upload_folder("/Recordings/");
        assert_eq!(client.base_url(), "https://graph.example/v1.0");
        assert_eq!(
            client.upload_session_url("a.webm").unwrap().as_str(),
            "https://graph.example/v1.0/me/drive/root:/Recordings/a.webm:/createUploadSession"
        );

        let root = GraphClient::new("https://graph.example/v1.0")
            .unwrap()
            .with_upload_folder("");
        assert_eq!(
            root.upload_session_url("a.webm").unwrap().as_str(),
            "https://graph.example/v1.0/me/drive/root:/a.webm:/createUploadSession"
        );
    }

    #[test]
    fn file_names_are_percent_encoded_in_the_session_path() {
        let client = GraphClient::new("https://graph.example/v1.0")
            .unwrap()
            .with_upload_folder("My Clips");
        let url = client.upload_session_url("take #1?.webm").unwrap();

        assert_eq!(
            url.path(),
            "/v1.0/me/drive/root:/My%20Clips/take%20%231%3F.webm:/createUploadSession"
        );
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
    }
}
