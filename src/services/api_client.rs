//! HTTP client for the metadata API, used by recorders that run apart from
//! the service and by the player.

use crate::{
    errors::{ClipError, ClipResult},
    models::video::{CreateVideoResponse, NewVideo, UrlResponse, VideoResponse},
    services::publish_service::RecordSink,
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Outcome of `GET /api/videos/{id}/url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlLookup {
    Url(String),
    NeedsAuth,
}

#[derive(Clone, Debug)]
pub struct MetadataApiClient {
    client: Client,
    base_url: String,
}

impl MetadataApiClient {
    pub fn new(base_url: impl Into<String>) -> ClipResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ClipError::RemoteStore(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Create client from `DRIVECLIP_API_URL`, defaulting to a local service.
    pub fn from_env() -> ClipResult<Self> {
        let base_url = std::env::var("DRIVECLIP_API_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());
        Self::new(base_url)
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    pub async fn create_video(&self, video: &NewVideo) -> ClipResult<String> {
        let response = self
            .client
            .post(self.build_url("/videos"))
            .json(video)
            .send()
            .await
            .map_err(|e| ClipError::Persistence(format!("POST /api/videos: {}", e)))?;

        match response.status() {
            StatusCode::CREATED | StatusCode::OK => {
                let body: CreateVideoResponse = response
                    .json()
                    .await
                    .map_err(|e| ClipError::Persistence(format!("malformed create response: {}", e)))?;
                Ok(body.id)
            }
            StatusCode::BAD_REQUEST => Err(ClipError::Validation(error_message(response).await)),
            StatusCode::CONFLICT => Err(ClipError::Conflict(video.remote_object_id.clone())),
            status => Err(ClipError::Persistence(format!(
                "failed to store video metadata: {}",
                status
            ))),
        }
    }

    pub async fn get_video(&self, id: &str, token: Option<&str>) -> ClipResult<VideoResponse> {
        let mut request = self.client.get(self.build_url(&format!("/videos/{}", id)));
        if let Some(token) = token {
            request = request.query(&[("token", token)]);
        }
        let response = request
            .send()
            .await
            .map_err(|e| ClipError::RemoteStore(format!("GET /api/videos/{}: {}", id, e)))?;

        match response.status() {
            StatusCode::OK => response
                .json()
                .await
                .map_err(|e| ClipError::RemoteStore(format!("malformed video response: {}", e))),
            StatusCode::NOT_FOUND => Err(ClipError::NotFound(id.to_string())),
            status => Err(ClipError::RemoteStore(format!(
                "failed to fetch video: {}",
                status
            ))),
        }
    }

    pub async fn get_video_url(&self, id: &str, token: Option<&str>) -> ClipResult<UrlLookup> {
        let mut request = self
            .client
            .get(self.build_url(&format!("/videos/{}/url", id)));
        if let Some(token) = token {
            request = request.query(&[("token", token)]);
        }
        let response = request
            .send()
            .await
            .map_err(|e| ClipError::RemoteStore(format!("GET /api/videos/{}/url: {}", id, e)))?;

        match response.status() {
            StatusCode::OK => {
                let body: UrlResponse = response
                    .json()
                    .await
                    .map_err(|e| ClipError::RemoteStore(format!("malformed url response: {}", e)))?;
                Ok(UrlLookup::Url(body.url))
            }
            StatusCode::UNAUTHORIZED => Ok(UrlLookup::NeedsAuth),
            StatusCode::NOT_FOUND => Err(ClipError::NotFound(id.to_string())),
            status => Err(ClipError::RemoteStore(format!(
                "failed to get video url: {}",
                status
            ))),
        }
    }
}

/// The `error` field of an API error body, or the raw body when it is not JSON.
async fn error_message(response: reqwest::Response) -> String {
    let text = response.text().await.unwrap_or_default();
    serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|body| body["error"].as_str().map(str::to_string))
        .unwrap_or(text)
}

#[async_trait]
impl RecordSink for MetadataApiClient {
    async fn register(&self, video: NewVideo) -> ClipResult<String> {
        self.create_video(&video).await
    }
}
