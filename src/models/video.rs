//! Represents a published recording and the wire shapes of the metadata API.

use crate::errors::{ClipError, ClipResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A persisted video record.
///
/// Resolvable by `id`, by `remote_object_id`, or by `share_id`, in that
/// priority order. `download_url` and `url_expiry` are always written as a pair.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
pub struct VideoRecord {
    /// Generated primary key.
    pub id: String,

    /// File name the recording was uploaded under, when known.
    pub name: Option<String>,

    /// The remote object store's native identifier.
    pub remote_object_id: String,

    /// Public share identifier, populated once a share link exists.
    pub share_id: Option<String>,

    /// Opaque identity of the uploader.
    pub owner_id: String,

    /// Time-limited direct download URL.
    pub download_url: Option<String>,

    /// Expiry of `download_url`. Absent means already expired.
    pub url_expiry: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Freshness of a record's download URL at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlState {
    Fresh,
    Stale,
}

impl VideoRecord {
    pub fn url_state_at(&self, now: DateTime<Utc>) -> UrlState {
        match (&self.download_url, self.url_expiry) {
            (Some(_), Some(expiry)) if now < expiry => UrlState::Fresh,
            _ => UrlState::Stale,
        }
    }

    pub fn url_state(&self) -> UrlState {
        self.url_state_at(Utc::now())
    }

    /// Public projection served by `GET /api/videos/{id}`.
    pub fn to_response(&self, now: DateTime<Utc>, has_token: bool) -> VideoResponse {
        let expired = match self.url_expiry {
            Some(expiry) => now >= expiry,
            None => true,
        };
        VideoResponse {
            id: self.id.clone(),
            name: self.name.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            owner_id: self.owner_id.clone(),
            onedrive_id: self.remote_object_id.clone(),
            download_url: self.download_url.clone(),
            share_id: self.share_id.clone(),
            url_expiry: self.url_expiry,
            needs_auth: expired && !has_token,
        }
    }
}

/// Input to `MetadataStore::create`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVideo {
    #[serde(rename = "onedriveId")]
    pub remote_object_id: String,
    pub owner_id: String,
    pub download_url: Option<String>,
    pub share_id: Option<String>,
    pub name: Option<String>,
}

/// Body of `POST /api/videos`. Every field is optional at the parser level so
/// that missing fields can be reported together.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVideoRequest {
    pub onedrive_id: Option<String>,
    pub owner_id: Option<String>,
    pub download_url: Option<String>,
    pub share_id: Option<String>,
    pub name: Option<String>,
}

impl CreateVideoRequest {
    pub fn validate(self) -> ClipResult<NewVideo> {
        fn present(value: &Option<String>) -> bool {
            value.as_deref().is_some_and(|v| !v.trim().is_empty())
        }

        let mut missing = Vec::new();
        if !present(&self.onedrive_id) {
            missing.push("onedriveId");
        }
        if !present(&self.owner_id) {
            missing.push("ownerId");
        }
        if !present(&self.download_url) {
            missing.push("downloadUrl");
        }
        if !missing.is_empty() {
            return Err(ClipError::missing_fields(&missing));
        }

        Ok(NewVideo {
            remote_object_id: self.onedrive_id.unwrap_or_default(),
            owner_id: self.owner_id.unwrap_or_default(),
            download_url: self.download_url,
            share_id: self.share_id.filter(|s| !s.trim().is_empty()),
            name: self.name,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateVideoResponse {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlResponse {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoResponse {
    pub id: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub owner_id: String,
    pub onedrive_id: String,
    pub download_url: Option<String>,
    pub share_id: Option<String>,
    pub url_expiry: Option<DateTime<Utc>>,
    pub needs_auth: bool,
}
