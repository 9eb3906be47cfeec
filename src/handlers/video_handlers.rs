//! HTTP handlers for video metadata records.
//!
//! - `POST /api/videos`          create a record
//! - `GET  /api/videos/{id}`     record projection
//! - `GET  /api/videos/{id}/url` playable download URL, refreshed when stale

use crate::{
    errors::AppError,
    models::video::{
        CreateVideoRequest, CreateVideoResponse, UrlResponse, UrlState, VideoRecord,
        VideoResponse,
    },
    services::refresh_service::UrlResolution,
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info, warn};

/// Optional credential carried on read requests.
#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

impl TokenQuery {
    fn credential(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }
}

/// `POST /api/videos`
pub async fn create_video(
    State(state): State<AppState>,
    payload: Result<Json<CreateVideoRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload.map_err(|rejection| {
        debug!(error = %rejection.body_text(), "create request rejected");
        AppError::new(StatusCode::BAD_REQUEST, rejection.body_text())
    })?;
    let video = req.validate()?;
    let remote_object_id = video.remote_object_id.clone();
    let id = state.store.create(video).await?;
    info!(id = %id, remote_object_id = %remote_object_id, "video record created");
    Ok((StatusCode::CREATED, Json(CreateVideoResponse { id })))
}

/// `GET /api/videos/{id}`
///
/// With a token, a stale record is refreshed first so the projection carries
/// a usable URL. Refresh failures are logged and the stored record is served.
pub async fn get_video(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<VideoResponse>, AppError> {
    let mut record = find_record(&state, &id).await?;
    let credential = query.credential();

    if let Some(token) = credential {
        if record.url_state() == UrlState::Stale {
            match state.gateway.resolve_download_url(&record, Some(token)).await {
                Ok(UrlResolution::Refreshed(_)) => {
                    if let Some(updated) = state.store.find_by_id(&record.id).await? {
                        record = updated;
                    }
                }
                Ok(_) => {}
                Err(err) => warn!(id = %record.id, error = %err, "refresh before read failed"),
            }
        }
    }

    Ok(Json(record.to_response(Utc::now(), credential.is_some())))
}

/// `GET /api/videos/{id}/url`
pub async fn get_video_url(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<UrlResponse>, AppError> {
    let record = find_record(&state, &id).await?;
    let resolution = state
        .gateway
        .resolve_download_url(&record, query.credential())
        .await?;
    debug!(id = %record.id, resolution = ?resolution, "download url resolved");
    Ok(Json(UrlResponse {
        url: resolution.into_url(),
    }))
}

async fn find_record(state: &AppState, key: &str) -> Result<VideoRecord, AppError> {
    state
        .store
        .find_by_id(key)
        .await?
        .ok_or_else(|| AppError::not_found("Video not found"))
}
