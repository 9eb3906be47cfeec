//! Embedded relational adapter backed by SQLite.

use super::{MetadataStore, generate_id, is_unique_violation, split_statements};
use crate::{
    errors::{ClipError, ClipResult},
    models::video::{NewVideo, VideoRecord},
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::{str::FromStr, sync::Arc};
use tracing::{debug, info};

const SCHEMA: &str = include_str!("../../../migrations/sqlite/0001_init.sql");

const SELECT_COLUMNS: &str = "SELECT id, name, remote_object_id, share_id, owner_id, download_url, \
     url_expiry, created_at, updated_at FROM videos";

/// Lookup columns in resolution priority order.
const LOOKUP_COLUMNS: [&str; 3] = ["id", "remote_object_id", "share_id"];

#[derive(Clone)]
pub struct SqliteStore {
    /// Shared SQLite connection pool used for metadata operations.
    pub db: Arc<SqlitePool>,
    ttl: chrono::Duration,
}

impl SqliteStore {
    pub fn new(db: Arc<SqlitePool>, ttl: chrono::Duration) -> Self {
        Self { db, ttl }
    }

    /// Open (creating the file if needed) the database at `database_url`.
    pub async fn connect(database_url: &str, ttl: chrono::Duration) -> ClipResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        debug!(url = %database_url, "connected to sqlite metadata store");
        Ok(Self::new(Arc::new(pool), ttl))
    }

    /// Private in-memory database with the schema applied.
    ///
    /// Pinned to one connection: every SQLite `:memory:` connection is its own database.
    pub async fn in_memory(ttl: chrono::Duration) -> ClipResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self::new(Arc::new(pool), ttl);
        store.migrate().await?;
        Ok(store)
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> ClipResult<()> {
        let statements = split_statements(SCHEMA);
        info!("Running {} sqlite migration statements...", statements.len());
        for stmt in statements {
            debug!("Executing migration SQL: {}", stmt);
            sqlx::query(stmt).execute(&*self.db).await?;
        }
        Ok(())
    }

    async fn ping(&self) -> ClipResult<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        Ok(())
    }

    async fn create(&self, video: NewVideo) -> ClipResult<String> {
        let id = generate_id();
        let now = Utc::now();
        let url_expiry = video.download_url.as_ref().map(|_| now + self.ttl);

        let result = sqlx::query(
            "INSERT INTO videos (
                id, name, remote_object_id, share_id, owner_id,
                download_url, url_expiry, created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&video.name)
        .bind(&video.remote_object_id)
        .bind(&video.share_id)
        .bind(&video.owner_id)
        .bind(&video.download_url)
        .bind(url_expiry)
        .bind(now)
        .bind(now)
        .execute(&*self.db)
        .await;

        match result {
            Ok(_) => {
                debug!(id = %id, remote_object_id = %video.remote_object_id, "video record created");
                Ok(id)
            }
            Err(err) if is_unique_violation(&err) => Err(conflict_key(&err, &video)),
            Err(err) => Err(err.into()),
        }
    }

    async fn find_by_id(&self, key: &str) -> ClipResult<Option<VideoRecord>> {
        for column in LOOKUP_COLUMNS {
            let record = sqlx::query_as::<_, VideoRecord>(&format!(
                "{} WHERE {} = ? LIMIT 1",
                SELECT_COLUMNS, column
            ))
            .bind(key)
            .fetch_optional(&*self.db)
            .await?;
            if record.is_some() {
                return Ok(record);
            }
        }
        Ok(None)
    }

    async fn update_url(&self, id: &str, url: &str) -> ClipResult<()> {
        let now = Utc::now();
        // Timestamps are stored as RFC 3339 text, which orders lexicographically.
        let result = sqlx::query(
            "UPDATE videos
             SET download_url = ?, url_expiry = ?, updated_at = MAX(updated_at, ?)
             WHERE id = ?",
        )
        .bind(url)
        .bind(now + self.ttl)
        .bind(now)
        .bind(id)
        .execute(&*self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ClipError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

/// Name the key that collided, based on the constraint in the database message.
pub(super) fn conflict_key(err: &sqlx::Error, video: &NewVideo) -> ClipError {
    let message = match err {
        sqlx::Error::Database(db_err) => db_err.message().to_string(),
        other => other.to_string(),
    };
    match &video.share_id {
        Some(share_id) if message.contains("share_id") => ClipError::Conflict(share_id.clone()),
        _ => ClipError::Conflict(video.remote_object_id.clone()),
    }
}
