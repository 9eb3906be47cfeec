//! Metadata Store: persists video records and resolves them by any of
//! three identifiers.
//!
//! Three adapters implement the same contract:
//! - [`SqliteStore`]: embedded relational (SQLite via sqlx)
//! - [`PostgresStore`]: hosted relational (Postgres via sqlx)
//! - [`DocumentStore`]: document collection persisted as a JSON file
//!
//! Each call is atomic with respect to the single record it touches. Concurrent
//! `update_url` calls on one id race; the last writer wins.

mod document;
mod postgres;
mod sqlite;

pub use document::DocumentStore;
pub use postgres::PostgresStore;
pub use sqlite::SqliteStore;

use crate::{
    errors::{ClipError, ClipResult},
    models::video::{NewVideo, VideoRecord},
};
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// Validity window of a freshly written download URL, in seconds.
pub const DEFAULT_URL_TTL_SECS: i64 = 3600;

pub fn default_url_ttl() -> chrono::Duration {
    chrono::Duration::seconds(DEFAULT_URL_TTL_SECS)
}

#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Create the backing schema if it does not exist yet.
    async fn migrate(&self) -> ClipResult<()>;

    /// Cheap round trip used by the readiness probe.
    async fn ping(&self) -> ClipResult<()>;

    /// Insert a record and return its generated id.
    ///
    /// Sets `created_at = updated_at = now`. When a download URL is given,
    /// `url_expiry = now + ttl`; otherwise both stay empty.
    async fn create(&self, video: NewVideo) -> ClipResult<String>;

    /// Look a record up by `id`, then `remote_object_id`, then `share_id`.
    async fn find_by_id(&self, key: &str) -> ClipResult<Option<VideoRecord>>;

    /// Replace the download URL, restarting its TTL and bumping `updated_at`.
    async fn update_url(&self, id: &str, url: &str) -> ClipResult<()>;
}

/// Adapter selected by the scheme of a database URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite,
    Postgres,
    Document,
}

impl StoreBackend {
    pub fn from_url(url: &str) -> ClipResult<Self> {
        let scheme = url.split(':').next().unwrap_or_default();
        match scheme {
            "sqlite" => Ok(Self::Sqlite),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "document" => Ok(Self::Document),
            other => Err(ClipError::Persistence(format!(
                "unsupported database scheme `{}`",
                other
            ))),
        }
    }
}

/// Open the adapter matching `database_url`.
pub async fn connect(
    database_url: &str,
    ttl: chrono::Duration,
) -> ClipResult<Arc<dyn MetadataStore>> {
    let store: Arc<dyn MetadataStore> = match StoreBackend::from_url(database_url)? {
        StoreBackend::Sqlite => Arc::new(SqliteStore::connect(database_url, ttl).await?),
        StoreBackend::Postgres => Arc::new(PostgresStore::connect(database_url, ttl).await?),
        StoreBackend::Document => {
            let path = database_url
                .trim_start_matches("document://")
                .trim_start_matches("document:");
            Arc::new(DocumentStore::open(path, ttl).await?)
        }
    };
    Ok(store)
}

/// Fresh 32-character hex id.
pub(crate) fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Return true if SQLx error indicates a unique constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err)
            if db_err.is_unique_violation()
                || db_err.message().to_ascii_lowercase().contains("unique")
    )
}

/// Split a migration script into executable statements.
pub(crate) fn split_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}
