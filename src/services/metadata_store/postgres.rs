//! Hosted relational adapter backed by Postgres.

use super::{MetadataStore, generate_id, is_unique_violation, sqlite::conflict_key, split_statements};
use crate::{
    errors::{ClipError, ClipResult},
    models::video::{NewVideo, VideoRecord},
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::sync::Arc;
use tracing::{debug, info};

const SCHEMA: &str = include_str!("../../../migrations/postgres/0001_init.sql");

const SELECT_COLUMNS: &str = "SELECT id, name, remote_object_id, share_id, owner_id, download_url, \
     url_expiry, created_at, updated_at FROM videos";

#[derive(Clone)]
pub struct PostgresStore {
    pub db: Arc<PgPool>,
    ttl: chrono::Duration,
}

impl PostgresStore {
    pub fn new(db: Arc<PgPool>, ttl: chrono::Duration) -> Self {
        Self { db, ttl }
    }

    pub async fn connect(database_url: &str, ttl: chrono::Duration) -> ClipResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        debug!("connected to postgres metadata store");
        Ok(Self::new(Arc::new(pool), ttl))
    }
}

#[async_trait]
impl MetadataStore for PostgresStore {
    async fn migrate(&self) -> ClipResult<()> {
        let statements = split_statements(SCHEMA);
        info!("Running {} postgres migration statements...", statements.len());
        for stmt in statements {
            debug!("Executing migration SQL: {}", stmt);
            sqlx::query(stmt).execute(&*self.db).await?;
        }
        Ok(())
    }

    async fn ping(&self) -> ClipResult<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
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
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)",
        )
        .bind(&id)
        .bind(&video.name)
        .bind(&video.remote_object_id)
        .bind(&video.share_id)
        .bind(&video.owner_id)
        .bind(&video.download_url)
        .bind(url_expiry)
        .bind(now)
        .execute(&*self.db)
        .await;

        match result {
            Ok(_) => Ok(id),
            Err(err) if is_unique_violation(&err) => Err(conflict_key(&err, &video)),
            Err(err) => Err(err.into()),
        }
    }

    async fn find_by_id(&self, key: &str) -> ClipResult<Option<VideoRecord>> {
        // One statement so the three-way fallback reads a single snapshot.
        let record = sqlx::query_as::<_, VideoRecord>(&format!(
            "{} WHERE id = $1 OR remote_object_id = $1 OR share_id = $1
             ORDER BY CASE
                 WHEN id = $1 THEN 0
                 WHEN remote_object_id = $1 THEN 1
                 ELSE 2
             END
             LIMIT 1",
            SELECT_COLUMNS
        ))
        .bind(key)
        .fetch_optional(&*self.db)
        .await?;
        Ok(record)
    }

    async fn update_url(&self, id: &str, url: &str) -> ClipResult<()> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE videos
             SET download_url = $1, url_expiry = $2, updated_at = GREATEST(updated_at, $3)
             WHERE id = $4",
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
