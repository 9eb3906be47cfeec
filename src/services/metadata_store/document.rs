//! Document adapter: one JSON document per video, kept in memory and
//! written through to a single file after every mutation.

use super::{MetadataStore, generate_id};
use crate::{
    errors::{ClipError, ClipResult},
    models::video::{NewVideo, VideoRecord},
};
use async_trait::async_trait;
use chrono::Utc;
use std::{
    collections::BTreeMap,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tokio::{fs, io::AsyncWriteExt, sync::RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

pub struct DocumentStore {
    /// Backing file; `None` keeps documents in memory only.
    path: Option<PathBuf>,
    ttl: chrono::Duration,
    docs: RwLock<BTreeMap<String, VideoRecord>>,
}

impl DocumentStore {
    /// Load the collection from `path`, starting empty if the file does not exist.
    pub async fn open(path: impl AsRef<Path>, ttl: chrono::Duration) -> ClipResult<Self> {
        let path = path.as_ref().to_path_buf();
        let docs = match fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => BTreeMap::new(),
            Ok(bytes) => {
                let records: Vec<VideoRecord> = serde_json::from_slice(&bytes)?;
                records.into_iter().map(|r| (r.id.clone(), r)).collect()
            }
            Err(err) if err.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };
        debug!(path = %path.display(), documents = docs.len(), "opened document store");

        Ok(Self {
            path: Some(path),
            ttl,
            docs: RwLock::new(docs),
        })
    }

    pub fn in_memory(ttl: chrono::Duration) -> Self {
        Self {
            path: None,
            ttl,
            docs: RwLock::new(BTreeMap::new()),
        }
    }

    /// Write the whole collection to a temp file, fsync, then rename over the target.
    async fn persist(&self, docs: &BTreeMap<String, VideoRecord>) -> ClipResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let records: Vec<&VideoRecord> = docs.values().collect();
        let payload = serde_json::to_vec_pretty(&records)?;
        let tmp_path = path.with_extension(format!("tmp-{}", Uuid::new_v4()));

        let mut file = fs::File::create(&tmp_path).await?;
        let written = async {
            file.write_all(&payload).await?;
            file.flush().await?;
            file.sync_all().await
        }
        .await;
        if let Err(err) = written {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }
        if let Err(err) = fs::rename(&tmp_path, path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataStore for DocumentStore {
    async fn migrate(&self) -> ClipResult<()> {
        let docs = self.docs.read().await;
        self.persist(&docs).await
    }

    async fn ping(&self) -> ClipResult<()> {
        let _ = self.docs.read().await;
        Ok(())
    }

    async fn create(&self, video: NewVideo) -> ClipResult<String> {
        let mut docs = self.docs.write().await;

        if docs
            .values()
            .any(|r| r.remote_object_id == video.remote_object_id)
        {
            return Err(ClipError::Conflict(video.remote_object_id));
        }
        if let Some(share_id) = &video.share_id {
            if docs.values().any(|r| r.share_id.as_ref() == Some(share_id)) {
                return Err(ClipError::Conflict(share_id.clone()));
            }
        }

        let id = generate_id();
        let now = Utc::now();
        let url_expiry = video.download_url.as_ref().map(|_| now + self.ttl);
        let record = VideoRecord {
            id: id.clone(),
            name: video.name,
            remote_object_id: video.remote_object_id,
            share_id: video.share_id,
            owner_id: video.owner_id,
            download_url: video.download_url,
            url_expiry,
            created_at: now,
            updated_at: now,
        };
        docs.insert(id.clone(), record);

        if let Err(err) = self.persist(&docs).await {
            warn!(id = %id, error = %err, "rolling back document insert");
            docs.remove(&id);
            return Err(err);
        }
        Ok(id)
    }

    async fn find_by_id(&self, key: &str) -> ClipResult<Option<VideoRecord>> {
        let docs = self.docs.read().await;
        let found = docs
            .get(key)
            .or_else(|| docs.values().find(|r| r.remote_object_id == key))
            .or_else(|| docs.values().find(|r| r.share_id.as_deref() == Some(key)));
        Ok(found.cloned())
    }

    async fn update_url(&self, id: &str, url: &str) -> ClipResult<()> {
        let mut docs = self.docs.write().await;
        let now = Utc::now();

        let previous = {
            let record = docs
                .get_mut(id)
                .ok_or_else(|| ClipError::NotFound(id.to_string()))?;
            let previous = record.clone();
            record.download_url = Some(url.to_string());
            record.url_expiry = Some(now + self.ttl);
            record.updated_at = now.max(record.updated_at);
            previous
        };

        if let Err(err) = self.persist(&docs).await {
            docs.insert(id.to_string(), previous);
            return Err(err);
        }
        Ok(())
    }
}
