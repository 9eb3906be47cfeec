//! One behavioural suite run against every metadata store adapter.

use chrono::{DateTime, Duration, Utc};
use driveclip::{
    errors::ClipError,
    models::video::{NewVideo, UrlState},
    services::metadata_store::{
        DocumentStore, MetadataStore, PostgresStore, SqliteStore, default_url_ttl,
    },
};
use tempfile::TempDir;
use uuid::Uuid;

fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}

fn new_video(download_url: Option<&str>, share_id: Option<String>) -> NewVideo {
    NewVideo {
        remote_object_id: unique("abc"),
        owner_id: "u1".into(),
        download_url: download_url.map(str::to_string),
        share_id,
        name: Some("recording_2024-01-01_00-00-00.webm".into()),
    }
}

async fn create_sets_ttl(store: &dyn MetadataStore) {
    let before = Utc::now();
    let id = store
        .create(new_video(Some("http://x/1"), None))
        .await
        .unwrap();
    let record = store.find_by_id(&id).await.unwrap().expect("record exists");

    assert_eq!(record.id, id);
    assert_eq!(record.owner_id, "u1");
    assert_eq!(record.download_url.as_deref(), Some("http://x/1"));
    assert_eq!(record.url_state(), UrlState::Fresh);

    let expiry = record.url_expiry.expect("expiry set");
    let expected = before + default_url_ttl();
    assert!((expiry - expected).num_seconds().abs() <= 5, "expiry {expiry} vs {expected}");
    assert!(record.updated_at >= record.created_at);
}

async fn create_without_url_is_stale(store: &dyn MetadataStore) {
    let id = store.create(new_video(None, None)).await.unwrap();
    let record = store.find_by_id(&id).await.unwrap().unwrap();
    assert_eq!(record.download_url, None);
    assert_eq!(record.url_expiry, None);
    assert_eq!(record.url_state(), UrlState::Stale);
}

async fn lookup_paths_agree(store: &dyn MetadataStore) {
    let share_id = unique("share");
    let video = new_video(Some("http://x/2"), Some(share_id.clone()));
    let remote_id = video.remote_object_id.clone();
    let id = store.create(video).await.unwrap();

    let by_id = store.find_by_id(&id).await.unwrap().unwrap();
    let by_remote = store.find_by_id(&remote_id).await.unwrap().unwrap();
    let by_share = store.find_by_id(&share_id).await.unwrap().unwrap();

    assert_eq!(by_id, by_remote);
    assert_eq!(by_id, by_share);
    assert_eq!(by_id.share_id.as_deref(), Some(share_id.as_str()));
}

async fn unknown_key_is_none(store: &dyn MetadataStore) {
    assert_eq!(store.find_by_id("nonexistent").await.unwrap(), None);
}

async fn update_url_restarts_ttl(store: &dyn MetadataStore) {
    let id = store.create(new_video(None, None)).await.unwrap();
    let created = store.find_by_id(&id).await.unwrap().unwrap();

    store.update_url(&id, "http://x/new").await.unwrap();
    let updated = store.find_by_id(&id).await.unwrap().unwrap();

    assert_eq!(updated.download_url.as_deref(), Some("http://x/new"));
    assert!(updated.url_expiry.unwrap() > Utc::now());
    assert_eq!(updated.url_state(), UrlState::Fresh);
    assert!(updated.updated_at >= created.updated_at);
    assert_eq!(updated.created_at, created.created_at);
}

async fn update_unknown_id_is_not_found(store: &dyn MetadataStore) {
    let err = store.update_url("nonexistent", "http://x").await.unwrap_err();
    assert!(matches!(err, ClipError::NotFound(_)), "got {err:?}");
}

async fn duplicate_keys_conflict(store: &dyn MetadataStore) {
    let share_id = unique("share");
    let first = new_video(Some("http://x/3"), Some(share_id.clone()));
    let remote_id = first.remote_object_id.clone();
    store.create(first).await.unwrap();

    let mut same_remote = new_video(None, None);
    same_remote.remote_object_id = remote_id;
    let err = store.create(same_remote).await.unwrap_err();
    assert!(matches!(err, ClipError::Conflict(_)), "got {err:?}");

    let same_share = new_video(None, Some(share_id));
    let err = store.create(same_share).await.unwrap_err();
    assert!(matches!(err, ClipError::Conflict(_)), "got {err:?}");
}

/// `id` already carries an `updated_at` of `later`, ahead of the wall clock.
async fn update_url_keeps_later_updated_at(
    store: &dyn MetadataStore,
    id: &str,
    later: DateTime<Utc>,
) {
    store.update_url(id, "http://x/after").await.unwrap();
    let record = store.find_by_id(id).await.unwrap().unwrap();

    assert_eq!(record.download_url.as_deref(), Some("http://x/after"));
    assert!(
        record.updated_at >= later - Duration::milliseconds(1),
        "updated_at moved back from {later} to {}",
        record.updated_at
    );
}

async fn short_ttl_goes_stale(store: &dyn MetadataStore) {
    let id = store
        .create(new_video(Some("http://x/short"), None))
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(400)).await;
    let record = store.find_by_id(&id).await.unwrap().unwrap();
    assert_eq!(record.url_state(), UrlState::Stale);
}

async fn run_suite(store: &dyn MetadataStore) {
    store.ping().await.unwrap();
    create_sets_ttl(store).await;
    create_without_url_is_stale(store).await;
    lookup_paths_agree(store).await;
    unknown_key_is_none(store).await;
    update_url_restarts_ttl(store).await;
    update_unknown_id_is_not_found(store).await;
    duplicate_keys_conflict(store).await;
}

#[tokio::test]
async fn sqlite_store_suite() {
    let store = SqliteStore::in_memory(default_url_ttl()).await.unwrap();
    run_suite(&store).await;
}

#[tokio::test]
async fn sqlite_store_on_disk_survives_reconnect() {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}", dir.path().join("videos.db").display());

    let store = SqliteStore::connect(&url, default_url_ttl()).await.unwrap();
    store.migrate().await.unwrap();
    let id = store.create(new_video(Some("http://x/1"), None)).await.unwrap();
    store.db.close().await;

    let reopened = SqliteStore::connect(&url, default_url_ttl()).await.unwrap();
    reopened.migrate().await.unwrap();
    assert!(reopened.find_by_id(&id).await.unwrap().is_some());
}

#[tokio::test]
async fn sqlite_update_never_moves_updated_at_backwards() {
    let store = SqliteStore::in_memory(default_url_ttl()).await.unwrap();
    let id = store.create(new_video(None, None)).await.unwrap();
    let later = Utc::now() + Duration::hours(2);
    sqlx::query("UPDATE videos SET updated_at = ? WHERE id = ?")
        .bind(later)
        .bind(&id)
        .execute(&*store.db)
        .await
        .unwrap();

    update_url_keeps_later_updated_at(&store, &id, later).await;
}

#[tokio::test]
async fn document_update_never_moves_updated_at_backwards() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("videos.json");
    let store = DocumentStore::open(&path, default_url_ttl()).await.unwrap();
    let id = store.create(new_video(None, None)).await.unwrap();
    drop(store);

    let later = Utc::now() + Duration::hours(2);
    let mut docs: serde_json::Value =
        serde_json::from_slice(&tokio::fs::read(&path).await.unwrap()).unwrap();
    docs[0]["updated_at"] = serde_json::json!(later);
    tokio::fs::write(&path, serde_json::to_vec(&docs).unwrap())
        .await
        .unwrap();

    let reopened = DocumentStore::open(&path, default_url_ttl()).await.unwrap();
    update_url_keeps_later_updated_at(&reopened, &id, later).await;
}

#[tokio::test]
async fn document_store_suite() {
    let dir = TempDir::new().unwrap();
    let store = DocumentStore::open(dir.path().join("videos.json"), default_url_ttl())
        .await
        .unwrap();
    store.migrate().await.unwrap();
    run_suite(&store).await;
}

#[tokio::test]
async fn document_store_persists_between_opens() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("videos.json");
    let share_id = unique("share");

    let store = DocumentStore::open(&path, default_url_ttl()).await.unwrap();
    let id = store
        .create(new_video(Some("http://x/1"), Some(share_id.clone())))
        .await
        .unwrap();
    store.update_url(&id, "http://x/2").await.unwrap();
    drop(store);

    let reopened = DocumentStore::open(&path, default_url_ttl()).await.unwrap();
    let record = reopened.find_by_id(&share_id).await.unwrap().unwrap();
    assert_eq!(record.id, id);
    assert_eq!(record.download_url.as_deref(), Some("http://x/2"));
}

#[tokio::test]
async fn in_memory_document_store_suite() {
    let store = DocumentStore::in_memory(default_url_ttl());
    run_suite(&store).await;
}

#[tokio::test]
async fn stores_classify_expired_urls_as_stale() {
    let ttl = Duration::milliseconds(200);
    let sqlite = SqliteStore::in_memory(ttl).await.unwrap();
    short_ttl_goes_stale(&sqlite).await;
    short_ttl_goes_stale(&DocumentStore::in_memory(ttl)).await;
}

/// Runs only when `DRIVECLIP_TEST_POSTGRES_URL` points at a disposable database.
#[tokio::test]
async fn postgres_store_suite() {
    let Ok(url) = std::env::var("DRIVECLIP_TEST_POSTGRES_URL") else {
        eprintln!("DRIVECLIP_TEST_POSTGRES_URL not set, skipping postgres suite");
        return;
    };
    let store = PostgresStore::connect(&url, default_url_ttl()).await.unwrap();
    store.migrate().await.unwrap();
    run_suite(&store).await;

    let id = store.create(new_video(None, None)).await.unwrap();
    let later = Utc::now() + Duration::hours(2);
    sqlx::query("UPDATE videos SET updated_at = $1 WHERE id = $2")
        .bind(later)
        .bind(&id)
        .execute(&*store.db)
        .await
        .unwrap();
    update_url_keeps_later_updated_at(&store, &id, later).await;
}
