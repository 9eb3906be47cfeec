#![allow(dead_code)]

use async_trait::async_trait;
use axum_test::TestServer;
use bytes::Bytes;
use driveclip::{
    capture::{
        AudioConstraints, CaptureDevices, DisplayConstraints, MediaStream, MediaTrack, TrackKind,
        TrackSettings, encoder::{EncoderConfig, SegmentRecorder},
    },
    errors::{ClipError, ClipResult},
    models::upload::{ByteRange, ChunkAck, UploadSession},
    routes::routes::build_router,
    services::{
        graph_client::{RemoteItem, RemoteStore},
        metadata_store::{MetadataStore, SqliteStore, default_url_ttl},
        refresh_service::UrlRefreshGateway,
        share_service::{DEFAULT_SHARE_BASE_URL, ShareResolver, decode_sharing_url, parse_share_id},
    },
    state::AppState,
};
use chrono::Utc;
use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

pub const TOKEN: &str = "test-token";

/// What the fake remote store saw.
#[derive(Debug, Default)]
pub struct RemoteLog {
    pub sessions_opened: Vec<(String, u64)>,
    pub ranges: Vec<ByteRange>,
    pub received: Vec<u8>,
    pub cancelled_sessions: usize,
    pub share_links: Vec<String>,
    pub item_lookups: Vec<String>,
    pub shared_lookups: Vec<String>,
}

/// In-memory stand-in for the drive API.
#[derive(Default)]
pub struct FakeRemoteStore {
    pub log: Mutex<RemoteLog>,
    /// Zero-based chunk index that fails with a 500.
    pub fail_chunk: Mutex<Option<usize>>,
    pub fail_share: Mutex<bool>,
    pub fail_get_item: Mutex<bool>,
    /// Item id → share id, filled in by `create_share_link`.
    shares: Mutex<HashMap<String, String>>,
    url_version: Mutex<u32>,
    /// Prefix of the web URLs handed out by `create_share_link`.
    share_base: Mutex<Option<String>>,
}

impl FakeRemoteStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_chunk_at(&self, index: usize) {
        *self.fail_chunk.lock().unwrap() = Some(index);
    }

    pub fn fail_get_item(&self, fail: bool) {
        *self.fail_get_item.lock().unwrap() = fail;
    }

    pub fn fail_share(&self, fail: bool) {
        *self.fail_share.lock().unwrap() = fail;
    }

    /// Make `share_id` resolvable to `item_id` without going through `create_share_link`.
    pub fn register_share(&self, item_id: &str, share_id: &str) {
        self.shares
            .lock()
            .unwrap()
            .insert(item_id.to_string(), share_id.to_string());
    }

    /// Hand out share links under `base` instead of the default share base.
    pub fn share_links_under(&self, base: &str) {
        *self.share_base.lock().unwrap() = Some(base.to_string());
    }

    pub fn ranges(&self) -> Vec<ByteRange> {
        self.log.lock().unwrap().ranges.clone()
    }

    fn next_url(&self, item_id: &str) -> String {
        let mut version = self.url_version.lock().unwrap();
        *version += 1;
        format!("https://download.test/{}?v={}", item_id, *version)
    }
}

#[async_trait]
impl RemoteStore for FakeRemoteStore {
    async fn create_upload_session(
        &self,
        _token: &str,
        file_name: &str,
        total_size: u64,
    ) -> ClipResult<UploadSession> {
        let mut log = self.log.lock().unwrap();
        log.sessions_opened.push((file_name.to_string(), total_size));
        Ok(UploadSession {
            upload_url: format!("https://upload.test/session/{}", log.sessions_opened.len()),
            created_at: Utc::now(),
            expires_at: None,
            total_size_hint: Some(total_size),
        })
    }

    async fn upload_chunk(
        &self,
        _session: &UploadSession,
        range: ByteRange,
        chunk: Bytes,
    ) -> ClipResult<ChunkAck> {
        let mut log = self.log.lock().unwrap();
        let index = log.ranges.len();
        log.ranges.push(range);
        if *self.fail_chunk.lock().unwrap() == Some(index) {
            return Err(ClipError::upload(Some(500), "chunk rejected"));
        }
        assert_eq!(chunk.len() as u64, range.len());
        log.received.extend_from_slice(&chunk);

        if range.is_last() {
            Ok(ChunkAck::Completed {
                remote_object_id: format!("ITEM{}", log.sessions_opened.len()),
            })
        } else {
            Ok(ChunkAck::Accepted {
                next_expected_ranges: vec![format!("{}-", range.end + 1)],
            })
        }
    }

    async fn cancel_upload_session(&self, _session: &UploadSession) -> ClipResult<()> {
        self.log.lock().unwrap().cancelled_sessions += 1;
        Ok(())
    }

    async fn create_share_link(&self, _token: &str, remote_object_id: &str) -> ClipResult<String> {
        if *self.fail_share.lock().unwrap() {
            return Err(ClipError::ShareCreation("sharing disabled".into()));
        }
        let share_id = format!("S{}", remote_object_id);
        self.register_share(remote_object_id, &share_id);
        let base = self
            .share_base
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| DEFAULT_SHARE_BASE_URL.to_string());
        let web_url = format!("{}s!{}?e=Zx9", base, share_id);
        self.log.lock().unwrap().share_links.push(web_url.clone());
        Ok(web_url)
    }

    async fn get_item(&self, _token: &str, remote_object_id: &str) -> ClipResult<RemoteItem> {
        self.log
            .lock()
            .unwrap()
            .item_lookups
            .push(remote_object_id.to_string());
        if *self.fail_get_item.lock().unwrap() {
            return Err(ClipError::RemoteStore("item lookup unavailable".into()));
        }
        Ok(RemoteItem {
            id: remote_object_id.to_string(),
            name: None,
            size: None,
            download_url: Some(self.next_url(remote_object_id)),
        })
    }

    async fn get_shared_item(&self, token: &str, share_locator: &str) -> ClipResult<RemoteItem> {
        self.log
            .lock()
            .unwrap()
            .shared_lookups
            .push(share_locator.to_string());
        let share_id = decode_sharing_url(share_locator)
            .and_then(|url| parse_share_id(&url))
            .ok_or_else(|| ClipError::RemoteStore(format!("bad locator {}", share_locator)))?;
        let item_id = self
            .shares
            .lock()
            .unwrap()
            .iter()
            .find(|(_, s)| **s == share_id)
            .map(|(item, _)| item.clone())
            .ok_or_else(|| ClipError::RemoteStore(format!("unknown share {}", share_id)))?;
        self.get_item(token, &item_id).await
    }
}

/// Capture devices handing out fake tracks and remembering every one of them.
#[derive(Default)]
pub struct FakeDevices {
    pub tracks: Mutex<Vec<MediaTrack>>,
    pub deny_microphone: Mutex<bool>,
    pub display_size: Mutex<Option<(u32, u32)>>,
}

impl FakeDevices {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn live_tracks(&self) -> usize {
        self.tracks.lock().unwrap().iter().filter(|t| t.is_live()).count()
    }

    pub fn total_tracks(&self) -> usize {
        self.tracks.lock().unwrap().len()
    }

    fn issue(&self, id: String, kind: TrackKind, settings: TrackSettings) -> MediaTrack {
        let track = MediaTrack::new(id, kind, settings);
        self.tracks.lock().unwrap().push(track.clone());
        track
    }
}

#[async_trait]
impl CaptureDevices for FakeDevices {
    async fn display_media(&self, _constraints: &DisplayConstraints) -> ClipResult<MediaStream> {
        let n = self.total_tracks();
        let (width, height) = (*self.display_size.lock().unwrap()).unwrap_or((1920, 1080));
        let settings = TrackSettings {
            width: Some(width),
            height: Some(height),
            sample_rate: None,
        };
        Ok(MediaStream::new(vec![self.issue(
            format!("screen-{}", n),
            TrackKind::Video,
            settings,
        )]))
    }

    async fn user_media(&self, constraints: &AudioConstraints) -> ClipResult<MediaStream> {
        if *self.deny_microphone.lock().unwrap() {
            return Err(ClipError::Capture("microphone permission denied".into()));
        }
        let n = self.total_tracks();
        let settings = TrackSettings {
            sample_rate: Some(constraints.sample_rate),
            ..TrackSettings::default()
        };
        Ok(MediaStream::new(vec![self.issue(
            format!("mic-{}", n),
            TrackKind::Audio,
            settings,
        )]))
    }
}

/// Segment recorder replaying scripted segments, one per request.
pub struct ScriptedRecorder {
    segments: VecDeque<Bytes>,
    tail: Bytes,
    pub config: Arc<Mutex<Option<EncoderConfig>>>,
}

impl ScriptedRecorder {
    pub fn new(segments: &[&'static str], tail: &'static str) -> Self {
        Self {
            segments: segments
                .iter()
                .map(|s| Bytes::from_static(s.as_bytes()))
                .collect(),
            tail: Bytes::from_static(tail.as_bytes()),
            config: Arc::new(Mutex::new(None)),
        }
    }
}

#[async_trait]
impl SegmentRecorder for ScriptedRecorder {
    async fn start(&mut self, _stream: &MediaStream, config: &EncoderConfig) -> ClipResult<()> {
        *self.config.lock().unwrap() = Some(config.clone());
        Ok(())
    }

    async fn request_data(&mut self) -> ClipResult<Bytes> {
        Ok(self.segments.pop_front().unwrap_or_default())
    }

    async fn stop(&mut self) -> ClipResult<Bytes> {
        let mut rest: Vec<u8> = self.segments.drain(..).flat_map(|b| b.to_vec()).collect();
        rest.extend_from_slice(&self.tail);
        Ok(Bytes::from(rest))
    }
}

/// Test application: router over an in-memory SQLite store and a fake drive.
pub struct TestApp {
    pub server: TestServer,
    pub store: Arc<dyn MetadataStore>,
    pub remote: Arc<FakeRemoteStore>,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }
}

pub async fn setup_test_app() -> TestApp {
    let store: Arc<dyn MetadataStore> = Arc::new(
        SqliteStore::in_memory(default_url_ttl())
            .await
            .expect("in-memory sqlite store"),
    );
    let remote = FakeRemoteStore::new();
    let gateway = gateway_for(store.clone(), remote.clone());
    let server = TestServer::new(build_router(AppState::new(gateway))).expect("test server");
    TestApp {
        server,
        store,
        remote,
    }
}

pub fn gateway_for(store: Arc<dyn MetadataStore>, remote: Arc<FakeRemoteStore>) -> UrlRefreshGateway {
    let shares = ShareResolver::new(remote.clone(), DEFAULT_SHARE_BASE_URL);
    UrlRefreshGateway::new(store, remote, shares)
}
