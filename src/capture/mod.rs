//! Capture side of the recorder: media tracks, the devices that produce
//! them, and the pieces that turn them into uploadable segments.
//!
//! The host platform (a browser, a desktop capture API) sits behind
//! [`CaptureDevices`] and [`encoder::SegmentRecorder`].

pub mod composer;
pub mod encoder;
pub mod presets;
pub mod session;

use crate::errors::ClipResult;
use async_trait::async_trait;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Video,
    Audio,
}

/// Settings a track actually runs with, as reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrackSettings {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub sample_rate: Option<u32>,
}

/// Handle to a live device track. Clones share the same underlying device,
/// so stopping any clone releases it for all of them.
#[derive(Debug, Clone)]
pub struct MediaTrack {
    id: String,
    kind: TrackKind,
    settings: TrackSettings,
    live: Arc<AtomicBool>,
}

impl MediaTrack {
    pub fn new(id: impl Into<String>, kind: TrackKind, settings: TrackSettings) -> Self {
        Self {
            id: id.into(),
            kind,
            settings,
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn settings(&self) -> TrackSettings {
        self.settings
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Release the device. Idempotent.
    pub fn stop(&self) {
        self.live.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone, Default)]
pub struct MediaStream {
    tracks: Vec<MediaTrack>,
}

impl MediaStream {
    pub fn new(tracks: Vec<MediaTrack>) -> Self {
        Self { tracks }
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(|t| t.kind == TrackKind::Video)
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(|t| t.kind == TrackKind::Audio)
    }

    pub fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayConstraints {
    pub cursor_always_visible: bool,
}

impl Default for DisplayConstraints {
    fn default() -> Self {
        Self {
            cursor_always_visible: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub sample_rate: u32,
}

impl Default for AudioConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            sample_rate: 44_100,
        }
    }
}

/// Platform capture devices.
#[async_trait]
pub trait CaptureDevices: Send + Sync {
    /// Ask the user for a display surface to capture.
    async fn display_media(&self, constraints: &DisplayConstraints) -> ClipResult<MediaStream>;

    /// Open the microphone.
    async fn user_media(&self, constraints: &AudioConstraints) -> ClipResult<MediaStream>;
}
