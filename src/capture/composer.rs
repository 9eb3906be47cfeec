//! Capture Stream Composer: display video + microphone audio in one stream.

use super::{
    AudioConstraints, CaptureDevices, DisplayConstraints, MediaStream, MediaTrack, TrackSettings,
};
use crate::errors::{ClipError, ClipResult};
use std::sync::Arc;
use tracing::{debug, warn};

/// Merge the video tracks of `display` with the audio tracks of `microphone`.
pub fn combine_streams(display: &MediaStream, microphone: &MediaStream) -> MediaStream {
    let tracks: Vec<MediaTrack> = display
        .video_tracks()
        .chain(microphone.audio_tracks())
        .cloned()
        .collect();
    MediaStream::new(tracks)
}

/// Every stream acquired for one recording, kept together so all device
/// handles can be released in one place.
#[derive(Debug)]
pub struct ComposedCapture {
    pub stream: MediaStream,
    display: MediaStream,
    microphone: MediaStream,
}

impl ComposedCapture {
    /// Settings of the captured display surface.
    pub fn display_settings(&self) -> TrackSettings {
        self.display
            .video_tracks()
            .next()
            .map(MediaTrack::settings)
            .unwrap_or_default()
    }

    /// Stop every acquired track, including ones not merged into `stream`.
    pub fn release(&self) {
        self.display.stop_all();
        self.microphone.stop_all();
        self.stream.stop_all();
        debug!("capture tracks released");
    }
}

#[derive(Clone)]
pub struct CaptureComposer {
    devices: Arc<dyn CaptureDevices>,
    display_constraints: DisplayConstraints,
    audio_constraints: AudioConstraints,
}

impl CaptureComposer {
    pub fn new(devices: Arc<dyn CaptureDevices>) -> Self {
        Self {
            devices,
            display_constraints: DisplayConstraints::default(),
            audio_constraints: AudioConstraints::default(),
        }
    }

    pub fn audio_constraints(&self) -> AudioConstraints {
        self.audio_constraints
    }

    /// Acquire display and microphone and merge them. Anything acquired before
    /// a failure is released again.
    pub async fn acquire(&self) -> ClipResult<ComposedCapture> {
        let display = self
            .devices
            .display_media(&self.display_constraints)
            .await?;
        if display.video_tracks().next().is_none() {
            display.stop_all();
            return Err(ClipError::Capture(
                "display capture produced no video track".into(),
            ));
        }

        let microphone = match self.devices.user_media(&self.audio_constraints).await {
            Ok(stream) => stream,
            Err(err) => {
                warn!(error = %err, "microphone capture failed, releasing display");
                display.stop_all();
                return Err(err);
            }
        };

        let stream = combine_streams(&display, &microphone);
        Ok(ComposedCapture {
            stream,
            display,
            microphone,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::TrackKind;

    fn track(id: &str, kind: TrackKind) -> MediaTrack {
        MediaTrack::new(id, kind, TrackSettings::default())
    }

    #[test]
    fn combine_takes_display_video_and_mic_audio() {
        let display = MediaStream::new(vec![
            track("screen", TrackKind::Video),
            track("tab-audio", TrackKind::Audio),
        ]);
        let mic = MediaStream::new(vec![
            track("mic", TrackKind::Audio),
            track("webcam", TrackKind::Video),
        ]);

        let combined = combine_streams(&display, &mic);
        let ids: Vec<&str> = combined.tracks().iter().map(MediaTrack::id).collect();
        assert_eq!(ids, vec!["screen", "mic"]);
    }

    #[test]
    fn stopping_a_clone_stops_the_device() {
        let screen = track("screen", TrackKind::Video);
        let stream = MediaStream::new(vec![screen.clone()]);
        stream.stop_all();
        assert!(!screen.is_live());
    }
}
