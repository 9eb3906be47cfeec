//! Recording session: owns the capture, the encoder and the collected
//! segments from start until the upload has finished.

use super::{
    composer::{CaptureComposer, ComposedCapture},
    encoder::{EncoderConfig, EncoderHandle, SegmentRecorder},
    presets::{PRESETS, QualityPreset, REFERENCE_HEIGHT, REFERENCE_WIDTH},
};
use crate::{
    errors::{ClipError, ClipResult},
    models::upload::UploadProgress,
    services::publish_service::{PublishService, PublishedVideo},
};
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{info, warn};

/// Encoded segments of one recording, in production order.
#[derive(Debug, Clone, Default)]
pub struct Recording {
    segments: Vec<Bytes>,
    total_bytes: usize,
}

impl Recording {
    pub fn push(&mut self, segment: Bytes) {
        self.total_bytes += segment.len();
        self.segments.push(segment);
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn len(&self) -> usize {
        self.total_bytes
    }

    pub fn is_empty(&self) -> bool {
        self.total_bytes == 0
    }

    /// Concatenate every segment into one blob.
    pub fn into_blob(self) -> Bytes {
        if self.segments.len() == 1 {
            return self.segments.into_iter().next().unwrap_or_default();
        }
        let mut blob = BytesMut::with_capacity(self.total_bytes);
        for segment in self.segments {
            blob.extend_from_slice(&segment);
        }
        blob.freeze()
    }
}

/// `recording_YYYY-MM-DD_HH-mm-ss.webm`
pub fn recording_file_name(at: DateTime<Utc>) -> String {
    format!("recording_{}.webm", at.format("%Y-%m-%d_%H-%M-%S"))
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordingStarted {
    pub file_name: String,
    pub preset: QualityPreset,
}

struct ActiveRecording {
    capture: ComposedCapture,
    encoder: EncoderHandle,
    collector: JoinHandle<Recording>,
    file_name: String,
}

impl ActiveRecording {
    fn discard(self) {
        warn!(file_name = %self.file_name, "discarding unfinished recording");
        self.encoder.abort();
        self.collector.abort();
        self.capture.release();
    }
}

pub struct ScreenRecorder {
    composer: CaptureComposer,
    publisher: PublishService,
    segment_interval: Duration,
    preset: Mutex<QualityPreset>,
    active: Mutex<Option<ActiveRecording>>,
}

impl ScreenRecorder {
    pub fn new(composer: CaptureComposer, publisher: PublishService) -> Self {
        Self {
            composer,
            publisher,
            segment_interval: super::encoder::DEFAULT_SEGMENT_INTERVAL,
            preset: Mutex::new(QualityPreset::default()),
            active: Mutex::new(None),
        }
    }

    pub fn with_segment_interval(mut self, interval: Duration) -> Self {
        self.segment_interval = interval;
        self
    }

    pub fn available_presets(&self) -> &'static [QualityPreset] {
        &PRESETS
    }

    pub async fn preset(&self) -> QualityPreset {
        *self.preset.lock().await
    }

    /// Change the quality preset. Rejected while a recording is running.
    pub async fn set_preset(&self, preset: QualityPreset) -> ClipResult<()> {
        if self.is_recording().await {
            return Err(ClipError::Capture(
                "quality cannot change while recording".into(),
            ));
        }
        *self.preset.lock().await = preset;
        Ok(())
    }

    pub async fn is_recording(&self) -> bool {
        self.active.lock().await.is_some()
    }

    /// Acquire capture devices and start encoding. A recording already in
    /// progress is discarded.
    pub async fn start(&self, recorder: Box<dyn SegmentRecorder>) -> ClipResult<RecordingStarted> {
        let capture = self.composer.acquire().await?;

        let settings = capture.display_settings();
        let preset = self.preset().await.scaled_for(
            settings.width.unwrap_or(REFERENCE_WIDTH),
            settings.height.unwrap_or(REFERENCE_HEIGHT),
        );
        let config = EncoderConfig::new(preset).with_segment_interval(self.segment_interval);

        let (encoder, mut segments) =
            match EncoderHandle::start(recorder, &capture.stream, config).await {
                Ok(started) => started,
                Err(err) => {
                    capture.release();
                    return Err(err);
                }
            };

        let collector = tokio::spawn(async move {
            let mut recording = Recording::default();
            while let Some(segment) = segments.recv().await {
                recording.push(segment);
            }
            recording
        });

        let file_name = recording_file_name(Utc::now());
        let previous = self.active.lock().await.replace(ActiveRecording {
            capture,
            encoder,
            collector,
            file_name: file_name.clone(),
        });
        if let Some(previous) = previous {
            previous.discard();
        }

        info!(
            file_name = %file_name,
            video_bps = preset.video_bits_per_second,
            "recording started"
        );
        Ok(RecordingStarted { file_name, preset })
    }

    /// Stop encoding, upload and publish the recording. Capture devices are
    /// released once the upload settles, whether or not it succeeded.
    pub async fn stop<F>(&self, on_progress: F) -> ClipResult<PublishedVideo>
    where
        F: FnMut(UploadProgress) + Send,
    {
        let active = self
            .active
            .lock()
            .await
            .take()
            .ok_or_else(|| ClipError::Capture("no recording in progress".into()))?;

        let ActiveRecording {
            capture,
            encoder,
            collector,
            file_name,
        } = active;

        let result: ClipResult<PublishedVideo> = async {
            encoder.finish().await?;
            let recording = collector
                .await
                .map_err(|err| ClipError::Capture(format!("segment collector failed: {}", err)))?;
            if recording.is_empty() {
                return Err(ClipError::Capture("recording produced no data".into()));
            }
            info!(
                file_name = %file_name,
                segments = recording.segment_count(),
                bytes = recording.len(),
                "recording stopped, uploading"
            );
            self.publisher
                .publish(recording.into_blob(), &file_name, on_progress)
                .await
        }
        .await;

        capture.release();
        result
    }
}
