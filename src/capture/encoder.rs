//! Segment encoder: drives a platform recorder on a fixed cadence and
//! forwards each encoded segment over a channel.

use super::{MediaStream, presets::QualityPreset};
use crate::errors::{ClipError, ClipResult};
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub const DEFAULT_MIME_TYPE: &str = "video/webm;codecs=vp9,opus";
pub const DEFAULT_SEGMENT_INTERVAL: Duration = Duration::from_secs(5);

const SEGMENT_BUFFER: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct EncoderConfig {
    pub mime_type: String,
    pub preset: QualityPreset,
    pub segment_interval: Duration,
}

impl EncoderConfig {
    pub fn new(preset: QualityPreset) -> Self {
        Self {
            mime_type: DEFAULT_MIME_TYPE.to_string(),
            preset,
            segment_interval: DEFAULT_SEGMENT_INTERVAL,
        }
    }

    pub fn with_segment_interval(mut self, interval: Duration) -> Self {
        self.segment_interval = interval;
        self
    }
}

/// Platform media recorder.
#[async_trait]
pub trait SegmentRecorder: Send {
    async fn start(&mut self, stream: &MediaStream, config: &EncoderConfig) -> ClipResult<()>;

    /// Encoded data produced since the previous call. May be empty.
    async fn request_data(&mut self) -> ClipResult<Bytes>;

    /// Stop encoding and return whatever is still buffered.
    async fn stop(&mut self) -> ClipResult<Bytes>;
}

/// Running encoder. Dropping the handle does not stop the task; call
/// [`EncoderHandle::finish`] or [`EncoderHandle::abort`].
pub struct EncoderHandle {
    stop: CancellationToken,
    task: JoinHandle<ClipResult<()>>,
}

impl EncoderHandle {
    /// Start `recorder` on `stream`. Segments arrive on the returned receiver
    /// in production order; the receiver closes after the final segment.
    pub async fn start(
        mut recorder: Box<dyn SegmentRecorder>,
        stream: &MediaStream,
        config: EncoderConfig,
    ) -> ClipResult<(Self, mpsc::Receiver<Bytes>)> {
        recorder.start(stream, &config).await?;
        debug!(
            mime_type = %config.mime_type,
            video_bps = config.preset.video_bits_per_second,
            audio_bps = config.preset.audio_bits_per_second,
            "encoder started"
        );

        let (tx, rx) = mpsc::channel(SEGMENT_BUFFER);
        let stop = CancellationToken::new();
        let task = tokio::spawn(run_encoder(recorder, config.segment_interval, tx, stop.clone()));
        Ok((Self { stop, task }, rx))
    }

    /// Stop the recorder and wait until its final segment has been emitted.
    pub async fn finish(self) -> ClipResult<()> {
        self.stop.cancel();
        self.task
            .await
            .map_err(|err| ClipError::Capture(format!("encoder task failed: {}", err)))?
    }

    /// Stop without waiting for pending data.
    pub fn abort(self) {
        self.stop.cancel();
        self.task.abort();
    }
}

async fn run_encoder(
    mut recorder: Box<dyn SegmentRecorder>,
    interval: Duration,
    tx: mpsc::Sender<Bytes>,
    stop: CancellationToken,
) -> ClipResult<()> {
    let mut ticker = tokio::time::interval(interval);
    // First tick fires immediately.
    ticker.tick().await;

    let mut failure = None;
    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            _ = ticker.tick() => match recorder.request_data().await {
                Ok(segment) if segment.is_empty() => {}
                Ok(segment) => {
                    if tx.send(segment).await.is_err() {
                        debug!("segment receiver gone, stopping encoder");
                        break;
                    }
                }
                Err(err) => {
                    warn!(error = %err, "encoder failed mid-recording");
                    failure = Some(err);
                    break;
                }
            }
        }
    }

    let last = recorder.stop().await;
    if let Some(err) = failure {
        return Err(err);
    }
    let last = last?;
    if !last.is_empty() {
        let _ = tx.send(last).await;
    }
    Ok(())
}
