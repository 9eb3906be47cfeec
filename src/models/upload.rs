//! Represents resumable upload sessions and the byte ranges sent through them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A server-issued upload handle scoped to one target file.
///
/// Owned by exactly one upload; never reused across recordings.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UploadSession {
    /// Opaque, pre-authorized URL chunks are PUT to.
    pub upload_url: String,

    /// When the session was opened.
    pub created_at: DateTime<Utc>,

    /// Server-side expiry of the session, when reported.
    pub expires_at: Option<DateTime<Utc>>,

    /// Total size declared by the client, if known up front.
    pub total_size_hint: Option<u64>,
}

/// An inclusive byte range `[start, end]` of a blob of `total` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
    pub total: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn is_last(&self) -> bool {
        self.end + 1 == self.total
    }

    /// `Content-Range` header value, e.g. `bytes 0-5242879/12582912`.
    pub fn content_range(&self) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, self.total)
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}/{}", self.start, self.end, self.total)
    }
}

/// Split `total` bytes into contiguous, non-overlapping ranges of at most
/// `chunk_size` bytes each.
pub fn chunk_ranges(total: u64, chunk_size: u64) -> Vec<ByteRange> {
    let chunk_size = chunk_size.max(1);
    let mut ranges = Vec::new();
    let mut start = 0;
    while start < total {
        let end = (start + chunk_size).min(total) - 1;
        ranges.push(ByteRange { start, end, total });
        start = end + 1;
    }
    ranges
}

/// Remote store response to a single chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkAck {
    /// More bytes expected; carries the server's view of what is missing.
    Accepted { next_expected_ranges: Vec<String> },
    /// Object finalized.
    Completed { remote_object_id: String },
}

/// Progress of one upload, reported after each acknowledged chunk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UploadProgress {
    pub bytes_sent: u64,
    pub total_bytes: u64,
}

impl UploadProgress {
    pub fn percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 100.0;
        }
        if self.bytes_sent >= self.total_bytes {
            return 100.0;
        }
        (self.bytes_sent as f64 / self.total_bytes as f64) * 100.0
    }
}
