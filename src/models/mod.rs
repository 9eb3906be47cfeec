//! Core data models for the recording publish pipeline.
//!
//! Video records map to database rows via `sqlx::FromRow` and serialize
//! as JSON via `serde`; upload types describe the chunked transfer protocol.

pub mod upload;
pub mod video;
