//! Shared building blocks for the stream-relay workspace.
//!
//! This crate provides:
//! - The application-wide error type with HTTP response mapping
//! - Content type and stream id primitives
//! - The process-wide fingerprint cache

pub mod cache;
pub mod error;
pub mod types;

pub use cache::FingerprintCache;
pub use error::{AppError, AppResult};
pub use types::{ContentType, StreamId};
