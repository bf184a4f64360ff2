pub mod fs;
pub mod http;
pub mod models;

use crate::error::AppResult;
use async_trait::async_trait;
use models::{AudioChunk, Track};

/// Serves byte ranges of encoded track audio.
///
/// A request starting at or past the end of the track must return an empty chunk rather
/// than an error; the player treats that as a clean end of stream.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch_chunk(&self, request: &AudioChunk) -> AppResult<AudioChunk>;
}

/// Resolves track identifiers to metadata.
#[async_trait]
pub trait TrackCatalog: Send + Sync {
    async fn resolve_track(&self, track_id: &str) -> AppResult<Track>;
}
