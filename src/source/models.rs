use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub title: String,
    /// Whole seconds.
    pub duration: u32,
}

impl Track {
    pub fn new(id: impl Into<String>, title: impl Into<String>, duration: u32) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            duration,
        }
    }
}

/// A byte range of a track's encoded audio. Requests carry an empty `data`; responses carry
/// the bytes actually read with `end == start + data.len()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    pub track_id: String,
    pub start: u64,
    pub end: u64,
    pub data: Vec<u8>,
}

impl AudioChunk {
    pub fn request(track_id: impl Into<String>, start: u64, end: u64) -> Self {
        Self {
            track_id: track_id.into(),
            start,
            end,
            data: Vec::new(),
        }
    }

    pub fn response(request: &AudioChunk, data: Vec<u8>) -> Self {
        Self {
            track_id: request.track_id.clone(),
            start: request.start,
            end: request.start + data.len() as u64,
            data,
        }
    }

    pub fn is_valid_range(&self) -> bool {
        self.end > self.start
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Track metadata as served by the content API.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackMetaResponse {
    pub id: String,
    pub name: String,
    pub duration: i64,
}

impl From<TrackMetaResponse> for Track {
    fn from(meta: TrackMetaResponse) -> Self {
        Track {
            id: meta.id,
            title: meta.name,
            duration: meta.duration.clamp(0, u32::MAX as i64) as u32,
        }
    }
}
