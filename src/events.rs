use crate::source::models::Track;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlayerStatus {
    /// Nothing has been loaded yet.
    Idle,
    /// Fetching and waiting for the initial buffer.
    Starting,
    Playing,
    Paused,
    Stopped,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PlayerEvent {
    StateChanged {
        status: PlayerStatus,
    },
    TrackChanged {
        index: usize,
        track: Track,
    },
    #[serde(rename_all = "camelCase")]
    Progress {
        position: u32,
        duration: u32,
    },
    QueueChanged {
        len: usize,
    },
    TrackEnded {
        index: usize,
    },
}

impl PlayerEvent {
    pub fn state(status: PlayerStatus) -> Self {
        PlayerEvent::StateChanged { status }
    }
}
