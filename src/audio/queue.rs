use crate::source::models::Track;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueState {
    pub tracks: Vec<Track>,
    pub current_index: Option<usize>,
}

/// Ordered tracks plus the position of the current one.
///
/// Carries no synchronization of its own; the player mutates it under its state lock.
#[derive(Debug, Default)]
pub struct PlaybackQueue {
    tracks: Vec<Track>,
    current_index: usize,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces everything after the current track with `tracks`, keeping the history up to
    /// and including the current position.
    pub fn add_to_queue(&mut self, tracks: Vec<Track>) {
        if !self.is_empty() {
            self.tracks.truncate(self.current_index + 1);
        }
        self.tracks.extend(tracks);
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.tracks.get(self.current_index)
    }

    /// Index of the current track, or `None` on an empty queue.
    pub fn current_index(&self) -> Option<usize> {
        (self.current_index < self.tracks.len()).then_some(self.current_index)
    }

    /// Moves to the following track. Returns `false` (leaving the position alone) at the end.
    pub fn advance(&mut self) -> bool {
        if self.current_index + 1 < self.tracks.len() {
            self.current_index += 1;
            true
        } else {
            false
        }
    }

    /// Moves to the preceding track. Returns `false` at the start.
    pub fn retreat(&mut self) -> bool {
        if self.current_index > 0 && !self.tracks.is_empty() {
            self.current_index -= 1;
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn state(&self) -> QueueState {
        QueueState {
            tracks: self.tracks.clone(),
            current_index: self.current_index(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracks(ids: &[&str]) -> Vec<Track> {
        ids.iter().map(|id| Track::new(*id, *id, 180)).collect()
    }

    fn ids(queue: &PlaybackQueue) -> Vec<&str> {
        queue.tracks.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn first_add_fills_empty_queue() {
        let mut queue = PlaybackQueue::new();
        assert_eq!(queue.current_index(), None);

        queue.add_to_queue(tracks(&["a", "b"]));
        assert_eq!(ids(&queue), ["a", "b"]);
        assert_eq!(queue.current_index(), Some(0));
        assert_eq!(queue.current_track().map(|t| t.id.as_str()), Some("a"));
    }

    #[test]
    fn add_replaces_upcoming_tracks_and_keeps_history() {
        let mut queue = PlaybackQueue::new();
        queue.add_to_queue(tracks(&["a", "b", "c", "d"]));
        assert!(queue.advance());
        assert!(queue.advance());

        queue.add_to_queue(tracks(&["x", "y"]));
        assert_eq!(ids(&queue), ["a", "b", "c", "x", "y"]);
        assert_eq!(queue.current_index(), Some(2));
    }

    #[test]
    fn add_at_start_keeps_only_current() {
        let mut queue = PlaybackQueue::new();
        queue.add_to_queue(tracks(&["a", "b", "c"]));
        queue.add_to_queue(tracks(&["x"]));
        assert_eq!(ids(&queue), ["a", "x"]);
    }

    #[test]
    fn advance_and_retreat_clamp_at_ends() {
        let mut queue = PlaybackQueue::new();
        assert!(!queue.advance());
        assert!(!queue.retreat());

        queue.add_to_queue(tracks(&["a", "b"]));
        assert!(!queue.retreat());
        assert!(queue.advance());
        assert!(!queue.advance());
        assert_eq!(queue.current_index(), Some(1));
        assert!(queue.retreat());
        assert_eq!(queue.current_index(), Some(0));
    }
}
