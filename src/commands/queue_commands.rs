use crate::audio::player::Player;
use crate::audio::queue::QueueState;
use crate::error::AppResult;
use crate::source::fs::FileLibrary;

pub async fn add_to_queue(player: &Player, ids: &[String]) -> AppResult<()> {
    player.enqueue_ids(ids).await
}

pub async fn list_library(library: &FileLibrary) -> AppResult<Vec<String>> {
    library.list_tracks().await
}

pub fn format_queue(queue: &QueueState) -> String {
    if queue.tracks.is_empty() {
        return "queue is empty".to_string();
    }
    queue
        .tracks
        .iter()
        .enumerate()
        .map(|(i, track)| {
            let marker = if queue.current_index == Some(i) { ">" } else { " " };
            format!("{} {:>3}. {} ({}s)", marker, i + 1, track.title, track.duration)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
