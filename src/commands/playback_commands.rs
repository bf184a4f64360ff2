use crate::audio::player::{PlaybackSnapshot, Player};
use crate::error::AppResult;

pub async fn play(player: &Player) -> AppResult<()> {
    player.play().await
}

pub async fn pause(player: &Player) {
    player.pause().await;
}

pub async fn resume(player: &Player) {
    player.resume().await;
}

pub async fn stop(player: &Player) {
    player.stop().await;
}

pub async fn next(player: &Player) {
    // Restart runs in the background; failures are logged by the player.
    let _ = player.next().await;
}

pub async fn previous(player: &Player) {
    let _ = player.previous().await;
}

pub async fn seek(player: &Player, second: i64) {
    let _ = player.seek_to(second).await;
}

pub fn format_status(snapshot: &PlaybackSnapshot) -> String {
    match &snapshot.track {
        Some(track) => format!(
            "[{:?}] #{} {} ({}) {} / {}",
            snapshot.status,
            snapshot.current_index.map_or(0, |i| i + 1),
            track.title,
            track.id,
            format_time(snapshot.current_second),
            format_time(track.duration),
        ),
        None => format!("[{:?}] queue is empty", snapshot.status),
    }
}

fn format_time(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
