#![allow(dead_code)]

use async_trait::async_trait;
use orpheon_player::audio::stream_buffer::StreamReader;
use orpheon_player::{
    AppError, AppResult, AudioBackend, AudioChunk, ContentSource, OutputHandle, PlaybackSnapshot,
    Player, PlayerConfig, Track, TrackCatalog,
};
use std::collections::HashMap;
use std::io::Read;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

pub const TRACK_BYTES: usize = 64 * 1024;

/// In-memory content source and catalog that records every chunk request.
pub struct MemoryLibrary {
    tracks: HashMap<String, (Track, Vec<u8>)>,
    pub requests: Mutex<Vec<(String, u64, u64)>>,
    pub delay: Duration,
}

impl MemoryLibrary {
    pub fn new(tracks: &[(&str, u32)]) -> Self {
        Self::with_sizes(
            &tracks
                .iter()
                .map(|(id, duration)| (*id, *duration, TRACK_BYTES))
                .collect::<Vec<_>>(),
        )
    }

    pub fn with_sizes(tracks: &[(&str, u32, usize)]) -> Self {
        let tracks = tracks
            .iter()
            .map(|(id, duration, len)| {
                let data: Vec<u8> = (0..*len).map(|i| (i % 251) as u8).collect();
                (id.to_string(), (Track::new(*id, id.to_uppercase(), *duration), data))
            })
            .collect();
        Self {
            tracks,
            requests: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn track(&self, id: &str) -> Track {
        self.tracks[id].0.clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requested(&self, id: &str, start: u64) -> bool {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .any(|(track, s, _)| track == id && *s == start)
    }
}

#[async_trait]
impl ContentSource for MemoryLibrary {
    async fn fetch_chunk(&self, request: &AudioChunk) -> AppResult<AudioChunk> {
        self.requests
            .lock()
            .unwrap()
            .push((request.track_id.clone(), request.start, request.end));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let (_, data) = self
            .tracks
            .get(&request.track_id)
            .ok_or_else(|| AppError::NotFound(request.track_id.clone()))?;
        let len = data.len() as u64;
        let start = request.start.min(len) as usize;
        let end = request.end.min(len) as usize;
        Ok(AudioChunk::response(request, data[start..end].to_vec()))
    }
}

#[async_trait]
impl TrackCatalog for MemoryLibrary {
    async fn resolve_track(&self, track_id: &str) -> AppResult<Track> {
        self.tracks
            .get(track_id)
            .map(|(track, _)| track.clone())
            .ok_or_else(|| AppError::NotFound(format!("Track {}", track_id)))
    }
}

#[derive(Debug, Default)]
pub struct BackendLog {
    pub opens: usize,
    pub releases: usize,
    pub paused: bool,
}

/// Stand-in for the decoder and output device.
#[derive(Default)]
pub struct FakeBackend {
    pub log: Arc<Mutex<BackendLog>>,
    /// Fail every `open` as an undecodable stream.
    pub fail_open: bool,
    /// Consume the stream on a thread and report completion at end of stream.
    pub complete_on_eof: bool,
    /// How long `release` blocks, like joining a decode thread.
    pub release_delay: Duration,
}

impl FakeBackend {
    pub fn opens(&self) -> usize {
        self.log.lock().unwrap().opens
    }

    pub fn paused(&self) -> bool {
        self.log.lock().unwrap().paused
    }
}

struct FakeOutput {
    log: Arc<Mutex<BackendLog>>,
    release_delay: Duration,
    stream: Option<StreamReader>,
    on_complete: Option<oneshot::Sender<()>>,
    released: bool,
}

impl AudioBackend for FakeBackend {
    fn open(
        &self,
        stream: StreamReader,
        on_complete: oneshot::Sender<()>,
    ) -> AppResult<Box<dyn OutputHandle>> {
        self.log.lock().unwrap().opens += 1;
        if self.fail_open {
            return Err(AppError::Decode("Failed to probe format".into()));
        }

        let mut output = FakeOutput {
            log: Arc::clone(&self.log),
            release_delay: self.release_delay,
            stream: None,
            on_complete: None,
            released: false,
        };

        if self.complete_on_eof {
            let mut stream = stream;
            std::thread::spawn(move || {
                let mut sink = Vec::new();
                if stream.read_to_end(&mut sink).is_ok() {
                    let _ = on_complete.send(());
                }
            });
        } else {
            output.stream = Some(stream);
            output.on_complete = Some(on_complete);
        }

        self.log.lock().unwrap().paused = false;
        Ok(Box::new(output))
    }
}

impl OutputHandle for FakeOutput {
    fn set_paused(&mut self, paused: bool) {
        self.log.lock().unwrap().paused = paused;
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        std::thread::sleep(self.release_delay);
        self.stream = None;
        self.on_complete = None;
        self.log.lock().unwrap().releases += 1;
    }
}

pub fn test_config() -> PlayerConfig {
    PlayerConfig {
        chunk_size: 1024,
        initial_buffer_chunks: 2,
        estimate_sample_rate: 100,
        estimate_bytes_per_frame: 4,
        read_poll_interval_ms: 5,
        ..PlayerConfig::default()
    }
}

pub fn player_with(
    library: Arc<MemoryLibrary>,
    backend: Arc<FakeBackend>,
    config: PlayerConfig,
) -> Player {
    Player::with_catalog(library.clone(), library, backend, config)
}

/// Polls the player until `predicate` holds, panicking after two seconds.
pub async fn wait_for<F>(player: &Player, mut predicate: F) -> PlaybackSnapshot
where
    F: FnMut(&PlaybackSnapshot) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let snapshot = player.snapshot().await;
        if predicate(&snapshot) {
            return snapshot;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("condition not reached; last snapshot: {:?}", snapshot);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
