use crate::audio::fetcher::{ChunkFetcher, FetchStats};
use crate::audio::output::{AudioBackend, OutputHandle};
use crate::audio::progress::{self, ProgressTracker};
use crate::audio::queue::{PlaybackQueue, QueueState};
use crate::audio::stream_buffer::{StreamBuffer, StreamWriter};
use crate::config::PlayerConfig;
use crate::error::{AppError, AppResult};
use crate::events::{PlayerEvent, PlayerStatus};
use crate::source::models::Track;
use crate::source::{ContentSource, TrackCatalog};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
    pub status: PlayerStatus,
    pub current_index: Option<usize>,
    pub current_second: u32,
    pub is_playing: bool,
    pub track: Option<Track>,
}

/// Background resources of one play-to-stop lifecycle.
struct Session {
    id: u64,
    cancel: CancellationToken,
    writer: StreamWriter,
    fetch: JoinHandle<FetchStats>,
    output: Option<Box<dyn OutputHandle>>,
}

/// What is left of a session after teardown, finished off the state lock.
struct Teardown {
    session_id: u64,
    fetch: JoinHandle<FetchStats>,
    output: Option<Box<dyn OutputHandle>>,
}

impl Teardown {
    /// Releases the output on the blocking pool and waits for the fetcher to exit.
    async fn finish(self) {
        if let Some(output) = self.output {
            release_output(output).await;
        }
        match self.fetch.await {
            Ok(stats) => log::info!(
                "Session {}: fetch ended ({:?}) after {} bytes, at byte {}",
                self.session_id,
                stats.outcome,
                stats.bytes_fetched,
                stats.end_offset
            ),
            Err(e) => log::warn!("Session {}: fetch task failed: {}", self.session_id, e),
        }
    }
}

/// Joins the output's decode thread without blocking a runtime worker.
async fn release_output(mut output: Box<dyn OutputHandle>) {
    if let Err(e) = tokio::task::spawn_blocking(move || output.release()).await {
        log::warn!("Output release failed: {}", e);
    }
}

struct PlayerState {
    queue: PlaybackQueue,
    current_second: u32,
    is_playing: bool,
    status: PlayerStatus,
    session: Option<Session>,
}

impl PlayerState {
    fn is_session(&self, id: u64) -> bool {
        self.session.as_ref().is_some_and(|s| s.id == id)
    }

    /// Cancels the fetcher and progress tasks, closes the stream buffer and silences the
    /// output. Returns `None` if no session was active.
    fn teardown(&mut self) -> Option<Teardown> {
        self.is_playing = false;
        let mut session = self.session.take()?;

        session.cancel.cancel();
        session.writer.close();
        if let Some(output) = session.output.as_mut() {
            output.set_paused(true);
        }
        log::info!("Session {} torn down", session.id);
        Some(Teardown {
            session_id: session.id,
            fetch: session.fetch,
            output: session.output,
        })
    }
}

/// A playback start launched in the background by `next`, `previous` or `seek_to`.
///
/// Dropping it leaves the start running; awaiting [`PendingStart::wait`] yields its result.
pub struct PendingStart(Option<JoinHandle<AppResult<()>>>);

impl PendingStart {
    fn none() -> Self {
        Self(None)
    }

    pub async fn wait(self) -> AppResult<()> {
        match self.0 {
            None => Ok(()),
            Some(handle) => handle
                .await
                .map_err(|e| AppError::Audio(format!("Start task failed: {}", e)))?,
        }
    }
}

struct Inner {
    state: Mutex<PlayerState>,
    source: Arc<dyn ContentSource>,
    catalog: Option<Arc<dyn TrackCatalog>>,
    backend: Arc<dyn AudioBackend>,
    config: PlayerConfig,
    events: broadcast::Sender<PlayerEvent>,
    session_ids: AtomicU64,
}

/// Transport controller: owns the queue, the elapsed time and the active session, and
/// serializes every transport operation through one lock.
#[derive(Clone)]
pub struct Player {
    inner: Arc<Inner>,
}

impl Player {
    pub fn new(
        source: Arc<dyn ContentSource>,
        backend: Arc<dyn AudioBackend>,
        config: PlayerConfig,
    ) -> Self {
        Self::build(source, None, backend, config)
    }

    /// Like [`Player::new`], with a catalog for [`Player::enqueue_ids`].
    pub fn with_catalog(
        source: Arc<dyn ContentSource>,
        catalog: Arc<dyn TrackCatalog>,
        backend: Arc<dyn AudioBackend>,
        config: PlayerConfig,
    ) -> Self {
        Self::build(source, Some(catalog), backend, config)
    }

    fn build(
        source: Arc<dyn ContentSource>,
        catalog: Option<Arc<dyn TrackCatalog>>,
        backend: Arc<dyn AudioBackend>,
        config: PlayerConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(PlayerState {
                    queue: PlaybackQueue::new(),
                    current_second: 0,
                    is_playing: false,
                    status: PlayerStatus::Idle,
                    session: None,
                }),
                source,
                catalog,
                backend,
                config,
                events,
                session_ids: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.inner.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.inner.events.subscribe()
    }

    pub async fn snapshot(&self) -> PlaybackSnapshot {
        let state = self.inner.state.lock().await;
        PlaybackSnapshot {
            status: state.status,
            current_index: state.queue.current_index(),
            current_second: state.current_second,
            is_playing: state.is_playing,
            track: state.queue.current_track().cloned(),
        }
    }

    pub async fn queue(&self) -> QueueState {
        self.inner.state.lock().await.queue.state()
    }

    /// Replaces the upcoming tracks after the current one.
    pub async fn add_to_queue(&self, tracks: Vec<Track>) {
        let mut state = self.inner.state.lock().await;
        state.queue.add_to_queue(tracks);
        self.inner.emit(PlayerEvent::QueueChanged {
            len: state.queue.len(),
        });
    }

    /// Resolves `ids` through the track catalog, then queues them like [`Player::add_to_queue`].
    pub async fn enqueue_ids(&self, ids: &[String]) -> AppResult<()> {
        let catalog = self
            .inner
            .catalog
            .as_ref()
            .ok_or_else(|| AppError::Config("No track catalog configured".into()))?;

        let mut tracks = Vec::with_capacity(ids.len());
        for id in ids {
            tracks.push(catalog.resolve_track(id).await?);
        }
        self.add_to_queue(tracks).await;
        Ok(())
    }

    /// Starts the current track from the beginning. Returns once audio output has begun,
    /// or immediately if a session is already active or nothing is queued.
    pub async fn play(&self) -> AppResult<()> {
        self.inner.start(true).await
    }

    pub async fn pause(&self) {
        let mut state = self.inner.state.lock().await;
        if state.status != PlayerStatus::Playing {
            return;
        }
        let Some(output) = state.session.as_mut().and_then(|s| s.output.as_mut()) else {
            return;
        };
        output.set_paused(true);
        state.is_playing = false;
        state.status = PlayerStatus::Paused;
        self.inner.emit(PlayerEvent::state(PlayerStatus::Paused));
    }

    pub async fn resume(&self) {
        let mut state = self.inner.state.lock().await;
        if state.status != PlayerStatus::Paused {
            return;
        }
        let Some(output) = state.session.as_mut().and_then(|s| s.output.as_mut()) else {
            return;
        };
        output.set_paused(false);
        state.is_playing = true;
        state.status = PlayerStatus::Playing;
        self.inner.emit(PlayerEvent::state(PlayerStatus::Playing));
    }

    /// Tears down the active session, if any. Safe to call repeatedly.
    pub async fn stop(&self) {
        let teardown = {
            let mut state = self.inner.state.lock().await;
            self.inner.stop_locked(&mut state)
        };
        if let Some(teardown) = teardown {
            teardown.finish().await;
        }
    }

    pub async fn next(&self) -> PendingStart {
        self.skip(PlaybackQueue::advance).await
    }

    pub async fn previous(&self) -> PendingStart {
        self.skip(PlaybackQueue::retreat).await
    }

    async fn skip(&self, step: fn(&mut PlaybackQueue) -> bool) -> PendingStart {
        let mut state = self.inner.state.lock().await;
        let teardown = self.inner.stop_locked(&mut state);
        // A clamped step restarts the current track from the top.
        step(&mut state.queue);
        state.current_second = 0;
        drop(state);

        self.restart(teardown).await
    }

    /// Restarts the current track at `second`. Targets outside `[0, duration)`, or a call
    /// with no current track, are ignored.
    pub async fn seek_to(&self, second: i64) -> PendingStart {
        let mut state = self.inner.state.lock().await;
        let Some(duration) = state.queue.current_track().map(|t| t.duration) else {
            log::debug!("Seek to {}s ignored: no current track", second);
            return PendingStart::none();
        };
        if second < 0 || second >= duration as i64 {
            log::debug!("Seek to {}s ignored: track is {}s", second, duration);
            return PendingStart::none();
        }

        let teardown = self.inner.stop_locked(&mut state);
        state.current_second = second as u32;
        drop(state);

        self.restart(teardown).await
    }

    /// Stops playback and releases the output device.
    pub async fn shutdown(&self) {
        self.stop().await;
    }

    /// Finishes the previous session's teardown, then starts a new one in the background
    /// from whatever elapsed time is current when it acquires the lock.
    async fn restart(&self, teardown: Option<Teardown>) -> PendingStart {
        if let Some(teardown) = teardown {
            teardown.finish().await;
        }

        let inner = Arc::clone(&self.inner);
        PendingStart(Some(tokio::spawn(async move {
            let result = inner.start(false).await;
            if let Err(ref e) = result {
                log::error!("Playback start failed: {}", e);
            }
            result
        })))
    }
}

impl Inner {
    fn emit(&self, event: PlayerEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn stop_locked(&self, state: &mut PlayerState) -> Option<Teardown> {
        let teardown = state.teardown()?;
        state.status = PlayerStatus::Stopped;
        self.emit(PlayerEvent::state(PlayerStatus::Stopped));
        Some(teardown)
    }

    /// Runs one session start at the current elapsed time, or at zero with `reset_elapsed`.
    async fn start(self: &Arc<Self>, reset_elapsed: bool) -> AppResult<()> {
        let (id, cancel, track, index, reader, ready_rx) = {
            let mut state = self.state.lock().await;
            if !matches!(state.status, PlayerStatus::Idle | PlayerStatus::Stopped) {
                log::debug!("Play ignored: player is {:?}", state.status);
                return Ok(());
            }
            let (Some(track), Some(index)) =
                (state.queue.current_track().cloned(), state.queue.current_index())
            else {
                log::debug!("Play ignored: queue is empty");
                return Ok(());
            };

            if reset_elapsed {
                state.current_second = 0;
            }
            let start_second = state.current_second.min(track.duration);
            state.current_second = start_second;

            let id = self.session_ids.fetch_add(1, Ordering::SeqCst) + 1;
            let cancel = CancellationToken::new();
            let (reader, writer) = StreamBuffer::new(self.config.read_poll_interval());
            let (ready_tx, ready_rx) = oneshot::channel();
            let start_byte = self.config.estimate_byte_offset(start_second);

            log::info!(
                "Session {}: starting track {} ({}) at {}s, byte {}",
                id,
                track.id,
                track.title,
                start_second,
                start_byte
            );

            let fetch = ChunkFetcher::new(Arc::clone(&self.source), &self.config).spawn(
                track.id.clone(),
                start_byte,
                writer.clone(),
                ready_tx,
                cancel.child_token(),
            );

            state.session = Some(Session {
                id,
                cancel: cancel.clone(),
                writer,
                fetch,
                output: None,
            });
            state.status = PlayerStatus::Starting;
            self.emit(PlayerEvent::state(PlayerStatus::Starting));
            self.emit(PlayerEvent::TrackChanged {
                index,
                track: track.clone(),
            });

            (id, cancel, track, index, reader, ready_rx)
        };

        let ready = tokio::select! {
            _ = cancel.cancelled() => false,
            result = ready_rx => result.is_ok(),
        };

        if !ready {
            let teardown = {
                let mut state = self.state.lock().await;
                if !state.is_session(id) {
                    return Ok(());
                }
                log::warn!("Session {}: no audio received for track {}", id, track.id);
                self.stop_locked(&mut state)
            };
            if let Some(teardown) = teardown {
                teardown.finish().await;
            }
            return Ok(());
        }

        log::info!("Session {}: initial buffer ready", id);

        let (done_tx, done_rx) = oneshot::channel();
        let backend = Arc::clone(&self.backend);
        let opened = tokio::task::spawn_blocking(move || backend.open(reader, done_tx))
            .await
            .map_err(|e| AppError::Audio(format!("Output task failed: {}", e)))
            .and_then(|opened| opened);

        let mut state = self.state.lock().await;
        if !state.is_session(id) || cancel.is_cancelled() {
            // Stopped while the decoder was starting.
            drop(state);
            if let Ok(output) = opened {
                release_output(output).await;
            }
            return Ok(());
        }

        let output = match opened {
            Ok(output) => output,
            Err(e) => {
                log::error!("Session {}: output initialization failed: {}", id, e);
                let teardown = self.stop_locked(&mut state);
                drop(state);
                if let Some(teardown) = teardown {
                    teardown.finish().await;
                }
                return Err(e);
            }
        };

        if let Some(session) = state.session.as_mut() {
            session.output = Some(output);
        }
        state.is_playing = true;
        state.status = PlayerStatus::Playing;
        self.emit(PlayerEvent::state(PlayerStatus::Playing));
        drop(state);

        self.track_progress(id, track.duration, cancel.child_token());
        self.watch_completion(id, index, done_rx);
        Ok(())
    }

    fn track_progress(self: &Arc<Self>, id: u64, duration: u32, cancel: CancellationToken) {
        let inner = Arc::clone(self);
        let token = cancel.clone();
        ProgressTracker::new(self.config.progress_tick()).spawn(cancel, move || {
            let inner = Arc::clone(&inner);
            let token = token.clone();
            async move {
                let mut state = inner.state.lock().await;
                if token.is_cancelled() || !state.is_session(id) || !state.is_playing {
                    return;
                }
                state.current_second = progress::advance(state.current_second, duration);
                inner.emit(PlayerEvent::Progress {
                    position: state.current_second,
                    duration,
                });
            }
        });
    }

    fn watch_completion(self: &Arc<Self>, id: u64, index: usize, done_rx: oneshot::Receiver<()>) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            // An unfired sender means the output was released by a teardown.
            if done_rx.await.is_err() {
                return;
            }

            let mut state = inner.state.lock().await;
            if !state.is_session(id) {
                return;
            }
            log::info!("Session {}: track finished", id);
            let teardown = inner.stop_locked(&mut state);
            inner.emit(PlayerEvent::TrackEnded { index });

            let advanced = inner.config.auto_advance && state.queue.advance();
            if advanced {
                state.current_second = 0;
            }
            drop(state);

            if let Some(teardown) = teardown {
                teardown.finish().await;
            }
            if advanced {
                if let Err(e) = inner.start(false).await {
                    log::error!("Auto-advance failed: {}", e);
                }
            }
        });
    }
}
