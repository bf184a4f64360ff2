use crate::audio::stream_buffer::StreamWriter;
use crate::config::PlayerConfig;
use crate::source::models::AudioChunk;
use crate::source::ContentSource;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The source returned an empty chunk.
    Exhausted,
    /// The source returned an error; treated as end of stream.
    Failed,
    Cancelled,
    /// The stream buffer was closed from the reader side.
    ReaderGone,
}

#[derive(Debug, Clone, Copy)]
pub struct FetchStats {
    pub outcome: FetchOutcome,
    pub bytes_fetched: u64,
    pub end_offset: u64,
}

/// Streams a track from a [`ContentSource`] into a session's stream buffer, one fixed-size
/// byte range at a time.
#[derive(Clone)]
pub struct ChunkFetcher {
    source: Arc<dyn ContentSource>,
    chunk_size: u64,
    ready_threshold: u64,
}

impl ChunkFetcher {
    pub fn new(source: Arc<dyn ContentSource>, config: &PlayerConfig) -> Self {
        Self {
            source,
            chunk_size: config.chunk_size,
            ready_threshold: config.initial_buffer_bytes(),
        }
    }

    pub fn spawn(
        self,
        track_id: String,
        start_byte: u64,
        writer: StreamWriter,
        ready: oneshot::Sender<()>,
        cancel: CancellationToken,
    ) -> JoinHandle<FetchStats> {
        tokio::spawn(async move {
            self.run(&track_id, start_byte, writer, ready, cancel)
                .await
        })
    }

    /// Fetches from `start_byte` until the source is exhausted, fails, or `cancel` fires.
    /// The writer is always closed on return.
    ///
    /// `ready` fires once the initial buffer threshold is crossed, or at end of stream for
    /// tracks shorter than the threshold. It is dropped unsent if nothing was fetched.
    pub async fn run(
        &self,
        track_id: &str,
        start_byte: u64,
        writer: StreamWriter,
        ready: oneshot::Sender<()>,
        cancel: CancellationToken,
    ) -> FetchStats {
        log::info!(
            "Fetching track {} from byte {} ({} byte chunks)",
            track_id,
            start_byte,
            self.chunk_size
        );

        let mut ready = Some(ready);
        let mut offset = start_byte;
        let mut total = 0u64;

        let outcome = loop {
            if cancel.is_cancelled() {
                break FetchOutcome::Cancelled;
            }

            let request = AudioChunk::request(track_id, offset, offset + self.chunk_size);
            let result = tokio::select! {
                _ = cancel.cancelled() => break FetchOutcome::Cancelled,
                result = self.source.fetch_chunk(&request) => result,
            };

            let chunk = match result {
                Ok(chunk) if chunk.is_empty() => break FetchOutcome::Exhausted,
                Ok(chunk) => chunk,
                Err(e) => {
                    log::warn!("Fetch of track {} at byte {} failed: {}", track_id, offset, e);
                    break FetchOutcome::Failed;
                }
            };

            if !writer.write(&chunk.data) {
                break FetchOutcome::ReaderGone;
            }
            offset += chunk.data.len() as u64;
            total += chunk.data.len() as u64;

            if total >= self.ready_threshold {
                signal_ready(&mut ready);
            }
        };

        writer.close();

        if matches!(outcome, FetchOutcome::Exhausted | FetchOutcome::Failed) && total > 0 {
            signal_ready(&mut ready);
        }

        log::debug!(
            "Fetch of track {} ended ({:?}) after {} bytes",
            track_id,
            outcome,
            total
        );

        FetchStats {
            outcome,
            bytes_fetched: total,
            end_offset: offset,
        }
    }
}

fn signal_ready(ready: &mut Option<oneshot::Sender<()>>) {
    if let Some(tx) = ready.take() {
        // The session may have stopped waiting already.
        let _ = tx.send(());
    }
}
