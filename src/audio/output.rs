use crate::audio::decoder::AudioDecoder;
use crate::audio::stream_buffer::StreamReader;
use crate::error::{AppError, AppResult};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;

/// Turns a session's encoded byte stream into rendered audio.
pub trait AudioBackend: Send + Sync {
    /// Initializes decoding and output for `stream` and starts rendering it.
    ///
    /// May block while the decoder probes the stream. `on_complete` must be fired exactly
    /// once when the stream has been fully rendered; a handle released before that point
    /// drops it unfired.
    fn open(
        &self,
        stream: StreamReader,
        on_complete: oneshot::Sender<()>,
    ) -> AppResult<Box<dyn OutputHandle>>;
}

/// Control over one opened output.
pub trait OutputHandle: Send {
    fn set_paused(&mut self, paused: bool);

    /// Stops rendering and frees the decoder and device. Idempotent.
    fn release(&mut self);
}

/// Shared ring buffer between the decode thread and the cpal callback.
struct SampleRingBuffer {
    buffer: VecDeque<f32>,
    finished: bool,
}

type Ring = Arc<(Mutex<SampleRingBuffer>, Condvar)>;

fn lock_ring(ring: &Ring) -> MutexGuard<'_, SampleRingBuffer> {
    ring.0.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Wrapper to make cpal::Stream Send.
/// The stream is only touched by the single owner of the `CpalOutput`, and cpal::Stream is
/// only non-Send because of CoreAudio requirements that this usage satisfies.
struct SendStream(Option<cpal::Stream>);
unsafe impl Send for SendStream {}

/// Two seconds of stereo audio at 44.1kHz.
const MAX_RING_SAMPLES: usize = 176400;

const DRAIN_POLL: Duration = Duration::from_millis(50);

/// Default output device via cpal, decoding with symphonia on a dedicated thread.
pub struct CpalBackend {
    volume: f32,
    codec_hint: Option<String>,
}

impl CpalBackend {
    pub fn new(volume: f32) -> Self {
        Self {
            volume: volume.clamp(0.0, 1.0),
            codec_hint: Some("mp3".into()),
        }
    }

    pub fn with_codec_hint(mut self, hint: Option<String>) -> Self {
        self.codec_hint = hint;
        self
    }
}

impl AudioBackend for CpalBackend {
    fn open(
        &self,
        stream: StreamReader,
        on_complete: oneshot::Sender<()>,
    ) -> AppResult<Box<dyn OutputHandle>> {
        let decoder = AudioDecoder::new(stream, self.codec_hint.as_deref())?;
        let output = CpalOutput::start(decoder, self.volume, on_complete)?;
        Ok(Box::new(output))
    }
}

struct CpalOutput {
    /// cpal stream handle (kept alive)
    stream: SendStream,
    ring: Ring,
    playing: Arc<AtomicBool>,
    stop_signal: Arc<AtomicBool>,
    decode_handle: Option<std::thread::JoinHandle<()>>,
}

impl CpalOutput {
    fn start(
        mut decoder: AudioDecoder,
        volume: f32,
        on_complete: oneshot::Sender<()>,
    ) -> AppResult<Self> {
        let sr = decoder.sample_rate();
        let ch = decoder.channels();

        let ring: Ring = Arc::new((
            Mutex::new(SampleRingBuffer {
                buffer: VecDeque::with_capacity(MAX_RING_SAMPLES),
                finished: false,
            }),
            Condvar::new(),
        ));
        let playing = Arc::new(AtomicBool::new(false));

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| AppError::Audio("No output device available".into()))?;

        let stream_config = cpal::StreamConfig {
            channels: ch as u16,
            sample_rate: cpal::SampleRate(sr),
            buffer_size: cpal::BufferSize::Default,
        };

        let ring_clone = Arc::clone(&ring);
        let playing_clone = Arc::clone(&playing);

        let cpal_stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if !playing_clone.load(Ordering::Relaxed) {
                        data.fill(0.0);
                        return;
                    }

                    let mut ring = lock_ring(&ring_clone);
                    for sample in data.iter_mut() {
                        *sample = ring.buffer.pop_front().map_or(0.0, |s| s * volume);
                    }
                    ring_clone.1.notify_all();
                },
                |err| {
                    log::error!("cpal output error: {}", err);
                },
                None,
            )
            .map_err(|e| AppError::Audio(format!("Failed to build output stream: {}", e)))?;

        cpal_stream
            .play()
            .map_err(|e| AppError::Audio(format!("Failed to start playback: {}", e)))?;
        playing.store(true, Ordering::SeqCst);

        let stop_signal = Arc::new(AtomicBool::new(false));
        let ring_decode = Arc::clone(&ring);
        let stop_decode = Arc::clone(&stop_signal);

        let handle = std::thread::spawn(move || {
            decode_loop(&mut decoder, &ring_decode, &stop_decode);
            if wait_for_drain(&ring_decode, &stop_decode) {
                log::info!("Output drained");
                let _ = on_complete.send(());
            }
        });

        Ok(Self {
            stream: SendStream(Some(cpal_stream)),
            ring,
            playing,
            stop_signal,
            decode_handle: Some(handle),
        })
    }
}

fn decode_loop(decoder: &mut AudioDecoder, ring: &Ring, stop: &AtomicBool) {
    loop {
        if stop.load(Ordering::Relaxed) {
            return;
        }

        {
            let mut guard = lock_ring(ring);
            while guard.buffer.len() >= MAX_RING_SAMPLES && !stop.load(Ordering::Relaxed) {
                guard = ring
                    .1
                    .wait_timeout(guard, DRAIN_POLL)
                    .unwrap_or_else(PoisonError::into_inner)
                    .0;
            }
        }

        if stop.load(Ordering::Relaxed) {
            return;
        }

        match decoder.decode_next() {
            Ok(Some(samples)) => {
                let mut guard = lock_ring(ring);
                guard.buffer.extend(samples);
                ring.1.notify_all();
            }
            Ok(None) => break,
            Err(e) => {
                log::error!("Decode error: {}", e);
                break;
            }
        }
    }

    let mut guard = lock_ring(ring);
    guard.finished = true;
    ring.1.notify_all();
}

/// Waits until the callback has consumed every decoded sample. Returns `false` if the
/// output was stopped first.
fn wait_for_drain(ring: &Ring, stop: &AtomicBool) -> bool {
    let mut guard = lock_ring(ring);
    while !(guard.finished && guard.buffer.is_empty()) {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        guard = ring
            .1
            .wait_timeout(guard, DRAIN_POLL)
            .unwrap_or_else(PoisonError::into_inner)
            .0;
    }
    !stop.load(Ordering::Relaxed)
}

impl OutputHandle for CpalOutput {
    fn set_paused(&mut self, paused: bool) {
        self.playing.store(!paused, Ordering::SeqCst);
    }

    fn release(&mut self) {
        self.stop_signal.store(true, Ordering::SeqCst);
        self.playing.store(false, Ordering::SeqCst);
        self.ring.1.notify_all();

        if let Some(handle) = self.decode_handle.take() {
            let _ = handle.join();
        }

        self.stream = SendStream(None);
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        self.release();
    }
}
