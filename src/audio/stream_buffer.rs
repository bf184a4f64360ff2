use std::collections::VecDeque;
use std::io::{self, Read};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Shared state between the chunk fetcher and the decoder.
struct SharedBuffer {
    /// Bytes written but not yet read.
    data: VecDeque<u8>,
    /// One-shot end-of-stream signal.
    closed: bool,
    /// Total bytes accepted from the writer.
    written: u64,
}

type Shared = Arc<(Mutex<SharedBuffer>, Condvar)>;

fn lock(shared: &Shared) -> MutexGuard<'_, SharedBuffer> {
    shared.0.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Unbounded single-writer/single-reader byte relay for one playback session.
///
/// The reader blocks while the buffer is empty and still open. Writers never block; the
/// decoder's consumption pace is the only backpressure.
pub struct StreamBuffer;

impl StreamBuffer {
    /// Creates a fresh buffer. `poll_interval` bounds how long a blocked reader sleeps
    /// before re-checking for data or the close signal.
    pub fn new(poll_interval: Duration) -> (StreamReader, StreamWriter) {
        let shared = Arc::new((
            Mutex::new(SharedBuffer {
                data: VecDeque::with_capacity(1024 * 1024),
                closed: false,
                written: 0,
            }),
            Condvar::new(),
        ));

        let reader = StreamReader {
            shared: Arc::clone(&shared),
            poll_interval,
        };
        let writer = StreamWriter { shared };

        (reader, writer)
    }
}

/// Decoder end. Returns end-of-stream (`Ok(0)`) only once the buffer is closed and drained.
pub struct StreamReader {
    shared: Shared,
    poll_interval: Duration,
}

impl Read for StreamReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let (_, cvar) = &*self.shared;
        let mut state = lock(&self.shared);

        while state.data.is_empty() && !state.closed {
            state = cvar
                .wait_timeout(state, self.poll_interval)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }

        let to_read = buf.len().min(state.data.len());
        for (dst, src) in buf.iter_mut().zip(state.data.drain(..to_read)) {
            *dst = src;
        }
        Ok(to_read)
    }
}

impl Drop for StreamReader {
    fn drop(&mut self) {
        // Nobody will consume further bytes; tell the writer to stop.
        let mut state = lock(&self.shared);
        state.closed = true;
        state.data.clear();
        self.shared.1.notify_all();
    }
}

/// Fetcher end. Clones share the same buffer so the session can close it on teardown.
#[derive(Clone)]
pub struct StreamWriter {
    shared: Shared,
}

impl StreamWriter {
    /// Appends `data`. Returns `false` (dropping the bytes) once the buffer is closed.
    pub fn write(&self, data: &[u8]) -> bool {
        let mut state = lock(&self.shared);
        if state.closed {
            return false;
        }
        state.data.extend(data);
        state.written += data.len() as u64;
        self.shared.1.notify_all();
        true
    }

    /// Raises the end-of-stream signal. Safe to call any number of times.
    pub fn close(&self) {
        let mut state = lock(&self.shared);
        if !state.closed {
            state.closed = true;
            self.shared.1.notify_all();
        }
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.shared).closed
    }

    pub fn bytes_written(&self) -> u64 {
        lock(&self.shared).written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    const POLL: Duration = Duration::from_millis(10);

    #[test]
    fn drains_buffered_bytes_before_end_of_stream() {
        let (mut reader, writer) = StreamBuffer::new(POLL);
        writer.write(b"hello");
        writer.close();

        let mut buf = [0u8; 3];
        assert_eq!(reader.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf, b"hel");
        assert_eq!(reader.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"lo");
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn read_blocks_until_data_arrives() {
        let (mut reader, writer) = StreamBuffer::new(POLL);

        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            writer.write(b"abc");
            writer
        });

        let started = Instant::now();
        let mut buf = [0u8; 8];
        let n = reader.read(&mut buf).unwrap();
        assert_eq!(n, 3);
        assert_eq!(&buf[..n], b"abc");
        assert!(started.elapsed() >= Duration::from_millis(40));

        let writer = handle.join().unwrap();
        writer.close();
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn close_wakes_blocked_reader() {
        let (mut reader, writer) = StreamBuffer::new(Duration::from_secs(5));

        let handle = std::thread::spawn(move || {
            let mut buf = [0u8; 8];
            reader.read(&mut buf).unwrap()
        });

        std::thread::sleep(Duration::from_millis(30));
        let started = Instant::now();
        writer.close();
        assert_eq!(handle.join().unwrap(), 0);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn close_is_idempotent() {
        let (_reader, writer) = StreamBuffer::new(POLL);
        let other = writer.clone();
        writer.close();
        other.close();
        writer.close();
        assert!(writer.is_closed());
    }

    #[test]
    fn writes_after_close_are_dropped() {
        let (mut reader, writer) = StreamBuffer::new(POLL);
        writer.write(b"ab");
        writer.close();
        assert!(!writer.write(b"cd"));
        assert_eq!(writer.bytes_written(), 2);

        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"ab");
    }

    #[test]
    fn dropping_reader_closes_buffer() {
        let (reader, writer) = StreamBuffer::new(POLL);
        drop(reader);
        assert!(writer.is_closed());
        assert!(!writer.write(b"x"));
    }
}
