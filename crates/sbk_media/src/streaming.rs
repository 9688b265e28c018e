//! Payload sources and asynchronous streaming requests.
//!
//! A [`StreamingSource`] knows how many bytes a payload has and how to copy
//! them either synchronously or through a [`StreamingRequest`]. A request
//! owns the destination buffer for its whole lifetime and hands it back
//! through the completion callback, so a callback can never write into
//! memory that was already freed.

use crate::store::PayloadBuffer;
use parking_lot::{Condvar, Mutex};
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Bytes copied per step; cancellation is checked between steps.
const STREAM_BLOCK_SIZE: usize = 64 * 1024;

/// How a streaming request ended. The buffer always comes back.
#[derive(Debug)]
pub enum RequestOutcome {
    Completed(PayloadBuffer),
    Cancelled(PayloadBuffer),
    Failed(PayloadBuffer, String),
}

impl RequestOutcome {
    pub fn into_buffer(self) -> PayloadBuffer {
        match self {
            RequestOutcome::Completed(buffer)
            | RequestOutcome::Cancelled(buffer)
            | RequestOutcome::Failed(buffer, _) => buffer,
        }
    }
}

/// Called exactly once, on the thread that finishes the request, before the
/// request reports itself complete.
pub type CompletionCallback = Box<dyn FnOnce(RequestOutcome) + Send>;

/// An in-flight asynchronous read.
pub trait StreamingRequest: Send + Sync {
    /// `true` once the completion callback has returned.
    fn poll(&self) -> bool;

    /// Ask the request to stop. Completion still happens and must be awaited.
    fn cancel(&self);

    /// Block until complete or until `timeout` elapses. `None` waits forever.
    /// Returns whether the request completed.
    fn wait(&self, timeout: Option<Duration>) -> bool;
}

/// Where payload bytes come from.
pub trait StreamingSource: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether [`create_streaming_request`](Self::create_streaming_request)
    /// is supported. Sources that cannot stream are always copied
    /// synchronously.
    fn can_stream(&self) -> bool;

    /// Copy the payload into `dest`, which is exactly [`len`](Self::len) bytes.
    fn read_sync(&self, dest: &mut [u8]) -> std::io::Result<()>;

    fn create_streaming_request(
        &self,
        buffer: PayloadBuffer,
        on_complete: CompletionCallback,
    ) -> Box<dyn StreamingRequest>;
}

struct RequestShared {
    cancelled: AtomicBool,
    done: Mutex<bool>,
    done_signal: Condvar,
}

/// A streaming request served by a dedicated worker thread.
pub struct ThreadedStreamingRequest {
    shared: Arc<RequestShared>,
}

impl ThreadedStreamingRequest {
    /// Spawn a worker that fills `buffer` with `read` and then invokes
    /// `on_complete`.
    ///
    /// `read` receives the destination and the cancellation flag and returns
    /// `Ok(false)` when it stopped early because of cancellation.
    pub fn spawn<R>(mut buffer: PayloadBuffer, on_complete: CompletionCallback, read: R) -> Self
    where
        R: FnOnce(&mut [u8], &AtomicBool) -> std::io::Result<bool> + Send + 'static,
    {
        let shared = Arc::new(RequestShared {
            cancelled: AtomicBool::new(false),
            done: Mutex::new(false),
            done_signal: Condvar::new(),
        });

        let worker_shared = shared.clone();
        std::thread::spawn(move || {
            let outcome = match read(buffer.as_mut_slice(), &worker_shared.cancelled) {
                Ok(true) if !worker_shared.cancelled.load(Ordering::Acquire) => {
                    RequestOutcome::Completed(buffer)
                }
                Ok(_) => RequestOutcome::Cancelled(buffer),
                Err(e) => RequestOutcome::Failed(buffer, e.to_string()),
            };

            on_complete(outcome);

            let mut done = worker_shared.done.lock();
            *done = true;
            worker_shared.done_signal.notify_all();
        });

        Self { shared }
    }
}

impl StreamingRequest for ThreadedStreamingRequest {
    fn poll(&self) -> bool {
        *self.shared.done.lock()
    }

    fn cancel(&self) {
        self.shared.cancelled.store(true, Ordering::Release);
    }

    fn wait(&self, timeout: Option<Duration>) -> bool {
        let mut done = self.shared.done.lock();
        match timeout {
            None => {
                while !*done {
                    self.shared.done_signal.wait(&mut done);
                }
                true
            }
            Some(timeout) => {
                if !*done {
                    let _ = self.shared.done_signal.wait_for(&mut done, timeout);
                }
                *done
            }
        }
    }
}

/// Copy `src` into `dest` block by block, stopping early on cancellation.
fn copy_blocks(src: &[u8], dest: &mut [u8], cancelled: &AtomicBool, delay: Duration) -> bool {
    for (from, to) in src
        .chunks(STREAM_BLOCK_SIZE)
        .zip(dest.chunks_mut(STREAM_BLOCK_SIZE))
    {
        if cancelled.load(Ordering::Acquire) {
            return false;
        }
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        to.copy_from_slice(from);
    }
    !cancelled.load(Ordering::Acquire)
}

/// A payload already held in memory, typically a cooked chunk.
#[derive(Clone)]
pub struct ChunkSource {
    bytes: Arc<[u8]>,
    streaming: bool,
    block_delay: Duration,
}

impl ChunkSource {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
            streaming: true,
            block_delay: Duration::ZERO,
        }
    }

    /// Disable asynchronous streaming; loads always copy synchronously.
    pub fn without_streaming(mut self) -> Self {
        self.streaming = false;
        self
    }

    /// Sleep before every copied block. Simulates slow storage.
    pub fn with_block_delay(mut self, delay: Duration) -> Self {
        self.block_delay = delay;
        self
    }
}

impl StreamingSource for ChunkSource {
    fn len(&self) -> usize {
        self.bytes.len()
    }

    fn can_stream(&self) -> bool {
        self.streaming
    }

    fn read_sync(&self, dest: &mut [u8]) -> std::io::Result<()> {
        dest.copy_from_slice(&self.bytes);
        Ok(())
    }

    fn create_streaming_request(
        &self,
        buffer: PayloadBuffer,
        on_complete: CompletionCallback,
    ) -> Box<dyn StreamingRequest> {
        let bytes = self.bytes.clone();
        let delay = self.block_delay;
        Box::new(ThreadedStreamingRequest::spawn(
            buffer,
            on_complete,
            move |dest, cancelled| Ok(copy_blocks(&bytes, dest, cancelled, delay)),
        ))
    }
}

/// A byte range of a file on disk.
#[derive(Debug, Clone)]
pub struct FileRangeSource {
    path: PathBuf,
    offset: u64,
    len: usize,
}

impl FileRangeSource {
    pub fn new(path: impl Into<PathBuf>, offset: u64, len: usize) -> Self {
        Self {
            path: path.into(),
            offset,
            len,
        }
    }

    fn read_range(
        path: &std::path::Path,
        offset: u64,
        dest: &mut [u8],
        cancelled: Option<&AtomicBool>,
    ) -> std::io::Result<bool> {
        let mut file = std::fs::File::open(path)?;
        file.seek(SeekFrom::Start(offset))?;

        for block in dest.chunks_mut(STREAM_BLOCK_SIZE) {
            if cancelled.is_some_and(|flag| flag.load(Ordering::Acquire)) {
                return Ok(false);
            }
            file.read_exact(block)?;
        }
        Ok(true)
    }
}

impl StreamingSource for FileRangeSource {
    fn len(&self) -> usize {
        self.len
    }

    fn can_stream(&self) -> bool {
        true
    }

    fn read_sync(&self, dest: &mut [u8]) -> std::io::Result<()> {
        Self::read_range(&self.path, self.offset, dest, None).map(|_| ())
    }

    fn create_streaming_request(
        &self,
        buffer: PayloadBuffer,
        on_complete: CompletionCallback,
    ) -> Box<dyn StreamingRequest> {
        let path = self.path.clone();
        let offset = self.offset;
        Box::new(ThreadedStreamingRequest::spawn(
            buffer,
            on_complete,
            move |dest, cancelled| Self::read_range(&path, offset, dest, Some(cancelled)),
        ))
    }
}
