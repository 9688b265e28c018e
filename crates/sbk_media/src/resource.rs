//! Per-media load state machine.
//!
//! ```text
//! Unloaded --load--> Loading --complete--> Loaded --unload--> Unloaded
//!                       |                                        ^
//!                       +--cancelled/failed--> Error --load------+ (via Loading)
//! ```
//!
//! A [`MediaResource`] exclusively owns its payload buffer and its in-flight
//! streaming request. Completion callbacks only hold a weak reference to the
//! resource and tag their result with a generation number, so a completion
//! that arrives after an unload frees its buffer instead of installing it.

use crate::error::{MediaError, Result};
use crate::future::LoadFuture;
use crate::store::{PayloadBuffer, PayloadStore};
use crate::streaming::{ChunkSource, RequestOutcome, StreamingRequest, StreamingSource};
use parking_lot::Mutex;
use sbk_core::{MediaAssetData, MediaId};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    Loading,
    Loaded,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Stream in the background when the source supports it.
    Async,
    /// Copy synchronously on the calling thread.
    Sync,
}

struct ResourceState {
    load_state: LoadState,
    payload: Option<PayloadBuffer>,
    request: Option<Box<dyn StreamingRequest>>,
    pending: Option<LoadFuture>,
    /// Bumped by every load start and unload. Completions carrying an older
    /// value are stale.
    generation: u64,
}

struct ResourceInner {
    id: MediaId,
    source: Arc<dyn StreamingSource>,
    store: Arc<PayloadStore>,
    use_device_memory: bool,
    state: Mutex<ResourceState>,
}

/// One loadable media payload.
pub struct MediaResource {
    inner: Arc<ResourceInner>,
}

/// Cancel a request that is still running and wait for its completion
/// callback to return.
fn settle(request: &dyn StreamingRequest) {
    if !request.poll() {
        request.cancel();
        request.wait(None);
    }
}

impl MediaResource {
    pub fn new(
        id: MediaId,
        source: Arc<dyn StreamingSource>,
        store: Arc<PayloadStore>,
        use_device_memory: bool,
    ) -> Self {
        Self {
            inner: Arc::new(ResourceInner {
                id,
                source,
                store,
                use_device_memory,
                state: Mutex::new(ResourceState {
                    load_state: LoadState::Unloaded,
                    payload: None,
                    request: None,
                    pending: None,
                    generation: 0,
                }),
            }),
        }
    }

    /// Resource over the resident chunk of cooked media: the prefetch chunk
    /// for streamed media, the full payload otherwise.
    ///
    /// Returns `None` when the media has no chunks, or when it is streamed
    /// without a prefetch chunk (the streaming layer then reads it directly).
    pub fn from_asset_data(
        id: MediaId,
        data: &MediaAssetData,
        store: Arc<PayloadStore>,
    ) -> Option<Self> {
        let chunk = data.resident_chunk()?;
        if data.is_streamed && !chunk.is_prefetch {
            return None;
        }

        let source = Arc::new(ChunkSource::new(chunk.bytes.clone()));
        Some(Self::new(id, source, store, data.use_device_memory))
    }

    pub fn id(&self) -> MediaId {
        self.inner.id
    }

    pub fn state(&self) -> LoadState {
        self.inner.state.lock().load_state
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.state.lock().payload.is_some()
    }

    /// Run `f` over the resident payload, if any.
    pub fn with_payload<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Option<R> {
        let state = self.inner.state.lock();
        state.payload.as_ref().map(|payload| f(payload.as_slice()))
    }

    /// Bring the payload into memory.
    ///
    /// Returns a ready future when the payload is already resident. A call
    /// made while a streaming load is running joins that load instead of
    /// issuing a second request.
    pub fn load(&self, mode: LoadMode) -> LoadFuture {
        let inner = &self.inner;
        let mut state = inner.state.lock();

        loop {
            if state.payload.is_some() {
                return LoadFuture::ready(Ok(()));
            }
            if state.load_state == LoadState::Loading {
                if let Some(pending) = &state.pending {
                    return pending.clone();
                }
            }

            // A finished (or abandoned) request from a previous cycle
            match state.request.take() {
                Some(stale) => {
                    drop(state);
                    settle(stale.as_ref());
                    state = inner.state.lock();
                }
                None => break,
            }
        }

        let len = inner.source.len();
        if len == 0 {
            state.load_state = LoadState::Error;
            return LoadFuture::ready(Err(MediaError::NoPayload(inner.id)));
        }

        let mut buffer = inner.store.allocate(len, inner.use_device_memory);

        if mode == LoadMode::Async && inner.source.can_stream() {
            state.generation += 1;
            let generation = state.generation;
            let future = LoadFuture::pending();
            state.load_state = LoadState::Loading;
            state.pending = Some(future.clone());
            drop(state);

            tracing::debug!("Streaming media {} ({} bytes)", inner.id, len);

            let weak = Arc::downgrade(inner);
            let store = inner.store.clone();
            let request = inner.source.create_streaming_request(
                buffer,
                Box::new(move |outcome| match weak.upgrade() {
                    Some(inner) => inner.finish_stream(generation, outcome),
                    None => store.free(outcome.into_buffer()),
                }),
            );

            let mut state = inner.state.lock();
            if state.generation == generation {
                state.request = Some(request);
            } else {
                // Unloaded before the request could be recorded
                drop(state);
                settle(request.as_ref());
            }
            return future;
        }

        match inner.source.read_sync(buffer.as_mut_slice()) {
            Ok(()) => {
                state.payload = Some(buffer);
                state.load_state = LoadState::Loaded;
                LoadFuture::ready(Ok(()))
            }
            Err(e) => {
                inner.store.free(buffer);
                state.load_state = LoadState::Error;
                tracing::error!("Failed to read media {}: {}", inner.id, e);
                LoadFuture::ready(Err(MediaError::Read {
                    id: inner.id,
                    message: e.to_string(),
                }))
            }
        }
    }

    /// Cancel any in-flight request, wait for it, free the payload.
    ///
    /// Safe to call in any state.
    pub fn unload(&self) {
        self.inner.release_all(false);
    }

    /// `true` once no asynchronous work is pending. Completed requests are
    /// released as a side effect.
    pub fn is_ready_to_finalize(&self) -> bool {
        let mut state = self.inner.state.lock();
        if let Some(request) = &state.request {
            if !request.poll() {
                return false;
            }
            state.request = None;
        }
        state.load_state != LoadState::Loading
    }
}

impl ResourceInner {
    fn finish_stream(&self, generation: u64, outcome: RequestOutcome) {
        let mut state = self.state.lock();
        let current = state.generation == generation && state.load_state == LoadState::Loading;

        let result = match outcome {
            RequestOutcome::Completed(buffer) if current => {
                state.payload = Some(buffer);
                state.load_state = LoadState::Loaded;
                Ok(())
            }
            RequestOutcome::Failed(buffer, message) => {
                self.store.free(buffer);
                Err(MediaError::Read {
                    id: self.id,
                    message,
                })
            }
            RequestOutcome::Completed(buffer) | RequestOutcome::Cancelled(buffer) => {
                self.store.free(buffer);
                Err(MediaError::StreamingCancelled(self.id))
            }
        };

        if !current {
            // Superseded by an unload, which already resolved the waiters
            return;
        }

        if let Err(e) = &result {
            state.load_state = LoadState::Error;
            tracing::error!("{}. Media will be unavailable.", e);
        }

        // The request has delivered; continuations below may unload this
        // resource from the request's own thread and must not wait on it.
        let delivered = state.request.take();
        let pending = state.pending.take();
        drop(state);
        drop(delivered);

        if let Some(pending) = pending {
            pending.complete(result);
        }
    }

    fn release_all(&self, dropping: bool) {
        let (request, payload, pending) = {
            let mut state = self.state.lock();
            state.generation += 1;
            state.load_state = LoadState::Unloaded;
            (
                state.request.take(),
                state.payload.take(),
                state.pending.take(),
            )
        };

        if let Some(request) = request {
            settle(request.as_ref());
        }

        if let Some(payload) = payload {
            if dropping {
                tracing::warn!(
                    "Freeing media {} payload because its resource was dropped",
                    self.id
                );
            }
            self.store.free(payload);
        }

        if let Some(pending) = pending {
            pending.complete(Err(MediaError::StreamingCancelled(self.id)));
        }
    }
}

impl Drop for MediaResource {
    fn drop(&mut self) {
        self.inner.release_all(true);
    }
}

impl std::fmt::Debug for MediaResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaResource")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::PayloadBuffer;
    use crate::streaming::{CompletionCallback, ThreadedStreamingRequest};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn payload() -> Vec<u8> {
        (0..300_000u32).map(|i| (i % 253) as u8).collect()
    }

    /// Wraps a [`ChunkSource`] and counts issued requests.
    struct CountingSource {
        inner: ChunkSource,
        requests: AtomicUsize,
    }

    impl StreamingSource for CountingSource {
        fn len(&self) -> usize {
            self.inner.len()
        }

        fn can_stream(&self) -> bool {
            true
        }

        fn read_sync(&self, dest: &mut [u8]) -> std::io::Result<()> {
            self.inner.read_sync(dest)
        }

        fn create_streaming_request(
            &self,
            buffer: PayloadBuffer,
            on_complete: CompletionCallback,
        ) -> Box<dyn StreamingRequest> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            self.inner.create_streaming_request(buffer, on_complete)
        }
    }

    /// Every request is cancelled by the storage layer.
    struct CancellingSource;

    impl StreamingSource for CancellingSource {
        fn len(&self) -> usize {
            64
        }

        fn can_stream(&self) -> bool {
            true
        }

        fn read_sync(&self, _dest: &mut [u8]) -> std::io::Result<()> {
            Ok(())
        }

        fn create_streaming_request(
            &self,
            buffer: PayloadBuffer,
            on_complete: CompletionCallback,
        ) -> Box<dyn StreamingRequest> {
            Box::new(ThreadedStreamingRequest::spawn(buffer, on_complete, |_, _| {
                Ok(false)
            }))
        }
    }

    fn slow_source() -> Arc<ChunkSource> {
        Arc::new(ChunkSource::new(payload()).with_block_delay(Duration::from_millis(10)))
    }

    #[test]
    fn test_sync_load_and_unload() {
        let store = Arc::new(PayloadStore::new());
        let source = Arc::new(ChunkSource::new(payload()));
        let resource = MediaResource::new(1, source, store.clone(), false);

        assert_eq!(resource.state(), LoadState::Unloaded);
        assert_eq!(resource.load(LoadMode::Sync).wait(), Ok(()));
        assert_eq!(resource.state(), LoadState::Loaded);
        assert_eq!(resource.with_payload(|bytes| bytes.to_vec()), Some(payload()));
        assert_eq!(store.outstanding(), 1);

        resource.unload();
        assert_eq!(resource.state(), LoadState::Unloaded);
        assert_eq!(store.outstanding(), 0);

        // Second unload is a no-op
        resource.unload();
        assert_eq!(store.outstanding(), 0);
    }

    #[test]
    fn test_async_load() {
        let store = Arc::new(PayloadStore::new());
        let resource = MediaResource::new(2, slow_source(), store.clone(), false);

        let future = resource.load(LoadMode::Async);
        assert_eq!(future.wait(), Ok(()));
        assert_eq!(resource.state(), LoadState::Loaded);
        assert!(resource.is_ready_to_finalize());
        assert_eq!(store.outstanding(), 1);

        // Already resident
        assert!(resource.load(LoadMode::Async).is_ready());
    }

    #[test]
    fn test_concurrent_load_issues_one_request() {
        let store = Arc::new(PayloadStore::new());
        let source = Arc::new(CountingSource {
            inner: ChunkSource::new(payload()).with_block_delay(Duration::from_millis(10)),
            requests: AtomicUsize::new(0),
        });
        let resource = Arc::new(MediaResource::new(3, source.clone(), store.clone(), false));

        let first = resource.load(LoadMode::Async);
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let resource = resource.clone();
                std::thread::spawn(move || resource.load(LoadMode::Async).wait())
            })
            .collect();

        assert_eq!(first.wait(), Ok(()));
        for worker in workers {
            assert_eq!(worker.join().unwrap(), Ok(()));
        }

        assert_eq!(source.requests.load(Ordering::SeqCst), 1);
        assert_eq!(store.outstanding(), 1);
    }

    #[test]
    fn test_unload_while_loading_cancels() {
        let store = Arc::new(PayloadStore::new());
        let resource = MediaResource::new(4, slow_source(), store.clone(), false);

        let future = resource.load(LoadMode::Async);
        assert_eq!(resource.state(), LoadState::Loading);
        assert!(!resource.is_ready_to_finalize());

        resource.unload();

        assert_eq!(future.wait(), Err(MediaError::StreamingCancelled(4)));
        assert_eq!(resource.state(), LoadState::Unloaded);
        assert!(resource.is_ready_to_finalize());
        assert_eq!(store.outstanding(), 0);
    }

    #[test]
    fn test_cancelled_request_enters_error() {
        let store = Arc::new(PayloadStore::new());
        let resource = MediaResource::new(5, Arc::new(CancellingSource), store.clone(), false);

        let future = resource.load(LoadMode::Async);
        assert_eq!(future.wait(), Err(MediaError::StreamingCancelled(5)));
        assert_eq!(resource.state(), LoadState::Error);
        assert_eq!(store.outstanding(), 0);

        // A new load is allowed from the error state
        let retry = resource.load(LoadMode::Sync);
        assert_eq!(retry.wait(), Ok(()));
        assert_eq!(resource.state(), LoadState::Loaded);
    }

    #[test]
    fn test_empty_source() {
        let store = Arc::new(PayloadStore::new());
        let source = Arc::new(ChunkSource::new(Vec::new()));
        let resource = MediaResource::new(6, source, store.clone(), false);

        assert_eq!(
            resource.load(LoadMode::Async).wait(),
            Err(MediaError::NoPayload(6))
        );
        assert_eq!(resource.state(), LoadState::Error);
        assert_eq!(store.outstanding(), 0);
    }

    #[test]
    fn test_drop_while_loading_frees_buffer() {
        let store = Arc::new(PayloadStore::new());
        let resource = MediaResource::new(7, slow_source(), store.clone(), false);
        let future = resource.load(LoadMode::Async);

        drop(resource);

        assert_eq!(future.wait(), Err(MediaError::StreamingCancelled(7)));
        assert_eq!(store.outstanding(), 0);
    }

    #[test]
    fn test_from_asset_data() {
        let store = Arc::new(PayloadStore::new());
        let bytes = payload();

        let mut streamed = MediaAssetData {
            is_streamed: true,
            ..Default::default()
        };
        streamed.rebuild_chunks(&bytes, 0, 0);
        assert!(MediaResource::from_asset_data(8, &streamed, store.clone()).is_none());

        streamed.rebuild_chunks(&bytes, 0, 1024);
        let resource = MediaResource::from_asset_data(8, &streamed, store.clone()).unwrap();
        resource.load(LoadMode::Sync).wait().unwrap();
        assert_eq!(resource.with_payload(|b| b.len()), Some(1024));
    }
}
