//! Runtime lifecycle of cooked sound bank media.
//!
//! The pieces, leaf first:
//!
//! - [`PayloadStore`] allocates and frees payload buffers, optionally from a
//!   [`DeviceMemoryPool`].
//! - [`StreamingSource`] / [`StreamingRequest`] describe where payload bytes
//!   come from and how an asynchronous read is polled, cancelled and awaited.
//! - [`MediaResource`] is the per-media load state machine. It exclusively
//!   owns its payload buffer and any in-flight request.
//! - [`MediaHandle`] reference-counts a resource for one use site and hands
//!   the payload to the [`SoundEngine`], retrying then forcing the release
//!   when the engine reports the payload as still in use.
//! - [`LoadableSoundData`] loads a bank binary plus every media it lists.
//!
//! # Example
//!
//! ```no_run
//! use sbk_media::{
//!     ChunkSource, LoadMode, MediaHandle, MediaResource, MediaRuntimeConfig, PayloadStore,
//!     SoundEngine,
//! };
//! use std::sync::Arc;
//!
//! fn play(engine: Arc<dyn SoundEngine>, bytes: Vec<u8>) -> sbk_media::Result<()> {
//!     let store = Arc::new(PayloadStore::new());
//!     let source = Arc::new(ChunkSource::new(bytes));
//!     let resource = Arc::new(MediaResource::new(1001, source, store, false));
//!     let handle = MediaHandle::new(resource, engine, &MediaRuntimeConfig::default());
//!
//!     handle.acquire(LoadMode::Async).wait()?;
//!     // ... play ...
//!     handle.release();
//!     Ok(())
//! }
//! ```

pub mod engine;
pub mod error;
pub mod future;
pub mod handle;
pub mod loader;
pub mod resource;
pub mod store;
pub mod streaming;

#[cfg(test)]
pub(crate) mod testing;

pub use engine::{BankId, EngineStatus, SoundEngine};
pub use error::{MediaError, Result};
pub use future::LoadFuture;
pub use handle::{LeakBudget, MediaHandle, MediaRuntimeConfig, ReleaseOutcome};
pub use loader::{LoadableSoundData, LoadedSoundData, MediaLibrary};
pub use resource::{LoadMode, LoadState, MediaResource};
pub use store::{BufferOrigin, DeviceMemoryPool, PayloadBuffer, PayloadStore};
pub use streaming::{
    ChunkSource, CompletionCallback, FileRangeSource, RequestOutcome, StreamingRequest,
    StreamingSource, ThreadedStreamingRequest,
};
