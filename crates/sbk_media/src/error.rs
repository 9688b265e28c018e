use sbk_core::MediaId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MediaError>;

/// Errors surfaced by the media runtime.
///
/// The type is `Clone` because one load outcome is delivered to every caller
/// waiting on the same [`LoadFuture`](crate::LoadFuture).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    /// The streaming request was cancelled before it delivered the payload.
    #[error("Streaming request for media {0} was cancelled")]
    StreamingCancelled(MediaId),

    /// The source holds no bytes to load.
    #[error("Media {0} has no payload")]
    NoPayload(MediaId),

    /// Reading the payload failed.
    #[error("Failed to read media {id}: {message}")]
    Read { id: MediaId, message: String },

    /// The engine refused to register the payload.
    #[error("Engine rejected media {0}")]
    EngineRejected(MediaId),

    /// The engine refused to load a bank binary.
    #[error("Engine rejected bank")]
    BankRejected,

    /// No sound engine is available to hand payloads to.
    #[error("Sound engine unavailable")]
    EngineUnavailable,
}
