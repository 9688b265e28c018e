//! Boundary to the sound engine that consumes payloads.

use sbk_core::MediaId;

/// Engine-side identifier of a loaded bank.
pub type BankId = u32;

/// Result of an engine call that may be refused transiently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    Ok,
    /// The payload is still in use; try again after a [`SoundEngine::tick`].
    Busy,
    Failed,
}

/// The sound engine as seen by the media runtime.
///
/// Implementations must be callable from any thread: payload registration
/// happens on whichever thread completes a streaming read.
pub trait SoundEngine: Send + Sync {
    /// `false` once the engine has shut down. Handles then drop their
    /// payloads without talking to the engine.
    fn is_available(&self) -> bool {
        true
    }

    fn register_payload(&self, id: MediaId, bytes: &[u8]) -> EngineStatus;

    fn unregister_payload(&self, id: MediaId, bytes: &[u8]) -> EngineStatus;

    /// Unregister unconditionally, even if voices still reference the payload.
    fn force_unregister_payload(&self, id: MediaId, bytes: &[u8]);

    /// Pump the engine so that busy payloads may become free.
    fn tick(&self);

    fn load_bank(&self, bytes: &[u8]) -> std::result::Result<BankId, EngineStatus>;

    fn unload_bank(&self, bank: BankId) -> EngineStatus;
}
