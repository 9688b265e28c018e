//! Reference-counted use of a media payload by the sound engine.
//!
//! A [`MediaHandle`] registers the payload of its [`MediaResource`] with the
//! engine on first acquire and unregisters it when the last user releases.
//! The engine may report a payload as busy while voices still read it; the
//! handle then retries, pumping the engine between attempts, until its
//! [`LeakBudget`] runs out and the release is forced.
//!
//! The payload is never freed while it is registered: every path that frees
//! it first clears the registration.

use crate::engine::{EngineStatus, SoundEngine};
use crate::error::{MediaError, Result};
use crate::future::LoadFuture;
use crate::resource::{LoadMode, MediaResource};
use parking_lot::Mutex;
use sbk_core::MediaId;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Runtime tuning for media handles.
#[derive(Debug, Clone)]
pub struct MediaRuntimeConfig {
    /// Retries allowed before a busy payload is force-released.
    pub leak_budget: u32,
    /// Sleep between retries.
    pub retry_interval: Duration,
}

impl Default for MediaRuntimeConfig {
    fn default() -> Self {
        Self {
            leak_budget: 100,
            retry_interval: Duration::from_millis(10),
        }
    }
}

/// Countdown of release retries. Reset to its initial value after every
/// completed release, forced or not.
///
/// Each handle gets its own budget by default. Passing one `Arc<LeakBudget>`
/// to several handles makes them draw from a common pool.
#[derive(Debug)]
pub struct LeakBudget {
    initial: u32,
    remaining: AtomicU32,
}

impl LeakBudget {
    pub fn new(initial: u32) -> Self {
        Self {
            initial,
            remaining: AtomicU32::new(initial),
        }
    }

    pub fn initial(&self) -> u32 {
        self.initial
    }

    pub fn remaining(&self) -> u32 {
        self.remaining.load(Ordering::Acquire)
    }

    /// Take one retry. Returns `false` when the budget is exhausted.
    fn consume(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |left| left.checked_sub(1))
            .is_ok()
    }

    fn reset(&self) {
        self.remaining.store(self.initial, Ordering::Release);
    }
}

/// What [`MediaHandle::release`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The handle was not held.
    NotHeld,
    /// Other users still hold the payload.
    StillHeld,
    Released,
    /// The engine was busy and released the payload after `attempts` retries.
    ReleasedAfterRetry { attempts: u32 },
    /// The leak budget ran out and the payload was unregistered by force.
    ForcedRelease,
}

#[derive(Debug, Default)]
struct HandleState {
    ref_count: u32,
    registered: bool,
}

pub struct MediaHandle {
    resource: Arc<MediaResource>,
    engine: Arc<dyn SoundEngine>,
    budget: Arc<LeakBudget>,
    retry_interval: Duration,
    state: Mutex<HandleState>,
}

impl MediaHandle {
    pub fn new(
        resource: Arc<MediaResource>,
        engine: Arc<dyn SoundEngine>,
        config: &MediaRuntimeConfig,
    ) -> Arc<Self> {
        Self::with_shared_budget(
            resource,
            engine,
            Arc::new(LeakBudget::new(config.leak_budget)),
            config.retry_interval,
        )
    }

    pub fn with_shared_budget(
        resource: Arc<MediaResource>,
        engine: Arc<dyn SoundEngine>,
        budget: Arc<LeakBudget>,
        retry_interval: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            resource,
            engine,
            budget,
            retry_interval,
            state: Mutex::new(HandleState::default()),
        })
    }

    pub fn id(&self) -> MediaId {
        self.resource.id()
    }

    pub fn resource(&self) -> &Arc<MediaResource> {
        &self.resource
    }

    pub fn budget(&self) -> &Arc<LeakBudget> {
        &self.budget
    }

    pub fn ref_count(&self) -> u32 {
        self.state.lock().ref_count
    }

    pub fn is_registered(&self) -> bool {
        self.state.lock().registered
    }

    /// Take a reference, loading and registering the payload if needed.
    ///
    /// The returned future resolves once the reference is held. A failed
    /// load leaves the reference count and registration untouched.
    pub fn acquire(self: &Arc<Self>, mode: LoadMode) -> LoadFuture {
        {
            let mut state = self.state.lock();
            if state.registered {
                state.ref_count += 1;
                return LoadFuture::ready(Ok(()));
            }
        }

        if !self.engine.is_available() {
            return LoadFuture::from(MediaError::EngineUnavailable);
        }

        let acquired = LoadFuture::pending();
        let completion = acquired.clone();
        let handle = Arc::clone(self);

        self.resource.load(mode).on_complete(move |result| {
            let result = match result {
                Ok(()) => handle.finish_acquire(),
                Err(e) => Err(e.clone()),
            };
            completion.complete(result);
        });

        acquired
    }

    fn finish_acquire(&self) -> Result<()> {
        let id = self.id();
        let mut state = self.state.lock();

        if !state.registered {
            let status = self
                .resource
                .with_payload(|bytes| self.engine.register_payload(id, bytes));

            match status {
                Some(EngineStatus::Ok) => state.registered = true,
                // Unloaded between completion and registration
                None => return Err(MediaError::StreamingCancelled(id)),
                Some(status) => {
                    tracing::warn!("Registering media {} failed: {:?}", id, status);
                    if state.ref_count == 0 {
                        self.resource.unload();
                    }
                    return Err(MediaError::EngineRejected(id));
                }
            }
        }

        state.ref_count += 1;
        Ok(())
    }

    /// Drop a reference. The last release unregisters the payload and
    /// unloads the resource.
    ///
    /// While the engine reports the payload busy, the state lock is released
    /// between retries so `acquire` and the accessors stay responsive. An
    /// acquire during that window cancels the release, which then returns
    /// [`ReleaseOutcome::StillHeld`].
    pub fn release(&self) -> ReleaseOutcome {
        let id = self.id();
        let mut state = self.state.lock();

        if state.ref_count == 0 {
            return ReleaseOutcome::NotHeld;
        }

        state.ref_count -= 1;
        if state.ref_count > 0 {
            return ReleaseOutcome::StillHeld;
        }

        if !state.registered || !self.engine.is_available() {
            if state.registered {
                tracing::warn!("Failed unloading media {}: engine unavailable. Resetting.", id);
            }
            self.reset(&mut state);
            return ReleaseOutcome::Released;
        }

        if self.try_unregister() != EngineStatus::Busy {
            self.reset(&mut state);
            return ReleaseOutcome::Released;
        }

        tracing::warn!("Failed unloading media {}. Trying waiting.", id);
        drop(state);

        let mut attempts = 0;
        while self.budget.consume() {
            std::thread::sleep(self.retry_interval);
            self.engine.tick();
            attempts += 1;

            let mut state = self.state.lock();
            if let Some(outcome) = self.settled_while_waiting(&state) {
                return outcome;
            }
            if self.try_unregister() != EngineStatus::Busy {
                self.reset(&mut state);
                return ReleaseOutcome::ReleasedAfterRetry { attempts };
            }
        }

        let mut state = self.state.lock();
        if let Some(outcome) = self.settled_while_waiting(&state) {
            return outcome;
        }
        self.force_unregister(attempts);
        self.reset(&mut state);
        ReleaseOutcome::ForcedRelease
    }

    /// Checks made after re-taking the lock in the release retry loop: another
    /// thread may have re-acquired the payload or finished the teardown.
    fn settled_while_waiting(&self, state: &HandleState) -> Option<ReleaseOutcome> {
        if !state.registered {
            return Some(ReleaseOutcome::Released);
        }
        if state.ref_count > 0 {
            tracing::debug!("Media {} re-acquired while releasing", self.id());
            self.budget.reset();
            return Some(ReleaseOutcome::StillHeld);
        }
        None
    }

    /// `true` once the payload is no longer registered with the engine.
    pub fn is_ready_for_destroy(&self) -> bool {
        !self.state.lock().registered
    }

    /// One non-blocking teardown step, for owners that poll destruction.
    ///
    /// Tries to unregister; on a busy engine consumes one unit of budget and
    /// pumps the engine. Once the budget is spent the next busy answer forces
    /// the release, so a full teardown makes the same `initial` retries as
    /// [`release`](Self::release).
    /// Returns [`is_ready_for_destroy`](Self::is_ready_for_destroy).
    pub fn poll_destroy(&self) -> bool {
        let mut state = self.state.lock();
        if !state.registered {
            return true;
        }

        if !self.engine.is_available() || self.try_unregister() != EngineStatus::Busy {
            self.reset(&mut state);
            return true;
        }

        if !self.budget.consume() {
            self.force_unregister(self.budget.initial());
            self.reset(&mut state);
            return true;
        }

        self.engine.tick();
        false
    }

    fn try_unregister(&self) -> EngineStatus {
        let id = self.id();
        self.resource
            .with_payload(|bytes| self.engine.unregister_payload(id, bytes))
            .unwrap_or(EngineStatus::Ok)
    }

    fn force_unregister(&self, attempts: u32) {
        let id = self.id();
        tracing::warn!(
            "Media {} still in use after {} retries, forcing release (leak)",
            id,
            attempts
        );
        self.resource
            .with_payload(|bytes| self.engine.force_unregister_payload(id, bytes));
    }

    /// Clear registration, free the payload and refill the budget.
    fn reset(&self, state: &mut HandleState) {
        state.registered = false;
        state.ref_count = 0;
        self.resource.unload();
        self.budget.reset();
    }
}

impl std::fmt::Debug for MediaHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaHandle")
            .field("id", &self.id())
            .field("ref_count", &self.ref_count())
            .field("registered", &self.is_registered())
            .finish()
    }
}

impl Drop for MediaHandle {
    fn drop(&mut self) {
        if !self.is_registered() {
            return;
        }

        tracing::warn!("Media {} handle dropped while registered", self.id());
        while !self.poll_destroy() {
            std::thread::sleep(self.retry_interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::LoadState;
    use crate::store::PayloadStore;
    use crate::streaming::ChunkSource;
    use crate::testing::ScriptedEngine;
    use proptest::prelude::*;

    const ID: MediaId = 1001;

    fn fast_config(budget: u32) -> MediaRuntimeConfig {
        MediaRuntimeConfig {
            leak_budget: budget,
            retry_interval: Duration::ZERO,
        }
    }

    fn setup(budget: u32) -> (Arc<MediaHandle>, Arc<ScriptedEngine>, Arc<PayloadStore>) {
        let store = Arc::new(PayloadStore::new());
        let source = Arc::new(ChunkSource::new(vec![7u8; 4096]));
        let resource = Arc::new(MediaResource::new(ID, source, store.clone(), false));
        let engine = Arc::new(ScriptedEngine::new());
        let handle = MediaHandle::new(resource, engine.clone(), &fast_config(budget));
        (handle, engine, store)
    }

    #[test]
    fn test_acquire_registers_once() {
        let (handle, engine, _store) = setup(3);

        handle.acquire(LoadMode::Sync).wait().unwrap();
        handle.acquire(LoadMode::Sync).wait().unwrap();

        assert_eq!(handle.ref_count(), 2);
        assert!(handle.is_registered());
        assert!(engine.is_registered(ID));
        assert_eq!(engine.register_calls(), 1);
    }

    #[test]
    fn test_concurrent_async_acquires() {
        let (handle, engine, _store) = setup(3);

        let first = handle.acquire(LoadMode::Async);
        let second = handle.acquire(LoadMode::Async);
        first.wait().unwrap();
        second.wait().unwrap();

        assert_eq!(handle.ref_count(), 2);
        assert_eq!(engine.register_calls(), 1);
    }

    #[test]
    fn test_release_sequence() {
        let (handle, engine, store) = setup(3);
        handle.acquire(LoadMode::Sync).wait().unwrap();
        handle.acquire(LoadMode::Sync).wait().unwrap();

        assert_eq!(handle.release(), ReleaseOutcome::StillHeld);
        assert!(engine.is_registered(ID));

        assert_eq!(handle.release(), ReleaseOutcome::Released);
        assert!(!engine.is_registered(ID));
        assert!(handle.is_ready_for_destroy());
        assert_eq!(handle.resource().state(), LoadState::Unloaded);
        assert_eq!(store.outstanding(), 0);

        assert_eq!(handle.release(), ReleaseOutcome::NotHeld);
    }

    #[test]
    fn test_release_retries_until_free() {
        let (handle, engine, _store) = setup(5);
        handle.acquire(LoadMode::Sync).wait().unwrap();
        engine.busy_for(ID, 2);

        assert_eq!(
            handle.release(),
            ReleaseOutcome::ReleasedAfterRetry { attempts: 2 }
        );
        assert_eq!(engine.ticks(), 2);
        assert_eq!(engine.force_calls(), 0);
        assert_eq!(handle.budget().remaining(), 5);
    }

    #[test]
    fn test_forced_release_after_budget() {
        let (handle, engine, store) = setup(3);
        handle.acquire(LoadMode::Sync).wait().unwrap();
        engine.set_always_busy(true);

        assert_eq!(handle.release(), ReleaseOutcome::ForcedRelease);
        assert_eq!(engine.force_calls(), 1);
        assert_eq!(engine.unregister_calls(), 4);
        assert_eq!(engine.ticks(), 3);
        assert!(!handle.is_registered());
        assert!(!engine.is_registered(ID));
        assert_eq!(handle.budget().remaining(), 3);
        assert_eq!(store.outstanding(), 0);

        // The budget is whole again for the next cycle
        handle.acquire(LoadMode::Sync).wait().unwrap();
        assert_eq!(handle.release(), ReleaseOutcome::ForcedRelease);
        assert_eq!(engine.force_calls(), 2);
    }

    #[test]
    fn test_poll_destroy_forces_at_zero() {
        let (handle, engine, _store) = setup(3);
        handle.acquire(LoadMode::Sync).wait().unwrap();
        engine.set_always_busy(true);

        assert!(!handle.poll_destroy());
        assert!(!handle.poll_destroy());
        assert!(!handle.poll_destroy());
        assert!(handle.poll_destroy());
        assert_eq!(engine.force_calls(), 1);
        assert_eq!(engine.unregister_calls(), 4);
        assert_eq!(engine.ticks(), 3);
        assert_eq!(handle.ref_count(), 0);
        assert!(!engine.is_registered(ID));
        assert_eq!(handle.budget().remaining(), 3);
    }

    #[test]
    fn test_poll_destroy_matches_release_retries() {
        let (released, release_engine, _) = setup(3);
        released.acquire(LoadMode::Sync).wait().unwrap();
        release_engine.set_always_busy(true);
        assert_eq!(released.release(), ReleaseOutcome::ForcedRelease);

        let (polled, poll_engine, _) = setup(3);
        polled.acquire(LoadMode::Sync).wait().unwrap();
        poll_engine.set_always_busy(true);
        while !polled.poll_destroy() {}

        assert_eq!(poll_engine.ticks(), release_engine.ticks());
        assert_eq!(poll_engine.unregister_calls(), release_engine.unregister_calls());
        assert_eq!(poll_engine.force_calls(), release_engine.force_calls());
    }

    #[test]
    fn test_acquire_during_release_retry() {
        let store = Arc::new(PayloadStore::new());
        let source = Arc::new(ChunkSource::new(vec![7u8; 64]));
        let resource = Arc::new(MediaResource::new(ID, source, store, false));
        let engine = Arc::new(ScriptedEngine::new());
        let config = MediaRuntimeConfig {
            leak_budget: 200,
            retry_interval: Duration::from_millis(5),
        };
        let handle = MediaHandle::new(resource, engine.clone(), &config);
        handle.acquire(LoadMode::Sync).wait().unwrap();
        engine.set_always_busy(true);

        let releasing = {
            let handle = handle.clone();
            std::thread::spawn(move || handle.release())
        };
        while engine.unregister_calls() == 0 {
            std::thread::yield_now();
        }

        // Not blocked behind the retry loop
        assert_eq!(handle.ref_count(), 0);
        handle.acquire(LoadMode::Sync).wait().unwrap();

        assert_eq!(releasing.join().unwrap(), ReleaseOutcome::StillHeld);
        assert_eq!(handle.ref_count(), 1);
        assert!(handle.is_registered());
        assert!(engine.is_registered(ID));
        assert_eq!(engine.force_calls(), 0);
        assert_eq!(handle.budget().remaining(), 200);

        engine.set_always_busy(false);
        assert_eq!(handle.release(), ReleaseOutcome::Released);
        assert!(!engine.is_registered(ID));
    }

    #[test]
    fn test_engine_unavailable() {
        let (handle, engine, _store) = setup(3);
        engine.set_available(false);

        assert_eq!(
            handle.acquire(LoadMode::Sync).wait(),
            Err(MediaError::EngineUnavailable)
        );
        assert_eq!(handle.ref_count(), 0);
    }

    #[test]
    fn test_failed_load_leaves_counts() {
        let store = Arc::new(PayloadStore::new());
        let source = Arc::new(ChunkSource::new(Vec::new()));
        let resource = Arc::new(MediaResource::new(ID, source, store, false));
        let engine = Arc::new(ScriptedEngine::new());
        let handle = MediaHandle::new(resource, engine.clone(), &fast_config(1));

        assert_eq!(
            handle.acquire(LoadMode::Async).wait(),
            Err(MediaError::NoPayload(ID))
        );
        assert_eq!(handle.ref_count(), 0);
        assert!(!handle.is_registered());
        assert_eq!(engine.register_calls(), 0);
    }

    #[test]
    fn test_shared_budget() {
        let store = Arc::new(PayloadStore::new());
        let engine = Arc::new(ScriptedEngine::new());
        let budget = Arc::new(LeakBudget::new(4));

        let handles: Vec<_> = (0..2)
            .map(|i| {
                let source = Arc::new(ChunkSource::new(vec![1u8; 16]));
                let resource = Arc::new(MediaResource::new(i, source, store.clone(), false));
                MediaHandle::with_shared_budget(
                    resource,
                    engine.clone(),
                    budget.clone(),
                    Duration::ZERO,
                )
            })
            .collect();

        assert!(Arc::ptr_eq(handles[0].budget(), handles[1].budget()));
        for handle in &handles {
            handle.acquire(LoadMode::Sync).wait().unwrap();
        }

        engine.busy_for(0, 1);
        assert_eq!(
            handles[0].release(),
            ReleaseOutcome::ReleasedAfterRetry { attempts: 1 }
        );
        assert_eq!(budget.remaining(), 4);
        assert_eq!(handles[1].release(), ReleaseOutcome::Released);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Acquire,
        Release,
        Busy(u32),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => Just(Op::Acquire),
            3 => Just(Op::Release),
            1 => (0u32..6).prop_map(Op::Busy),
        ]
    }

    proptest! {
        #[test]
        fn prop_registered_iff_referenced(ops in prop::collection::vec(op(), 1..40)) {
            let (handle, engine, store) = setup(3);

            for op in ops {
                match op {
                    Op::Acquire => {
                        handle.acquire(LoadMode::Sync).wait().unwrap();
                    }
                    Op::Release => {
                        handle.release();
                    }
                    Op::Busy(attempts) => engine.busy_for(ID, attempts),
                }

                let held = handle.ref_count() > 0;
                prop_assert_eq!(handle.is_registered(), held);
                prop_assert_eq!(engine.is_registered(ID), held);
                prop_assert_eq!(handle.resource().is_loaded(), held);
                prop_assert_eq!(store.outstanding(), usize::from(held));
                if !held {
                    prop_assert_eq!(handle.budget().remaining(), 3);
                }
            }
        }
    }
}
