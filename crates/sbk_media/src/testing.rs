//! Scripted engine used by the unit tests.

use crate::engine::{BankId, EngineStatus, SoundEngine};
use parking_lot::Mutex;
use sbk_core::MediaId;
use std::collections::{BTreeSet, HashMap};

#[derive(Default)]
struct EngineState {
    registered: BTreeSet<MediaId>,
    /// Remaining `Busy` answers per media before unregistering succeeds.
    busy_for: HashMap<MediaId, u32>,
    always_busy: bool,
    available: bool,
    register_calls: u32,
    unregister_calls: u32,
    force_calls: u32,
    ticks: u32,
    next_bank: BankId,
    banks: BTreeSet<BankId>,
}

pub(crate) struct ScriptedEngine {
    state: Mutex<EngineState>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(EngineState {
                available: true,
                next_bank: 1,
                ..Default::default()
            }),
        }
    }

    /// Answer `Busy` for the next `attempts` unregister calls of `id`.
    pub fn busy_for(&self, id: MediaId, attempts: u32) {
        self.state.lock().busy_for.insert(id, attempts);
    }

    pub fn set_always_busy(&self, busy: bool) {
        self.state.lock().always_busy = busy;
    }

    pub fn set_available(&self, available: bool) {
        self.state.lock().available = available;
    }

    pub fn is_registered(&self, id: MediaId) -> bool {
        self.state.lock().registered.contains(&id)
    }

    pub fn register_calls(&self) -> u32 {
        self.state.lock().register_calls
    }

    pub fn unregister_calls(&self) -> u32 {
        self.state.lock().unregister_calls
    }

    pub fn force_calls(&self) -> u32 {
        self.state.lock().force_calls
    }

    pub fn ticks(&self) -> u32 {
        self.state.lock().ticks
    }

    pub fn loaded_banks(&self) -> usize {
        self.state.lock().banks.len()
    }
}

impl SoundEngine for ScriptedEngine {
    fn is_available(&self) -> bool {
        self.state.lock().available
    }

    fn register_payload(&self, id: MediaId, bytes: &[u8]) -> EngineStatus {
        let mut state = self.state.lock();
        state.register_calls += 1;
        if bytes.is_empty() {
            return EngineStatus::Failed;
        }
        state.registered.insert(id);
        EngineStatus::Ok
    }

    fn unregister_payload(&self, id: MediaId, _bytes: &[u8]) -> EngineStatus {
        let mut state = self.state.lock();
        state.unregister_calls += 1;

        if state.always_busy {
            return EngineStatus::Busy;
        }
        if let Some(remaining) = state.busy_for.get_mut(&id) {
            if *remaining > 0 {
                *remaining -= 1;
                return EngineStatus::Busy;
            }
        }

        state.registered.remove(&id);
        EngineStatus::Ok
    }

    fn force_unregister_payload(&self, id: MediaId, _bytes: &[u8]) {
        let mut state = self.state.lock();
        state.force_calls += 1;
        state.registered.remove(&id);
    }

    fn tick(&self) {
        self.state.lock().ticks += 1;
    }

    fn load_bank(&self, bytes: &[u8]) -> Result<BankId, EngineStatus> {
        let mut state = self.state.lock();
        if bytes.is_empty() {
            return Err(EngineStatus::Failed);
        }
        let id = state.next_bank;
        state.next_bank += 1;
        state.banks.insert(id);
        Ok(id)
    }

    fn unload_bank(&self, bank: BankId) -> EngineStatus {
        if self.state.lock().banks.remove(&bank) {
            EngineStatus::Ok
        } else {
            EngineStatus::Failed
        }
    }
}
