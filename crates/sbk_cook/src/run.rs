//! State shared by every stage of one build invocation.

use crate::catalog::AssetKey;
use crate::error::ParseError;
use crate::planner::CookPlanner;
use camino::{Utf8Path, Utf8PathBuf};
use parking_lot::Mutex;
use sbk_core::MediaId;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// A media set collected this build: owner object, platform and language
/// (empty for the shared set).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OwnerSlot {
    pub key: AssetKey,
    pub platform: String,
    pub language: String,
}

/// One build run.
///
/// Parse stages of different platforms run concurrently and all of them
/// write here, so every table has its own lock.
#[derive(Default)]
pub struct BuildRun {
    planner: CookPlanner,
    /// Media id to asset path. An id keeps the first path it was registered
    /// with.
    media_paths: Mutex<HashMap<MediaId, Utf8PathBuf>>,
    /// Marks collected while the run is in progress.
    pending_dirty: Mutex<BTreeSet<AssetKey>>,
    /// Marks flushed by finalize.
    dirty: Mutex<BTreeSet<AssetKey>>,
    /// Media gated by each resolved group value.
    group_media: Mutex<BTreeMap<AssetKey, BTreeSet<MediaId>>>,
    /// Media under switch values that could not be resolved.
    fallback_media: Mutex<BTreeSet<MediaId>>,
    owners: Mutex<BTreeSet<OwnerSlot>>,
    diagnostics: Mutex<Vec<ParseError>>,
}

impl BuildRun {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn planner(&self) -> &CookPlanner {
        &self.planner
    }

    /// Register the asset path of a media id. Returns `false` when the id was
    /// already registered; the first path is kept.
    pub fn register_media_path(&self, id: MediaId, path: &Utf8Path) -> bool {
        let mut paths = self.media_paths.lock();
        if paths.contains_key(&id) {
            return false;
        }
        paths.insert(id, path.to_path_buf());
        true
    }

    pub fn media_path(&self, id: MediaId) -> Option<Utf8PathBuf> {
        self.media_paths.lock().get(&id).cloned()
    }

    pub fn is_media_registered(&self, id: MediaId) -> bool {
        self.media_paths.lock().contains_key(&id)
    }

    pub fn mark_dirty(&self, key: AssetKey) {
        self.pending_dirty.lock().insert(key);
    }

    /// Move every pending mark into the dirty set. Returns how many were new.
    pub fn flush_dirty(&self) -> usize {
        let pending = std::mem::take(&mut *self.pending_dirty.lock());
        let mut dirty = self.dirty.lock();
        pending.into_iter().filter(|key| dirty.insert(key.clone())).count()
    }

    /// Everything dirtied so far, sorted.
    pub fn dirtied(&self) -> Vec<AssetKey> {
        self.dirty.lock().iter().cloned().collect()
    }

    pub fn is_dirty(&self, key: &AssetKey) -> bool {
        self.dirty.lock().contains(key) || self.pending_dirty.lock().contains(key)
    }

    pub fn add_group_media(&self, group_value: AssetKey, ids: impl IntoIterator<Item = MediaId>) {
        self.group_media
            .lock()
            .entry(group_value)
            .or_default()
            .extend(ids);
    }

    pub fn take_group_media(&self) -> BTreeMap<AssetKey, BTreeSet<MediaId>> {
        std::mem::take(&mut *self.group_media.lock())
    }

    pub fn add_fallback_media(&self, ids: impl IntoIterator<Item = MediaId>) {
        self.fallback_media.lock().extend(ids);
    }

    pub fn fallback_media(&self) -> BTreeSet<MediaId> {
        self.fallback_media.lock().clone()
    }

    /// Remember a media set to finalize. Returns `true` the first time a slot
    /// is seen, which is when its pending list must be reset.
    pub fn track_owner(&self, slot: OwnerSlot) -> bool {
        self.owners.lock().insert(slot)
    }

    pub fn owners(&self) -> Vec<OwnerSlot> {
        self.owners.lock().iter().cloned().collect()
    }

    pub fn report(&self, error: ParseError) {
        tracing::warn!("Skipping entry: {}", error);
        self.diagnostics.lock().push(error);
    }

    pub fn diagnostics(&self) -> Vec<ParseError> {
        self.diagnostics.lock().clone()
    }
}
