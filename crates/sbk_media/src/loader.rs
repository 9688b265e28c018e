//! Loading cooked sound data: a bank binary plus every media it lists.

use crate::engine::{BankId, EngineStatus, SoundEngine};
use crate::error::{MediaError, Result};
use crate::future::LoadFuture;
use crate::handle::{MediaHandle, MediaRuntimeConfig, ReleaseOutcome};
use crate::resource::{LoadMode, MediaResource};
use crate::store::PayloadStore;
use parking_lot::{Mutex, RwLock};
use sbk_core::{MediaAsset, MediaId, SoundData};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Media handles known to the runtime, keyed by media id.
pub struct MediaLibrary {
    store: Arc<PayloadStore>,
    engine: Arc<dyn SoundEngine>,
    config: MediaRuntimeConfig,
    handles: RwLock<HashMap<MediaId, Arc<MediaHandle>>>,
    /// Media acquired on registration because their asset asked for it.
    pinned: Mutex<BTreeSet<MediaId>>,
}

impl MediaLibrary {
    pub fn new(
        store: Arc<PayloadStore>,
        engine: Arc<dyn SoundEngine>,
        config: MediaRuntimeConfig,
    ) -> Self {
        Self {
            store,
            engine,
            config,
            handles: RwLock::new(HashMap::new()),
            pinned: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn engine(&self) -> &Arc<dyn SoundEngine> {
        &self.engine
    }

    pub fn store(&self) -> &Arc<PayloadStore> {
        &self.store
    }

    pub fn get(&self, id: MediaId) -> Option<Arc<MediaHandle>> {
        self.handles.read().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.handles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.read().is_empty()
    }

    /// Wrap `resource` in a handle. An existing handle for the same id is
    /// kept and returned instead.
    pub fn register_resource(&self, resource: MediaResource) -> Arc<MediaHandle> {
        let mut handles = self.handles.write();
        handles
            .entry(resource.id())
            .or_insert_with(|| {
                MediaHandle::new(Arc::new(resource), self.engine.clone(), &self.config)
            })
            .clone()
    }

    /// Register the cooked media of `asset` for `platform`.
    ///
    /// Media flagged for auto-loading is acquired right away and stays pinned
    /// until [`release_pinned`](Self::release_pinned). The returned future
    /// tracks that load, if one was started.
    pub fn register_asset(
        &self,
        asset: &MediaAsset,
        platform: &str,
        mode: LoadMode,
    ) -> Option<(Arc<MediaHandle>, Option<LoadFuture>)> {
        let Some(data) = asset.platform_data.get(platform) else {
            tracing::debug!("Media {} has no data for platform {}", asset.id, platform);
            return None;
        };

        let resource = MediaResource::from_asset_data(asset.id, data, self.store.clone())?;
        let handle = self.register_resource(resource);

        if !data.needs_auto_loading(asset.auto_load) || !self.pinned.lock().insert(asset.id) {
            return Some((handle, None));
        }

        let future = handle.acquire(mode);
        Some((handle, Some(future)))
    }

    /// Release every media pinned by [`register_asset`](Self::register_asset).
    pub fn release_pinned(&self) {
        let pinned = std::mem::take(&mut *self.pinned.lock());
        for id in pinned {
            if let Some(handle) = self.get(id) {
                handle.release();
            }
        }
    }
}

/// Result of [`LoadableSoundData::load_data`].
#[derive(Debug, Default)]
pub struct LoadedSoundData {
    pub bank: Option<BankId>,
    /// Handles acquired for this data, with the load each one is waiting on.
    media: Vec<(Arc<MediaHandle>, LoadFuture)>,
}

impl LoadedSoundData {
    pub fn media(&self) -> impl Iterator<Item = &Arc<MediaHandle>> {
        self.media.iter().map(|(handle, _)| handle)
    }

    pub fn is_ready(&self) -> bool {
        self.media.iter().all(|(_, future)| future.is_ready())
    }

    /// Block until every media load finished. Returns the first failure.
    pub fn wait(&self) -> Result<()> {
        let mut first_error = None;
        for (_, future) in &self.media {
            if let Err(e) = future.wait() {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Release acquired media and unload the bank.
    ///
    /// Loads still in flight are awaited first so that only references that
    /// were actually taken are given back.
    pub fn unload(self, engine: &dyn SoundEngine) -> Vec<ReleaseOutcome> {
        let outcomes = self
            .media
            .into_iter()
            .filter_map(|(handle, future)| future.wait().ok().map(|_| handle.release()))
            .collect();

        if let Some(bank) = self.bank {
            if engine.unload_bank(bank) != EngineStatus::Ok {
                tracing::warn!("Failed unloading bank {}", bank);
            }
        }

        outcomes
    }
}

/// Load and unload capability of anything that owns a bank binary and a
/// media list.
pub trait LoadableSoundData: SoundData {
    fn load_data(&self, library: &MediaLibrary, mode: LoadMode) -> Result<LoadedSoundData> {
        let engine = library.engine();
        if !engine.is_available() {
            return Err(MediaError::EngineUnavailable);
        }

        let payload = self.bank_payload();
        let bank = if payload.bytes.is_empty() {
            None
        } else {
            match engine.load_bank(&payload.bytes) {
                Ok(bank) => Some(bank),
                Err(status) => {
                    tracing::warn!("Loading {} bank failed: {:?}", self.kind(), status);
                    return Err(MediaError::BankRejected);
                }
            }
        };

        let mut media = Vec::new();
        for id in self.media_list() {
            match library.get(id) {
                Some(handle) => {
                    let future = handle.acquire(mode);
                    media.push((handle, future));
                }
                None => tracing::warn!("Media {} used by {} is not registered", id, self.kind()),
            }
        }

        tracing::debug!("Loaded {} with {} media", self.kind(), media.len());
        Ok(LoadedSoundData { bank, media })
    }

    fn unload_data(&self, library: &MediaLibrary, loaded: LoadedSoundData) -> Vec<ReleaseOutcome> {
        loaded.unload(library.engine().as_ref())
    }
}

impl<T: SoundData + ?Sized> LoadableSoundData for T {}
