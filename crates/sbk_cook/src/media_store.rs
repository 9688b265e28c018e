//! On-disk store of cooked media assets.
//!
//! Each media id maps to one [`MediaAssetCell`]: the asset file location and
//! the loaded asset behind its own lock. Fetching happens on one thread; cook
//! workers then only touch the cell they were given.

use crate::error::Result;
use crate::planner::MediaRecord;
use camino::{Utf8Path, Utf8PathBuf};
use parking_lot::{Mutex, MutexGuard};
use sbk_core::hash::media_set_fingerprint;
use sbk_core::{MediaAsset, MediaId};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// A loaded media asset and where it is saved.
pub struct MediaAssetCell {
    path: Utf8PathBuf,
    asset: Mutex<MediaAsset>,
}

impl MediaAssetCell {
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn lock(&self) -> MutexGuard<'_, MediaAsset> {
        self.asset.lock()
    }
}

/// Media assets under an output directory.
pub struct DiskMediaAssetStore {
    root: Utf8PathBuf,
    cells: Mutex<HashMap<MediaId, Arc<MediaAssetCell>>>,
    dirty: Mutex<BTreeSet<MediaId>>,
}

impl DiskMediaAssetStore {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            root: root.into(),
            cells: Mutex::new(HashMap::new()),
            dirty: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Find or create the asset of `record`.
    ///
    /// An asset already fetched this run is returned as is. Otherwise the
    /// asset file is loaded, or a new asset is created when there is none.
    pub fn fetch(&self, record: &MediaRecord) -> Result<Arc<MediaAssetCell>> {
        if let Some(cell) = self.cells.lock().get(&record.id) {
            return Ok(cell.clone());
        }

        let path = self.root.join(&record.asset_path);
        let asset = match MediaAsset::load(&path)? {
            Some(asset) => asset,
            None => {
                tracing::debug!("Creating media asset {} at {}", record.id, path);
                MediaAsset::new(record.id)
            }
        };

        let cell = Arc::new(MediaAssetCell {
            path,
            asset: Mutex::new(asset),
        });
        Ok(self
            .cells
            .lock()
            .entry(record.id)
            .or_insert(cell)
            .clone())
    }

    /// The cell of an asset fetched this run.
    pub fn get(&self, id: MediaId) -> Option<Arc<MediaAssetCell>> {
        self.cells.lock().get(&id).cloned()
    }

    /// Number of assets fetched this run.
    pub fn len(&self) -> usize {
        self.cells.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.lock().is_empty()
    }

    /// Fingerprint of the content hash of every platform entry of every
    /// fetched asset.
    pub fn fingerprint(&self) -> u64 {
        let cells: Vec<_> = self.cells.lock().values().cloned().collect();
        let entries = cells.iter().flat_map(|cell| {
            let asset = cell.lock();
            let hashes: Vec<_> = asset
                .platform_data
                .values()
                .map(|data| (asset.id, data.content_hash))
                .collect();
            hashes
        });
        media_set_fingerprint(entries)
    }

    pub fn mark_dirty(&self, id: MediaId) {
        self.dirty.lock().insert(id);
    }

    pub fn dirty_ids(&self) -> Vec<MediaId> {
        self.dirty.lock().iter().copied().collect()
    }

    /// Write every dirty asset. Returns how many were saved.
    pub fn save_dirty(&self) -> Result<usize> {
        let dirty = std::mem::take(&mut *self.dirty.lock());
        let mut saved = 0;

        for id in dirty {
            let Some(cell) = self.get(id) else {
                continue;
            };
            let asset = cell.lock();
            asset.save(cell.path())?;
            saved += 1;
        }

        tracing::info!("Saved {} media assets", saved);
        Ok(saved)
    }

    /// Load a persisted asset without caching it.
    pub fn load(&self, relative: &Utf8Path) -> Result<Option<MediaAsset>> {
        Ok(MediaAsset::load(&self.root.join(relative))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn record(id: MediaId) -> MediaRecord {
        MediaRecord {
            id,
            language: String::new(),
            cache_path: Utf8PathBuf::from(format!("{}.wem", id)),
            display_name: format!("media{}", id),
            asset_path: Utf8PathBuf::from(format!("Media/00/00/{}.media", id)),
            auto_load: true,
            platforms: BTreeMap::new(),
        }
    }

    #[test]
    fn test_fetch_creates_then_reuses() {
        let dir = TempDir::new().unwrap();
        let store = DiskMediaAssetStore::new(Utf8Path::from_path(dir.path()).unwrap());

        let first = store.fetch(&record(7)).unwrap();
        let second = store.fetch(&record(7)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.lock().id, 7);
        assert!(first.path().ends_with("Media/00/00/7.media"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let dir = TempDir::new().unwrap();
        let store = DiskMediaAssetStore::new(Utf8Path::from_path(dir.path()).unwrap());
        assert_eq!(store.fingerprint(), 0);

        let cell = store.fetch(&record(1)).unwrap();
        cell.lock().find_or_add_platform_data("Windows").rebuild_chunks(b"a", 11, 0);
        let first = store.fingerprint();
        assert_ne!(first, 0);

        cell.lock().find_or_add_platform_data("Windows").rebuild_chunks(b"b", 12, 0);
        assert_ne!(store.fingerprint(), first);
    }

    #[test]
    fn test_save_dirty_and_reload() {
        let dir = TempDir::new().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        let store = DiskMediaAssetStore::new(root);

        let cell = store.fetch(&record(9)).unwrap();
        cell.lock().media_name = "Theme".to_string();
        store.mark_dirty(9);
        assert_eq!(store.save_dirty().unwrap(), 1);
        assert!(store.dirty_ids().is_empty());

        let fresh = DiskMediaAssetStore::new(root);
        let loaded = fresh.fetch(&record(9)).unwrap();
        assert_eq!(loaded.lock().media_name, "Theme");
        assert_eq!(
            fresh.load(Utf8Path::new("Media/00/00/9.media")).unwrap().unwrap().media_name,
            "Theme"
        );
    }
}
