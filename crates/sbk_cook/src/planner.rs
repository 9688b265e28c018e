//! The per-build table of media to cook.
//!
//! Parse stages of every platform merge into one [`CookPlanner`]. A media id
//! referenced by several banks ends up as a single [`MediaRecord`] with one
//! attribute set per platform, merged so that the most demanding reference
//! wins.

use crate::error::{Error, Result};
use camino::Utf8PathBuf;
use parking_lot::Mutex;
use sbk_core::MediaId;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// How a media item is laid out on one platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlatformMediaAttributes {
    pub is_streamed: bool,
    pub use_device_memory: bool,
    pub prefetch_size: u32,
}

impl PlatformMediaAttributes {
    /// Fold another reference into these attributes.
    ///
    /// Streaming and device memory are sticky: once any reference asks for
    /// them they stay on. The prefetch size is the largest requested.
    pub fn merge(&mut self, other: &PlatformMediaAttributes) {
        self.is_streamed |= other.is_streamed;
        self.use_device_memory |= other.use_device_memory;
        self.prefetch_size = self.prefetch_size.max(other.prefetch_size);
    }
}

/// One media item to cook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRecord {
    pub id: MediaId,
    /// Empty for shared media.
    pub language: String,
    /// Source file relative to the platform cache folder.
    pub cache_path: Utf8PathBuf,
    pub display_name: String,
    /// Asset file relative to the output directory.
    pub asset_path: Utf8PathBuf,
    pub auto_load: bool,
    pub platforms: BTreeMap<String, PlatformMediaAttributes>,
}

/// A media reference found while parsing one bank for one platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaEntry {
    pub id: MediaId,
    pub language: String,
    pub cache_path: Utf8PathBuf,
    pub display_name: String,
    pub asset_path: Utf8PathBuf,
    pub attributes: PlatformMediaAttributes,
}

/// A `(media, platform)` pair handed to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookTask {
    pub record: MediaRecord,
    pub platform: String,
    pub attributes: PlatformMediaAttributes,
}

/// Thread-safe table of media records.
#[derive(Default)]
pub struct CookPlanner {
    records: Mutex<BTreeMap<MediaId, MediaRecord>>,
    finalizing: AtomicBool,
}

impl CookPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `entry` for `platform` or merge it into the existing record.
    ///
    /// The identity of an existing record (language, paths, name) is kept.
    pub fn merge(&self, platform: &str, entry: MediaEntry) -> Result<()> {
        if self.finalizing.load(Ordering::Acquire) {
            tracing::error!(
                "Media {} merged for {} while the planner is finalizing",
                entry.id,
                platform
            );
            return Err(Error::OrderingViolation(format!(
                "media {} merged during finalize",
                entry.id
            )));
        }

        let mut records = self.records.lock();
        let record = records.entry(entry.id).or_insert_with(|| MediaRecord {
            id: entry.id,
            language: entry.language,
            cache_path: entry.cache_path,
            display_name: entry.display_name,
            asset_path: entry.asset_path,
            auto_load: true,
            platforms: BTreeMap::new(),
        });

        record
            .platforms
            .entry(platform.to_string())
            .or_default()
            .merge(&entry.attributes);
        Ok(())
    }

    /// Set the auto-load flag of a planned media item. Unknown ids are ignored.
    pub fn set_auto_load(&self, id: MediaId, auto_load: bool) {
        if let Some(record) = self.records.lock().get_mut(&id) {
            record.auto_load = auto_load;
        }
    }

    pub fn get(&self, id: MediaId) -> Option<MediaRecord> {
        self.records.lock().get(&id).cloned()
    }

    pub fn contains(&self, id: MediaId) -> bool {
        self.records.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Every `(media, platform)` pair, ordered by id then platform.
    pub fn tasks(&self) -> Vec<CookTask> {
        self.records
            .lock()
            .values()
            .flat_map(|record| {
                record.platforms.iter().map(|(platform, attributes)| CookTask {
                    record: record.clone(),
                    platform: platform.clone(),
                    attributes: *attributes,
                })
            })
            .collect()
    }

    pub fn is_finalizing(&self) -> bool {
        self.finalizing.load(Ordering::Acquire)
    }

    /// Freeze the table for dispatch.
    pub fn begin_finalizing(&self) -> Result<()> {
        if self.finalizing.swap(true, Ordering::AcqRel) {
            tracing::error!("Planner finalize started twice");
            return Err(Error::OrderingViolation(
                "planner is already finalizing".to_string(),
            ));
        }
        Ok(())
    }

    pub fn end_finalizing(&self) {
        self.finalizing.store(false, Ordering::Release);
    }
}
