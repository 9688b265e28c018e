//! Fetch, cook and finalize.
//!
//! # Dispatch Algorithm
//!
//! 1. Force auto-load on media gated by switch values that did not resolve.
//! 2. Freeze the planner. Merging media from here on is an ordering violation.
//! 3. Fetch the asset of every `(media, platform)` pair on the calling thread.
//! 4. Cook every fetched pair on the worker pool. A cook reads the exported
//!    source, hashes it and rebuilds the chunks of its platform when the hash,
//!    the streaming flag, the prefetch size or the chunk encoding changed.
//! 5. Wait for all cooks (the barrier), then finalize: commit collected media
//!    lists, reconcile group-value media dependencies and flush dirty marks.

use crate::catalog::{AssetCatalog, AssetKey};
use crate::error::{Error, Result};
use crate::media_store::{DiskMediaAssetStore, MediaAssetCell};
use crate::paths::source_path;
use crate::planner::CookTask;
use crate::run::BuildRun;
use camino::Utf8Path;
use parking_lot::Mutex;
use sbk_core::{content_hash, media_lists_differ, MediaId};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A media item that could not be cooked for one platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CookFailure {
    pub media: MediaId,
    pub platform: String,
    pub message: String,
}

/// Counts of one dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookReport {
    /// Pairs whose chunks were rebuilt.
    pub cooked: usize,
    /// Pairs whose chunks were kept but whose asset changed otherwise.
    pub updated: usize,
    pub unchanged: usize,
    pub failures: Vec<CookFailure>,
}

enum CookOutcome {
    Rebuilt,
    Updated,
    Unchanged,
}

/// Number of cook tasks not yet finished.
pub struct TaskLatch(AtomicUsize);

impl TaskLatch {
    pub fn new(count: usize) -> Self {
        Self(AtomicUsize::new(count))
    }

    pub fn outstanding(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }

    fn guard(&self) -> LatchGuard<'_> {
        LatchGuard(self)
    }

    fn count_down(&self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Counts its task down when dropped, including on unwind.
struct LatchGuard<'a>(&'a TaskLatch);

impl Drop for LatchGuard<'_> {
    fn drop(&mut self) {
        self.0.count_down();
    }
}

pub struct CookDispatcher<'a> {
    run: &'a BuildRun,
    catalog: &'a AssetCatalog,
    store: &'a DiskMediaAssetStore,
    cache_dir: &'a Utf8Path,
    pool: Option<&'a rayon::ThreadPool>,
}

impl<'a> CookDispatcher<'a> {
    pub fn new(
        run: &'a BuildRun,
        catalog: &'a AssetCatalog,
        store: &'a DiskMediaAssetStore,
        cache_dir: &'a Utf8Path,
    ) -> Self {
        Self {
            run,
            catalog,
            store,
            cache_dir,
            pool: None,
        }
    }

    /// Cook on `pool` instead of the global rayon pool.
    pub fn with_pool(mut self, pool: &'a rayon::ThreadPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Run fetch, cook and finalize. See the module docs.
    pub fn dispatch(&self) -> Result<CookReport> {
        let planner = self.run.planner();
        for id in self.run.fallback_media() {
            planner.set_auto_load(id, true);
        }

        planner.begin_finalizing()?;
        let cooked = self.fetch_and_cook();
        planner.end_finalizing();

        let (report, latch) = cooked;
        self.finalize(&latch)?;
        Ok(report)
    }

    fn fetch_and_cook(&self) -> (CookReport, TaskLatch) {
        let tasks = self.run.planner().tasks();
        let latch = TaskLatch::new(tasks.len());
        let report = Mutex::new(CookReport::default());

        tracing::info!("Cooking {} media platform entries", tasks.len());

        let mut fetched = Vec::with_capacity(tasks.len());
        for task in tasks {
            match self.store.fetch(&task.record) {
                Ok(cell) => fetched.push((task, cell)),
                Err(e) => {
                    latch.count_down();
                    tracing::warn!("Failed to fetch media asset {}: {}", task.record.id, e);
                    report.lock().failures.push(CookFailure {
                        media: task.record.id,
                        platform: task.platform,
                        message: e.to_string(),
                    });
                }
            }
        }

        let cook_all = || {
            rayon::scope(|scope| {
                for (task, cell) in &fetched {
                    let latch = &latch;
                    let report = &report;
                    scope.spawn(move |_| {
                        let _guard = latch.guard();
                        let outcome = self.cook(task, cell);

                        let mut report = report.lock();
                        match outcome {
                            Ok(CookOutcome::Rebuilt) => report.cooked += 1,
                            Ok(CookOutcome::Updated) => report.updated += 1,
                            Ok(CookOutcome::Unchanged) => report.unchanged += 1,
                            Err(failure) => report.failures.push(failure),
                        }
                    });
                }
            })
        };

        match self.pool {
            Some(pool) => pool.install(cook_all),
            None => cook_all(),
        }

        (report.into_inner(), latch)
    }

    /// Cook one `(media, platform)` pair into its fetched asset.
    fn cook(
        &self,
        task: &CookTask,
        cell: &Arc<MediaAssetCell>,
    ) -> std::result::Result<CookOutcome, CookFailure> {
        let record = &task.record;
        let source = source_path(self.cache_dir, &task.platform, &record.cache_path);

        let bytes = std::fs::read(source.as_std_path()).map_err(|e| {
            tracing::warn!(
                "Skipping media {} for {}: cannot read {}: {}",
                record.id,
                task.platform,
                source,
                e
            );
            CookFailure {
                media: record.id,
                platform: task.platform.clone(),
                message: format!("cannot read {}: {}", source, e),
            }
        })?;
        let hash = content_hash(&bytes);

        let mut asset = cell.lock();
        let mut changed = false;

        if asset.id != record.id {
            asset.id = record.id;
            changed = true;
        }
        if asset.media_name != record.display_name {
            asset.media_name = record.display_name.clone();
            changed = true;
        }
        if asset.language != record.language {
            asset.language = record.language.clone();
            changed = true;
        }
        if asset.auto_load != record.auto_load {
            asset.auto_load = record.auto_load;
            changed = true;
        }

        let attributes = task.attributes;
        let data = asset.find_or_add_platform_data(&task.platform);

        // Compared against the stored layout before it is updated
        let streamed_differs = data.is_streamed != attributes.is_streamed;
        let prefetch_differs = data.prefetch_size_differs(attributes.prefetch_size);

        data.is_streamed = attributes.is_streamed;
        if data.use_device_memory != attributes.use_device_memory {
            data.use_device_memory = attributes.use_device_memory;
            changed = true;
        }

        let rebuild = data.chunks.is_empty()
            || data.content_hash != hash
            || streamed_differs
            || prefetch_differs
            || data.has_stale_encoding();

        if rebuild {
            tracing::debug!(
                "Rebuilding media {} for {} ({} bytes, prefetch {})",
                record.id,
                task.platform,
                bytes.len(),
                attributes.prefetch_size
            );
            data.rebuild_chunks(&bytes, hash, attributes.prefetch_size);
            changed = true;
        }
        drop(asset);

        if !changed {
            return Ok(CookOutcome::Unchanged);
        }

        self.store.mark_dirty(record.id);
        self.run.mark_dirty(AssetKey::Media { id: record.id });
        Ok(if rebuild {
            CookOutcome::Rebuilt
        } else {
            CookOutcome::Updated
        })
    }

    /// Complete the run once every cook task finished.
    pub fn finalize(&self, latch: &TaskLatch) -> Result<()> {
        let outstanding = latch.outstanding();
        if outstanding > 0 {
            tracing::error!("Finalize started with {} cook tasks outstanding", outstanding);
            return Err(Error::OrderingViolation(format!(
                "finalize with {} cook tasks outstanding",
                outstanding
            )));
        }

        for slot in self.run.owners() {
            let changed = self
                .catalog
                .with_object(&slot.key, |object| {
                    object
                        .platform_data
                        .get_mut(&slot.platform)
                        .is_some_and(|data| data.media_set_for(&slot.language).commit_pending())
                })
                .unwrap_or(false);

            if changed {
                tracing::debug!("Media list of {} for {} changed", slot.key, slot.platform);
                self.run.mark_dirty(slot.key);
            }
        }

        for (key, media) in self.run.take_group_media() {
            let media: Vec<MediaId> = media.into_iter().collect();
            let changed = self
                .catalog
                .with_object(&key, |object| {
                    if media_lists_differ(&object.media_dependencies, &media) {
                        object.media_dependencies = media;
                        true
                    } else {
                        false
                    }
                })
                .unwrap_or(false);

            if changed {
                self.run.mark_dirty(key);
            }
        }

        for id in self.run.fallback_media() {
            let Some(cell) = self.store.get(id) else {
                continue;
            };
            let mut asset = cell.lock();
            if !asset.auto_load {
                asset.auto_load = true;
                self.store.mark_dirty(id);
                self.run.mark_dirty(AssetKey::Media { id });
            }
        }

        let flushed = self.run.flush_dirty();
        tracing::info!("Finalized build run, {} assets dirtied", flushed);
        Ok(())
    }
}
