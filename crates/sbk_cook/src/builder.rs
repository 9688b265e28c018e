//! Main sound data builder implementation.
//!
//! The [`SoundDataBuilder`] drives one build: it parses every bank export of
//! the configured platforms, cooks the media they reference and persists what
//! changed.
//!
//! # Build Algorithm
//!
//! 1. Validate the settings and take the "is building" flag. A second build
//!    against the same flag fails with [`Error::AlreadyBuilding`].
//! 2. Find every `*.json` export under `<cache_dir>/<platform>/`.
//! 3. Read and decode the exports in parallel. Each bank is matched to its
//!    owner in the [`AssetCatalog`]: `Init` is the init bank, `SB_<guid>` an
//!    event or aux bus, anything else a bank of that name. The generated
//!    `<ShortName>.bnk` next to the export becomes the owner's bank payload.
//! 4. Parse regular banks in parallel, then the init bank documents, so the
//!    init bank only keeps media no other bank claimed.
//! 5. Dispatch the cook (see [`crate::dispatcher`]).
//! 6. Save dirtied media assets, the catalog when a catalog object changed,
//!    and the [`CookState`].
//! 7. Emit the completion event and, if the build succeeded, call the reload
//!    hook.

use crate::catalog::{AssetCatalog, AssetKey};
use crate::dispatcher::{CookDispatcher, CookFailure};
use crate::document::{parse_export, SoundBankDocument};
use crate::error::{Error, ParseError, Result};
use crate::media_store::DiskMediaAssetStore;
use crate::parser::{BankMetadataParser, INIT_BANK_NAME};
use crate::run::BuildRun;
use crate::settings::CookSettings;
use crate::state::{CookState, COOK_STATE_FILE};
use camino::{Utf8Path, Utf8PathBuf};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use walkdir::WalkDir;

/// File name of the catalog inside the output directory.
pub const CATALOG_FILE: &str = "catalog.json";

/// Progress information emitted during a build.
///
/// `current`/`total` count documents while parsing and media entries while
/// cooking.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildProgress {
    pub stage: BuildStage,
    /// Export currently being parsed (set during `Parsing`).
    pub current_file: Option<String>,
    pub current: u32,
    pub total: u32,
}

/// Stages of the build pipeline.
///
/// Emitted in order: `Parsing` (repeated) -> `Cooking` -> `Saving` -> `Complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BuildStage {
    /// Reading bank exports into the catalog and the cook plan.
    Parsing,
    /// Cooking media on the worker pool.
    Cooking,
    /// Writing dirtied assets and the cook state.
    Saving,
    Complete,
}

/// Outcome of [`SoundDataBuilder::build`].
#[derive(Debug, Clone)]
pub struct BuildResult {
    /// No entry failed to parse and no media failed to cook.
    pub success: bool,
    /// Media platform entries whose chunks were rebuilt.
    pub media_cooked: usize,
    /// Media platform entries whose chunks were still current.
    pub media_skipped: usize,
    /// Catalog objects and media assets changed by this build.
    pub dirtied: Vec<AssetKey>,
    pub parse_errors: Vec<ParseError>,
    pub cook_failures: Vec<CookFailure>,
    pub build_time: Duration,
}

type ProgressCallback = Arc<dyn Fn(BuildProgress) + Send + Sync>;
type ReloadHook = Arc<dyn Fn(&BuildResult) + Send + Sync>;

/// One decoded bank export, matched to its owner.
struct LoadedDocument {
    platform: String,
    source: String,
    doc: SoundBankDocument,
    owner: Option<AssetKey>,
    bank_bytes: Option<Vec<u8>>,
}

/// Clears the building flag when the build ends, however it ends.
struct BuildingGuard<'a>(&'a AtomicBool);

impl<'a> BuildingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::AlreadyBuilding)?;
        Ok(Self(flag))
    }
}

impl Drop for BuildingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Builder for cooking sound data.
pub struct SoundDataBuilder {
    settings: CookSettings,
    catalog: AssetCatalog,
    progress_callback: Option<ProgressCallback>,
    reload_hook: Option<ReloadHook>,
    building: Arc<AtomicBool>,
}

impl SoundDataBuilder {
    /// Create a builder cooking into the objects of `catalog`.
    pub fn new(settings: CookSettings, catalog: AssetCatalog) -> Self {
        Self {
            settings,
            catalog,
            progress_callback: None,
            reload_hook: None,
            building: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Register a progress callback.
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(BuildProgress) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    /// Register a callback run after every successful build, typically to
    /// reload sound data that is currently in use.
    pub fn with_reload_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&BuildResult) + Send + Sync + 'static,
    {
        self.reload_hook = Some(Arc::new(hook));
        self
    }

    /// Share the "is building" flag with other builders or tools.
    pub fn with_building_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.building = flag;
        self
    }

    pub fn settings(&self) -> &CookSettings {
        &self.settings
    }

    pub fn catalog(&self) -> &AssetCatalog {
        &self.catalog
    }

    pub fn into_catalog(self) -> AssetCatalog {
        self.catalog
    }

    pub fn is_building(&self) -> bool {
        self.building.load(Ordering::Acquire)
    }

    pub fn catalog_path(&self) -> Utf8PathBuf {
        self.settings.output_dir.join(CATALOG_FILE)
    }

    pub fn state_path(&self) -> Utf8PathBuf {
        self.settings.output_dir.join(COOK_STATE_FILE)
    }

    /// Run one build. See the module docs for the algorithm.
    pub fn build(&self) -> Result<BuildResult> {
        let start_time = std::time::Instant::now();

        self.settings.validate()?;
        let _building = BuildingGuard::acquire(&self.building)?;

        tracing::info!("Building sound data...");
        tracing::info!("Cache dir: {}", self.settings.cache_dir);
        tracing::info!("Output dir: {}", self.settings.output_dir);
        tracing::info!("Platforms: {}", self.settings.platforms.join(", "));

        let pool = self
            .settings
            .worker_threads
            .map(|threads| rayon::ThreadPoolBuilder::new().num_threads(threads).build())
            .transpose()?;
        let in_pool = |job: &(dyn Fn() + Sync)| match &pool {
            Some(pool) => pool.install(job),
            None => job(),
        };

        // Parse
        self.emit_progress(BuildProgress {
            stage: BuildStage::Parsing,
            current_file: None,
            current: 0,
            total: 0,
        });

        let exports = self.discover_exports()?;
        tracing::info!("Found {} bank exports", exports.len());

        let run = BuildRun::new();
        let parser = BankMetadataParser::new(&run, &self.catalog, self.settings.parser_settings());

        let documents = parking_lot::Mutex::new(Vec::new());
        in_pool(&|| {
            let loaded: Vec<LoadedDocument> = exports
                .par_iter()
                .flat_map_iter(|(platform, path)| self.load_export(&run, &parser, platform, path))
                .collect();
            *documents.lock() = loaded;
        });
        let (init_docs, bank_docs): (Vec<_>, Vec<_>) = documents
            .into_inner()
            .into_iter()
            .partition(|loaded| loaded.doc.name() == INIT_BANK_NAME);

        let total = (init_docs.len() + bank_docs.len()) as u32;
        let parsed = AtomicU32::new(0);
        let first_error = parking_lot::Mutex::new(None);
        for batch in [&bank_docs, &init_docs] {
            in_pool(&|| {
                batch.par_iter().for_each(|loaded| {
                    if let Err(e) = self.parse_document(&parser, loaded) {
                        first_error.lock().get_or_insert(e);
                    }
                    self.emit_progress(BuildProgress {
                        stage: BuildStage::Parsing,
                        current_file: Some(loaded.source.clone()),
                        current: parsed.fetch_add(1, Ordering::AcqRel) + 1,
                        total,
                    });
                });
            });
        }
        if let Some(e) = first_error.into_inner() {
            return Err(e);
        }

        // Cook
        let planned = run.planner().len();
        tracing::info!("Planned {} media", planned);
        self.emit_progress(BuildProgress {
            stage: BuildStage::Cooking,
            current_file: None,
            current: 0,
            total: planned as u32,
        });

        let store = DiskMediaAssetStore::new(self.settings.output_dir.clone());
        let mut dispatcher =
            CookDispatcher::new(&run, &self.catalog, &store, &self.settings.cache_dir);
        if let Some(pool) = &pool {
            dispatcher = dispatcher.with_pool(pool);
        }
        let report = dispatcher.dispatch()?;

        // Save
        self.emit_progress(BuildProgress {
            stage: BuildStage::Saving,
            current_file: None,
            current: 0,
            total: 0,
        });

        let dirtied = run.dirtied();
        if self.settings.auto_save {
            store.save_dirty()?;
            if dirtied.iter().any(AssetKey::is_object) {
                self.catalog.save(&self.catalog_path())?;
                tracing::info!("Saved catalog to {}", self.catalog_path());
            }
        } else if !dirtied.is_empty() {
            tracing::info!("Auto-save disabled, {} dirtied assets not written", dirtied.len());
        }

        let state = CookState::new(
            self.settings.platforms.clone(),
            store.len(),
            store.fingerprint(),
        );
        state.save(&self.state_path())?;

        let parse_errors = run.diagnostics();
        let result = BuildResult {
            success: parse_errors.is_empty() && report.failures.is_empty(),
            media_cooked: report.cooked,
            media_skipped: report.updated + report.unchanged,
            dirtied,
            parse_errors,
            cook_failures: report.failures,
            build_time: start_time.elapsed(),
        };

        self.emit_progress(BuildProgress {
            stage: BuildStage::Complete,
            current_file: None,
            current: planned as u32,
            total: planned as u32,
        });

        if result.success {
            tracing::info!(
                "Sound data built in {:?}: {} cooked, {} up to date, {} assets dirtied",
                result.build_time,
                result.media_cooked,
                result.media_skipped,
                result.dirtied.len()
            );
            if let Some(hook) = &self.reload_hook {
                hook(&result);
            }
        } else {
            tracing::warn!(
                "Sound data build finished with {} parse errors and {} cook failures",
                result.parse_errors.len(),
                result.cook_failures.len()
            );
        }

        Ok(result)
    }

    /// Every `*.json` export of the configured platforms, sorted per platform.
    fn discover_exports(&self) -> Result<Vec<(String, Utf8PathBuf)>> {
        let cache_dir = &self.settings.cache_dir;
        if !cache_dir.as_std_path().is_dir() {
            return Err(Error::MissingCacheDir(cache_dir.clone()));
        }

        let mut exports = Vec::new();
        for platform in &self.settings.platforms {
            let platform_dir = cache_dir.join(platform);
            if !platform_dir.as_std_path().is_dir() {
                tracing::warn!("No exports for platform {} in {}", platform, platform_dir);
                continue;
            }

            for entry in WalkDir::new(platform_dir.as_std_path()).sort_by_file_name() {
                let entry = entry?;
                if !entry.file_type().is_file() {
                    continue;
                }

                let Some(path) = Utf8Path::from_path(entry.path()) else {
                    tracing::warn!("Skipping non UTF-8 path {}", entry.path().display());
                    continue;
                };
                if path.extension() == Some("json") {
                    exports.push((platform.clone(), path.to_path_buf()));
                }
            }
        }

        Ok(exports)
    }

    /// Read and decode one export. Failures are reported to the run and yield
    /// no documents.
    fn load_export(
        &self,
        run: &BuildRun,
        parser: &BankMetadataParser<'_>,
        platform: &str,
        path: &Utf8Path,
    ) -> Vec<LoadedDocument> {
        let source = path
            .strip_prefix(&self.settings.cache_dir)
            .unwrap_or(path)
            .to_string();

        let documents = std::fs::read(path.as_std_path())
            .map_err(|e| e.to_string())
            .and_then(|bytes| parse_export(&bytes).map_err(|e| e.to_string()));
        let documents = match documents {
            Ok(documents) => documents,
            Err(message) => {
                run.report(ParseError {
                    document: source,
                    section: String::new(),
                    message,
                });
                return Vec::new();
            }
        };

        documents
            .into_iter()
            .map(|doc| {
                let owner = parser.resolve_owner(&doc);
                let bank_bytes = path
                    .parent()
                    .map(|dir| dir.join(format!("{}.bnk", doc.name())))
                    .filter(|bank| !doc.name().is_empty() && bank.as_std_path().is_file())
                    .and_then(|bank| match std::fs::read(bank.as_std_path()) {
                        Ok(bytes) => Some(bytes),
                        Err(e) => {
                            tracing::warn!("Failed to read bank {}: {}", bank, e);
                            None
                        }
                    });

                LoadedDocument {
                    platform: platform.to_string(),
                    source: source.clone(),
                    doc,
                    owner,
                    bank_bytes,
                }
            })
            .collect()
    }

    fn parse_document(
        &self,
        parser: &BankMetadataParser<'_>,
        loaded: &LoadedDocument,
    ) -> Result<()> {
        let Some(owner) = &loaded.owner else {
            tracing::warn!(
                "No catalog asset for bank {} ({}), skipping",
                loaded.doc.name(),
                loaded.source
            );
            return Ok(());
        };

        parser.parse(
            &loaded.doc,
            &loaded.source,
            &loaded.platform,
            owner,
            loaded.bank_bytes.as_deref(),
        )
    }

    /// Emit a progress event if a callback was registered.
    fn emit_progress(&self, progress: BuildProgress) {
        if let Some(callback) = &self.progress_callback {
            callback(progress);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogObject, ObjectKind};
    use crate::document::parse_guid;
    use sbk_core::{content_hash, AssetData, MediaAsset, SoundData};
    use std::sync::Mutex;
    use tempfile::TempDir;

    const EVENT_GUID: &str = "{11111111-2222-3333-4444-555555555555}";
    const WOOD_GUID: &str = "{AAAAAAAA-0000-0000-0000-000000000001}";
    const STONE_GUID: &str = "{AAAAAAAA-0000-0000-0000-000000000002}";

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    struct Workspace {
        _dir: TempDir,
        root: Utf8PathBuf,
    }

    impl Workspace {
        fn new() -> Self {
            init_tracing();
            let dir = TempDir::new().unwrap();
            let root = Utf8Path::from_path(dir.path()).unwrap().to_path_buf();
            Self { _dir: dir, root }
        }

        fn settings(&self) -> CookSettings {
            CookSettings::new(self.root.join("cache"), self.root.join("out"))
        }

        fn write(&self, relative: &str, bytes: &[u8]) {
            let path = self.root.join("cache").join(relative);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, bytes).unwrap();
        }

        fn media_asset(&self, relative: &str) -> MediaAsset {
            MediaAsset::load(&self.root.join("out").join(relative))
                .unwrap()
                .unwrap()
        }
    }

    fn catalog() -> AssetCatalog {
        let mut catalog = AssetCatalog::new();
        catalog.insert(CatalogObject::new(ObjectKind::Bank, "Weapons", None));
        catalog.insert(CatalogObject::new(ObjectKind::InitBank, "Init", None));
        catalog.insert(CatalogObject::new(
            ObjectKind::Event,
            "Play_Footstep",
            parse_guid(EVENT_GUID),
        ));
        catalog.insert(CatalogObject::new(ObjectKind::GroupValue, "Wood", parse_guid(WOOD_GUID)));
        catalog.insert(CatalogObject::new(ObjectKind::GroupValue, "Stone", parse_guid(STONE_GUID)));
        catalog
    }

    const WEAPONS_BANK: &str = r#"{
        "ShortName": "Weapons",
        "Language": "SFX",
        "Hash": "12345",
        "ExcludedMemoryFiles": [
            { "Id": "1001", "Language": "SFX", "Path": "1001.wem", "ShortName": "Shot.wav" }
        ]
    }"#;

    #[test]
    fn test_media_rebuilds_only_when_source_changes() {
        let workspace = Workspace::new();
        workspace.write("Windows/Weapons.json", WEAPONS_BANK.as_bytes());
        workspace.write("Windows/Weapons.bnk", b"BKHD");
        workspace.write("Windows/1001.wem", &[1u8; 128]);

        let builder = SoundDataBuilder::new(workspace.settings(), catalog());
        let media_key = AssetKey::Media { id: 1001 };
        let bank_key = AssetKey::object(ObjectKind::Bank, "Weapons");

        // First build cooks the media and fills the bank
        let first = builder.build().unwrap();
        assert!(first.success);
        assert_eq!(first.media_cooked, 1);
        assert!(first.dirtied.contains(&media_key));
        assert!(first.dirtied.contains(&bank_key));

        let asset = workspace.media_asset("Media/00/00/1001.media");
        let data = &asset.platform_data["Windows"];
        assert_eq!(asset.media_name, "Shot");
        assert_eq!(data.chunks.len(), 1);
        assert_eq!(data.content_hash, content_hash(&[1u8; 128]));

        let bank = builder.catalog().snapshot(&bank_key).unwrap();
        let bank_data = &bank.platform_data["Windows"];
        assert_eq!(bank_data.media_list(), vec![1001]);
        assert_eq!(bank_data.bank_payload().cached_hash, 12345);
        assert_eq!(bank_data.bank_payload().bytes, b"BKHD");
        assert!(builder.catalog_path().as_std_path().exists());

        // Nothing changed: nothing is dirtied
        let second = builder.build().unwrap();
        assert!(second.success);
        assert_eq!(second.media_cooked, 0);
        assert_eq!(second.media_skipped, 1);
        assert!(second.dirtied.is_empty());

        // New source bytes: the media is cooked again
        workspace.write("Windows/1001.wem", &[2u8; 64]);
        let third = builder.build().unwrap();
        assert_eq!(third.media_cooked, 1);
        assert_eq!(third.dirtied, vec![media_key]);
        let asset = workspace.media_asset("Media/00/00/1001.media");
        assert_eq!(asset.platform_data["Windows"].content_hash, content_hash(&[2u8; 64]));

        let state = CookState::load(&builder.state_path()).unwrap().unwrap();
        assert!(state.matches(&["Windows".to_string()], state.media_fingerprint));
        assert_eq!(state.media_count, 1);
    }

    #[test]
    fn test_switch_gated_media() {
        let workspace = Workspace::new();
        let bank = format!(
            r#"{{
                "ShortName": "SB_{EVENT_GUID}",
                "Language": "SFX",
                "IncludedEvents": [
                    {{
                        "Id": "77",
                        "GUID": "{EVENT_GUID}",
                        "ExcludedMemoryFiles": [
                            {{ "Id": "1", "Language": "SFX", "Path": "1.wem", "ShortName": "Wood.wav" }},
                            {{ "Id": "2", "Language": "SFX", "Path": "2.wem", "ShortName": "Stone.wav" }},
                            {{ "Id": "3", "Language": "SFX", "Path": "3.wem", "ShortName": "Base.wav" }}
                        ],
                        "SwitchContainers": [
                            {{ "SwitchValue": "{WOOD_GUID}", "Media": [ {{ "Id": "1" }} ] }},
                            {{ "SwitchValue": "{STONE_GUID}", "Media": [ {{ "Id": "2" }} ] }}
                        ]
                    }}
                ]
            }}"#
        );
        workspace.write("Windows/SB_footstep.json", bank.as_bytes());
        for id in 1..=3 {
            workspace.write(&format!("Windows/{}.wem", id), format!("media{}", id).as_bytes());
        }

        let builder = SoundDataBuilder::new(workspace.settings(), catalog());
        let result = builder.build().unwrap();
        assert!(result.success, "{:?}", result.parse_errors);
        assert_eq!(result.media_cooked, 3);

        let event_key = AssetKey::object(ObjectKind::Event, "Play_Footstep");
        let event = builder.catalog().snapshot(&event_key).unwrap();
        assert_eq!(event.short_id, 77);
        let AssetData::Event(data) = &event.platform_data["Windows"] else {
            panic!("expected event data");
        };
        assert_eq!(data.media.media, vec![3]);
        assert_eq!(data.media.switch_containers.len(), 2);
        assert_eq!(data.media_list(), vec![1, 2, 3]);

        let wood = builder
            .catalog()
            .snapshot(&AssetKey::object(ObjectKind::GroupValue, "Wood"))
            .unwrap();
        assert_eq!(wood.media_dependencies, vec![1]);

        assert!(!workspace.media_asset("Media/00/00/1.media").auto_load);
        assert!(!workspace.media_asset("Media/00/00/2.media").auto_load);
        assert!(workspace.media_asset("Media/00/00/3.media").auto_load);
    }

    #[test]
    fn test_init_bank_skips_claimed_media() {
        let workspace = Workspace::new();
        workspace.write("Windows/Weapons.json", WEAPONS_BANK.as_bytes());
        workspace.write(
            "Windows/Init.json",
            br#"{ "ShortName": "Init", "Language": "SFX", "ExcludedMemoryFiles": [
                { "Id": "1001", "Language": "SFX", "Path": "1001.wem" },
                { "Id": "2002", "Language": "SFX", "Path": "2002.wem" }
            ] }"#,
        );
        workspace.write("Windows/1001.wem", b"shot");
        workspace.write("Windows/2002.wem", b"init");

        let builder = SoundDataBuilder::new(workspace.settings(), catalog());
        builder.build().unwrap();

        let init = builder
            .catalog()
            .snapshot(&AssetKey::object(ObjectKind::InitBank, "Init"))
            .unwrap();
        assert_eq!(init.platform_data["Windows"].media_list(), vec![2002]);
        assert_eq!(init.default_language.as_deref(), Some("English(US)"));
    }

    #[test]
    fn test_failures_are_reported() {
        let workspace = Workspace::new();
        workspace.write("Windows/Weapons.json", WEAPONS_BANK.as_bytes());
        workspace.write("Windows/broken.json", b"{ not json");

        let builder = SoundDataBuilder::new(workspace.settings(), catalog());
        let result = builder.build().unwrap();

        assert!(!result.success);
        assert_eq!(result.parse_errors.len(), 1);
        assert!(result.parse_errors[0].document.ends_with("broken.json"));
        assert_eq!(result.cook_failures.len(), 1);
        assert_eq!(result.cook_failures[0].media, 1001);
    }

    #[test]
    fn test_missing_cache_dir() {
        let workspace = Workspace::new();
        let builder = SoundDataBuilder::new(workspace.settings(), AssetCatalog::new());
        assert!(matches!(builder.build(), Err(Error::MissingCacheDir(_))));
        assert!(!builder.is_building());
    }

    #[test]
    fn test_already_building() {
        let workspace = Workspace::new();
        let flag = Arc::new(AtomicBool::new(true));
        let builder = SoundDataBuilder::new(workspace.settings(), AssetCatalog::new())
            .with_building_flag(flag.clone());

        assert!(matches!(builder.build(), Err(Error::AlreadyBuilding)));
        assert!(flag.load(Ordering::Acquire));
    }

    #[test]
    fn test_progress_and_reload_hook() {
        let workspace = Workspace::new();
        workspace.write("Windows/Weapons.json", WEAPONS_BANK.as_bytes());
        workspace.write("Windows/1001.wem", b"shot");

        let stages = Arc::new(Mutex::new(Vec::new()));
        let reloads = Arc::new(AtomicU32::new(0));
        let builder = SoundDataBuilder::new(workspace.settings(), catalog())
            .with_progress({
                let stages = stages.clone();
                move |progress| stages.lock().unwrap().push(progress.stage)
            })
            .with_reload_hook({
                let reloads = reloads.clone();
                move |_| {
                    reloads.fetch_add(1, Ordering::AcqRel);
                }
            });

        builder.build().unwrap();

        let stages = stages.lock().unwrap();
        assert_eq!(stages.first(), Some(&BuildStage::Parsing));
        assert_eq!(
            &stages[stages.len() - 3..],
            &[BuildStage::Cooking, BuildStage::Saving, BuildStage::Complete]
        );
        assert_eq!(reloads.load(Ordering::Acquire), 1);
    }

    #[test]
    fn test_worker_threads() {
        let workspace = Workspace::new();
        workspace.write("Windows/Weapons.json", WEAPONS_BANK.as_bytes());
        workspace.write("Windows/1001.wem", b"shot");

        let mut settings = workspace.settings();
        settings.worker_threads = Some(2);
        let result = SoundDataBuilder::new(settings, catalog()).build().unwrap();
        assert_eq!(result.media_cooked, 1);
    }
}
