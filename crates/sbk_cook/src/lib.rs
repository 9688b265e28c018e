//! Incremental cook pipeline for sound bank media.
//!
//! This crate turns the bank exports of an audio authoring tool into cooked,
//! versioned media assets and keeps the sound data of an [`AssetCatalog`]
//! in sync with them. It supports:
//!
//! - **Incremental cooks**: media are only re-chunked when their content
//!   hash, streaming flag, prefetch size or chunk encoding changed
//! - **Lenient parsing**: malformed document entries are reported and skipped
//! - **Switch-gated media**: media behind a switch or state value load with
//!   that value instead of with the event
//! - **Per-platform merge**: attributes of the same media across platforms
//!   and banks merge into one plan
//! - **Parallel cooking**: on the global rayon pool or a dedicated one
//!
//! # Example
//!
//! ```no_run
//! use sbk_cook::{AssetCatalog, CookSettings, SoundDataBuilder};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = CookSettings::new("Cache/SoundBanks", "Content/Sound");
//! let catalog = AssetCatalog::load(&settings.output_dir.join("catalog.json"))?
//!     .unwrap_or_default();
//!
//! let builder = SoundDataBuilder::new(settings, catalog).with_progress(|progress| {
//!     println!("Stage: {:?}, Progress: {}/{}",
//!         progress.stage, progress.current, progress.total);
//! });
//!
//! let result = builder.build()?;
//! println!("Cooked {} media, {} up to date",
//!     result.media_cooked, result.media_skipped);
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod catalog;
pub mod dispatcher;
pub mod document;
pub mod error;
pub mod media_store;
pub mod parser;
pub mod paths;
pub mod planner;
pub mod run;
pub mod settings;
pub mod state;

// Re-export main types
pub use builder::{BuildProgress, BuildResult, BuildStage, SoundDataBuilder, CATALOG_FILE};
pub use catalog::{AssetCatalog, AssetKey, CatalogObject, LiveAssetIndex, ObjectKind};
pub use dispatcher::{CookDispatcher, CookFailure, CookReport};
pub use error::{Error, ParseError, Result};
pub use media_store::DiskMediaAssetStore;
pub use parser::{BankMetadataParser, ParserSettings};
pub use planner::CookPlanner;
pub use run::BuildRun;
pub use settings::CookSettings;
pub use state::{CookState, COOK_STATE_FILE};
