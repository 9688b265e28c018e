//! Cook state persistence.
//!
//! After a build, a [`CookState`] is written to `cook_state.json` in the output
//! directory. It records which platforms were cooked and a fingerprint of
//! every cooked media payload, so tools can tell at a glance whether the
//! output is current without decoding every asset.

use crate::error::Result;
use camino::Utf8Path;
use serde::{Deserialize, Serialize};

pub const COOK_STATE_VERSION: u32 = 1;

/// File name of the state inside the output directory.
pub const COOK_STATE_FILE: &str = "cook_state.json";

/// Snapshot of the last build, persisted as `cook_state.json`.
///
/// # JSON format
///
/// ```json
/// {
///   "version": 1,
///   "platforms": ["PS5", "Windows"],
///   "mediaCount": 42,
///   "mediaFingerprint": 1234567890
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookState {
    pub version: u32,

    /// Sorted platforms of the build.
    pub platforms: Vec<String>,

    /// Number of media assets the build saw.
    pub media_count: usize,

    /// Fingerprint of `(media id, content hash)` over every cooked platform
    /// entry.
    pub media_fingerprint: u64,
}

impl Default for CookState {
    fn default() -> Self {
        Self {
            version: COOK_STATE_VERSION,
            platforms: Vec::new(),
            media_count: 0,
            media_fingerprint: 0,
        }
    }
}

impl CookState {
    pub fn new(mut platforms: Vec<String>, media_count: usize, media_fingerprint: u64) -> Self {
        platforms.sort();
        Self {
            version: COOK_STATE_VERSION,
            platforms,
            media_count,
            media_fingerprint,
        }
    }

    /// Load cook state from a file.
    ///
    /// Returns `Ok(None)` if the file doesn't exist.
    pub fn load(path: &Utf8Path) -> Result<Option<Self>> {
        if !path.as_std_path().exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(path.as_std_path())?;
        let state: Self = serde_json::from_str(&contents)?;
        Ok(Some(state))
    }

    /// Save cook state, creating parent directories if needed.
    pub fn save(&self, path: &Utf8Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent.as_std_path())?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_std_path(), contents)?;
        Ok(())
    }

    /// Whether this state describes a build of `platforms` that produced
    /// `media_fingerprint`. Platform order is ignored.
    pub fn matches(&self, platforms: &[String], media_fingerprint: u64) -> bool {
        let mut platforms = platforms.to_vec();
        platforms.sort();

        self.version == COOK_STATE_VERSION
            && self.platforms == platforms
            && self.media_fingerprint == media_fingerprint
    }
}
