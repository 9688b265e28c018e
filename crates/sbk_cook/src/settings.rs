//! Build settings.

use crate::error::{Error, Result};
use crate::parser::ParserSettings;
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

/// Everything a build needs to know about its inputs and outputs.
///
/// Deserializes from the `[cook]` table of `soundbank-cook.toml`; every field
/// but the directories has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CookSettings {
    /// Exported bank documents and media sources, one folder per platform.
    pub cache_dir: Utf8PathBuf,
    /// Where media assets, the catalog and the cook state are written.
    pub output_dir: Utf8PathBuf,
    #[serde(default = "default_platforms")]
    pub platforms: Vec<String>,
    #[serde(default = "default_language")]
    pub default_language: String,
    #[serde(default = "default_true")]
    pub split_media_per_folder: bool,
    #[serde(default = "default_true")]
    pub split_switch_container_media: bool,
    /// Size of a dedicated cook pool. The global rayon pool is used when
    /// unset.
    #[serde(default)]
    pub worker_threads: Option<usize>,
    /// Save dirtied assets at the end of the build.
    #[serde(default = "default_true")]
    pub auto_save: bool,
}

fn default_platforms() -> Vec<String> {
    vec!["Windows".to_string()]
}

fn default_language() -> String {
    "English(US)".to_string()
}

fn default_true() -> bool {
    true
}

impl CookSettings {
    pub fn new(cache_dir: impl Into<Utf8PathBuf>, output_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            output_dir: output_dir.into(),
            platforms: default_platforms(),
            default_language: default_language(),
            split_media_per_folder: true,
            split_switch_container_media: true,
            worker_threads: None,
            auto_save: true,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.platforms.is_empty() {
            return Err(Error::InvalidSettings("no platforms configured".to_string()));
        }
        if let Some(platform) = self.platforms.iter().find(|p| p.trim().is_empty()) {
            return Err(Error::InvalidSettings(format!(
                "invalid platform name '{}'",
                platform
            )));
        }
        if self.worker_threads == Some(0) {
            return Err(Error::InvalidSettings(
                "worker_threads must be at least 1".to_string(),
            ));
        }
        if self.default_language.is_empty() {
            return Err(Error::InvalidSettings(
                "default_language must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn parser_settings(&self) -> ParserSettings {
        ParserSettings {
            split_media_per_folder: self.split_media_per_folder,
            split_switch_container_media: self.split_switch_container_media,
            default_language: self.default_language.clone(),
        }
    }
}
