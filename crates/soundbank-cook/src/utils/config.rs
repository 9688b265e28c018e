//! Project configuration (`soundbank-cook.toml`).
//!
//! ```toml
//! # Optional seed catalog, defaults to <output_dir>/catalog.json
//! catalog = "Design/catalog.json"
//!
//! [cook]
//! cache_dir = "Cache/SoundBanks"
//! output_dir = "Content/Sound"
//! platforms = ["Windows", "PS5"]
//! ```
//!
//! Relative paths are resolved against the directory holding the file.

use crate::errors::CliError;
use camino::{Utf8Path, Utf8PathBuf};
use sbk_cook::{CookSettings, CATALOG_FILE};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE_NAME: &str = "soundbank-cook.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Catalog to build against when the output directory has none yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<Utf8PathBuf>,
    pub cook: CookSettings,
}

impl ProjectConfig {
    /// Parse a config file's contents, resolving relative paths against
    /// `base_dir`.
    pub fn parse(content: &str, base_dir: &Utf8Path) -> Result<Self, toml::de::Error> {
        let mut config: Self = toml::from_str(content)?;
        config.cook.cache_dir = resolve_path(base_dir, &config.cook.cache_dir);
        config.cook.output_dir = resolve_path(base_dir, &config.cook.output_dir);
        config.catalog = config.catalog.map(|path| resolve_path(base_dir, &path));
        Ok(config)
    }

    /// Where the catalog is read from: the output directory's catalog if it
    /// exists, else the configured seed.
    pub fn catalog_path(&self) -> Utf8PathBuf {
        let output_catalog = self.cook.output_dir.join(CATALOG_FILE);
        match &self.catalog {
            Some(seed) if !output_catalog.as_std_path().exists() => seed.clone(),
            _ => output_catalog,
        }
    }
}

/// Command line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub cache_dir: Option<Utf8PathBuf>,
    pub output_dir: Option<Utf8PathBuf>,
    pub platforms: Vec<String>,
    pub threads: Option<usize>,
    pub no_save: bool,
}

impl SettingsOverrides {
    pub fn apply(&self, settings: &mut CookSettings) {
        if let Some(cache_dir) = &self.cache_dir {
            settings.cache_dir = cache_dir.clone();
        }
        if let Some(output_dir) = &self.output_dir {
            settings.output_dir = output_dir.clone();
        }
        if !self.platforms.is_empty() {
            settings.platforms = self.platforms.clone();
        }
        if self.threads.is_some() {
            settings.worker_threads = self.threads;
        }
        if self.no_save {
            settings.auto_save = false;
        }
    }
}

fn resolve_path(base_dir: &Utf8Path, path: &Utf8Path) -> Utf8PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Look for `soundbank-cook.toml` in `start` and its ancestors.
pub fn find_config(start: &Utf8Path) -> Option<Utf8PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .find(|path| path.as_std_path().is_file())
}

pub fn load_config(path: &Utf8Path) -> Result<ProjectConfig, CliError> {
    if !path.as_std_path().is_file() {
        return Err(CliError::file_not_found(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path.as_std_path())?;
    let base_dir = path.parent().unwrap_or(Utf8Path::new("."));
    ProjectConfig::parse(&content, base_dir)
        .map_err(|e| CliError::config_parse_error(path.to_path_buf(), e))
}

/// Resolve the project config from an explicit path, a config file found
/// from the working directory, or the overrides alone.
pub fn load_project(
    config_path: Option<&str>,
    overrides: &SettingsOverrides,
) -> miette::Result<ProjectConfig> {
    let cwd = std::env::current_dir()
        .ok()
        .and_then(|dir| Utf8PathBuf::from_path_buf(dir).ok())
        .unwrap_or_else(|| Utf8PathBuf::from("."));

    let found = match config_path {
        Some(path) => Some(Utf8PathBuf::from(path)),
        None => find_config(&cwd),
    };

    let mut config = match (found, &overrides.cache_dir, &overrides.output_dir) {
        (Some(path), _, _) => {
            tracing::debug!("Using config {}", path);
            load_config(&path)?
        }
        (None, Some(cache_dir), Some(output_dir)) => ProjectConfig {
            catalog: None,
            cook: CookSettings::new(cache_dir.clone(), output_dir.clone()),
        },
        (None, _, _) => return Err(CliError::config_not_found(cwd).into()),
    };

    overrides.apply(&mut config.cook);
    Ok(config)
}
