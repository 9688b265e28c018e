//! Error types for cook operations.
//!
//! All fallible functions in this crate return [`Result<T>`], which uses [`Error`]
//! as the error type. External error types (`std::io::Error`, `serde_json::Error`,
//! data model errors) are automatically converted via `From` impls.
//!
//! Per-item problems (a malformed document entry, an unreadable source file) are
//! not errors of the build as a whole. They are recorded as [`ParseError`]s or
//! cook failures in the [`BuildResult`](crate::BuildResult) and the build keeps
//! going. Only [`Error::OrderingViolation`] and setup failures abort a build.

use camino::Utf8PathBuf;
use serde::Serialize;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while cooking sound data.
#[derive(Error, Debug)]
pub enum Error {
    /// Filesystem I/O failed (reading exports, writing assets, etc.).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse or serialize JSON (catalog, cook state, bank exports).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error from the shared data model when reading or writing a media asset.
    #[error("Media asset error: {0}")]
    Asset(#[from] sbk_core::Error),

    /// Walking the export cache directory failed.
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// The export cache directory is missing.
    #[error("Cache directory not found: {0}")]
    MissingCacheDir(Utf8PathBuf),

    /// Settings are inconsistent (no platforms, bad thread count, ...).
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// Another build is already running against the same building flag.
    #[error("A sound data build is already running")]
    AlreadyBuilding,

    /// A pipeline stage ran out of order: the planner was mutated while
    /// finalizing, or finalize ran with cook tasks outstanding.
    #[error("Ordering violation: {0}")]
    OrderingViolation(String),

    /// Failed to build the worker pool.
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// A document entry that could not be understood. The entry is skipped and
/// parsing continues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseError {
    /// Export file the entry came from.
    pub document: String,
    /// Section of the document, e.g. `ReferencedStreamedFiles`.
    pub section: String,
    pub message: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]: {}", self.document, self.section, self.message)
    }
}
