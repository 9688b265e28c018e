//! Error types for the shared data model.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while parsing identities or reading/writing media assets.
#[derive(Error, Debug)]
pub enum Error {
    /// Filesystem I/O failed (also covers zstd stream errors).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A GUID string was not in the `{XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX}` form.
    #[error("Invalid GUID: {0}")]
    InvalidGuid(String),

    /// MessagePack encoding of a media asset failed.
    #[error("Encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// MessagePack decoding of a media asset failed.
    #[error("Decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// The file does not start with the media asset magic.
    #[error("Invalid media asset header")]
    InvalidHeader,

    /// The media asset was written by an incompatible format version.
    #[error("Unsupported media asset version {0}")]
    UnsupportedVersion(u32),
}
