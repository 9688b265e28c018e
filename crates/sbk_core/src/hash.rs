//! Content hashing for change detection.
//!
//! All hashes are xxHash3 64-bit. They are not cryptographic; they only need to
//! tell "same bytes as last build" apart from "different bytes".

use crate::ids::MediaId;
use camino::Utf8Path;
use std::io::Read;
use xxhash_rust::xxh3::{xxh3_64, Xxh3};

/// Hash a complete payload.
pub fn content_hash(bytes: &[u8]) -> u64 {
    xxh3_64(bytes)
}

/// Incremental hasher producing the same value as [`content_hash`] over the
/// concatenation of every slice fed to [`ContentHasher::update`].
#[derive(Clone, Default)]
pub struct ContentHasher {
    inner: Xxh3,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.inner.update(bytes);
    }

    pub fn finish(&self) -> u64 {
        self.inner.digest()
    }
}

/// Hash a file on disk without holding all of it in memory.
pub fn hash_file(path: &Utf8Path) -> std::io::Result<u64> {
    let mut file = std::fs::File::open(path.as_std_path())?;
    let mut hasher = ContentHasher::new();
    let mut buf = vec![0u8; 64 * 1024];

    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }

    Ok(hasher.finish())
}

/// Deterministic fingerprint of a set of `(media id, content hash)` pairs.
///
/// Pairs are sorted by media id before hashing so iteration order never
/// matters. Returns `0` for an empty set.
pub fn media_set_fingerprint<I>(entries: I) -> u64
where
    I: IntoIterator<Item = (MediaId, u64)>,
{
    let mut entries: Vec<(MediaId, u64)> = entries.into_iter().collect();
    if entries.is_empty() {
        return 0;
    }

    entries.sort_unstable();

    let mut buf = Vec::with_capacity(entries.len() * 12);
    for (id, hash) in &entries {
        buf.extend_from_slice(&id.to_le_bytes());
        buf.extend_from_slice(&hash.to_le_bytes());
    }

    xxh3_64(&buf)
}
