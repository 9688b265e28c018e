//! Persisted media assets.
//!
//! A [`MediaAsset`] is written once per media id and carries one
//! [`MediaAssetData`] per platform. Each platform entry holds an ordered chunk
//! list: an optional prefetch chunk first, then the full payload.
//!
//! # File format
//!
//! ```text
//! magic    [u8; 8]   "SBKMEDIA"
//! version  u32 LE    MEDIA_ASSET_VERSION
//! body     zstd(MessagePack(MediaAsset))
//! ```

use crate::error::{Error, Result};
use crate::ids::MediaId;
use byteorder::{ReadBytesExt, WriteBytesExt, LE};
use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{BufWriter, Read, Write};

/// Encoding revision of chunk bytes. Chunks written with any other revision
/// are rebuilt on the next cook.
pub const CHUNK_ENCODING_VERSION: u32 = 2;

/// Version of the on-disk container around a [`MediaAsset`].
pub const MEDIA_ASSET_VERSION: u32 = 1;

const MEDIA_ASSET_MAGIC: [u8; 8] = *b"SBKMEDIA";

/// File extension used for persisted media assets.
pub const MEDIA_ASSET_EXTENSION: &str = "media";

/// One contiguous run of payload bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataChunk {
    pub is_prefetch: bool,
    pub encoding_version: u32,
    #[serde(with = "serde_bytes_compat")]
    pub bytes: Vec<u8>,
}

impl DataChunk {
    pub fn new(bytes: Vec<u8>, is_prefetch: bool) -> Self {
        Self {
            is_prefetch,
            encoding_version: CHUNK_ENCODING_VERSION,
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Per-platform cooked payload of a media item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAssetData {
    /// Prefetch chunk (if any) first, then the full payload.
    pub chunks: Vec<DataChunk>,
    /// Hash of the full source bytes as last committed.
    pub content_hash: u64,
    pub is_streamed: bool,
    pub use_device_memory: bool,
}

impl MediaAssetData {
    /// Replace the chunk list with freshly cut chunks of `bytes`.
    ///
    /// When the media is streamed and `prefetch_size > 0`, a prefetch chunk of
    /// `min(prefetch_size, bytes.len())` leading bytes is emitted first. The
    /// full payload always follows.
    pub fn rebuild_chunks(&mut self, bytes: &[u8], content_hash: u64, prefetch_size: u32) {
        self.chunks.clear();

        if self.is_streamed && prefetch_size > 0 {
            let prefetch_len = (prefetch_size as usize).min(bytes.len());
            self.chunks
                .push(DataChunk::new(bytes[..prefetch_len].to_vec(), true));
        }

        self.chunks.push(DataChunk::new(bytes.to_vec(), false));
        self.content_hash = content_hash;
    }

    /// Leading chunk, which is what gets loaded into memory and registered
    /// with the engine.
    pub fn resident_chunk(&self) -> Option<&DataChunk> {
        self.chunks.first()
    }

    pub fn prefetch_chunk(&self) -> Option<&DataChunk> {
        self.chunks.first().filter(|chunk| chunk.is_prefetch)
    }

    /// Chunk that the streaming layer reads from disk on demand.
    pub fn streamed_chunk(&self) -> Option<&DataChunk> {
        let first = self.chunks.first()?;
        if !first.is_prefetch {
            return Some(first);
        }
        self.chunks.get(1)
    }

    /// Reconstruct the full source bytes from the chunk list.
    pub fn payload_bytes(&self) -> Option<&[u8]> {
        self.chunks
            .iter()
            .find(|chunk| !chunk.is_prefetch)
            .map(|chunk| chunk.bytes.as_slice())
    }

    /// `true` when any chunk was written by an older chunk encoding.
    pub fn has_stale_encoding(&self) -> bool {
        self.chunks
            .iter()
            .any(|chunk| chunk.encoding_version != CHUNK_ENCODING_VERSION)
    }

    /// `true` when the stored prefetch chunk no longer matches `prefetch_size`.
    ///
    /// The expected prefetch length is clamped to the payload length, matching
    /// what [`rebuild_chunks`](Self::rebuild_chunks) writes.
    pub fn prefetch_size_differs(&self, prefetch_size: u32) -> bool {
        if !self.is_streamed {
            return false;
        }

        let payload_len = self.payload_bytes().map_or(0, <[u8]>::len);
        let expected = (prefetch_size > 0).then(|| (prefetch_size as usize).min(payload_len));
        let actual = self.prefetch_chunk().map(DataChunk::len);
        expected != actual
    }

    /// Whether the resident chunk should be brought into memory as soon as
    /// the asset is loaded.
    ///
    /// In-memory media always qualifies. Streamed media qualifies only when it
    /// has a prefetch chunk followed by the remainder. Either way the owning
    /// asset must be flagged `auto_load`.
    pub fn needs_auto_loading(&self, auto_load: bool) -> bool {
        let has_prefetch_and_rest = self.chunks.len() > 1 && self.chunks[0].is_prefetch;
        (!self.is_streamed || has_prefetch_and_rest) && auto_load
    }
}

/// A cooked media item with one [`MediaAssetData`] per platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAsset {
    pub id: MediaId,
    pub media_name: String,
    /// Empty for shared (SFX) media.
    pub language: String,
    pub auto_load: bool,
    pub platform_data: BTreeMap<String, MediaAssetData>,
}

impl MediaAsset {
    pub fn new(id: MediaId) -> Self {
        Self {
            id,
            media_name: String::new(),
            language: String::new(),
            auto_load: true,
            platform_data: BTreeMap::new(),
        }
    }

    pub fn find_or_add_platform_data(&mut self, platform: &str) -> &mut MediaAssetData {
        self.platform_data.entry(platform.to_string()).or_default()
    }

    /// Serialize into the on-disk container.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let body = rmp_serde::to_vec_named(self)?;

        let mut out = Vec::with_capacity(body.len() / 2 + 12);
        out.write_all(&MEDIA_ASSET_MAGIC)?;
        out.write_u32::<LE>(MEDIA_ASSET_VERSION)?;

        let mut encoder = zstd::Encoder::new(BufWriter::new(&mut out), 3)?;
        encoder.write_all(&body)?;
        encoder.finish()?.flush()?;

        Ok(out)
    }

    /// Parse the on-disk container.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = bytes;

        let mut magic = [0u8; 8];
        reader
            .read_exact(&mut magic)
            .map_err(|_| Error::InvalidHeader)?;
        if magic != MEDIA_ASSET_MAGIC {
            return Err(Error::InvalidHeader);
        }

        let version = reader.read_u32::<LE>()?;
        if version != MEDIA_ASSET_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }

        let body = zstd::decode_all(reader)?;
        Ok(rmp_serde::from_slice(&body)?)
    }

    /// Load a media asset from disk.
    ///
    /// Returns `Ok(None)` if the file doesn't exist.
    pub fn load(path: &Utf8Path) -> Result<Option<Self>> {
        if !path.as_std_path().exists() {
            return Ok(None);
        }

        let bytes = std::fs::read(path.as_std_path())?;
        Self::decode(&bytes).map(Some)
    }

    /// Save to disk, creating parent directories if needed.
    pub fn save(&self, path: &Utf8Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent.as_std_path())?;
        }

        std::fs::write(path.as_std_path(), self.encode()?)?;
        tracing::debug!("Saved media asset {} to {}", self.id, path);
        Ok(())
    }
}

/// Store byte buffers as a MessagePack binary rather than an integer array.
pub(crate) mod serde_bytes_compat {
    use serde::de::{Deserializer, Error, SeqAccess, Visitor};
    use serde::Serializer;
    use std::fmt;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        struct BytesVisitor;

        impl<'de> Visitor<'de> for BytesVisitor {
            type Value = Vec<u8>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a byte buffer")
            }

            fn visit_bytes<E: Error>(self, v: &[u8]) -> Result<Self::Value, E> {
                Ok(v.to_vec())
            }

            fn visit_byte_buf<E: Error>(self, v: Vec<u8>) -> Result<Self::Value, E> {
                Ok(v)
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut out = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(byte) = seq.next_element::<u8>()? {
                    out.push(byte);
                }
                Ok(out)
            }
        }

        deserializer.deserialize_byte_buf(BytesVisitor)
    }
}
