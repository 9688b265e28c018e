//! Core shared data model for sound bank media cooking and streaming.
//!
//! This crate provides the types used by both the `sbk_cook` build pipeline
//! and the `sbk_media` runtime:
//!
//! - **Identities**: [`MediaId`], [`ShortId`] and the braced [`Guid`] format
//!   used by the authoring tool.
//! - **Content hashing**: [`content_hash`] and the streaming [`ContentHasher`]
//!   used for change detection.
//! - **Persisted media assets**: [`MediaAsset`] / [`MediaAssetData`] with their
//!   prefetch/full [`DataChunk`] split.
//! - **Sound data variants**: [`AssetData`] (event, bank, init bank, aux bus)
//!   and the [`SoundData`] capability trait.
//! - **Switch containers**: [`SwitchContainerNode`] trees with order-insensitive
//!   structural equality.

pub mod asset;
pub mod asset_data;
pub mod error;
pub mod hash;
pub mod ids;
pub mod switch_container;

pub use asset::{DataChunk, MediaAsset, MediaAssetData, CHUNK_ENCODING_VERSION};
pub use asset_data::{
    media_lists_differ, AssetData, AssetKind, AuxBusData, BankData, BankPayload, EventData,
    InitBankData, MediaSet, PluginInfo, SoundData,
};
pub use error::{Error, Result};
pub use hash::{content_hash, ContentHasher};
pub use ids::{Guid, MediaId, ShortId};
pub use switch_container::SwitchContainerNode;
