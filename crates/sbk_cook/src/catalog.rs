//! The catalog of authored sound objects.
//!
//! Events, aux busses, banks, the init bank and game syncs exist before any
//! build runs; the cook pipeline only updates them. The catalog is the
//! [`LiveAssetIndex`] the parser resolves exported GUIDs and names against,
//! and it owns the per-platform [`AssetData`] of every sound object.
//!
//! The set of objects is fixed for the duration of a build, so the lookup
//! tables need no locking. Each object sits behind its own mutex so parse
//! stages of different platforms can update unrelated objects in parallel.
//!
//! # JSON format
//!
//! ```json
//! {
//!   "version": 1,
//!   "objects": [
//!     { "kind": "event", "name": "Play_Shot", "guid": "{...}", "shortId": 42 }
//!   ]
//! }
//! ```

use crate::error::Result;
use camino::Utf8Path;
use parking_lot::Mutex;
use sbk_core::{AssetData, AssetKind, Guid, MediaId, ShortId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub const CATALOG_VERSION: u32 = 1;

/// Kinds of authored objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ObjectKind {
    Event,
    AuxBus,
    Bank,
    InitBank,
    /// A state or switch value.
    GroupValue,
    GameParameter,
    Trigger,
}

impl ObjectKind {
    /// The kind of sound data this object owns, if any.
    pub fn asset_kind(self) -> Option<AssetKind> {
        match self {
            ObjectKind::Event => Some(AssetKind::Event),
            ObjectKind::AuxBus => Some(AssetKind::AuxBus),
            ObjectKind::Bank => Some(AssetKind::Bank),
            ObjectKind::InitBank => Some(AssetKind::InitBank),
            _ => None,
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ObjectKind::Event => "event",
            ObjectKind::AuxBus => "auxBus",
            ObjectKind::Bank => "bank",
            ObjectKind::InitBank => "initBank",
            ObjectKind::GroupValue => "groupValue",
            ObjectKind::GameParameter => "gameParameter",
            ObjectKind::Trigger => "trigger",
        };
        f.write_str(name)
    }
}

/// Identity of anything a build can dirty.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum AssetKey {
    /// A catalog object, unique by kind and name.
    Object { kind: ObjectKind, name: String },
    /// A cooked media asset.
    Media { id: MediaId },
}

impl AssetKey {
    pub fn object(kind: ObjectKind, name: impl Into<String>) -> Self {
        AssetKey::Object {
            kind,
            name: name.into(),
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, AssetKey::Object { .. })
    }
}

impl std::fmt::Display for AssetKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetKey::Object { kind, name } => write!(f, "{}:{}", kind, name),
            AssetKey::Media { id } => write!(f, "media:{}", id),
        }
    }
}

/// One authored object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogObject {
    pub kind: ObjectKind,
    pub name: String,
    #[serde(default)]
    pub guid: Option<Guid>,
    #[serde(default)]
    pub short_id: ShortId,
    /// Group a value belongs to. Group values only.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub group_short_id: ShortId,
    /// Media gated by this value in switch containers. Group values only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media_dependencies: Vec<MediaId>,
    /// Init bank only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_language: Option<String>,
    /// Sound data per platform.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub platform_data: BTreeMap<String, AssetData>,
}

fn is_zero(value: &ShortId) -> bool {
    *value == 0
}

impl CatalogObject {
    pub fn new(kind: ObjectKind, name: impl Into<String>, guid: Option<Guid>) -> Self {
        Self {
            kind,
            name: name.into(),
            guid,
            short_id: 0,
            group_short_id: 0,
            media_dependencies: Vec::new(),
            default_language: None,
            platform_data: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> AssetKey {
        AssetKey::object(self.kind, self.name.clone())
    }

    /// Platform data for `platform`, created with this object's sound data
    /// kind. `None` for objects that own no sound data.
    pub fn find_or_add_platform_data(&mut self, platform: &str) -> Option<&mut AssetData> {
        let kind = self.kind.asset_kind()?;
        Some(
            self.platform_data
                .entry(platform.to_string())
                .or_insert_with(|| AssetData::new(kind)),
        )
    }

    /// Store `id` and report whether it differed.
    pub fn update_short_id(&mut self, id: ShortId) -> bool {
        if self.short_id == id {
            return false;
        }
        self.short_id = id;
        true
    }
}

/// GUID and name lookups over authored objects.
pub trait LiveAssetIndex: Sync {
    fn find_by_guid(&self, kind: ObjectKind, guid: &Guid) -> Option<AssetKey>;

    fn find_by_name(&self, kind: ObjectKind, name: &str) -> Vec<AssetKey>;

    /// GUID lookup falling back to the first name match.
    fn find_by_guid_or_name(
        &self,
        kind: ObjectKind,
        guid: Option<&Guid>,
        name: Option<&str>,
    ) -> Option<AssetKey> {
        guid.and_then(|guid| self.find_by_guid(kind, guid))
            .or_else(|| name.and_then(|name| self.find_by_name(kind, name).into_iter().next()))
    }
}

#[derive(Serialize, Deserialize)]
struct CatalogFile {
    version: u32,
    objects: Vec<CatalogObject>,
}

/// In-memory catalog, persisted as `catalog.json`.
#[derive(Default)]
pub struct AssetCatalog {
    objects: BTreeMap<AssetKey, Mutex<CatalogObject>>,
    by_guid: HashMap<(ObjectKind, Guid), AssetKey>,
}

impl AssetCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object, replacing any object with the same kind and name.
    pub fn insert(&mut self, object: CatalogObject) -> AssetKey {
        let key = object.key();
        if let Some(guid) = object.guid {
            self.by_guid.insert((object.kind, guid), key.clone());
        }
        self.objects.insert(key.clone(), Mutex::new(object));
        key
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn object(&self, key: &AssetKey) -> Option<&Mutex<CatalogObject>> {
        self.objects.get(key)
    }

    /// Run `f` on the object under its lock.
    pub fn with_object<R>(
        &self,
        key: &AssetKey,
        f: impl FnOnce(&mut CatalogObject) -> R,
    ) -> Option<R> {
        self.objects.get(key).map(|object| f(&mut object.lock()))
    }

    /// A copy of the object.
    pub fn snapshot(&self, key: &AssetKey) -> Option<CatalogObject> {
        self.with_object(key, |object| object.clone())
    }

    pub fn keys(&self) -> impl Iterator<Item = &AssetKey> {
        self.objects.keys()
    }

    /// The init bank, if the catalog has one.
    pub fn init_bank(&self) -> Option<AssetKey> {
        self.objects
            .keys()
            .find(|key| matches!(key, AssetKey::Object { kind: ObjectKind::InitBank, .. }))
            .cloned()
    }

    /// Load a catalog from a file.
    ///
    /// Returns `Ok(None)` if the file doesn't exist.
    pub fn load(path: &Utf8Path) -> Result<Option<Self>> {
        if !path.as_std_path().exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(path.as_std_path())?;
        let file: CatalogFile = serde_json::from_str(&contents)?;
        if file.version != CATALOG_VERSION {
            tracing::warn!(
                "Catalog {} has version {}, expected {}",
                path,
                file.version,
                CATALOG_VERSION
            );
        }

        let mut catalog = Self::new();
        for object in file.objects {
            catalog.insert(object);
        }
        Ok(Some(catalog))
    }

    /// Save the catalog, creating parent directories if needed.
    pub fn save(&self, path: &Utf8Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent.as_std_path())?;
        }

        let file = CatalogFile {
            version: CATALOG_VERSION,
            objects: self
                .objects
                .values()
                .map(|object| object.lock().clone())
                .collect(),
        };

        let contents = serde_json::to_string_pretty(&file)?;
        std::fs::write(path.as_std_path(), contents)?;
        Ok(())
    }
}

impl LiveAssetIndex for AssetCatalog {
    fn find_by_guid(&self, kind: ObjectKind, guid: &Guid) -> Option<AssetKey> {
        self.by_guid.get(&(kind, *guid)).cloned()
    }

    fn find_by_name(&self, kind: ObjectKind, name: &str) -> Vec<AssetKey> {
        let key = AssetKey::object(kind, name);
        if self.objects.contains_key(&key) {
            vec![key]
        } else {
            Vec::new()
        }
    }
}
