//! Per-platform sound data attached to catalog assets.
//!
//! Every sound asset (event, bank, init bank, aux bus) owns one [`AssetData`]
//! per platform. The variants share a [`BankPayload`] and a [`MediaSet`];
//! events additionally carry playback metadata and per-language media sets.

use crate::asset::serde_bytes_compat;
use crate::ids::{Guid, MediaId};
use crate::switch_container::{trees_equal, SwitchContainerNode};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Kind of sound asset that owns a piece of [`AssetData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssetKind {
    Event,
    Bank,
    InitBank,
    AuxBus,
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AssetKind::Event => "event",
            AssetKind::Bank => "bank",
            AssetKind::InitBank => "init bank",
            AssetKind::AuxBus => "aux bus",
        };
        f.write_str(name)
    }
}

/// Generated bank binary plus the hash reported by the authoring tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankPayload {
    pub cached_hash: u32,
    #[serde(with = "serde_bytes_compat", default)]
    pub bytes: Vec<u8>,
}

impl BankPayload {
    /// Store `hash` and report whether it differed.
    pub fn update_hash(&mut self, hash: u32) -> bool {
        if self.cached_hash == hash {
            return false;
        }
        self.cached_hash = hash;
        true
    }

    /// Replace the stored bank bytes when they differ from `bytes`.
    pub fn replace_if_different(&mut self, bytes: &[u8]) -> bool {
        if self.bytes == bytes {
            return false;
        }
        self.bytes = bytes.to_vec();
        true
    }
}

/// Media referenced by one owner on one platform (and language, for events).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaSet {
    /// Media always loaded with the owner.
    pub media: Vec<MediaId>,
    /// Media collected during the current build, committed at finalize.
    #[serde(skip)]
    pub pending_media: Vec<MediaId>,
    pub switch_containers: Vec<SwitchContainerNode>,
    pub default_group_value: Option<Guid>,
}

impl PartialEq for MediaSet {
    fn eq(&self, other: &Self) -> bool {
        !media_lists_differ(&self.media, &other.media)
            && trees_equal(&self.switch_containers, &other.switch_containers)
            && self.default_group_value == other.default_group_value
    }
}

impl MediaSet {
    /// Start collecting a fresh media list for this build.
    pub fn begin_collect(&mut self) {
        self.pending_media.clear();
    }

    /// Add collected media ids, skipping those already pending.
    pub fn stage_media(&mut self, ids: &[MediaId]) {
        for id in ids {
            if !self.pending_media.contains(id) {
                self.pending_media.push(*id);
            }
        }
    }

    /// Replace the committed list with the collected one.
    ///
    /// Returns `true` when the list changed.
    pub fn commit_pending(&mut self) -> bool {
        let pending = std::mem::take(&mut self.pending_media);
        if media_lists_differ(&self.media, &pending) {
            self.media = pending;
            true
        } else {
            false
        }
    }

    /// Replace the switch-container forest if it differs structurally.
    pub fn replace_switch_containers(&mut self, nodes: Vec<SwitchContainerNode>) -> bool {
        if trees_equal(&self.switch_containers, &nodes) {
            return false;
        }
        self.switch_containers = nodes;
        true
    }

    /// Set the default group value. A `None` never clears an existing value.
    pub fn update_default_group_value(&mut self, value: Option<Guid>) -> bool {
        match value {
            Some(value) if self.default_group_value != Some(value) => {
                self.default_group_value = Some(value);
                true
            }
            _ => false,
        }
    }

    /// Always-loaded media plus everything gated by switch containers,
    /// sorted and deduplicated.
    pub fn all_media(&self) -> Vec<MediaId> {
        let mut out = self.media.clone();
        for node in &self.switch_containers {
            node.collect_media(&mut out);
        }
        out.sort_unstable();
        out.dedup();
        out
    }
}

/// `true` when the two lists do not hold the same media.
///
/// Order is ignored. Lists of different lengths always differ.
pub fn media_lists_differ(old: &[MediaId], new: &[MediaId]) -> bool {
    old.len() != new.len() || old.iter().any(|id| !new.contains(id))
}

/// Insert every id into `set`, returning `true` if any was new.
fn insert_all(set: &mut BTreeSet<Guid>, ids: impl IntoIterator<Item = Guid>) -> bool {
    let mut changed = false;
    for id in ids {
        changed |= set.insert(id);
    }
    changed
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventData {
    pub payload: BankPayload,
    pub media: MediaSet,
    /// Per-language media for localized events.
    pub localized: BTreeMap<String, MediaSet>,
    pub max_attenuation_radius: f32,
    pub is_infinite: bool,
    pub minimum_duration: f32,
    pub maximum_duration: f32,
    pub posted_events: BTreeSet<Guid>,
    pub user_defined_sends: BTreeSet<Guid>,
    pub posted_triggers: BTreeSet<Guid>,
    pub group_values: BTreeSet<Guid>,
}

impl Default for EventData {
    fn default() -> Self {
        Self {
            payload: BankPayload::default(),
            media: MediaSet::default(),
            localized: BTreeMap::new(),
            max_attenuation_radius: 0.0,
            is_infinite: true,
            minimum_duration: 0.0,
            maximum_duration: 0.0,
            posted_events: BTreeSet::new(),
            user_defined_sends: BTreeSet::new(),
            posted_triggers: BTreeSet::new(),
            group_values: BTreeSet::new(),
        }
    }
}

impl EventData {
    pub fn add_posted_events(&mut self, ids: impl IntoIterator<Item = Guid>) -> bool {
        insert_all(&mut self.posted_events, ids)
    }

    pub fn add_user_defined_sends(&mut self, ids: impl IntoIterator<Item = Guid>) -> bool {
        insert_all(&mut self.user_defined_sends, ids)
    }

    pub fn add_posted_triggers(&mut self, ids: impl IntoIterator<Item = Guid>) -> bool {
        insert_all(&mut self.posted_triggers, ids)
    }

    pub fn add_group_values(&mut self, ids: impl IntoIterator<Item = Guid>) -> bool {
        insert_all(&mut self.group_values, ids)
    }

    /// Media set for `language`, or the shared set when `language` is empty.
    pub fn media_for_language_mut(&mut self, language: &str) -> &mut MediaSet {
        if language.is_empty() {
            &mut self.media
        } else {
            self.localized.entry(language.to_string()).or_default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankData {
    pub payload: BankPayload,
    pub media: MediaSet,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuxBusData {
    pub payload: BankPayload,
    pub media: MediaSet,
}

/// A sound engine plugin the init bank depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginInfo {
    pub name: String,
    pub plugin_id: u32,
    pub dll: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitBankData {
    pub payload: BankPayload,
    pub media: MediaSet,
    pub plugins: Vec<PluginInfo>,
}

impl InitBankData {
    /// Replace the plugin list when the set of plugin ids changed.
    pub fn replace_plugins(&mut self, plugins: Vec<PluginInfo>) -> bool {
        let changed = self.plugins.len() != plugins.len()
            || self
                .plugins
                .iter()
                .any(|old| !plugins.iter().any(|new| new.plugin_id == old.plugin_id));

        if changed {
            self.plugins = plugins;
        }
        changed
    }
}

/// Tagged per-platform sound data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AssetData {
    Event(EventData),
    Bank(BankData),
    InitBank(InitBankData),
    AuxBus(AuxBusData),
}

impl AssetData {
    pub fn new(kind: AssetKind) -> Self {
        match kind {
            AssetKind::Event => AssetData::Event(EventData::default()),
            AssetKind::Bank => AssetData::Bank(BankData::default()),
            AssetKind::InitBank => AssetData::InitBank(InitBankData::default()),
            AssetKind::AuxBus => AssetData::AuxBus(AuxBusData::default()),
        }
    }

    pub fn payload_mut(&mut self) -> &mut BankPayload {
        match self {
            AssetData::Event(data) => &mut data.payload,
            AssetData::Bank(data) => &mut data.payload,
            AssetData::InitBank(data) => &mut data.payload,
            AssetData::AuxBus(data) => &mut data.payload,
        }
    }

    pub fn media_set_mut(&mut self) -> &mut MediaSet {
        match self {
            AssetData::Event(data) => &mut data.media,
            AssetData::Bank(data) => &mut data.media,
            AssetData::InitBank(data) => &mut data.media,
            AssetData::AuxBus(data) => &mut data.media,
        }
    }

    /// Media set for `language`. Only events keep per-language sets; other
    /// kinds always return their shared set.
    pub fn media_set_for(&mut self, language: &str) -> &mut MediaSet {
        match self {
            AssetData::Event(data) => data.media_for_language_mut(language),
            other => other.media_set_mut(),
        }
    }

    /// Every media set held by this data, shared first.
    pub fn media_sets_mut(&mut self) -> Vec<&mut MediaSet> {
        match self {
            AssetData::Event(data) => {
                let mut sets = vec![&mut data.media];
                sets.extend(data.localized.values_mut());
                sets
            }
            other => vec![other.media_set_mut()],
        }
    }

    pub fn as_event_mut(&mut self) -> Option<&mut EventData> {
        match self {
            AssetData::Event(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_init_bank_mut(&mut self) -> Option<&mut InitBankData> {
        match self {
            AssetData::InitBank(data) => Some(data),
            _ => None,
        }
    }
}

/// Read-only capabilities shared by every kind of sound data.
pub trait SoundData {
    fn kind(&self) -> AssetKind;

    fn bank_payload(&self) -> &BankPayload;

    fn media_set(&self) -> &MediaSet;

    /// Media that must be resident for this data to play.
    fn media_list(&self) -> Vec<MediaId> {
        self.media_set().all_media()
    }
}

macro_rules! impl_sound_data {
    ($ty:ty, $kind:expr) => {
        impl SoundData for $ty {
            fn kind(&self) -> AssetKind {
                $kind
            }

            fn bank_payload(&self) -> &BankPayload {
                &self.payload
            }

            fn media_set(&self) -> &MediaSet {
                &self.media
            }
        }
    };
}

impl_sound_data!(EventData, AssetKind::Event);
impl_sound_data!(BankData, AssetKind::Bank);
impl_sound_data!(InitBankData, AssetKind::InitBank);
impl_sound_data!(AuxBusData, AssetKind::AuxBus);

impl SoundData for AssetData {
    fn kind(&self) -> AssetKind {
        match self {
            AssetData::Event(_) => AssetKind::Event,
            AssetData::Bank(_) => AssetKind::Bank,
            AssetData::InitBank(_) => AssetKind::InitBank,
            AssetData::AuxBus(_) => AssetKind::AuxBus,
        }
    }

    fn bank_payload(&self) -> &BankPayload {
        match self {
            AssetData::Event(data) => data.bank_payload(),
            AssetData::Bank(data) => data.bank_payload(),
            AssetData::InitBank(data) => data.bank_payload(),
            AssetData::AuxBus(data) => data.bank_payload(),
        }
    }

    fn media_set(&self) -> &MediaSet {
        match self {
            AssetData::Event(data) => data.media_set(),
            AssetData::Bank(data) => data.media_set(),
            AssetData::InitBank(data) => data.media_set(),
            AssetData::AuxBus(data) => data.media_set(),
        }
    }

    fn media_list(&self) -> Vec<MediaId> {
        match self {
            AssetData::Event(data) => {
                let mut out = data.media.all_media();
                for set in data.localized.values() {
                    out.extend(set.all_media());
                }
                out.sort_unstable();
                out.dedup();
                out
            }
            _ => self.media_set().all_media(),
        }
    }
}
