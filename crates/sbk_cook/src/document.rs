//! Bank export documents written by the authoring tool.
//!
//! One JSON document describes one sound bank for one platform. The tool
//! writes numeric ids as decimal strings, but numbers are accepted too. A file
//! may hold the bank object itself or the wrapped form
//! `{"SoundBanksInfo": {"SoundBanks": [...]}}`.
//!
//! Array entries are wrapped in [`Lenient`] so that one malformed entry does
//! not reject the whole document: the parser records the failure and moves on.

use sbk_core::{Guid, MediaId, ShortId};
use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;

/// A document entry that either deserialized or failed with a message.
#[derive(Debug, Clone, PartialEq)]
pub struct Lenient<T>(pub Result<T, String>);

impl<T> Lenient<T> {
    pub fn as_result(&self) -> Result<&T, &str> {
        self.0.as_ref().map_err(String::as_str)
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Lenient<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Lenient(T::deserialize(value).map_err(|e| e.to_string())))
    }
}

/// One sound bank as exported for one platform.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SoundBankDocument {
    #[serde(deserialize_with = "de::opt_short_id")]
    pub id: Option<ShortId>,
    #[serde(rename = "GUID")]
    pub guid: Option<String>,
    pub short_name: Option<String>,
    /// `"SFX"` for shared banks, otherwise the language name.
    pub language: Option<String>,
    pub path: Option<String>,
    /// Bank hash, a decimal string.
    #[serde(deserialize_with = "de::opt_short_id")]
    pub hash: Option<u32>,
    pub referenced_streamed_files: Vec<Lenient<MediaReference>>,
    pub excluded_memory_files: Vec<Lenient<MediaReference>>,
    pub included_events: Vec<Lenient<EventEntry>>,
    pub included_aux_busses: Vec<Lenient<AuxBusEntry>>,
    pub state_groups: Vec<Lenient<GroupEntry>>,
    pub switch_groups: Vec<Lenient<GroupEntry>>,
    pub game_parameters: Vec<Lenient<GameSyncEntry>>,
    pub included_triggers: Vec<Lenient<GameSyncEntry>>,
    pub plugins: Vec<Lenient<PluginEntry>>,
}

impl SoundBankDocument {
    pub fn name(&self) -> &str {
        self.short_name.as_deref().unwrap_or_default()
    }

    pub fn guid(&self) -> Option<Guid> {
        self.guid.as_deref().and_then(parse_guid)
    }
}

/// A media file referenced by a bank or an event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaReference {
    #[serde(deserialize_with = "de::short_id")]
    pub id: MediaId,
    #[serde(default)]
    pub language: String,
    /// Location of the source file relative to the platform cache folder.
    pub path: String,
    #[serde(default)]
    pub short_name: String,
    #[serde(default, deserialize_with = "de::opt_flag")]
    pub use_device_memory: Option<bool>,
    #[serde(default, deserialize_with = "de::opt_flag")]
    pub using_reference_language_as_stand_in: Option<bool>,
    #[serde(default, deserialize_with = "de::opt_short_id")]
    pub prefetch_size: Option<u32>,
}

/// An event entry of `IncludedEvents`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct EventEntry {
    #[serde(deserialize_with = "de::opt_short_id")]
    pub id: Option<ShortId>,
    #[serde(rename = "GUID")]
    pub guid: Option<String>,
    pub name: Option<String>,
    #[serde(deserialize_with = "de::opt_f32")]
    pub max_attenuation: Option<f32>,
    pub duration_type: Option<String>,
    #[serde(deserialize_with = "de::opt_f32")]
    pub duration_min: Option<f32>,
    #[serde(deserialize_with = "de::opt_f32")]
    pub duration_max: Option<f32>,
    pub referenced_streamed_files: Vec<Lenient<MediaReference>>,
    pub excluded_memory_files: Vec<Lenient<MediaReference>>,
    pub switch_containers: Vec<Lenient<SwitchContainerEntry>>,
    pub default_switch_value: Option<String>,
    pub action_post_event: Vec<Lenient<GuidRef>>,
    pub aux_bus_sends: Vec<Lenient<GuidRef>>,
    pub action_trigger: Vec<Lenient<GuidRef>>,
    pub action_set_switch: Vec<Lenient<GuidRef>>,
    pub action_set_state: Vec<Lenient<GuidRef>>,
}

impl EventEntry {
    pub fn guid(&self) -> Option<Guid> {
        self.guid.as_deref().and_then(parse_guid)
    }

    /// Absent, `Infinite` and `Unknown` durations all count as infinite.
    pub fn is_infinite(&self) -> bool {
        matches!(
            self.duration_type.as_deref(),
            None | Some("Infinite") | Some("Unknown")
        )
    }
}

/// A node of an exported switch-container tree.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SwitchContainerEntry {
    pub switch_value: String,
    pub default_switch_value: Option<String>,
    pub media: Vec<Lenient<SwitchMediaRef>>,
    pub children: Vec<Lenient<SwitchContainerEntry>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SwitchMediaRef {
    #[serde(deserialize_with = "de::short_id")]
    pub id: MediaId,
}

/// A reference to another authored object by GUID.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GuidRef {
    #[serde(rename = "GUID")]
    pub guid: String,
}

impl GuidRef {
    pub fn parse(&self) -> Option<Guid> {
        parse_guid(&self.guid)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AuxBusEntry {
    #[serde(deserialize_with = "de::opt_short_id")]
    pub id: Option<ShortId>,
    #[serde(rename = "GUID")]
    pub guid: Option<String>,
    pub name: Option<String>,
}

impl AuxBusEntry {
    pub fn guid(&self) -> Option<Guid> {
        self.guid.as_deref().and_then(parse_guid)
    }
}

/// A state group or switch group with its values.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GroupEntry {
    #[serde(deserialize_with = "de::short_id")]
    pub id: ShortId,
    #[serde(default)]
    pub states: Vec<Lenient<GameSyncEntry>>,
    #[serde(default)]
    pub switches: Vec<Lenient<GameSyncEntry>>,
}

impl GroupEntry {
    pub fn values(&self) -> impl Iterator<Item = &Lenient<GameSyncEntry>> {
        self.states.iter().chain(self.switches.iter())
    }
}

/// A group value, game parameter or trigger.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GameSyncEntry {
    #[serde(rename = "GUID")]
    pub guid: String,
    #[serde(rename = "Id", deserialize_with = "de::short_id")]
    pub id: ShortId,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PluginEntry {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "ID", deserialize_with = "de::short_id")]
    pub id: u32,
    #[serde(rename = "DLL")]
    pub dll: Option<String>,
}

/// Parse a braced GUID, returning `None` when it is malformed.
pub fn parse_guid(s: &str) -> Option<Guid> {
    Guid::parse_braced(s.trim()).ok()
}

/// Parse an export file into its bank documents.
pub fn parse_export(bytes: &[u8]) -> serde_json::Result<Vec<SoundBankDocument>> {
    #[derive(Deserialize)]
    struct Wrapped {
        #[serde(rename = "SoundBanks", default)]
        sound_banks: Vec<SoundBankDocument>,
    }

    let mut value: Value = serde_json::from_slice(bytes)?;
    if let Some(info) = value.get_mut("SoundBanksInfo") {
        let wrapped: Wrapped = serde_json::from_value(info.take())?;
        return Ok(wrapped.sound_banks);
    }

    Ok(vec![serde_json::from_value(value)?])
}

mod de {
    use serde::de::{Deserializer, Error};
    use serde::Deserialize;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Bool(bool),
        Number(serde_json::Number),
        String(String),
    }

    fn to_u32<E: Error>(scalar: Scalar) -> Result<u32, E> {
        match scalar {
            Scalar::String(s) => s
                .trim()
                .parse::<u32>()
                .map_err(|e| E::custom(format!("invalid id '{}': {}", s, e))),
            Scalar::Number(n) => n
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| E::custom(format!("invalid id {}", n))),
            Scalar::Bool(b) => Err(E::custom(format!("expected an id, found {}", b))),
        }
    }

    pub fn short_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        to_u32(Scalar::deserialize(deserializer)?)
    }

    pub fn opt_short_id<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<u32>, D::Error> {
        Option::<Scalar>::deserialize(deserializer)?
            .map(to_u32)
            .transpose()
    }

    pub fn opt_f32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f32>, D::Error> {
        match Option::<Scalar>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Scalar::String(s)) => s
                .trim()
                .parse::<f32>()
                .map(Some)
                .map_err(|e| D::Error::custom(format!("invalid number '{}': {}", s, e))),
            Some(Scalar::Number(n)) => Ok(n.as_f64().map(|v| v as f32)),
            Some(Scalar::Bool(b)) => {
                Err(D::Error::custom(format!("expected a number, found {}", b)))
            }
        }
    }

    /// Booleans arrive either as JSON booleans or as `"true"`/`"false"`.
    pub fn opt_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
        match Option::<Scalar>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Scalar::Bool(b)) => Ok(Some(b)),
            Some(Scalar::String(s)) => Ok(Some(s.eq_ignore_ascii_case("true"))),
            Some(Scalar::Number(n)) => Ok(Some(n.as_u64().is_some_and(|v| v != 0))),
        }
    }
}
