//! Bank metadata parsing.
//!
//! [`BankMetadataParser`] turns one bank export document into updates of the
//! catalog and the build run:
//!
//! - game-sync short ids (group values, game parameters, triggers)
//! - media references, merged into the [`CookPlanner`](crate::planner::CookPlanner)
//!   and staged into the media set of their owner
//! - switch-container trees, which move gated media out of the always-loaded
//!   list
//! - event playback metadata and referenced-object sets
//! - aux-bus short ids, init-bank plugins and the bank hash
//!
//! Catalog objects are locked one at a time and never while another object
//! lock is held. Everything that only needs lookups is computed first.

use crate::catalog::{AssetCatalog, AssetKey, CatalogObject, LiveAssetIndex, ObjectKind};
use crate::document::{
    parse_guid, EventEntry, GameSyncEntry, GuidRef, Lenient, MediaReference, SoundBankDocument,
    SwitchContainerEntry,
};
use crate::error::{ParseError, Result};
use crate::paths::{display_name, media_asset_path, normalize_language};
use crate::planner::{MediaEntry, PlatformMediaAttributes};
use crate::run::{BuildRun, OwnerSlot};
use camino::Utf8PathBuf;
use sbk_core::{AssetData, EventData, Guid, MediaId, PluginInfo, ShortId, SwitchContainerNode};
use std::collections::BTreeSet;

/// Name of the init bank in exports.
pub const INIT_BANK_NAME: &str = "Init";

/// Prefix of banks generated for a single event or aux bus.
pub const AUTO_BANK_PREFIX: &str = "SB_";

/// Plugin DLL names that are part of the engine itself.
const BUILTIN_PLUGIN_DLLS: [&str; 2] = ["DefaultSink", "AkSoundEngineDLL"];

/// Parser options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserSettings {
    /// Place media assets in `xx/yy` subfolders.
    pub split_media_per_folder: bool,
    /// Parse switch containers so gated media load on demand.
    pub split_switch_container_media: bool,
    pub default_language: String,
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self {
            split_media_per_folder: true,
            split_switch_container_media: true,
            default_language: "English(US)".to_string(),
        }
    }
}

/// Where a document came from and what it applies to.
struct DocumentContext<'a> {
    source: &'a str,
    platform: &'a str,
    /// Normalized bank language, empty for shared banks.
    language: String,
    is_init_bank: bool,
}

/// Event updates computed before the event is locked.
#[derive(Default)]
struct EventUpdate {
    media: Vec<MediaId>,
    switch_containers: Option<Vec<SwitchContainerNode>>,
    default_group_value: Option<Guid>,
    posted_events: Vec<Guid>,
    user_defined_sends: Vec<Guid>,
    posted_triggers: Vec<Guid>,
    group_values: Vec<Guid>,
}

pub struct BankMetadataParser<'a> {
    run: &'a BuildRun,
    catalog: &'a AssetCatalog,
    settings: ParserSettings,
}

impl<'a> BankMetadataParser<'a> {
    pub fn new(run: &'a BuildRun, catalog: &'a AssetCatalog, settings: ParserSettings) -> Self {
        Self {
            run,
            catalog,
            settings,
        }
    }

    /// Find the catalog object a bank was generated for.
    ///
    /// `Init` is the init bank, `SB_<guid>` an event (or an aux bus), and any
    /// other name a bank of that name.
    pub fn resolve_owner(&self, doc: &SoundBankDocument) -> Option<AssetKey> {
        let name = doc.name();
        if name == INIT_BANK_NAME {
            return self.catalog.init_bank();
        }

        if let Some(guid) = name.strip_prefix(AUTO_BANK_PREFIX).and_then(parse_bank_guid) {
            return self
                .catalog
                .find_by_guid(ObjectKind::Event, &guid)
                .or_else(|| self.catalog.find_by_guid(ObjectKind::AuxBus, &guid));
        }

        self.catalog
            .find_by_name(ObjectKind::Bank, name)
            .into_iter()
            .next()
    }

    /// Parse one document for `platform` into `owner`.
    ///
    /// `bank_bytes` is the generated bank binary, when one was found.
    /// Malformed entries are reported to the run and skipped. Only ordering
    /// violations from the planner are returned as errors.
    pub fn parse(
        &self,
        doc: &SoundBankDocument,
        source: &str,
        platform: &str,
        owner: &AssetKey,
        bank_bytes: Option<&[u8]>,
    ) -> Result<()> {
        let AssetKey::Object { kind, .. } = owner else {
            tracing::warn!("Bank {} resolved to a media asset", doc.name());
            return Ok(());
        };
        let kind = *kind;

        let ctx = DocumentContext {
            source,
            platform,
            language: normalize_language(doc.language.as_deref().unwrap_or_default())
                .to_string(),
            is_init_bank: kind == ObjectKind::InitBank,
        };

        tracing::debug!("Parsing bank {} for {} into {}", doc.name(), platform, owner);

        let mut bank_media = Vec::new();
        self.parse_media(
            &ctx,
            "ReferencedStreamedFiles",
            &doc.referenced_streamed_files,
            true,
            &mut bank_media,
        )?;
        self.parse_media(
            &ctx,
            "ExcludedMemoryFiles",
            &doc.excluded_memory_files,
            false,
            &mut bank_media,
        )?;

        // An event bank takes its media from its own event entry
        let mut staged = Some(bank_media);
        match kind {
            ObjectKind::Event => {
                let guid = self.catalog.with_object(owner, |object| object.guid).flatten();
                let entry = doc
                    .included_events
                    .iter()
                    .filter_map(|event| event.as_result().ok())
                    .find(|event| guid.is_some() && event.guid() == guid);

                if let Some(entry) = entry {
                    self.parse_event(&ctx, owner, entry)?;
                    staged = None;
                }
            }
            ObjectKind::Bank => {
                self.parse_bank_events(&ctx, doc)?;
                self.parse_aux_busses(&ctx, doc);
            }
            ObjectKind::AuxBus => self.parse_aux_busses(&ctx, doc),
            ObjectKind::InitBank => {
                self.parse_init_bank(&ctx, owner, doc);
                self.parse_aux_busses(&ctx, doc);
            }
            _ => {}
        }

        self.parse_game_syncs(&ctx, doc);

        let changed = self
            .catalog
            .with_object(owner, |object| {
                let fresh = self.track(object, &ctx);
                let Some(data) = object.find_or_add_platform_data(platform) else {
                    return false;
                };

                let set = data.media_set_for(&ctx.language);
                if fresh {
                    set.begin_collect();
                }
                if let Some(media) = &staged {
                    set.stage_media(media);
                }

                let payload = data.payload_mut();
                let mut changed = doc.hash.is_some_and(|hash| payload.update_hash(hash));
                if let Some(bytes) = bank_bytes {
                    changed |= payload.replace_if_different(bytes);
                }
                changed
            })
            .unwrap_or(false);

        if changed {
            self.run.mark_dirty(owner.clone());
        }
        Ok(())
    }

    /// Register the media set of `object` for this document with the run.
    /// Returns `true` the first time, when the set must start collecting.
    ///
    /// Called with the object locked so no other stage can stage into the set
    /// between the check and the reset.
    fn track(&self, object: &CatalogObject, ctx: &DocumentContext<'_>) -> bool {
        let language = if object.kind == ObjectKind::Event {
            ctx.language.clone()
        } else {
            String::new()
        };

        self.run.track_owner(OwnerSlot {
            key: object.key(),
            platform: ctx.platform.to_string(),
            language,
        })
    }

    fn report(&self, ctx: &DocumentContext<'_>, section: &str, message: impl Into<String>) {
        self.run.report(ParseError {
            document: ctx.source.to_string(),
            section: section.to_string(),
            message: message.into(),
        });
    }

    fn parse_media(
        &self,
        ctx: &DocumentContext<'_>,
        section: &str,
        entries: &[Lenient<MediaReference>],
        is_streamed: bool,
        out: &mut Vec<MediaId>,
    ) -> Result<()> {
        for entry in entries {
            match entry.as_result() {
                Ok(media) => {
                    if let Some(id) = self.process_media_entry(ctx, media, is_streamed)? {
                        if !out.contains(&id) {
                            out.push(id);
                        }
                    }
                }
                Err(message) => self.report(ctx, section, message),
            }
        }
        Ok(())
    }

    /// Plan one media reference. Returns `None` when the init bank references
    /// media another bank already registered.
    fn process_media_entry(
        &self,
        ctx: &DocumentContext<'_>,
        media: &MediaReference,
        is_streamed: bool,
    ) -> Result<Option<MediaId>> {
        let language = if media.using_reference_language_as_stand_in == Some(true) {
            self.settings.default_language.as_str()
        } else {
            normalize_language(&media.language)
        };

        if ctx.is_init_bank && self.run.is_media_registered(media.id) {
            tracing::debug!("Init bank skips media {} owned by another bank", media.id);
            return Ok(None);
        }

        let asset_path = media_asset_path(media.id, language, self.settings.split_media_per_folder);
        self.run.register_media_path(media.id, &asset_path);

        self.run.planner().merge(
            ctx.platform,
            MediaEntry {
                id: media.id,
                language: language.to_string(),
                cache_path: Utf8PathBuf::from(media.path.replace('\\', "/")),
                display_name: display_name(&media.short_name),
                asset_path,
                attributes: PlatformMediaAttributes {
                    is_streamed,
                    use_device_memory: media.use_device_memory.unwrap_or(false),
                    prefetch_size: media.prefetch_size.unwrap_or(0),
                },
            },
        )?;

        Ok(Some(media.id))
    }

    /// Media, switch containers and references of one event entry.
    fn collect_event(&self, ctx: &DocumentContext<'_>, entry: &EventEntry) -> Result<EventUpdate> {
        let mut update = EventUpdate::default();
        self.parse_media(
            ctx,
            "ReferencedStreamedFiles",
            &entry.referenced_streamed_files,
            true,
            &mut update.media,
        )?;
        self.parse_media(
            ctx,
            "ExcludedMemoryFiles",
            &entry.excluded_memory_files,
            false,
            &mut update.media,
        )?;

        if self.settings.split_switch_container_media {
            let mut nodes = Vec::new();
            for container in &entry.switch_containers {
                match container.as_result() {
                    Ok(container) => {
                        self.parse_switch_container(ctx, container, &mut nodes, &mut update.media)
                    }
                    Err(message) => self.report(ctx, "SwitchContainers", message),
                }
            }
            update.switch_containers = Some(nodes);
        }

        update.default_group_value = entry
            .default_switch_value
            .as_deref()
            .and_then(parse_guid)
            .filter(|guid| self.catalog.find_by_guid(ObjectKind::GroupValue, guid).is_some());

        update.posted_events = self.resolve_refs(
            ctx,
            "ActionPostEvent",
            &entry.action_post_event,
            ObjectKind::Event,
        );
        update.user_defined_sends =
            self.resolve_refs(ctx, "AuxBusSends", &entry.aux_bus_sends, ObjectKind::AuxBus);
        update.posted_triggers = self.resolve_refs(
            ctx,
            "ActionTrigger",
            &entry.action_trigger,
            ObjectKind::Trigger,
        );
        update.group_values = self.resolve_refs(
            ctx,
            "ActionSetSwitch",
            &entry.action_set_switch,
            ObjectKind::GroupValue,
        );
        update.group_values.extend(self.resolve_refs(
            ctx,
            "ActionSetState",
            &entry.action_set_state,
            ObjectKind::GroupValue,
        ));

        Ok(update)
    }

    /// Parse one switch-container node into `siblings`.
    ///
    /// Media under the node leave `media_list` and load only with their group
    /// value. A node whose switch value resolves to the same group value as a
    /// sibling is merged into it.
    fn parse_switch_container(
        &self,
        ctx: &DocumentContext<'_>,
        entry: &SwitchContainerEntry,
        siblings: &mut Vec<SwitchContainerNode>,
        media_list: &mut Vec<MediaId>,
    ) {
        let resolved = parse_guid(&entry.switch_value).and_then(|guid| {
            self.catalog
                .find_by_guid(ObjectKind::GroupValue, &guid)
                .map(|key| (guid, key))
        });

        let existing = resolved.as_ref().and_then(|(guid, _)| {
            siblings
                .iter()
                .position(|node| node.group_value == Some(*guid))
        });
        let mut node = match existing {
            Some(index) => siblings.remove(index),
            None => SwitchContainerNode::new(resolved.as_ref().map(|(guid, _)| *guid)),
        };

        if let Some(default) = entry
            .default_switch_value
            .as_deref()
            .and_then(parse_guid)
            .filter(|guid| self.catalog.find_by_guid(ObjectKind::GroupValue, guid).is_some())
        {
            node.default_group_value = Some(default);
        }

        let mut dependencies = BTreeSet::new();
        for media in &entry.media {
            let media = match media.as_result() {
                Ok(media) => media,
                Err(message) => {
                    self.report(ctx, "SwitchContainers", message);
                    continue;
                }
            };

            self.run.planner().set_auto_load(media.id, false);
            if self.run.is_media_registered(media.id) {
                node.add_media(media.id);
                media_list.retain(|id| *id != media.id);
                dependencies.insert(media.id);
            }
        }

        match &resolved {
            Some((_, key)) => self.run.add_group_media(key.clone(), dependencies),
            None => {
                if !dependencies.is_empty() {
                    tracing::info!(
                        "No group value with GUID {} in {}, its media will auto-load with the event",
                        entry.switch_value,
                        ctx.source
                    );
                }
                self.run.add_fallback_media(dependencies);
            }
        }

        for child in &entry.children {
            match child.as_result() {
                Ok(child) => {
                    self.parse_switch_container(ctx, child, &mut node.children, media_list)
                }
                Err(message) => self.report(ctx, "SwitchContainers", message),
            }
        }

        match existing {
            Some(index) => siblings.insert(index, node),
            None => siblings.push(node),
        }
    }

    /// GUIDs of `refs` that name a catalog object of `kind`.
    fn resolve_refs(
        &self,
        ctx: &DocumentContext<'_>,
        section: &str,
        refs: &[Lenient<GuidRef>],
        kind: ObjectKind,
    ) -> Vec<Guid> {
        let mut out = Vec::new();
        for entry in refs {
            match entry.as_result() {
                Ok(reference) => match reference.parse() {
                    Some(guid) if self.catalog.find_by_guid(kind, &guid).is_some() => {
                        out.push(guid)
                    }
                    Some(guid) => tracing::debug!("No {} with GUID {}", kind, guid),
                    None => self.report(ctx, section, format!("invalid GUID '{}'", reference.guid)),
                },
                Err(message) => self.report(ctx, section, message),
            }
        }
        out
    }

    /// Parse the event entry of an event bank into its owner.
    fn parse_event(
        &self,
        ctx: &DocumentContext<'_>,
        key: &AssetKey,
        entry: &EventEntry,
    ) -> Result<()> {
        let update = self.collect_event(ctx, entry)?;
        if self.apply_event(ctx, key, entry, update) {
            self.run.mark_dirty(key.clone());
        }
        Ok(())
    }

    /// Events of a regular bank: fill their metadata and, per language, their
    /// media sets.
    fn parse_bank_events(&self, ctx: &DocumentContext<'_>, doc: &SoundBankDocument) -> Result<()> {
        for event in &doc.included_events {
            let entry = match event.as_result() {
                Ok(entry) => entry,
                Err(message) => {
                    self.report(ctx, "IncludedEvents", message);
                    continue;
                }
            };

            let guid = entry.guid();
            let Some(key) = self
                .catalog
                .find_by_guid_or_name(ObjectKind::Event, guid.as_ref(), entry.name.as_deref())
            else {
                tracing::debug!(
                    "Event {} of bank {} is not in the catalog",
                    entry.name.as_deref().unwrap_or_default(),
                    doc.name()
                );
                continue;
            };

            self.parse_event(ctx, &key, entry)?;
        }
        Ok(())
    }

    /// Apply an event update under the event's lock. Returns whether anything
    /// but the collected media list changed.
    fn apply_event(
        &self,
        ctx: &DocumentContext<'_>,
        key: &AssetKey,
        entry: &EventEntry,
        update: EventUpdate,
    ) -> bool {
        self.catalog
            .with_object(key, |object| {
                let mut changed = entry.id.is_some_and(|id| object.update_short_id(id));
                let fresh = self.track(object, ctx);

                let Some(AssetData::Event(data)) = object.find_or_add_platform_data(ctx.platform)
                else {
                    return changed;
                };

                changed |= apply_event_info(data, entry);

                let set = data.media_for_language_mut(&ctx.language);
                if fresh {
                    set.begin_collect();
                }
                set.stage_media(&update.media);
                if let Some(nodes) = update.switch_containers {
                    changed |= set.replace_switch_containers(nodes);
                }
                changed |= set.update_default_group_value(update.default_group_value);

                changed |= data.add_posted_events(update.posted_events);
                changed |= data.add_user_defined_sends(update.user_defined_sends);
                changed |= data.add_posted_triggers(update.posted_triggers);
                changed |= data.add_group_values(update.group_values);
                changed
            })
            .unwrap_or(false)
    }

    fn parse_game_syncs(&self, ctx: &DocumentContext<'_>, doc: &SoundBankDocument) {
        for (section, groups) in [
            ("StateGroups", &doc.state_groups),
            ("SwitchGroups", &doc.switch_groups),
        ] {
            for group in groups {
                let group = match group.as_result() {
                    Ok(group) => group,
                    Err(message) => {
                        self.report(ctx, section, message);
                        continue;
                    }
                };

                for value in group.values() {
                    match value.as_result() {
                        Ok(value) => self.update_game_sync(
                            ctx,
                            section,
                            ObjectKind::GroupValue,
                            value,
                            Some(group.id),
                        ),
                        Err(message) => self.report(ctx, section, message),
                    }
                }
            }
        }

        for (section, kind, entries) in [
            ("GameParameters", ObjectKind::GameParameter, &doc.game_parameters),
            ("IncludedTriggers", ObjectKind::Trigger, &doc.included_triggers),
        ] {
            for entry in entries {
                match entry.as_result() {
                    Ok(entry) => self.update_game_sync(ctx, section, kind, entry, None),
                    Err(message) => self.report(ctx, section, message),
                }
            }
        }
    }

    fn update_game_sync(
        &self,
        ctx: &DocumentContext<'_>,
        section: &str,
        kind: ObjectKind,
        entry: &GameSyncEntry,
        group_id: Option<ShortId>,
    ) {
        let Some(guid) = parse_guid(&entry.guid) else {
            self.report(ctx, section, format!("invalid GUID '{}'", entry.guid));
            return;
        };
        let Some(key) = self.catalog.find_by_guid(kind, &guid) else {
            tracing::debug!("No {} with GUID {}", kind, guid);
            return;
        };

        let changed = self
            .catalog
            .with_object(&key, |object| {
                let mut changed = object.update_short_id(entry.id);
                if let Some(group_id) = group_id {
                    if object.group_short_id != group_id {
                        object.group_short_id = group_id;
                        changed = true;
                    }
                }
                changed
            })
            .unwrap_or(false);

        if changed {
            self.run.mark_dirty(key);
        }
    }

    /// Short ids of the aux busses a bank includes, found by GUID or name.
    fn parse_aux_busses(&self, ctx: &DocumentContext<'_>, doc: &SoundBankDocument) {
        for entry in &doc.included_aux_busses {
            let entry = match entry.as_result() {
                Ok(entry) => entry,
                Err(message) => {
                    self.report(ctx, "IncludedAuxBusses", message);
                    continue;
                }
            };

            let guid = entry.guid();
            let Some(key) = self.catalog.find_by_guid_or_name(
                ObjectKind::AuxBus,
                guid.as_ref(),
                entry.name.as_deref(),
            ) else {
                continue;
            };
            let Some(id) = entry.id else {
                continue;
            };

            let changed = self
                .catalog
                .with_object(&key, |object| object.update_short_id(id))
                .unwrap_or(false);
            if changed {
                self.run.mark_dirty(key);
            }
        }
    }

    fn parse_init_bank(
        &self,
        ctx: &DocumentContext<'_>,
        owner: &AssetKey,
        doc: &SoundBankDocument,
    ) {
        let mut plugins = Vec::new();
        for entry in &doc.plugins {
            match entry.as_result() {
                Ok(plugin) => {
                    let Some(dll) = plugin.dll.as_deref() else {
                        continue;
                    };
                    if BUILTIN_PLUGIN_DLLS.contains(&dll) {
                        continue;
                    }
                    plugins.push(PluginInfo {
                        name: plugin.name.clone(),
                        plugin_id: plugin.id,
                        dll: dll.to_string(),
                    });
                }
                Err(message) => self.report(ctx, "Plugins", message),
            }
        }

        let default_language = self.settings.default_language.clone();
        let changed = self
            .catalog
            .with_object(owner, |object| {
                let mut changed = false;
                if object.default_language.as_deref() != Some(default_language.as_str()) {
                    object.default_language = Some(default_language);
                    changed = true;
                }

                if let Some(init) = object
                    .find_or_add_platform_data(ctx.platform)
                    .and_then(AssetData::as_init_bank_mut)
                {
                    if init.replace_plugins(plugins) {
                        tracing::info!(
                            "Init bank plugins for {}: {}",
                            ctx.platform,
                            init.plugins
                                .iter()
                                .map(|plugin| plugin.dll.as_str())
                                .collect::<Vec<_>>()
                                .join(", ")
                        );
                        changed = true;
                    }
                }
                changed
            })
            .unwrap_or(false);

        if changed {
            self.run.mark_dirty(owner.clone());
        }
    }
}

/// Playback metadata of an event entry.
fn apply_event_info(data: &mut EventData, entry: &EventEntry) -> bool {
    let mut changed = false;

    let radius = entry.max_attenuation.unwrap_or(0.0);
    if data.max_attenuation_radius != radius {
        data.max_attenuation_radius = radius;
        changed = true;
    }

    let is_infinite = entry.is_infinite();
    if data.is_infinite != is_infinite {
        data.is_infinite = is_infinite;
        changed = true;
    }

    if !is_infinite {
        if let Some(min) = entry.duration_min {
            if data.minimum_duration != min {
                data.minimum_duration = min;
                changed = true;
            }
        }
        if let Some(max) = entry.duration_max {
            if data.maximum_duration != max {
                data.maximum_duration = max;
                changed = true;
            }
        }
    }

    changed
}

/// GUID embedded in an auto-generated bank name. Accepts the braced form,
/// the bare hyphenated form and 32 hex digits.
pub fn parse_bank_guid(s: &str) -> Option<Guid> {
    let hex: String = s
        .trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .chars()
        .filter(|c| *c != '-')
        .collect();

    if hex.len() != 32 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    u128::from_str_radix(&hex, 16).ok().map(Guid::from_u128)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::parse_export;
    use sbk_core::SoundData;

    const EVENT_GUID: &str = "{11111111-2222-3333-4444-555555555555}";
    const WOOD_GUID: &str = "{AAAAAAAA-0000-0000-0000-000000000001}";
    const STONE_GUID: &str = "{AAAAAAAA-0000-0000-0000-000000000002}";
    const UNKNOWN_GUID: &str = "{BBBBBBBB-0000-0000-0000-00000000000F}";
    const REVERB_GUID: &str = "{CCCCCCCC-0000-0000-0000-000000000001}";

    fn guid(s: &str) -> Guid {
        parse_guid(s).unwrap()
    }

    fn catalog() -> AssetCatalog {
        let mut catalog = AssetCatalog::new();
        catalog.insert(CatalogObject::new(
            ObjectKind::Event,
            "Play_Footstep",
            Some(guid(EVENT_GUID)),
        ));
        catalog.insert(CatalogObject::new(ObjectKind::GroupValue, "Wood", Some(guid(WOOD_GUID))));
        catalog.insert(CatalogObject::new(ObjectKind::GroupValue, "Stone", Some(guid(STONE_GUID))));
        catalog.insert(CatalogObject::new(ObjectKind::AuxBus, "Reverb", Some(guid(REVERB_GUID))));
        catalog.insert(CatalogObject::new(ObjectKind::Bank, "Music", None));
        catalog.insert(CatalogObject::new(ObjectKind::InitBank, "Init", None));
        catalog
    }

    fn event_key() -> AssetKey {
        AssetKey::object(ObjectKind::Event, "Play_Footstep")
    }

    fn document(json: &str) -> SoundBankDocument {
        parse_export(json.as_bytes()).unwrap().remove(0)
    }

    fn footstep_bank() -> SoundBankDocument {
        document(&format!(
            r#"{{
                "ShortName": "SB_{EVENT_GUID}",
                "Language": "SFX",
                "Hash": "99",
                "ReferencedStreamedFiles": [
                    {{ "Id": "1", "Language": "SFX", "Path": "1.wem", "ShortName": "Wood.wav", "PrefetchSize": "64" }}
                ],
                "ExcludedMemoryFiles": [
                    {{ "Id": "2", "Language": "SFX", "Path": "2.wem", "ShortName": "Stone.wav" }},
                    {{ "Id": "3", "Language": "SFX", "Path": "3.wem", "ShortName": "Dirt.wav" }},
                    {{ "Id": "4", "Language": "SFX", "Path": "4.wem", "ShortName": "Base.wav" }}
                ],
                "IncludedEvents": [
                    {{
                        "Id": "42",
                        "GUID": "{EVENT_GUID}",
                        "Name": "Play_Footstep",
                        "MaxAttenuation": "30",
                        "ReferencedStreamedFiles": [
                            {{ "Id": "1", "Language": "SFX", "Path": "1.wem", "ShortName": "Wood.wav", "PrefetchSize": "64" }}
                        ],
                        "ExcludedMemoryFiles": [
                            {{ "Id": "2", "Language": "SFX", "Path": "2.wem", "ShortName": "Stone.wav" }},
                            {{ "Id": "3", "Language": "SFX", "Path": "3.wem", "ShortName": "Dirt.wav" }},
                            {{ "Id": "4", "Language": "SFX", "Path": "4.wem", "ShortName": "Base.wav" }}
                        ],
                        "DefaultSwitchValue": "{WOOD_GUID}",
                        "SwitchContainers": [
                            {{ "SwitchValue": "{WOOD_GUID}", "Media": [ {{ "Id": "1" }} ] }},
                            {{ "SwitchValue": "{STONE_GUID}", "Media": [ {{ "Id": "2" }} ] }},
                            {{ "SwitchValue": "{UNKNOWN_GUID}", "Media": [ {{ "Id": "3" }} ] }}
                        ],
                        "AuxBusSends": [ {{ "GUID": "{REVERB_GUID}" }}, {{ "GUID": "{UNKNOWN_GUID}" }} ]
                    }}
                ],
                "SwitchGroups": [
                    {{ "Id": "700", "Switches": [ {{ "GUID": "{WOOD_GUID}", "Id": "701" }} ] }}
                ]
            }}"#
        ))
    }

    fn parse(run: &BuildRun, catalog: &AssetCatalog, doc: &SoundBankDocument) {
        let parser = BankMetadataParser::new(run, catalog, ParserSettings::default());
        let owner = parser.resolve_owner(doc).unwrap();
        parser.parse(doc, "bank.json", "Windows", &owner, Some(b"BKHD")).unwrap();
    }

    #[test]
    fn test_resolve_owner() {
        let run = BuildRun::new();
        let catalog = catalog();
        let parser = BankMetadataParser::new(&run, &catalog, ParserSettings::default());

        let named = |name: &str| SoundBankDocument {
            short_name: Some(name.to_string()),
            ..Default::default()
        };

        assert_eq!(
            parser.resolve_owner(&named("Init")),
            Some(AssetKey::object(ObjectKind::InitBank, "Init"))
        );
        assert_eq!(parser.resolve_owner(&named(&format!("SB_{}", EVENT_GUID))), Some(event_key()));
        assert_eq!(
            parser.resolve_owner(&named("SB_11111111222233334444555555555555")),
            Some(event_key())
        );
        assert_eq!(
            parser.resolve_owner(&named(&format!("SB_{}", REVERB_GUID))),
            Some(AssetKey::object(ObjectKind::AuxBus, "Reverb"))
        );
        assert_eq!(
            parser.resolve_owner(&named("Music")),
            Some(AssetKey::object(ObjectKind::Bank, "Music"))
        );
        assert_eq!(parser.resolve_owner(&named("Unknown")), None);
    }

    #[test]
    fn test_parse_bank_guid_forms() {
        let expected = guid(EVENT_GUID);
        assert_eq!(parse_bank_guid(EVENT_GUID), Some(expected));
        assert_eq!(parse_bank_guid("11111111-2222-3333-4444-555555555555"), Some(expected));
        assert_eq!(parse_bank_guid("11111111222233334444555555555555"), Some(expected));
        assert_eq!(parse_bank_guid("not-a-guid"), None);
    }

    #[test]
    fn test_media_is_planned() {
        let run = BuildRun::new();
        let catalog = catalog();
        parse(&run, &catalog, &footstep_bank());

        let planner = run.planner();
        assert_eq!(planner.len(), 4);

        let wood = planner.get(1).unwrap();
        assert_eq!(wood.display_name, "Wood");
        assert_eq!(wood.asset_path, "Media/00/00/1.media");
        assert_eq!(wood.cache_path, "1.wem");
        assert!(wood.platforms["Windows"].is_streamed);
        assert_eq!(wood.platforms["Windows"].prefetch_size, 64);
        assert!(!planner.get(4).unwrap().platforms["Windows"].is_streamed);
        assert_eq!(run.media_path(2).unwrap(), "Media/00/00/2.media");
    }

    #[test]
    fn test_switch_container_media() {
        let run = BuildRun::new();
        let catalog = catalog();
        parse(&run, &catalog, &footstep_bank());

        // Gated media leave the always-loaded list and stop auto-loading
        let planner = run.planner();
        assert!(!planner.get(1).unwrap().auto_load);
        assert!(!planner.get(2).unwrap().auto_load);
        assert!(!planner.get(3).unwrap().auto_load);
        assert!(planner.get(4).unwrap().auto_load);

        let mut event = catalog.snapshot(&event_key()).unwrap();
        let data = event.platform_data.get_mut("Windows").unwrap();
        let set = data.media_set_for("");
        assert_eq!(set.pending_media, vec![4]);
        assert_eq!(set.switch_containers.len(), 3);
        assert_eq!(set.default_group_value, Some(guid(WOOD_GUID)));

        let groups = run.take_group_media();
        let wood = AssetKey::object(ObjectKind::GroupValue, "Wood");
        let stone = AssetKey::object(ObjectKind::GroupValue, "Stone");
        assert_eq!(groups[&wood].iter().copied().collect::<Vec<_>>(), vec![1]);
        assert_eq!(groups[&stone].iter().copied().collect::<Vec<_>>(), vec![2]);
        assert_eq!(run.fallback_media().into_iter().collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn test_event_metadata() {
        let run = BuildRun::new();
        let catalog = catalog();
        parse(&run, &catalog, &footstep_bank());
        run.flush_dirty();

        let event = catalog.snapshot(&event_key()).unwrap();
        assert_eq!(event.short_id, 42);

        let AssetData::Event(data) = &event.platform_data["Windows"] else {
            panic!("expected event data");
        };
        assert_eq!(data.max_attenuation_radius, 30.0);
        assert!(data.is_infinite);
        assert_eq!(data.user_defined_sends.len(), 1);
        assert_eq!(data.bank_payload().cached_hash, 99);
        assert_eq!(data.bank_payload().bytes, b"BKHD");

        let dirtied = run.dirtied();
        assert!(dirtied.contains(&event_key()));
        assert!(dirtied.contains(&AssetKey::object(ObjectKind::GroupValue, "Wood")));
    }

    #[test]
    fn test_game_syncs_only_dirty_on_change() {
        let run = BuildRun::new();
        let catalog = catalog();
        let wood = AssetKey::object(ObjectKind::GroupValue, "Wood");
        parse(&run, &catalog, &footstep_bank());

        let value = catalog.snapshot(&wood).unwrap();
        assert_eq!(value.short_id, 701);
        assert_eq!(value.group_short_id, 700);

        let second = BuildRun::new();
        parse(&second, &catalog, &footstep_bank());
        second.flush_dirty();
        assert!(!second.dirtied().contains(&wood));
        assert!(!second.dirtied().contains(&event_key()));
    }

    #[test]
    fn test_malformed_entries_are_reported() {
        let run = BuildRun::new();
        let catalog = catalog();
        let doc = document(
            r#"{
                "ShortName": "Music",
                "Language": "SFX",
                "ReferencedStreamedFiles": [
                    { "Language": "SFX", "Path": "missing-id.wem" },
                    { "Id": "10", "Language": "SFX", "Path": "10.wem", "ShortName": "Theme.wav" }
                ],
                "GameParameters": [ { "GUID": "nope", "Id": "1" } ]
            }"#,
        );
        parse(&run, &catalog, &doc);

        let diagnostics = run.diagnostics();
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].section, "ReferencedStreamedFiles");
        assert_eq!(diagnostics[0].document, "bank.json");
        assert_eq!(diagnostics[1].section, "GameParameters");
        assert!(run.planner().contains(10));
    }

    #[test]
    fn test_localized_bank_fills_event_language_set() {
        let run = BuildRun::new();
        let catalog = catalog();
        let doc = document(&format!(
            r#"{{
                "ShortName": "Music",
                "Language": "French",
                "IncludedEvents": [
                    {{
                        "Name": "Play_Footstep",
                        "ExcludedMemoryFiles": [
                            {{ "Id": "20", "Language": "French", "Path": "French/20.wem", "ShortName": "Voice.wav" }},
                            {{ "Id": "21", "Language": "French", "Path": "21.wem", "UsingReferenceLanguageAsStandIn": true }}
                        ]
                    }}
                ]
            }}"#
        ));
        parse(&run, &catalog, &doc);

        let mut event = catalog.snapshot(&event_key()).unwrap();
        let data = event.platform_data.get_mut("Windows").unwrap();
        assert_eq!(data.media_set_for("French").pending_media, vec![20, 21]);
        assert_eq!(
            run.planner().get(20).unwrap().asset_path,
            "Localized/French/Media/00/00/20.media"
        );
        assert_eq!(run.planner().get(21).unwrap().language, "English(US)");
    }

    #[test]
    fn test_init_bank() {
        let run = BuildRun::new();
        let catalog = catalog();
        parse(&run, &catalog, &footstep_bank());

        let init = document(&format!(
            r#"{{
                "ShortName": "Init",
                "Language": "SFX",
                "ExcludedMemoryFiles": [
                    {{ "Id": "4", "Language": "SFX", "Path": "4.wem" }},
                    {{ "Id": "50", "Language": "SFX", "Path": "50.wem" }}
                ],
                "IncludedAuxBusses": [ {{ "Name": "Reverb", "Id": "9001" }} ],
                "Plugins": [
                    {{ "Name": "Sink", "ID": "1", "DLL": "DefaultSink" }},
                    {{ "Name": "Engine", "ID": "2", "DLL": "AkSoundEngineDLL" }},
                    {{ "Name": "NoDll", "ID": "3" }},
                    {{ "Name": "Meter", "ID": "4", "DLL": "AkMeter" }}
                ]
            }}"#
        ));
        parse(&run, &catalog, &init);
        run.flush_dirty();

        let key = AssetKey::object(ObjectKind::InitBank, "Init");
        let mut object = catalog.snapshot(&key).unwrap();
        assert_eq!(object.default_language.as_deref(), Some("English(US)"));

        let data = object.platform_data.get_mut("Windows").unwrap();
        assert_eq!(data.media_set_for("").pending_media, vec![50]);
        let plugins = &data.as_init_bank_mut().unwrap().plugins;
        assert_eq!(plugins.len(), 1);
        assert_eq!(plugins[0].dll, "AkMeter");

        let reverb = AssetKey::object(ObjectKind::AuxBus, "Reverb");
        assert_eq!(catalog.snapshot(&reverb).unwrap().short_id, 9001);
        assert!(run.dirtied().contains(&reverb));
        assert!(run.dirtied().contains(&key));
    }

    #[test]
    fn test_switch_splitting_disabled() {
        let run = BuildRun::new();
        let catalog = catalog();
        let settings = ParserSettings {
            split_switch_container_media: false,
            ..Default::default()
        };
        let parser = BankMetadataParser::new(&run, &catalog, settings);
        parser
            .parse(&footstep_bank(), "bank.json", "Windows", &event_key(), None)
            .unwrap();

        assert!(run.planner().get(1).unwrap().auto_load);
        let mut event = catalog.snapshot(&event_key()).unwrap();
        let set = event.platform_data.get_mut("Windows").unwrap().media_set_for("").clone();
        assert_eq!(set.pending_media, vec![1, 2, 3, 4]);
        assert!(set.switch_containers.is_empty());
    }
}
