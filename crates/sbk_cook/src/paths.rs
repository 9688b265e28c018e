//! Deterministic locations of cooked media assets.

use camino::{Utf8Path, Utf8PathBuf};
use sbk_core::asset::MEDIA_ASSET_EXTENSION;
use sbk_core::MediaId;

/// Language tag the authoring tool uses for shared media.
pub const SFX_LANGUAGE: &str = "SFX";

/// Two-level subfolder built from the high bytes of a media id, e.g.
/// `0x12345678` -> `12/34`.
pub fn media_subfolder(id: MediaId) -> String {
    format!("{:02x}/{:02x}", (id >> 24) & 0xFF, (id >> 16) & 0xFF)
}

/// Asset path of a media item, relative to the output directory.
///
/// Shared media live under `Media/`, localized media under
/// `Localized/<language>/Media/`.
pub fn media_asset_path(id: MediaId, language: &str, split_per_folder: bool) -> Utf8PathBuf {
    let mut path = if language.is_empty() {
        Utf8PathBuf::from("Media")
    } else {
        Utf8PathBuf::from("Localized").join(language).join("Media")
    };

    if split_per_folder {
        path.push(media_subfolder(id));
    }

    path.push(format!("{}.{}", id, MEDIA_ASSET_EXTENSION));
    path
}

/// Normalize an exported language: `SFX` means shared.
pub fn normalize_language(language: &str) -> &str {
    if language == SFX_LANGUAGE {
        ""
    } else {
        language
    }
}

/// Location of an exported source file for `platform`.
pub fn source_path(cache_dir: &Utf8Path, platform: &str, cache_path: &Utf8Path) -> Utf8PathBuf {
    cache_dir.join(platform).join(cache_path)
}

/// The `<name>` part of a `<name>.<ext>` file name, used as the display name
/// of a media item.
pub fn display_name(short_name: &str) -> String {
    let file_name = short_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(short_name);
    Utf8Path::new(file_name)
        .file_stem()
        .unwrap_or(file_name)
        .to_string()
}
