use crate::errors::CliError;
use crate::println_pad;
use crate::utils::config::{load_project, SettingsOverrides};
use camino::Utf8Path;
use colored::Colorize;
use miette::{IntoDiagnostic, Result};
use sbk_core::asset::MEDIA_ASSET_EXTENSION;
use sbk_core::hash::media_set_fingerprint;
use sbk_core::MediaAsset;
use sbk_cook::{CookState, COOK_STATE_FILE};
use walkdir::WalkDir;

pub struct StatusArgs {
    pub config_path: Option<String>,
    pub overrides: SettingsOverrides,
}

/// What the output directory holds right now.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct OutputSummary {
    pub media_count: usize,
    pub fingerprint: u64,
    pub unreadable: usize,
}

pub fn show_status(args: StatusArgs) -> Result<()> {
    let project = load_project(args.config_path.as_deref(), &args.overrides)?;
    let settings = &project.cook;

    println_pad!(
        "{} {}",
        "📁 Output:".bright_blue().bold(),
        settings.output_dir.as_str().bright_cyan().bold()
    );

    let state_path = settings.output_dir.join(COOK_STATE_FILE);
    let Some(state) = CookState::load(&state_path).map_err(CliError::from)? else {
        println_pad!("{}", "⚠️ Never built, run `soundbank-cook build`".yellow());
        return Ok(());
    };

    let summary = summarize_output(&settings.output_dir)?;

    println_pad!(
        "{} {}",
        "🖥️  Platforms:".bright_green(),
        state.platforms.join(", ").bright_white()
    );
    println_pad!(
        "{} {} {}",
        "🎵 Media:".bright_green(),
        summary.media_count.to_string().bright_white().bold(),
        format!("(last build: {})", state.media_count).dimmed()
    );
    if summary.unreadable > 0 {
        println_pad!(
            "{}",
            format!("⚠️ {} media assets could not be read", summary.unreadable).yellow()
        );
    }

    if state.matches(&settings.platforms, summary.fingerprint) {
        println_pad!("{}", "✅ Output matches the last build".bright_green().bold());
    } else if !state.matches(&settings.platforms, state.media_fingerprint) {
        println_pad!(
            "{}",
            "⚠️ Configured platforms changed since the last build".yellow()
        );
    } else {
        println_pad!(
            "{}",
            "⚠️ Output differs from the last build, rebuild to refresh it".yellow()
        );
    }

    Ok(())
}

/// Fingerprint every media asset under `output_dir`.
pub fn summarize_output(output_dir: &Utf8Path) -> Result<OutputSummary> {
    let mut summary = OutputSummary::default();
    if !output_dir.as_std_path().is_dir() {
        return Ok(summary);
    }

    let mut entries = Vec::new();
    for entry in WalkDir::new(output_dir.as_std_path()) {
        let entry = entry.into_diagnostic()?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(path) = Utf8Path::from_path(entry.path()) else {
            continue;
        };
        if path.extension() != Some(MEDIA_ASSET_EXTENSION) {
            continue;
        }

        match MediaAsset::load(path) {
            Ok(Some(asset)) => {
                summary.media_count += 1;
                entries.extend(
                    asset
                        .platform_data
                        .values()
                        .map(|data| (asset.id, data.content_hash)),
                );
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("Failed to read media asset {}: {}", path, e);
                summary.unreadable += 1;
            }
        }
    }

    summary.fingerprint = media_set_fingerprint(entries);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn summarize_matches_build_fingerprint() {
        let dir = TempDir::new().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();

        let mut asset = MediaAsset::new(42);
        asset
            .find_or_add_platform_data("Windows")
            .rebuild_chunks(b"payload", 99, 0);
        asset.save(&root.join("Media/00/00/42.media")).unwrap();
        std::fs::write(root.join("catalog.json"), "{}").unwrap();
        std::fs::write(root.join("Media/00/00/broken.media"), b"nope").unwrap();

        let summary = summarize_output(root).unwrap();
        assert_eq!(summary.media_count, 1);
        assert_eq!(summary.unreadable, 1);
        assert_eq!(summary.fingerprint, media_set_fingerprint([(42, 99)]));
    }

    #[test]
    fn summarize_missing_output() {
        let dir = TempDir::new().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap().join("missing");
        assert_eq!(summarize_output(&root).unwrap(), OutputSummary::default());
    }
}
