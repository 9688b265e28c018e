use crate::errors::CliError;
use crate::println_pad;
use crate::utils::format_bytes;
use camino::Utf8PathBuf;
use colored::Colorize;
use miette::Result;
use sbk_core::hash::hash_file;
use sbk_core::{MediaAsset, MediaAssetData};

pub struct InspectMediaArgs {
    pub file_path: String,
    /// Exported source file to compare the cooked content hash against.
    pub source: Option<String>,
    pub platform: Option<String>,
}

pub fn inspect_media_asset(args: InspectMediaArgs) -> Result<()> {
    let path = Utf8PathBuf::from(&args.file_path);
    let asset = MediaAsset::load(&path)
        .map_err(CliError::from)?
        .ok_or_else(|| CliError::file_not_found(path.clone()))?;

    let source_hash = match &args.source {
        Some(source) => {
            let source = Utf8PathBuf::from(source);
            if !source.as_std_path().is_file() {
                return Err(CliError::file_not_found(source).into());
            }
            Some(hash_file(&source).map_err(CliError::from)?)
        }
        None => None,
    };

    let name = if asset.media_name.is_empty() {
        "(unnamed)"
    } else {
        asset.media_name.as_str()
    };
    println_pad!(
        "{} {} {}",
        "🎵 Media:".bright_blue().bold(),
        asset.id.to_string().bright_cyan().bold(),
        name.bright_white()
    );
    println_pad!(
        "{} {}",
        "🌐 Language:".bright_green(),
        if asset.language.is_empty() {
            "shared".to_string()
        } else {
            asset.language.clone()
        }
        .bright_white()
    );
    println_pad!(
        "{} {}",
        "⚡ Auto-load:".bright_yellow(),
        asset.auto_load.to_string().bright_white()
    );

    println_pad!("\n{}", "🖥️  Platforms:".bright_magenta().bold());
    let platforms = asset
        .platform_data
        .iter()
        .filter(|(platform, _)| args.platform.as_deref().map_or(true, |p| p == platform.as_str()));

    let mut shown = 0;
    for (platform, data) in platforms {
        shown += 1;
        print_platform(platform, data, source_hash);
    }

    if shown == 0 {
        println_pad!("   {}", "no cooked platforms".dimmed());
    }

    Ok(())
}

fn print_platform(platform: &str, data: &MediaAssetData, source_hash: Option<u64>) {
    let mut flags = Vec::new();
    if data.is_streamed {
        flags.push("streamed");
    }
    if data.use_device_memory {
        flags.push("device memory");
    }
    if data.has_stale_encoding() {
        flags.push("stale encoding");
    }

    println_pad!(
        "   {} {} {}",
        "•".bright_cyan(),
        platform.bright_cyan().bold(),
        format!("(hash: {:016x})", data.content_hash).dimmed()
    );
    if !flags.is_empty() {
        println_pad!("     {}", flags.join(", ").bright_yellow());
    }

    for chunk in &data.chunks {
        let kind = if chunk.is_prefetch { "prefetch" } else { "full" };
        println_pad!(
            "     {} {} {}",
            kind.bright_white(),
            format_bytes(chunk.len()).bright_white().bold(),
            format!("(encoding v{})", chunk.encoding_version).dimmed()
        );
    }

    if let Some(hash) = source_hash {
        if hash == data.content_hash {
            println_pad!("     {}", "✅ matches source".bright_green());
        } else {
            println_pad!("     {}", "⚠️ source changed, rebuild needed".yellow());
        }
    }
}
