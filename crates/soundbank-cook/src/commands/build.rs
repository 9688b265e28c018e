use crate::errors::CliError;
use crate::println_pad;
use crate::utils::config::{load_project, ProjectConfig, SettingsOverrides};
use colored::Colorize;
use miette::{IntoDiagnostic, Result};
use sbk_cook::{AssetCatalog, BuildProgress, BuildResult, BuildStage, SoundDataBuilder};
use std::sync::Mutex;

#[derive(Debug)]
pub struct BuildSoundDataArgs {
    pub config_path: Option<String>,
    pub overrides: SettingsOverrides,
    /// Print the build summary as JSON instead of text.
    pub json: bool,
}

pub fn build_sound_data(args: BuildSoundDataArgs) -> Result<()> {
    let project = load_project(args.config_path.as_deref(), &args.overrides)?;
    let catalog = load_catalog(&project)?;

    if !args.json {
        println!(
            "{} {} {}",
            "🔊 Cooking sound data for".bright_blue().bold(),
            project.cook.platforms.join(", ").bright_cyan().bold(),
            format!("({} catalog objects)", catalog.len()).dimmed()
        );
    }

    let last_stage = Mutex::new(None);
    let quiet = args.json;
    let builder = SoundDataBuilder::new(project.cook, catalog)
        .with_progress(move |progress| report_progress(&last_stage, quiet, progress));

    let result = builder.build().map_err(CliError::from)?;

    if args.json {
        print_json_summary(&result)?;
    } else {
        print_summary(&result);
    }

    if !result.success {
        return Err(
            CliError::build_failed(result.parse_errors.len(), result.cook_failures.len()).into(),
        );
    }
    Ok(())
}

fn load_catalog(project: &ProjectConfig) -> Result<AssetCatalog> {
    let path = project.catalog_path();
    match AssetCatalog::load(&path).map_err(CliError::from)? {
        Some(catalog) => {
            tracing::info!("Loaded {} catalog objects from {}", catalog.len(), path);
            Ok(catalog)
        }
        None => Err(CliError::catalog_not_found(path).into()),
    }
}

/// Print each stage once, as it starts.
fn report_progress(last_stage: &Mutex<Option<BuildStage>>, quiet: bool, progress: BuildProgress) {
    if let Some(file) = &progress.current_file {
        tracing::debug!("[{}/{}] {}", progress.current, progress.total, file);
    }

    let Ok(mut last_stage) = last_stage.lock() else {
        return;
    };
    if quiet || *last_stage == Some(progress.stage) {
        return;
    }
    *last_stage = Some(progress.stage);

    let label = match progress.stage {
        BuildStage::Parsing => "Parsing bank exports",
        BuildStage::Cooking => "Cooking media",
        BuildStage::Saving => "Saving assets",
        BuildStage::Complete => return,
    };
    if progress.total > 0 {
        println_pad!("{} {}", label.bright_white(), format!("({})", progress.total).dimmed());
    } else {
        println_pad!("{}", label.bright_white());
    }
}

fn print_summary(result: &BuildResult) {
    for error in &result.parse_errors {
        println_pad!("{} {}", "⚠️".yellow(), error.to_string().yellow());
    }
    for failure in &result.cook_failures {
        println_pad!(
            "{} {}",
            "❌".red(),
            format!(
                "media {} ({}): {}",
                failure.media, failure.platform, failure.message
            )
            .red()
        );
    }

    let headline = if result.success {
        "✅ Sound data built successfully!".bright_green().bold()
    } else {
        "❌ Sound data build finished with errors".bright_red().bold()
    };
    println!("{}", headline);
    println_pad!(
        "{} {}",
        "Cooked:".bright_green(),
        result.media_cooked.to_string().bright_white().bold()
    );
    println_pad!(
        "{} {}",
        "Up to date:".bright_green(),
        result.media_skipped.to_string().bright_white()
    );
    println_pad!(
        "{} {}",
        "Dirtied assets:".bright_green(),
        result.dirtied.len().to_string().bright_white()
    );
    println_pad!(
        "{} {}",
        "Time:".bright_green(),
        format!("{:.2?}", result.build_time).bright_white()
    );
}

fn print_json_summary(result: &BuildResult) -> Result<()> {
    let summary = serde_json::json!({
        "success": result.success,
        "mediaCooked": result.media_cooked,
        "mediaSkipped": result.media_skipped,
        "dirtied": result.dirtied.iter().map(ToString::to_string).collect::<Vec<_>>(),
        "parseErrors": result.parse_errors,
        "cookFailures": result.cook_failures,
        "buildTimeMs": result.build_time.as_millis() as u64,
    });
    println!("{}", serde_json::to_string_pretty(&summary).into_diagnostic()?);
    Ok(())
}
