use camino::Utf8PathBuf;
use clap::builder::{styling::AnsiColor, Styles};
use clap::ColorChoice;
use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use commands::{
    build_sound_data, inspect_media_asset, show_status, BuildSoundDataArgs, InspectMediaArgs,
    StatusArgs,
};
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utils::config::SettingsOverrides;

mod commands;
mod errors;
mod utils;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

/// Settings shared by commands that read `soundbank-cook.toml`.
#[derive(clap::Args, Debug)]
struct ProjectArgs {
    /// The path to the soundbank-cook.toml file
    #[arg(short, long)]
    config_path: Option<String>,

    /// Override the exported bank cache directory
    #[arg(long)]
    cache_dir: Option<Utf8PathBuf>,

    /// Override the cooked output directory
    #[arg(long)]
    output_dir: Option<Utf8PathBuf>,

    /// Platforms to cook, repeatable (defaults to the configured list)
    #[arg(short, long = "platform")]
    platforms: Vec<String>,
}

impl ProjectArgs {
    fn overrides(
        self,
        threads: Option<usize>,
        no_save: bool,
    ) -> (Option<String>, SettingsOverrides) {
        (
            self.config_path,
            SettingsOverrides {
                cache_dir: self.cache_dir,
                output_dir: self.output_dir,
                platforms: self.platforms,
                threads,
                no_save,
            },
        )
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Cook the bank exports of the configured platforms
    Build {
        #[command(flatten)]
        project: ProjectArgs,

        /// Number of cook worker threads
        #[arg(short = 'j', long)]
        threads: Option<usize>,

        /// Do not write dirtied assets
        #[arg(long)]
        no_save: bool,

        /// Print the build summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the contents of a cooked media asset
    Inspect {
        /// The path to the .media file
        #[arg(short, long)]
        file_path: String,

        /// An exported source file to compare the cooked content against
        #[arg(short, long)]
        source: Option<String>,

        /// Only show this platform
        #[arg(short, long)]
        platform: Option<String>,
    },
    /// Show whether the cooked output matches the last build
    Status {
        #[command(flatten)]
        project: ProjectArgs,
    },
}

fn parse_args() -> Args {
    // Configure colored/styled help output
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default().bold())
        .usage(AnsiColor::Green.on_default().bold())
        .literal(AnsiColor::Cyan.on_default())
        .placeholder(AnsiColor::Blue.on_default());

    let matches = Args::command()
        .styles(styles)
        .color(ColorChoice::Auto)
        .get_matches();

    Args::from_arg_matches(&matches).unwrap_or_else(|e| e.exit())
}

fn init_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let args = parse_args();
    init_logging();

    match args.command {
        Commands::Build {
            project,
            threads,
            no_save,
            json,
        } => {
            let (config_path, overrides) = project.overrides(threads, no_save);
            build_sound_data(BuildSoundDataArgs {
                config_path,
                overrides,
                json,
            })
        }
        Commands::Inspect {
            file_path,
            source,
            platform,
        } => inspect_media_asset(InspectMediaArgs {
            file_path,
            source,
            platform,
        }),
        Commands::Status { project } => {
            let (config_path, overrides) = project.overrides(None, false);
            show_status(StatusArgs {
                config_path,
                overrides,
            })
        }
    }
}
