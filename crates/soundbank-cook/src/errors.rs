use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    #[error("Configuration file not found in {search_path}")]
    #[diagnostic(
        code(config::not_found),
        help("Create a soundbank-cook.toml file with a [cook] table, or pass --cache-dir and --output-dir")
    )]
    ConfigNotFound { search_path: Utf8PathBuf },

    #[error("Configuration file error: {path}")]
    #[diagnostic(
        code(config::parse_error),
        help("Check your soundbank-cook.toml file for syntax errors")
    )]
    ConfigParseError {
        path: Utf8PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Catalog not found: {path}")]
    #[diagnostic(
        code(catalog::not_found),
        help("Export the project catalog to catalog.json in the output directory, or point `catalog` in soundbank-cook.toml at it")
    )]
    CatalogNotFound { path: Utf8PathBuf },

    #[error("File not found: {path}")]
    #[diagnostic(
        code(file::not_found),
        help("Make sure the file exists and the path is correct")
    )]
    FileNotFound { path: Utf8PathBuf },

    #[error("Build failed with {parse_errors} parse errors and {cook_failures} cook failures")]
    #[diagnostic(
        code(cook::build_failed),
        help("Fix the reported entries and build again. Run with RUST_LOG=debug for details")
    )]
    BuildFailed {
        parse_errors: usize,
        cook_failures: usize,
    },

    #[error("Sound data build error")]
    #[diagnostic(code(cook::error))]
    Cook {
        #[from]
        source: sbk_cook::Error,
    },

    #[error("Media asset error")]
    #[diagnostic(
        code(asset::invalid),
        help("The file is not a cooked media asset, or was cooked by an incompatible version")
    )]
    Asset {
        #[from]
        source: sbk_core::Error,
    },

    #[error("IO operation failed")]
    #[diagnostic(code(io::operation_failed))]
    IoError {
        #[from]
        source: std::io::Error,
    },
}

impl CliError {
    pub fn config_not_found(search_path: Utf8PathBuf) -> Self {
        Self::ConfigNotFound { search_path }
    }

    pub fn config_parse_error(path: Utf8PathBuf, source: toml::de::Error) -> Self {
        Self::ConfigParseError { path, source }
    }

    pub fn catalog_not_found(path: Utf8PathBuf) -> Self {
        Self::CatalogNotFound { path }
    }

    pub fn file_not_found(path: Utf8PathBuf) -> Self {
        Self::FileNotFound { path }
    }

    pub fn build_failed(parse_errors: usize, cook_failures: usize) -> Self {
        Self::BuildFailed {
            parse_errors,
            cook_failures,
        }
    }
}
