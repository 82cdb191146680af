//! CLI argument definitions for the Palika assistant.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

use palika_core::types::Language;

/// Palika — a municipal-services assistant with voice in and voice out.
#[derive(Parser, Debug)]
#[command(name = "palika", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Data directory for chat history and stored credentials.
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Interface and speech language (en or ne).
    #[arg(long = "language")]
    pub language: Option<String>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > PALIKA_CONFIG env var > ~/.palika/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref path) = self.config {
            return path.clone();
        }
        if let Ok(path) = std::env::var("PALIKA_CONFIG") {
            return PathBuf::from(path);
        }
        home_dir().join(".palika").join("config.toml")
    }

    /// Resolve the data directory.
    ///
    /// Priority: --data-dir flag > PALIKA_DATA_DIR env var > config file value.
    pub fn resolve_data_dir(&self, config_value: &str) -> PathBuf {
        if let Some(ref dir) = self.data_dir {
            return dir.clone();
        }
        if let Ok(dir) = std::env::var("PALIKA_DATA_DIR") {
            return PathBuf::from(dir);
        }
        expand_home(config_value)
    }

    /// Resolve the log level. Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_value: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_value.to_string())
    }

    /// Resolve the interface language.
    ///
    /// Priority: --language flag > PALIKA_LANGUAGE env var > English.
    pub fn resolve_language(&self) -> Language {
        if let Some(ref lang) = self.language {
            if let Ok(parsed) = lang.parse() {
                return parsed;
            }
        }
        if let Ok(lang) = std::env::var("PALIKA_LANGUAGE") {
            if let Ok(parsed) = lang.parse() {
                return parsed;
            }
        }
        Language::English
    }
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Expand a leading `~/` against the home directory.
fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => home_dir().join(rest),
        None => PathBuf::from(path),
    }
}
