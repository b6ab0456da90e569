// ⚙️ Configuration - optional TOML file
//
// [storage]
// db_path = "kumite.db"
//
// [session]
// undo_window_ms = 2000
//
// [export]
// quote_style = "standard"   # or "legacy"
// output_dir = "."
//
// Every key is optional; a missing file path means all defaults.

use crate::export::QuoteStyle;
use crate::session::{DEFAULT_UNDO_WINDOW_MS, MAX_UNDO_WINDOW_MS};
use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite file holding the key-value table
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("kumite.db")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// How long a notification stays undoable
    #[serde(default = "default_undo_window_ms")]
    pub undo_window_ms: u64,
}

fn default_undo_window_ms() -> u64 {
    DEFAULT_UNDO_WINDOW_MS
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            undo_window_ms: default_undo_window_ms(),
        }
    }
}

impl SessionConfig {
    /// Capped at `MAX_UNDO_WINDOW_MS`
    pub fn undo_window(&self) -> Duration {
        Duration::milliseconds(self.undo_window_ms.min(MAX_UNDO_WINDOW_MS) as i64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default)]
    pub quote_style: QuoteStyle,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            quote_style: QuoteStyle::default(),
            output_dir: default_output_dir(),
        }
    }
}

impl Config {
    /// Load from `path`, or defaults when no path is given.
    /// A path that was given but cannot be read is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Config::default());
        };

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }
}

// ============================================================================
// LOGGING
// ============================================================================

/// Log filter from `RUST_LOG`, falling back to `default` when unset
pub fn env_filter(default: LevelFilter) -> EnvFilter {
    parse_log_filter(default, &std::env::var("RUST_LOG").unwrap_or_default())
}

fn parse_log_filter(default: LevelFilter, directives: &str) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(default.into())
        .parse_lossy(directives)
}
