//! Where the library database lives.
//!
//! The only setting today is the database path. It resolves from, highest
//! priority first: `PLAYLISTER_DATABASE_PATH`, `database_path` in
//! `<config dir>/playlister/config.toml`, then `<data dir>/playlister/playlister.db`.

use anyhow::{Context, Result};
use confyg::{env, Confygery};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::schema::Database;

/// Directory name used under both the platform config and data directories.
const APP_DIR: &str = "playlister";
const CONFIG_FILE_NAME: &str = "config.toml";
const DB_FILE_NAME: &str = "playlister.db";
/// Top-level key for environment overrides (`PLAYLISTER_*`).
const ENV_PREFIX: &str = "playlister";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// SQLite file holding artists, genres and songs.
    #[serde(default = "default_db_path")]
    pub database_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_db_path(),
        }
    }
}

impl Config {
    /// Load from the platform config file (if any) plus environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file_path())
    }

    /// Load from a specific config file plus environment overrides. A missing
    /// file is not an error; every setting then falls back to its default.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let mut builder = Confygery::new().context("Failed to create config builder")?;

        if config_path.exists() {
            let path_str = config_path
                .to_str()
                .with_context(|| format!("Config path {} is not UTF-8", config_path.display()))?;
            builder
                .add_file(path_str)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
        }

        builder
            .add_env(env::Options::with_top_level(ENV_PREFIX))
            .context("Failed to read PLAYLISTER_* environment")?;

        builder.build().context("Failed to build playlister configuration")
    }

    /// Point this configuration at another database file.
    #[must_use]
    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = path.into();
        self
    }

    /// Open the configured database, creating its directory if needed.
    pub fn open_database(&self) -> Result<Database> {
        if let Some(parent) = self.database_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }

        Database::open(&self.database_path).with_context(|| {
            format!(
                "Failed to open database at {}",
                self.database_path.display()
            )
        })
    }
}

fn app_dir(base: Option<PathBuf>) -> PathBuf {
    base.unwrap_or_else(|| PathBuf::from(".")).join(APP_DIR)
}

fn default_db_path() -> PathBuf {
    app_dir(dirs::data_dir()).join(DB_FILE_NAME)
}

/// `<config dir>/playlister/config.toml`, e.g. `~/.config/playlister/config.toml`
/// on Linux.
pub fn config_file_path() -> PathBuf {
    app_dir(dirs::config_dir()).join(CONFIG_FILE_NAME)
}

/// Commented template listing every setting.
pub fn example_config() -> &'static str {
    r#"# playlister configuration
#
# Environment variables (PLAYLISTER_*) override values set here.

# SQLite database holding artists, genres and songs.
# Also settable with PLAYLISTER_DATABASE_PATH.
#database_path = "/path/to/playlister.db"
"#
}

/// Write [`example_config`] to `path` unless a file is already there.
///
/// Returns true if the template was written.
pub fn write_example_config(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }
    std::fs::write(path, example_config())
        .with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(true)
}
