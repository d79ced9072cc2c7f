//! Configuration for the karaoke library catalog.
//!
//! Values are layered, later layers winning:
//! 1. Built-in defaults (platform data directory for the catalog).
//! 2. An optional configuration file (TOML, YAML or JSON, by extension).
//! 3. `PIKARAOKE_`-prefixed environment variables, with `__` separating
//!    nested keys (e.g. `PIKARAOKE_CATALOG__BACKUP_DIR`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::{ProjectDirs, UserDirs};
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "PIKARAOKE_";
const APPLICATION: &str = "pikaraoke";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub library: LibraryConfig,
    pub catalog: CatalogConfig,
}

/// Where the media files live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Root directory that is walked on every scan.
    pub root: PathBuf,
}

/// Where the catalog and its snapshots live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// The SQLite catalog file.
    pub path: PathBuf,
    /// Directory that snapshots are written into.
    pub backup_dir: PathBuf,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        let root = UserDirs::new()
            .map(|dirs| dirs.home_dir().join("pikaraoke-songs"))
            .unwrap_or_else(|| PathBuf::from("pikaraoke-songs"));
        Self { root }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        // No home directory (containers, service accounts): fall back to the
        // working directory rather than refusing to start.
        let data = ProjectDirs::from("", "", APPLICATION)
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            path: data.join("catalog.db"),
            backup_dir: data.join("backups"),
        }
    }
}

impl Config {
    /// Load configuration from defaults, an optional file, and the environment.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = file {
            figment = figment.merge(Self::file_provider(path)?);
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        Self::extract(figment)
    }

    fn file_provider(path: &Path) -> Result<Figment> {
        if !path.is_file() {
            exn::bail!(ErrorKind::Invalid(format!("configuration file not found: {}", path.display())));
        }
        let extension = path.extension().and_then(|ext| ext.to_str()).map(str::to_lowercase);
        tracing::debug!(path = %path.display(), "Loading configuration file");
        Ok(match extension.as_deref() {
            Some("toml") => Figment::from(Toml::file(path)),
            Some("yaml" | "yml") => Figment::from(Yaml::file(path)),
            Some("json") => Figment::from(Json::file(path)),
            _ => exn::bail!(ErrorKind::Invalid(format!(
                "unsupported configuration file format: {}",
                path.display()
            ))),
        })
    }

    fn extract(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that cannot possibly work.
    pub fn validate(&self) -> Result<()> {
        if self.library.root.as_os_str().is_empty() {
            exn::bail!(ErrorKind::Invalid("library root must not be empty".to_string()));
        }
        if self.catalog.path.as_os_str().is_empty() {
            exn::bail!(ErrorKind::Invalid("catalog path must not be empty".to_string()));
        }
        if self.catalog.backup_dir == self.catalog.path {
            exn::bail!(ErrorKind::Invalid("backup directory cannot be the catalog file".to_string()));
        }
        Ok(())
    }
}
