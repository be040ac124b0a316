//! Configuration for the service.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

/// Room name used when none is configured.
pub const DEFAULT_ROOM: &str = "default-room";

/// Environment variable overriding the room name.
pub const ENV_ROOM: &str = "PINMESH_ROOM";

/// Environment variable overriding the data directory.
pub const ENV_DATA_DIR: &str = "PINMESH_DATA_DIR";

const DEFAULT_RETENTION: Duration = Duration::from_secs(14 * 24 * 60 * 60);

/// Service configuration.
///
/// Usually loaded from a TOML file with [`Self::load`]; the [`Default`] impl
/// is suitable for local development and testing. Environment overrides are
/// applied on top with [`Self::with_env`].
#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Room name scoping which peers meet on the mesh.
    pub room: String,
    /// How long pins are retained before the startup sweep removes them.
    #[serde(with = "humantime_serde")]
    pub retention: Duration,
    /// Optional override for the data directory.
    pub data_dir: Option<PathBuf>,
}

impl Config {
    /// Load the config from a file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Config> {
        let s = tokio::fs::read_to_string(path.as_ref())
            .await
            .with_context(|| format!("failed to read {}", path.as_ref().to_string_lossy()))?;
        let config: Config = toml::from_str(&s)?;
        Ok(config)
    }

    /// Apply environment overrides on top of this config.
    pub fn with_env(mut self) -> Self {
        if let Ok(room) = env::var(ENV_ROOM) {
            if !room.is_empty() {
                self.room = room;
            }
        }
        self
    }

    /// Get the data directory.
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        let dir = if let Some(val) = env::var_os(ENV_DATA_DIR) {
            PathBuf::from(val)
        } else {
            let path = dirs_next::data_dir().ok_or_else(|| {
                anyhow!("operating environment provides no directory for application data")
            })?;
            path.join("pinmesh")
        };
        Ok(dir)
    }

    /// Get the path to the pin database file.
    pub fn store_path(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("pins-1.db"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            room: DEFAULT_ROOM.to_string(),
            retention: DEFAULT_RETENTION,
            data_dir: None,
        }
    }
}
