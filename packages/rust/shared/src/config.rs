//! Application configuration for fleetsql.
//!
//! User config lives at `~/.fleetsql/fleetsql.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FleetSqlError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "fleetsql.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".fleetsql";

// ---------------------------------------------------------------------------
// Config structs (matching fleetsql.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where the store file is built.
    #[serde(default)]
    pub store: StoreConfig,

    /// Query transport settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// External field dictionary.
    #[serde(default)]
    pub ecs: EcsConfig,
}

/// `[store]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path of the SQLite store. Replaced wholesale on every build.
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> String {
    "fleetpkg.db".into()
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Transport: "stdio" or "http".
    #[serde(default = "default_transport")]
    pub transport: String,

    /// Listen address for the HTTP transport.
    #[serde(default = "default_http_addr")]
    pub http_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: default_transport(),
            http_addr: default_http_addr(),
        }
    }
}

fn default_transport() -> String {
    "stdio".into()
}
fn default_http_addr() -> String {
    "127.0.0.1:8585".into()
}

/// `[ecs]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EcsConfig {
    /// Directory holding one `ecs_flat.yml` per ECS git reference, laid out
    /// as `<dir>/<reference>/ecs_flat.yml` or `<dir>/<reference>.yml`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dictionary_dir: Option<String>,
}

// ---------------------------------------------------------------------------
// Build config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime build configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Root of the integrations corpus (contains `packages/`).
    pub integrations_dir: PathBuf,
    /// Final location of the store file.
    pub store_path: PathBuf,
    /// Optional ECS dictionary directory.
    pub ecs_dir: Option<PathBuf>,
}

impl BuildConfig {
    /// Combine the config file with the corpus directory given on the CLI.
    pub fn from_config(config: &AppConfig, integrations_dir: impl Into<PathBuf>) -> Self {
        Self {
            integrations_dir: integrations_dir.into(),
            store_path: PathBuf::from(&config.store.path),
            ecs_dir: config.ecs.dictionary_dir.as_ref().map(PathBuf::from),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.fleetsql/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| FleetSqlError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.fleetsql/fleetsql.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| FleetSqlError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| FleetSqlError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| FleetSqlError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| FleetSqlError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| FleetSqlError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
