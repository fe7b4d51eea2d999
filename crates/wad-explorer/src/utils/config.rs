//! Application configuration management utilities.

use camino::{Utf8Path, Utf8PathBuf};
use ltk_wad_vfs::VfsConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io;

/// Application-wide configuration stored in config.toml.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding `hashes.<family>.txt` lists.
    pub hashtable_dir: Option<Utf8PathBuf>,
    pub keep_alive: bool,
    pub replace_existing: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            hashtable_dir: None,
            keep_alive: true,
            replace_existing: true,
        }
    }
}

impl AppConfig {
    pub fn vfs_config(&self) -> VfsConfig {
        VfsConfig {
            keep_alive: self.keep_alive,
            ..Default::default()
        }
    }

    /// The explicit directory if given, otherwise the configured one.
    pub fn hashtable_dir_or(&self, explicit: Option<&str>) -> Option<Utf8PathBuf> {
        explicit
            .map(Utf8PathBuf::from)
            .or_else(|| self.hashtable_dir.clone())
    }
}

/// Returns the directory where the current executable resides.
pub fn install_dir() -> Option<Utf8PathBuf> {
    let exe = env::current_exe().ok()?;
    let parent = exe.parent()?;
    Utf8PathBuf::from_path_buf(parent.to_path_buf()).ok()
}

/// Returns the default configuration file path (config.toml).
pub fn default_config_path() -> Option<Utf8PathBuf> {
    install_dir().map(|dir| dir.join("config.toml"))
}

/// Loads the application configuration from config.toml.
/// Returns default configuration if file doesn't exist or cannot be parsed.
pub fn load_config() -> AppConfig {
    default_config_path()
        .and_then(|path| load_config_from(&path))
        .unwrap_or_default()
}

fn load_config_from(path: &Utf8Path) -> Option<AppConfig> {
    let content = fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            tracing::warn!("Ignoring unreadable config {}: {}", path, e);
            None
        }
    }
}

/// Saves the application configuration to config.toml.
pub fn save_config(cfg: &AppConfig) -> io::Result<()> {
    let path = default_config_path().ok_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "Could not determine config path")
    })?;
    let content = toml::to_string_pretty(cfg).map_err(io::Error::other)?;
    fs::write(path, content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_use_defaults() {
        let cfg: AppConfig = toml::from_str("hashtable_dir = \"C:/hashes\"\n").unwrap();
        assert_eq!(cfg.hashtable_dir.as_deref(), Some(Utf8Path::new("C:/hashes")));
        assert!(cfg.keep_alive);
        assert!(cfg.replace_existing);
    }

    #[test]
    fn explicit_dir_wins() {
        let cfg = AppConfig {
            hashtable_dir: Some("configured".into()),
            ..Default::default()
        };
        assert_eq!(cfg.hashtable_dir_or(Some("explicit")), Some("explicit".into()));
        assert_eq!(cfg.hashtable_dir_or(None), Some("configured".into()));
        assert_eq!(AppConfig::default().hashtable_dir_or(None), None);
    }

    #[test]
    fn keep_alive_flows_into_vfs_config() {
        let cfg = AppConfig {
            keep_alive: false,
            ..Default::default()
        };
        assert!(!cfg.vfs_config().keep_alive);
    }
}
