//! Configuration directory, settings and registry persistence
//!
//! All state lives in one directory:
//! - `buckets.json`: the registry document
//! - `settings.json`: optional tunables
//! - `lock`: sentinel held by the running instance

mod lock;
mod store;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ResenError, Result};

pub use lock::InstanceLock;
pub use store::ConfigStore;

pub const APP_NAME: &str = "resen";
pub const REGISTRY_FILE: &str = "buckets.json";
pub const SETTINGS_FILE: &str = "settings.json";
pub const LOCK_FILE: &str = "lock";

/// Default container-side prefix that storage may be mounted under
pub const DEFAULT_STORAGE_WHITELIST: &str = "/home/jovyan/mount";
/// First port tried by the port allocator
pub const DEFAULT_BASE_PORT: u16 = 9000;

/// Locate the configuration home: `APPDATA`, then `XDG_CONFIG_HOME`, then `~/.config`.
pub fn config_home<F>(lookup: F) -> Result<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(dir) = lookup("APPDATA") {
        return Ok(PathBuf::from(dir));
    }
    if let Some(dir) = lookup("XDG_CONFIG_HOME") {
        return Ok(PathBuf::from(dir));
    }
    match lookup("HOME") {
        Some(home) => Ok(Path::new(&home).join(".config")),
        None => Err(ResenError::NotFound(
            "Cannot locate a configuration directory: none of APPDATA, XDG_CONFIG_HOME or HOME is set"
                .to_string(),
        )),
    }
}

/// Resolve and create the resen configuration directory.
pub fn config_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    let dir = match explicit {
        Some(dir) => dir.to_path_buf(),
        None => config_home(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))?.join(APP_NAME),
    };
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Tunables read from `settings.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Container-side prefixes storage may be mounted under
    pub storage_whitelist: Vec<PathBuf>,
    pub base_port: u16,
    /// Wait after launching the notebook server before checking for it
    pub session_settle_ms: u64,
    /// Where imported mounts are unpacked when no directory is given
    pub bundle_mount_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            storage_whitelist: vec![PathBuf::from(DEFAULT_STORAGE_WHITELIST)],
            base_port: DEFAULT_BASE_PORT,
            session_settle_ms: 100,
            bundle_mount_dir: None,
        }
    }
}

impl Settings {
    /// Load settings from the config directory, falling back to defaults.
    pub fn load(config_dir: &Path) -> Result<Self> {
        let path = config_dir.join(SETTINGS_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)?;
        let settings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    pub fn session_settle(&self) -> Duration {
        Duration::from_millis(self.session_settle_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_config_home_order() {
        let all = env(&[("APPDATA", "/a"), ("XDG_CONFIG_HOME", "/x"), ("HOME", "/h")]);
        assert_eq!(config_home(all).unwrap(), PathBuf::from("/a"));

        let xdg = env(&[("XDG_CONFIG_HOME", "/x"), ("HOME", "/h")]);
        assert_eq!(config_home(xdg).unwrap(), PathBuf::from("/x"));

        let home = env(&[("HOME", "/h")]);
        assert_eq!(config_home(home).unwrap(), PathBuf::from("/h/.config"));

        assert!(config_home(env(&[])).is_err());
    }

    #[test]
    fn test_config_dir_explicit_is_created() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("nested").join("resen");
        let resolved = config_dir(Some(&dir)).unwrap();
        assert_eq!(resolved, dir);
        assert!(dir.is_dir());
    }

    #[test]
    fn test_settings_defaults_and_partial_file() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(Settings::load(tmp.path()).unwrap(), Settings::default());

        fs::write(tmp.path().join(SETTINGS_FILE), r#"{"base_port": 9100}"#).unwrap();
        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.base_port, 9100);
        assert_eq!(settings.storage_whitelist, vec![PathBuf::from(DEFAULT_STORAGE_WHITELIST)]);
    }
}
