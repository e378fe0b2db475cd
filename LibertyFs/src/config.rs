//! Persisted configuration
//!
//! Stored as pretty JSON at `<config dir>/LibertyFs/config.json`. Services
//! never read it themselves; [`crate::resolver::GameFileSystem::new`] takes
//! it as an argument.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

fn default_memory_budget_mb() -> u64 {
    512
}

fn default_overlay_priority() -> i32 {
    60
}

/// Bulk extraction tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkConfig {
    /// Worker threads (0 = hardware concurrency)
    #[serde(default)]
    pub num_threads: usize,
    /// Memory budget in MiB (0 = unbounded)
    #[serde(default = "default_memory_budget_mb")]
    pub memory_budget_mb: u64,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            num_threads: 0,
            memory_budget_mb: default_memory_budget_mb(),
        }
    }
}

/// An overlay registered on top of the conventional ones
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayConfig {
    pub path: PathBuf,
    #[serde(default = "default_overlay_priority")]
    pub priority: i32,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibertyConfig {
    /// Game install directory (overlays, archives, key)
    #[serde(default)]
    pub game_root: Option<PathBuf>,
    /// Loose files extracted at install time
    #[serde(default)]
    pub extracted_root: Option<PathBuf>,
    /// Explicit key file; otherwise the conventional locations are probed
    #[serde(default)]
    pub aes_key_path: Option<PathBuf>,
    #[serde(default)]
    pub texture_cache_dir: Option<PathBuf>,
    #[serde(default)]
    pub bulk: BulkConfig,
    #[serde(default)]
    pub extra_overlays: Vec<OverlayConfig>,
}

impl LibertyConfig {
    /// `<config dir>/LibertyFs/config.json`
    pub fn config_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("LibertyFs").join("config.json"))
            .ok_or(Error::ConfigDirNotFound)
    }

    /// Load from the default location, falling back to defaults.
    #[must_use]
    pub fn load() -> Self {
        Self::config_path()
            .ok()
            .and_then(|path| Self::load_from(path).ok())
            .unwrap_or_default()
    }

    /// Load from an explicit file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(Self::config_path()?)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Extracted root, defaulting to `<game root>/extracted`.
    #[must_use]
    pub fn extracted_root(&self) -> Option<PathBuf> {
        self.extracted_root
            .clone()
            .or_else(|| self.game_root.as_ref().map(|root| root.join("extracted")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: LibertyConfig = serde_json::from_str(r#"{"game_root": "/games/gtaiv"}"#).unwrap();
        assert_eq!(config.game_root, Some(PathBuf::from("/games/gtaiv")));
        assert_eq!(config.bulk.memory_budget_mb, 512);
        assert!(config.extra_overlays.is_empty());
        assert_eq!(config.extracted_root(), Some(PathBuf::from("/games/gtaiv/extracted")));
    }

    #[test]
    fn test_overlay_defaults() {
        let overlay: OverlayConfig = serde_json::from_str(r#"{"path": "mods/x"}"#).unwrap();
        assert_eq!(overlay.priority, 60);
        assert_eq!(overlay.name, None);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.json");
        let config = LibertyConfig {
            game_root: Some(dir.path().to_path_buf()),
            bulk: BulkConfig {
                num_threads: 3,
                memory_budget_mb: 64,
            },
            extra_overlays: vec![OverlayConfig {
                path: PathBuf::from("overlay"),
                priority: 75,
                name: Some("test".into()),
            }],
            ..LibertyConfig::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(LibertyConfig::load_from(&path).unwrap(), config);

        fs::write(&path, "not json").unwrap();
        assert!(matches!(LibertyConfig::load_from(&path), Err(Error::JsonError(_))));
    }
}
