//! Simple configuration persistence for Miso
//!
//! Stores where clips come from and whether they are kept offline.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Directory or http(s) base URL containing `clips/`
    pub clip_root: String,
    /// Keep fetched clips in the offline store
    pub offline_cache: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            clip_root: ".".to_string(),
            offline_cache: true,
        }
    }
}

impl Config {
    /// Load config from the default location
    ///
    /// Returns default config if file doesn't exist or can't be parsed.
    pub fn load() -> Self {
        let path = Self::config_path();
        Self::load_from(&path).unwrap_or_default()
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    /// Save config to the default location
    pub fn save(&self) -> io::Result<()> {
        let path = Self::config_path();
        self.save_to(&path)
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, self.serialize())
    }

    /// Get the default config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("miso")
            .join("config.txt")
    }

    /// Whether clips are fetched over HTTP
    pub fn is_remote(&self) -> bool {
        self.clip_root.starts_with("http://") || self.clip_root.starts_with("https://")
    }

    /// Parse config from simple key=value format
    fn parse(content: &str) -> Self {
        let mut config = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                let value = value.trim();

                match key.trim() {
                    "clip_root" => {
                        if !value.is_empty() {
                            config.clip_root = value.to_string();
                        }
                    }
                    "offline_cache" => {
                        if let Ok(enabled) = value.parse() {
                            config.offline_cache = enabled;
                        }
                    }
                    _ => {}
                }
            }
        }

        config
    }

    /// Serialize config to simple key=value format
    fn serialize(&self) -> String {
        [
            "# Miso Configuration".to_string(),
            format!("clip_root={}", self.clip_root),
            format!("offline_cache={}", self.offline_cache),
        ]
        .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty() {
        assert_eq!(Config::parse(""), Config::default());
    }

    #[test]
    fn test_parse_values() {
        let config = Config::parse(
            "# Comment\nclip_root=https://example.org/miso\noffline_cache=false\nunknown=1",
        );
        assert_eq!(config.clip_root, "https://example.org/miso");
        assert!(!config.offline_cache);
        assert!(config.is_remote());
    }

    #[test]
    fn test_bad_values_keep_defaults() {
        let config = Config::parse("clip_root=\noffline_cache=maybe");
        assert_eq!(config, Config::default());
        assert!(!config.is_remote());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.txt");
        let config = Config {
            clip_root: "/srv/miso".to_string(),
            offline_cache: false,
        };

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }
}
