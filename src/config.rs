use std::{
    env,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::object::AuthorId;

/// Expand tilde (~) in path to user's home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(s) = path.to_str() {
        if let Some(stripped) = s.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        } else if s == "~" {
            if let Some(home) = dirs::home_dir() {
                return home;
            }
        }
    }
    path.to_path_buf()
}

/// Configuration for playlist-vcs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Author recorded on new commits
    #[serde(default = "defaults::author_id")]
    pub author_id: AuthorId,
    /// Local object store and clone records
    #[serde(default = "defaults::store_dir")]
    pub store_dir: PathBuf,
    /// Filesystem remote authority
    #[serde(default = "defaults::remote_dir")]
    pub remote_dir: PathBuf,
    /// Directory of live playlist files standing in for the streaming service
    #[serde(default = "defaults::live_dir")]
    pub live_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            author_id: defaults::author_id(),
            store_dir: defaults::store_dir(),
            remote_dir: defaults::remote_dir(),
            live_dir: defaults::live_dir(),
        }
    }
}

impl Config {
    /// Load configuration from the default config file (if present) and
    /// environment variables
    pub fn load() -> Result<Self> {
        let config_path = Self::config_file_path()?;
        tracing::debug!("loading playlist-vcs config from {:?}", config_path);
        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Config::default()
        };
        config.apply_env(|key| env::var(key).ok());
        Ok(config)
    }

    /// Apply `PLAYLIST_VCS_*` overrides read through `var`
    pub fn apply_env<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(author) = var("PLAYLIST_VCS_AUTHOR") {
            self.author_id = AuthorId::new(author);
        }

        if let Some(path) = var("PLAYLIST_VCS_STORE_DIR") {
            self.store_dir = expand_tilde(&PathBuf::from(path));
        }

        if let Some(path) = var("PLAYLIST_VCS_REMOTE_DIR") {
            self.remote_dir = expand_tilde(&PathBuf::from(path));
        }

        if let Some(path) = var("PLAYLIST_VCS_LIVE_DIR") {
            self.live_dir = expand_tilde(&PathBuf::from(path));
        }
    }

    /// Load configuration from a file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.store_dir = expand_tilde(&config.store_dir);
        config.remote_dir = expand_tilde(&config.remote_dir);
        config.live_dir = expand_tilde(&config.live_dir);

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Get default config file path
    pub fn config_file_path() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(".config/playlist-vcs/config.yaml"))
            .context("Could not determine home directory for config file")
    }
}

mod defaults {
    use std::path::PathBuf;

    use crate::object::AuthorId;

    fn data_dir() -> PathBuf {
        dirs::home_dir()
            .map(|home| home.join(".local/share/playlist-vcs"))
            .unwrap_or_else(|| PathBuf::from(".playlist-vcs"))
    }

    pub(crate) fn author_id() -> AuthorId {
        AuthorId::new(std::env::var("USER").unwrap_or_else(|_| "anonymous".to_string()))
    }

    pub(crate) fn store_dir() -> PathBuf {
        data_dir().join("store")
    }

    pub(crate) fn remote_dir() -> PathBuf {
        data_dir().join("remote")
    }

    pub(crate) fn live_dir() -> PathBuf {
        data_dir().join("live")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("nested").join("config.yaml");

        let config = Config {
            author_id: AuthorId::from("alice"),
            store_dir: dir.path().join("store"),
            remote_dir: dir.path().join("remote"),
            live_dir: dir.path().join("live"),
        };
        config.save(&config_path).unwrap();

        let loaded = Config::load_from_file(&config_path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        std::fs::write(&config_path, "author_id: bob\n").unwrap();

        let loaded = Config::load_from_file(&config_path).unwrap();
        assert_eq!(loaded.author_id, AuthorId::from("bob"));
        assert_eq!(loaded.store_dir, defaults::store_dir());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        std::fs::write(&config_path, "cache_dir: /tmp\n").unwrap();
        assert!(Config::load_from_file(&config_path).is_err());
    }

    #[test]
    fn test_env_override() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("PLAYLIST_VCS_AUTHOR", "carol"),
            ("PLAYLIST_VCS_STORE_DIR", "/srv/store"),
        ]);

        let mut config = Config::default();
        let remote_dir = config.remote_dir.clone();
        config.apply_env(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.author_id, AuthorId::from("carol"));
        assert_eq!(config.store_dir, PathBuf::from("/srv/store"));
        assert_eq!(config.remote_dir, remote_dir);
    }

    #[test]
    fn test_tilde_expansion() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");

        let config_content = r#"
author_id: alice
store_dir: ~/playlists/store
remote_dir: ~/playlists/remote
live_dir: ~/playlists/live
"#;
        std::fs::write(&config_path, config_content).unwrap();

        let loaded = Config::load_from_file(&config_path).unwrap();

        if let Some(home) = dirs::home_dir() {
            assert_eq!(loaded.store_dir, home.join("playlists/store"));
            assert_eq!(loaded.remote_dir, home.join("playlists/remote"));
            assert_eq!(loaded.live_dir, home.join("playlists/live"));
        }
    }

    #[test]
    fn test_tilde_expansion_env_vars() {
        let home = dirs::home_dir().unwrap();
        let mut config = Config::default();
        config.apply_env(|key| match key {
            "PLAYLIST_VCS_LIVE_DIR" => Some("~/test/live".to_string()),
            _ => None,
        });
        assert_eq!(config.live_dir, home.join("test/live"));
    }
}
