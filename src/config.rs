//! User configuration.
//!
//! Read from `<config dir>/lumina/config.toml`. Every key is optional.
//! Priority: command-line flags, then environment, then this file, then
//! built-in defaults.

use crate::credentials::ApiKeyStore;
use crate::error::{LuminaError, Result};
use crate::image::providers::DEFAULT_BASE_URL;
use crate::image::GenerationOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE_NAME: &str = "lumina/config.toml";

/// Settings loaded from the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LuminaConfig {
    /// API key used when no key variable is set.
    pub api_key: Option<String>,
    /// Gemini API endpoint.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Directory downloads are written to.
    pub output_dir: PathBuf,
    /// How long each loading message stays up, in milliseconds.
    pub loading_interval_ms: u64,
    /// Generation options a new session starts with.
    pub defaults: GenerationOptions,
}

impl Default for LuminaConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: 120,
            output_dir: PathBuf::from("."),
            loading_interval_ms: 3000,
            defaults: GenerationOptions::default(),
        }
    }
}

impl LuminaConfig {
    /// Default location of the config file, if the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        let Some(dir) = dirs::config_dir() else {
            tracing::warn!("failed to get config directory, using built-in defaults");
            return None;
        };
        Some(dir.join(CONFIG_FILE_NAME))
    }

    /// Loads from `path`, or from the default location when `None`.
    ///
    /// A missing file yields the defaults; a file that exists but can't be
    /// read or parsed is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let data = std::fs::read_to_string(&path).map_err(|e| {
            LuminaError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml(&data)
            .map_err(|e| LuminaError::Config(format!("{}: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Parses a config from TOML text.
    pub fn from_toml(data: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(data)
    }

    /// Per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Loading message interval.
    pub fn loading_interval(&self) -> Duration {
        Duration::from_millis(self.loading_interval_ms.max(1))
    }

    /// Key store seeded from the environment, falling back to `api_key`.
    pub fn key_store(&self) -> ApiKeyStore {
        self.key_store_with(|var| std::env::var(var).ok())
    }

    /// Like [`key_store`](Self::key_store), reading variables through `env`.
    pub fn key_store_with(&self, env: impl Fn(&str) -> Option<String>) -> ApiKeyStore {
        let store = ApiKeyStore::from_env_with(env);
        if !store.has_selected_api_key() {
            if let Some(ref key) = self.api_key {
                tracing::debug!("using API key from config file");
                store.set(key.as_str());
            }
        }
        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{AspectRatio, ImageSize};

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = LuminaConfig::from_toml("").unwrap();
        assert_eq!(config, LuminaConfig::default());
        assert_eq!(config.loading_interval(), Duration::from_secs(3));
        assert_eq!(config.request_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_partial_file() {
        let config = LuminaConfig::from_toml(
            r#"
            output_dir = "renders"
            loading_interval_ms = 500

            [defaults]
            aspect_ratio = "16:9"
            high_quality = true
            image_size = "4K"
            "#,
        )
        .unwrap();

        assert_eq!(config.output_dir, PathBuf::from("renders"));
        assert_eq!(config.loading_interval(), Duration::from_millis(500));
        assert_eq!(config.defaults.aspect_ratio, AspectRatio::Cinematic);
        assert!(config.defaults.high_quality);
        assert_eq!(config.defaults.image_size, ImageSize::FourK);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_defaults_table_may_be_partial() {
        let config = LuminaConfig::from_toml("[defaults]\nhigh_quality = true\n").unwrap();
        assert!(config.defaults.high_quality);
        assert_eq!(config.defaults.aspect_ratio, AspectRatio::Square);
    }

    #[test]
    fn test_invalid_value_is_rejected() {
        assert!(LuminaConfig::from_toml("[defaults]\naspect_ratio = \"21:9\"\n").is_err());
    }

    fn config_with_key() -> LuminaConfig {
        LuminaConfig::from_toml("api_key = \"config-key\"\n").unwrap()
    }

    #[test]
    fn test_env_key_beats_config_key() {
        let store = config_with_key().key_store_with(|var| {
            (var == "GEMINI_API_KEY").then(|| "env-key".to_string())
        });
        assert_eq!(store.get().as_deref(), Some("env-key"));
    }

    #[test]
    fn test_config_key_used_without_env() {
        let store = config_with_key().key_store_with(|_| None);
        assert_eq!(store.get().as_deref(), Some("config-key"));
    }

    #[test]
    fn test_no_key_anywhere() {
        let store = LuminaConfig::default().key_store_with(|_| None);
        assert!(!store.has_selected_api_key());
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = LuminaConfig::load(Some(dir.path().join("nope.toml").as_path())).unwrap();
        assert_eq!(config, LuminaConfig::default());
    }

    #[test]
    fn test_load_broken_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "output_dir = [").unwrap();
        assert!(matches!(
            LuminaConfig::load(Some(path.as_path())),
            Err(LuminaError::Config(_))
        ));
    }
}
