/// Configuration management
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub general: GeneralConfig,
    pub endpoints: EndpointConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Name reported for the playback device
    pub player_name: String,
    /// Startup volume (0-100)
    pub default_volume: u8,
    /// Log level (error, warn, info, debug, trace)
    pub log_level: String,
}

/// Collaborator base URLs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Spotify Web API base
    pub spotify_api: String,
    /// Video search service returning `{ "videoId": ... }`
    pub video_search: String,
    /// Cobalt-style download proxy
    pub download_proxy: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig {
                player_name: "T937 Web Player".to_string(),
                default_volume: 50,
                log_level: "info".to_string(),
            },
            endpoints: EndpointConfig {
                spotify_api: "https://api.spotify.com/v1".to_string(),
                video_search: "http://127.0.0.1:8937/api/youtube/search".to_string(),
                download_proxy: "https://cobalt.tools/api/json".to_string(),
            },
        }
    }
}

impl Config {
    /// Load configuration from file or create default
    pub fn load() -> Result<Self> {
        let config_dir = Self::config_dir()?;
        let config_path = config_dir.join("config.toml");

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            toml::from_str(&content).context("Failed to parse config file")
        } else {
            // Create default config
            std::fs::create_dir_all(&config_dir)?;
            let config = Self::default();
            let content = toml::to_string_pretty(&config)?;
            std::fs::write(&config_path, content)
                .with_context(|| format!("Failed to write {}", config_path.display()))?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_dir = Self::config_dir()?;
        let config_path = config_dir.join("config.toml");
        std::fs::create_dir_all(&config_dir)?;
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
        Ok(())
    }

    /// Get configuration directory path
    pub fn config_dir() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .context("Unable to determine config directory")?
            .join("t937");
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.default_volume, 50);
        assert!(config.endpoints.spotify_api.starts_with("https://"));
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let config = Config::default();
        let content = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&content).unwrap();
        assert_eq!(parsed.general.player_name, config.general.player_name);
        assert_eq!(parsed.endpoints.download_proxy, config.endpoints.download_proxy);
    }
}
