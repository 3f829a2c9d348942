use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

const CONFIG_DIR_PREFIX: &str = "hashprice-tracker";

const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub openai: OpenAiConfig,
    pub sheet: SheetConfig,
    #[serde(default)]
    pub google: GoogleConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CaptureConfig {
    /// Page to render and read values from.
    #[serde(default = "default_page_url")]
    pub url: String,
    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,
    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,
    #[serde(default = "default_navigation_timeout_secs")]
    pub navigation_timeout_secs: u64,
    /// Extra wait after the load event, for pages that keep painting charts.
    #[serde(default)]
    pub settle_delay_secs: u64,
}

fn default_page_url() -> String {
    "https://data.hashrateindex.com/network-data/bitcoin-hashprice-index".to_string()
}

fn default_viewport_width() -> u32 {
    1280
}

fn default_viewport_height() -> u32 {
    800
}

fn default_navigation_timeout_secs() -> u64 {
    60
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            url: default_page_url(),
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            navigation_timeout_secs: default_navigation_timeout_secs(),
            settle_delay_secs: 0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OpenAiConfig {
    /// Falls back to the OPENAI_API_KEY environment variable when unset.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_base_url() -> String {
    "https://api.openai.com".to_string()
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
            api_base_url: default_api_base_url(),
        }
    }
}

impl OpenAiConfig {
    pub fn api_key(&self) -> Result<String> {
        if !self.api_key.is_empty() {
            return Ok(self.api_key.clone());
        }

        match std::env::var(OPENAI_API_KEY_ENV) {
            Ok(key) if !key.is_empty() => Ok(key),
            _ => Err(AppError::Config(format!(
                "OpenAI API key must be set in config file or {}",
                OPENAI_API_KEY_ENV
            ))),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct SheetConfig {
    pub spreadsheet_id: String,
    #[serde(default = "default_range")]
    pub range: String,
}

fn default_range() -> String {
    "Sheet1!A1:D1".to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct GoogleConfig {
    /// OAuth client secret file. Defaults to credentials.json in the config directory.
    #[serde(default)]
    pub credentials_path: Option<PathBuf>,
}

impl GoogleConfig {
    pub fn credentials_file(&self) -> Result<PathBuf> {
        match &self.credentials_path {
            Some(path) => Ok(path.clone()),
            None => Config::config_dir_file("credentials.json"),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_file()?;

        if !config_path.exists() {
            return Err(AppError::Config(format!(
                "Config file not found at {:?}. Please create one.",
                config_path
            )));
        }

        let contents = fs::read_to_string(&config_path)?;
        let config: Config = toml::from_str(&contents)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {}", e)))?;

        if config.sheet.spreadsheet_id.is_empty() {
            return Err(AppError::Config(
                "sheet.spreadsheet_id must be set in config file".to_string(),
            ));
        }

        if config.capture.url.is_empty() {
            return Err(AppError::Config(
                "capture.url must not be empty".to_string(),
            ));
        }

        Ok(config)
    }

    fn xdg_dirs() -> xdg::BaseDirectories {
        xdg::BaseDirectories::with_prefix(CONFIG_DIR_PREFIX)
    }

    /// Get the config file path
    pub fn config_file() -> Result<PathBuf> {
        Self::config_dir_file("config.toml")
    }

    fn config_dir_file(filename: &str) -> Result<PathBuf> {
        let xdg_dirs = Self::xdg_dirs();
        xdg_dirs
            .place_config_file(filename)
            .map_err(|e| AppError::Config(format!("Failed to create config directory: {}", e)))
    }

    /// Get the cache directory path
    pub fn cache_dir() -> Result<PathBuf> {
        let xdg = Self::xdg_dirs();
        xdg.get_cache_home()
            .ok_or_else(|| AppError::Config("Failed to determine cache directory".to_string()))
    }

    /// Get a cache file path
    pub fn cache_file(filename: &str) -> Result<PathBuf> {
        let xdg = Self::xdg_dirs();
        xdg.place_cache_file(filename)
            .map_err(|e| AppError::Config(format!("Failed to create cache file path: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_serialization() {
        let config = Config {
            capture: CaptureConfig::default(),
            openai: OpenAiConfig {
                api_key: "sk-test".to_string(),
                ..Default::default()
            },
            sheet: SheetConfig {
                spreadsheet_id: "sheet_id".to_string(),
                range: "Prices!A1:C1".to_string(),
            },
            google: GoogleConfig::default(),
        };

        let serialized = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();

        assert_eq!(config.sheet.spreadsheet_id, deserialized.sheet.spreadsheet_id);
        assert_eq!(config.sheet.range, deserialized.sheet.range);
        assert_eq!(config.openai.api_key, deserialized.openai.api_key);
        assert_eq!(config.capture.url, deserialized.capture.url);
    }

    #[test]
    fn test_minimal_config_defaults() {
        let config: Config = toml::from_str(
            r#"
            [sheet]
            spreadsheet_id = "sheet_id"
            "#,
        )
        .unwrap();

        assert_eq!(config.sheet.range, "Sheet1!A1:D1");
        assert_eq!(config.openai.model, "gpt-4o-mini");
        assert_eq!(config.openai.api_base_url, "https://api.openai.com");
        assert_eq!(config.capture.viewport_width, 1280);
        assert_eq!(config.capture.viewport_height, 800);
        assert_eq!(config.capture.navigation_timeout_secs, 60);
        assert_eq!(config.capture.settle_delay_secs, 0);
        assert!(config.capture.url.contains("hashrateindex.com"));
        assert!(config.google.credentials_path.is_none());
    }

    #[test]
    fn test_api_key_from_config() {
        let openai = OpenAiConfig {
            api_key: "sk-from-config".to_string(),
            ..Default::default()
        };

        assert_eq!(openai.api_key().unwrap(), "sk-from-config");
    }

    #[test]
    fn test_explicit_credentials_path() {
        let google = GoogleConfig {
            credentials_path: Some(PathBuf::from("/tmp/credentials.json")),
        };

        assert_eq!(
            google.credentials_file().unwrap(),
            PathBuf::from("/tmp/credentials.json")
        );
    }
}
