//! Content-service configuration.
//!
//! Loaded once at startup: `config.json` first, then environment variables,
//! then defaults for anything still empty. The weather and DeepSeek API keys
//! are mandatory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("configuration validation failed: {0}")]
    Invalid(&'static str),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherApiConfig {
    pub api_key: String,
    pub base_url: String,
    pub city: String,
    /// Mobile weather page scraped for current conditions.
    pub page_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficApiConfig {
    pub api_key: String,
    pub base_url: String,
    pub city: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LunarApiConfig {
    pub base_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeepSeekConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

/// Cover-generation MCP server and the image editor it screenshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverConfig {
    pub server_url: String,
    pub headless: bool,
    /// Image editor front-end (also serves `/api/assets`).
    pub base_url: String,
    pub out_dir: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct XiaohongshuConfig {
    pub server_url: String,
    pub headless: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeiboConfig {
    pub uid: String,
    pub cookies: String,
    pub token: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub post_interval: String,
    pub log_level: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub weather_api: WeatherApiConfig,
    pub traffic_api: TrafficApiConfig,
    pub lunar_api: LunarApiConfig,
    pub deepseek_llm: DeepSeekConfig,
    pub mcp: CoverConfig,
    pub xiaohongshu: XiaohongshuConfig,
    pub weibo: WeiboConfig,
    pub settings: Settings,
}

impl Config {
    /// Load from `path` with the process environment as overlay.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Load from `path`, reading overrides through `lookup`.
    ///
    /// A missing file is not an error; malformed JSON is.
    pub fn load_with<F>(path: impl AsRef<Path>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = path.as_ref();
        let mut config = match std::fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                source: e,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file, using environment and defaults");
                Config::default()
            }
            Err(e) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };

        config.apply_env(lookup);
        config.apply_defaults();
        config.validate()?;
        Ok(config)
    }

    fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(v) = get("WEATHER_API_KEY") {
            self.weather_api.api_key = v;
        }
        if let Some(v) = get("WEATHER_API_URL") {
            self.weather_api.base_url = v;
        }
        if let Some(v) = get("WEATHER_PAGE_URL") {
            self.weather_api.page_url = v;
        }
        if let Some(city) = get("CITY") {
            self.weather_api.city = city.clone();
            self.traffic_api.city = city;
        }
        if let Some(v) = get("TRAFFIC_API_KEY") {
            self.traffic_api.api_key = v;
        }
        if let Some(v) = get("TRAFFIC_API_URL") {
            self.traffic_api.base_url = v;
        }
        if let Some(v) = get("LUNAR_API_URL") {
            self.lunar_api.base_url = v;
        }
        if let Some(v) = get("DEEPSEEK_API_KEY") {
            self.deepseek_llm.api_key = v;
        }
        if let Some(v) = get("DEEPSEEK_API_URL") {
            self.deepseek_llm.base_url = v;
        }
        if let Some(v) = get("DEEPSEEK_MODEL") {
            self.deepseek_llm.model = v;
        }
        if let Some(v) = get("MCP_SERVER_URL") {
            self.mcp.server_url = v;
        }
        if let Some(v) = get("XHS_SERVER_URL") {
            self.xiaohongshu.server_url = v;
        }
        if let Some(v) = get("WEIBO_UID") {
            self.weibo.uid = v;
        }
        if let Some(v) = get("WEIBO_COOKIES") {
            self.weibo.cookies = v;
        }
        if let Some(v) = get("WEIBO_TOKEN") {
            self.weibo.token = v;
        }
        if let Some(v) = get("WEIBO_API_URL") {
            self.weibo.base_url = v;
        }
        if let Some(v) = get("POST_INTERVAL") {
            self.settings.post_interval = v;
        }
        if let Some(v) = get("LOG_LEVEL") {
            self.settings.log_level = v;
        }
    }

    fn apply_defaults(&mut self) {
        fn or_default(field: &mut String, default: &str) {
            if field.is_empty() {
                *field = default.to_string();
            }
        }

        or_default(
            &mut self.weather_api.base_url,
            "https://api.openweathermap.org/data/2.5",
        );
        or_default(&mut self.weather_api.city, "Beijing");
        or_default(
            &mut self.weather_api.page_url,
            "https://e.weather.com.cn/mweather/101010100.shtml",
        );
        or_default(&mut self.traffic_api.city, "Beijing");
        or_default(&mut self.lunar_api.base_url, "https://api.xcvts.cn/api/huangli");
        or_default(&mut self.deepseek_llm.base_url, "https://api.deepseek.com");
        or_default(&mut self.deepseek_llm.model, "deepseek-chat");
        or_default(&mut self.mcp.server_url, "http://localhost:18062");
        or_default(&mut self.mcp.base_url, "http://localhost:3000");
        if self.mcp.out_dir.is_empty() {
            self.mcp.out_dir = default_out_dir().display().to_string();
        }
        or_default(&mut self.xiaohongshu.server_url, "http://localhost:18062");
        or_default(&mut self.weibo.uid, "3937775216");
        or_default(&mut self.weibo.base_url, "https://weibo.com");
        or_default(&mut self.settings.post_interval, "24h");
        or_default(&mut self.settings.log_level, "info");
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.weather_api.api_key.is_empty() {
            return Err(ConfigError::Invalid("weather API key is required"));
        }
        if self.deepseek_llm.api_key.is_empty() {
            return Err(ConfigError::Invalid("DeepSeek API key is required"));
        }
        Ok(())
    }
}

/// The user's desktop when the platform has one, else the working directory.
pub fn default_out_dir() -> PathBuf {
    directories::UserDirs::new()
        .and_then(|dirs| dirs.desktop_dir().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn keys() -> Vec<(&'static str, &'static str)> {
        vec![("WEATHER_API_KEY", "w-key"), ("DEEPSEEK_API_KEY", "d-key")]
    }

    #[test]
    fn test_missing_file_uses_env_and_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_with(dir.path().join("config.json"), env(&keys())).unwrap();

        assert_eq!(config.weather_api.api_key, "w-key");
        assert_eq!(config.weather_api.city, "Beijing");
        assert_eq!(config.deepseek_llm.base_url, "https://api.deepseek.com");
        assert_eq!(config.deepseek_llm.model, "deepseek-chat");
        assert_eq!(config.mcp.server_url, "http://localhost:18062");
        assert_eq!(config.mcp.base_url, "http://localhost:3000");
        assert_eq!(config.xiaohongshu.server_url, "http://localhost:18062");
        assert_eq!(config.weibo.uid, "3937775216");
        assert!(config.weibo.cookies.is_empty());
        assert_eq!(config.settings.post_interval, "24h");
        assert_eq!(config.settings.log_level, "info");
        assert!(!config.mcp.out_dir.is_empty());
    }

    #[test]
    fn test_env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "weather_api": {"api_key": "from-file", "city": "Shanghai"},
                "deepseek_llm": {"api_key": "file-key", "model": "deepseek-reasoner"},
                "mcp": {"out_dir": "/tmp/covers", "headless": true}
            }"#,
        )
        .unwrap();

        let mut pairs = vec![("CITY", "Tianjin"), ("WEATHER_API_KEY", "from-env")];
        pairs.push(("LOG_LEVEL", "debug"));
        let config = Config::load_with(&path, env(&pairs)).unwrap();

        assert_eq!(config.weather_api.api_key, "from-env");
        assert_eq!(config.weather_api.city, "Tianjin");
        assert_eq!(config.traffic_api.city, "Tianjin");
        assert_eq!(config.deepseek_llm.api_key, "file-key");
        assert_eq!(config.deepseek_llm.model, "deepseek-reasoner");
        assert_eq!(config.mcp.out_dir, "/tmp/covers");
        assert!(config.mcp.headless);
        assert_eq!(config.settings.log_level, "debug");
    }

    #[test]
    fn test_empty_env_value_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let mut pairs = keys();
        pairs.push(("DEEPSEEK_MODEL", ""));
        let config = Config::load_with(dir.path().join("none.json"), env(&pairs)).unwrap();
        assert_eq!(config.deepseek_llm.model, "deepseek-chat");
    }

    #[test]
    fn test_required_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let err = Config::load_with(&path, env(&[("DEEPSEEK_API_KEY", "d")])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "configuration validation failed: weather API key is required"
        );

        let err = Config::load_with(&path, env(&[("WEATHER_API_KEY", "w")])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "configuration validation failed: DeepSeek API key is required"
        );
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = Config::load_with(&path, env(&keys())).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
