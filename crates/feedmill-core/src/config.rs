use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Data directory path
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Language used when a user has none recorded
    #[serde(default = "default_language")]
    pub default_language: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            default_language: default_language(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    /// Maximum number of redirects followed per request
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// Largest response body accepted, in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: u64,
    /// User-Agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// HTTP proxy URL (e.g., "http://127.0.0.1:7890" or "socks5://127.0.0.1:1080")
    #[serde(default)]
    pub proxy_url: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_timeout(),
            max_redirects: default_max_redirects(),
            max_body_bytes: default_max_body_bytes(),
            user_agent: default_user_agent(),
            proxy_url: None,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("feedmill")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_language() -> String {
    crate::locale::DEFAULT_LANGUAGE.to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_max_redirects() -> usize {
    10
}

fn default_max_body_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_user_agent() -> String {
    concat!("Mozilla/5.0 (compatible; feedmill/", env!("CARGO_PKG_VERSION"), ")").to_string()
}

/// Expand tilde (~) in path to user's home directory
fn expand_tilde(path: &std::path::Path) -> PathBuf {
    if let Some(path_str) = path.to_str() {
        if let Some(stripped) = path_str.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        } else if path_str == "~" {
            if let Some(home) = dirs::home_dir() {
                return home;
            }
        }
    }
    path.to_path_buf()
}

impl AppConfig {
    /// Load configuration from file or return defaults
    pub fn load() -> crate::Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_toml(&content)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        toml::from_str(content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Get the configuration file path
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("feedmill")
            .join("config.toml")
    }

    /// Get the database file path
    pub fn database_path(&self) -> PathBuf {
        self.data_dir().join("feedmill.db")
    }

    /// Get the data directory (with tilde expansion)
    pub fn data_dir(&self) -> PathBuf {
        expand_tilde(&self.general.data_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [http]
            request_timeout_secs = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.http.request_timeout_secs, 5);
        assert_eq!(config.http.max_redirects, 10);
        assert_eq!(config.general.default_language, "en_US");
        assert!(config.http.proxy_url.is_none());
    }

    #[test]
    fn test_invalid_config_is_config_error() {
        let result = AppConfig::from_toml("[http]\nrequest_timeout_secs = \"soon\"");
        assert!(matches!(result, Err(crate::Error::Config(_))));
    }

    #[test]
    fn test_database_path_under_data_dir() {
        let mut config = AppConfig::default();
        config.general.data_dir = PathBuf::from("/var/lib/feedmill");
        assert_eq!(config.database_path(), PathBuf::from("/var/lib/feedmill/feedmill.db"));
    }
}
