use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// sqlx connection string; persistence is disabled when absent
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default)]
    pub nasa: NasaConfig,
    #[serde(default)]
    pub news: NewsConfig,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct NasaConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_apod_url")]
    pub apod_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_nasa_timeout")]
    pub timeout_secs: u64,
}

fn default_apod_url() -> String {
    "https://api.nasa.gov/planetary/apod".to_string()
}

fn default_nasa_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct NewsConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_top_headlines_url")]
    pub top_headlines_url: String,
    #[serde(default = "default_everything_url")]
    pub everything_url: String,
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_search_page_size")]
    pub search_page_size: u32,
    /// Request timeout in seconds
    #[serde(default = "default_news_timeout")]
    pub timeout_secs: u64,
}

fn default_top_headlines_url() -> String {
    "https://newsapi.org/v2/top-headlines".to_string()
}

fn default_everything_url() -> String {
    "https://newsapi.org/v2/everything".to_string()
}

fn default_country() -> String {
    "us".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_page_size() -> u32 {
    10
}

fn default_search_page_size() -> u32 {
    20
}

fn default_news_timeout() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            database_url: None,
            nasa: NasaConfig::default(),
            news: NewsConfig::default(),
        }
    }
}

impl Default for NasaConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            apod_url: default_apod_url(),
            timeout_secs: default_nasa_timeout(),
        }
    }
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            top_headlines_url: default_top_headlines_url(),
            everything_url: default_everything_url(),
            country: default_country(),
            language: default_language(),
            page_size: default_page_size(),
            search_page_size: default_search_page_size(),
            timeout_secs: default_news_timeout(),
        }
    }
}

impl NasaConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl NewsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Load the file when it exists, fall back to defaults otherwise, then
    /// apply the process environment on top.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let config = if path.as_ref().exists() {
            Self::load(path)?
        } else {
            Self::default()
        };
        Ok(config.with_env(|key| std::env::var(key).ok()))
    }

    /// Override values from environment-style lookups. Empty values count as unset.
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("DATABASE_URL") {
            self.database_url = Some(url);
        }
        if let Some(key) = get("NASA_API_KEY") {
            self.nasa.api_key = Some(key);
        }
        if let Some(key) = get("NEWS_API_KEY") {
            self.news.api_key = Some(key);
        }
        if let Some(addr) = get("BIND_ADDR") {
            self.bind_addr = addr;
        }
        self
    }
}
