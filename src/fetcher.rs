use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::{NasaConfig, NewsConfig};
use crate::error::AppError;

const USER_AGENT: &str = "CosmosWire/1.0 (Feed Aggregator)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Nasa,
    News,
}

impl Provider {
    pub fn label(&self) -> &'static str {
        match self {
            Provider::Nasa => "NASA API",
            Provider::News => "News API",
        }
    }

    fn failure_message(&self) -> &'static str {
        match self {
            Provider::Nasa => {
                "Failed to fetch NASA APOD. The NASA API may be temporarily unavailable."
            }
            Provider::News => {
                "Failed to fetch news. The News API may be temporarily unavailable."
            }
        }
    }

    /// Map a client failure onto the upstream error classes.
    pub fn classify(&self, err: reqwest::Error) -> AppError {
        warn!("{} request failed: {}", self.label(), err);

        if err.is_timeout() {
            AppError::UpstreamTimeout(format!(
                "{} request timed out. Please try again in a moment.",
                self.label()
            ))
        } else if err.is_connect() {
            AppError::UpstreamUnreachable(format!(
                "Unable to connect to {}. Please check your internet connection.",
                self.label()
            ))
        } else if err.is_decode() {
            AppError::Unexpected(format!("Error processing data: {}", err))
        } else {
            AppError::UpstreamRequestFailure(self.failure_message().to_string())
        }
    }
}

fn build_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
}

async fn get_json(provider: Provider, request: RequestBuilder) -> Result<Value, AppError> {
    let response = request.send().await.map_err(|e| provider.classify(e))?;
    let response = response
        .error_for_status()
        .map_err(|e| provider.classify(e))?;
    response.json::<Value>().await.map_err(|e| provider.classify(e))
}

/// Reject a NewsAPI body whose `status` is not `"ok"`, surfacing its `message`.
pub fn ensure_ok(body: Value, fallback: &str) -> Result<Value, AppError> {
    if body.get("status").and_then(Value::as_str) == Some("ok") {
        return Ok(body);
    }

    let message = body
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or(fallback)
        .to_string();
    warn!("News API reported an error: {}", message);
    Err(AppError::UpstreamApplication(message))
}

#[derive(Serialize)]
struct ApodQuery<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
    thumbs: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<&'a str>,
}

/// Client for the astronomy picture of the day endpoint.
pub struct ApodClient {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl ApodClient {
    pub fn new(
        url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> reqwest::Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            url: url.into(),
            api_key,
        })
    }

    pub fn from_config(config: &NasaConfig) -> reqwest::Result<Self> {
        if config.api_key.is_none() {
            warn!("NASA_API_KEY is not set; requests will be sent without a key");
        }
        Self::new(&config.apod_url, config.api_key.clone(), config.timeout())
    }

    /// Fetch the picture for `date`, or today's when `None`.
    pub async fn fetch(&self, date: Option<&str>) -> Result<Value, AppError> {
        info!("Fetching APOD ({})", date.unwrap_or("today"));

        let query = ApodQuery {
            api_key: self.api_key.as_deref(),
            thumbs: true,
            date,
        };
        get_json(Provider::Nasa, self.client.get(&self.url).query(&query)).await
    }
}

#[derive(Serialize)]
struct HeadlinesQuery<'a> {
    #[serde(rename = "apiKey", skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<&'a str>,
    country: &'a str,
    #[serde(rename = "pageSize")]
    page_size: u32,
}

#[derive(Serialize)]
struct EverythingQuery<'a> {
    #[serde(rename = "apiKey", skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
    q: &'a str,
    language: &'a str,
    #[serde(rename = "sortBy")]
    sort_by: &'a str,
    #[serde(rename = "pageSize")]
    page_size: u32,
}

/// Client for the top-headlines and everything endpoints.
///
/// Returns raw bodies; callers decide how to treat a non-"ok" status via
/// [`ensure_ok`].
pub struct NewsClient {
    client: Client,
    config: NewsConfig,
}

impl NewsClient {
    pub fn new(config: NewsConfig) -> reqwest::Result<Self> {
        if config.api_key.is_none() {
            warn!("NEWS_API_KEY is not set; requests will be sent without a key");
        }
        Ok(Self {
            client: build_client(config.timeout())?,
            config,
        })
    }

    /// Override the timeout taken from the config (tests use sub-second values).
    pub fn with_timeout(config: NewsConfig, timeout: Duration) -> reqwest::Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            config,
        })
    }

    pub async fn top_headlines(&self) -> Result<Value, AppError> {
        info!("Fetching top headlines for '{}'", self.config.country);

        let query = HeadlinesQuery {
            api_key: self.config.api_key.as_deref(),
            category: None,
            country: &self.config.country,
            page_size: self.config.page_size,
        };
        self.get_headlines(&query).await
    }

    pub async fn by_category(&self, category: &str) -> Result<Value, AppError> {
        info!("Searching headlines in category '{}'", category);

        let query = HeadlinesQuery {
            api_key: self.config.api_key.as_deref(),
            category: Some(category),
            country: &self.config.country,
            page_size: self.config.search_page_size,
        };
        self.get_headlines(&query).await
    }

    pub async fn everything(&self, keyword: &str) -> Result<Value, AppError> {
        info!("Searching all articles for '{}'", keyword);

        let query = EverythingQuery {
            api_key: self.config.api_key.as_deref(),
            q: keyword,
            language: &self.config.language,
            sort_by: "publishedAt",
            page_size: self.config.search_page_size,
        };
        let request = self.client.get(&self.config.everything_url).query(&query);
        get_json(Provider::News, request).await
    }

    async fn get_headlines(&self, query: &HeadlinesQuery<'_>) -> Result<Value, AppError> {
        let request = self
            .client
            .get(&self.config.top_headlines_url)
            .query(query);
        get_json(Provider::News, request).await
    }
}
