//! Top headlines: live feed, keyword/category search and the saved `articles` collection.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::db::{NewArticle, SavedArticle};
use crate::error::{AppError, StorageError};
use crate::feed::{present, web_link, FeedPage, Notice};
use crate::fetcher::{ensure_ok, NewsClient};
use crate::store::{Gateway, Storage};

pub const UNKNOWN_AUTHOR: &str = "Unknown";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HeadlineSource {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Headline {
    #[serde(default)]
    pub source: Option<HeadlineSource>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub url_to_image: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl Headline {
    pub fn title_text(&self) -> &str {
        self.title.as_deref().unwrap_or("Untitled")
    }

    pub fn author_text(&self) -> &str {
        self.author.as_deref().unwrap_or(UNKNOWN_AUTHOR)
    }

    pub fn source_name(&self) -> &str {
        self.source
            .as_ref()
            .and_then(|source| source.name.as_deref())
            .unwrap_or("")
    }

    pub fn description_text(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }

    pub fn url_text(&self) -> &str {
        self.url.as_deref().unwrap_or("")
    }

    pub fn link(&self) -> &str {
        web_link(self.url_text())
    }

    pub fn image_text(&self) -> &str {
        self.url_to_image.as_deref().unwrap_or("")
    }

    pub fn published_text(&self) -> &str {
        self.published_at.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Default, Deserialize)]
struct HeadlinesBody {
    #[serde(default)]
    articles: Vec<Headline>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SaveArticleForm {
    pub title: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub url_to_image: Option<String>,
    pub published_at: Option<String>,
    pub source_name: Option<String>,
}

impl SaveArticleForm {
    pub fn validate(self) -> Result<NewArticle, AppError> {
        match (present(self.title), present(self.url)) {
            (Some(title), Some(url)) => Ok(NewArticle {
                title,
                author: present(self.author).unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
                description: present(self.description),
                url,
                url_to_image: present(self.url_to_image),
                published_at: present(self.published_at),
                source_name: present(self.source_name),
            }),
            _ => Err(AppError::Validation(
                "Missing required fields. Cannot save article.".to_string(),
            )),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateArticleForm {
    pub title: Option<String>,
    pub description: Option<String>,
}

pub type HeadlinesPage = FeedPage<Vec<Headline>, SavedArticle>;

pub struct HeadlinesService {
    client: NewsClient,
    gateway: Arc<dyn Gateway>,
}

impl HeadlinesService {
    pub fn new(client: NewsClient, gateway: Arc<dyn Gateway>) -> Self {
        Self { client, gateway }
    }

    async fn storage(&self, action: &str) -> Result<Arc<dyn Storage>, AppError> {
        self.gateway.storage().await.ok_or_else(|| {
            AppError::StorageUnavailable(format!(
                "Database connection failed. Cannot {} article.",
                action
            ))
        })
    }

    pub async fn feed(&self) -> HeadlinesPage {
        let fetched = self
            .client
            .top_headlines()
            .await
            .and_then(|body| ensure_ok(body, "Failed to fetch news"));

        let (feed, feed_notice) = match fetched {
            Ok(body) => match serde_json::from_value::<HeadlinesBody>(body) {
                Ok(body) => (Some(body.articles), None),
                Err(e) => {
                    warn!("Unexpected headlines payload: {}", e);
                    (
                        None,
                        Some(Notice::error(format!("Error processing news data: {}", e))),
                    )
                }
            },
            Err(e) => (None, Some(Notice::from(&e))),
        };

        let (saved, storage_notice, storage_available) = match self.gateway.storage().await {
            Some(storage) => match storage.list_articles().await {
                Ok(saved) => (saved, None, true),
                Err(e) => {
                    error!("Failed to list saved articles: {}", e);
                    (Vec::new(), Some(Notice::error(format!("Database error: {}", e))), true)
                }
            },
            None => (
                Vec::new(),
                Some(Notice::error(
                    "Database connection failed. Saved articles unavailable.",
                )),
                false,
            ),
        };

        FeedPage {
            feed,
            saved,
            feed_notice,
            storage_notice,
            storage_available,
        }
    }

    /// Category wins over keyword when both are given.
    pub async fn search(&self, query: SearchQuery) -> Result<Value, AppError> {
        let body = match (present(query.category), present(query.q)) {
            (Some(category), _) => self.client.by_category(&category).await?,
            (None, Some(keyword)) => self.client.everything(&keyword).await?,
            (None, None) => {
                return Err(AppError::Validation(
                    "Please provide a search query or category".to_string(),
                ))
            }
        };
        ensure_ok(body, "Search failed")
    }

    pub async fn save(&self, form: SaveArticleForm) -> Result<i64, AppError> {
        let storage = self.storage("save").await?;
        let article = form.validate()?;

        let already_saved = || AppError::Conflict("This article is already saved!".to_string());

        if storage
            .find_article_by_url(&article.url)
            .await
            .map_err(|e| storage_failure("saving", e))?
            .is_some()
        {
            return Err(already_saved());
        }

        match storage.insert_article(&article).await {
            Ok(id) => {
                info!("Saved article {} ({})", id, article.url);
                Ok(id)
            }
            Err(StorageError::Duplicate) => Err(already_saved()),
            Err(e) => Err(storage_failure("saving", e)),
        }
    }

    pub async fn update(&self, id: i64, form: UpdateArticleForm) -> Result<(), AppError> {
        let storage = self.storage("update").await?;
        let title = present(form.title)
            .ok_or_else(|| AppError::Validation("Title is required.".to_string()))?;
        let description = present(form.description);

        storage
            .update_article(id, &title, description.as_deref())
            .await
            .map_err(|e| storage_failure("updating", e))?;
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        let storage = self.storage("delete").await?;

        storage
            .delete_article(id)
            .await
            .map_err(|e| storage_failure("deleting", e))?;
        Ok(())
    }
}

fn storage_failure(action: &str, err: StorageError) -> AppError {
    error!("Error {} article: {}", action, err);
    AppError::StorageOperation(format!("Error {} article: {}", action, err))
}
