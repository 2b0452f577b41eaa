//! Storage seam between the feed modules and the database.
//!
//! Feature modules never open connections themselves: they ask a [`Gateway`]
//! for a [`Storage`] handle on every call and treat `None` as "persistence
//! disabled". Uniqueness of natural keys is the backend's job; a violated
//! constraint comes back as [`StorageError::Duplicate`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::db::{NewArticle, NewPicture, SavedArticle, SavedPicture};
use crate::error::StorageError;

#[async_trait]
pub trait Storage: Send + Sync {
    /// Saved pictures, newest saved first.
    async fn list_pictures(&self) -> Result<Vec<SavedPicture>, StorageError>;
    async fn find_picture_by_date(&self, date: &str) -> Result<Option<i64>, StorageError>;
    async fn insert_picture(&self, picture: &NewPicture) -> Result<i64, StorageError>;
    async fn update_picture(
        &self,
        id: i64,
        title: &str,
        explanation: Option<&str>,
    ) -> Result<u64, StorageError>;
    async fn delete_picture(&self, id: i64) -> Result<u64, StorageError>;

    /// Saved articles, newest saved first.
    async fn list_articles(&self) -> Result<Vec<SavedArticle>, StorageError>;
    async fn find_article_by_url(&self, url: &str) -> Result<Option<i64>, StorageError>;
    async fn insert_article(&self, article: &NewArticle) -> Result<i64, StorageError>;
    async fn update_article(
        &self,
        id: i64,
        title: &str,
        description: Option<&str>,
    ) -> Result<u64, StorageError>;
    async fn delete_article(&self, id: i64) -> Result<u64, StorageError>;
}

#[async_trait]
pub trait Gateway: Send + Sync {
    /// A usable storage handle, or `None` when storage is unavailable.
    async fn storage(&self) -> Option<Arc<dyn Storage>>;
}

#[cfg(any(test, feature = "testkit"))]
pub use testkit::{FixedGateway, MemoryStore};

#[cfg(any(test, feature = "testkit"))]
mod testkit {
    use super::*;
    use chrono::Utc;
    use tokio::sync::Mutex;

    /// Article urls are unique over their first 255 characters, as in SQLite.
    fn same_url(a: &str, b: &str) -> bool {
        a.chars().take(URL_KEY_CHARS).eq(b.chars().take(URL_KEY_CHARS))
    }

    const URL_KEY_CHARS: usize = 255;

    #[derive(Default)]
    struct Tables {
        next_id: i64,
        pictures: Vec<SavedPicture>,
        articles: Vec<SavedArticle>,
        failing: bool,
    }

    impl Tables {
        fn check(&self) -> Result<(), StorageError> {
            if self.failing {
                return Err(StorageError::Backend("disk I/O error".to_string()));
            }
            Ok(())
        }

        fn next_id(&mut self) -> i64 {
            self.next_id += 1;
            self.next_id
        }
    }

    /// In-memory [`Storage`] with the same uniqueness rules as the SQLite schema.
    #[derive(Default)]
    pub struct MemoryStore {
        tables: Mutex<Tables>,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every following call fail with a backend error.
        pub async fn set_failing(&self, failing: bool) {
            self.tables.lock().await.failing = failing;
        }
    }

    #[async_trait]
    impl Storage for MemoryStore {
        async fn list_pictures(&self) -> Result<Vec<SavedPicture>, StorageError> {
            let tables = self.tables.lock().await;
            tables.check()?;
            Ok(tables.pictures.iter().rev().cloned().collect())
        }

        async fn find_picture_by_date(&self, date: &str) -> Result<Option<i64>, StorageError> {
            let tables = self.tables.lock().await;
            tables.check()?;
            Ok(tables.pictures.iter().find(|p| p.date == date).map(|p| p.id))
        }

        async fn insert_picture(&self, picture: &NewPicture) -> Result<i64, StorageError> {
            let mut tables = self.tables.lock().await;
            tables.check()?;
            if tables.pictures.iter().any(|p| p.date == picture.date) {
                return Err(StorageError::Duplicate);
            }
            let id = tables.next_id();
            tables.pictures.push(SavedPicture {
                id,
                title: picture.title.clone(),
                date: picture.date.clone(),
                url: picture.url.clone(),
                explanation: picture.explanation.clone(),
                media_type: picture.media_type.clone(),
                saved_at: Utc::now().to_rfc3339(),
            });
            Ok(id)
        }

        async fn update_picture(
            &self,
            id: i64,
            title: &str,
            explanation: Option<&str>,
        ) -> Result<u64, StorageError> {
            let mut tables = self.tables.lock().await;
            tables.check()?;
            match tables.pictures.iter_mut().find(|p| p.id == id) {
                Some(picture) => {
                    picture.title = title.to_string();
                    picture.explanation = explanation.map(str::to_string);
                    Ok(1)
                }
                None => Ok(0),
            }
        }

        async fn delete_picture(&self, id: i64) -> Result<u64, StorageError> {
            let mut tables = self.tables.lock().await;
            tables.check()?;
            let before = tables.pictures.len();
            tables.pictures.retain(|p| p.id != id);
            Ok((before - tables.pictures.len()) as u64)
        }

        async fn list_articles(&self) -> Result<Vec<SavedArticle>, StorageError> {
            let tables = self.tables.lock().await;
            tables.check()?;
            Ok(tables.articles.iter().rev().cloned().collect())
        }

        async fn find_article_by_url(&self, url: &str) -> Result<Option<i64>, StorageError> {
            let tables = self.tables.lock().await;
            tables.check()?;
            Ok(tables
                .articles
                .iter()
                .find(|a| same_url(&a.url, url))
                .map(|a| a.id))
        }

        async fn insert_article(&self, article: &NewArticle) -> Result<i64, StorageError> {
            let mut tables = self.tables.lock().await;
            tables.check()?;
            if tables.articles.iter().any(|a| same_url(&a.url, &article.url)) {
                return Err(StorageError::Duplicate);
            }
            let id = tables.next_id();
            tables.articles.push(SavedArticle {
                id,
                title: article.title.clone(),
                author: article.author.clone(),
                description: article.description.clone(),
                url: article.url.clone(),
                url_to_image: article.url_to_image.clone(),
                published_at: article.published_at.clone(),
                source_name: article.source_name.clone(),
                saved_at: Utc::now().to_rfc3339(),
            });
            Ok(id)
        }

        async fn update_article(
            &self,
            id: i64,
            title: &str,
            description: Option<&str>,
        ) -> Result<u64, StorageError> {
            let mut tables = self.tables.lock().await;
            tables.check()?;
            match tables.articles.iter_mut().find(|a| a.id == id) {
                Some(article) => {
                    article.title = title.to_string();
                    article.description = description.map(str::to_string);
                    Ok(1)
                }
                None => Ok(0),
            }
        }

        async fn delete_article(&self, id: i64) -> Result<u64, StorageError> {
            let mut tables = self.tables.lock().await;
            tables.check()?;
            let before = tables.articles.len();
            tables.articles.retain(|a| a.id != id);
            Ok((before - tables.articles.len()) as u64)
        }
    }

    /// Gateway that always answers the same way.
    pub struct FixedGateway(Option<Arc<dyn Storage>>);

    impl FixedGateway {
        pub fn available(storage: Arc<dyn Storage>) -> Self {
            Self(Some(storage))
        }

        pub fn unavailable() -> Self {
            Self(None)
        }
    }

    #[async_trait]
    impl Gateway for FixedGateway {
        async fn storage(&self) -> Option<Arc<dyn Storage>> {
            self.0.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn picture(date: &str) -> NewPicture {
        NewPicture {
            title: format!("Picture {}", date),
            date: date.to_string(),
            url: format!("https://example.com/{}.jpg", date),
            explanation: None,
            media_type: "image".to_string(),
        }
    }

    #[tokio::test]
    async fn test_memory_store_lists_newest_first() {
        let store = MemoryStore::new();
        store.insert_picture(&picture("2024-01-01")).await.unwrap();
        store.insert_picture(&picture("2024-01-02")).await.unwrap();

        let pictures = store.list_pictures().await.unwrap();
        assert_eq!(pictures[0].date, "2024-01-02");
        assert_eq!(pictures[1].date, "2024-01-01");
    }

    #[tokio::test]
    async fn test_memory_store_enforces_unique_date() {
        let store = MemoryStore::new();
        store.insert_picture(&picture("2024-01-01")).await.unwrap();

        let result = store.insert_picture(&picture("2024-01-01")).await;
        assert!(matches!(result, Err(StorageError::Duplicate)));
    }

    #[tokio::test]
    async fn test_memory_store_article_urls_unique_by_prefix() {
        let base = format!("https://news.example.com/{}", "a".repeat(300));
        let article = |url: String| NewArticle {
            title: "Long".to_string(),
            author: "Unknown".to_string(),
            description: None,
            url,
            url_to_image: None,
            published_at: None,
            source_name: None,
        };

        let store = MemoryStore::new();
        store.insert_article(&article(format!("{}-one", base))).await.unwrap();

        let result = store.insert_article(&article(format!("{}-two", base))).await;
        assert!(matches!(result, Err(StorageError::Duplicate)));
        assert!(store
            .insert_article(&article("https://news.example.com/short".to_string()))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_memory_store_failure_mode() {
        let store = MemoryStore::new();
        store.set_failing(true).await;

        assert!(matches!(
            store.list_pictures().await,
            Err(StorageError::Backend(_))
        ));
    }

    #[tokio::test]
    async fn test_fixed_gateway() {
        let store: Arc<dyn Storage> = Arc::new(MemoryStore::new());

        assert!(FixedGateway::available(store).storage().await.is_some());
        assert!(FixedGateway::unavailable().storage().await.is_none());
    }
}
