use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use sqlx::{sqlite::SqlitePoolOptions, FromRow, SqlitePool};
use tracing::warn;

use crate::error::StorageError;
use crate::feed::web_link;
use crate::store::{Gateway, Storage};

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SavedPicture {
    pub id: i64,
    pub title: String,
    pub date: String,
    pub url: String,
    pub explanation: Option<String>,
    pub media_type: String,
    pub saved_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPicture {
    pub title: String,
    pub date: String,
    pub url: String,
    pub explanation: Option<String>,
    pub media_type: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SavedArticle {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub url: String,
    pub url_to_image: Option<String>,
    pub published_at: Option<String>,
    pub source_name: Option<String>,
    pub saved_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewArticle {
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub url: String,
    pub url_to_image: Option<String>,
    pub published_at: Option<String>,
    pub source_name: Option<String>,
}

impl SavedPicture {
    pub fn link(&self) -> &str {
        web_link(&self.url)
    }

    pub fn explanation_text(&self) -> &str {
        self.explanation.as_deref().unwrap_or("")
    }
}

impl SavedArticle {
    pub fn link(&self) -> &str {
        web_link(&self.url)
    }

    pub fn description_text(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }

    pub fn source_text(&self) -> &str {
        self.source_name.as_deref().unwrap_or("")
    }

    pub fn published_text(&self) -> &str {
        self.published_at.as_deref().unwrap_or("")
    }
}

// Fixed-width timestamps so saved_at sorts correctly as text
fn saved_at_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Builds the pool without opening a connection. Fails only when the
    /// URL itself cannot be parsed.
    pub fn new_lazy(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_lazy(database_url)?;

        Ok(Self { pool })
    }

    /// Creates both tables and their uniqueness constraints. Safe to rerun.
    pub async fn initialize(&self) -> anyhow::Result<()> {
        self.create_pictures_table().await?;
        self.create_articles_table().await?;
        Ok(())
    }

    pub async fn create_pictures_table(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pictures (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                date TEXT NOT NULL UNIQUE,
                url TEXT NOT NULL,
                explanation TEXT,
                media_type TEXT NOT NULL DEFAULT 'image',
                saved_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn create_articles_table(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS articles (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                author TEXT NOT NULL DEFAULT 'Unknown',
                description TEXT,
                url TEXT NOT NULL,
                url_to_image TEXT,
                published_at TEXT,
                source_name TEXT,
                saved_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Long URLs only need to be unique over their first 255 characters
        sqlx::query(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_articles_url_prefix
            ON articles(substr(url, 1, 255))
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Storage for Database {
    async fn list_pictures(&self) -> Result<Vec<SavedPicture>, StorageError> {
        let pictures = sqlx::query_as::<_, SavedPicture>(
            "SELECT * FROM pictures ORDER BY saved_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(pictures)
    }

    async fn find_picture_by_date(&self, date: &str) -> Result<Option<i64>, StorageError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM pictures WHERE date = ?")
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.0))
    }

    async fn insert_picture(&self, picture: &NewPicture) -> Result<i64, StorageError> {
        let now = saved_at_now();
        let result = sqlx::query(
            r#"
            INSERT INTO pictures (title, date, url, explanation, media_type, saved_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&picture.title)
        .bind(&picture.date)
        .bind(&picture.url)
        .bind(&picture.explanation)
        .bind(&picture.media_type)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn update_picture(
        &self,
        id: i64,
        title: &str,
        explanation: Option<&str>,
    ) -> Result<u64, StorageError> {
        let result = sqlx::query("UPDATE pictures SET title = ?, explanation = ? WHERE id = ?")
            .bind(title)
            .bind(explanation)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_picture(&self, id: i64) -> Result<u64, StorageError> {
        let result = sqlx::query("DELETE FROM pictures WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn list_articles(&self) -> Result<Vec<SavedArticle>, StorageError> {
        let articles = sqlx::query_as::<_, SavedArticle>(
            "SELECT * FROM articles ORDER BY saved_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(articles)
    }

    async fn find_article_by_url(&self, url: &str) -> Result<Option<i64>, StorageError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM articles WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.0))
    }

    async fn insert_article(&self, article: &NewArticle) -> Result<i64, StorageError> {
        let now = saved_at_now();
        let result = sqlx::query(
            r#"
            INSERT INTO articles
                (title, author, description, url, url_to_image, published_at, source_name, saved_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&article.title)
        .bind(&article.author)
        .bind(&article.description)
        .bind(&article.url)
        .bind(&article.url_to_image)
        .bind(&article.published_at)
        .bind(&article.source_name)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn update_article(
        &self,
        id: i64,
        title: &str,
        description: Option<&str>,
    ) -> Result<u64, StorageError> {
        let result = sqlx::query("UPDATE articles SET title = ?, description = ? WHERE id = ?")
            .bind(title)
            .bind(description)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_article(&self, id: i64) -> Result<u64, StorageError> {
        let result = sqlx::query("DELETE FROM articles WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// Hands out a [`Database`] when one is configured and reachable.
pub struct SqliteGateway {
    database: Option<Database>,
}

impl SqliteGateway {
    pub fn new(database_url: Option<&str>) -> Self {
        let database = match database_url {
            Some(url) => match Database::new_lazy(url) {
                Ok(db) => Some(db),
                Err(e) => {
                    warn!("Invalid database URL, persistence disabled: {}", e);
                    None
                }
            },
            None => {
                warn!("No database URL configured, persistence disabled");
                None
            }
        };

        Self { database }
    }

    pub fn from_database(database: Database) -> Self {
        Self {
            database: Some(database),
        }
    }
}

#[async_trait]
impl Gateway for SqliteGateway {
    async fn storage(&self) -> Option<Arc<dyn Storage>> {
        let db = self.database.as_ref()?;
        match db.ping().await {
            Ok(()) => Some(Arc::new(db.clone())),
            Err(e) => {
                warn!("Database unavailable: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn create_test_db() -> Database {
        let db = Database::new("sqlite::memory:").await.unwrap();
        db.initialize().await.unwrap();
        db
    }

    fn new_picture(date: &str, title: &str) -> NewPicture {
        NewPicture {
            title: title.to_string(),
            date: date.to_string(),
            url: format!("https://apod.nasa.gov/apod/image/{}.jpg", date),
            explanation: Some("A galaxy far away".to_string()),
            media_type: "image".to_string(),
        }
    }

    fn new_article(url: &str, title: &str) -> NewArticle {
        NewArticle {
            title: title.to_string(),
            author: "Unknown".to_string(),
            description: None,
            url: url.to_string(),
            url_to_image: None,
            published_at: Some("2024-12-09T12:00:00Z".to_string()),
            source_name: Some("Example Times".to_string()),
        }
    }

    mod initialization_tests {
        use super::*;

        #[tokio::test]
        async fn test_database_initialization() {
            let db = create_test_db().await;
            assert!(db.list_pictures().await.unwrap().is_empty());
            assert!(db.list_articles().await.unwrap().is_empty());
        }

        #[tokio::test]
        async fn test_double_initialization_is_safe() {
            let db = create_test_db().await;
            // Initialize again - should not fail due to IF NOT EXISTS
            let result = db.initialize().await;
            assert!(result.is_ok());
        }

        #[tokio::test]
        async fn test_tables_provision_independently() {
            let db = Database::new("sqlite::memory:").await.unwrap();
            db.create_pictures_table().await.unwrap();

            assert!(db.list_pictures().await.unwrap().is_empty());
            assert!(db.list_articles().await.is_err());

            db.create_articles_table().await.unwrap();
            assert!(db.list_articles().await.unwrap().is_empty());
        }

        #[tokio::test]
        async fn test_ping() {
            let db = create_test_db().await;
            assert!(db.ping().await.is_ok());
        }
    }

    mod picture_tests {
        use super::*;

        #[tokio::test]
        async fn test_insert_and_list_picture() {
            let db = create_test_db().await;

            let id = db
                .insert_picture(&new_picture("2024-12-09", "Orion"))
                .await
                .unwrap();
            assert!(id > 0);

            let pictures = db.list_pictures().await.unwrap();
            assert_eq!(pictures.len(), 1);
            assert_eq!(pictures[0].id, id);
            assert_eq!(pictures[0].title, "Orion");
            assert_eq!(pictures[0].media_type, "image");
            assert!(!pictures[0].saved_at.is_empty());
        }

        #[tokio::test]
        async fn test_duplicate_date_is_rejected_by_constraint() {
            let db = create_test_db().await;
            db.insert_picture(&new_picture("2024-12-09", "First"))
                .await
                .unwrap();

            let result = db.insert_picture(&new_picture("2024-12-09", "Second")).await;

            assert!(matches!(result, Err(StorageError::Duplicate)));
            assert_eq!(db.list_pictures().await.unwrap().len(), 1);
        }

        #[tokio::test]
        async fn test_find_picture_by_date() {
            let db = create_test_db().await;
            let id = db
                .insert_picture(&new_picture("2024-12-09", "Orion"))
                .await
                .unwrap();

            assert_eq!(db.find_picture_by_date("2024-12-09").await.unwrap(), Some(id));
            assert_eq!(db.find_picture_by_date("2024-12-10").await.unwrap(), None);
        }

        #[tokio::test]
        async fn test_list_newest_saved_first() {
            let db = create_test_db().await;
            for day in 1..=3 {
                db.insert_picture(&new_picture(&format!("2024-12-0{}", day), &format!("Day {}", day)))
                    .await
                    .unwrap();
            }

            let pictures = db.list_pictures().await.unwrap();
            assert_eq!(pictures[0].title, "Day 3");
            assert_eq!(pictures[2].title, "Day 1");
        }

        #[tokio::test]
        async fn test_update_picture() {
            let db = create_test_db().await;
            let id = db
                .insert_picture(&new_picture("2024-12-09", "Orion"))
                .await
                .unwrap();

            let affected = db.update_picture(id, "Orion Nebula", None).await.unwrap();

            assert_eq!(affected, 1);
            let pictures = db.list_pictures().await.unwrap();
            assert_eq!(pictures[0].title, "Orion Nebula");
            assert!(pictures[0].explanation.is_none());
            assert_eq!(pictures[0].date, "2024-12-09");
        }

        #[tokio::test]
        async fn test_update_missing_picture_touches_nothing() {
            let db = create_test_db().await;
            db.insert_picture(&new_picture("2024-12-09", "Orion"))
                .await
                .unwrap();

            let affected = db.update_picture(999, "Other", Some("x")).await.unwrap();

            assert_eq!(affected, 0);
            assert_eq!(db.list_pictures().await.unwrap()[0].title, "Orion");
        }

        #[tokio::test]
        async fn test_delete_picture() {
            let db = create_test_db().await;
            let id = db
                .insert_picture(&new_picture("2024-12-09", "Orion"))
                .await
                .unwrap();
            db.insert_picture(&new_picture("2024-12-10", "Andromeda"))
                .await
                .unwrap();

            assert_eq!(db.delete_picture(id).await.unwrap(), 1);
            assert_eq!(db.delete_picture(id).await.unwrap(), 0);

            let pictures = db.list_pictures().await.unwrap();
            assert_eq!(pictures.len(), 1);
            assert_eq!(pictures[0].title, "Andromeda");
        }
    }

    mod article_tests {
        use super::*;

        #[tokio::test]
        async fn test_insert_and_list_article() {
            let db = create_test_db().await;

            db.insert_article(&new_article("https://news.example.com/a", "Headline"))
                .await
                .unwrap();

            let articles = db.list_articles().await.unwrap();
            assert_eq!(articles.len(), 1);
            assert_eq!(articles[0].author, "Unknown");
            assert_eq!(articles[0].source_name.as_deref(), Some("Example Times"));
        }

        #[tokio::test]
        async fn test_duplicate_url_is_rejected_by_constraint() {
            let db = create_test_db().await;
            db.insert_article(&new_article("https://news.example.com/a", "One"))
                .await
                .unwrap();

            let result = db
                .insert_article(&new_article("https://news.example.com/a", "Two"))
                .await;

            assert!(matches!(result, Err(StorageError::Duplicate)));
        }

        #[tokio::test]
        async fn test_url_uniqueness_covers_prefix() {
            let db = create_test_db().await;
            let base = format!("https://news.example.com/{}", "x".repeat(260));

            db.insert_article(&new_article(&format!("{}/one", base), "One"))
                .await
                .unwrap();
            let result = db
                .insert_article(&new_article(&format!("{}/two", base), "Two"))
                .await;

            assert!(matches!(result, Err(StorageError::Duplicate)));
        }

        #[tokio::test]
        async fn test_find_article_by_url() {
            let db = create_test_db().await;
            let id = db
                .insert_article(&new_article("https://news.example.com/a", "Headline"))
                .await
                .unwrap();

            assert_eq!(
                db.find_article_by_url("https://news.example.com/a").await.unwrap(),
                Some(id)
            );
            assert_eq!(
                db.find_article_by_url("https://news.example.com/b").await.unwrap(),
                None
            );
        }

        #[tokio::test]
        async fn test_update_and_delete_article() {
            let db = create_test_db().await;
            let id = db
                .insert_article(&new_article("https://news.example.com/a", "Headline"))
                .await
                .unwrap();

            db.update_article(id, "Edited", Some("Now with a description"))
                .await
                .unwrap();
            let articles = db.list_articles().await.unwrap();
            assert_eq!(articles[0].title, "Edited");
            assert_eq!(
                articles[0].description.as_deref(),
                Some("Now with a description")
            );

            assert_eq!(db.delete_article(id).await.unwrap(), 1);
            assert!(db.list_articles().await.unwrap().is_empty());
        }
    }

    mod gateway_tests {
        use super::*;

        #[tokio::test]
        async fn test_gateway_without_url_is_unavailable() {
            let gateway = SqliteGateway::new(None);
            assert!(gateway.storage().await.is_none());
        }

        #[tokio::test]
        async fn test_gateway_with_invalid_url_is_unavailable() {
            let gateway = SqliteGateway::new(Some("not-a-database-url"));
            assert!(gateway.storage().await.is_none());
        }

        #[tokio::test]
        async fn test_gateway_with_unreachable_file_is_unavailable() {
            let gateway = SqliteGateway::new(Some("sqlite:/nonexistent/dir/cosmos.db"));
            assert!(gateway.storage().await.is_none());
        }

        #[tokio::test]
        async fn test_gateway_hands_out_storage() {
            let db = create_test_db().await;
            db.insert_picture(&new_picture("2024-12-09", "Orion"))
                .await
                .unwrap();
            let gateway = SqliteGateway::from_database(db);

            let storage = gateway.storage().await.expect("storage available");
            assert_eq!(storage.list_pictures().await.unwrap().len(), 1);
        }
    }
}
