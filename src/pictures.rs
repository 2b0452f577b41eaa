//! Astronomy picture of the day: live feed plus the saved `pictures` collection.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::db::{NewPicture, SavedPicture};
use crate::error::{AppError, StorageError};
use crate::feed::{present, web_link, FeedPage, Notice};
use crate::fetcher::ApodClient;
use crate::store::{Gateway, Storage};

pub const DEFAULT_MEDIA_TYPE: &str = "image";

/// The subset of the APOD payload the page renders.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Apod {
    pub title: String,
    pub date: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default = "default_media_type")]
    pub media_type: String,
    #[serde(default)]
    pub hdurl: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub copyright: Option<String>,
}

fn default_media_type() -> String {
    DEFAULT_MEDIA_TYPE.to_string()
}

impl Apod {
    pub fn link(&self) -> &str {
        web_link(&self.url)
    }

    pub fn is_video(&self) -> bool {
        self.media_type == "video"
    }

    pub fn explanation_text(&self) -> &str {
        self.explanation.as_deref().unwrap_or("")
    }

    /// Image to show inline; videos fall back to their thumbnail.
    pub fn preview_url(&self) -> &str {
        match (&self.thumbnail_url, self.is_video()) {
            (Some(thumb), true) => thumb,
            _ => &self.url,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SavePictureForm {
    pub title: Option<String>,
    pub date: Option<String>,
    pub url: Option<String>,
    pub explanation: Option<String>,
    pub media_type: Option<String>,
}

impl SavePictureForm {
    pub fn validate(self) -> Result<NewPicture, AppError> {
        match (present(self.title), present(self.date), present(self.url)) {
            (Some(title), Some(date), Some(url)) => Ok(NewPicture {
                title,
                date,
                url,
                explanation: present(self.explanation),
                media_type: present(self.media_type).unwrap_or_else(default_media_type),
            }),
            _ => Err(AppError::Validation(
                "Missing required fields. Cannot save picture.".to_string(),
            )),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdatePictureForm {
    pub title: Option<String>,
    pub explanation: Option<String>,
}

pub type PicturePage = FeedPage<Apod, SavedPicture>;

pub struct PictureService {
    client: ApodClient,
    gateway: Arc<dyn Gateway>,
}

impl PictureService {
    pub fn new(client: ApodClient, gateway: Arc<dyn Gateway>) -> Self {
        Self { client, gateway }
    }

    async fn storage(&self, action: &str) -> Result<Arc<dyn Storage>, AppError> {
        self.gateway.storage().await.ok_or_else(|| {
            AppError::StorageUnavailable(format!(
                "Database connection failed. Cannot {} picture.",
                action
            ))
        })
    }

    /// Today's picture next to the saved collection. Never fails: each half
    /// degrades to a notice on its own.
    pub async fn feed(&self) -> PicturePage {
        let (feed, feed_notice) = match self.client.fetch(None).await {
            Ok(body) => match serde_json::from_value::<Apod>(body) {
                Ok(apod) => (Some(apod), None),
                Err(e) => {
                    warn!("Unexpected APOD payload: {}", e);
                    (
                        None,
                        Some(Notice::error(format!("Error processing NASA data: {}", e))),
                    )
                }
            },
            Err(e) => (None, Some(Notice::from(&e))),
        };

        let (saved, storage_notice, storage_available) = match self.gateway.storage().await {
            Some(storage) => match storage.list_pictures().await {
                Ok(saved) => (saved, None, true),
                Err(e) => {
                    error!("Failed to list saved pictures: {}", e);
                    (Vec::new(), Some(Notice::error(format!("Database error: {}", e))), true)
                }
            },
            None => (
                Vec::new(),
                Some(Notice::error(
                    "Database connection failed. Saved pictures unavailable.",
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

    /// Raw upstream payload for a given date.
    pub async fn search_by_date(&self, date: &str) -> Result<Value, AppError> {
        self.client.fetch(Some(date)).await
    }

    pub async fn save(&self, form: SavePictureForm) -> Result<i64, AppError> {
        let storage = self.storage("save").await?;
        let picture = form.validate()?;

        let already_saved = || AppError::Conflict("This picture is already saved!".to_string());

        if storage
            .find_picture_by_date(&picture.date)
            .await
            .map_err(|e| storage_failure("saving", e))?
            .is_some()
        {
            return Err(already_saved());
        }

        match storage.insert_picture(&picture).await {
            Ok(id) => {
                info!("Saved picture {} for {}", id, picture.date);
                Ok(id)
            }
            // Lost a race with a concurrent save of the same date
            Err(StorageError::Duplicate) => Err(already_saved()),
            Err(e) => Err(storage_failure("saving", e)),
        }
    }

    pub async fn update(&self, id: i64, form: UpdatePictureForm) -> Result<(), AppError> {
        let storage = self.storage("update").await?;
        let title = present(form.title)
            .ok_or_else(|| AppError::Validation("Title is required.".to_string()))?;
        let explanation = present(form.explanation);

        let affected = storage
            .update_picture(id, &title, explanation.as_deref())
            .await
            .map_err(|e| storage_failure("updating", e))?;
        if affected == 0 {
            info!("Update of picture {} matched no rows", id);
        }
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        let storage = self.storage("delete").await?;

        storage
            .delete_picture(id)
            .await
            .map_err(|e| storage_failure("deleting", e))?;
        Ok(())
    }
}

fn storage_failure(action: &str, err: StorageError) -> AppError {
    error!("Error {} picture: {}", action, err);
    AppError::StorageOperation(format!("Error {} picture: {}", action, err))
}
