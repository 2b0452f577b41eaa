//! Shapes shared by the picture and headline modules.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

impl NoticeLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoticeLevel::Success => "success",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        }
    }

    pub fn parse(level: &str) -> Option<Self> {
        match level.trim() {
            "success" => Some(NoticeLevel::Success),
            "warning" => Some(NoticeLevel::Warning),
            "error" => Some(NoticeLevel::Error),
            _ => None,
        }
    }
}

/// A one-shot message rendered on the next page view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

impl From<&AppError> for Notice {
    fn from(err: &AppError) -> Self {
        Self {
            level: err.notice_level(),
            message: err.to_string(),
        }
    }
}

/// Result of a GetFeed call: live upstream data next to the saved collection.
///
/// `feed` is `None` whenever the upstream call failed; `feed_notice` then
/// says why. The saved list is loaded independently of the feed and is empty
/// when storage is unavailable or the listing failed.
#[derive(Debug, Clone)]
pub struct FeedPage<F, S> {
    pub feed: Option<F>,
    pub saved: Vec<S>,
    pub feed_notice: Option<Notice>,
    pub storage_notice: Option<Notice>,
    pub storage_available: bool,
}

impl<F, S> FeedPage<F, S> {
    pub fn notices(&self) -> Vec<Notice> {
        self.feed_notice
            .iter()
            .chain(self.storage_notice.iter())
            .cloned()
            .collect()
    }
}

/// Trims a form value and drops it when nothing is left.
pub fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// The url itself when it is an http(s) link, `#` otherwise.
pub fn web_link(url: &str) -> &str {
    let lower = url.trim_start().to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        url
    } else {
        "#"
    }
}
