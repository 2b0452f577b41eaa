use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Config;
use crate::db::{SavedArticle, SavedPicture};
use crate::error::AppError;
use crate::feed::{present, Notice, NoticeLevel};
use crate::fetcher::{ApodClient, NewsClient};
use crate::headlines::{
    Headline, HeadlinesService, SaveArticleForm, SearchQuery, UpdateArticleForm,
};
use crate::pictures::{Apod, PictureService, SavePictureForm, UpdatePictureForm};
use crate::store::Gateway;

const PICTURES_PATH: &str = "/pictures";
const NEWS_PATH: &str = "/news";

pub struct AppState {
    pub pictures: PictureService,
    pub headlines: HeadlinesService,
}

impl AppState {
    pub fn from_config(config: &Config, gateway: Arc<dyn Gateway>) -> anyhow::Result<Self> {
        let apod = ApodClient::from_config(&config.nasa)?;
        let news = NewsClient::new(config.news.clone())?;

        Ok(Self {
            pictures: PictureService::new(apod, gateway.clone()),
            headlines: HeadlinesService::new(news, gateway),
        })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route(PICTURES_PATH, get(pictures))
        .route("/pictures/search", get(search_pictures))
        .route("/pictures/save", post(save_picture))
        .route("/pictures/update/:id", post(update_picture))
        .route("/pictures/delete/:id", post(delete_picture))
        .route(NEWS_PATH, get(news))
        .route("/news/search", get(search_news))
        .route("/news/save", post(save_article))
        .route("/news/update/:id", post(update_article))
        .route("/news/delete/:id", post(delete_article))
        .with_state(state)
}

// Template structs
#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate;

#[derive(Template)]
#[template(path = "pictures.html")]
pub struct PicturesTemplate {
    pub picture: Option<Apod>,
    pub saved: Vec<SavedPicture>,
    pub notices: Vec<Notice>,
    pub storage_available: bool,
}

#[derive(Template)]
#[template(path = "news.html")]
pub struct NewsTemplate {
    pub headlines: Vec<Headline>,
    pub saved: Vec<SavedArticle>,
    pub notices: Vec<Notice>,
    pub storage_available: bool,
}

// Wrapper for HTML responses
struct HtmlTemplate<T>(T);

impl<T: Template> IntoResponse for HtmlTemplate<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to render template: {}", err),
            )
                .into_response(),
        }
    }
}

/// Notice carried across a redirect in the query string.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct NoticeQuery {
    pub notice: Option<String>,
    /// Kept as text so an unknown level never rejects the page request.
    pub level: Option<String>,
}

impl NoticeQuery {
    fn into_notice(self) -> Option<Notice> {
        let message = present(self.notice)?;
        let level = self
            .level
            .as_deref()
            .and_then(NoticeLevel::parse)
            .unwrap_or(NoticeLevel::Success);
        Some(Notice { level, message })
    }
}

fn redirect_with(base: &str, notice: Notice) -> Redirect {
    let query = NoticeQuery {
        notice: Some(notice.message),
        level: Some(notice.level.as_str().to_string()),
    };
    match serde_urlencoded::to_string(&query) {
        Ok(query) => Redirect::to(&format!("{}?{}", base, query)),
        Err(_) => Redirect::to(base),
    }
}

fn outcome<T>(result: Result<T, AppError>, success: &str) -> Notice {
    match result {
        Ok(_) => Notice::success(success),
        Err(e) => Notice::from(&e),
    }
}

// Route handlers
pub async fn index() -> impl IntoResponse {
    HtmlTemplate(IndexTemplate)
}

pub async fn health() -> impl IntoResponse {
    Html("OK")
}

pub async fn pictures(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NoticeQuery>,
) -> impl IntoResponse {
    let page = state.pictures.feed().await;

    let mut notices: Vec<Notice> = query.into_notice().into_iter().collect();
    notices.extend(page.notices());

    HtmlTemplate(PicturesTemplate {
        picture: page.feed,
        saved: page.saved,
        notices,
        storage_available: page.storage_available,
    })
}

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: Option<String>,
}

pub async fn search_pictures(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DateQuery>,
) -> Response {
    let Some(date) = present(query.date) else {
        return redirect_with(
            PICTURES_PATH,
            Notice::warning("Please provide a date to search."),
        )
        .into_response();
    };

    match state.pictures.search_by_date(&date).await {
        Ok(body) => Json(body).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn save_picture(
    State(state): State<Arc<AppState>>,
    Form(form): Form<SavePictureForm>,
) -> Redirect {
    let result = state.pictures.save(form).await;
    redirect_with(PICTURES_PATH, outcome(result, "Picture saved successfully!"))
}

pub async fn update_picture(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Form(form): Form<UpdatePictureForm>,
) -> Redirect {
    let result = state.pictures.update(id, form).await;
    redirect_with(PICTURES_PATH, outcome(result, "Picture updated successfully!"))
}

pub async fn delete_picture(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Redirect {
    let result = state.pictures.delete(id).await;
    redirect_with(PICTURES_PATH, outcome(result, "Picture deleted successfully!"))
}

pub async fn news(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NoticeQuery>,
) -> impl IntoResponse {
    let page = state.headlines.feed().await;

    let mut notices: Vec<Notice> = query.into_notice().into_iter().collect();
    notices.extend(page.notices());

    HtmlTemplate(NewsTemplate {
        headlines: page.feed.unwrap_or_default(),
        saved: page.saved,
        notices,
        storage_available: page.storage_available,
    })
}

pub async fn search_news(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Value>, AppError> {
    let body = state.headlines.search(query).await?;
    Ok(Json(body))
}

pub async fn save_article(
    State(state): State<Arc<AppState>>,
    Form(form): Form<SaveArticleForm>,
) -> Redirect {
    let result = state.headlines.save(form).await;
    redirect_with(NEWS_PATH, outcome(result, "Article saved successfully!"))
}

pub async fn update_article(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Form(form): Form<UpdateArticleForm>,
) -> Redirect {
    let result = state.headlines.update(id, form).await;
    redirect_with(NEWS_PATH, outcome(result, "Article updated successfully!"))
}

pub async fn delete_article(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Redirect {
    let result = state.headlines.delete(id).await;
    redirect_with(NEWS_PATH, outcome(result, "Article deleted successfully!"))
}
