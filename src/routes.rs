use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use crate::db::{Database, Feed, FeedKind};
use crate::error::{FeedError, RenderError};
use crate::render::{generate_feed_list, FeedItems, ListOptions};

pub struct AppState {
    pub db: Arc<Database>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/feed/:uuid", get(feed_detail))
        .route("/feed/:uuid/", get(feed_detail))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Template)]
#[template(path = "feed_detail.html")]
pub struct FeedDetailTemplate {
    pub feed: Feed,
    pub channel_title: Option<String>,
    pub last_refreshed: String,
    pub list: String,
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

pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = if let Some(FeedError::NotFound(_)) = self.0.downcast_ref::<FeedError>() {
            StatusCode::NOT_FOUND
        } else if let Some(RenderError::InvalidAmount) = self.0.downcast_ref::<RenderError>() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        (status, format!("Error: {}", self.0)).into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self {
        AppError(err.into())
    }
}

#[derive(Deserialize)]
pub struct DetailQuery {
    pub amount: Option<usize>,
}

pub async fn feed_detail(
    State(state): State<Arc<AppState>>,
    Path(uuid): Path<String>,
    Query(query): Query<DetailQuery>,
) -> Result<impl IntoResponse, AppError> {
    let feed = state
        .db
        .get_feed_by_uuid(&uuid)
        .await?
        .ok_or(FeedError::NotFound(uuid))?;

    let options = ListOptions {
        amount: query.amount,
        ..Default::default()
    };

    let (list, channel_title) = match feed.kind {
        FeedKind::Twitter => {
            let tweets = state.db.get_tweets_for_feed(feed.id).await?;
            (generate_feed_list(FeedItems::Tweets(&tweets), &options)?, None)
        }
        FeedKind::Rss => {
            let items = state.db.get_rss_items_for_feed(feed.id).await?;
            let channel = state.db.get_channel_data(feed.id).await?;
            (
                generate_feed_list(FeedItems::RssItems(&items), &options)?,
                channel.map(|c| c.title).filter(|t| !t.is_empty()),
            )
        }
    };

    let last_refreshed = feed
        .last_refreshed
        .clone()
        .unwrap_or_else(|| "never".to_string());

    Ok(HtmlTemplate(FeedDetailTemplate {
        feed,
        channel_title,
        last_refreshed,
        list,
    }))
}

pub async fn health() -> impl IntoResponse {
    Html("OK")
}
