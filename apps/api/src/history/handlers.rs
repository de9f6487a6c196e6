use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::ingest::export::{self, download_filename, export_records};
use crate::ingest::parser::normalize_identifier;
use crate::models::message::{
    MessageFilter, MessagePage, MessageStats, MessageStatus, MessageType, MessageWithProfile,
    Page, Purpose, MAX_PAGE_LIMIT,
};
use crate::state::AppState;
use crate::store::{MessageStore, ProfileWithMessages, StoreError};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub status: Option<MessageStatus>,
    pub message_type: Option<MessageType>,
    pub purpose: Option<Purpose>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub format: ExportFormat,
    pub status: Option<MessageStatus>,
    pub include_metadata: Option<bool>,
}

/// GET /api/v1/messages
pub async fn handle_list(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> Result<Json<MessagePage>, AppError> {
    let filter = MessageFilter {
        status: params.status,
        message_type: params.message_type,
        purpose: params.purpose,
    };
    let page = state
        .store
        .list(Page::new(params.limit, params.offset), filter)
        .await?;
    Ok(Json(page))
}

/// GET /api/v1/messages/search?q=
pub async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<MessagePage>, AppError> {
    let query = params.q.trim();
    if query.is_empty() {
        return Err(AppError::validation("Search query 'q' must not be empty"));
    }
    let page = state
        .store
        .search(query, Page::new(params.limit, params.offset))
        .await?;
    Ok(Json(page))
}

/// GET /api/v1/messages/stats
pub async fn handle_stats(State(state): State<AppState>) -> Result<Json<MessageStats>, AppError> {
    Ok(Json(state.store.stats().await?))
}

/// GET /api/v1/messages/export?format=json|csv&status=
pub async fn handle_export(
    State(state): State<AppState>,
    Query(params): Query<ExportQuery>,
) -> Result<Response, AppError> {
    let filter = MessageFilter {
        status: params.status,
        ..MessageFilter::default()
    };
    let messages = collect_all(state.store.as_ref(), filter).await?;
    let records = export_records(&messages, params.include_metadata.unwrap_or(true));

    let stem = match params.status {
        Some(status) => format!("outreach-{status}-{}", Utc::now().format("%Y-%m-%d")),
        None => format!("outreach-{}", Utc::now().format("%Y-%m-%d")),
    };
    let (body, content_type, filename) = match params.format {
        ExportFormat::Json => (
            export::to_json(&records)?,
            "application/json",
            format!("{stem}.json"),
        ),
        ExportFormat::Csv => (
            export::to_csv(&records)?,
            "text/csv; charset=utf-8",
            format!("{stem}.csv"),
        ),
    };

    Ok(attachment(body, content_type, &filename))
}

/// GET /api/v1/messages/:id
pub async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageWithProfile>, AppError> {
    let message = state
        .store
        .get_message(id)
        .await?
        .ok_or(StoreError::MessageNotFound(id))?;
    Ok(Json(message))
}

/// GET /api/v1/messages/:id/download
pub async fn handle_download(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let item = state
        .store
        .get_message(id)
        .await?
        .ok_or(StoreError::MessageNotFound(id))?;
    let filename = download_filename(
        &item.profile.profile.name,
        item.message.message_type,
        item.message.purpose,
    );
    Ok(attachment(item.message.body, "text/plain; charset=utf-8", &filename))
}

/// DELETE /api/v1/messages/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.store.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/profiles/:username
pub async fn handle_get_profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<ProfileWithMessages>, AppError> {
    let username = normalize_identifier(&username)?;
    let profile = state
        .store
        .get_profile(&username)
        .await?
        .ok_or(StoreError::ProfileNotFound(username))?;
    Ok(Json(profile))
}

/// Walks every page of the filtered feed.
async fn collect_all(
    store: &dyn MessageStore,
    filter: MessageFilter,
) -> Result<Vec<MessageWithProfile>, StoreError> {
    let mut all = Vec::new();
    loop {
        let page = store
            .list(Page::new(Some(MAX_PAGE_LIMIT), Some(all.len() as i64)), filter)
            .await?;
        let fetched = page.messages.len();
        all.extend(page.messages);
        if fetched == 0 || all.len() as i64 >= page.total {
            return Ok(all);
        }
    }
}

fn attachment(body: String, content_type: &'static str, filename: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response()
}
