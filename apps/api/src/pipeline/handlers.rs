use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::errors::AppError;
use crate::ingest::export::SAMPLE_TEMPLATE;
use crate::ingest::parser::{self, ParsedIdentifiers, RowError};
use crate::models::message::{Message, MessageType, Purpose};
use crate::pipeline::{BatchJob, BatchOutcome, CancelFlag};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SingleRequest {
    pub identifier: String,
    /// Replaces the resolved display name.
    pub name: Option<String>,
    pub message_type: Option<MessageType>,
    pub purpose: Option<Purpose>,
}

/// Either raw CSV text or an explicit identifier list.
#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub csv: Option<String>,
    #[serde(default)]
    pub identifiers: Vec<String>,
    pub message_type: Option<MessageType>,
    pub purpose: Option<Purpose>,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    #[serde(flatten)]
    pub outcome: BatchOutcome,
    /// Input rows dropped before processing.
    pub rejected: Vec<RowError>,
    pub duplicates: usize,
}

#[derive(Debug, Serialize)]
pub struct BatchStarted {
    pub job: BatchJob,
    pub rejected: Vec<RowError>,
    pub duplicates: usize,
}

/// POST /api/v1/outreach/single
pub async fn handle_single(
    State(state): State<AppState>,
    Json(req): Json<SingleRequest>,
) -> Result<(StatusCode, Json<Message>), AppError> {
    let processor = state.processor.configured(req.message_type, req.purpose);
    let message = processor
        .process_single(&req.identifier, req.name.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// POST /api/v1/outreach/batch
/// Runs the whole batch within the request and returns the outcome.
pub async fn handle_batch(
    State(state): State<AppState>,
    Json(req): Json<BatchRequest>,
) -> Result<Json<BatchResponse>, AppError> {
    let parsed = match req.csv.as_deref() {
        Some(csv) => parser::parse(csv)?,
        None => parser::parse_list(&req.identifiers)?,
    };
    let ParsedIdentifiers {
        identifiers,
        errors,
        duplicates,
    } = parsed;

    let processor = state.processor.configured(req.message_type, req.purpose);
    let outcome = processor
        .process_batch(
            &identifiers,
            &mut |current: usize, total: usize| debug!("Inline batch item {current}/{total}"),
            &CancelFlag::new(),
        )
        .await?;

    Ok(Json(BatchResponse {
        outcome,
        rejected: errors,
        duplicates,
    }))
}

/// POST /api/v1/batches
/// Multipart upload: `file` (CSV), optional `message_type` and `purpose` fields.
pub async fn handle_start_batch(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<BatchStarted>), AppError> {
    let mut csv = None;
    let mut message_type = None;
    let mut purpose = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" | "csv" => csv = Some(field.text().await?),
            "message_type" => message_type = Some(field.text().await?.parse::<MessageType>()?),
            "purpose" => purpose = Some(field.text().await?.parse::<Purpose>()?),
            other => debug!("Ignoring upload field '{other}'"),
        }
    }

    let csv = csv.ok_or_else(|| AppError::validation("Missing 'file' field with the CSV upload"))?;
    let parsed = parser::parse(&csv)?;

    let processor = state.processor.configured(message_type, purpose);
    let job = state.batches.start(processor, parsed.identifiers).await;

    Ok((
        StatusCode::ACCEPTED,
        Json(BatchStarted {
            job,
            rejected: parsed.errors,
            duplicates: parsed.duplicates,
        }),
    ))
}

/// GET /api/v1/batches/:id
pub async fn handle_get_batch(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BatchJob>, AppError> {
    state
        .batches
        .snapshot(id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Batch {id} not found")))
}

/// POST /api/v1/batches/:id/cancel
pub async fn handle_cancel_batch(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<BatchJob>), AppError> {
    let job = state
        .batches
        .cancel(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Batch {id} not found")))?;
    Ok((StatusCode::ACCEPTED, Json(job)))
}

/// GET /api/v1/batches/template
pub async fn handle_template() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"outreach-template.csv\"",
            ),
        ],
        SAMPLE_TEMPLATE,
    )
}
