use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use serde::Deserialize;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::{Stream, StreamExt};
use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::message::Message;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ReviewRequest {
    pub reviewer: Option<String>,
}

fn reviewer(body: &Option<Json<ReviewRequest>>) -> Option<&str> {
    body.as_ref()
        .and_then(|Json(req)| req.reviewer.as_deref())
        .map(str::trim)
        .filter(|r| !r.is_empty())
}

/// POST /api/v1/messages/:id/approve
pub async fn handle_approve(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<ReviewRequest>>,
) -> Result<Json<Message>, AppError> {
    let message = state.review.approve(id, reviewer(&body)).await?;
    Ok(Json(message))
}

/// POST /api/v1/messages/:id/reject
pub async fn handle_reject(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<ReviewRequest>>,
) -> Result<Json<Message>, AppError> {
    let message = state.review.reject(id, reviewer(&body)).await?;
    Ok(Json(message))
}

/// GET /api/v1/messages/events
/// Server-sent `review` events, one per approve/reject.
pub async fn handle_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.review.subscribe()).filter_map(|event| match event {
        Ok(event) => match Event::default().event("review").json_data(&event) {
            Ok(sse) => Some(Ok(sse)),
            Err(err) => {
                warn!("Could not encode review event: {err}");
                None
            }
        },
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            warn!("Review event subscriber lagged, {skipped} events skipped");
            None
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
