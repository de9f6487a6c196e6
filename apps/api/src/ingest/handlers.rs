use axum::Json;

use crate::errors::AppError;
use crate::ingest::parser::{self, ParsedIdentifiers};

/// POST /api/v1/ingest/preview
/// Body is the raw CSV text. Parses without processing anything.
pub async fn handle_preview(body: String) -> Result<Json<ParsedIdentifiers>, AppError> {
    let parsed = parser::parse(&body)?;
    Ok(Json(parsed))
}
