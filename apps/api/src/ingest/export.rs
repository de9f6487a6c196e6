// Flat export of generated messages (JSON / CSV), the per-message text
// download name, and the sample upload template.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::message::{MessageStatus, MessageType, MessageWithProfile, Purpose};

/// Served by `GET /api/v1/batches/template`.
pub const SAMPLE_TEMPLATE: &str = "LinkedIn Profile\n\
https://www.linkedin.com/in/john-doe\n\
linkedin.com/in/jane-smith\n\
alex-chen\n";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("No data to export")]
    NoData,

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One exported message with its profile fields flattened alongside.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportRecord {
    pub name: String,
    pub username: String,
    pub linkedin_url: String,
    pub title: String,
    pub company: String,
    pub message_type: MessageType,
    pub purpose: Purpose,
    pub status: MessageStatus,
    pub message_content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

impl ExportRecord {
    pub fn from_message(item: &MessageWithProfile, include_metadata: bool) -> Self {
        let profile = &item.profile.profile;
        let message = &item.message;
        ExportRecord {
            name: profile.name.clone(),
            username: profile.username.clone(),
            linkedin_url: profile.linkedin_url.clone(),
            title: profile.title.clone().unwrap_or_default(),
            company: profile.company.clone().unwrap_or_default(),
            message_type: message.message_type,
            purpose: message.purpose,
            status: message.status,
            message_content: message.body.clone(),
            id: include_metadata.then_some(message.id),
            generated_at: include_metadata.then_some(message.created_at),
            bio: include_metadata.then(|| profile.bio.clone().unwrap_or_default()),
        }
    }

    /// Column/value pairs in export order. Absent metadata produces no column.
    fn fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("name", self.name.clone()),
            ("username", self.username.clone()),
            ("linkedin_url", self.linkedin_url.clone()),
            ("title", self.title.clone()),
            ("company", self.company.clone()),
            ("message_type", self.message_type.to_string()),
            ("purpose", self.purpose.to_string()),
            ("status", self.status.to_string()),
            ("message_content", self.message_content.clone()),
        ];
        if let Some(id) = self.id {
            fields.push(("id", id.to_string()));
        }
        if let Some(at) = self.generated_at {
            fields.push(("generated_at", at.to_rfc3339()));
        }
        if let Some(bio) = &self.bio {
            fields.push(("bio", bio.clone()));
        }
        fields
    }
}

pub fn export_records(messages: &[MessageWithProfile], include_metadata: bool) -> Vec<ExportRecord> {
    messages
        .iter()
        .map(|m| ExportRecord::from_message(m, include_metadata))
        .collect()
}

pub fn to_json(records: &[ExportRecord]) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(records)?)
}

/// Header is the union of record keys in first-seen order; a record missing a
/// column gets an empty cell.
pub fn to_csv(records: &[ExportRecord]) -> Result<String, ExportError> {
    if records.is_empty() {
        return Err(ExportError::NoData);
    }

    let rows: Vec<Vec<(&'static str, String)>> = records.iter().map(ExportRecord::fields).collect();
    let mut columns: Vec<&'static str> = Vec::new();
    for (key, _) in rows.iter().flatten() {
        if !columns.contains(key) {
            columns.push(key);
        }
    }

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(columns.join(","));
    for row in &rows {
        let cells: Vec<String> = columns
            .iter()
            .map(|column| {
                row.iter()
                    .find(|(key, _)| key == column)
                    .map(|(_, value)| csv_cell(value))
                    .unwrap_or_default()
            })
            .collect();
        lines.push(cells.join(","));
    }
    Ok(lines.join("\n"))
}

fn csv_cell(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// `John Doe`, email, partnership -> `John-Doe-email-partnership.txt`
///
/// The name ends up inside a quoted `Content-Disposition` value, so only ASCII
/// letters, digits, `-`, `_` and `.` survive.
pub fn download_filename(name: &str, message_type: MessageType, purpose: Purpose) -> String {
    let stem = name
        .split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
                .collect::<String>()
        })
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    let stem = if stem.is_empty() { "message" } else { stem.as_str() };
    format!("{stem}-{message_type}-{purpose}.txt")
}
