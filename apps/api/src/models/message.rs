use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

use crate::models::profile::{ContentItem, PartnershipBenefit, Profile, ProfileRecord};

#[derive(Debug, Error)]
#[error("invalid {kind} '{value}'")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

/// Declares a closed, lowercase-serialized enum with `as_str`, `Display` and `FromStr`.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(ParseEnumError { kind: $kind, value: s.to_string() }),
                }
            }
        }
    };
}

text_enum!(
    /// Delivery channel of an outreach message.
    MessageType, "message type", { Email => "email", Linkedin => "linkedin" }
);

text_enum!(
    /// Intent of an outreach message.
    Purpose, "purpose", { Partnership => "partnership", Product => "product" }
);

text_enum!(
    /// Review status. `Pending` is the only initial state; the others are terminal.
    MessageStatus, "status", { Pending => "pending", Approved => "approved", Rejected => "rejected" }
);

/// A generated outreach message. Mutated only through review transitions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub body: String,
    pub message_type: MessageType,
    pub purpose: Purpose,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<String>,
}

/// A message together with the profile it was written for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageWithProfile {
    #[serde(flatten)]
    pub message: Message,
    pub profile: ProfileRecord,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, FromRow)]
pub struct MessageStats {
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageFilter {
    pub status: Option<MessageStatus>,
    pub message_type: Option<MessageType>,
    pub purpose: Option<Purpose>,
}

impl MessageFilter {
    pub fn matches(&self, message: &Message) -> bool {
        self.status.map_or(true, |s| s == message.status)
            && self.message_type.map_or(true, |t| t == message.message_type)
            && self.purpose.map_or(true, |p| p == message.purpose)
    }
}

pub const DEFAULT_PAGE_LIMIT: i64 = 20;
pub const MAX_PAGE_LIMIT: i64 = 100;

/// Offset pagination window. Construct through [`Page::new`] to get clamped values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        Page {
            limit: limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT),
            offset: offset.unwrap_or(0).max(0),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Page::new(None, None)
    }
}

/// One page of a message feed plus the number of rows matching overall.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePage {
    pub messages: Vec<MessageWithProfile>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct MessageRow {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub body: String,
    pub message_type: String,
    pub purpose: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<String>,
}

impl TryFrom<MessageRow> for Message {
    type Error = ParseEnumError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        Ok(Message {
            id: row.id,
            profile_id: row.profile_id,
            body: row.body,
            message_type: row.message_type.parse()?,
            purpose: row.purpose.parse()?,
            status: row.status.parse()?,
            created_at: row.created_at,
            approved_at: row.approved_at,
            rejected_at: row.rejected_at,
            reviewed_by: row.reviewed_by,
        })
    }
}

/// Flat row for `messages JOIN profiles`; profile columns carry a `p_` prefix.
#[derive(Debug, Clone, FromRow)]
pub struct MessageProfileRow {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub body: String,
    pub message_type: String,
    pub purpose: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<String>,
    pub p_name: String,
    pub p_username: String,
    pub p_linkedin_url: String,
    pub p_title: Option<String>,
    pub p_company: Option<String>,
    pub p_bio: Option<String>,
    pub p_location: Option<String>,
    pub p_experience: Option<String>,
    pub p_skills: Vec<String>,
    pub p_content_items: Json<Vec<ContentItem>>,
    pub p_partnership_benefits: Json<Vec<PartnershipBenefit>>,
    pub p_created_at: DateTime<Utc>,
    pub p_updated_at: DateTime<Utc>,
}

impl TryFrom<MessageProfileRow> for MessageWithProfile {
    type Error = ParseEnumError;

    fn try_from(row: MessageProfileRow) -> Result<Self, Self::Error> {
        let profile = ProfileRecord {
            id: row.profile_id,
            profile: Profile {
                name: row.p_name,
                username: row.p_username,
                linkedin_url: row.p_linkedin_url,
                title: row.p_title,
                company: row.p_company,
                bio: row.p_bio,
                location: row.p_location,
                experience: row.p_experience,
                skills: row.p_skills,
                content_items: row.p_content_items.0,
                partnership_benefits: row.p_partnership_benefits.0,
            },
            created_at: row.p_created_at,
            updated_at: row.p_updated_at,
        };
        let message = Message {
            id: row.id,
            profile_id: row.profile_id,
            body: row.body,
            message_type: row.message_type.parse()?,
            purpose: row.purpose.parse()?,
            status: row.status.parse()?,
            created_at: row.created_at,
            approved_at: row.approved_at,
            rejected_at: row.rejected_at,
            reviewed_by: row.reviewed_by,
        };
        Ok(MessageWithProfile { message, profile })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enums_parse_case_insensitively() {
        assert_eq!("EMAIL".parse::<MessageType>().unwrap(), MessageType::Email);
        assert_eq!("LinkedIn".parse::<MessageType>().unwrap(), MessageType::Linkedin);
        assert_eq!("product".parse::<Purpose>().unwrap(), Purpose::Product);
        assert_eq!("Approved".parse::<MessageStatus>().unwrap(), MessageStatus::Approved);
        assert!("archived".parse::<MessageStatus>().is_err());
    }

    #[test]
    fn test_enums_serialize_lowercase() {
        assert_eq!(
            serde_json::to_value(MessageType::Linkedin).unwrap(),
            serde_json::json!("linkedin")
        );
        assert_eq!(
            serde_json::to_value(MessageStatus::Pending).unwrap(),
            serde_json::json!("pending")
        );
    }

    #[test]
    fn test_page_is_clamped() {
        let page = Page::new(Some(1000), Some(-5));
        assert_eq!(page.limit, MAX_PAGE_LIMIT);
        assert_eq!(page.offset, 0);
        assert_eq!(Page::new(Some(0), None).limit, 1);
        assert_eq!(Page::default().limit, DEFAULT_PAGE_LIMIT);
    }

    #[test]
    fn test_filter_matches_all_set_fields() {
        let message = Message {
            id: Uuid::new_v4(),
            profile_id: Uuid::new_v4(),
            body: "Hi".to_string(),
            message_type: MessageType::Email,
            purpose: Purpose::Product,
            status: MessageStatus::Pending,
            created_at: Utc::now(),
            approved_at: None,
            rejected_at: None,
            reviewed_by: None,
        };
        assert!(MessageFilter::default().matches(&message));
        let filter = MessageFilter {
            status: Some(MessageStatus::Pending),
            message_type: Some(MessageType::Email),
            purpose: None,
        };
        assert!(filter.matches(&message));
        let filter = MessageFilter {
            purpose: Some(Purpose::Partnership),
            ..Default::default()
        };
        assert!(!filter.matches(&message));
    }
}
