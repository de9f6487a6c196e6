use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Post,
    Article,
    Project,
    Achievement,
    Interest,
}

impl ContentKind {
    pub fn label(&self) -> &'static str {
        match self {
            ContentKind::Post => "Post",
            ContentKind::Article => "Article",
            ContentKind::Project => "Project",
            ContentKind::Achievement => "Achievement",
            ContentKind::Interest => "Interest",
        }
    }
}

/// An activity attributed to a profile (a post, a shipped project, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentItem {
    #[serde(rename = "type")]
    pub kind: ContentKind,
    pub content: String,
}

/// What a partnership would bring to each side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PartnershipBenefit {
    pub for_them: String,
    pub for_us: String,
}

/// A resolved prospect, before it is persisted. `username` is the unique key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub name: String,
    pub username: String,
    pub linkedin_url: String,
    pub title: Option<String>,
    pub company: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub experience: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub content_items: Vec<ContentItem>,
    #[serde(default)]
    pub partnership_benefits: Vec<PartnershipBenefit>,
}

impl Profile {
    /// Canonical profile URL for a normalized handle.
    pub fn url_for(username: &str) -> String {
        format!("https://linkedin.com/in/{username}")
    }

    /// Folds a fresh resolution into the stored profile. Identity fields take
    /// the new values; optional fields and lists keep the stored value when
    /// the new one is missing or empty.
    pub fn merge(&mut self, fresh: &Profile) {
        self.name = fresh.name.clone();
        self.username = fresh.username.clone();
        self.linkedin_url = fresh.linkedin_url.clone();

        merge_field(&mut self.title, &fresh.title);
        merge_field(&mut self.company, &fresh.company);
        merge_field(&mut self.bio, &fresh.bio);
        merge_field(&mut self.location, &fresh.location);
        merge_field(&mut self.experience, &fresh.experience);

        merge_list(&mut self.skills, &fresh.skills);
        merge_list(&mut self.content_items, &fresh.content_items);
        merge_list(&mut self.partnership_benefits, &fresh.partnership_benefits);
    }
}

fn merge_field(stored: &mut Option<String>, fresh: &Option<String>) {
    if fresh.is_some() {
        stored.clone_from(fresh);
    }
}

fn merge_list<T: Clone>(stored: &mut Vec<T>, fresh: &[T]) {
    if !fresh.is_empty() {
        *stored = fresh.to_vec();
    }
}

/// A persisted profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfileRecord {
    pub id: Uuid,
    #[serde(flatten)]
    pub profile: Profile,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ProfileRow {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub linkedin_url: String,
    pub title: Option<String>,
    pub company: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub experience: Option<String>,
    pub skills: Vec<String>,
    pub content_items: Json<Vec<ContentItem>>,
    pub partnership_benefits: Json<Vec<PartnershipBenefit>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProfileRow> for ProfileRecord {
    fn from(row: ProfileRow) -> Self {
        ProfileRecord {
            id: row.id,
            profile: Profile {
                name: row.name,
                username: row.username,
                linkedin_url: row.linkedin_url,
                title: row.title,
                company: row.company,
                bio: row.bio,
                location: row.location,
                experience: row.experience,
                skills: row.skills,
                content_items: row.content_items.0,
                partnership_benefits: row.partnership_benefits.0,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Turns a handle into a display name: `john-doe` becomes `John Doe`.
pub fn name_from_username(username: &str) -> String {
    username
        .split('-')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut c = w.chars();
            match c.next() {
                None => String::new(),
                Some(f) => f.to_uppercase().to_string() + c.as_str(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_from_username() {
        assert_eq!(name_from_username("john-doe"), "John Doe");
        assert_eq!(name_from_username("satoshi"), "Satoshi");
        assert_eq!(name_from_username("a--b"), "A B");
    }

    #[test]
    fn test_content_item_uses_type_key() {
        let item = ContentItem {
            kind: ContentKind::Achievement,
            content: "Won a hackathon".to_string(),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["type"], "achievement");
    }

    #[test]
    fn test_profile_record_flattens_profile_fields() {
        let record = ProfileRecord {
            id: Uuid::new_v4(),
            profile: Profile {
                name: "Jane Smith".to_string(),
                username: "jane-smith".to_string(),
                linkedin_url: Profile::url_for("jane-smith"),
                title: None,
                company: Some("Chainlink Labs".to_string()),
                bio: None,
                location: None,
                experience: None,
                skills: vec![],
                content_items: vec![],
                partnership_benefits: vec![],
            },
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["username"], "jane-smith");
        assert_eq!(json["linkedin_url"], "https://linkedin.com/in/jane-smith");
        assert!(json.get("profile").is_none());
    }
}
