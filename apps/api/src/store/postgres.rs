use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::message::{
    Message, MessageFilter, MessagePage, MessageProfileRow, MessageRow, MessageStats,
    MessageStatus, MessageType, MessageWithProfile, Page, Purpose,
};
use crate::models::profile::{Profile, ProfileRecord, ProfileRow};
use crate::review::state_machine::{InvalidTransition, ReviewAction};
use crate::store::{MessageStore, ProfileWithMessages, StoreError};

/// Column list for `messages m JOIN profiles p`, matching `MessageProfileRow`.
const MESSAGE_PROFILE_COLUMNS: &str = r#"
    m.id, m.profile_id, m.body, m.message_type, m.purpose, m.status,
    m.created_at, m.approved_at, m.rejected_at, m.reviewed_by,
    p.name AS p_name, p.username AS p_username, p.linkedin_url AS p_linkedin_url,
    p.title AS p_title, p.company AS p_company, p.bio AS p_bio,
    p.location AS p_location, p.experience AS p_experience, p.skills AS p_skills,
    p.content_items AS p_content_items, p.partnership_benefits AS p_partnership_benefits,
    p.created_at AS p_created_at, p.updated_at AS p_updated_at
"#;

/// `NULL` filter parameters match everything.
const FILTER_CLAUSE: &str = r#"
    ($1::text IS NULL OR m.status = $1)
    AND ($2::text IS NULL OR m.message_type = $2)
    AND ($3::text IS NULL OR m.purpose = $3)
"#;

const SEARCH_CLAUSE: &str = r#"
    p.name ILIKE $1 OR p.company ILIKE $1 OR p.title ILIKE $1 OR m.body ILIKE $1
"#;

#[derive(Clone)]
pub struct PgMessageStore {
    pool: PgPool,
}

impl PgMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn upsert_profile(&self, profile: &Profile) -> Result<ProfileRecord, StoreError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            INSERT INTO profiles
                (id, name, username, linkedin_url, title, company, bio, location,
                 experience, skills, content_items, partnership_benefits)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (username) DO UPDATE SET
                name = EXCLUDED.name,
                linkedin_url = EXCLUDED.linkedin_url,
                title = COALESCE(EXCLUDED.title, profiles.title),
                company = COALESCE(EXCLUDED.company, profiles.company),
                bio = COALESCE(EXCLUDED.bio, profiles.bio),
                location = COALESCE(EXCLUDED.location, profiles.location),
                experience = COALESCE(EXCLUDED.experience, profiles.experience),
                skills = COALESCE(NULLIF(EXCLUDED.skills, '{}'::text[]), profiles.skills),
                content_items = COALESCE(
                    NULLIF(EXCLUDED.content_items, '[]'::jsonb), profiles.content_items),
                partnership_benefits = COALESCE(
                    NULLIF(EXCLUDED.partnership_benefits, '[]'::jsonb),
                    profiles.partnership_benefits),
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&profile.name)
        .bind(&profile.username)
        .bind(&profile.linkedin_url)
        .bind(&profile.title)
        .bind(&profile.company)
        .bind(&profile.bio)
        .bind(&profile.location)
        .bind(&profile.experience)
        .bind(&profile.skills)
        .bind(Json(&profile.content_items))
        .bind(Json(&profile.partnership_benefits))
        .fetch_one(&self.pool)
        .await?;

        debug!("Upserted profile {} ({})", row.username, row.id);
        Ok(row.into())
    }

    async fn get_profile(&self, username: &str) -> Result<Option<ProfileWithMessages>, StoreError> {
        let Some(row) =
            sqlx::query_as::<_, ProfileRow>("SELECT * FROM profiles WHERE username = $1")
                .bind(username)
                .fetch_optional(&self.pool)
                .await?
        else {
            return Ok(None);
        };

        let messages = sqlx::query_as::<_, MessageRow>(
            "SELECT * FROM messages WHERE profile_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Message::try_from)
        .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(ProfileWithMessages {
            profile: row.into(),
            messages,
        }))
    }

    async fn create_message(
        &self,
        profile_id: Uuid,
        body: &str,
        message_type: MessageType,
        purpose: Purpose,
    ) -> Result<Message, StoreError> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            INSERT INTO messages (id, profile_id, body, message_type, purpose, status)
            VALUES ($1, $2, $3, $4, $5, 'pending')
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(profile_id)
        .bind(body)
        .bind(message_type.as_str())
        .bind(purpose.as_str())
        .fetch_one(&self.pool)
        .await?;

        info!("Created {} {} message {} for profile {}", purpose, message_type, row.id, profile_id);
        Ok(Message::try_from(row)?)
    }

    async fn get_message(&self, id: Uuid) -> Result<Option<MessageWithProfile>, StoreError> {
        let sql = format!(
            "SELECT {MESSAGE_PROFILE_COLUMNS} FROM messages m \
             JOIN profiles p ON p.id = m.profile_id WHERE m.id = $1"
        );
        let row = sqlx::query_as::<_, MessageProfileRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(MessageWithProfile::try_from).transpose()?)
    }

    async fn set_status(
        &self,
        id: Uuid,
        action: ReviewAction,
        reviewer: Option<&str>,
    ) -> Result<Message, StoreError> {
        // Single conditional UPDATE: the pending check and the write are one atomic step.
        let updated = sqlx::query_as::<_, MessageRow>(
            r#"
            UPDATE messages SET
                status = $2,
                approved_at = CASE WHEN $2 = 'approved' THEN NOW() ELSE approved_at END,
                rejected_at = CASE WHEN $2 = 'rejected' THEN NOW() ELSE rejected_at END,
                reviewed_by = COALESCE($3, reviewed_by)
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(action.target().as_str())
        .bind(reviewer)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = updated {
            return Ok(Message::try_from(row)?);
        }

        let current: Option<String> =
            sqlx::query_scalar("SELECT status FROM messages WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        match current {
            None => Err(StoreError::MessageNotFound(id)),
            Some(status) => {
                let from: MessageStatus = status.parse()?;
                Err(InvalidTransition { from, action }.into())
            }
        }
    }

    async fn stats(&self) -> Result<MessageStats, StoreError> {
        Ok(sqlx::query_as::<_, MessageStats>(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'pending')  AS pending,
                COUNT(*) FILTER (WHERE status = 'approved') AS approved,
                COUNT(*) FILTER (WHERE status = 'rejected') AS rejected,
                COUNT(*)                                    AS total
            FROM messages
            "#,
        )
        .fetch_one(&self.pool)
        .await?)
    }

    async fn list(&self, page: Page, filter: MessageFilter) -> Result<MessagePage, StoreError> {
        let status = filter.status.map(|s| s.as_str());
        let message_type = filter.message_type.map(|t| t.as_str());
        let purpose = filter.purpose.map(|p| p.as_str());

        let sql = format!(
            "SELECT {MESSAGE_PROFILE_COLUMNS} FROM messages m \
             JOIN profiles p ON p.id = m.profile_id \
             WHERE {FILTER_CLAUSE} \
             ORDER BY m.created_at DESC, m.id DESC LIMIT $4 OFFSET $5"
        );
        let rows = sqlx::query_as::<_, MessageProfileRow>(&sql)
            .bind(status)
            .bind(message_type)
            .bind(purpose)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await?;

        let count_sql = format!("SELECT COUNT(*) FROM messages m WHERE {FILTER_CLAUSE}");
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(status)
            .bind(message_type)
            .bind(purpose)
            .fetch_one(&self.pool)
            .await?;

        into_page(rows, total, page)
    }

    async fn search(&self, query: &str, page: Page) -> Result<MessagePage, StoreError> {
        let pattern = format!("%{}%", escape_like(query.trim()));

        let sql = format!(
            "SELECT {MESSAGE_PROFILE_COLUMNS} FROM messages m \
             JOIN profiles p ON p.id = m.profile_id \
             WHERE {SEARCH_CLAUSE} \
             ORDER BY m.created_at DESC, m.id DESC LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query_as::<_, MessageProfileRow>(&sql)
            .bind(&pattern)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await?;

        let count_sql = format!(
            "SELECT COUNT(*) FROM messages m JOIN profiles p ON p.id = m.profile_id \
             WHERE {SEARCH_CLAUSE}"
        );
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(&pattern)
            .fetch_one(&self.pool)
            .await?;

        into_page(rows, total, page)
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM messages WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::MessageNotFound(id));
        }
        info!("Deleted message {id}");
        Ok(())
    }
}

fn into_page(rows: Vec<MessageProfileRow>, total: i64, page: Page) -> Result<MessagePage, StoreError> {
    let messages = rows
        .into_iter()
        .map(MessageWithProfile::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(MessagePage {
        messages,
        total,
        limit: page.limit,
        offset: page.offset,
    })
}

/// Escapes `ILIKE` wildcards so user input matches literally (backslash is the default escape).
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
