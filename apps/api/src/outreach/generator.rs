//! Message generation: writes the outreach body for a resolved profile.

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::llm_client::prompts::OUTREACH_WRITER_SYSTEM;
use crate::llm_client::{LlmClient, LlmError};
use crate::models::message::{MessageType, Purpose};
use crate::models::profile::Profile;
use crate::outreach::prompts::{fill_message_template, message_template};

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Message generation failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Generated message was empty")]
    EmptyBody,
}

#[async_trait]
pub trait MessageGenerator: Send + Sync {
    async fn generate(
        &self,
        profile: &Profile,
        message_type: MessageType,
        purpose: Purpose,
    ) -> Result<String, GenerationError>;

    fn backend(&self) -> &'static str;
}

pub struct LlmMessageGenerator {
    llm: LlmClient,
    sender: String,
}

impl LlmMessageGenerator {
    pub fn new(llm: LlmClient, sender: impl Into<String>) -> Self {
        Self {
            llm,
            sender: sender.into(),
        }
    }
}

#[async_trait]
impl MessageGenerator for LlmMessageGenerator {
    async fn generate(
        &self,
        profile: &Profile,
        message_type: MessageType,
        purpose: Purpose,
    ) -> Result<String, GenerationError> {
        let prompt = fill_message_template(
            message_template(message_type, purpose),
            profile,
            &self.sender,
        );
        debug!("Generating {purpose} {message_type} for {}", profile.username);

        let body = self
            .llm
            .call_text(&prompt, Some(OUTREACH_WRITER_SYSTEM))
            .await?;
        if body.trim().is_empty() {
            return Err(GenerationError::EmptyBody);
        }
        Ok(body)
    }

    fn backend(&self) -> &'static str {
        "llm"
    }
}

/// Template-based generator used when no API key is configured.
#[derive(Debug, Clone)]
pub struct CannedMessageGenerator {
    sender: String,
}

impl CannedMessageGenerator {
    pub fn new(sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
        }
    }

    fn render(&self, profile: &Profile, message_type: MessageType, purpose: Purpose) -> String {
        let sender = &self.sender;
        let name = &profile.name;
        let company = profile.company.as_deref().unwrap_or("your team");
        let title = profile.title.as_deref().unwrap_or("your role");
        let skill = profile.skills.first().map(String::as_str).unwrap_or("your field");
        let second_skill = profile.skills.get(1).map(String::as_str).unwrap_or("community building");
        let highlight = profile
            .content_items
            .first()
            .map(|item| item.content.as_str())
            .unwrap_or("your recent work");

        match (message_type, purpose) {
            (MessageType::Email, Purpose::Partnership) => format!(
                "Subject: Partnership opportunity: {company} x {sender}\n\n\
                 Hi {name},\n\n\
                 I came across your work as {title} at {company}. Your background in {skill} \
                 and {second_skill} lines up closely with what we are building at {sender}.\n\n\
                 I would like to explore a partnership, whether that is co-hosting an event, \
                 integrating {company}'s technology, or a joint program for both of our communities. \
                 \"{highlight}\" is exactly the kind of work we want to put in front of builders.\n\n\
                 Would you be open to a short call next week?\n\n\
                 Best regards,\n\
                 The {sender} partnerships team"
            ),
            (MessageType::Email, Purpose::Product) => format!(
                "Subject: Running innovation programs at {company}\n\n\
                 Hi {name},\n\n\
                 Given your role as {title} at {company} and your expertise in {skill}, I thought \
                 {sender} might be useful to you.\n\n\
                 {sender} takes care of the operational side of hackathons: registration, \
                 transparent judging, and prize distribution, so your team can focus on the builders.\n\n\
                 Would a 15-minute demo be worthwhile?\n\n\
                 Best regards,\n\
                 The {sender} team\n\n\
                 P.S. Happy to share how teams like yours have used it to find {skill} talent."
            ),
            (MessageType::Linkedin, Purpose::Partnership) => format!(
                "Hi {name}! Your work at {company} on {skill} caught my eye, especially \
                 \"{highlight}\". At {sender} we think there is a real partnership here. \
                 Open to a quick 15-minute chat?"
            ),
            (MessageType::Linkedin, Purpose::Product) => format!(
                "Hi {name}, quick one: how does {company} run its developer programs today? \
                 {sender} handles hackathon operations end to end. Given your background in \
                 {skill}, I think you would find a short demo worthwhile."
            ),
        }
    }
}

#[async_trait]
impl MessageGenerator for CannedMessageGenerator {
    async fn generate(
        &self,
        profile: &Profile,
        message_type: MessageType,
        purpose: Purpose,
    ) -> Result<String, GenerationError> {
        Ok(self.render(profile, message_type, purpose))
    }

    fn backend(&self) -> &'static str {
        "canned"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outreach::resolver::{CannedProfileResolver, ProfileResolver};

    #[tokio::test]
    async fn test_canned_email_has_subject_and_names() {
        let profile = CannedProfileResolver.resolve("jane-smith").await.unwrap();
        let generator = CannedMessageGenerator::new("Fluxor");

        let body = generator
            .generate(&profile, MessageType::Email, Purpose::Partnership)
            .await
            .unwrap();
        assert!(body.starts_with("Subject: "));
        assert!(body.contains("Hi Jane Smith"));
        assert!(body.contains("Fluxor"));
    }

    #[tokio::test]
    async fn test_canned_linkedin_has_no_subject() {
        let profile = CannedProfileResolver.resolve("john-doe").await.unwrap();
        let generator = CannedMessageGenerator::new("Fluxor");

        for purpose in [Purpose::Partnership, Purpose::Product] {
            let body = generator
                .generate(&profile, MessageType::Linkedin, purpose)
                .await
                .unwrap();
            assert!(!body.contains("Subject:"));
            assert!(body.contains("John Doe"));
        }
    }

    #[tokio::test]
    async fn test_canned_generator_tolerates_sparse_profile() {
        let profile = Profile {
            name: "Solo".to_string(),
            username: "solo".to_string(),
            linkedin_url: Profile::url_for("solo"),
            title: None,
            company: None,
            bio: None,
            location: None,
            experience: None,
            skills: vec![],
            content_items: vec![],
            partnership_benefits: vec![],
        };
        let body = CannedMessageGenerator::new("Fluxor")
            .generate(&profile, MessageType::Email, Purpose::Product)
            .await
            .unwrap();
        assert!(body.contains("your team"));
        assert!(body.contains("your field"));
    }
}
