// All LLM prompt templates for profile analysis and message writing.
// Placeholders use `{{name}}` syntax and are filled by `fill_message_template`.

use crate::models::message::{MessageType, Purpose};
use crate::models::profile::Profile;

/// Profile analysis prompt. Replace `{{username}}`, `{{url}}`, `{{sender}}`.
pub const PROFILE_ANALYSIS_PROMPT: &str = r#"You are preparing background for a personalized outreach message from {{sender}}.
Based on the LinkedIn handle "{{username}}" ({{url}}), describe the professional this profile most plausibly belongs to.

Return a JSON object with this EXACT schema (no extra fields):
{
  "extractedInfo": {
    "title": "Job title",
    "company": "Company name",
    "bio": "Two or three sentence professional bio",
    "location": "City, Region",
    "experience": "Years of experience, e.g. 5+ years",
    "skills": ["skill1", "skill2", "skill3", "skill4", "skill5"]
  },
  "contentItems": [
    {"type": "post", "content": "A recent post about their work"},
    {"type": "article", "content": "An article they wrote or shared"},
    {"type": "project", "content": "A project they worked on"},
    {"type": "achievement", "content": "A professional milestone"},
    {"type": "interest", "content": "Areas of professional focus"}
  ],
  "partnershipBenefits": [
    {"forThem": "What they would gain from working with {{sender}}", "forUs": "What {{sender}} would gain"}
  ]
}

"type" MUST be one of: post, article, project, achievement, interest.
Return between one and three partnershipBenefits."#;

const RECIPIENT_BLOCK: &str = r#"Recipient:
Name: {{name}}
Title: {{title}}
Company: {{company}}
LinkedIn: {{linkedinUrl}}
Bio: {{bio}}
Location: {{location}}
Experience: {{experience}}
Skills: {{skills}}

What we know from their profile:
{{contentItems}}"#;

/// Partnership email. Includes a subject line and signature.
pub const PARTNERSHIP_EMAIL_PROMPT: &str = r#"Write a partnership outreach email on behalf of {{sender}}.

{{recipient}}

Partnership angles identified:
{{partnershipBenefits}}

Requirements:
- Reference one or two specific items from their profile.
- Propose one concrete, mutually valuable collaboration.
- Warm and professional, not salesy. 200-300 words.
- End with a clear request for a short call.
- Format: "Subject: ..." line, greeting, two or three paragraphs, signature from the {{sender}} partnerships team."#;

/// Product introduction email. Includes a subject line, signature and P.S.
pub const PRODUCT_EMAIL_PROMPT: &str = r#"Write a product introduction email on behalf of {{sender}}.

{{recipient}}

Requirements:
- Reference one or two specific items from their profile that make {{sender}} relevant to them.
- Explain the benefits that matter for their role.
- Friendly and conversational. 175-250 words.
- Call to action: book a demo or try the platform.
- Format: "Subject: ..." line, greeting, two or three paragraphs, signature from the {{sender}} team, and a P.S."#;

/// Partnership LinkedIn message. No subject line.
pub const PARTNERSHIP_LINKEDIN_PROMPT: &str = r#"Write a LinkedIn direct message proposing a partnership with {{sender}}.

{{recipient}}

Partnership angles identified:
{{partnershipBenefits}}

Requirements:
- Mention one specific item from their background.
- Casual LinkedIn tone, emojis sparingly. 100-150 words.
- Simple call to action. No subject line."#;

/// Product LinkedIn message. No subject line.
pub const PRODUCT_LINKEDIN_PROMPT: &str = r#"Write a LinkedIn direct message introducing {{sender}}.

{{recipient}}

Requirements:
- Reference their role or expertise.
- Say concretely why {{sender}} helps someone in their position.
- Casual LinkedIn tone, emojis sparingly. 80-120 words.
- Simple call to action. No subject line."#;

pub fn message_template(message_type: MessageType, purpose: Purpose) -> &'static str {
    match (message_type, purpose) {
        (MessageType::Email, Purpose::Partnership) => PARTNERSHIP_EMAIL_PROMPT,
        (MessageType::Email, Purpose::Product) => PRODUCT_EMAIL_PROMPT,
        (MessageType::Linkedin, Purpose::Partnership) => PARTNERSHIP_LINKEDIN_PROMPT,
        (MessageType::Linkedin, Purpose::Product) => PRODUCT_LINKEDIN_PROMPT,
    }
}

pub fn build_analysis_prompt(username: &str, url: &str, sender: &str) -> String {
    PROFILE_ANALYSIS_PROMPT
        .replace("{{username}}", username)
        .replace("{{url}}", url)
        .replace("{{sender}}", sender)
}

/// Fills a message template from the profile. Missing fields get neutral fallbacks.
pub fn fill_message_template(template: &str, profile: &Profile, sender: &str) -> String {
    let content_items = if profile.content_items.is_empty() {
        "No specific content items available.".to_string()
    } else {
        profile
            .content_items
            .iter()
            .map(|item| format!("- {}: {}", item.kind.label(), item.content))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let benefits = if profile.partnership_benefits.is_empty() {
        "Mutual benefits to be discussed.".to_string()
    } else {
        profile
            .partnership_benefits
            .iter()
            .map(|b| format!("- For them: {}\n  For {}: {}", b.for_them, sender, b.for_us))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let skills = if profile.skills.is_empty() {
        "Not specified".to_string()
    } else {
        profile.skills.join(", ")
    };

    // The recipient block goes in first so its own placeholders are filled below.
    template
        .replace("{{recipient}}", RECIPIENT_BLOCK)
        .replace("{{sender}}", sender)
        .replace("{{name}}", &profile.name)
        .replace("{{title}}", profile.title.as_deref().unwrap_or("Professional"))
        .replace(
            "{{company}}",
            profile.company.as_deref().unwrap_or("their organization"),
        )
        .replace("{{linkedinUrl}}", &profile.linkedin_url)
        .replace(
            "{{bio}}",
            profile.bio.as_deref().unwrap_or("Technology professional"),
        )
        .replace("{{location}}", profile.location.as_deref().unwrap_or("Not specified"))
        .replace(
            "{{experience}}",
            profile.experience.as_deref().unwrap_or("Several years"),
        )
        .replace("{{skills}}", &skills)
        .replace("{{contentItems}}", &content_items)
        .replace("{{partnershipBenefits}}", &benefits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::profile::{ContentItem, ContentKind, PartnershipBenefit};

    fn sparse_profile() -> Profile {
        Profile {
            name: "John Doe".to_string(),
            username: "john-doe".to_string(),
            linkedin_url: Profile::url_for("john-doe"),
            title: None,
            company: None,
            bio: None,
            location: None,
            experience: None,
            skills: vec![],
            content_items: vec![],
            partnership_benefits: vec![],
        }
    }

    #[test]
    fn test_every_placeholder_is_filled() {
        for message_type in [MessageType::Email, MessageType::Linkedin] {
            for purpose in [Purpose::Partnership, Purpose::Product] {
                let prompt = fill_message_template(
                    message_template(message_type, purpose),
                    &sparse_profile(),
                    "Fluxor",
                );
                assert!(
                    !prompt.contains("{{"),
                    "unfilled placeholder in {message_type}/{purpose}: {prompt}"
                );
                assert!(prompt.contains("John Doe"));
                assert!(prompt.contains("Fluxor"));
            }
        }
    }

    #[test]
    fn test_missing_fields_use_fallbacks() {
        let prompt = fill_message_template(PARTNERSHIP_EMAIL_PROMPT, &sparse_profile(), "Fluxor");
        assert!(prompt.contains("Title: Professional"));
        assert!(prompt.contains("Company: their organization"));
        assert!(prompt.contains("Skills: Not specified"));
        assert!(prompt.contains("No specific content items available."));
        assert!(prompt.contains("Mutual benefits to be discussed."));
    }

    #[test]
    fn test_content_and_benefits_are_listed() {
        let mut profile = sparse_profile();
        profile.content_items = vec![ContentItem {
            kind: ContentKind::Project,
            content: "Built a cross-chain bridge".to_string(),
        }];
        profile.partnership_benefits = vec![PartnershipBenefit {
            for_them: "Early access to hackathon talent".to_string(),
            for_us: "DeFi expertise".to_string(),
        }];
        let prompt = fill_message_template(PARTNERSHIP_LINKEDIN_PROMPT, &profile, "Fluxor");
        assert!(prompt.contains("- Project: Built a cross-chain bridge"));
        assert!(prompt.contains("- For them: Early access to hackathon talent\n  For Fluxor: DeFi expertise"));
    }

    #[test]
    fn test_analysis_prompt_is_filled() {
        let prompt = build_analysis_prompt("jane-smith", "https://linkedin.com/in/jane-smith", "Fluxor");
        assert!(prompt.contains("\"jane-smith\""));
        assert!(!prompt.contains("{{"));
    }
}
