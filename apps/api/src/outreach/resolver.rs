//! Profile resolution: turns a handle into a `Profile`.
//!
//! Two backends behind one trait, selected at startup:
//! - `LlmProfileResolver`: asks the generative-text API for a JSON analysis.
//! - `CannedProfileResolver`: deterministic canned personas, no network.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::ingest::parser::{normalize_identifier, ValidationError};
use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::{LlmClient, LlmError};
use crate::models::profile::{
    name_from_username, ContentItem, ContentKind, PartnershipBenefit, Profile,
};
use crate::outreach::prompts::build_analysis_prompt;

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error(transparent)]
    InvalidIdentifier(#[from] ValidationError),

    #[error("Profile analysis failed: {0}")]
    Llm(#[from] LlmError),
}

#[async_trait]
pub trait ProfileResolver: Send + Sync {
    async fn resolve(&self, identifier: &str) -> Result<Profile, ResolutionError>;

    /// Backend label for logs ("llm" | "canned").
    fn backend(&self) -> &'static str;
}

// ────────────────────────────────────────────────────────────────────────────
// LLM-backed resolver
// ────────────────────────────────────────────────────────────────────────────

pub struct LlmProfileResolver {
    llm: LlmClient,
    sender: String,
}

impl LlmProfileResolver {
    pub fn new(llm: LlmClient, sender: impl Into<String>) -> Self {
        Self {
            llm,
            sender: sender.into(),
        }
    }
}

#[async_trait]
impl ProfileResolver for LlmProfileResolver {
    async fn resolve(&self, identifier: &str) -> Result<Profile, ResolutionError> {
        let username = normalize_identifier(identifier)?;
        let url = Profile::url_for(&username);
        let prompt = build_analysis_prompt(&username, &url, &self.sender);

        debug!("Analyzing profile {username} with {}", self.llm.model());
        let analysis: ProfileAnalysis = self.llm.call_json(&prompt, Some(JSON_ONLY_SYSTEM)).await?;
        Ok(analysis.into_profile(username, url))
    }

    fn backend(&self) -> &'static str {
        "llm"
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileAnalysis {
    extracted_info: ExtractedInfo,
    #[serde(default)]
    content_items: Vec<AnalysisContentItem>,
    #[serde(default)]
    partnership_benefits: Vec<AnalysisBenefit>,
}

#[derive(Debug, Default, Deserialize)]
struct ExtractedInfo {
    title: Option<String>,
    company: Option<String>,
    bio: Option<String>,
    location: Option<String>,
    experience: Option<String>,
    #[serde(default)]
    skills: Vec<String>,
}

/// Kind is kept as text so one odd item does not sink the whole analysis.
#[derive(Debug, Deserialize)]
struct AnalysisContentItem {
    #[serde(rename = "type")]
    kind: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnalysisBenefit {
    #[serde(rename = "forThem")]
    for_them: String,
    #[serde(rename = "forUs", alias = "forFluxor")]
    for_us: String,
}

impl ProfileAnalysis {
    fn into_profile(self, username: String, url: String) -> Profile {
        let content_items = self
            .content_items
            .into_iter()
            .filter_map(|item| {
                let kind = match item.kind.trim().to_ascii_lowercase().as_str() {
                    "post" => ContentKind::Post,
                    "article" => ContentKind::Article,
                    "project" => ContentKind::Project,
                    "achievement" => ContentKind::Achievement,
                    "interest" => ContentKind::Interest,
                    other => {
                        warn!("Dropping content item with unknown type '{other}'");
                        return None;
                    }
                };
                Some(ContentItem {
                    kind,
                    content: item.content,
                })
            })
            .collect();

        let info = self.extracted_info;
        Profile {
            name: name_from_username(&username),
            username,
            linkedin_url: url,
            title: non_blank(info.title),
            company: non_blank(info.company),
            bio: non_blank(info.bio),
            location: non_blank(info.location),
            experience: non_blank(info.experience),
            skills: info.skills,
            content_items,
            partnership_benefits: self
                .partnership_benefits
                .into_iter()
                .map(|b| PartnershipBenefit {
                    for_them: b.for_them,
                    for_us: b.for_us,
                })
                .collect(),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ────────────────────────────────────────────────────────────────────────────
// Canned resolver
// ────────────────────────────────────────────────────────────────────────────

struct Persona {
    title: &'static str,
    company: &'static str,
    bio: &'static str,
    location: &'static str,
    experience: &'static str,
    skills: &'static [&'static str],
    content: &'static [(ContentKind, &'static str)],
    benefits: &'static [(&'static str, &'static str)],
}

const PERSONAS: &[Persona] = &[
    Persona {
        title: "Senior Blockchain Developer",
        company: "ConsenSys",
        bio: "Builds decentralized applications and has spent five years shipping smart contracts and DeFi protocols.",
        location: "San Francisco, CA",
        experience: "5+ years",
        skills: &["Solidity", "Web3.js", "React", "Node.js", "DeFi"],
        content: &[
            (ContentKind::Post, "Wrapped up a cross-chain bridge implementation this week."),
            (ContentKind::Article, "Wrote about gas optimization patterns that cut contract costs by up to 40%."),
            (ContentKind::Project, "Lead developer on a yield protocol that reached $50M TVL."),
            (ContentKind::Achievement, "First place at an ETHGlobal hackathon with a novel AMM design."),
            (ContentKind::Interest, "Layer 2 scaling and zero-knowledge proofs."),
        ],
        benefits: &[
            ("Early access to hackathon projects and blockchain talent", "Smart contract and DeFi expertise"),
            ("A stage to showcase developer tooling to builders", "Integration with an established ecosystem"),
        ],
    },
    Persona {
        title: "VP of Product",
        company: "Chainlink Labs",
        bio: "Product leader focused on developer-first Web3 infrastructure, with eight years in product management.",
        location: "New York, NY",
        experience: "8+ years",
        skills: &["Product Strategy", "Web3", "API Design", "Developer Relations", "Tokenomics"],
        content: &[
            (ContentKind::Post, "The Web3 developer tooling ecosystem keeps getting more accessible."),
            (ContentKind::Article, "Published a piece on hybrid smart contracts and real-world data."),
            (ContentKind::Project, "Led product strategy for a verifiable randomness service."),
            (ContentKind::Achievement, "Launched a developer grants program funding 100+ projects."),
        ],
        benefits: &[
            ("A channel to discover and support promising projects", "Oracle integration for transparent judging"),
        ],
    },
    Persona {
        title: "Head of Developer Relations",
        company: "Polygon Labs",
        bio: "Runs community and education programs that bring new developers into the ecosystem.",
        location: "Remote",
        experience: "6+ years",
        skills: &["Developer Relations", "Community", "Solidity", "Technical Writing"],
        content: &[
            (ContentKind::Post, "Our last hackathon onboarded 2,000 first-time builders."),
            (ContentKind::Interest, "Developer education and ecosystem grants."),
        ],
        benefits: &[
            ("Turnkey hackathon operations for ecosystem events", "Reach into an active developer community"),
            ("Transparent, on-chain prize distribution", "Co-hosted events with a recognized brand"),
        ],
    },
];

/// Deterministic stand-in for profile analysis. The same username always maps to
/// the same persona.
#[derive(Debug, Default, Clone)]
pub struct CannedProfileResolver;

impl CannedProfileResolver {
    fn persona_for(username: &str) -> &'static Persona {
        let index = username
            .bytes()
            .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize))
            % PERSONAS.len();
        &PERSONAS[index]
    }
}

#[async_trait]
impl ProfileResolver for CannedProfileResolver {
    async fn resolve(&self, identifier: &str) -> Result<Profile, ResolutionError> {
        let username = normalize_identifier(identifier)?;
        let persona = Self::persona_for(&username);

        Ok(Profile {
            name: name_from_username(&username),
            linkedin_url: Profile::url_for(&username),
            username,
            title: Some(persona.title.to_string()),
            company: Some(persona.company.to_string()),
            bio: Some(persona.bio.to_string()),
            location: Some(persona.location.to_string()),
            experience: Some(persona.experience.to_string()),
            skills: persona.skills.iter().map(|s| s.to_string()).collect(),
            content_items: persona
                .content
                .iter()
                .map(|(kind, content)| ContentItem {
                    kind: *kind,
                    content: content.to_string(),
                })
                .collect(),
            partnership_benefits: persona
                .benefits
                .iter()
                .map(|(for_them, for_us)| PartnershipBenefit {
                    for_them: for_them.to_string(),
                    for_us: for_us.to_string(),
                })
                .collect(),
        })
    }

    fn backend(&self) -> &'static str {
        "canned"
    }
}
