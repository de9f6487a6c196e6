use std::str::FromStr;

use anyhow::{bail, Context, Result};

use crate::llm_client;
use crate::models::message::{MessageType, Purpose};

/// Where messages and profiles are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" | "in-memory" => Ok(StoreBackend::Memory),
            other => bail!("unknown STORE_BACKEND '{other}' (expected 'postgres' or 'memory')"),
        }
    }
}

/// Which resolver/generator pair produces profiles and message bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutreachBackend {
    /// Profile analysis and message text come from the generative-text API.
    Llm,
    /// Deterministic canned profiles and templates; no network calls.
    Canned,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub outreach_backend: OutreachBackend,
    /// Organisation the outreach is sent on behalf of. Substituted into prompts and templates.
    pub sender_org: String,
    pub default_message_type: MessageType,
    pub default_purpose: Purpose,
    pub batch_delay_ms: u64,
    pub persist_retries: u32,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let store_backend: StoreBackend = parse_env("STORE_BACKEND", StoreBackend::Postgres)?;
        let database_url = optional_env("DATABASE_URL");
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            bail!("Required environment variable 'DATABASE_URL' is not set (or set STORE_BACKEND=memory)");
        }

        let gemini_api_key = optional_env("GEMINI_API_KEY");
        let outreach_backend = select_outreach_backend(
            optional_env("OUTREACH_BACKEND").as_deref(),
            gemini_api_key.is_some(),
        )?;

        Ok(Config {
            store_backend,
            database_url,
            db_max_connections: parse_env("DB_MAX_CONNECTIONS", 10)?,
            gemini_api_key,
            gemini_model: optional_env("GEMINI_MODEL")
                .unwrap_or_else(|| llm_client::DEFAULT_MODEL.to_string()),
            outreach_backend,
            sender_org: optional_env("SENDER_ORG").unwrap_or_else(|| "Fluxor".to_string()),
            default_message_type: parse_env("DEFAULT_MESSAGE_TYPE", MessageType::Email)?,
            default_purpose: parse_env("DEFAULT_PURPOSE", Purpose::Partnership)?,
            batch_delay_ms: parse_env("BATCH_DELAY_MS", 500)?,
            persist_retries: parse_env("PERSIST_RETRIES", 1)?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

/// An explicit `OUTREACH_BACKEND` wins; otherwise the LLM backend is used only when a key exists.
fn select_outreach_backend(explicit: Option<&str>, has_api_key: bool) -> Result<OutreachBackend> {
    match explicit.map(|s| s.trim().to_ascii_lowercase()) {
        Some(v) if v == "canned" || v == "mock" => Ok(OutreachBackend::Canned),
        Some(v) if v == "llm" || v == "gemini" => {
            if !has_api_key {
                bail!("OUTREACH_BACKEND=llm requires GEMINI_API_KEY");
            }
            Ok(OutreachBackend::Llm)
        }
        Some(other) => bail!("unknown OUTREACH_BACKEND '{other}' (expected 'llm' or 'canned')"),
        None if has_api_key => Ok(OutreachBackend::Llm),
        None => Ok(OutreachBackend::Canned),
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_defaults_to_canned_without_key() {
        assert_eq!(
            select_outreach_backend(None, false).unwrap(),
            OutreachBackend::Canned
        );
        assert_eq!(
            select_outreach_backend(None, true).unwrap(),
            OutreachBackend::Llm
        );
    }

    #[test]
    fn test_explicit_llm_backend_requires_key() {
        assert!(select_outreach_backend(Some("llm"), false).is_err());
        assert_eq!(
            select_outreach_backend(Some("canned"), true).unwrap(),
            OutreachBackend::Canned
        );
    }

    #[test]
    fn test_store_backend_parses_case_insensitively() {
        assert_eq!("Memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert_eq!("postgres".parse::<StoreBackend>().unwrap(), StoreBackend::Postgres);
        assert!("sqlite".parse::<StoreBackend>().is_err());
    }
}
