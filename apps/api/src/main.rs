mod config;
mod db;
mod errors;
mod history;
mod ingest;
mod llm_client;
mod models;
mod outreach;
mod pipeline;
mod review;
mod routes;
mod state;
mod store;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, OutreachBackend, StoreBackend};
use crate::db::{create_pool, run_migrations};
use crate::llm_client::LlmClient;
use crate::outreach::{
    CannedMessageGenerator, CannedProfileResolver, LlmMessageGenerator, LlmProfileResolver,
    MessageGenerator, ProfileResolver,
};
use crate::pipeline::{BatchProcessor, BatchRegistry, BatchSettings};
use crate::review::ReviewService;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{InMemoryMessageStore, MessageStore, PgMessageStore};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("outreach_api={},tower_http={}", &config.rust_log, &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Outreach API v{}", env!("CARGO_PKG_VERSION"));

    let store = build_store(&config).await?;
    let (resolver, generator) = build_outreach(&config)?;
    info!(
        "Outreach backends: resolver={}, generator={}",
        resolver.backend(),
        generator.backend()
    );

    let processor = BatchProcessor::new(
        resolver,
        generator,
        store.clone(),
        BatchSettings::from_config(&config),
    );

    let state = AppState {
        review: ReviewService::new(store.clone()),
        store,
        processor,
        batches: BatchRegistry::new(),
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the review UI has a fixed host

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn build_store(config: &Config) -> Result<Arc<dyn MessageStore>> {
    match config.store_backend {
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is required for the postgres store")?;
            let pool = create_pool(url, config.db_max_connections).await?;
            run_migrations(&pool).await?;
            Ok(Arc::new(PgMessageStore::new(pool)))
        }
        StoreBackend::Memory => {
            info!("Using in-memory store; data is lost on restart");
            Ok(Arc::new(InMemoryMessageStore::new()))
        }
    }
}

fn build_outreach(
    config: &Config,
) -> Result<(Arc<dyn ProfileResolver>, Arc<dyn MessageGenerator>)> {
    match (config.outreach_backend, config.gemini_api_key.as_ref()) {
        (OutreachBackend::Llm, Some(key)) => {
            let llm = LlmClient::new(key.clone(), config.gemini_model.clone())?;
            info!("LLM client initialized (model: {})", llm.model());
            Ok((
                Arc::new(LlmProfileResolver::new(llm.clone(), &config.sender_org)),
                Arc::new(LlmMessageGenerator::new(llm, &config.sender_org)),
            ))
        }
        (OutreachBackend::Llm, None) => anyhow::bail!("OUTREACH_BACKEND=llm requires GEMINI_API_KEY"),
        (OutreachBackend::Canned, _) => Ok((
            Arc::new(CannedProfileResolver),
            Arc::new(CannedMessageGenerator::new(&config.sender_org)),
        )),
    }
}
