mod agents;
mod claims_api;
mod config;
mod prompts;
mod service;

use std::sync::Arc;

use anyhow::Context as _;
use claims_flow::{
    ClaimSynthesizer, ClaimsStore, HttpClaimSubmitter, InMemoryConversationStorage,
    TurnOrchestrator, TurnRunner, store,
};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    agents::Agents,
    config::{LogFormat, ServiceConfig},
    service::{AppState, build_router},
};

/// Initialize structured tracing based on environment variables
fn init_tracing(format: LogFormat) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "claims_service=debug,claims_flow=debug,tower_http=debug".into());

    match format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true),
                )
                .init();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing(LogFormat::from_env());

    let config = match ServiceConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    let pool = store::connect(&config.database_url)
        .await
        .with_context(|| format!("failed to open claims database {}", config.database_url))?;
    let claims_store = ClaimsStore::new(pool).with_row_limit(config.query_row_limit);
    claims_store
        .migrate()
        .await
        .context("failed to create claims table")?;
    info!(database_url = %config.database_url, "Claims store ready");

    let submitter = HttpClaimSubmitter::new(&config.claims_api_url, config.submission_timeout)
        .context("failed to build claims API client")?;
    let synthesizer = match config.synth_seed {
        Some(seed) => ClaimSynthesizer::seeded(seed),
        None => ClaimSynthesizer::from_entropy(),
    };

    let agents = Agents::from_config(&config);
    let orchestrator = TurnOrchestrator::builder()
        .intent_agent(agents.intent)
        .extraction_agent(agents.extraction)
        .query_agent(agents.query)
        .synthesizer(synthesizer)
        .submitter(Arc::new(submitter))
        .query_engine(Arc::new(claims_store.clone()))
        .build()?;

    let runner = TurnRunner::new(
        Arc::new(orchestrator),
        Arc::new(InMemoryConversationStorage::new()),
    );
    let app = build_router(AppState {
        runner,
        store: claims_store,
    });

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!("Server running on http://{}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
