mod accounts;
mod config;
mod db;
mod entitlement;
mod errors;
mod llm_client;
mod models;
mod optimize;
mod referral;
mod routes;
mod state;
mod usage;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::accounts::{AccountStore, MemoryAccountStore, PgAccountStore};
use crate::config::{Config, StorageBackend};
use crate::db::create_pool;
use crate::entitlement::service::EntitlementService;
use crate::llm_client::LlmClient;
use crate::optimize::rate_limit::RateLimiter;
use crate::referral::{MemoryReferralLedger, PgReferralLedger, ReferralLedger};
use crate::routes::build_router;
use crate::state::AppState;
use crate::usage::{MemoryUsageStore, PgUsageStore, UsageStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Atelier API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize the storage backend. All three stores come from the same
    // backend so quota state never straddles two worlds.
    let (accounts, usage, referrals): (
        Arc<dyn AccountStore>,
        Arc<dyn UsageStore>,
        Arc<dyn ReferralLedger>,
    ) = match config.storage_backend {
        StorageBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is required for the postgres backend")?;
            let db = create_pool(database_url).await?;
            (
                Arc::new(PgAccountStore::new(db.clone())),
                Arc::new(PgUsageStore::new(db.clone())),
                Arc::new(PgReferralLedger::new(db)),
            )
        }
        StorageBackend::Memory => {
            warn!("STORAGE_BACKEND=memory: usage and referral state is volatile and per-process");
            (
                Arc::new(MemoryAccountStore::new()),
                Arc::new(MemoryUsageStore::new()),
                Arc::new(MemoryReferralLedger::new()),
            )
        }
    };
    info!("Storage backend: {}", config.storage_backend);

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone());
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let entitlements = EntitlementService::new(
        Arc::clone(&accounts),
        Arc::clone(&usage),
        Arc::clone(&referrals),
    );

    // Build app state
    let state = AppState {
        llm,
        config: config.clone(),
        accounts,
        usage,
        referrals,
        entitlements,
        rate_limiter: Arc::new(RateLimiter::new()),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
