//! HTTP Control API (C9) entry point: loads configuration, connects the
//! Postgres store and runs its migrations, wires the build runner
//! client and rate limiter, and serves the router of §6.

mod auth;
mod error;
mod routes;
mod state;

use std::path::PathBuf;
use std::sync::Arc;

use orchestrator_core::diff::LintVerifier;
use orchestrator_core::rate_limit::{InMemoryRateLimitBackend, RateLimitBackend};
use orchestrator_core::runner_client::HttpRunnerClient;
use orchestrator_core::store::{PgStore, Store};
use orchestrator_core::{Config, Orchestrator, OrchestratorConfig};

use state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env().map_err(|e| {
        tracing::error!(error = %e, "configuration failed to load");
        e
    })?;

    let pg = PgStore::connect(&config.database_url).await?;
    pg.migrate().await?;
    let store: Arc<dyn Store> = Arc::new(pg.clone());

    let rate_limiter: Arc<dyn RateLimitBackend> = if config.use_postgres_rate_limit {
        Arc::new(orchestrator_core::rate_limit::StoreRateLimitBackend::new(store.clone()))
    } else {
        Arc::new(InMemoryRateLimitBackend::new())
    };

    let runner = Arc::new(HttpRunnerClient::new(config.runner_url.clone(), config.runner_secret.clone()));
    let verifier = Arc::new(LintVerifier::new());

    let orchestrator_config = OrchestratorConfig {
        projects_dir: PathBuf::from(&config.projects_dir),
        templates_dir: PathBuf::from(&config.templates_dir).join("default"),
        max_attempts: config.max_attempts,
        build_timeout_s: config.build_timeout.as_secs(),
        rate_limit_window_s: config.rate_limit_window_s,
        rate_limit_max_requests: config.rate_limit_max_requests,
    };

    let orchestrator = Arc::new(Orchestrator::new(
        store.clone(),
        runner,
        rate_limiter,
        verifier,
        orchestrator_config,
    ));

    let state = AppState {
        orchestrator,
        store,
        projects_dir: PathBuf::from(&config.projects_dir),
    };

    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(&config.http_bind_addr).await?;
    tracing::info!(addr = %config.http_bind_addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
