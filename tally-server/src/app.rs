use std::sync::Arc;

use anyhow::Result;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use tally_ledger::SqlitePaymentLedger;

use crate::config::AppConfig;
use crate::handlers;
use crate::tenant::TenantResolver;

/// Shared state behind every handler.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<SqlitePaymentLedger>,
    pub resolver: TenantResolver,
    pub pages: PageLimits,
}

#[derive(Clone, Copy, Debug)]
pub struct PageLimits {
    pub default_limit: usize,
    pub max_limit: usize,
}

pub fn build_state(config: &AppConfig) -> Result<AppState> {
    let ledger = Arc::new(SqlitePaymentLedger::new(&config.storage.database)?);
    let resolver = TenantResolver::new(&config.storage.database)?;
    Ok(AppState {
        ledger,
        resolver,
        pages: PageLimits {
            default_limit: config.server.page_size,
            max_limit: config.server.max_page_size,
        },
    })
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/payments",
            post(handlers::create_payment).get(handlers::list_payments),
        )
        .route("/payments/:id", get(handlers::get_payment))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP API until ctrl-c.
pub async fn serve(config: AppConfig) -> Result<()> {
    let state = build_state(&config)?;
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.server.bind.as_str()).await?;
    let addr = listener.local_addr()?;
    info!(%addr, database = %config.storage.database.display(), "starting payment api");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to install ctrl-c handler");
    }
}
