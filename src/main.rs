// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Userbase API Server
//!
//! Serves account registration, login and token renewal. TLS is expected to
//! be terminated in front of this process.

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use userbase::{config::Config, db::UserDb, AppState};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize structured JSON logging
    init_logging();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Server failed to start");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    // Secrets and work factor must be present before anything is served
    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        hash_cost = config.hash_cost,
        "Starting Userbase API"
    );

    let db = UserDb::connect(config.firestore_project_id.as_deref()).await?;

    let port = config.port;
    let state = Arc::new(AppState::new(config, db)?);

    // Build router
    let app = userbase::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("userbase=debug,info"));

    tracing_subscriber::registry().with(filter).with(format).init();
}
