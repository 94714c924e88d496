// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP route handlers.

pub mod profile;
pub mod user;

use crate::error::AppError;
use crate::middleware::auth::{require_access_token, require_refresh_token};
use crate::middleware::rate_limit::rate_limit_auth;
use crate::AppState;
use axum::http::{header, Method};
use axum::{middleware, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct HealthResponse {
    pub status: String,
    pub build_id: String,
}

/// Health check response
async fn health_check() -> Json<HealthResponse> {
    let build_id = option_env!("BUILD_ID").unwrap_or("unknown").to_string();
    Json(HealthResponse {
        status: "ok".to_string(),
        build_id,
    })
}

async fn not_found() -> AppError {
    AppError::NotFound("Not Found".to_string())
}

/// Build the complete router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = match state.config.frontend_url.parse::<axum::http::HeaderValue>() {
        Ok(origin) => CorsLayer::new().allow_origin(origin),
        Err(e) => {
            tracing::warn!(error = %e, "FRONTEND_URL is not a valid origin, CORS disabled");
            CorsLayer::new()
        }
    }
    .allow_credentials(true)
    .allow_methods([
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ])
    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    // Access-token gate
    let access_routes = profile::protected_routes().route_layer(middleware::from_fn_with_state(
        state.clone(),
        require_access_token,
    ));

    // Refresh-token gate
    let refresh_routes = user::refresh_routes().route_layer(middleware::from_fn_with_state(
        state.clone(),
        require_refresh_token,
    ));

    // Everything under /user shares the per-IP rate limit
    let user_routes = Router::new()
        .merge(user::routes())
        .merge(profile::routes())
        .merge(access_routes)
        .merge(refresh_routes)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_auth,
        ));

    Router::new()
        .route("/health", get(health_check))
        .merge(user_routes)
        .fallback(not_found)
        .layer(middleware::from_fn(
            crate::middleware::security::add_security_headers,
        ))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
