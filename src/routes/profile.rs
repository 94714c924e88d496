// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile routes. Reads are public; writes require an access token whose
//! subject matches the `userId` in the body.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthContext;
use crate::models::{ProfileFields, ProfileResponse};
use crate::response::ApiResponse;
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::Response,
    routing::get,
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

const PROFILE_PATH: &str = "/user/profile";

/// Public profile routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route(PROFILE_PATH, get(get_profile))
}

/// Profile writes (the access-token gate is applied in routes/mod.rs).
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new().route(
        PROFILE_PATH,
        axum::routing::put(update_profile).post(create_profile),
    )
}

#[derive(Deserialize)]
struct ProfileQuery {
    #[serde(rename = "userId")]
    user_id: Option<u64>,
}

fn parse_fields(
    payload: std::result::Result<Json<ProfileFields>, JsonRejection>,
) -> Result<ProfileFields> {
    let Json(fields) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    fields
        .validate()
        .map_err(|e| AppError::BadRequest(format!("Invalid profile: {}", e)))?;
    Ok(fields)
}

/// Fetch a user's profile with their username and email.
async fn get_profile(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<ProfileQuery>, QueryRejection>,
) -> Result<Response> {
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let user_id = query
        .user_id
        .ok_or_else(|| AppError::BadRequest("Profile ID must be a valid number.".to_string()))?;

    let profile = state
        .db
        .get_profile(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found.".to_string()))?;
    let owner = state.db.get_user(user_id).await?;

    Ok(ApiResponse::ok(
        "Profile fetched successfully.",
        ProfileResponse::new(profile, owner.as_ref()),
    )
    .with_status(StatusCode::OK))
}

/// Update the authenticated user's profile.
async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    payload: std::result::Result<Json<ProfileFields>, JsonRejection>,
) -> Result<Response> {
    let fields = parse_fields(payload)?;

    let profile = state
        .db
        .update_profile(auth.subject_id, fields)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found.".to_string()))?;

    tracing::info!(user_id = auth.subject_id, "Profile updated");

    Ok(ApiResponse::ok(
        "Profile updated successfully.",
        ProfileResponse::new(profile, None),
    )
    .with_status(StatusCode::OK))
}

/// Create the authenticated user's profile.
async fn create_profile(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    payload: std::result::Result<Json<ProfileFields>, JsonRejection>,
) -> Result<Response> {
    let fields = parse_fields(payload)?;

    if state.db.get_user(auth.subject_id).await?.is_none() {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    let profile = state.db.create_profile(auth.subject_id, fields).await?;

    tracing::info!(user_id = auth.subject_id, "Profile created");

    Ok(ApiResponse::ok(
        "Profile created successfully.",
        ProfileResponse::new(profile, None),
    )
    .with_status(StatusCode::CREATED))
}
