// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account routes: sign-up, login, token refresh, logout and lookup.

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::middleware::auth::{AuthContext, REFRESH_COOKIE};
use crate::models::{NewUser, User, UserData};
use crate::response::ApiResponse;
use crate::services::token::{TokenCodec, TokenKind, REFRESH_TOKEN_TTL_SECS};
use crate::AppState;

/// Role given to every account created through sign-up.
pub const DEFAULT_ROLE: &str = "user";

/// Routes that need no token.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/user/sign_up", post(sign_up))
        .route("/user/log_in", post(log_in))
        .route("/user/logout", post(logout))
        .route("/user/user_info", get(user_info))
}

/// Routes guarded by the refresh-token gate (applied in routes/mod.rs).
pub fn refresh_routes() -> Router<Arc<AppState>> {
    Router::new().route("/user/refresh_the_access_token", post(refresh))
}

// ─── Cookies ─────────────────────────────────────────────────

/// The HTTP-only cookie that carries a refresh token.
pub fn refresh_cookie(token: String) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, token))
        .http_only(true)
        .secure(true)
        .same_site(SameSite::None)
        .max_age(time::Duration::seconds(REFRESH_TOKEN_TTL_SECS))
        .path("/")
        .build()
}

/// A cookie that clears the refresh token, with the same attributes it was set with.
pub fn refresh_cookie_removal() -> Cookie<'static> {
    let mut cookie = refresh_cookie(String::new());
    cookie.make_removal();
    cookie
}

// ─── Payloads ────────────────────────────────────────────────

/// Payload returned after sign-up and login.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SessionPayload {
    pub user_data: UserData,
    pub access_token: String,
}

/// Payload returned by the refresh endpoint.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AccessTokenPayload {
    pub access_token: String,
}

/// Issue both tokens for a user: the access token for the body and the
/// refresh token as a cookie.
fn start_session(
    tokens: &TokenCodec,
    jar: CookieJar,
    user: &User,
) -> Result<(CookieJar, SessionPayload)> {
    let access_token = tokens.issue(user.id, TokenKind::Access, DEFAULT_ROLE)?;
    let refresh_token = tokens.issue(user.id, TokenKind::Refresh, DEFAULT_ROLE)?;

    Ok((
        jar.add(refresh_cookie(refresh_token)),
        SessionPayload {
            user_data: UserData::from(user),
            access_token,
        },
    ))
}

// ─── Sign Up ─────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct SignUpRequest {
    #[validate(length(max = 64))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(max = 256))]
    pub password: String,
    #[validate(length(max = 100))]
    pub firstname: String,
    #[validate(length(max = 100))]
    pub lastname: String,
}

impl SignUpRequest {
    fn has_all_fields(&self) -> bool {
        [
            &self.username,
            &self.email,
            &self.password,
            &self.firstname,
            &self.lastname,
        ]
        .iter()
        .all(|field| !field.trim().is_empty())
    }
}

/// Create an account and start a session for it.
async fn sign_up(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    payload: std::result::Result<Json<SignUpRequest>, JsonRejection>,
) -> Result<Response> {
    let Json(req) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    if !req.has_all_fields() {
        return Err(AppError::BadRequest("All fields are required.".to_string()));
    }
    req.validate()
        .map_err(|e| AppError::BadRequest(format!("Invalid sign-up details: {}", e)))?;

    let password_hash = state.passwords.hash(&req.password).await?;

    let user = state
        .db
        .create_user(NewUser {
            username: req.username.trim().to_string(),
            email: req.email.trim().to_lowercase(),
            password_hash,
            firstname: req.firstname.trim().to_string(),
            lastname: req.lastname.trim().to_string(),
        })
        .await?;

    let (jar, session) = start_session(&state.tokens, jar, &user)?;

    tracing::info!(user_id = user.id, "User signed up");

    Ok((
        StatusCode::CREATED,
        jar,
        Json(ApiResponse::ok("User created successfully", session)),
    )
        .into_response())
}

// ─── Log In ──────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LogInRequest {
    pub username: String,
    pub password: String,
}

/// Check a username and password and start a session.
///
/// Unknown users and wrong passwords get the same response.
async fn log_in(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    payload: std::result::Result<Json<LogInRequest>, JsonRejection>,
) -> Result<Response> {
    let Json(req) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    if req.username.trim().is_empty() || req.password.is_empty() {
        return Err(AppError::BadRequest(
            "Username and password are required.".to_string(),
        ));
    }

    let Some(user) = state.db.find_user_by_username(req.username.trim()).await? else {
        tracing::info!("Login failed: unknown user");
        return Err(AppError::InvalidCredentials);
    };

    if !state
        .passwords
        .verify(&req.password, &user.password_hash)
        .await?
    {
        tracing::info!(user_id = user.id, "Login failed: wrong password");
        return Err(AppError::InvalidCredentials);
    }

    let (jar, session) = start_session(&state.tokens, jar, &user)?;

    tracing::info!(user_id = user.id, "User logged in");

    Ok((
        StatusCode::OK,
        jar,
        Json(ApiResponse::ok("Logged in successfully", session)),
    )
        .into_response())
}

// ─── Refresh ─────────────────────────────────────────────────

/// Issue a new access token for a request that already passed the refresh gate.
///
/// The gate has verified the refresh token; the context is trusted as-is.
pub fn refresh_access_token(
    tokens: &TokenCodec,
    context: Option<&AuthContext>,
) -> Result<String> {
    let context = context
        .filter(|ctx| ctx.verified)
        .ok_or(AppError::MissingContext)?;

    Ok(tokens.issue(context.subject_id, TokenKind::Access, &context.role)?)
}

async fn refresh(State(state): State<Arc<AppState>>, request: Request) -> Result<Response> {
    let access_token =
        refresh_access_token(&state.tokens, request.extensions().get::<AuthContext>())?;

    Ok(ApiResponse::ok(
        "Access token refreshed successfully",
        AccessTokenPayload { access_token },
    )
    .with_status(StatusCode::OK))
}

// ─── Logout ──────────────────────────────────────────────────

/// Clear the refresh cookie.
///
/// Tokens stay valid until they expire; logout only removes the client's copy.
async fn logout(jar: CookieJar) -> Response {
    (
        StatusCode::OK,
        jar.add(refresh_cookie_removal()),
        Json(ApiResponse::message("Logged out successfully")),
    )
        .into_response()
}

// ─── User Info ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UserInfoQuery {
    pub id: Option<u64>,
    pub username: Option<String>,
}

/// Public fields of a user, looked up by id or username.
async fn user_info(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<UserInfoQuery>, QueryRejection>,
) -> Result<Response> {
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let username = query
        .username
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());

    let user = match (query.id, username) {
        (Some(id), _) => state.db.get_user(id).await?,
        (None, Some(username)) => state.db.find_user_by_username(username).await?,
        (None, None) => {
            return Err(AppError::BadRequest(
                "An id or username is required.".to_string(),
            ))
        }
    };

    let user = user.ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(ApiResponse::ok(
        format!("Found user {}", user.username),
        UserData::from(&user),
    )
    .with_status(StatusCode::OK))
}
