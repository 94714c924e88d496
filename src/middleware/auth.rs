// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JWT authentication middleware.
//!
//! The gate runs the same checks for both token kinds, in this order:
//! token present, not expired, correctly signed, claims complete, and the
//! token's subject equal to the `userId` the request asserts. Only the
//! transport (bearer header vs. cookie) and the verification secret differ.

use crate::error::AppError;
use crate::services::token::{TokenCodec, TokenKind, VerifyOutcome};
use crate::AppState;
use axum::{
    body::{to_bytes, Body},
    extract::{FromRequestParts, RawPathParams, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

/// Cookie carrying the refresh token.
pub const REFRESH_COOKIE: &str = "refreshToken";

/// Route parameter / body field naming the user a request acts on.
pub const USER_ID_FIELD: &str = "userId";

/// Largest body the gate buffers while looking for `userId`.
const MAX_IDENTITY_BODY_BYTES: usize = 64 * 1024;

/// Why the gate refused a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("No token provided")]
    NoToken,

    #[error("Token has expired")]
    Expired,

    #[error("Invalid token")]
    Invalid,

    #[error("Invalid or expired token")]
    IncompleteClaims,

    #[error("User ID mismatch")]
    IdentityMismatch,
}

impl Rejection {
    pub fn status(self) -> StatusCode {
        match self {
            Rejection::NoToken | Rejection::Expired => StatusCode::UNAUTHORIZED,
            Rejection::Invalid | Rejection::IncompleteClaims | Rejection::IdentityMismatch => {
                StatusCode::FORBIDDEN
            }
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Rejection::NoToken => "No token provided",
            Rejection::Expired => "Token has expired",
            Rejection::Invalid => "Invalid token",
            Rejection::IncompleteClaims => "Invalid or expired token",
            Rejection::IdentityMismatch => "User ID mismatch",
        }
    }
}

/// Identity attached to a request that passed the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub verified: bool,
    pub subject_id: u64,
    pub role: String,
}

// ─── Credential Extraction ───────────────────────────────────

/// Token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?;
    if token.is_empty() || token.contains(char::is_whitespace) {
        return None;
    }
    Some(token.to_string())
}

/// Token from the refresh cookie.
pub fn cookie_token(jar: &CookieJar) -> Option<String> {
    jar.get(REFRESH_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

/// Pull the candidate token for `kind` from its channel.
pub fn extract_token(kind: TokenKind, headers: &HeaderMap) -> Option<String> {
    match kind {
        TokenKind::Access => bearer_token(headers),
        TokenKind::Refresh => cookie_token(&CookieJar::from_headers(headers)),
    }
}

// ─── Identity Matching ───────────────────────────────────────

/// Parse a user id the way a loose numeric comparison would: integers and
/// whole-valued decimals such as `7.0` resolve, anything else does not.
fn parse_user_id(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    raw.parse()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().and_then(whole_number))
}

fn whole_number(value: f64) -> Option<u64> {
    // 2^64 is exactly representable; anything at or above it does not fit.
    let in_range = value >= 0.0 && value < 18_446_744_073_709_551_616.0;
    (value.is_finite() && value.fract() == 0.0 && in_range).then_some(value as u64)
}

fn user_id_from_json(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64().or_else(|| n.as_f64().and_then(whole_number)),
        serde_json::Value::String(s) => parse_user_id(s),
        _ => None,
    }
}

/// The user id a request claims to act on.
///
/// A non-empty route parameter wins over the body. Anything that does not
/// resolve to a whole number yields `None`.
pub fn asserted_user_id(path_param: Option<&str>, body: &[u8]) -> Option<u64> {
    if let Some(param) = path_param.filter(|p| !p.is_empty()) {
        return parse_user_id(param);
    }

    let body: serde_json::Value = serde_json::from_slice(body).ok()?;
    body.get(USER_ID_FIELD).and_then(user_id_from_json)
}

/// Whether the asserted identity is the token's subject.
///
/// An unresolved identity never matches.
pub fn identity_matches(asserted: Option<u64>, subject_id: u64) -> bool {
    asserted == Some(subject_id)
}

// ─── Gate ────────────────────────────────────────────────────

/// Token checks that need nothing but the token itself.
pub fn evaluate(
    codec: &TokenCodec,
    kind: TokenKind,
    token: Option<&str>,
) -> Result<(u64, String), Rejection> {
    let token = token.ok_or(Rejection::NoToken)?;

    let claims = match codec.verify(kind, token) {
        VerifyOutcome::Valid(claims) => claims,
        VerifyOutcome::Expired => return Err(Rejection::Expired),
        VerifyOutcome::Invalid => return Err(Rejection::Invalid),
    };

    let subject_id = claims
        .user_id
        .filter(|id| *id != 0)
        .ok_or(Rejection::IncompleteClaims)?;
    let role = claims
        .role
        .filter(|role| !role.is_empty())
        .ok_or(Rejection::IncompleteClaims)?;

    Ok((subject_id, role))
}

/// Run the full gate for `kind` and hand the request on with an [`AuthContext`].
pub async fn gate(
    codec: &TokenCodec,
    kind: TokenKind,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_token(kind, request.headers());

    let (subject_id, role) = evaluate(codec, kind, token.as_deref()).map_err(|rejection| {
        tracing::warn!(%kind, reason = %rejection, uri = %request.uri(), "Rejected token");
        rejection
    })?;

    let (mut parts, body) = request.into_parts();
    let path_param = RawPathParams::from_request_parts(&mut parts, &())
        .await
        .ok()
        .and_then(|params| {
            params
                .iter()
                .find(|(key, _)| *key == USER_ID_FIELD)
                .map(|(_, value)| value.to_string())
        });

    let (mut request, asserted) = match path_param {
        Some(param) => {
            let asserted = asserted_user_id(Some(param.as_str()), &[]);
            (Request::from_parts(parts, body), asserted)
        }
        None => match to_bytes(body, MAX_IDENTITY_BODY_BYTES).await {
            Ok(bytes) => {
                let asserted = asserted_user_id(None, &bytes);
                (Request::from_parts(parts, Body::from(bytes)), asserted)
            }
            Err(e) => {
                tracing::debug!(error = %e, "Could not buffer body for identity check");
                (Request::from_parts(parts, Body::empty()), None)
            }
        },
    };

    if !identity_matches(asserted, subject_id) {
        tracing::warn!(
            %kind,
            subject_id,
            asserted = ?asserted,
            "Rejected token: user ID mismatch"
        );
        return Err(Rejection::IdentityMismatch.into());
    }

    tracing::debug!(%kind, subject_id, role = %role, "Token accepted");

    request.extensions_mut().insert(AuthContext {
        verified: true,
        subject_id,
        role,
    });

    Ok(next.run(request).await)
}

/// Middleware that requires a valid access token in the `Authorization` header.
pub async fn require_access_token(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    gate(&state.tokens, TokenKind::Access, request, next).await
}

/// Middleware that requires a valid refresh token in the refresh cookie.
pub async fn require_refresh_token(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    gate(&state.tokens, TokenKind::Refresh, request, next).await
}
