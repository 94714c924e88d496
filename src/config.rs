// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Everything here is read once at startup and treated as immutable for the
//! lifetime of the process. Missing or malformed secrets are fatal.

use std::env;

/// Lowest and highest work factor accepted by bcrypt.
const MIN_HASH_COST: u32 = 4;
const MAX_HASH_COST: u32 = 31;

/// Default per-IP request budget for `/user/*` per rate-limit window.
pub const DEFAULT_AUTH_RATE_LIMIT: u32 = 10;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Frontend origin allowed by CORS
    pub frontend_url: String,
    /// Server port
    pub port: u16,
    /// Firestore project; `None` keeps accounts in memory
    pub firestore_project_id: Option<String>,
    /// Requests allowed per IP per window on `/user/*`
    pub auth_rate_limit: u32,
    /// Header set by a trusted reverse proxy carrying the client address.
    /// `None` keys clients by socket peer address.
    pub trusted_proxy_header: Option<String>,

    // --- Secrets ---
    /// Signing secret for access tokens (raw bytes)
    pub access_token_secret: Vec<u8>,
    /// Signing secret for refresh tokens (raw bytes)
    pub refresh_token_secret: Vec<u8>,
    /// bcrypt work factor used when storing passwords
    pub hash_cost: u32,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is honoured for local development.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "https://localhost:3000".to_string()),
            port: parse_or_default("PORT", 8080)?,
            firestore_project_id: env::var("FIRESTORE_PROJECT_ID")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            auth_rate_limit: parse_or_default("AUTH_RATE_LIMIT", DEFAULT_AUTH_RATE_LIMIT)?,
            trusted_proxy_header: trusted_proxy_header()?,

            access_token_secret: required_secret("ACCESS_JWT_SECRET")?,
            refresh_token_secret: required_secret("REFRESH_JWT_SECRET")?,
            hash_cost: parse_hash_cost(
                &env::var("HASH_SALT").map_err(|_| ConfigError::Missing("HASH_SALT"))?,
            )?,
        })
    }

    /// Deterministic configuration for tests.
    ///
    /// Uses the cheapest bcrypt cost and an in-memory store.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "https://localhost:3000".to_string(),
            port: 8080,
            firestore_project_id: None,
            auth_rate_limit: 1000,
            trusted_proxy_header: None,
            access_token_secret: b"test_access_secret_32_bytes_long!".to_vec(),
            refresh_token_secret: b"test_refresh_secret_32_bytes_long".to_vec(),
            hash_cost: MIN_HASH_COST,
        }
    }
}

fn required_secret(var: &'static str) -> Result<Vec<u8>, ConfigError> {
    let value = env::var(var).map_err(|_| ConfigError::Missing(var))?;
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::Invalid {
            var,
            reason: "must not be empty".to_string(),
        });
    }
    Ok(value.as_bytes().to_vec())
}

/// Optional `TRUSTED_PROXY_HEADER`, normalized to a lowercase header name.
fn trusted_proxy_header() -> Result<Option<String>, ConfigError> {
    let Some(raw) = env::var("TRUSTED_PROXY_HEADER")
        .ok()
        .map(|v| v.trim().to_ascii_lowercase())
        .filter(|v| !v.is_empty())
    else {
        return Ok(None);
    };

    axum::http::HeaderName::from_bytes(raw.as_bytes()).map_err(|_| ConfigError::Invalid {
        var: "TRUSTED_PROXY_HEADER",
        reason: format!("'{}' is not a valid header name", raw),
    })?;
    Ok(Some(raw))
}

fn parse_or_default<T: std::str::FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            var,
            reason: format!("'{}' is not a valid number", raw),
        }),
        Err(_) => Ok(default),
    }
}

/// Parse the bcrypt work factor, rejecting anything bcrypt would refuse.
pub fn parse_hash_cost(raw: &str) -> Result<u32, ConfigError> {
    let cost: u32 = raw.trim().parse().map_err(|_| ConfigError::Invalid {
        var: "HASH_SALT",
        reason: format!("'{}' is not a valid number", raw),
    })?;

    if !(MIN_HASH_COST..=MAX_HASH_COST).contains(&cost) {
        return Err(ConfigError::Invalid {
            var: "HASH_SALT",
            reason: format!("must be between {MIN_HASH_COST} and {MAX_HASH_COST}, got {cost}"),
        });
    }

    Ok(cost)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid environment variable {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}
