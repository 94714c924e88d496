// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Userbase: user accounts with stateless token sessions.
//!
//! This crate provides registration, login, logout, profile storage and
//! access-token renewal behind a JSON HTTP API. Sessions are carried entirely
//! in signed tokens: a short-lived access token sent as a bearer header and a
//! long-lived refresh token kept in an HTTP-only cookie.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod response;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::UserDb;
use middleware::rate_limit::IpLimiter;
use services::token::TokenError;
use services::{PasswordHasher, TokenCodec};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: UserDb,
    pub tokens: TokenCodec,
    pub passwords: PasswordHasher,
    pub auth_limiter: IpLimiter,
}

impl AppState {
    /// Compose the state from configuration and a connected database.
    pub fn new(config: Config, db: UserDb) -> Result<Self, TokenError> {
        let tokens = TokenCodec::new(&config.access_token_secret, &config.refresh_token_secret)?;
        let passwords = PasswordHasher::new(config.hash_cost);
        let auth_limiter = IpLimiter::new(config.auth_rate_limit);

        Ok(Self {
            config,
            db,
            tokens,
            passwords,
            auth_limiter,
        })
    }
}
