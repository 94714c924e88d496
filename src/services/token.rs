// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Signed session tokens.
//!
//! Two token classes share one claim layout but are signed with distinct
//! secrets, so a token of one kind never verifies as the other. The kind is
//! not written into the payload.

use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifetime of an access token, in seconds (1 hour).
pub const ACCESS_TOKEN_TTL_SECS: i64 = 60 * 60;
/// Lifetime of a refresh token, in seconds (7 days).
pub const REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Which class of token is being issued or checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn ttl(self) -> Duration {
        match self {
            TokenKind::Access => Duration::seconds(ACCESS_TOKEN_TTL_SECS),
            TokenKind::Refresh => Duration::seconds(REFRESH_TOKEN_TTL_SECS),
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Access => f.write_str("access"),
            TokenKind::Refresh => f.write_str("refresh"),
        }
    }
}

/// JWT claims structure.
///
/// `user_id` and `role` are optional on the decode side so that a correctly
/// signed token with an incomplete payload can be told apart from a forged one.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user ID)
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<u64>,
    /// Capability tag, e.g. "user"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Result of checking a token against the secret for its kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    Valid(Claims),
    Expired,
    Invalid,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("No signing secret configured for {0} tokens")]
    MissingSecret(TokenKind),

    #[error("Failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn from_secret(kind: TokenKind, secret: &[u8]) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::MissingSecret(kind));
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        })
    }
}

/// Issues and verifies access and refresh tokens.
pub struct TokenCodec {
    access: KeyPair,
    refresh: KeyPair,
    validation: Validation,
}

impl TokenCodec {
    /// Build a codec from the two signing secrets.
    ///
    /// Both secrets must be present; an empty one is a configuration error.
    pub fn new(access_secret: &[u8], refresh_secret: &[u8]) -> Result<Self, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is exact: a token past `exp` is expired, no grace period.
        validation.leeway = 0;

        Ok(Self {
            access: KeyPair::from_secret(TokenKind::Access, access_secret)?,
            refresh: KeyPair::from_secret(TokenKind::Refresh, refresh_secret)?,
            validation,
        })
    }

    fn keys(&self, kind: TokenKind) -> &KeyPair {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    /// Issue a token of `kind` for a subject with the standard lifetime.
    pub fn issue(&self, user_id: u64, kind: TokenKind, role: &str) -> Result<String, TokenError> {
        self.issue_with_ttl(user_id, kind, role, kind.ttl())
    }

    /// Issue a token with an explicit lifetime. A negative lifetime produces
    /// a token that is already expired.
    pub fn issue_with_ttl(
        &self,
        user_id: u64,
        kind: TokenKind,
        role: &str,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            user_id: Some(user_id),
            role: Some(role.to_string()),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        self.sign(kind, &claims)
    }

    /// Sign arbitrary claims with the secret for `kind`.
    pub fn sign(&self, kind: TokenKind, claims: &Claims) -> Result<String, TokenError> {
        Ok(encode(
            &Header::new(Algorithm::HS256),
            claims,
            &self.keys(kind).encoding,
        )?)
    }

    /// Verify a token against the secret for `kind`.
    ///
    /// Only an elapsed `exp` is reported as [`VerifyOutcome::Expired`]; every
    /// other failure, including a signature made with a different secret, is
    /// [`VerifyOutcome::Invalid`].
    pub fn verify(&self, kind: TokenKind, token: &str) -> VerifyOutcome {
        match decode::<Claims>(token, &self.keys(kind).decoding, &self.validation) {
            Ok(data) => VerifyOutcome::Valid(data.claims),
            Err(err) => match err.kind() {
                ErrorKind::ExpiredSignature => {
                    tracing::debug!(%kind, "Token has expired");
                    VerifyOutcome::Expired
                }
                other => {
                    tracing::debug!(%kind, error = ?other, "Token verification failed");
                    VerifyOutcome::Invalid
                }
            },
        }
    }
}
