// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Password hashing via bcrypt.
//!
//! Hashing is CPU-bound, so both operations run on the blocking pool.

use anyhow::Context;

/// bcrypt hasher with a work factor fixed at startup.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a password for storage with a fresh salt.
    pub async fn hash(&self, password: &str) -> anyhow::Result<String> {
        let password = password.to_string();
        let cost = self.cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .context("password hashing task failed")?
            .context("bcrypt hash")
    }

    /// Check a submitted password against a stored hash.
    ///
    /// A stored hash that bcrypt cannot parse never matches.
    pub async fn verify(&self, password: &str, stored_hash: &str) -> anyhow::Result<bool> {
        let password = password.to_string();
        let stored_hash = stored_hash.to_string();
        let result = tokio::task::spawn_blocking(move || bcrypt::verify(password, &stored_hash))
            .await
            .context("password verification task failed")?;

        match result {
            Ok(matches) => Ok(matches),
            Err(e) => {
                tracing::warn!(error = %e, "Stored password hash is malformed");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_then_verify() {
        let hasher = PasswordHasher::new(4);
        let hash = hasher.hash("hunter2").await.unwrap();

        assert_ne!(hash, "hunter2");
        assert!(hasher.verify("hunter2", &hash).await.unwrap());
        assert!(!hasher.verify("hunter3", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_hash_uses_configured_cost() {
        let hasher = PasswordHasher::new(5);
        let hash = hasher.hash("pw").await.unwrap();
        assert!(hash.starts_with("$2b$05$"), "unexpected hash prefix: {hash}");
    }

    #[tokio::test]
    async fn test_malformed_hash_does_not_match() {
        let hasher = PasswordHasher::new(4);
        assert!(!hasher.verify("pw", "not-a-bcrypt-hash").await.unwrap());
    }
}
