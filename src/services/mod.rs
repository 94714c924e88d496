// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Business logic services.

pub mod password;
pub mod token;

pub use password::PasswordHasher;
pub use token::{TokenCodec, TokenKind, VerifyOutcome};
