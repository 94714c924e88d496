// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process account store backed by `DashMap`.
//!
//! Used for local development and tests when no Firestore project is
//! configured. Contents are lost on restart.

use crate::error::AppError;
use crate::models::{NewUser, Profile, ProfileFields, User};
use crate::time_utils::now_rfc3339;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Inner {
    users: DashMap<u64, User>,
    /// username -> user id
    usernames: DashMap<String, u64>,
    /// email -> user id
    emails: DashMap<String, u64>,
    /// user id -> profile
    profiles: DashMap<u64, Profile>,
    next_user_id: AtomicU64,
    next_profile_id: AtomicU64,
    /// Serializes sign-ups so the username and email claims are taken together.
    create_lock: Mutex<()>,
}

/// In-memory database.
#[derive(Clone, Default)]
pub struct MemoryDb {
    inner: Arc<Inner>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_user(&self, new_user: NewUser) -> Result<User, AppError> {
        let inner = &self.inner;
        let _guard = inner
            .create_lock
            .lock()
            .map_err(|_| AppError::Database("user store lock poisoned".to_string()))?;

        let email_key = new_user.email.to_lowercase();
        if inner.usernames.contains_key(&new_user.username) || inner.emails.contains_key(&email_key)
        {
            return Err(AppError::BadRequest(
                "Username or email already in use".to_string(),
            ));
        }

        let id = inner.next_user_id.fetch_add(1, Ordering::Relaxed) + 1;
        let now = now_rfc3339();
        let user = User {
            id,
            username: new_user.username,
            email: new_user.email,
            password_hash: new_user.password_hash,
            firstname: new_user.firstname,
            lastname: new_user.lastname,
            created_at: now.clone(),
            updated_at: now,
        };

        inner.usernames.insert(user.username.clone(), id);
        inner.emails.insert(email_key, id);
        inner.users.insert(id, user.clone());
        Ok(user)
    }

    pub fn get_user(&self, id: u64) -> Option<User> {
        self.inner.users.get(&id).map(|u| u.value().clone())
    }

    pub fn find_user_by_username(&self, username: &str) -> Option<User> {
        let id = *self.inner.usernames.get(username)?;
        self.get_user(id)
    }

    pub fn get_profile(&self, user_id: u64) -> Option<Profile> {
        self.inner.profiles.get(&user_id).map(|p| p.value().clone())
    }

    pub fn create_profile(&self, user_id: u64, fields: ProfileFields) -> Result<Profile, AppError> {
        match self.inner.profiles.entry(user_id) {
            Entry::Occupied(_) => Err(AppError::BadRequest(
                "Profile for user already exists".to_string(),
            )),
            Entry::Vacant(slot) => {
                let now = now_rfc3339();
                let profile = Profile {
                    id: self.inner.next_profile_id.fetch_add(1, Ordering::Relaxed) + 1,
                    user_id,
                    bio: fields.bio,
                    location: fields.location,
                    website_url: fields.website_url,
                    wishlist_url: fields.wishlist_url,
                    created_at: now.clone(),
                    updated_at: now,
                };
                slot.insert(profile.clone());
                Ok(profile)
            }
        }
    }

    pub fn update_profile(&self, user_id: u64, fields: ProfileFields) -> Option<Profile> {
        let mut profile = self.inner.profiles.get_mut(&user_id)?;
        profile.apply(fields, &now_rfc3339());
        Some(profile.value().clone())
    }
}
