// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Optional one-to-one profile attached to a user.

use serde::{Deserialize, Serialize};
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Profile stored per user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: u64,
    /// Owning user
    pub user_id: u64,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub website_url: Option<String>,
    pub wishlist_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Editable profile fields. Absent fields are left unchanged on update.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProfileFields {
    #[validate(length(max = 2000))]
    pub bio: Option<String>,
    #[validate(length(max = 255))]
    pub location: Option<String>,
    #[validate(url, length(max = 255))]
    pub website_url: Option<String>,
    #[serde(alias = "amazonWishlist")]
    #[validate(url, length(max = 255))]
    pub wishlist_url: Option<String>,
}

impl Profile {
    /// Overwrite every field that is present in `fields`.
    pub fn apply(&mut self, fields: ProfileFields, now: &str) {
        if let Some(bio) = fields.bio {
            self.bio = Some(bio);
        }
        if let Some(location) = fields.location {
            self.location = Some(location);
        }
        if let Some(url) = fields.website_url {
            self.website_url = Some(url);
        }
        if let Some(url) = fields.wishlist_url {
            self.wishlist_url = Some(url);
        }
        self.updated_at = now.to_string();
    }
}

/// Profile as returned by the API, with the owner's public identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ProfileResponse {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub id: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub user_id: u64,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub website_url: Option<String>,
    pub wishlist_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl ProfileResponse {
    pub fn new(profile: Profile, owner: Option<&super::User>) -> Self {
        Self {
            id: profile.id,
            user_id: profile.user_id,
            bio: profile.bio,
            location: profile.location,
            website_url: profile.website_url,
            wishlist_url: profile.wishlist_url,
            username: owner.map(|u| u.username.clone()),
            email: owner.map(|u| u.email.clone()),
        }
    }
}
