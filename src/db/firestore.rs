// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (credential records, keyed by numeric id)
//! - Profiles (one per user, keyed by the owning user id)
//! - Counters (numeric id allocation)
//! - Username and email claims (uniqueness)
//!
//! Creates run in a transaction that reads the id counter and writes every
//! new document with a must-not-exist precondition, so a concurrent creator
//! makes the commit fail instead of overwriting.

use crate::db::collections;
use crate::error::AppError;
use crate::models::{NewUser, Profile, ProfileFields, User};
use crate::time_utils::now_rfc3339;
use firestore::{FirestoreConsistencySelector, FirestoreTransaction, FirestoreWritePrecondition};
use serde::{Deserialize, Serialize};

/// Commit attempts before giving up on a contended create.
const CREATE_ATTEMPTS: usize = 3;

/// Next free id for a collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Counter {
    next: u64,
}

/// Marks a username or email as taken by a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claim {
    user_id: u64,
}

/// Document id for a claim on `value`. The prefix keeps ids clear of the
/// reserved `.`, `..` and `__*__` forms.
pub fn claim_id(value: &str) -> String {
    format!("k:{}", urlencoding::encode(value))
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: firestore::FirestoreDb,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self { client })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self { client })
    }

    // ─── Helpers ─────────────────────────────────────────────────

    /// A client whose reads happen inside `transaction`.
    fn in_transaction(&self, transaction: &FirestoreTransaction<'_>) -> firestore::FirestoreDb {
        self.client
            .clone_with_consistency_selector(FirestoreConsistencySelector::Transaction(
                transaction.transaction_id().clone(),
            ))
    }

    async fn begin(&self) -> Result<FirestoreTransaction<'_>, AppError> {
        self.client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))
    }

    async fn read_counter(db: &firestore::FirestoreDb, name: &str) -> Result<Counter, AppError> {
        let counter: Option<Counter> = db
            .fluent()
            .select()
            .by_id_in(collections::COUNTERS)
            .obj()
            .one(name)
            .await
            .map_err(|e| AppError::Database(format!("Failed to read counter: {}", e)))?;
        Ok(counter.unwrap_or(Counter { next: 1 }))
    }

    /// Queue the counter bump for `name` past `used`.
    fn bump_counter(
        &self,
        transaction: &mut FirestoreTransaction<'_>,
        name: &str,
        used: u64,
    ) -> Result<(), AppError> {
        self.client
            .fluent()
            .update()
            .in_col(collections::COUNTERS)
            .document_id(name)
            .object(&Counter { next: used + 1 })
            .add_to_transaction(transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add counter to transaction: {}", e))
            })?;
        Ok(())
    }

    /// Queue a create-only write of `object` at `collection/id`.
    fn create_in<T>(
        &self,
        transaction: &mut FirestoreTransaction<'_>,
        collection: &str,
        id: String,
        object: &T,
    ) -> Result<(), AppError>
    where
        T: Serialize + for<'de> Deserialize<'de> + Sync + Send,
    {
        self.client
            .fluent()
            .update()
            .in_col(collection)
            .precondition(FirestoreWritePrecondition::Exists(false))
            .document_id(id)
            .object(object)
            .add_to_transaction(transaction)
            .map_err(|e| {
                AppError::Database(format!(
                    "Failed to add {} document to transaction: {}",
                    collection, e
                ))
            })?;
        Ok(())
    }

    async fn claim(&self, collection: &str, value: &str) -> Result<Option<Claim>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collection)
            .obj()
            .one(&claim_id(value))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn username_or_email_taken(&self, new_user: &NewUser) -> Result<bool, AppError> {
        Ok(self
            .claim(collections::USERNAMES, &new_user.username)
            .await?
            .is_some()
            || self
                .claim(collections::EMAILS, &new_user.email)
                .await?
                .is_some())
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user by id.
    pub async fn get_user(&self, id: u64) -> Result<Option<User>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(&id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Look up a user by username.
    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        match self.claim(collections::USERNAMES, username).await? {
            Some(claim) => self.get_user(claim.user_id).await,
            None => Ok(None),
        }
    }

    /// Create a user with the next free id.
    ///
    /// Emails are expected to be normalized to lowercase by the caller. The
    /// user document and both claims are create-only, so a taken username,
    /// email or id fails the whole commit.
    pub async fn create_user(&self, new_user: NewUser) -> Result<User, AppError> {
        let duplicate = || AppError::BadRequest("Username or email already in use".to_string());

        if self.username_or_email_taken(&new_user).await? {
            return Err(duplicate());
        }

        for attempt in 1..=CREATE_ATTEMPTS {
            let mut transaction = self.begin().await?;
            let counter =
                Self::read_counter(&self.in_transaction(&transaction), collections::USERS).await?;

            let now = now_rfc3339();
            let user = User {
                id: counter.next,
                username: new_user.username.clone(),
                email: new_user.email.clone(),
                password_hash: new_user.password_hash.clone(),
                firstname: new_user.firstname.clone(),
                lastname: new_user.lastname.clone(),
                created_at: now.clone(),
                updated_at: now,
            };
            let claim = Claim { user_id: user.id };

            self.bump_counter(&mut transaction, collections::USERS, user.id)?;
            self.create_in(&mut transaction, collections::USERS, user.id.to_string(), &user)?;
            self.create_in(
                &mut transaction,
                collections::USERNAMES,
                claim_id(&user.username),
                &claim,
            )?;
            self.create_in(
                &mut transaction,
                collections::EMAILS,
                claim_id(&user.email),
                &claim,
            )?;

            match transaction.commit().await {
                Ok(_) => {
                    tracing::info!(user_id = user.id, "User created");
                    return Ok(user);
                }
                Err(e) => {
                    if self.username_or_email_taken(&new_user).await? {
                        return Err(duplicate());
                    }
                    tracing::warn!(attempt, error = %e, "User create conflicted, retrying");
                }
            }
        }

        Err(AppError::Database(
            "Could not allocate a user id after repeated conflicts".to_string(),
        ))
    }

    // ─── Profile Operations ──────────────────────────────────────

    async fn profile_in(
        db: &firestore::FirestoreDb,
        user_id: u64,
    ) -> Result<Option<Profile>, AppError> {
        db.fluent()
            .select()
            .by_id_in(collections::PROFILES)
            .obj()
            .one(&user_id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get the profile owned by a user.
    pub async fn get_profile(&self, user_id: u64) -> Result<Option<Profile>, AppError> {
        Self::profile_in(&self.client, user_id).await
    }

    async fn write_profile(&self, profile: &Profile) -> Result<(), AppError> {
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collections::PROFILES)
            .precondition(FirestoreWritePrecondition::Exists(true))
            .document_id(profile.user_id.to_string())
            .object(profile)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Create the profile for a user. Fails if one already exists.
    pub async fn create_profile(
        &self,
        user_id: u64,
        fields: ProfileFields,
    ) -> Result<Profile, AppError> {
        let exists = || AppError::BadRequest("Profile for user already exists".to_string());

        for attempt in 1..=CREATE_ATTEMPTS {
            let mut transaction = self.begin().await?;
            let tx_db = self.in_transaction(&transaction);

            if Self::profile_in(&tx_db, user_id).await?.is_some() {
                let _ = transaction.rollback().await;
                return Err(exists());
            }
            let counter = Self::read_counter(&tx_db, collections::PROFILES).await?;

            let now = now_rfc3339();
            let profile = Profile {
                id: counter.next,
                user_id,
                bio: fields.bio.clone(),
                location: fields.location.clone(),
                website_url: fields.website_url.clone(),
                wishlist_url: fields.wishlist_url.clone(),
                created_at: now.clone(),
                updated_at: now,
            };

            self.bump_counter(&mut transaction, collections::PROFILES, profile.id)?;
            self.create_in(
                &mut transaction,
                collections::PROFILES,
                user_id.to_string(),
                &profile,
            )?;

            match transaction.commit().await {
                Ok(_) => return Ok(profile),
                Err(e) => {
                    if self.get_profile(user_id).await?.is_some() {
                        return Err(exists());
                    }
                    tracing::warn!(attempt, user_id, error = %e, "Profile create conflicted, retrying");
                }
            }
        }

        Err(AppError::Database(
            "Could not allocate a profile id after repeated conflicts".to_string(),
        ))
    }

    /// Apply field changes to an existing profile.
    pub async fn update_profile(
        &self,
        user_id: u64,
        fields: ProfileFields,
    ) -> Result<Option<Profile>, AppError> {
        let Some(mut profile) = self.get_profile(user_id).await? else {
            return Ok(None);
        };
        profile.apply(fields, &now_rfc3339());
        self.write_profile(&profile).await?;
        Ok(Some(profile))
    }
}
