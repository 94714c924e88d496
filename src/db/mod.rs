//! Database layer (Firestore, or in-memory when no project is configured).

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::error::AppError;
use crate::models::{NewUser, Profile, ProfileFields, User};

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    /// Profiles (keyed by owning user id)
    pub const PROFILES: &str = "profiles";
    /// Id counters (keyed by collection name)
    pub const COUNTERS: &str = "counters";
    /// Username claims (keyed by encoded username)
    pub const USERNAMES: &str = "usernames";
    /// Email claims (keyed by encoded email)
    pub const EMAILS: &str = "emails";
}

/// Account storage used by the routes.
#[derive(Clone)]
pub enum UserDb {
    Firestore(FirestoreDb),
    Memory(MemoryDb),
}

impl UserDb {
    /// Connect to Firestore when a project is given, otherwise keep accounts in memory.
    pub async fn connect(firestore_project_id: Option<&str>) -> Result<Self, AppError> {
        match firestore_project_id {
            Some(project) => Ok(Self::Firestore(FirestoreDb::new(project).await?)),
            None => {
                tracing::warn!("No FIRESTORE_PROJECT_ID set, accounts are kept in memory");
                Ok(Self::in_memory())
            }
        }
    }

    pub fn in_memory() -> Self {
        Self::Memory(MemoryDb::new())
    }

    pub async fn create_user(&self, new_user: NewUser) -> Result<User, AppError> {
        match self {
            Self::Firestore(db) => db.create_user(new_user).await,
            Self::Memory(db) => db.create_user(new_user),
        }
    }

    pub async fn get_user(&self, id: u64) -> Result<Option<User>, AppError> {
        match self {
            Self::Firestore(db) => db.get_user(id).await,
            Self::Memory(db) => Ok(db.get_user(id)),
        }
    }

    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        match self {
            Self::Firestore(db) => db.find_user_by_username(username).await,
            Self::Memory(db) => Ok(db.find_user_by_username(username)),
        }
    }

    pub async fn get_profile(&self, user_id: u64) -> Result<Option<Profile>, AppError> {
        match self {
            Self::Firestore(db) => db.get_profile(user_id).await,
            Self::Memory(db) => Ok(db.get_profile(user_id)),
        }
    }

    pub async fn create_profile(
        &self,
        user_id: u64,
        fields: ProfileFields,
    ) -> Result<Profile, AppError> {
        match self {
            Self::Firestore(db) => db.create_profile(user_id, fields).await,
            Self::Memory(db) => db.create_profile(user_id, fields),
        }
    }

    pub async fn update_profile(
        &self,
        user_id: u64,
        fields: ProfileFields,
    ) -> Result<Option<Profile>, AppError> {
        match self {
            Self::Firestore(db) => db.update_profile(user_id, fields).await,
            Self::Memory(db) => Ok(db.update_profile(user_id, fields)),
        }
    }
}
