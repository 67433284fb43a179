use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    /// Stored lowercased; unique
    pub email: String,
    /// Unique
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Projection safe to return over HTTP
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email.clone(),
            username: self.username.clone(),
            created_at: self.created_at,
        }
    }
}

/// Public view of a user, without the password hash
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: u64,
    pub email: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// Input to `UserStore::create_user`; the store assigns id and timestamp
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}
