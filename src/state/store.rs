use crate::error::{AppError, Result};
use crate::models::{CustomerSegment, NewUser, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Trait for customer segment storage
#[async_trait]
pub trait SegmentStore: Send + Sync {
    /// All segments, ascending by customer id
    async fn list_segments(&self) -> Result<Vec<CustomerSegment>>;

    /// Insert or replace one segment (last write wins)
    async fn upsert_segment(&self, segment: &CustomerSegment) -> Result<()>;

    /// Insert or replace many segments in a single batch
    async fn upsert_segments(&self, segments: &[CustomerSegment]) -> Result<usize>;
}

/// Trait for account and session storage
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Create a user, failing with `Duplicate` if the email or username is taken
    async fn create_user(&self, new_user: NewUser) -> Result<User>;

    /// Look up by email, case-insensitively
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn get_user(&self, id: u64) -> Result<Option<User>>;

    /// Mark a token session as revoked until it would have expired anyway
    async fn revoke_session(&self, jti: &str, expires_at: DateTime<Utc>) -> Result<()>;

    async fn is_session_revoked(&self, jti: &str) -> Result<bool>;
}

/// Everything the service persists
pub trait Store: SegmentStore + UserStore {}

impl<T: SegmentStore + UserStore> Store for T {}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn email_taken() -> AppError {
    AppError::Duplicate("Email already registered".to_string())
}

pub(crate) fn username_taken() -> AppError {
    AppError::Duplicate("Username already taken".to_string())
}

#[derive(Default)]
struct Users {
    by_id: BTreeMap<u64, User>,
    by_email: HashMap<String, u64>,
    by_username: HashMap<String, u64>,
    next_id: u64,
}

/// In-memory store (for development and testing)
#[derive(Clone, Default)]
pub struct InMemoryStore {
    segments: Arc<RwLock<BTreeMap<i64, CustomerSegment>>>,
    users: Arc<RwLock<Users>>,
    revoked_sessions: Arc<RwLock<HashMap<String, DateTime<Utc>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SegmentStore for InMemoryStore {
    async fn list_segments(&self) -> Result<Vec<CustomerSegment>> {
        Ok(self.segments.read().values().cloned().collect())
    }

    async fn upsert_segment(&self, segment: &CustomerSegment) -> Result<()> {
        self.segments
            .write()
            .insert(segment.customer_id, segment.clone());
        tracing::debug!(customer_id = segment.customer_id, "Segment saved");
        Ok(())
    }

    async fn upsert_segments(&self, segments: &[CustomerSegment]) -> Result<usize> {
        let mut guard = self.segments.write();
        for segment in segments {
            guard.insert(segment.customer_id, segment.clone());
        }
        Ok(segments.len())
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn create_user(&self, new_user: NewUser) -> Result<User> {
        let email = normalize_email(&new_user.email);
        let mut users = self.users.write();

        if users.by_email.contains_key(&email) {
            return Err(email_taken());
        }
        if users.by_username.contains_key(&new_user.username) {
            return Err(username_taken());
        }

        users.next_id += 1;
        let user = User {
            id: users.next_id,
            email: email.clone(),
            username: new_user.username,
            password_hash: new_user.password_hash,
            created_at: Utc::now(),
        };

        users.by_email.insert(email, user.id);
        users.by_username.insert(user.username.clone(), user.id);
        users.by_id.insert(user.id, user.clone());

        tracing::debug!(user_id = user.id, "User created");
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let users = self.users.read();
        Ok(users
            .by_email
            .get(&normalize_email(email))
            .and_then(|id| users.by_id.get(id))
            .cloned())
    }

    async fn get_user(&self, id: u64) -> Result<Option<User>> {
        Ok(self.users.read().by_id.get(&id).cloned())
    }

    async fn revoke_session(&self, jti: &str, expires_at: DateTime<Utc>) -> Result<()> {
        let now = Utc::now();
        let mut revoked = self.revoked_sessions.write();
        revoked.retain(|_, exp| *exp > now);
        revoked.insert(jti.to_string(), expires_at);
        Ok(())
    }

    async fn is_session_revoked(&self, jti: &str) -> Result<bool> {
        Ok(self
            .revoked_sessions
            .read()
            .get(jti)
            .is_some_and(|exp| *exp > Utc::now()))
    }
}
