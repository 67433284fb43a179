use crate::error::{AppError, Result};
use crate::models::{CustomerSegment, NewUser, User};
use crate::state::store::{email_taken, normalize_email, username_taken};
use crate::state::{SegmentStore, UserStore};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sled::transaction::{ConflictableTransactionError, TransactionError, Transactional};
use sled::Db;
use std::path::Path;
use std::sync::Arc;

pub const SEGMENTS_TREE: &str = "segments";
pub const USERS_TREE: &str = "users";
pub const USER_EMAILS_TREE: &str = "user_emails";
pub const USERNAMES_TREE: &str = "usernames";
pub const REVOKED_SESSIONS_TREE: &str = "revoked_sessions";

/// Persistent store using Sled embedded database
#[derive(Clone)]
pub struct SledStore {
    db: Arc<Db>,
    segments_tree: sled::Tree,
    users_tree: sled::Tree,
    user_emails_tree: sled::Tree,
    usernames_tree: sled::Tree,
    revoked_sessions_tree: sled::Tree,
}

impl SledStore {
    /// Open (or create) a Sled store at the specified path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let db = sled::open(path).map_err(|e| {
            AppError::Database(format!("Failed to open Sled database: {}", e))
        })?;

        let open = |name: &str| {
            db.open_tree(name).map_err(|e| {
                AppError::Database(format!("Failed to open {} tree: {}", name, e))
            })
        };

        let segments_tree = open(SEGMENTS_TREE)?;
        let users_tree = open(USERS_TREE)?;
        let user_emails_tree = open(USER_EMAILS_TREE)?;
        let usernames_tree = open(USERNAMES_TREE)?;
        let revoked_sessions_tree = open(REVOKED_SESSIONS_TREE)?;

        tracing::info!("Initialized Sled store at {:?}", path);

        Ok(Self {
            db: Arc::new(db),
            segments_tree,
            users_tree,
            user_emails_tree,
            usernames_tree,
            revoked_sessions_tree,
        })
    }

    /// Segment key; the sign bit is flipped so byte order matches numeric order
    fn segment_key(customer_id: i64) -> [u8; 8] {
        ((customer_id as u64) ^ (1 << 63)).to_be_bytes()
    }

    fn user_key(id: u64) -> [u8; 8] {
        id.to_be_bytes()
    }

    fn decode_id(bytes: &[u8]) -> Result<u64> {
        let raw: [u8; 8] = bytes
            .try_into()
            .map_err(|_| AppError::Database("Corrupt user index entry".to_string()))?;
        Ok(u64::from_be_bytes(raw))
    }

    fn decode_timestamp(bytes: &[u8]) -> Result<DateTime<Utc>> {
        let raw: [u8; 8] = bytes
            .try_into()
            .map_err(|_| AppError::Database("Corrupt session entry".to_string()))?;
        Utc.timestamp_opt(i64::from_be_bytes(raw), 0)
            .single()
            .ok_or_else(|| AppError::Database("Invalid session expiry".to_string()))
    }

    /// Names and entry counts of every tree
    pub fn tree_stats(&self) -> Vec<(&'static str, usize)> {
        vec![
            (SEGMENTS_TREE, self.segments_tree.len()),
            (USERS_TREE, self.users_tree.len()),
            (USER_EMAILS_TREE, self.user_emails_tree.len()),
            (USERNAMES_TREE, self.usernames_tree.len()),
            (REVOKED_SESSIONS_TREE, self.revoked_sessions_tree.len()),
        ]
    }

    /// Drop revoked-session entries whose tokens have expired
    pub fn purge_expired_sessions(&self) -> Result<usize> {
        let now = Utc::now();
        let mut purged = 0;
        for entry in self.revoked_sessions_tree.iter() {
            let (key, value) = entry?;
            if Self::decode_timestamp(&value)? <= now {
                self.revoked_sessions_tree.remove(key)?;
                purged += 1;
            }
        }
        Ok(purged)
    }

    /// Flush pending writes to disk
    pub async fn flush(&self) -> Result<()> {
        self.db.flush_async().await.map_err(|e| {
            AppError::Database(format!("Failed to flush database: {}", e))
        })?;
        Ok(())
    }

    /// Get database size in bytes
    pub fn size_on_disk(&self) -> Result<u64> {
        self.db.size_on_disk().map_err(|e| {
            AppError::Database(format!("Failed to get database size: {}", e))
        })
    }
}

#[async_trait]
impl SegmentStore for SledStore {
    async fn list_segments(&self) -> Result<Vec<CustomerSegment>> {
        self.segments_tree
            .iter()
            .values()
            .map(|value| -> Result<CustomerSegment> { Ok(bincode::deserialize(&value?)?) })
            .collect()
    }

    async fn upsert_segment(&self, segment: &CustomerSegment) -> Result<()> {
        let bytes = bincode::serialize(segment)?;
        self.segments_tree
            .insert(Self::segment_key(segment.customer_id), bytes)?;
        tracing::debug!(customer_id = segment.customer_id, "Segment saved");
        Ok(())
    }

    async fn upsert_segments(&self, segments: &[CustomerSegment]) -> Result<usize> {
        let mut batch = sled::Batch::default();
        for segment in segments {
            batch.insert(
                &Self::segment_key(segment.customer_id)[..],
                bincode::serialize(segment)?,
            );
        }
        self.segments_tree.apply_batch(batch)?;
        self.segments_tree.flush_async().await?;

        tracing::info!(count = segments.len(), "Segments upserted");
        Ok(segments.len())
    }
}

#[async_trait]
impl UserStore for SledStore {
    async fn create_user(&self, new_user: NewUser) -> Result<User> {
        let email = normalize_email(&new_user.email);
        let user = User {
            id: self.db.generate_id()? + 1,
            email,
            username: new_user.username,
            password_hash: new_user.password_hash,
            created_at: Utc::now(),
        };
        let bytes = bincode::serialize(&user)?;
        let key = Self::user_key(user.id);

        let result = (
            &self.users_tree,
            &self.user_emails_tree,
            &self.usernames_tree,
        )
            .transaction(|(users, emails, names)| {
                if emails.get(user.email.as_bytes())?.is_some() {
                    return Err(ConflictableTransactionError::Abort(email_taken()));
                }
                if names.get(user.username.as_bytes())?.is_some() {
                    return Err(ConflictableTransactionError::Abort(username_taken()));
                }

                users.insert(&key[..], bytes.as_slice())?;
                emails.insert(user.email.as_bytes(), &key[..])?;
                names.insert(user.username.as_bytes(), &key[..])?;
                Ok(())
            });

        match result {
            Ok(()) => {
                self.users_tree.flush_async().await?;
                tracing::debug!(user_id = user.id, "User created");
                Ok(user)
            }
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(e.into()),
        }
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        match self
            .user_emails_tree
            .get(normalize_email(email).as_bytes())?
        {
            Some(id) => self.get_user(Self::decode_id(&id)?).await,
            None => Ok(None),
        }
    }

    async fn get_user(&self, id: u64) -> Result<Option<User>> {
        match self.users_tree.get(Self::user_key(id))? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn revoke_session(&self, jti: &str, expires_at: DateTime<Utc>) -> Result<()> {
        self.revoked_sessions_tree
            .insert(jti.as_bytes(), &expires_at.timestamp().to_be_bytes()[..])?;
        self.purge_expired_sessions()?;
        self.revoked_sessions_tree.flush_async().await?;
        Ok(())
    }

    async fn is_session_revoked(&self, jti: &str) -> Result<bool> {
        match self.revoked_sessions_tree.get(jti.as_bytes())? {
            Some(exp) => Ok(Self::decode_timestamp(&exp)? > Utc::now()),
            None => Ok(false),
        }
    }
}
