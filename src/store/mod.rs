//! Persistence seams for users, verification codes and browser sessions.
//!
//! The services only talk to the traits below; `Db` backs them with SQLite in
//! production and tests swap in `MemoryStore`.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod db;
#[cfg(test)]
mod memory;

pub use db::Db;
#[cfg(test)]
pub use memory::MemoryStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub date_joined: DateTime<Utc>,
}

/// Hashed verification code for a user that has not confirmed their email yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpRecord {
    pub user_id: i64,
    pub code_hash: String,
    pub expires_at: DateTime<Utc>,
    pub attempts: i32,
    pub last_sent_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub prompt: String,
    pub response: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default)]
    pub pending_user_id: Option<i64>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub llm_history: Vec<ChatTurn>,
}

/// A browser session: its cookie id plus the payload loaded from the store.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub id: String,
    pub data: SessionData,
}

impl SessionContext {
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            data: SessionData::default(),
        }
    }

    /// Moves the session to a fresh id and returns the old one.
    pub fn cycle_id(&mut self) -> String {
        std::mem::replace(&mut self.id, uuid::Uuid::new_v4().to_string())
    }

    pub fn is_authenticated(&self) -> bool {
        self.data.user_id.is_some()
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, user: NewUser) -> Result<User>;
    async fn find_user(&self, id: i64) -> Result<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;
    async fn email_in_use(&self, email: &str) -> Result<bool>;
    async fn activate_user(&self, id: i64) -> Result<()>;
    async fn delete_user(&self, id: i64) -> Result<()>;
}

#[async_trait]
pub trait OtpStore: Send + Sync {
    async fn get_otp(&self, user_id: i64) -> Result<Option<OtpRecord>>;
    /// Inserts or fully overwrites the record for `record.user_id`.
    async fn put_otp(&self, record: &OtpRecord) -> Result<()>;
    async fn record_failed_attempt(&self, user_id: i64) -> Result<()>;
    async fn delete_otp(&self, user_id: i64) -> Result<()>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load_session(&self, id: &str) -> Result<Option<SessionData>>;
    async fn save_session(&self, session: &SessionContext) -> Result<()>;
    async fn delete_session(&self, id: &str) -> Result<()>;
}

pub(crate) fn utc_from_micros(us: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(us).unwrap_or_default()
}
