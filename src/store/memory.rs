use super::{
    NewUser, OtpRecord, OtpStore, SessionContext, SessionData, SessionStore, User, UserStore,
};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct Inner {
    next_id: i64,
    users: HashMap<i64, User>,
    otps: HashMap<i64, OtpRecord>,
    sessions: HashMap<String, SessionData>,
}

/// In-process stand-in for `Db`.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_count(&self) -> usize {
        self.inner.lock().unwrap().users.len()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let user = User {
            id: inner.next_id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            is_active: false,
            date_joined: user.date_joined,
        };
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>> {
        Ok(self.inner.lock().unwrap().users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn email_in_use(&self, email: &str) -> Result<bool> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.values().any(|u| u.email == email))
    }

    async fn activate_user(&self, id: i64) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let user = inner
            .users
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("User {} not found", id))?;
        user.is_active = true;
        Ok(())
    }

    async fn delete_user(&self, id: i64) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.otps.remove(&id);
        inner.users.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl OtpStore for MemoryStore {
    async fn get_otp(&self, user_id: i64) -> Result<Option<OtpRecord>> {
        Ok(self.inner.lock().unwrap().otps.get(&user_id).cloned())
    }

    async fn put_otp(&self, record: &OtpRecord) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.otps.insert(record.user_id, record.clone());
        Ok(())
    }

    async fn record_failed_attempt(&self, user_id: i64) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(record) = inner.otps.get_mut(&user_id) {
            record.attempts += 1;
        }
        Ok(())
    }

    async fn delete_otp(&self, user_id: i64) -> Result<()> {
        self.inner.lock().unwrap().otps.remove(&user_id);
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load_session(&self, id: &str) -> Result<Option<SessionData>> {
        Ok(self.inner.lock().unwrap().sessions.get(id).cloned())
    }

    async fn save_session(&self, session: &SessionContext) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .sessions
            .insert(session.id.clone(), session.data.clone());
        Ok(())
    }

    async fn delete_session(&self, id: &str) -> Result<()> {
        self.inner.lock().unwrap().sessions.remove(id);
        Ok(())
    }
}
