//! Email one-time passcodes for pending registrations.
//!
//! A record moves `NoOtp -> Issued -> (Verified | Expired | AttemptsExhausted)`
//! and goes back to `Issued` on resend. Only the argon2 hash of a code is
//! stored; the plaintext exists in memory just long enough to be mailed.

mod error;

use crate::clock::Clock;
use crate::config::OtpPolicy;
use crate::crypto;
use crate::mailer::Mailer;
use crate::store::{OtpRecord, OtpStore, User, UserStore};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

pub use error::OtpError;

const EMAIL_SUBJECT: &str = "Verify your email";

pub struct OtpService {
    otps: Arc<dyn OtpStore>,
    users: Arc<dyn UserStore>,
    mailer: Arc<dyn Mailer>,
    clock: Arc<dyn Clock>,
    policy: OtpPolicy,
}

impl OtpService {
    pub fn new(
        otps: Arc<dyn OtpStore>,
        users: Arc<dyn UserStore>,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
        policy: OtpPolicy,
    ) -> Self {
        Self {
            otps,
            users,
            mailer,
            clock,
            policy,
        }
    }

    /// Stores a fresh code for `user` and mails it. If the mail cannot be
    /// sent the previous record (or its absence) is put back.
    pub async fn issue(&self, user: &User) -> Result<(), OtpError> {
        let previous = self.otps.get_otp(user.id).await?;
        self.send_new_code(user, previous).await
    }

    pub async fn verify(&self, user_id: i64, submitted: &str) -> Result<(), OtpError> {
        let record = self
            .otps
            .get_otp(user_id)
            .await?
            .ok_or(OtpError::NotFound)?;

        if self.clock.now() > record.expires_at {
            return Err(OtpError::Expired);
        }
        if record.attempts >= self.policy.max_attempts {
            return Err(OtpError::AttemptsExhausted);
        }

        if !crypto::verify_secret(submitted, &record.code_hash)? {
            self.otps.record_failed_attempt(user_id).await?;
            warn!(
                "Wrong verification code for user {} (attempt {})",
                user_id,
                record.attempts + 1
            );
            return Err(OtpError::InvalidCode);
        }

        self.users.activate_user(user_id).await?;
        self.otps.delete_otp(user_id).await?;
        info!("User {} verified their email", user_id);
        Ok(())
    }

    pub async fn resend(&self, user: &User) -> Result<(), OtpError> {
        let previous = self.otps.get_otp(user.id).await?;

        if let Some(record) = &previous {
            let remaining = self.cooldown_remaining(record.last_sent_at);
            if remaining > 0 {
                return Err(OtpError::Cooldown(remaining));
            }
        }

        self.send_new_code(user, previous).await
    }

    /// Whole seconds left before another send is allowed, rounded up.
    pub fn cooldown_remaining(&self, last_sent_at: Option<DateTime<Utc>>) -> u64 {
        let Some(last_sent_at) = last_sent_at else {
            return 0;
        };
        let remaining = last_sent_at + self.policy.resend_cooldown - self.clock.now();
        let millis = remaining.num_milliseconds();
        if millis <= 0 {
            0
        } else {
            (millis as u64).div_ceil(1000)
        }
    }

    async fn send_new_code(
        &self,
        user: &User,
        previous: Option<OtpRecord>,
    ) -> Result<(), OtpError> {
        let code = crypto::generate_otp_code();
        let now = self.clock.now();
        let record = OtpRecord {
            user_id: user.id,
            code_hash: crypto::hash_secret(&code)?,
            expires_at: now + self.policy.ttl,
            attempts: 0,
            last_sent_at: Some(now),
        };
        self.otps.put_otp(&record).await?;

        let body = format!(
            "Hi {},\n\nYour verification code is {}.\nIt expires in {} minutes.\n",
            user.username,
            code,
            self.policy.ttl.num_minutes()
        );

        if let Err(e) = self.mailer.send(&user.email, EMAIL_SUBJECT, &body).await {
            warn!("Verification email to user {} failed: {:#}", user.id, e);
            match previous {
                Some(previous) => self.otps.put_otp(&previous).await?,
                None => self.otps.delete_otp(user.id).await?,
            }
            return Err(OtpError::EmailDelivery);
        }

        info!("Verification code sent to user {}", user.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::mailer::testing::RecordingMailer;
    use crate::store::{MemoryStore, NewUser};
    use chrono::TimeDelta;

    struct Fixture {
        store: Arc<MemoryStore>,
        mailer: Arc<RecordingMailer>,
        clock: Arc<ManualClock>,
        service: OtpService,
        user: User,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let mailer = Arc::new(RecordingMailer::new());
        let clock = Arc::new(ManualClock::new());
        let service = OtpService::new(
            store.clone(),
            store.clone(),
            mailer.clone(),
            clock.clone(),
            OtpPolicy::default(),
        );
        let user = store
            .create_user(NewUser {
                username: "reader".to_string(),
                email: "reader@example.com".to_string(),
                password_hash: "x".to_string(),
                date_joined: clock.now(),
            })
            .await
            .unwrap();
        Fixture {
            store,
            mailer,
            clock,
            service,
            user,
        }
    }

    fn wrong_code(code: &str) -> String {
        let n: u32 = code.parse().unwrap();
        format!("{:06}", (n + 1) % 1_000_000)
    }

    #[tokio::test]
    async fn issue_stores_hash_and_mails_plaintext() {
        let f = fixture().await;
        f.service.issue(&f.user).await.unwrap();

        let sent = f.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "reader@example.com");
        let code = f.mailer.last_code().unwrap();

        let record = f.store.get_otp(f.user.id).await.unwrap().unwrap();
        assert!(!record.code_hash.contains(&code));
        assert_eq!(record.attempts, 0);
        assert_eq!(record.last_sent_at, Some(f.clock.now()));
        assert_eq!(record.expires_at, f.clock.now() + TimeDelta::minutes(10));
    }

    #[tokio::test]
    async fn correct_code_succeeds_exactly_once() {
        let f = fixture().await;
        f.service.issue(&f.user).await.unwrap();
        let code = f.mailer.last_code().unwrap();

        f.service.verify(f.user.id, &code).await.unwrap();
        assert!(f.store.get_otp(f.user.id).await.unwrap().is_none());
        assert!(f.store.find_user(f.user.id).await.unwrap().unwrap().is_active);

        let again = f.service.verify(f.user.id, &code).await;
        assert!(matches!(again, Err(OtpError::NotFound)));
    }

    #[tokio::test]
    async fn wrong_code_only_bumps_attempts() {
        let f = fixture().await;
        f.service.issue(&f.user).await.unwrap();
        let code = f.mailer.last_code().unwrap();
        let before = f.store.get_otp(f.user.id).await.unwrap().unwrap();

        let result = f.service.verify(f.user.id, &wrong_code(&code)).await;
        assert!(matches!(result, Err(OtpError::InvalidCode)));

        let after = f.store.get_otp(f.user.id).await.unwrap().unwrap();
        assert_eq!(after.attempts, before.attempts + 1);
        assert_eq!(after.code_hash, before.code_hash);
        assert_eq!(after.expires_at, before.expires_at);
        assert!(!f.store.find_user(f.user.id).await.unwrap().unwrap().is_active);
    }

    #[tokio::test]
    async fn attempts_cap_blocks_even_the_right_code() {
        let f = fixture().await;
        f.service.issue(&f.user).await.unwrap();
        let code = f.mailer.last_code().unwrap();

        for _ in 0..5 {
            let result = f.service.verify(f.user.id, &wrong_code(&code)).await;
            assert!(matches!(result, Err(OtpError::InvalidCode)));
        }

        let result = f.service.verify(f.user.id, &code).await;
        assert!(matches!(result, Err(OtpError::AttemptsExhausted)));
        let result = f.service.verify(f.user.id, &wrong_code(&code)).await;
        assert!(matches!(result, Err(OtpError::AttemptsExhausted)));

        let record = f.store.get_otp(f.user.id).await.unwrap().unwrap();
        assert_eq!(record.attempts, 5);
    }

    #[tokio::test]
    async fn expired_code_is_rejected_without_counting() {
        let f = fixture().await;
        f.service.issue(&f.user).await.unwrap();
        let code = f.mailer.last_code().unwrap();

        f.clock.advance(TimeDelta::minutes(10) + TimeDelta::seconds(1));
        let result = f.service.verify(f.user.id, &code).await;
        assert!(matches!(result, Err(OtpError::Expired)));
        assert_eq!(
            f.store.get_otp(f.user.id).await.unwrap().unwrap().attempts,
            0
        );
    }

    #[tokio::test]
    async fn resend_within_cooldown_changes_nothing() {
        let f = fixture().await;
        f.service.issue(&f.user).await.unwrap();
        let before = f.store.get_otp(f.user.id).await.unwrap().unwrap();

        f.clock.advance(TimeDelta::seconds(15));
        match f.service.resend(&f.user).await {
            Err(OtpError::Cooldown(r)) => assert!(r > 0 && r <= 60, "remaining = {r}"),
            other => panic!("expected cooldown, got {other:?}"),
        }

        assert_eq!(f.store.get_otp(f.user.id).await.unwrap().unwrap(), before);
        assert_eq!(f.mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn back_to_back_resend_reports_full_cooldown() {
        let f = fixture().await;
        f.service.resend(&f.user).await.unwrap();
        match f.service.resend(&f.user).await {
            Err(OtpError::Cooldown(r)) => assert_eq!(r, 60),
            other => panic!("expected cooldown, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn resend_after_cooldown_resets_attempts_and_code() {
        let f = fixture().await;
        f.service.issue(&f.user).await.unwrap();
        let first_code = f.mailer.last_code().unwrap();
        for _ in 0..4 {
            let _ = f.service.verify(f.user.id, &wrong_code(&first_code)).await;
        }
        let before = f.store.get_otp(f.user.id).await.unwrap().unwrap();
        assert_eq!(before.attempts, 4);

        f.clock.advance(TimeDelta::seconds(61));
        f.service.resend(&f.user).await.unwrap();

        let after = f.store.get_otp(f.user.id).await.unwrap().unwrap();
        assert_eq!(after.attempts, 0);
        assert_ne!(after.code_hash, before.code_hash);
        assert!(after.expires_at > before.expires_at);
        assert_eq!(f.mailer.sent().len(), 2);

        let new_code = f.mailer.last_code().unwrap();
        f.service.verify(f.user.id, &new_code).await.unwrap();
    }

    #[tokio::test]
    async fn failed_send_leaves_no_record_behind() {
        let f = fixture().await;
        f.mailer.set_failing(true);

        let result = f.service.issue(&f.user).await;
        assert!(matches!(result, Err(OtpError::EmailDelivery)));
        assert!(f.store.get_otp(f.user.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_resend_restores_previous_record() {
        let f = fixture().await;
        f.service.issue(&f.user).await.unwrap();
        let code = f.mailer.last_code().unwrap();
        let before = f.store.get_otp(f.user.id).await.unwrap().unwrap();

        f.clock.advance(TimeDelta::seconds(61));
        f.mailer.set_failing(true);
        let result = f.service.resend(&f.user).await;
        assert!(matches!(result, Err(OtpError::EmailDelivery)));
        assert_eq!(f.store.get_otp(f.user.id).await.unwrap().unwrap(), before);

        f.mailer.set_failing(false);
        f.service.verify(f.user.id, &code).await.unwrap();
    }
}
