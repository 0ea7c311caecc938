//! Registration, email verification and login on top of the OTP service.

mod form;

use crate::clock::Clock;
use crate::crypto;
use crate::otp::{OtpError, OtpService};
use crate::store::{NewUser, SessionContext, SessionData, SessionStore, User, UserStore};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

pub use form::{FieldErrors, LoginForm, RegistrationForm, VerifyForm};

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Please correct the errors below.")]
    Validation(FieldErrors),
    #[error("No registration is waiting for email verification.")]
    NoPendingRegistration,
    #[error("Invalid username or password.")]
    InvalidCredentials,
    #[error(transparent)]
    Otp(#[from] OtpError),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl From<FieldErrors> for AccountError {
    fn from(errors: FieldErrors) -> Self {
        AccountError::Validation(errors)
    }
}

pub struct AccountService {
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
    otp: OtpService,
    clock: Arc<dyn Clock>,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
        otp: OtpService,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            sessions,
            otp,
            clock,
        }
    }

    /// Creates an inactive user and mails them a code. If the mail cannot be
    /// delivered the user is removed again so the registration can be retried.
    pub async fn register(
        &self,
        session: &mut SessionContext,
        form: RegistrationForm,
    ) -> Result<User, AccountError> {
        let form = form.normalized();
        form.check()?;

        let mut taken = FieldErrors::default();
        if self.users.find_user_by_username(&form.username).await?.is_some() {
            taken.add("username", "A user with that username already exists.");
        }
        if self.users.email_in_use(&form.email).await? {
            taken.add("email", "A user with that email already exists.");
        }
        taken.into_result()?;

        let user = self
            .users
            .create_user(NewUser {
                username: form.username,
                email: form.email,
                password_hash: crypto::hash_secret(&form.password)?,
                date_joined: self.clock.now(),
            })
            .await?;

        if let Err(e) = self.otp.issue(&user).await {
            if let Err(cleanup) = self.users.delete_user(user.id).await {
                error!(
                    "Failed to roll back registration of user {}: {:#}",
                    user.id, cleanup
                );
            }
            return Err(e.into());
        }

        session.data.pending_user_id = Some(user.id);
        self.sessions.save_session(session).await?;
        info!("Registered user {} pending email verification", user.id);
        Ok(user)
    }

    pub async fn verify_email(
        &self,
        session: &mut SessionContext,
        form: VerifyForm,
    ) -> Result<User, AccountError> {
        let code = form.check()?;
        let user_id = session
            .data
            .pending_user_id
            .ok_or(AccountError::NoPendingRegistration)?;

        self.otp.verify(user_id, &code).await?;

        self.sign_in(session, user_id).await?;

        self.users
            .find_user(user_id)
            .await?
            .ok_or(AccountError::NoPendingRegistration)
    }

    pub async fn resend_code(&self, session: &SessionContext) -> Result<(), AccountError> {
        let user_id = session
            .data
            .pending_user_id
            .ok_or(AccountError::NoPendingRegistration)?;
        let user = match self.users.find_user(user_id).await? {
            Some(user) if !user.is_active => user,
            _ => return Err(AccountError::NoPendingRegistration),
        };

        self.otp.resend(&user).await?;
        Ok(())
    }

    pub async fn login(
        &self,
        session: &mut SessionContext,
        form: LoginForm,
    ) -> Result<User, AccountError> {
        let user = self
            .users
            .find_user_by_username(form.username.trim())
            .await?
            .filter(|u| u.is_active)
            .ok_or(AccountError::InvalidCredentials)?;

        if !crypto::verify_secret(&form.password, &user.password_hash)? {
            return Err(AccountError::InvalidCredentials);
        }

        self.sign_in(session, user.id).await?;
        info!("User {} logged in", user.id);
        Ok(user)
    }

    /// Marks the session authenticated and moves it to a new id. The old id
    /// stops resolving.
    async fn sign_in(&self, session: &mut SessionContext, user_id: i64) -> anyhow::Result<()> {
        session.data.pending_user_id = None;
        session.data.user_id = Some(user_id);
        let stale = session.cycle_id();
        self.sessions.save_session(session).await?;
        self.sessions.delete_session(&stale).await
    }

    /// Drops everything held in the session, chat history included.
    pub async fn logout(&self, session: &mut SessionContext) -> Result<(), AccountError> {
        session.data = SessionData::default();
        self.sessions.save_session(session).await?;
        Ok(())
    }
}
