use super::{
    NewUser, OtpRecord, OtpStore, SessionContext, SessionData, SessionStore, User, UserStore,
    utc_from_micros,
};
use crate::entity::{otp_codes, sessions, users};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sea_orm::sea_query::{Expr, ExprTrait, OnConflict};
use sea_orm::*;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

const DB_FILE: &str = "goldblog.db";

/// SQLite-backed store. Every call opens a connection on the blocking pool.
pub struct Db {
    db_url: String,
}

impl Db {
    pub async fn new(data_dir: &Path) -> Result<Arc<Self>> {
        let db_path = data_dir.join(DB_FILE);
        std::fs::create_dir_all(data_dir)?;
        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        tokio::task::spawn_blocking({
            let db_url = db_url.clone();
            move || -> Result<()> {
                let db = Database::connect(&db_url)?;

                db.get_schema_builder()
                    .register(users::Entity)
                    .register(otp_codes::Entity)
                    .register(sessions::Entity)
                    .apply(&db)?;

                Ok(())
            }
        })
        .await??;

        info!("Database ready ({})", db_path.display());
        Ok(Arc::new(Self { db_url }))
    }

    async fn run<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&DatabaseConnection) -> Result<T> + Send + 'static,
    {
        let db_url = self.db_url.clone();
        tokio::task::spawn_blocking(move || -> Result<T> {
            let db = Database::connect(&db_url)?;
            op(&db)
        })
        .await
        .context("Database task panicked")?
    }
}

impl From<users::Model> for User {
    fn from(m: users::Model) -> Self {
        Self {
            id: m.id,
            username: m.username,
            email: m.email,
            password_hash: m.password_hash,
            is_active: m.is_active,
            date_joined: utc_from_micros(m.date_joined_us),
        }
    }
}

impl From<otp_codes::Model> for OtpRecord {
    fn from(m: otp_codes::Model) -> Self {
        Self {
            user_id: m.user_id,
            code_hash: m.code_hash,
            expires_at: utc_from_micros(m.expires_at_us),
            attempts: m.attempts,
            last_sent_at: m.last_sent_at_us.map(utc_from_micros),
        }
    }
}

#[async_trait]
impl UserStore for Db {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        self.run(move |db| {
            let record = users::ActiveModel {
                id: NotSet,
                username: Set(user.username),
                email: Set(user.email),
                password_hash: Set(user.password_hash),
                is_active: Set(false),
                date_joined_us: Set(user.date_joined.timestamp_micros()),
            };
            let model = record.insert(db)?;
            Ok(model.into())
        })
        .await
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>> {
        self.run(move |db| Ok(users::Entity::find_by_id(id).one(db)?.map(User::from)))
            .await
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let username = username.to_string();
        self.run(move |db| {
            let row = users::Entity::find()
                .filter(users::Column::Username.eq(&username))
                .one(db)?;
            Ok(row.map(User::from))
        })
        .await
    }

    async fn email_in_use(&self, email: &str) -> Result<bool> {
        let email = email.to_string();
        self.run(move |db| {
            let row = users::Entity::find()
                .filter(users::Column::Email.eq(&email))
                .one(db)?;
            Ok(row.is_some())
        })
        .await
    }

    async fn activate_user(&self, id: i64) -> Result<()> {
        self.run(move |db| {
            let model = users::Entity::find_by_id(id)
                .one(db)?
                .with_context(|| format!("User {} not found", id))?;
            let mut record: users::ActiveModel = model.into();
            record.is_active = Set(true);
            record.update(db)?;
            Ok(())
        })
        .await
    }

    async fn delete_user(&self, id: i64) -> Result<()> {
        self.run(move |db| {
            otp_codes::Entity::delete_many()
                .filter(otp_codes::Column::UserId.eq(id))
                .exec(db)?;
            users::Entity::delete_many()
                .filter(users::Column::Id.eq(id))
                .exec(db)?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl OtpStore for Db {
    async fn get_otp(&self, user_id: i64) -> Result<Option<OtpRecord>> {
        self.run(move |db| {
            Ok(otp_codes::Entity::find_by_id(user_id)
                .one(db)?
                .map(OtpRecord::from))
        })
        .await
    }

    async fn put_otp(&self, record: &OtpRecord) -> Result<()> {
        let record = record.clone();
        self.run(move |db| {
            let active = otp_codes::ActiveModel {
                user_id: Set(record.user_id),
                code_hash: Set(record.code_hash),
                expires_at_us: Set(record.expires_at.timestamp_micros()),
                attempts: Set(record.attempts),
                last_sent_at_us: Set(record.last_sent_at.map(|t| t.timestamp_micros())),
            };
            otp_codes::Entity::insert(active)
                .on_conflict(
                    OnConflict::column(otp_codes::Column::UserId)
                        .update_columns([
                            otp_codes::Column::CodeHash,
                            otp_codes::Column::ExpiresAtUs,
                            otp_codes::Column::Attempts,
                            otp_codes::Column::LastSentAtUs,
                        ])
                        .to_owned(),
                )
                .exec_without_returning(db)?;
            Ok(())
        })
        .await
    }

    async fn record_failed_attempt(&self, user_id: i64) -> Result<()> {
        self.run(move |db| {
            otp_codes::Entity::update_many()
                .col_expr(
                    otp_codes::Column::Attempts,
                    Expr::col(otp_codes::Column::Attempts).add(1),
                )
                .filter(otp_codes::Column::UserId.eq(user_id))
                .exec(db)?;
            Ok(())
        })
        .await
    }

    async fn delete_otp(&self, user_id: i64) -> Result<()> {
        self.run(move |db| {
            otp_codes::Entity::delete_many()
                .filter(otp_codes::Column::UserId.eq(user_id))
                .exec(db)?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl SessionStore for Db {
    async fn load_session(&self, id: &str) -> Result<Option<SessionData>> {
        let id = id.to_string();
        self.run(move |db| {
            let Some(row) = sessions::Entity::find_by_id(id).one(db)? else {
                return Ok(None);
            };
            let data = serde_json::from_str(&row.data).context("Corrupt session payload")?;
            Ok(Some(data))
        })
        .await
    }

    async fn save_session(&self, session: &SessionContext) -> Result<()> {
        let id = session.id.clone();
        let data = serde_json::to_string(&session.data)?;
        self.run(move |db| {
            let active = sessions::ActiveModel {
                id: Set(id),
                data: Set(data),
                updated_at_us: Set(chrono::Utc::now().timestamp_micros()),
            };
            sessions::Entity::insert(active)
                .on_conflict(
                    OnConflict::column(sessions::Column::Id)
                        .update_columns([sessions::Column::Data, sessions::Column::UpdatedAtUs])
                        .to_owned(),
                )
                .exec_without_returning(db)?;
            Ok(())
        })
        .await
    }

    async fn delete_session(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.run(move |db| {
            sessions::Entity::delete_many()
                .filter(sessions::Column::Id.eq(id))
                .exec(db)?;
            Ok(())
        })
        .await
    }
}
