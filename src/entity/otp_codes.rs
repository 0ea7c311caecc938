use sea_orm::entity::prelude::*;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "otp_codes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: i64,
    pub code_hash: String,
    pub expires_at_us: i64,
    pub attempts: i32,
    pub last_sent_at_us: Option<i64>,
}

impl ActiveModelBehavior for ActiveModel {}
