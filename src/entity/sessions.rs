use sea_orm::entity::prelude::*;

/// One row per browser session; `data` holds the JSON-encoded session payload.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "sessions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(column_type = "Text")]
    pub data: String,
    pub updated_at_us: i64,
}

impl ActiveModelBehavior for ActiveModel {}
