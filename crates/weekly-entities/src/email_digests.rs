//! Email digests entity (`DigestRecord` in the digest domain model)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "email_digests")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub week_start: Date,
    pub status: String,
    pub message_id: Option<String>,
    pub retry_count: i32,
    pub last_error: Option<String>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub payload: Option<Json>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub sent_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::email_preferences::Entity",
        from = "Column::UserId",
        to = "super::email_preferences::Column::UserId"
    )]
    EmailPreference,
}

impl Related<super::email_preferences::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EmailPreference.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
