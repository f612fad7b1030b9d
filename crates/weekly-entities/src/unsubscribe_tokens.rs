//! Unsubscribe tokens entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "unsubscribe_tokens")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub token: String,
    pub user_id: Uuid,
    pub created_at: DateTimeUtc,
    pub used_at: Option<DateTimeUtc>,
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
