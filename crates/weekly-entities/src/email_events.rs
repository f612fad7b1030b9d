//! Email events entity — inbound webhook events keyed to a digest send

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "email_events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub digest_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub message_id: String,
    pub event_type: String,
    pub recipient_email: Option<String>,
    pub occurred_at: DateTimeUtc,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub raw: Option<Json>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::email_digests::Entity",
        from = "Column::DigestId",
        to = "super::email_digests::Column::Id"
    )]
    EmailDigest,
}

impl Related<super::email_digests::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EmailDigest.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
