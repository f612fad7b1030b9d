//! Email preferences entity (`UserPreference` in the digest domain model)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "email_preferences")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: Uuid,
    pub weekly_digest_enabled: bool,
    pub timezone: String,
    pub preferred_day: i16,
    pub preferred_hour: i16,
    pub week_start_day: i16,
    pub no_activity_policy: String,
    pub unsubscribe_token: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
