//! The storage capability the orchestrator depends on.
//!
//! Grounded on `original_source/app/services/digest_repo.py`'s module-level
//! functions, folded into a single trait per SPEC_FULL.md §4.2 (the
//! source's duplicated preference-lookup helpers collapse into one
//! operation here, per §9's "multiple redundant helpers" flag).

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;
use weekly_core::model::{
    ActivityItem, DigestRecord, DigestStats, DigestStatus, EmailEventType, NoActivityPolicy,
    SuppressionReason, UserPreference, UserProfile,
};
use weekly_core::WeeklyResult;

/// A user eligible for a digest: their preferences joined with enough of
/// their profile to address them.
#[derive(Debug, Clone)]
pub struct SendableUser {
    pub preference: UserPreference,
    pub profile: UserProfile,
}

/// Partial update to a user's preferences; `None` fields are left
/// untouched.
#[derive(Debug, Clone, Default)]
pub struct PreferenceUpdate {
    pub weekly_digest_enabled: Option<bool>,
    pub timezone: Option<String>,
    pub preferred_day: Option<u32>,
    pub preferred_hour: Option<u32>,
    pub week_start_day: Option<u32>,
    pub no_activity_policy: Option<NoActivityPolicy>,
}

/// Partial update to a digest record. `increment_retry` is a monotonic
/// atomic bump, applied regardless of whether other fields are set.
#[derive(Debug, Clone, Default)]
pub struct DigestUpdate {
    pub status: Option<DigestStatus>,
    pub message_id: Option<String>,
    pub error: Option<String>,
    pub payload: Option<serde_json::Value>,
    pub increment_retry: bool,
}

#[async_trait]
pub trait Repository: Send + Sync {
    /// Users with `weekly_digest_enabled=true`. Users lacking an email are
    /// dropped with a warning, not returned.
    async fn get_sendable_users(&self, now_utc: DateTime<Utc>) -> WeeklyResult<Vec<SendableUser>>;

    async fn get_user_preferences(&self, user_id: Uuid) -> WeeklyResult<Option<UserPreference>>;

    async fn upsert_user_preferences(
        &self,
        user_id: Uuid,
        partial: PreferenceUpdate,
    ) -> WeeklyResult<()>;

    async fn create_default_preferences(&self, user_id: Uuid) -> WeeklyResult<()>;

    async fn get_user_profile(&self, user_id: Uuid) -> WeeklyResult<Option<UserProfile>>;

    /// Items whose `created_at` OR `updated_at` falls in `[start_utc, end_utc)`.
    async fn get_user_activity(
        &self,
        user_id: Uuid,
        start_utc: DateTime<Utc>,
        end_utc: DateTime<Utc>,
    ) -> WeeklyResult<Vec<ActivityItem>>;

    async fn get_digest_by_user_week(
        &self,
        user_id: Uuid,
        week_start: NaiveDate,
    ) -> WeeklyResult<Option<DigestRecord>>;

    /// Atomic on `(user_id, week_start)`; returns the existing record if
    /// one is already present rather than creating a duplicate.
    async fn upsert_digest(
        &self,
        user_id: Uuid,
        week_start: NaiveDate,
        initial_status: DigestStatus,
    ) -> WeeklyResult<DigestRecord>;

    async fn update_digest(&self, id: Uuid, update: DigestUpdate) -> WeeklyResult<()>;

    /// Append-only.
    async fn log_email_event(
        &self,
        message_id: &str,
        event_type: EmailEventType,
        user_id: Option<Uuid>,
        recipient_email: Option<String>,
        meta: Option<serde_json::Value>,
    ) -> WeeklyResult<()>;

    async fn add_suppression(
        &self,
        email: &str,
        user_id: Option<Uuid>,
        reason: SuppressionReason,
    ) -> WeeklyResult<()>;

    async fn is_suppressed(&self, email: &str) -> WeeklyResult<bool>;

    async fn mint_unsubscribe_token(&self, user_id: Uuid) -> WeeklyResult<String>;

    async fn resolve_unsubscribe_token(&self, token: &str) -> WeeklyResult<Option<Uuid>>;

    async fn disable_user_digest(&self, user_id: Uuid) -> WeeklyResult<()>;

    async fn digest_stats(&self, since_utc: DateTime<Utc>) -> WeeklyResult<DigestStats>;

    /// Best-effort reverse lookup used by the Webhook Ingestor to attach a
    /// `user_id` to a provider callback that only carries a `message_id`.
    async fn find_user_id_by_message_id(&self, message_id: &str) -> WeeklyResult<Option<Uuid>>;

    /// Companion lookup used by the Webhook Ingestor to annotate the digest
    /// a BOUNCED/BLOCKED event refers to without changing its status.
    async fn find_digest_id_by_message_id(&self, message_id: &str) -> WeeklyResult<Option<Uuid>>;
}
