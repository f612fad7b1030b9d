//! Core domain types shared by the repository, content assembler,
//! renderer and orchestrator.
//!
//! Grounded on `original_source/app/services/digest_repo.py` and
//! `digest_content.py`, which operate on loosely-typed dicts; here each
//! shape gets a real type per §3.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Policy applied when a user had no qualifying activity in the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoActivityPolicy {
    /// Don't send anything; record as `Skipped`.
    Skip,
    /// Send a short "nothing new this week" email.
    Brief,
    /// Send an email made entirely of suggestions to engage.
    Suggestions,
}

impl Default for NoActivityPolicy {
    fn default() -> Self {
        NoActivityPolicy::Brief
    }
}

/// A user's weekly digest preferences (`UserPreference` in §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPreference {
    pub user_id: Uuid,
    pub weekly_digest_enabled: bool,
    pub timezone: String,
    pub preferred_day: u32,
    pub preferred_hour: u32,
    pub week_start_day: u32,
    pub no_activity_policy: NoActivityPolicy,
    pub unsubscribe_token: Option<String>,
}

/// Minimal profile information needed to address and greet a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
}

/// One piece of content a user created or touched in the window.
///
/// Covers both variants §3 describes (`Insight` and `Stack`) in one shape
/// rather than an enum-with-payload, since the Content Assembler scores
/// and sections items by `kind` rather than by distinct Rust types;
/// `image_url`/`thought` are Insight-only and `item_count` is Stack-only,
/// left `None` on the other kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityItem {
    pub id: Uuid,
    pub kind: ActivityKind,
    pub title: Option<String>,
    pub description: Option<String>,
    pub summary: Option<String>,
    pub url: Option<String>,
    pub image_url: Option<String>,
    pub thought: Option<String>,
    pub tags: Vec<String>,
    pub item_count: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Insight,
    Stack,
}

/// Status of a queued or processed digest, forming the DAG in I1-I5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DigestStatus {
    Queued,
    Rendered,
    Sent,
    Failed,
    Skipped,
}

/// Persisted record of one user's digest for one week (`DigestRecord`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub week_start: NaiveDate,
    pub status: DigestStatus,
    pub message_id: Option<String>,
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub payload: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

/// Inbound event types recovered from `webhook_handler.py`'s event switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailEventType {
    /// Written by the Dispatcher at send time, not by the webhook ingestor.
    Sent,
    Delivered,
    Opened,
    Clicked,
    Bounced,
    Spam,
    Unsubscribed,
    Blocked,
    Suppressed,
}

/// A recorded email-provider event, keyed back to a digest via `message_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailEvent {
    pub id: Uuid,
    pub digest_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub message_id: String,
    pub event_type: EmailEventType,
    pub recipient_email: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub raw: Option<serde_json::Value>,
}

/// A one-time unsubscribe token bound to a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnsubscribeToken {
    pub token: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionReason {
    Unsubscribed,
    Bounced,
    MarkedSpam,
    Blocked,
    /// Operator-added, or added in response to an explicit `suppressed`
    /// webhook event that doesn't map to a bounce/complaint/unsubscribe.
    Manual,
}

/// An address that must never receive another digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuppressionEntry {
    pub email: String,
    pub user_id: Option<Uuid>,
    pub reason: SuppressionReason,
    pub created_at: DateTime<Utc>,
}

/// Aggregate send-event counts over a trailing window, recovered from
/// `digest_repo.py`'s `get_digest_stats`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DigestStats {
    pub since: DateTime<Utc>,
    pub queued: u64,
    pub sent: u64,
    pub failed: u64,
    pub skipped: u64,
    pub event_counts: std::collections::HashMap<String, u64>,
}
