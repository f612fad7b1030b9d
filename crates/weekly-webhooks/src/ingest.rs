//! Event ingest: resolves a provider callback to a `user_id`/digest, logs it,
//! and applies the state change §4.8 specifies for its event type.

use crate::signature::verify_signature;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;
use weekly_core::model::{EmailEventType, SuppressionReason};
use weekly_database::{DigestUpdate, Repository};

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("payload is not valid JSON: {0}")]
    InvalidPayload(String),

    #[error("payload is missing a required field: {0}")]
    MissingField(&'static str),

    #[error("signature header is required but was not present")]
    MissingSignature,

    #[error("signature verification failed")]
    InvalidSignature,

    #[error(transparent)]
    Repository(#[from] weekly_core::WeeklyError),
}

/// A decoded inbound payload. Corresponds to `webhook_handler.py`'s
/// `payload.get("event")`/`"message-id"`/`"email"`/`"date"` reads; any other
/// keys in the body are preserved in `raw` for `log_email_event`'s `meta`.
#[derive(Debug, Clone)]
pub struct InboundWebhookPayload {
    pub event: String,
    pub message_id: String,
    pub email: Option<String>,
    pub date: Option<String>,
    pub raw: serde_json::Value,
}

impl InboundWebhookPayload {
    fn from_raw(raw: serde_json::Value) -> Result<Self, WebhookError> {
        let event = raw
            .get("event")
            .and_then(|v| v.as_str())
            .ok_or(WebhookError::MissingField("event"))?
            .to_string();
        let message_id = raw
            .get("message-id")
            .and_then(|v| v.as_str())
            .ok_or(WebhookError::MissingField("message-id"))?
            .to_string();
        let email = raw.get("email").and_then(|v| v.as_str()).map(str::to_string);
        let date = raw.get("date").and_then(|v| v.as_str()).map(str::to_string);
        Ok(Self { event, message_id, email, date, raw })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestOutcome {
    /// A recognized event was logged; `state_changed` is true when
    /// suppression or digest state was touched (bounce/complaint/unsub),
    /// false for a plain delivered/opened/clicked log entry.
    Processed { event: EmailEventType, state_changed: bool },
    /// The `event` value did not match a known `EmailEventType`. Accepted
    /// and logged (via `tracing`, not `log_email_event` — the event-log
    /// column is typed), but no state change, matching `_handle_event_type`'s
    /// `else` branch.
    Unhandled { event: String },
}

pub struct WebhookIngestor {
    repo: Arc<dyn Repository>,
    webhook_secret: Option<String>,
}

impl WebhookIngestor {
    pub fn new(repo: Arc<dyn Repository>, webhook_secret: Option<String>) -> Self {
        Self { repo, webhook_secret }
    }

    /// Ingests one webhook call. `signature_header` is the provider's
    /// `sha256=<hex>` header value; `timestamp_header` is the companion
    /// timestamp the signature was computed over. Both are ignored if no
    /// `webhook_secret` was configured — verification is optional per §4.8.
    pub async fn ingest(
        &self,
        raw_body: &str,
        signature_header: Option<&str>,
        timestamp_header: Option<&str>,
    ) -> Result<IngestOutcome, WebhookError> {
        if let Some(secret) = &self.webhook_secret {
            let signature = signature_header.ok_or(WebhookError::MissingSignature)?;
            let timestamp = timestamp_header.unwrap_or_default();
            if !verify_signature(secret, timestamp, raw_body, signature) {
                return Err(WebhookError::InvalidSignature);
            }
        }

        let raw: serde_json::Value =
            serde_json::from_str(raw_body).map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;
        let payload = InboundWebhookPayload::from_raw(raw)?;

        let occurred_at = resolve_occurred_at(payload.date.as_deref());
        let user_id = self.repo.find_user_id_by_message_id(&payload.message_id).await?;

        let Some(event_type) = parse_event_type(&payload.event) else {
            tracing::info!(event = %payload.event, message_id = %payload.message_id, "unhandled webhook event type");
            return Ok(IngestOutcome::Unhandled { event: payload.event });
        };

        let meta = serde_json::json!({
            "email": payload.email,
            "timestamp": payload.date,
            "occurred_at": occurred_at,
            "raw_payload": payload.raw,
        });
        self.repo
            .log_email_event(&payload.message_id, event_type, user_id, payload.email.clone(), Some(meta))
            .await?;

        let state_changed = self.apply_event(event_type, &payload, user_id).await?;
        Ok(IngestOutcome::Processed { event: event_type, state_changed })
    }

    async fn apply_event(
        &self,
        event_type: EmailEventType,
        payload: &InboundWebhookPayload,
        user_id: Option<Uuid>,
    ) -> Result<bool, WebhookError> {
        match event_type {
            // Written by the Dispatcher at send time; never produced by
            // `parse_event_type` since no provider callback reports it.
            EmailEventType::Sent => Ok(false),

            EmailEventType::Delivered | EmailEventType::Opened | EmailEventType::Clicked => Ok(false),

            EmailEventType::Bounced | EmailEventType::Blocked => {
                if let Some(email) = &payload.email {
                    self.repo.add_suppression(email, user_id, SuppressionReason::Bounced).await?;
                }
                self.annotate_digest(&payload.message_id, "bounced").await?;
                Ok(true)
            }

            EmailEventType::Spam => {
                if let Some(email) = &payload.email {
                    self.repo.add_suppression(email, user_id, SuppressionReason::MarkedSpam).await?;
                }
                Ok(true)
            }

            EmailEventType::Unsubscribed => {
                if let Some(email) = &payload.email {
                    self.repo.add_suppression(email, user_id, SuppressionReason::Unsubscribed).await?;
                }
                if let Some(user_id) = user_id {
                    self.repo.disable_user_digest(user_id).await?;
                }
                Ok(true)
            }
        }
    }

    /// Leaves the digest's status untouched (it stays SENT) but records the
    /// bounce as `last_error` so the record carries the annotation the event
    /// is authoritative for, per §4.8.
    async fn annotate_digest(&self, message_id: &str, note: &str) -> Result<(), WebhookError> {
        if let Some(digest_id) = self.repo.find_digest_id_by_message_id(message_id).await? {
            self.repo
                .update_digest(
                    digest_id,
                    DigestUpdate {
                        error: Some(note.to_string()),
                        ..Default::default()
                    },
                )
                .await?;
        }
        Ok(())
    }
}

fn parse_event_type(event: &str) -> Option<EmailEventType> {
    match event {
        "delivered" => Some(EmailEventType::Delivered),
        "opened" => Some(EmailEventType::Opened),
        "clicked" => Some(EmailEventType::Clicked),
        "bounced" => Some(EmailEventType::Bounced),
        "spam" | "complained" | "complaint" => Some(EmailEventType::Spam),
        "unsubscribed" => Some(EmailEventType::Unsubscribed),
        "blocked" => Some(EmailEventType::Blocked),
        _ => None,
    }
}

fn resolve_occurred_at(date: Option<&str>) -> DateTime<Utc> {
    date.and_then(|d| DateTime::parse_from_rfc3339(d).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use weekly_core::model::{ActivityItem, DigestRecord, DigestStats, DigestStatus, UserPreference, UserProfile};
    use weekly_core::WeeklyResult;
    use weekly_database::{PreferenceUpdate, SendableUser};

    #[derive(Default)]
    struct FakeRepo {
        suppressions: Mutex<Vec<(String, SuppressionReason)>>,
        disabled: Mutex<Vec<Uuid>>,
        logged: Mutex<Vec<(String, EmailEventType)>>,
        user_for_message: Option<Uuid>,
        digest_for_message: Option<Uuid>,
        digest_updates: Mutex<Vec<DigestUpdate>>,
    }

    #[async_trait]
    impl Repository for FakeRepo {
        async fn get_sendable_users(&self, _now_utc: DateTime<Utc>) -> WeeklyResult<Vec<SendableUser>> {
            Ok(vec![])
        }
        async fn get_user_preferences(&self, _user_id: Uuid) -> WeeklyResult<Option<UserPreference>> {
            Ok(None)
        }
        async fn upsert_user_preferences(&self, _user_id: Uuid, _partial: PreferenceUpdate) -> WeeklyResult<()> {
            Ok(())
        }
        async fn create_default_preferences(&self, _user_id: Uuid) -> WeeklyResult<()> {
            Ok(())
        }
        async fn get_user_profile(&self, _user_id: Uuid) -> WeeklyResult<Option<UserProfile>> {
            Ok(None)
        }
        async fn get_user_activity(
            &self,
            _user_id: Uuid,
            _start_utc: DateTime<Utc>,
            _end_utc: DateTime<Utc>,
        ) -> WeeklyResult<Vec<ActivityItem>> {
            Ok(vec![])
        }
        async fn get_digest_by_user_week(
            &self,
            _user_id: Uuid,
            _week_start: chrono::NaiveDate,
        ) -> WeeklyResult<Option<DigestRecord>> {
            Ok(None)
        }
        async fn upsert_digest(
            &self,
            _user_id: Uuid,
            _week_start: chrono::NaiveDate,
            _initial_status: DigestStatus,
        ) -> WeeklyResult<DigestRecord> {
            unimplemented!()
        }
        async fn update_digest(&self, _id: Uuid, update: DigestUpdate) -> WeeklyResult<()> {
            self.digest_updates.lock().unwrap().push(update);
            Ok(())
        }
        async fn log_email_event(
            &self,
            message_id: &str,
            event_type: EmailEventType,
            _user_id: Option<Uuid>,
            _recipient_email: Option<String>,
            _meta: Option<serde_json::Value>,
        ) -> WeeklyResult<()> {
            self.logged.lock().unwrap().push((message_id.to_string(), event_type));
            Ok(())
        }
        async fn add_suppression(
            &self,
            email: &str,
            _user_id: Option<Uuid>,
            reason: SuppressionReason,
        ) -> WeeklyResult<()> {
            self.suppressions.lock().unwrap().push((email.to_string(), reason));
            Ok(())
        }
        async fn is_suppressed(&self, _email: &str) -> WeeklyResult<bool> {
            Ok(false)
        }
        async fn mint_unsubscribe_token(&self, _user_id: Uuid) -> WeeklyResult<String> {
            Ok(String::new())
        }
        async fn resolve_unsubscribe_token(&self, _token: &str) -> WeeklyResult<Option<Uuid>> {
            Ok(None)
        }
        async fn disable_user_digest(&self, user_id: Uuid) -> WeeklyResult<()> {
            self.disabled.lock().unwrap().push(user_id);
            Ok(())
        }
        async fn digest_stats(&self, since_utc: DateTime<Utc>) -> WeeklyResult<DigestStats> {
            Ok(DigestStats { since: since_utc, ..Default::default() })
        }
        async fn find_user_id_by_message_id(&self, _message_id: &str) -> WeeklyResult<Option<Uuid>> {
            Ok(self.user_for_message)
        }
        async fn find_digest_id_by_message_id(&self, _message_id: &str) -> WeeklyResult<Option<Uuid>> {
            Ok(self.digest_for_message)
        }
    }

    fn payload(event: &str) -> String {
        serde_json::json!({
            "event": event,
            "message-id": "abc-123",
            "email": "person@example.com",
            "date": "2026-07-20T12:00:00Z",
        })
        .to_string()
    }

    #[tokio::test]
    async fn delivered_is_logged_without_state_change() {
        let repo = Arc::new(FakeRepo::default());
        let ingestor = WebhookIngestor::new(repo.clone(), None);
        let outcome = ingestor.ingest(&payload("delivered"), None, None).await.unwrap();
        assert!(matches!(
            outcome,
            IngestOutcome::Processed { event: EmailEventType::Delivered, state_changed: false }
        ));
        assert_eq!(repo.logged.lock().unwrap().len(), 1);
        assert!(repo.suppressions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn bounced_suppresses_and_annotates_the_digest() {
        let user_id = Uuid::new_v4();
        let digest_id = Uuid::new_v4();
        let repo = Arc::new(FakeRepo {
            user_for_message: Some(user_id),
            digest_for_message: Some(digest_id),
            ..Default::default()
        });
        let ingestor = WebhookIngestor::new(repo.clone(), None);
        let outcome = ingestor.ingest(&payload("bounced"), None, None).await.unwrap();
        assert!(matches!(outcome, IngestOutcome::Processed { state_changed: true, .. }));
        assert_eq!(repo.suppressions.lock().unwrap()[0].1, SuppressionReason::Bounced);
        let updates = repo.digest_updates.lock().unwrap();
        assert_eq!(updates.len(), 1);
        assert!(updates[0].status.is_none());
        assert_eq!(updates[0].error.as_deref(), Some("bounced"));
    }

    #[tokio::test]
    async fn unsubscribed_suppresses_and_disables_the_user() {
        let user_id = Uuid::new_v4();
        let repo = Arc::new(FakeRepo { user_for_message: Some(user_id), ..Default::default() });
        let ingestor = WebhookIngestor::new(repo.clone(), None);
        ingestor.ingest(&payload("unsubscribed"), None, None).await.unwrap();
        assert_eq!(repo.suppressions.lock().unwrap()[0].1, SuppressionReason::Unsubscribed);
        assert_eq!(repo.disabled.lock().unwrap()[0], user_id);
    }

    #[tokio::test]
    async fn unknown_event_types_are_accepted_with_no_state_change() {
        let repo = Arc::new(FakeRepo::default());
        let ingestor = WebhookIngestor::new(repo.clone(), None);
        let outcome = ingestor.ingest(&payload("whatever"), None, None).await.unwrap();
        assert!(matches!(outcome, IngestOutcome::Unhandled { .. }));
        assert!(repo.logged.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_required_fields_are_rejected() {
        let repo = Arc::new(FakeRepo::default());
        let ingestor = WebhookIngestor::new(repo, None);
        let body = serde_json::json!({"event": "delivered"}).to_string();
        let err = ingestor.ingest(&body, None, None).await.unwrap_err();
        assert!(matches!(err, WebhookError::MissingField("message-id")));
    }

    #[tokio::test]
    async fn signature_verification_is_enforced_when_a_secret_is_configured() {
        let repo = Arc::new(FakeRepo::default());
        let ingestor = WebhookIngestor::new(repo, Some("shh".to_string()));
        let err = ingestor.ingest(&payload("delivered"), None, None).await.unwrap_err();
        assert!(matches!(err, WebhookError::MissingSignature));

        let body = payload("delivered");
        let sig = crate::signature::verify_signature("shh", "0", &body, "sha256=deadbeef");
        assert!(!sig);
        let err = ingestor
            .ingest(&body, Some("sha256=deadbeef"), Some("0"))
            .await
            .unwrap_err();
        assert!(matches!(err, WebhookError::InvalidSignature));
    }
}
