//! sea-orm-backed [`Repository`] implementation.
//!
//! Grounded on `original_source/app/services/digest_repo.py`'s Supabase
//! queries, translated to `sea-orm` query/active-model calls in the style
//! of `temps-webhooks/src/service.rs`. The `insights`/`stacks`/`profiles`
//! tables are the fixture schema described in SPEC_FULL.md §6.4's
//! expansion note — a real deployment points this trait at its own schema.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;
use weekly_core::model::{
    ActivityItem, ActivityKind, DigestRecord, DigestStats, DigestStatus, EmailEventType,
    NoActivityPolicy, SuppressionReason, UserPreference, UserProfile,
};
use weekly_core::{RepositoryError, WeeklyError, WeeklyResult};
use weekly_entities::{email_digests, email_events, email_preferences, insights, profiles, stacks,
    suppression_entries, unsubscribe_tokens};

use crate::repository::{DigestUpdate, PreferenceUpdate, Repository, SendableUser};

pub struct SeaOrmRepository {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

fn repo_err(e: sea_orm::DbErr) -> WeeklyError {
    WeeklyError::Repository(RepositoryError::Transient(e.to_string()))
}

fn status_str(status: DigestStatus) -> &'static str {
    match status {
        DigestStatus::Queued => "queued",
        DigestStatus::Rendered => "rendered",
        DigestStatus::Sent => "sent",
        DigestStatus::Failed => "failed",
        DigestStatus::Skipped => "skipped",
    }
}

fn status_from_str(s: &str) -> DigestStatus {
    match s {
        "rendered" => DigestStatus::Rendered,
        "sent" => DigestStatus::Sent,
        "failed" => DigestStatus::Failed,
        "skipped" => DigestStatus::Skipped,
        _ => DigestStatus::Queued,
    }
}

fn policy_str(policy: NoActivityPolicy) -> &'static str {
    match policy {
        NoActivityPolicy::Skip => "skip",
        NoActivityPolicy::Brief => "brief",
        NoActivityPolicy::Suggestions => "suggestions",
    }
}

fn policy_from_str(s: &str) -> NoActivityPolicy {
    match s {
        "skip" => NoActivityPolicy::Skip,
        "suggestions" => NoActivityPolicy::Suggestions,
        _ => NoActivityPolicy::Brief,
    }
}

fn reason_str(reason: SuppressionReason) -> &'static str {
    match reason {
        SuppressionReason::Unsubscribed => "unsubscribed",
        SuppressionReason::Bounced => "bounced",
        SuppressionReason::MarkedSpam => "marked_spam",
        SuppressionReason::Blocked => "blocked",
        SuppressionReason::Manual => "manual",
    }
}

fn event_type_str(event_type: EmailEventType) -> &'static str {
    match event_type {
        EmailEventType::Sent => "sent",
        EmailEventType::Delivered => "delivered",
        EmailEventType::Opened => "opened",
        EmailEventType::Clicked => "clicked",
        EmailEventType::Bounced => "bounced",
        EmailEventType::Spam => "spam",
        EmailEventType::Unsubscribed => "unsubscribed",
        EmailEventType::Blocked => "blocked",
        EmailEventType::Suppressed => "suppressed",
    }
}

fn to_preference(model: email_preferences::Model) -> UserPreference {
    UserPreference {
        user_id: model.user_id,
        weekly_digest_enabled: model.weekly_digest_enabled,
        timezone: model.timezone,
        preferred_day: model.preferred_day as u32,
        preferred_hour: model.preferred_hour as u32,
        week_start_day: model.week_start_day as u32,
        no_activity_policy: policy_from_str(&model.no_activity_policy),
        unsubscribe_token: model.unsubscribe_token,
    }
}

fn to_profile(model: profiles::Model) -> UserProfile {
    UserProfile {
        user_id: model.user_id,
        email: model.email,
        display_name: model.display_name,
    }
}

fn to_digest_record(model: email_digests::Model) -> DigestRecord {
    DigestRecord {
        id: model.id,
        user_id: model.user_id,
        week_start: model.week_start,
        status: status_from_str(&model.status),
        message_id: model.message_id,
        retry_count: model.retry_count.max(0) as u32,
        last_error: model.last_error,
        payload: model.payload,
        created_at: model.created_at,
        updated_at: model.updated_at,
        sent_at: model.sent_at,
    }
}

fn insight_to_activity_item(model: insights::Model) -> ActivityItem {
    let tags: Vec<String> = serde_json::from_value(model.tags).unwrap_or_default();
    ActivityItem {
        id: model.id,
        kind: ActivityKind::Insight,
        title: model.title,
        description: model.description,
        summary: model.summary,
        url: model.url,
        image_url: model.image_url,
        thought: model.thought,
        tags,
        item_count: None,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

fn stack_to_activity_item(model: stacks::Model) -> ActivityItem {
    ActivityItem {
        id: model.id,
        kind: ActivityKind::Stack,
        title: model.name,
        description: model.description,
        summary: None,
        url: None,
        image_url: None,
        thought: None,
        tags: Vec::new(),
        item_count: Some(model.item_count),
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

#[async_trait]
impl Repository for SeaOrmRepository {
    async fn get_sendable_users(&self, _now_utc: DateTime<Utc>) -> WeeklyResult<Vec<SendableUser>> {
        let prefs = email_preferences::Entity::find()
            .filter(email_preferences::Column::WeeklyDigestEnabled.eq(true))
            .all(self.db.as_ref())
            .await
            .map_err(repo_err)?;

        let mut sendable = Vec::with_capacity(prefs.len());
        for pref in prefs {
            let user_id = pref.user_id;
            match profiles::Entity::find_by_id(user_id)
                .one(self.db.as_ref())
                .await
                .map_err(repo_err)?
            {
                Some(profile) if !profile.email.trim().is_empty() => {
                    sendable.push(SendableUser {
                        preference: to_preference(pref),
                        profile: to_profile(profile),
                    });
                }
                _ => {
                    warn!(%user_id, "dropping sendable user with no addressable profile");
                }
            }
        }
        Ok(sendable)
    }

    async fn get_user_preferences(&self, user_id: Uuid) -> WeeklyResult<Option<UserPreference>> {
        let pref = email_preferences::Entity::find_by_id(user_id)
            .one(self.db.as_ref())
            .await
            .map_err(repo_err)?;
        Ok(pref.map(to_preference))
    }

    async fn upsert_user_preferences(
        &self,
        user_id: Uuid,
        partial: PreferenceUpdate,
    ) -> WeeklyResult<()> {
        let existing = email_preferences::Entity::find_by_id(user_id)
            .one(self.db.as_ref())
            .await
            .map_err(repo_err)?;

        let now = Utc::now();
        let mut model: email_preferences::ActiveModel = match existing {
            Some(m) => m.into(),
            None => email_preferences::ActiveModel {
                user_id: Set(user_id),
                weekly_digest_enabled: Set(true),
                timezone: Set("UTC".to_string()),
                preferred_day: Set(6),
                preferred_hour: Set(20),
                week_start_day: Set(0),
                no_activity_policy: Set("brief".to_string()),
                unsubscribe_token: Set(None),
                created_at: Set(now),
                updated_at: Set(now),
            },
        };

        if let Some(v) = partial.weekly_digest_enabled {
            model.weekly_digest_enabled = Set(v);
        }
        if let Some(v) = partial.timezone {
            model.timezone = Set(v);
        }
        if let Some(v) = partial.preferred_day {
            model.preferred_day = Set(v as i16);
        }
        if let Some(v) = partial.preferred_hour {
            model.preferred_hour = Set(v as i16);
        }
        if let Some(v) = partial.week_start_day {
            model.week_start_day = Set(v as i16);
        }
        if let Some(v) = partial.no_activity_policy {
            model.no_activity_policy = Set(policy_str(v).to_string());
        }
        model.updated_at = Set(now);

        model.save(self.db.as_ref()).await.map_err(repo_err)?;
        Ok(())
    }

    async fn create_default_preferences(&self, user_id: Uuid) -> WeeklyResult<()> {
        if self.get_user_preferences(user_id).await?.is_some() {
            return Ok(());
        }
        let now = Utc::now();
        let model = email_preferences::ActiveModel {
            user_id: Set(user_id),
            weekly_digest_enabled: Set(true),
            timezone: Set("UTC".to_string()),
            preferred_day: Set(6),
            preferred_hour: Set(20),
            week_start_day: Set(0),
            no_activity_policy: Set("brief".to_string()),
            unsubscribe_token: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        match model.insert(self.db.as_ref()).await {
            Ok(_) => Ok(()),
            Err(_) if self.get_user_preferences(user_id).await?.is_some() => Ok(()),
            Err(e) => Err(repo_err(e)),
        }
    }

    async fn get_user_profile(&self, user_id: Uuid) -> WeeklyResult<Option<UserProfile>> {
        let profile = profiles::Entity::find_by_id(user_id)
            .one(self.db.as_ref())
            .await
            .map_err(repo_err)?;
        Ok(profile.map(to_profile))
    }

    async fn get_user_activity(
        &self,
        user_id: Uuid,
        start_utc: DateTime<Utc>,
        end_utc: DateTime<Utc>,
    ) -> WeeklyResult<Vec<ActivityItem>> {
        let insight_rows = insights::Entity::find()
            .filter(insights::Column::UserId.eq(user_id))
            .all(self.db.as_ref())
            .await
            .map_err(repo_err)?;
        let stack_rows = stacks::Entity::find()
            .filter(stacks::Column::UserId.eq(user_id))
            .all(self.db.as_ref())
            .await
            .map_err(repo_err)?;

        let in_window = |created: DateTime<Utc>, updated: DateTime<Utc>| {
            (created >= start_utc && created < end_utc) || (updated >= start_utc && updated < end_utc)
        };

        let mut items: Vec<ActivityItem> = insight_rows
            .into_iter()
            .filter(|r| in_window(r.created_at, r.updated_at))
            .map(insight_to_activity_item)
            .collect();
        items.extend(
            stack_rows
                .into_iter()
                .filter(|r| in_window(r.created_at, r.updated_at))
                .map(stack_to_activity_item),
        );
        Ok(items)
    }

    async fn get_digest_by_user_week(
        &self,
        user_id: Uuid,
        week_start: NaiveDate,
    ) -> WeeklyResult<Option<DigestRecord>> {
        let record = email_digests::Entity::find()
            .filter(email_digests::Column::UserId.eq(user_id))
            .filter(email_digests::Column::WeekStart.eq(week_start))
            .one(self.db.as_ref())
            .await
            .map_err(repo_err)?;
        Ok(record.map(to_digest_record))
    }

    async fn upsert_digest(
        &self,
        user_id: Uuid,
        week_start: NaiveDate,
        initial_status: DigestStatus,
    ) -> WeeklyResult<DigestRecord> {
        if let Some(existing) = self.get_digest_by_user_week(user_id, week_start).await? {
            return Ok(existing);
        }

        let now = Utc::now();
        let model = email_digests::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            week_start: Set(week_start),
            status: Set(status_str(initial_status).to_string()),
            message_id: Set(None),
            retry_count: Set(0),
            last_error: Set(None),
            payload: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            sent_at: Set(None),
        };

        match model.insert(self.db.as_ref()).await {
            Ok(inserted) => Ok(to_digest_record(inserted)),
            Err(e) => match self.get_digest_by_user_week(user_id, week_start).await? {
                Some(existing) => Ok(existing),
                None => Err(repo_err(e)),
            },
        }
    }

    async fn update_digest(&self, id: Uuid, update: DigestUpdate) -> WeeklyResult<()> {
        let existing = email_digests::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(repo_err)?
            .ok_or_else(|| {
                WeeklyError::Repository(RepositoryError::NotFound {
                    resource: format!("email_digests:{id}"),
                })
            })?;

        let retry_count = existing.retry_count;
        let mut model: email_digests::ActiveModel = existing.into();

        if let Some(status) = update.status {
            model.status = Set(status_str(status).to_string());
            if status == DigestStatus::Sent {
                model.sent_at = Set(Some(Utc::now()));
            }
        }
        if let Some(error) = update.error {
            model.last_error = Set(Some(error));
        }
        if let Some(new_payload) = update.payload {
            model.payload = Set(Some(new_payload));
        }
        if let Some(message_id) = update.message_id {
            model.message_id = Set(Some(message_id));
        }
        if update.increment_retry {
            model.retry_count = Set(retry_count + 1);
        }
        model.updated_at = Set(Utc::now());

        model.update(self.db.as_ref()).await.map_err(repo_err)?;
        Ok(())
    }

    async fn log_email_event(
        &self,
        message_id: &str,
        event_type: EmailEventType,
        user_id: Option<Uuid>,
        recipient_email: Option<String>,
        meta: Option<serde_json::Value>,
    ) -> WeeklyResult<()> {
        let digest_id = self.find_digest_id_by_message_id(message_id).await?;
        let model = email_events::ActiveModel {
            id: Set(Uuid::new_v4()),
            digest_id: Set(digest_id),
            user_id: Set(user_id),
            message_id: Set(message_id.to_string()),
            event_type: Set(event_type_str(event_type).to_string()),
            recipient_email: Set(recipient_email),
            occurred_at: Set(Utc::now()),
            raw: Set(meta),
        };
        model.insert(self.db.as_ref()).await.map_err(repo_err)?;
        Ok(())
    }

    async fn add_suppression(
        &self,
        email: &str,
        user_id: Option<Uuid>,
        reason: SuppressionReason,
    ) -> WeeklyResult<()> {
        let existing = suppression_entries::Entity::find_by_id(email.to_string())
            .one(self.db.as_ref())
            .await
            .map_err(repo_err)?;
        if existing.is_some() {
            return Ok(());
        }
        let model = suppression_entries::ActiveModel {
            email: Set(email.to_string()),
            user_id: Set(user_id),
            reason: Set(reason_str(reason).to_string()),
            created_at: Set(Utc::now()),
        };
        match model.insert(self.db.as_ref()).await {
            Ok(_) => Ok(()),
            Err(_) => Ok(()),
        }
    }

    async fn is_suppressed(&self, email: &str) -> WeeklyResult<bool> {
        let existing = suppression_entries::Entity::find_by_id(email.to_string())
            .one(self.db.as_ref())
            .await
            .map_err(repo_err)?;
        Ok(existing.is_some())
    }

    async fn mint_unsubscribe_token(&self, user_id: Uuid) -> WeeklyResult<String> {
        let token = Uuid::new_v4().simple().to_string();
        let model = unsubscribe_tokens::ActiveModel {
            token: Set(token.clone()),
            user_id: Set(user_id),
            created_at: Set(Utc::now()),
            used_at: Set(None),
        };
        model.insert(self.db.as_ref()).await.map_err(repo_err)?;
        Ok(token)
    }

    async fn resolve_unsubscribe_token(&self, token: &str) -> WeeklyResult<Option<Uuid>> {
        let existing = unsubscribe_tokens::Entity::find_by_id(token.to_string())
            .one(self.db.as_ref())
            .await
            .map_err(repo_err)?;

        let Some(existing) = existing else {
            return Ok(None);
        };
        let user_id = existing.user_id;
        if existing.used_at.is_none() {
            let mut model: unsubscribe_tokens::ActiveModel = existing.into();
            model.used_at = Set(Some(Utc::now()));
            model.update(self.db.as_ref()).await.map_err(repo_err)?;
        }
        Ok(Some(user_id))
    }

    async fn disable_user_digest(&self, user_id: Uuid) -> WeeklyResult<()> {
        self.upsert_user_preferences(
            user_id,
            PreferenceUpdate {
                weekly_digest_enabled: Some(false),
                ..Default::default()
            },
        )
        .await
    }

    async fn digest_stats(&self, since_utc: DateTime<Utc>) -> WeeklyResult<DigestStats> {
        let digests = email_digests::Entity::find()
            .filter(email_digests::Column::CreatedAt.gte(since_utc))
            .all(self.db.as_ref())
            .await
            .map_err(repo_err)?;

        let mut stats = DigestStats {
            since: since_utc,
            ..Default::default()
        };
        for digest in &digests {
            match status_from_str(&digest.status) {
                DigestStatus::Queued | DigestStatus::Rendered => stats.queued += 1,
                DigestStatus::Sent => stats.sent += 1,
                DigestStatus::Failed => stats.failed += 1,
                DigestStatus::Skipped => stats.skipped += 1,
            }
        }

        let events = email_events::Entity::find()
            .filter(email_events::Column::OccurredAt.gte(since_utc))
            .all(self.db.as_ref())
            .await
            .map_err(repo_err)?;
        let mut event_counts: HashMap<String, u64> = HashMap::new();
        for event in events {
            *event_counts.entry(event.event_type).or_insert(0) += 1;
        }
        stats.event_counts = event_counts;

        Ok(stats)
    }

    async fn find_user_id_by_message_id(&self, message_id: &str) -> WeeklyResult<Option<Uuid>> {
        let record = email_digests::Entity::find()
            .filter(email_digests::Column::MessageId.eq(message_id))
            .one(self.db.as_ref())
            .await
            .map_err(repo_err)?;
        Ok(record.map(|r| r.user_id))
    }

    async fn find_digest_id_by_message_id(&self, message_id: &str) -> WeeklyResult<Option<Uuid>> {
        let record = email_digests::Entity::find()
            .filter(email_digests::Column::MessageId.eq(message_id))
            .one(self.db.as_ref())
            .await
            .map_err(repo_err)?;
        Ok(record.map(|r| r.id))
    }
}
