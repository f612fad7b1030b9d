use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::{sleep, Duration as TokioDuration};
use uuid::Uuid;

use weekly_core::clock::{resolve_timezone, should_send_now, week_boundaries};
use weekly_core::content::{build_digest_payload, DigestPayload};
use weekly_core::model::{ActivityItem, ActivityKind, DigestStatus, SuppressionReason, UserProfile};
use weekly_core::outcome::{FailReason, SentReason, SkipReason, SweepSummary, UserOutcome};
use weekly_core::render::{render_inline, template_params};
use weekly_core::summary::{fallback_summary, SummaryEnricher};
use weekly_core::WeeklyConfig;
use weekly_database::{DigestUpdate, Repository, SendableUser};
use weekly_email::EmailDispatcher;

/// `message_id` written when a digest is skipped for lack of qualifying
/// activity under `NoActivityPolicy::Skip` — the record is SENT, not
/// SKIPPED, per the §9 Open Question resolution in DESIGN.md: a sentinel
/// in an otherwise-real `message_id` column keeps the DAG's terminal
/// states to {SENT, FAILED} without adding a separate persisted state.
pub const SKIPPED_SENTINEL: &str = "skipped";

/// `message_id` written for a dry-run send: content was assembled and
/// rendered but never handed to the email provider.
pub const DRY_RUN_SENTINEL: &str = "dry_run";

/// Inter-batch pacing (§5): a small sleep between batches so the sweep
/// doesn't spike the email provider or the database.
const INTER_BATCH_PACING: TokioDuration = TokioDuration::from_secs(1);
/// Intra-batch per-user pacing (§5).
const INTRA_BATCH_PACING: TokioDuration = TokioDuration::from_millis(500);

/// Wires the Repository, Summary Enricher and Email Dispatcher together
/// and runs the per-user state machine, either across a whole sweep or
/// for one targeted user.
#[derive(Clone)]
pub struct DigestOrchestrator {
    repo: Arc<dyn Repository>,
    enricher: Arc<dyn SummaryEnricher>,
    dispatcher: Arc<EmailDispatcher>,
    config: WeeklyConfig,
}

impl DigestOrchestrator {
    pub fn new(
        repo: Arc<dyn Repository>,
        enricher: Arc<dyn SummaryEnricher>,
        dispatcher: Arc<EmailDispatcher>,
        config: WeeklyConfig,
    ) -> Self {
        Self { repo, enricher, dispatcher, config }
    }

    /// Runs one sweep over every eligible user, per §4.7.1. `now_utc`
    /// defaults to the real current time (injectable for tests);
    /// `force` bypasses `should_send_now` and the existing-digest
    /// idempotency branch; `dry_run` defaults to `config.sweep_dry_run`.
    pub async fn run_sweep(
        &self,
        now_utc: Option<DateTime<Utc>>,
        force: bool,
        dry_run: Option<bool>,
    ) -> SweepSummary {
        let now_utc = now_utc.unwrap_or_else(Utc::now);
        let dry_run = dry_run.unwrap_or(self.config.sweep_dry_run);

        if force {
            tracing::info!(%now_utc, "starting FORCE digest sweep - bypassing scheduling logic");
        } else {
            tracing::info!(%now_utc, "starting digest sweep");
        }

        let users = match self.repo.get_sendable_users(now_utc).await {
            Ok(users) => users,
            Err(err) => {
                let mut summary = SweepSummary::default();
                summary.errors.push(format!("failed to fetch sendable users: {err}"));
                return summary;
            }
        };
        tracing::info!(count = users.len(), "found eligible users");

        let batch_size = self.config.batch_size.max(1);
        let mut summary = SweepSummary::default();

        for (batch_index, batch) in users.chunks(batch_size).enumerate() {
            if batch_index > 0 {
                sleep(INTER_BATCH_PACING).await;
            }

            let fan_out = Arc::new(Semaphore::new(batch_size));
            let mut handles = Vec::with_capacity(batch.len());
            for user in batch {
                let permit = fan_out.clone().acquire_owned().await.expect("semaphore not closed");
                let orchestrator = self.clone();
                let user = user.clone();
                handles.push(tokio::spawn(async move {
                    let outcome = orchestrator.process_user(&user, now_utc, force, dry_run, None).await;
                    drop(permit);
                    outcome
                }));
                sleep(INTRA_BATCH_PACING).await;
            }

            for handle in handles {
                match handle.await {
                    Ok(outcome) => summary.record(&outcome),
                    Err(join_err) => {
                        summary.processed += 1;
                        summary.failed += 1;
                        summary.errors.push(format!("user task panicked: {join_err}"));
                    }
                }
            }
        }

        tracing::info!(
            processed = summary.processed,
            sent = summary.sent,
            skipped = summary.skipped,
            failed = summary.failed,
            "digest sweep completed"
        );
        summary
    }

    /// Runs the per-user state machine for exactly one user, bypassing
    /// batching and pacing. `email_override` redirects delivery (e.g. to
    /// an operator's test inbox) without changing which digest row is
    /// written.
    pub async fn send_to_user(
        &self,
        user_id: Uuid,
        now_utc: Option<DateTime<Utc>>,
        force: bool,
        dry_run: Option<bool>,
        email_override: Option<&str>,
    ) -> Result<UserOutcome, weekly_core::WeeklyError> {
        let now_utc = now_utc.unwrap_or_else(Utc::now);
        let dry_run = dry_run.unwrap_or(self.config.sweep_dry_run);

        let preference = self
            .repo
            .get_user_preferences(user_id)
            .await?
            .ok_or_else(|| weekly_core::error::RepositoryError::NotFound { resource: format!("user_preferences:{user_id}") })?;
        let profile = self
            .repo
            .get_user_profile(user_id)
            .await?
            .ok_or_else(|| weekly_core::error::RepositoryError::NotFound { resource: format!("user_profile:{user_id}") })?;

        let user = SendableUser { preference, profile };
        Ok(self.process_user(&user, now_utc, force, dry_run, email_override).await)
    }

    /// Assembles and renders a digest for `user_id` without touching any
    /// persisted state — no digest row is created or updated, and no
    /// email is dispatched. Used for operator previews (§6.2).
    pub async fn preview(&self, user_id: Uuid) -> Result<weekly_core::render::RenderedEmail, weekly_core::WeeklyError> {
        let preference = self
            .repo
            .get_user_preferences(user_id)
            .await?
            .ok_or_else(|| weekly_core::error::RepositoryError::NotFound { resource: format!("user_preferences:{user_id}") })?;
        let profile = self
            .repo
            .get_user_profile(user_id)
            .await?
            .ok_or_else(|| weekly_core::error::RepositoryError::NotFound { resource: format!("user_profile:{user_id}") })?;

        let now_utc = Utc::now();
        let bounds = week_boundaries(now_utc, &preference.timezone, preference.week_start_day);
        let activity = self
            .repo
            .get_user_activity(user_id, bounds.prev_week_start_utc, bounds.prev_week_end_utc)
            .await?;

        let payload = build_digest_payload(&activity, now_utc, preference.no_activity_policy);
        let insights_only: Vec<ActivityItem> =
            activity.iter().filter(|i| i.kind == ActivityKind::Insight).cloned().collect();
        let summary = self.summarize(&insights_only).await;
        let display_name = display_name(&profile);
        let unsubscribe_url = self.config.unsubscribe_base_url.clone();
        let login_url = self.config.login_url();

        Ok(render_inline(&display_name, &payload, Some(&summary), &unsubscribe_url, &login_url))
    }

    /// The §4.7.2 per-user state machine.
    async fn process_user(
        &self,
        user: &SendableUser,
        now_utc: DateTime<Utc>,
        force: bool,
        dry_run: bool,
        email_override: Option<&str>,
    ) -> UserOutcome {
        let user_id = user.profile.user_id;
        let pref = &user.preference;

        if !force
            && !should_send_now(&pref.timezone, pref.preferred_day, pref.preferred_hour, now_utc, pref.weekly_digest_enabled)
        {
            tracing::info!(%user_id, timezone = %pref.timezone, "skipping user - not send time");
            return UserOutcome::Skipped { user_id, reason: SkipReason::NotSendTime };
        }

        let bounds = week_boundaries(now_utc, &pref.timezone, pref.week_start_day);
        let week_start = bounds.prev_week_start_utc.with_timezone(&resolve_timezone(&pref.timezone)).date_naive();

        let existing = match self.repo.get_digest_by_user_week(user_id, week_start).await {
            Ok(existing) => existing,
            Err(err) => return UserOutcome::Failed { user_id, reason: FailReason::UnexpectedError, detail: err.to_string() },
        };

        if !force {
            if let Some(existing) = &existing {
                match existing.status {
                    DigestStatus::Sent => {
                        tracing::info!(%user_id, %week_start, "digest already sent - skipping");
                        return UserOutcome::Skipped { user_id, reason: SkipReason::AlreadySent };
                    }
                    // `Skipped` is a terminal DAG state this orchestrator never
                    // itself produces (no-activity skips are represented as
                    // SENT+SKIPPED_SENTINEL, see DESIGN.md); treat it the same
                    // as an already-final record if some other writer set it.
                    DigestStatus::Skipped => {
                        return UserOutcome::Skipped { user_id, reason: SkipReason::AlreadySent };
                    }
                    DigestStatus::Queued | DigestStatus::Rendered => {
                        tracing::info!(%user_id, %week_start, "digest in progress - skipping");
                        return UserOutcome::Skipped { user_id, reason: SkipReason::InProgress };
                    }
                    DigestStatus::Failed => {
                        tracing::info!(%user_id, "retrying failed digest");
                    }
                }
            }
        }

        let digest = match self.repo.upsert_digest(user_id, week_start, DigestStatus::Queued).await {
            Ok(digest) => digest,
            Err(err) => return UserOutcome::Failed { user_id, reason: FailReason::UnexpectedError, detail: err.to_string() },
        };
        let digest_id = digest.id;

        tracing::info!(%user_id, %week_start, "generating digest content");
        let activity = match self
            .repo
            .get_user_activity(user_id, bounds.prev_week_start_utc, bounds.prev_week_end_utc)
            .await
        {
            Ok(activity) => activity,
            Err(err) => {
                let _ = self.fail_digest(digest_id, &err.to_string()).await;
                return UserOutcome::Failed { user_id, reason: FailReason::ContentGenerationFailed, detail: err.to_string() };
            }
        };

        let payload = build_digest_payload(&activity, now_utc, pref.no_activity_policy);

        if matches!(payload, DigestPayload::Skip) {
            let payload_json = serde_json::to_value(&payload).unwrap_or(serde_json::Value::Null);
            if let Err(err) = self
                .repo
                .update_digest(
                    digest_id,
                    DigestUpdate {
                        status: Some(DigestStatus::Sent),
                        message_id: Some(SKIPPED_SENTINEL.to_string()),
                        payload: Some(payload_json),
                        ..Default::default()
                    },
                )
                .await
            {
                return UserOutcome::Failed { user_id, reason: FailReason::UnexpectedError, detail: err.to_string() };
            }
            return UserOutcome::Skipped { user_id, reason: SkipReason::NoActivitySkip };
        }

        let insights_only: Vec<ActivityItem> =
            activity.iter().filter(|i| i.kind == ActivityKind::Insight).cloned().collect();
        let summary = self.summarize(&insights_only).await;
        let display_name = display_name(&user.profile);

        let unsubscribe_token = match self.repo.mint_unsubscribe_token(user_id).await {
            Ok(token) => token,
            Err(err) => {
                let _ = self.fail_digest(digest_id, &err.to_string()).await;
                return UserOutcome::Failed { user_id, reason: FailReason::RenderFailed, detail: err.to_string() };
            }
        };
        let unsubscribe_url = self.config.unsubscribe_url(&unsubscribe_token);
        let login_url = self.config.login_url();
        let rendered = render_inline(&display_name, &payload, Some(&summary), &unsubscribe_url, &login_url);

        let payload_json = serde_json::to_value(&payload).unwrap_or(serde_json::Value::Null);
        if let Err(err) = self
            .repo
            .update_digest(
                digest_id,
                DigestUpdate { status: Some(DigestStatus::Rendered), payload: Some(payload_json.clone()), ..Default::default() },
            )
            .await
        {
            return UserOutcome::Failed { user_id, reason: FailReason::RenderFailed, detail: err.to_string() };
        }

        if dry_run {
            tracing::info!(%user_id, email = %user.profile.email, "dry run: would send digest email");
            if let Err(err) = self
                .repo
                .update_digest(
                    digest_id,
                    DigestUpdate {
                        status: Some(DigestStatus::Sent),
                        message_id: Some(DRY_RUN_SENTINEL.to_string()),
                        payload: Some(payload_json),
                        ..Default::default()
                    },
                )
                .await
            {
                return UserOutcome::Failed { user_id, reason: FailReason::UnexpectedError, detail: err.to_string() };
            }
            return UserOutcome::Sent { user_id, reason: SentReason::DryRun };
        }

        let to_email = email_override.unwrap_or(&user.profile.email);
        let is_suppressed = self.repo.is_suppressed(to_email).await.unwrap_or(false);

        let week_end_naive = bounds.prev_week_end_utc.with_timezone(&resolve_timezone(&pref.timezone)).date_naive();
        let hosted_params = self.config.email_template_id.as_deref().map(|_| {
            template_params(
                &user.profile,
                &display_name,
                &pref.timezone,
                &payload,
                Some(&summary),
                &unsubscribe_url,
                &login_url,
                week_start,
                week_end_naive,
            )
        });

        tracing::info!(%user_id, email = %to_email, "sending digest email");
        match self
            .dispatcher
            .send_with_template(
                to_email,
                Some(&display_name),
                &rendered.subject,
                &rendered.html_body,
                &rendered.text_body,
                &unsubscribe_url,
                is_suppressed,
                self.config.email_template_id.as_deref(),
                hosted_params,
            )
            .await
        {
            Ok(send_outcome) => {
                tracing::info!(%user_id, message_id = %send_outcome.message_id, "digest email sent");
                if let Err(err) = self
                    .repo
                    .update_digest(
                        digest_id,
                        DigestUpdate {
                            status: Some(DigestStatus::Sent),
                            message_id: Some(send_outcome.message_id.clone()),
                            payload: Some(payload_json),
                            ..Default::default()
                        },
                    )
                    .await
                {
                    return UserOutcome::Failed { user_id, reason: FailReason::UnexpectedError, detail: err.to_string() };
                }
                if let Err(err) = self
                    .repo
                    .log_email_event(
                        &send_outcome.message_id,
                        weekly_core::model::EmailEventType::Sent,
                        Some(user_id),
                        Some(to_email.to_string()),
                        None,
                    )
                    .await
                {
                    tracing::warn!(%user_id, error = %err, "failed to record sent email event");
                }
                UserOutcome::Sent { user_id, reason: SentReason::EmailSent }
            }
            Err(err) => {
                tracing::error!(%user_id, error = %err, "digest email send failed");
                if matches!(err, weekly_core::error::DispatchError::Permanent(_)) {
                    if let Err(suppress_err) = self
                        .repo
                        .add_suppression(to_email, Some(user_id), SuppressionReason::Bounced)
                        .await
                    {
                        tracing::warn!(%user_id, error = %suppress_err, "failed to record suppression after permanent send failure");
                    }
                }
                let _ = self.fail_digest(digest_id, &err.to_string()).await;
                UserOutcome::Failed { user_id, reason: FailReason::EmailSendFailed, detail: err.to_string() }
            }
        }
    }

    async fn summarize(&self, activity: &[ActivityItem]) -> String {
        if !self.enricher.is_available() {
            return fallback_summary(activity);
        }
        match self.enricher.summarize(activity).await {
            Ok(summary) => summary,
            Err(err) => {
                tracing::warn!(error = %err, "summary enricher failed, using fallback");
                fallback_summary(activity)
            }
        }
    }

    async fn fail_digest(&self, digest_id: Uuid, error: &str) -> Result<(), weekly_core::WeeklyError> {
        self.repo
            .update_digest(
                digest_id,
                DigestUpdate { status: Some(DigestStatus::Failed), error: Some(error.to_string()), increment_retry: true, ..Default::default() },
            )
            .await
    }
}

fn display_name(profile: &UserProfile) -> String {
    profile.display_name.clone().unwrap_or_else(|| "there".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use weekly_core::model::{
        ActivityKind, DigestRecord, DigestStats, NoActivityPolicy, SuppressionReason, UserPreference,
    };
    use weekly_core::summary::NoopSummaryEnricher;
    use weekly_core::WeeklyResult;
    use weekly_database::PreferenceUpdate;
    use weekly_email::{MockBehavior, MockEmailProvider};

    #[derive(Default)]
    struct InMemoryRepo {
        digests: Mutex<HashMap<(Uuid, NaiveDate), DigestRecord>>,
        suppressed: Mutex<Vec<String>>,
        tokens_minted: Mutex<u32>,
        disabled: Mutex<Vec<Uuid>>,
        events: Mutex<Vec<(String, weekly_core::model::EmailEventType)>>,
    }

    #[async_trait]
    impl Repository for InMemoryRepo {
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
        async fn get_digest_by_user_week(&self, user_id: Uuid, week_start: NaiveDate) -> WeeklyResult<Option<DigestRecord>> {
            Ok(self.digests.lock().unwrap().get(&(user_id, week_start)).cloned())
        }
        async fn upsert_digest(&self, user_id: Uuid, week_start: NaiveDate, initial_status: DigestStatus) -> WeeklyResult<DigestRecord> {
            let mut digests = self.digests.lock().unwrap();
            if let Some(existing) = digests.get(&(user_id, week_start)) {
                return Ok(existing.clone());
            }
            let record = DigestRecord {
                id: Uuid::new_v4(),
                user_id,
                week_start,
                status: initial_status,
                message_id: None,
                retry_count: 0,
                last_error: None,
                payload: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
                sent_at: None,
            };
            digests.insert((user_id, week_start), record.clone());
            Ok(record)
        }
        async fn update_digest(&self, id: Uuid, update: DigestUpdate) -> WeeklyResult<()> {
            let mut digests = self.digests.lock().unwrap();
            let record = digests.values_mut().find(|d| d.id == id).expect("digest exists");
            if let Some(status) = update.status {
                record.status = status;
            }
            if let Some(error) = update.error {
                record.last_error = Some(error);
            }
            if let Some(payload) = update.payload {
                record.payload = Some(payload);
            }
            if let Some(message_id) = update.message_id {
                record.message_id = Some(message_id);
            }
            if update.increment_retry {
                record.retry_count += 1;
            }
            Ok(())
        }
        async fn log_email_event(
            &self,
            message_id: &str,
            event_type: weekly_core::model::EmailEventType,
            _user_id: Option<Uuid>,
            _recipient_email: Option<String>,
            _meta: Option<serde_json::Value>,
        ) -> WeeklyResult<()> {
            self.events.lock().unwrap().push((message_id.to_string(), event_type));
            Ok(())
        }
        async fn add_suppression(&self, email: &str, _user_id: Option<Uuid>, _reason: SuppressionReason) -> WeeklyResult<()> {
            self.suppressed.lock().unwrap().push(email.to_string());
            Ok(())
        }
        async fn is_suppressed(&self, email: &str) -> WeeklyResult<bool> {
            Ok(self.suppressed.lock().unwrap().iter().any(|e| e == email))
        }
        async fn mint_unsubscribe_token(&self, _user_id: Uuid) -> WeeklyResult<String> {
            *self.tokens_minted.lock().unwrap() += 1;
            Ok("tok-123".to_string())
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
            Ok(None)
        }
        async fn find_digest_id_by_message_id(&self, _message_id: &str) -> WeeklyResult<Option<Uuid>> {
            Ok(None)
        }
    }

    fn preference(enabled: bool) -> UserPreference {
        UserPreference {
            user_id: Uuid::new_v4(),
            weekly_digest_enabled: enabled,
            timezone: "UTC".to_string(),
            preferred_day: 0,
            preferred_hour: 9,
            week_start_day: 0,
            no_activity_policy: NoActivityPolicy::Skip,
            unsubscribe_token: None,
        }
    }

    fn sendable_user(pref: UserPreference) -> SendableUser {
        let user_id = pref.user_id;
        SendableUser {
            preference: pref,
            profile: UserProfile { user_id, email: "person@example.com".to_string(), display_name: Some("Person".to_string()) },
        }
    }

    fn orchestrator(repo: Arc<InMemoryRepo>, behavior: MockBehavior) -> DigestOrchestrator {
        let provider = Arc::new(MockEmailProvider::new().with_behavior(behavior));
        let dispatcher = Arc::new(EmailDispatcher::new(provider, "digest@example.com", "Weekly Digest"));
        DigestOrchestrator::new(repo, Arc::new(NoopSummaryEnricher), dispatcher, WeeklyConfig::default())
    }

    #[tokio::test]
    async fn skips_when_not_the_users_send_moment() {
        let repo = Arc::new(InMemoryRepo::default());
        let user = sendable_user(preference(true));
        let orchestrator = orchestrator(repo, MockBehavior::Succeed);
        // Wednesday 13:00 UTC is not Monday 09:00.
        let now = DateTime::parse_from_rfc3339("2026-07-22T13:00:00Z").unwrap().with_timezone(&Utc);
        let outcome = orchestrator.process_user(&user, now, false, false, None).await;
        assert!(matches!(outcome, UserOutcome::Skipped { reason: SkipReason::NotSendTime, .. }));
    }

    #[tokio::test]
    async fn no_activity_skip_is_recorded_as_sent_with_a_sentinel() {
        let repo = Arc::new(InMemoryRepo::default());
        let user = sendable_user(preference(true));
        let orchestrator = orchestrator(repo.clone(), MockBehavior::Succeed);
        // Monday 09:00 UTC matches preferred_day=0/preferred_hour=9.
        let now = DateTime::parse_from_rfc3339("2026-07-20T09:00:00Z").unwrap().with_timezone(&Utc);
        let outcome = orchestrator.process_user(&user, now, false, false, None).await;
        assert!(matches!(outcome, UserOutcome::Skipped { reason: SkipReason::NoActivitySkip, .. }));

        let digests = repo.digests.lock().unwrap();
        let record = digests.values().next().expect("digest recorded");
        assert_eq!(record.status, DigestStatus::Sent);
    }

    #[tokio::test]
    async fn dry_run_sends_nothing_but_records_sent() {
        let repo = Arc::new(InMemoryRepo::default());
        let mut pref = preference(true);
        pref.no_activity_policy = NoActivityPolicy::Brief;
        let user = sendable_user(pref);
        let orchestrator = orchestrator(repo.clone(), MockBehavior::Succeed);
        let now = DateTime::parse_from_rfc3339("2026-07-20T09:00:00Z").unwrap().with_timezone(&Utc);
        let outcome = orchestrator.process_user(&user, now, false, true, None).await;
        assert!(matches!(outcome, UserOutcome::Sent { reason: SentReason::DryRun, .. }));

        let digests = repo.digests.lock().unwrap();
        let record = digests.values().next().expect("digest recorded");
        assert_eq!(record.status, DigestStatus::Sent);
    }

    #[tokio::test]
    async fn already_sent_digest_is_skipped() {
        let repo = Arc::new(InMemoryRepo::default());
        let user = sendable_user(preference(true));
        let week_start = NaiveDate::from_ymd_opt(2026, 7, 13).unwrap();
        repo.digests.lock().unwrap().insert(
            (user.profile.user_id, week_start),
            DigestRecord {
                id: Uuid::new_v4(),
                user_id: user.profile.user_id,
                week_start,
                status: DigestStatus::Sent,
                message_id: Some("prov_msg_1".to_string()),
                retry_count: 0,
                last_error: None,
                payload: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
                sent_at: Some(Utc::now()),
            },
        );
        let orchestrator = orchestrator(repo, MockBehavior::Succeed);
        let now = DateTime::parse_from_rfc3339("2026-07-20T09:00:00Z").unwrap().with_timezone(&Utc);
        let outcome = orchestrator.process_user(&user, now, false, false, None).await;
        assert!(matches!(outcome, UserOutcome::Skipped { reason: SkipReason::AlreadySent, .. }));
    }

    #[tokio::test]
    async fn force_mode_bypasses_the_already_sent_guard() {
        let repo = Arc::new(InMemoryRepo::default());
        let user = sendable_user(preference(true));
        let week_start = NaiveDate::from_ymd_opt(2026, 7, 13).unwrap();
        repo.digests.lock().unwrap().insert(
            (user.profile.user_id, week_start),
            DigestRecord {
                id: Uuid::new_v4(),
                user_id: user.profile.user_id,
                week_start,
                status: DigestStatus::Sent,
                message_id: Some("prov_msg_1".to_string()),
                retry_count: 0,
                last_error: None,
                payload: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
                sent_at: Some(Utc::now()),
            },
        );
        let orchestrator = orchestrator(repo, MockBehavior::Succeed);
        let now = DateTime::parse_from_rfc3339("2026-07-22T13:00:00Z").unwrap().with_timezone(&Utc);
        let outcome = orchestrator.process_user(&user, now, true, false, None).await;
        assert!(matches!(outcome, UserOutcome::Skipped { reason: SkipReason::NoActivitySkip, .. }));
    }

    #[tokio::test]
    async fn transient_dispatch_failure_marks_the_digest_failed_and_increments_retry() {
        let repo = Arc::new(InMemoryRepo::default());
        let mut pref = preference(true);
        pref.no_activity_policy = NoActivityPolicy::Brief;
        let user = sendable_user(pref);
        let orchestrator = orchestrator(repo.clone(), MockBehavior::FailTransient);
        let now = DateTime::parse_from_rfc3339("2026-07-20T09:00:00Z").unwrap().with_timezone(&Utc);
        let outcome = orchestrator.process_user(&user, now, false, false, None).await;
        assert!(matches!(outcome, UserOutcome::Failed { reason: FailReason::EmailSendFailed, .. }));

        let digests = repo.digests.lock().unwrap();
        let record = digests.values().next().expect("digest recorded");
        assert_eq!(record.status, DigestStatus::Failed);
        assert_eq!(record.retry_count, 1);
    }

    #[tokio::test]
    async fn permanent_dispatch_failure_adds_the_recipient_to_the_suppression_list() {
        let repo = Arc::new(InMemoryRepo::default());
        let mut pref = preference(true);
        pref.no_activity_policy = NoActivityPolicy::Brief;
        let user = sendable_user(pref);
        let orchestrator = orchestrator(repo.clone(), MockBehavior::FailPermanent);
        let now = DateTime::parse_from_rfc3339("2026-07-20T09:00:00Z").unwrap().with_timezone(&Utc);
        let outcome = orchestrator.process_user(&user, now, false, false, None).await;
        assert!(matches!(outcome, UserOutcome::Failed { reason: FailReason::EmailSendFailed, .. }));
        assert!(repo.suppressed.lock().unwrap().contains(&user.profile.email));
    }

    #[tokio::test]
    async fn a_real_send_logs_exactly_one_sent_email_event() {
        let repo = Arc::new(InMemoryRepo::default());
        let mut pref = preference(true);
        pref.no_activity_policy = NoActivityPolicy::Brief;
        let user = sendable_user(pref);
        let orchestrator = orchestrator(repo.clone(), MockBehavior::Succeed);
        let now = DateTime::parse_from_rfc3339("2026-07-20T09:00:00Z").unwrap().with_timezone(&Utc);
        let outcome = orchestrator.process_user(&user, now, false, false, None).await;
        assert!(matches!(outcome, UserOutcome::Sent { reason: SentReason::EmailSent, .. }));

        let digests = repo.digests.lock().unwrap();
        let record = digests.values().next().expect("digest recorded");
        let message_id = record.message_id.clone().expect("message_id recorded");
        drop(digests);

        let events = repo.events.lock().unwrap();
        let sent_events: Vec<_> = events
            .iter()
            .filter(|(id, kind)| id == &message_id && matches!(kind, weekly_core::model::EmailEventType::Sent))
            .collect();
        assert_eq!(sent_events.len(), 1);
    }

    #[tokio::test]
    async fn suppressed_recipients_never_reach_the_provider() {
        let repo = Arc::new(InMemoryRepo::default());
        let mut pref = preference(true);
        pref.no_activity_policy = NoActivityPolicy::Brief;
        let user = sendable_user(pref);
        repo.suppressed.lock().unwrap().push(user.profile.email.clone());
        let orchestrator = orchestrator(repo.clone(), MockBehavior::Succeed);
        let now = DateTime::parse_from_rfc3339("2026-07-20T09:00:00Z").unwrap().with_timezone(&Utc);
        let outcome = orchestrator.process_user(&user, now, false, false, None).await;
        assert!(matches!(outcome, UserOutcome::Failed { reason: FailReason::EmailSendFailed, .. }));
    }
}
