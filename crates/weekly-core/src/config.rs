//! Process-wide configuration for the weekly digest system.
//!
//! Loading configuration (from env vars, files, CLI flags) is outside the
//! core's scope; callers build a [`WeeklyConfig`] value and inject it.
//! [`WeeklyConfig::from_env`] is provided only as a convenience for tests
//! and examples.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyConfig {
    pub sender_email: String,
    pub sender_name: String,
    pub unsubscribe_base_url: String,
    pub app_base_url: String,
    pub email_provider_api_key: Option<String>,
    pub email_template_id: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub llm_model: Option<String>,
    pub webhook_secret: Option<String>,
    pub cron_secret: Option<String>,
    pub max_retries: u32,
    pub batch_size: usize,
    pub sweep_dry_run: bool,
}

impl Default for WeeklyConfig {
    fn default() -> Self {
        Self {
            sender_email: "digest@example.com".to_string(),
            sender_name: "Weekly Digest".to_string(),
            unsubscribe_base_url: "https://example.com/unsubscribe".to_string(),
            app_base_url: "https://example.com".to_string(),
            email_provider_api_key: None,
            email_template_id: None,
            llm_api_key: None,
            llm_base_url: None,
            llm_model: None,
            webhook_secret: None,
            cron_secret: None,
            max_retries: 3,
            batch_size: 50,
            sweep_dry_run: false,
        }
    }
}

impl WeeklyConfig {
    /// Builds a config from environment variables, falling back to
    /// [`WeeklyConfig::default`] for anything unset. Intended for tests and
    /// examples, not for use by the core itself.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            sender_email: std::env::var("SENDER_EMAIL").unwrap_or(defaults.sender_email),
            sender_name: std::env::var("SENDER_NAME").unwrap_or(defaults.sender_name),
            unsubscribe_base_url: std::env::var("UNSUBSCRIBE_BASE_URL")
                .unwrap_or(defaults.unsubscribe_base_url),
            app_base_url: std::env::var("APP_BASE_URL").unwrap_or(defaults.app_base_url),
            email_provider_api_key: std::env::var("EMAIL_PROVIDER_API_KEY").ok(),
            email_template_id: std::env::var("EMAIL_TEMPLATE_ID").ok(),
            llm_api_key: std::env::var("LLM_API_KEY").ok(),
            llm_base_url: std::env::var("LLM_BASE_URL").ok(),
            llm_model: std::env::var("LLM_MODEL").ok(),
            webhook_secret: std::env::var("WEBHOOK_SECRET").ok(),
            cron_secret: std::env::var("CRON_SECRET").ok(),
            max_retries: std::env::var("MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_retries),
            batch_size: std::env::var("BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.batch_size),
            sweep_dry_run: std::env::var("SWEEP_DRY_RUN")
                .ok()
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.sweep_dry_run),
        }
    }

    pub fn unsubscribe_url(&self, token: &str) -> String {
        format!("{}/{}", self.unsubscribe_base_url.trim_end_matches('/'), token)
    }

    pub fn login_url(&self) -> String {
        format!("{}/login", self.app_base_url.trim_end_matches('/'))
    }
}
