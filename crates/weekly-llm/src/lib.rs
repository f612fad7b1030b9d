//! OpenAI-chat-completions-compatible weekly summary enricher.
//!
//! Grounded on `original_source/app/services/ai_summary_service.py`'s
//! `AISummaryService`: same endpoint shape (`base_url`/`api_key`/`model`),
//! same "max 3 bullet points, ≤100 chars each" post-processing
//! (`_format_ai_summary`), same `is_available()` gate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use weekly_core::model::ActivityItem;
use weekly_core::summary::{fallback_summary, SummaryEnricher};

const MAX_BULLETS: usize = 3;
const MAX_BULLET_CHARS: usize = 100;
const MAX_INSIGHTS_IN_PROMPT: usize = 20;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl OpenAiConfig {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
        }
    }
}

/// Calls an OpenAI-chat-completions-compatible endpoint to summarize a
/// week's insights into up to 3 bullet points; falls back to
/// [`fallback_summary`] when no key is configured or the call fails.
pub struct OpenAiSummaryEnricher {
    config: OpenAiConfig,
    client: reqwest::Client,
}

impl OpenAiSummaryEnricher {
    pub fn new(config: OpenAiConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");
        Self { config, client }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

fn build_prompt(items: &[ActivityItem]) -> String {
    let mut lines = Vec::new();
    for (i, item) in items.iter().take(MAX_INSIGHTS_IN_PROMPT).enumerate() {
        let title = item
            .title
            .clone()
            .unwrap_or_else(|| format!("Insight {}", i + 1));
        let body = item
            .summary
            .clone()
            .or_else(|| item.description.clone())
            .unwrap_or_default();
        lines.push(format!("- {title}: {body}"));
    }
    let insights_text = lines.join("\n");
    format!(
        "You are an assistant that analyzes a person's captured insights from \
         the past week and finds patterns, correlations and themes.\n\n\
         Review the following {count} insights and summarize up to 3 key \
         takeaways:\n\n{insights_text}\n\n\
         Respond with up to 3 bullet points, each starting with \"• \" and \
         fitting on a single line (under 100 characters). Focus on \
         meaningful connections, not just a list of items.",
        count = items.len(),
    )
}

/// Normalizes raw model output into at most 3 single-line "• " bullets,
/// each truncated to 100 characters, matching `_format_ai_summary`.
fn format_summary(content: &str) -> String {
    let mut bullets = Vec::new();
    for raw_line in content.lines() {
        if bullets.len() >= MAX_BULLETS {
            break;
        }
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        let bullet = if let Some(rest) = line.strip_prefix('•') {
            format!("• {}", rest.trim())
        } else if let Some(rest) = line.strip_prefix('-').or_else(|| line.strip_prefix('*')) {
            format!("• {}", rest.trim())
        } else {
            format!("• {line}")
        };
        bullets.push(truncate_bullet(&bullet));
    }
    bullets.join("\n")
}

fn truncate_bullet(bullet: &str) -> String {
    if bullet.chars().count() <= MAX_BULLET_CHARS {
        return bullet.to_string();
    }
    let truncated: String = bullet.chars().take(MAX_BULLET_CHARS - 3).collect();
    format!("{truncated}...")
}

#[async_trait]
impl SummaryEnricher for OpenAiSummaryEnricher {
    async fn summarize(&self, items: &[ActivityItem]) -> anyhow::Result<String> {
        if !self.is_available() || items.is_empty() {
            return Ok(fallback_summary(items));
        }

        let prompt = build_prompt(items);
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt,
            }],
            temperature: 0.0,
            max_tokens: 800,
        };

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("empty response from summary model"))?;

        Ok(format_summary(&content))
    }

    fn is_available(&self) -> bool {
        !self.config.api_key.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_summary_caps_at_three_bullets() {
        let content = "• one\n• two\n• three\n• four";
        let formatted = format_summary(content);
        assert_eq!(formatted.lines().count(), 3);
    }

    #[test]
    fn format_summary_normalizes_dash_bullets() {
        let formatted = format_summary("- first point");
        assert_eq!(formatted, "• first point");
    }

    #[test]
    fn format_summary_truncates_overlong_lines() {
        let long = "x".repeat(150);
        let formatted = format_summary(&format!("• {long}"));
        assert!(formatted.ends_with("..."));
        assert!(formatted.chars().count() <= MAX_BULLET_CHARS);
    }

    #[tokio::test]
    async fn unavailable_without_api_key_uses_fallback() {
        let enricher = OpenAiSummaryEnricher::new(OpenAiConfig::new(
            "",
            "https://api.openai.com/v1",
            "gpt-4o-mini",
        ));
        assert!(!enricher.is_available());
        let summary = enricher.summarize(&[]).await.unwrap();
        assert!(summary.contains("didn't capture any"));
    }
}
