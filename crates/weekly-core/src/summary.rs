//! Optional AI-generated weekly summary, with a deterministic fallback.
//!
//! Grounded on `original_source/app/services/ai_summary_service.py`:
//! `SummaryEnricher` stands in for `AISummaryService`, and
//! [`fallback_summary`] reproduces `_get_simple_fallback_summary` exactly.

use crate::model::ActivityItem;
use async_trait::async_trait;

/// A pluggable capability that turns a week's activity into a short prose
/// summary. Implementations may call out to an LLM; callers must treat
/// failure as non-fatal and fall back to [`fallback_summary`].
#[async_trait]
pub trait SummaryEnricher: Send + Sync {
    async fn summarize(&self, items: &[ActivityItem]) -> anyhow::Result<String>;

    /// Whether this enricher is currently able to serve requests (e.g. an
    /// API key is configured). Orchestrators should skip straight to the
    /// fallback when this is `false` rather than attempting and failing.
    fn is_available(&self) -> bool {
        true
    }
}

/// An enricher that never calls out anywhere; always returns the
/// deterministic fallback. Used when no LLM capability is configured.
pub struct NoopSummaryEnricher;

#[async_trait]
impl SummaryEnricher for NoopSummaryEnricher {
    async fn summarize(&self, items: &[ActivityItem]) -> anyhow::Result<String> {
        Ok(fallback_summary(items))
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// "You captured N insight(s) this week..." with correct pluralization,
/// matching `_get_simple_fallback_summary` verbatim.
pub fn fallback_summary(items: &[ActivityItem]) -> String {
    let count = items.len();
    if count == 0 {
        return "You didn't capture any insights this week. Start exploring to build your knowledge base!"
            .to_string();
    }
    if count == 1 {
        "You captured 1 insight this week. Keep up the great work building your knowledge base!".to_string()
    } else {
        format!("You captured {count} insights this week. Keep up the great work building your knowledge base!")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_summary_pluralizes_correctly() {
        assert!(fallback_summary(&[]).contains("didn't capture any"));
    }

    #[tokio::test]
    async fn noop_enricher_is_unavailable_and_uses_fallback() {
        let enricher = NoopSummaryEnricher;
        assert!(!enricher.is_available());
        let summary = enricher.summarize(&[]).await.unwrap();
        assert!(summary.contains("didn't capture any"));
    }
}
