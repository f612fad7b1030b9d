//! Content assembly: turns a window of [`ActivityItem`]s into a scored,
//! sectioned [`DigestPayload`] ready for rendering.
//!
//! Grounded on `original_source/app/services/digest_content.py`'s
//! `DigestContentGenerator`; the scoring weights, section caps and
//! suggestion triggers below are carried over from there unchanged.

use crate::model::{ActivityItem, ActivityKind, NoActivityPolicy};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const MAX_HIGHLIGHTS: usize = 3;
const MAX_ADDITIONAL: usize = 7;
const MAX_SUGGESTIONS: usize = 5;
const MAX_STACKS: usize = 5;
const RECENT_WINDOW_DAYS: i64 = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestItemView {
    pub title: String,
    pub summary: String,
    pub url: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackView {
    pub title: String,
    pub item_count: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityStats {
    pub total_activity: usize,
    pub total_insights: usize,
    pub total_stacks: usize,
    pub url_insights: usize,
    pub text_insights: usize,
    pub recent_insights: usize,
    pub insights_with_summaries: usize,
    pub insights_with_tags: usize,
    pub engagement_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DigestPayload {
    /// Normal week: at least one qualifying activity item.
    Activity {
        stats: ActivityStats,
        highlights: Vec<DigestItemView>,
        more_content: Vec<DigestItemView>,
        stacks: Vec<StackView>,
        tag_summary: Vec<(String, String)>,
        suggestions: Vec<Suggestion>,
    },
    /// No activity this week, policy says send a short note.
    Brief { suggestions: Vec<Suggestion> },
    /// No activity this week, policy says send suggestions only.
    Suggestions { suggestions: Vec<Suggestion> },
    /// No activity this week, policy says skip sending entirely.
    Skip,
}

/// Builds the payload for one user's digest from their activity window.
pub fn build_digest_payload(items: &[ActivityItem], now: DateTime<Utc>, policy: NoActivityPolicy) -> DigestPayload {
    if items.is_empty() {
        return match policy {
            NoActivityPolicy::Skip => DigestPayload::Skip,
            NoActivityPolicy::Brief => DigestPayload::Brief {
                suggestions: onboarding_suggestions(),
            },
            NoActivityPolicy::Suggestions => DigestPayload::Suggestions {
                suggestions: evergreen_suggestions(),
            },
        };
    }

    let stats = analyze_activity(items, now);
    let mut scored: Vec<(f64, &ActivityItem)> = items
        .iter()
        .filter(|i| i.kind == ActivityKind::Insight)
        .map(|i| (score_insight(i, now), i))
        .collect();
    scored.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.1.created_at.cmp(&a.1.created_at))
    });

    let highlights: Vec<DigestItemView> = scored.iter().take(MAX_HIGHLIGHTS).map(|(_, i)| to_view(i)).collect();
    let more_content: Vec<DigestItemView> = scored
        .iter()
        .skip(MAX_HIGHLIGHTS)
        .take(MAX_ADDITIONAL)
        .map(|(_, i)| to_view(i))
        .collect();
    let stacks: Vec<StackView> = items
        .iter()
        .filter(|i| i.kind == ActivityKind::Stack)
        .take(MAX_STACKS)
        .map(to_stack_view)
        .collect();

    DigestPayload::Activity {
        suggestions: suggestions_for(&stats),
        tag_summary: summarize_by_tag(items),
        highlights,
        more_content,
        stacks,
        stats,
    }
}

fn analyze_activity(items: &[ActivityItem], now: DateTime<Utc>) -> ActivityStats {
    let insights: Vec<&ActivityItem> = items.iter().filter(|i| i.kind == ActivityKind::Insight).collect();
    let stacks = items.iter().filter(|i| i.kind == ActivityKind::Stack).count();
    let url_insights = insights.iter().filter(|i| i.url.is_some()).count();
    let recent_insights = insights
        .iter()
        .filter(|i| now - i.created_at < Duration::days(RECENT_WINDOW_DAYS))
        .count();
    let insights_with_summaries = insights.iter().filter(|i| has_summary(i)).count();
    let insights_with_tags = insights.iter().filter(|i| !i.tags.is_empty()).count();
    let engagement_score = insights.iter().map(|i| score_insight(i, now)).sum();

    ActivityStats {
        total_activity: items.len(),
        total_insights: insights.len(),
        total_stacks: stacks,
        url_insights,
        text_insights: insights.len() - url_insights,
        recent_insights,
        insights_with_summaries,
        insights_with_tags,
        engagement_score,
    }
}

fn has_summary(item: &ActivityItem) -> bool {
    item.summary.as_ref().is_some_and(|s| !s.trim().is_empty())
}

/// base 1.0 for a title, +2.0 for a summary, +1.0 for tags, +1.0 for a
/// url, plus a recency bonus: <1 day +3.0, <3 days +2.0, <7 days +1.0.
fn score_insight(item: &ActivityItem, now: DateTime<Utc>) -> f64 {
    let mut score = 0.0;
    if item.title.as_ref().is_some_and(|t| !t.trim().is_empty()) {
        score += 1.0;
    }
    if has_summary(item) {
        score += 2.0;
    }
    if !item.tags.is_empty() {
        score += 1.0;
    }
    if item.url.is_some() {
        score += 1.0;
    }
    let age = now - item.created_at;
    score += if age < Duration::days(1) {
        3.0
    } else if age < Duration::days(3) {
        2.0
    } else if age < Duration::days(7) {
        1.0
    } else {
        0.0
    };
    score
}

/// Fallback chain: summary, else description truncated to 200 chars,
/// else title, else a placeholder.
fn insight_summary(item: &ActivityItem) -> String {
    if let Some(summary) = item.summary.as_ref().filter(|s| !s.trim().is_empty()) {
        return summary.clone();
    }
    if let Some(desc) = item.description.as_ref().filter(|d| !d.trim().is_empty()) {
        return truncate(desc, 200);
    }
    if let Some(title) = item.title.as_ref().filter(|t| !t.trim().is_empty()) {
        return title.clone();
    }
    "No summary available".to_string()
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let truncated: String = s.chars().take(max_chars).collect();
    format!("{truncated}...")
}

fn to_view(item: &ActivityItem) -> DigestItemView {
    DigestItemView {
        title: item.title.clone().unwrap_or_else(|| "Untitled".to_string()),
        summary: insight_summary(item),
        url: item.url.clone(),
        tags: item.tags.clone(),
    }
}

fn to_stack_view(item: &ActivityItem) -> StackView {
    StackView {
        title: item.title.clone().unwrap_or_else(|| "Untitled stack".to_string()),
        item_count: item.item_count.unwrap_or(0),
    }
}

/// Groups insights by tag, bucketing untagged items under "Untagged",
/// joining up to the first 6 titles per tag with commas.
fn summarize_by_tag(items: &[ActivityItem]) -> Vec<(String, String)> {
    let mut by_tag: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for item in items.iter().filter(|i| i.kind == ActivityKind::Insight) {
        let title = item.title.clone().unwrap_or_else(|| "Untitled".to_string());
        if item.tags.is_empty() {
            by_tag.entry("Untagged".to_string()).or_default().push(title);
        } else {
            for tag in &item.tags {
                by_tag.entry(tag.clone()).or_default().push(title.clone());
            }
        }
    }
    by_tag
        .into_iter()
        .map(|(tag, titles)| {
            let joined = titles.iter().take(6).cloned().collect::<Vec<_>>().join(", ");
            (tag, joined)
        })
        .collect()
}

fn suggestions_for(stats: &ActivityStats) -> Vec<Suggestion> {
    let mut suggestions = Vec::new();

    if stats.total_stacks == 0 && stats.total_insights >= 1 {
        suggestions.push(Suggestion {
            title: "Organize Your Insights".to_string(),
            body: "Group related insights into a stack to find them faster later.".to_string(),
        });
    }

    let untagged = stats.total_insights.saturating_sub(stats.insights_with_tags);
    if untagged > 3 {
        suggestions.push(Suggestion {
            title: "Add Tags to Your Insights".to_string(),
            body: format!("{untagged} of your insights don't have tags yet. Tags make them easier to find."),
        });
    }

    if stats.total_insights == 0 {
        suggestions.extend(onboarding_suggestions());
    } else if stats.total_insights <= 4 {
        suggestions.push(Suggestion {
            title: "Keep the Momentum Going".to_string(),
            body: "Capture one more insight this week to build the habit.".to_string(),
        });
    }

    suggestions.truncate(MAX_SUGGESTIONS);
    suggestions
}

fn onboarding_suggestions() -> Vec<Suggestion> {
    vec![Suggestion {
        title: "Capture Your First Insight".to_string(),
        body: "Save something you read or learned this week to get started.".to_string(),
    }]
}

/// Three evergreen nudges for `NoActivityPolicy::Suggestions`, distinct
/// from the single onboarding suggestion `Brief` sends (§4.3).
fn evergreen_suggestions() -> Vec<Suggestion> {
    vec![
        Suggestion {
            title: "Capture Your First Insight".to_string(),
            body: "Save something you read or learned this week to get started.".to_string(),
        },
        Suggestion {
            title: "Organize Your Insights".to_string(),
            body: "Group related insights into a stack to find them faster later.".to_string(),
        },
        Suggestion {
            title: "Build a Weekly Habit".to_string(),
            body: "Set aside a few minutes each week to capture what you've been reading.".to_string(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn insight(now: DateTime<Utc>, age_days: i64, summary: Option<&str>, tags: Vec<&str>) -> ActivityItem {
        ActivityItem {
            id: Uuid::new_v4(),
            kind: ActivityKind::Insight,
            title: Some("Title".to_string()),
            description: None,
            summary: summary.map(|s| s.to_string()),
            url: None,
            image_url: None,
            thought: None,
            tags: tags.into_iter().map(|t| t.to_string()).collect(),
            item_count: None,
            created_at: now - Duration::days(age_days),
            updated_at: now - Duration::days(age_days),
        }
    }

    #[test]
    fn empty_activity_skips_when_policy_is_skip() {
        let now = Utc::now();
        let payload = build_digest_payload(&[], now, NoActivityPolicy::Skip);
        assert!(matches!(payload, DigestPayload::Skip));
    }

    #[test]
    fn empty_activity_with_brief_policy_carries_onboarding_suggestion() {
        let now = Utc::now();
        let payload = build_digest_payload(&[], now, NoActivityPolicy::Brief);
        match payload {
            DigestPayload::Brief { suggestions } => assert_eq!(suggestions.len(), 1),
            _ => panic!("expected Brief"),
        }
    }

    #[test]
    fn highlights_are_capped_and_sorted_by_score() {
        let now = Utc::now();
        let items: Vec<ActivityItem> = (0..10)
            .map(|i| insight(now, i, Some("summary"), vec!["a"]))
            .collect();
        let payload = build_digest_payload(&items, now, NoActivityPolicy::Brief);
        match payload {
            DigestPayload::Activity { highlights, more_content, .. } => {
                assert_eq!(highlights.len(), MAX_HIGHLIGHTS);
                assert!(more_content.len() <= MAX_ADDITIONAL);
            }
            _ => panic!("expected Activity"),
        }
    }

    #[test]
    fn empty_activity_with_suggestions_policy_carries_three_evergreen_suggestions() {
        let now = Utc::now();
        let payload = build_digest_payload(&[], now, NoActivityPolicy::Suggestions);
        match payload {
            DigestPayload::Suggestions { suggestions } => assert_eq!(suggestions.len(), 3),
            _ => panic!("expected Suggestions"),
        }
    }

    #[test]
    fn suggests_tagging_when_many_untagged() {
        let now = Utc::now();
        let items: Vec<ActivityItem> = (0..5).map(|i| insight(now, i, Some("s"), vec![])).collect();
        let payload = build_digest_payload(&items, now, NoActivityPolicy::Brief);
        match payload {
            DigestPayload::Activity { suggestions, .. } => {
                assert!(suggestions.iter().any(|s| s.title == "Add Tags to Your Insights"));
            }
            _ => panic!("expected Activity"),
        }
    }

    #[test]
    fn tag_summary_buckets_untagged_items() {
        let now = Utc::now();
        let items = vec![insight(now, 0, Some("s"), vec![])];
        let summary = summarize_by_tag(&items);
        assert_eq!(summary[0].0, "Untagged");
    }
}
