//! Turns a [`DigestPayload`] into an email body, either as inline
//! HTML/text or as a nested parameter object for a templated provider.
//!
//! Grounded on `original_source/app/services/digest_job.py`'s
//! `_generate_html_content`/`_generate_text_content` (inline rendering)
//! and `send_digest_email` (`template_params`).

use crate::content::{DigestItemView, DigestPayload, StackView, Suggestion};
use crate::model::UserProfile;
use chrono::NaiveDate;
use serde_json::json;

#[derive(Debug, Clone)]
pub struct RenderedEmail {
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

/// Renders inline HTML and plain-text bodies for a digest payload.
pub fn render_inline(
    display_name: &str,
    payload: &DigestPayload,
    summary: Option<&str>,
    unsubscribe_url: &str,
    login_url: &str,
) -> RenderedEmail {
    let subject = subject_for(payload);
    let html_body = render_html(display_name, payload, summary, unsubscribe_url, login_url);
    let text_body = render_text(display_name, payload, summary, unsubscribe_url, login_url);
    RenderedEmail { subject, html_body, text_body }
}

fn subject_for(payload: &DigestPayload) -> String {
    match payload {
        DigestPayload::Activity { stats, .. } if stats.total_insights > 0 => {
            format!("Your Weekly Digest — {} new insights", stats.total_insights)
        }
        _ => "Your Weekly Digest".to_string(),
    }
}

fn render_html(
    display_name: &str,
    payload: &DigestPayload,
    summary: Option<&str>,
    unsubscribe_url: &str,
    login_url: &str,
) -> String {
    let mut html = String::new();
    html.push_str(&format!("<h1>Hi {display_name},</h1>\n"));

    if let Some(summary) = summary {
        html.push_str(&format!("<p>{summary}</p>\n"));
    }

    match payload {
        DigestPayload::Activity { stats, highlights, more_content, stacks, tag_summary, suggestions } => {
            html.push_str(&format!(
                "<p>This week: {} new insights, {} stacks.</p>\n",
                stats.total_insights, stats.total_stacks
            ));
            html.push_str(&html_section("Highlights", highlights));
            html.push_str(&html_section("More from this week", more_content));
            html.push_str(&html_stacks(stacks));
            if !tag_summary.is_empty() {
                html.push_str("<h2>By tag</h2>\n<ul>\n");
                for (tag, titles) in tag_summary {
                    html.push_str(&format!("<li><strong>{tag}:</strong> {titles}</li>\n"));
                }
                html.push_str("</ul>\n");
            }
            html.push_str(&html_suggestions(suggestions));
        }
        DigestPayload::Brief { suggestions } | DigestPayload::Suggestions { suggestions } => {
            html.push_str("<p>Nothing new to report this week.</p>\n");
            html.push_str(&html_suggestions(suggestions));
        }
        DigestPayload::Skip => {}
    }

    html.push_str(&format!(
        "<p><a href=\"{login_url}\">Open your workspace</a></p>\n\
         <p style=\"font-size:12px;color:#888;\">\
         <a href=\"{unsubscribe_url}\">Unsubscribe</a> from weekly digests.</p>\n"
    ));
    html
}

fn html_section(title: &str, items: &[DigestItemView]) -> String {
    if items.is_empty() {
        return String::new();
    }
    let mut out = format!("<h2>{title}</h2>\n<ul>\n");
    for item in items {
        let link = item
            .url
            .as_ref()
            .map(|u| format!("<a href=\"{u}\">{}</a>", item.title))
            .unwrap_or_else(|| item.title.clone());
        out.push_str(&format!("<li>{link}<br/>{}</li>\n", item.summary));
    }
    out.push_str("</ul>\n");
    out
}

fn html_stacks(stacks: &[StackView]) -> String {
    if stacks.is_empty() {
        return String::new();
    }
    let mut out = String::from("<h2>Stacks</h2>\n<ul>\n");
    for stack in stacks {
        out.push_str(&format!("<li>{} ({} items)</li>\n", stack.title, stack.item_count));
    }
    out.push_str("</ul>\n");
    out
}

fn html_suggestions(suggestions: &[Suggestion]) -> String {
    if suggestions.is_empty() {
        return String::new();
    }
    let mut out = String::from("<h2>Suggestions</h2>\n<ul>\n");
    for s in suggestions {
        out.push_str(&format!("<li><strong>{}</strong>: {}</li>\n", s.title, s.body));
    }
    out.push_str("</ul>\n");
    out
}

fn render_text(
    display_name: &str,
    payload: &DigestPayload,
    summary: Option<&str>,
    unsubscribe_url: &str,
    login_url: &str,
) -> String {
    let mut text = format!("Hi {display_name},\n\n");

    if let Some(summary) = summary {
        text.push_str(summary);
        text.push_str("\n\n");
    }

    match payload {
        DigestPayload::Activity { stats, highlights, more_content, stacks, tag_summary, suggestions } => {
            text.push_str(&format!(
                "This week: {} new insights, {} stacks.\n\n",
                stats.total_insights, stats.total_stacks
            ));
            text.push_str(&text_section("HIGHLIGHTS", highlights));
            text.push_str(&text_section("MORE FROM THIS WEEK", more_content));
            text.push_str(&text_stacks(stacks));
            if !tag_summary.is_empty() {
                text.push_str("BY TAG\n");
                for (tag, titles) in tag_summary {
                    text.push_str(&format!("- {tag}: {titles}\n"));
                }
                text.push('\n');
            }
            text.push_str(&text_suggestions(suggestions));
        }
        DigestPayload::Brief { suggestions } | DigestPayload::Suggestions { suggestions } => {
            text.push_str("Nothing new to report this week.\n\n");
            text.push_str(&text_suggestions(suggestions));
        }
        DigestPayload::Skip => {}
    }

    text.push_str(&format!("Open your workspace: {login_url}\n\nUnsubscribe: {unsubscribe_url}\n"));
    text
}

fn text_section(title: &str, items: &[DigestItemView]) -> String {
    if items.is_empty() {
        return String::new();
    }
    let mut out = format!("{title}\n");
    for item in items {
        out.push_str(&format!("- {}: {}\n", item.title, item.summary));
        if let Some(url) = &item.url {
            out.push_str(&format!("  {url}\n"));
        }
    }
    out.push('\n');
    out
}

fn text_stacks(stacks: &[StackView]) -> String {
    if stacks.is_empty() {
        return String::new();
    }
    let mut out = String::from("STACKS\n");
    for stack in stacks {
        out.push_str(&format!("- {} ({} items)\n", stack.title, stack.item_count));
    }
    out.push('\n');
    out
}

fn text_suggestions(suggestions: &[Suggestion]) -> String {
    if suggestions.is_empty() {
        return String::new();
    }
    let mut out = String::from("SUGGESTIONS\n");
    for s in suggestions {
        out.push_str(&format!("- {}: {}\n", s.title, s.body));
    }
    out.push('\n');
    out
}

/// Builds the nested parameter object for providers that render a
/// server-side template (e.g. Brevo's `template_params`), rather than the
/// self-contained HTML/text bodies `render_inline` produces.
///
/// The top-level `params` block carries the keys the template engine reads
/// directly (`params.tags`, `params.ai_summary`, `params.login_url`,
/// `params.unsubscribe_url`); `user`, `sections`, `activity_summary` and
/// `metadata` are carried through verbatim so the template can address the
/// same shape the Content Assembler produced.
#[allow(clippy::too_many_arguments)]
pub fn template_params(
    profile: &UserProfile,
    display_name: &str,
    timezone: &str,
    payload: &DigestPayload,
    summary: Option<&str>,
    unsubscribe_url: &str,
    login_url: &str,
    week_start: NaiveDate,
    week_end: NaiveDate,
) -> serde_json::Value {
    let ai_summary = summary.unwrap_or_default();
    let tags = tag_names(payload);

    let user = json!({
        "id": profile.user_id,
        "display_name": display_name,
        "email": profile.email,
        "timezone": timezone,
    });

    let (activity_summary, sections, metadata) = match payload {
        DigestPayload::Activity { stats, highlights, more_content, stacks, tag_summary, suggestions } => (
            json!({
                "total_activity": stats.total_activity,
                "total_insights": stats.total_insights,
                "total_stacks": stats.total_stacks,
                "url_insights": stats.url_insights,
                "text_insights": stats.text_insights,
                "recent_insights": stats.recent_insights,
                "insights_with_summaries": stats.insights_with_summaries,
                "insights_with_tags": stats.insights_with_tags,
                "engagement_score": stats.engagement_score,
            }),
            json!({
                "highlights": highlights.iter().map(item_view_json).collect::<Vec<_>>(),
                "more_content": more_content.iter().map(item_view_json).collect::<Vec<_>>(),
                "stacks": stacks.iter().map(stack_view_json).collect::<Vec<_>>(),
                "suggestions": suggestions.iter().map(suggestion_json).collect::<Vec<_>>(),
                "tag_summary": tag_summary,
            }),
            base_metadata(week_start, week_end, false, false, false, None),
        ),
        DigestPayload::Brief { suggestions } => (
            json!({}),
            json!({
                "highlights": [], "more_content": [], "stacks": [],
                "suggestions": suggestions.iter().map(suggestion_json).collect::<Vec<_>>(),
            }),
            base_metadata(week_start, week_end, false, true, false, None),
        ),
        DigestPayload::Suggestions { suggestions } => (
            json!({}),
            json!({
                "highlights": [], "more_content": [], "stacks": [],
                "suggestions": suggestions.iter().map(suggestion_json).collect::<Vec<_>>(),
            }),
            base_metadata(week_start, week_end, false, false, true, None),
        ),
        DigestPayload::Skip => (
            json!({}),
            json!({ "highlights": [], "more_content": [], "stacks": [], "suggestions": [] }),
            base_metadata(week_start, week_end, true, false, false, Some("no_activity")),
        ),
    };

    json!({
        "params": {
            "tags": tags,
            "ai_summary": ai_summary,
            "login_url": login_url,
            "unsubscribe_url": unsubscribe_url,
        },
        "user": user,
        "activity_summary": activity_summary,
        "sections": sections,
        "metadata": metadata,
    })
}

fn base_metadata(
    week_start: NaiveDate,
    week_end: NaiveDate,
    skipped: bool,
    brief_mode: bool,
    suggestions_mode: bool,
    reason: Option<&str>,
) -> serde_json::Value {
    json!({
        "week_start": week_start,
        "week_end": week_end,
        "skipped": skipped,
        "brief_mode": brief_mode,
        "suggestions_mode": suggestions_mode,
        "error": false,
        "reason": reason,
    })
}

fn tag_names(payload: &DigestPayload) -> Vec<String> {
    match payload {
        DigestPayload::Activity { tag_summary, .. } => tag_summary.iter().map(|(tag, _)| tag.clone()).collect(),
        _ => Vec::new(),
    }
}

fn item_view_json(item: &DigestItemView) -> serde_json::Value {
    json!({
        "title": item.title,
        "summary": item.summary,
        "url": item.url,
        "tags": item.tags,
    })
}

fn stack_view_json(stack: &StackView) -> serde_json::Value {
    json!({ "title": stack.title, "item_count": stack.item_count })
}

fn suggestion_json(suggestion: &Suggestion) -> serde_json::Value {
    json!({ "title": suggestion.title, "body": suggestion.body })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ActivityStats;
    use uuid::Uuid;

    fn activity_payload(total_insights: usize) -> DigestPayload {
        DigestPayload::Activity {
            stats: ActivityStats {
                total_activity: total_insights,
                total_insights,
                total_stacks: 0,
                url_insights: 0,
                text_insights: total_insights,
                recent_insights: 0,
                insights_with_summaries: 0,
                insights_with_tags: 0,
                engagement_score: 0.0,
            },
            highlights: vec![],
            more_content: vec![],
            stacks: vec![],
            tag_summary: vec![],
            suggestions: vec![],
        }
    }

    #[test]
    fn subject_mentions_insight_count_when_activity_present() {
        let subject = subject_for(&activity_payload(4));
        assert_eq!(subject, "Your Weekly Digest — 4 new insights");
    }

    #[test]
    fn subject_falls_back_when_no_activity() {
        assert_eq!(subject_for(&DigestPayload::Skip), "Your Weekly Digest");
        assert_eq!(subject_for(&activity_payload(0)), "Your Weekly Digest");
    }

    #[test]
    fn template_params_carries_required_keys() {
        let profile = UserProfile {
            user_id: Uuid::new_v4(),
            email: "person@example.com".to_string(),
            display_name: Some("Person".to_string()),
        };
        let week_start = NaiveDate::from_ymd_opt(2026, 7, 13).unwrap();
        let week_end = NaiveDate::from_ymd_opt(2026, 7, 20).unwrap();
        let value = template_params(
            &profile,
            "Person",
            "Asia/Tokyo",
            &activity_payload(2),
            Some("• You captured 2 insights this week."),
            "https://app.example/unsubscribe?token=abc",
            "https://app.example/login",
            week_start,
            week_end,
        );
        assert!(value["params"]["tags"].is_array());
        assert_eq!(value["params"]["ai_summary"], "• You captured 2 insights this week.");
        assert_eq!(value["params"]["login_url"], "https://app.example/login");
        assert_eq!(value["params"]["unsubscribe_url"], "https://app.example/unsubscribe?token=abc");
        assert!(value["user"].is_object());
        assert!(value["sections"].is_object());
        assert!(value["activity_summary"].is_object());
        assert_eq!(value["metadata"]["skipped"], false);
    }

    #[test]
    fn html_body_renders_stacks_section() {
        let mut payload = activity_payload(1);
        if let DigestPayload::Activity { stacks, .. } = &mut payload {
            stacks.push(StackView { title: "Reading list".to_string(), item_count: 3 });
        }
        let rendered = render_inline("Person", &payload, None, "https://u", "https://l");
        assert!(rendered.html_body.contains("Reading list"));
        assert!(rendered.text_body.contains("Reading list"));
    }
}
