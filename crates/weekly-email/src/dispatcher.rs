//! Email Dispatcher (C6): validates a recipient, honors suppression
//! (resolved by the caller via the repository — this crate has no
//! database dependency), fills in the unsubscribe headers §4.6 mandates,
//! and hands the assembled message to an [`EmailProvider`].

use crate::providers::{EmailProvider, OutboundEmail, SendOutcome};
use std::sync::Arc;
use weekly_core::error::DispatchError;

pub struct EmailDispatcher {
    provider: Arc<dyn EmailProvider>,
    from_email: String,
    from_name: String,
}

impl EmailDispatcher {
    pub fn new(provider: Arc<dyn EmailProvider>, from_email: impl Into<String>, from_name: impl Into<String>) -> Self {
        Self {
            provider,
            from_email: from_email.into(),
            from_name: from_name.into(),
        }
    }

    /// Sends a rendered message to `to_email`. `is_suppressed` is resolved
    /// by the caller (`Repository::is_suppressed`) since this crate does
    /// not depend on the storage layer — the dispatcher's own job is to
    /// refuse before any provider call, not to look suppression up.
    #[allow(clippy::too_many_arguments)]
    pub async fn send(
        &self,
        to_email: &str,
        to_name: Option<&str>,
        subject: &str,
        html_body: &str,
        text_body: &str,
        unsubscribe_url: &str,
        is_suppressed: bool,
    ) -> Result<SendOutcome, DispatchError> {
        self.send_with_template(to_email, to_name, subject, html_body, text_body, unsubscribe_url, is_suppressed, None, None)
            .await
    }

    /// As [`Self::send`], but also carries a hosted-template identifier and
    /// parameter map for providers that render server-side (§4.5's
    /// "template params" mode, selected when `EMAIL_TEMPLATE_ID` is set).
    #[allow(clippy::too_many_arguments)]
    pub async fn send_with_template(
        &self,
        to_email: &str,
        to_name: Option<&str>,
        subject: &str,
        html_body: &str,
        text_body: &str,
        unsubscribe_url: &str,
        is_suppressed: bool,
        template_id: Option<&str>,
        template_params: Option<serde_json::Value>,
    ) -> Result<SendOutcome, DispatchError> {
        let trimmed = to_email.trim();
        if trimmed.is_empty() {
            return Err(DispatchError::Permanent("recipient email is empty".to_string()));
        }
        if !is_syntactically_valid(trimmed) {
            return Err(DispatchError::Permanent(format!("recipient email is malformed: {trimmed}")));
        }
        if is_suppressed {
            return Err(DispatchError::Suppressed(trimmed.to_string()));
        }

        let message = OutboundEmail {
            from_email: self.from_email.clone(),
            from_name: self.from_name.clone(),
            to_email: trimmed.to_string(),
            to_name: to_name.map(|s| s.to_string()),
            subject: subject.to_string(),
            html_body: html_body.to_string(),
            text_body: text_body.to_string(),
            unsubscribe_url: unsubscribe_url.to_string(),
            unsubscribe_mailto: format!("mailto:{}?subject=unsubscribe", self.from_email),
            template_id: template_id.map(|s| s.to_string()),
            template_params,
        };

        self.provider.send(&message).await
    }
}

/// Minimal syntax check: exactly one `@`, non-empty local and domain
/// parts, domain contains an interior dot, no whitespace. Not a full
/// RFC 5322 validator — the provider is the final authority on whether an
/// address is actually deliverable.
pub fn is_syntactically_valid(email: &str) -> bool {
    if email.is_empty() || email.contains(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return false;
    }
    domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mock::{MockBehavior, MockEmailProvider};

    fn dispatcher(behavior: MockBehavior) -> (EmailDispatcher, Arc<MockEmailProvider>) {
        let provider = Arc::new(MockEmailProvider::new().with_behavior(behavior));
        let dispatcher = EmailDispatcher::new(provider.clone(), "digest@example.com", "Weekly Digest");
        (dispatcher, provider)
    }

    #[test]
    fn validates_common_addresses() {
        assert!(is_syntactically_valid("person@example.com"));
        assert!(!is_syntactically_valid(""));
        assert!(!is_syntactically_valid("no-at-sign"));
        assert!(!is_syntactically_valid("a@b"));
        assert!(!is_syntactically_valid("a b@example.com"));
        assert!(!is_syntactically_valid("a@@example.com"));
    }

    #[tokio::test]
    async fn rejects_empty_recipient_without_calling_the_provider() {
        let (dispatcher, provider) = dispatcher(MockBehavior::Succeed);
        let err = dispatcher
            .send("", None, "subj", "<p>hi</p>", "hi", "https://e/u", false)
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
        assert_eq!(provider.send_call_count(), 0);
    }

    #[tokio::test]
    async fn rejects_malformed_recipient_without_calling_the_provider() {
        let (dispatcher, provider) = dispatcher(MockBehavior::Succeed);
        let err = dispatcher
            .send("not-an-email", None, "subj", "<p>hi</p>", "hi", "https://e/u", false)
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
        assert_eq!(provider.send_call_count(), 0);
    }

    #[tokio::test]
    async fn rejects_suppressed_recipient_without_calling_the_provider() {
        let (dispatcher, provider) = dispatcher(MockBehavior::Succeed);
        let err = dispatcher
            .send("person@example.com", None, "subj", "<p>hi</p>", "hi", "https://e/u", true)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Suppressed(_)));
        assert_eq!(provider.send_call_count(), 0);
    }

    #[tokio::test]
    async fn sends_a_valid_unsuppressed_recipient() {
        let (dispatcher, provider) = dispatcher(MockBehavior::Succeed);
        let outcome = dispatcher
            .send("person@example.com", Some("Person"), "subj", "<p>hi</p>", "hi", "https://e/u", false)
            .await
            .unwrap();
        assert!(!outcome.message_id.is_empty());
        let sent = provider.sent_emails();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].unsubscribe_mailto, "mailto:digest@example.com?subject=unsubscribe");
    }

    #[tokio::test]
    async fn transient_provider_errors_are_retryable() {
        let (dispatcher, _) = dispatcher(MockBehavior::FailTransient);
        let err = dispatcher
            .send("person@example.com", None, "subj", "<p>hi</p>", "hi", "https://e/u", false)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
