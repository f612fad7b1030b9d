//! Deterministic, call-counted mock provider for tests.
//!
//! Grounded on `temps-email/src/providers/mock.rs`'s `MockEmailProvider`
//! (atomic call counters, a `with_*` builder for configuring failure
//! modes), adapted to this crate's single `send` operation and to
//! returning the transient/permanent distinction the orchestrator's
//! retry accounting depends on.

use super::traits::{EmailProvider, OutboundEmail, SendOutcome};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use weekly_core::error::DispatchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    Succeed,
    FailTransient,
    FailPermanent,
}

/// An `EmailProvider` that never leaves the process. Records every
/// message it was asked to send so tests can assert on subject/body/
/// headers without a real mailbox.
pub struct MockEmailProvider {
    send_count: AtomicUsize,
    sent: Mutex<Vec<OutboundEmail>>,
    behavior: MockBehavior,
}

impl Default for MockEmailProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEmailProvider {
    pub fn new() -> Self {
        Self {
            send_count: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
            behavior: MockBehavior::Succeed,
        }
    }

    pub fn with_behavior(mut self, behavior: MockBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn send_call_count(&self) -> usize {
        self.send_count.load(Ordering::SeqCst)
    }

    pub fn sent_emails(&self) -> Vec<OutboundEmail> {
        self.sent.lock().expect("mock provider lock poisoned").clone()
    }
}

#[async_trait]
impl EmailProvider for MockEmailProvider {
    async fn send(&self, email: &OutboundEmail) -> Result<SendOutcome, DispatchError> {
        self.send_count.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            MockBehavior::Succeed => {
                self.sent
                    .lock()
                    .expect("mock provider lock poisoned")
                    .push(email.clone());
                Ok(SendOutcome {
                    message_id: format!("mock-message-{}", uuid::Uuid::new_v4()),
                })
            }
            MockBehavior::FailTransient => {
                Err(DispatchError::Transient("mock transient provider failure".to_string()))
            }
            MockBehavior::FailPermanent => {
                Err(DispatchError::Permanent("mock permanent provider failure".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> OutboundEmail {
        OutboundEmail {
            from_email: "digest@example.com".to_string(),
            from_name: "Weekly Digest".to_string(),
            to_email: "person@example.com".to_string(),
            to_name: None,
            subject: "Your weekly knowledge digest".to_string(),
            html_body: "<p>hi</p>".to_string(),
            text_body: "hi".to_string(),
            unsubscribe_url: "https://example.com/unsubscribe/tok".to_string(),
            unsubscribe_mailto: "mailto:digest@example.com?subject=unsubscribe".to_string(),
            template_id: None,
            template_params: None,
        }
    }

    #[tokio::test]
    async fn succeeds_and_records_the_message_by_default() {
        let provider = MockEmailProvider::new();
        let outcome = provider.send(&message()).await.unwrap();
        assert!(outcome.message_id.starts_with("mock-message-"));
        assert_eq!(provider.send_call_count(), 1);
        assert_eq!(provider.sent_emails().len(), 1);
    }

    #[tokio::test]
    async fn transient_behavior_is_retryable() {
        let provider = MockEmailProvider::new().with_behavior(MockBehavior::FailTransient);
        let err = provider.send(&message()).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn permanent_behavior_is_not_retryable() {
        let provider = MockEmailProvider::new().with_behavior(MockBehavior::FailPermanent);
        let err = provider.send(&message()).await.unwrap_err();
        assert!(!err.is_retryable());
    }
}
