//! Email provider trait definitions.
//!
//! Grounded on `temps-email/src/providers/traits.rs`'s `EmailProvider`
//! trait, trimmed to this system's single `send` operation (no domain
//! identity/DKIM management — that's the provider's own onboarding, out
//! of scope for a transactional digest sender).

use async_trait::async_trait;
use weekly_core::error::DispatchError;

/// A fully-assembled outbound message, ready for a provider to send.
#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub from_email: String,
    pub from_name: String,
    pub to_email: String,
    pub to_name: Option<String>,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
    /// HTTPS unsubscribe link for the `List-Unsubscribe` header and the
    /// in-body footer link.
    pub unsubscribe_url: String,
    /// `mailto:` alternative for `List-Unsubscribe`.
    pub unsubscribe_mailto: String,
    /// Hosted-template identifier (`EMAIL_TEMPLATE_ID`), when the caller
    /// wants the provider to render server-side instead of `html_body`/
    /// `text_body` (§4.5's "template params" mode). A provider with no
    /// hosted-template concept (e.g. raw SMTP) is free to ignore both this
    /// and `template_params` and send the inline bodies unconditionally.
    pub template_id: Option<String>,
    /// The parameter map `render::template_params` produced, passed through
    /// verbatim for a hosted-template-aware provider to bind.
    pub template_params: Option<serde_json::Value>,
}

/// What a successful send returns: the provider's own message identifier,
/// which becomes `DigestRecord.message_id` and the join key for inbound
/// webhook events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOutcome {
    pub message_id: String,
}

/// The external transactional email provider, as a capability interface.
/// Implementations classify their own failures into
/// [`DispatchError::Transient`] (retry later) or
/// [`DispatchError::Permanent`] (do not retry); the dispatcher does not
/// inspect provider-specific error shapes.
#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<SendOutcome, DispatchError>;
}
