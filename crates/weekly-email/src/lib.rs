//! Email Dispatcher (C6): a provider-agnostic `EmailProvider` capability,
//! a `MockEmailProvider` and `SmtpEmailProvider` implementation of it, and
//! the `EmailDispatcher` that validates a recipient, honors suppression,
//! and sets the unsubscribe headers the spec requires before handing off
//! to the provider.

pub mod dispatcher;
pub mod providers;

pub use dispatcher::EmailDispatcher;
pub use providers::{
    EmailProvider, MockBehavior, MockEmailProvider, OutboundEmail, SendOutcome, SmtpConfig,
    SmtpEmailProvider, TlsMode,
};
