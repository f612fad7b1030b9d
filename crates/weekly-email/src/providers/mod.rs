pub mod mock;
pub mod smtp;
pub mod traits;

pub use mock::{MockBehavior, MockEmailProvider};
pub use smtp::{SmtpConfig, SmtpEmailProvider, TlsMode};
pub use traits::{EmailProvider, OutboundEmail, SendOutcome};
