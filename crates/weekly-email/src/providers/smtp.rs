//! lettre-backed SMTP provider.
//!
//! Grounded on `temps-notifications/src/services.rs`'s `EmailProvider`
//! (`TlsMode`/`AsyncSmtpTransport`/`TlsParametersBuilder` setup), adapted
//! from that multi-recipient notification broadcaster to this system's
//! single transactional recipient per call, with the `List-Unsubscribe`/
//! `List-Unsubscribe-Post` headers §4.6 requires added on top.
//!
//! Transient/permanent classification follows SMTP reply-code convention
//! (4yz is transient, 5yz is permanent) rather than the HTTP-flavored 5xx/
//! 4xx split elsewhere in §4.6, since that split describes an HTTP-API
//! provider and SMTP's own codes mean the opposite; see DESIGN.md.

use super::traits::{EmailProvider, OutboundEmail, SendOutcome};
use async_trait::async_trait;
use lettre::message::header::{Header, HeaderName, HeaderValue};
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParametersBuilder};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::error::Error as StdError;
use weekly_core::error::DispatchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    /// Plaintext SMTP. Only sensible against `localhost` test relays.
    None,
    /// Opportunistic or required STARTTLS on the plain SMTP port.
    Starttls,
    /// Implicit TLS (SMTPS) from the first byte.
    Tls,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tls_mode: TlsMode,
    pub accept_invalid_certs: bool,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            smtp_host: "localhost".to_string(),
            smtp_port: 587,
            username: None,
            password: None,
            tls_mode: TlsMode::Starttls,
            accept_invalid_certs: false,
        }
    }
}

pub struct SmtpEmailProvider {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpEmailProvider {
    pub fn new(config: SmtpConfig) -> anyhow::Result<Self> {
        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host).port(config.smtp_port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            if !username.is_empty() {
                builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
            }
        }

        let accept_invalid = config.accept_invalid_certs || is_local_host(&config.smtp_host);
        let mailer = match config.tls_mode {
            TlsMode::None => builder.build(),
            TlsMode::Starttls => {
                let tls = TlsParametersBuilder::new(config.smtp_host.clone())
                    .dangerous_accept_invalid_certs(accept_invalid)
                    .dangerous_accept_invalid_hostnames(accept_invalid)
                    .build()?;
                builder.tls(Tls::Opportunistic(tls)).build()
            }
            TlsMode::Tls => {
                let tls = TlsParametersBuilder::new(config.smtp_host.clone())
                    .dangerous_accept_invalid_certs(accept_invalid)
                    .dangerous_accept_invalid_hostnames(accept_invalid)
                    .build()?;
                let mut relay = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)?
                    .port(config.smtp_port)
                    .tls(Tls::Wrapper(tls));
                if let (Some(username), Some(password)) = (&config.username, &config.password) {
                    if !username.is_empty() {
                        relay = relay.credentials(Credentials::new(username.clone(), password.clone()));
                    }
                }
                relay.build()
            }
        };

        Ok(Self { mailer })
    }
}

fn is_local_host(host: &str) -> bool {
    host == "localhost" || host == "127.0.0.1"
}

/// `List-Unsubscribe: <mailto:...>, <https://...>`
struct ListUnsubscribe(String);

impl Header for ListUnsubscribe {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_str("List-Unsubscribe")
    }

    fn parse(s: &str) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        Ok(ListUnsubscribe(s.to_string()))
    }

    fn display(&self) -> HeaderValue {
        HeaderValue::new(Self::name(), self.0.clone())
    }
}

/// `List-Unsubscribe-Post: List-Unsubscribe=One-Click`, the RFC 8058
/// one-click opt-out mailbox providers look for.
struct ListUnsubscribePost;

impl Header for ListUnsubscribePost {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_str("List-Unsubscribe-Post")
    }

    fn parse(_s: &str) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        Ok(ListUnsubscribePost)
    }

    fn display(&self) -> HeaderValue {
        HeaderValue::new(Self::name(), "List-Unsubscribe=One-Click".to_string())
    }
}

/// Tag header carried on every digest send so provider-side logs and
/// webhook metadata can be filtered to this campaign.
struct XCampaign;

impl Header for XCampaign {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_str("X-Campaign")
    }

    fn parse(_s: &str) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        Ok(XCampaign)
    }

    fn display(&self) -> HeaderValue {
        HeaderValue::new(Self::name(), "weekly-digest".to_string())
    }
}

#[async_trait]
impl EmailProvider for SmtpEmailProvider {
    async fn send(&self, email: &OutboundEmail) -> Result<SendOutcome, DispatchError> {
        let from: Mailbox = format!("{} <{}>", email.from_name, email.from_email)
            .parse()
            .map_err(|e| DispatchError::Permanent(format!("invalid sender address: {e}")))?;

        let to_display = email.to_name.clone().unwrap_or_else(|| email.to_email.clone());
        let to: Mailbox = format!("{to_display} <{}>", email.to_email)
            .parse()
            .map_err(|e| DispatchError::Permanent(format!("invalid recipient address: {e}")))?;

        let list_unsubscribe = format!("<{}>, <{}>", email.unsubscribe_mailto, email.unsubscribe_url);

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(email.subject.clone())
            .header(ListUnsubscribe(list_unsubscribe))
            .header(ListUnsubscribePost)
            .header(XCampaign)
            .multipart(
                MultiPart::alternative()
                    .singlepart(SinglePart::plain(email.text_body.clone()))
                    .singlepart(SinglePart::html(email.html_body.clone())),
            )
            .map_err(|e| DispatchError::Permanent(format!("failed to build message: {e}")))?;

        self.mailer
            .send(message)
            .await
            .map(|_| SendOutcome {
                // lettre's SMTP transport does not surface a provider
                // message-id; synthesize one from the recipient and send
                // time so downstream joins still have a stable key.
                message_id: format!("smtp-{}-{}", email.to_email, chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0)),
            })
            .map_err(classify_smtp_error)
    }
}

fn classify_smtp_error(err: lettre::transport::smtp::Error) -> DispatchError {
    let message = err.to_string();
    if let Some(code) = message.split_whitespace().find_map(|tok| {
        let digits: String = tok.chars().take(3).collect();
        digits.parse::<u16>().ok().filter(|_| digits.len() == 3)
    }) {
        if (500..600).contains(&code) {
            return DispatchError::Permanent(message);
        }
        if (400..500).contains(&code) {
            return DispatchError::Transient(message);
        }
    }
    DispatchError::Transient(message)
}
