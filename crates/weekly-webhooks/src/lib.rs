//! Webhook Ingestor (C8): translates inbound email-provider callbacks into
//! `EmailEvent` rows and suppression/digest-state updates.
//!
//! Grounded on `original_source/app/services/webhook_handler.py`'s
//! `BrevoWebhookHandler.process_webhook`/`_handle_event_type` dispatch, and
//! on `temps-webhooks/src/service.rs`'s `generate_signature` for the HMAC
//! scheme (inverted here into verification).

pub mod ingest;
pub mod signature;

pub use ingest::{IngestOutcome, InboundWebhookPayload, WebhookIngestor};
pub use signature::verify_signature;
