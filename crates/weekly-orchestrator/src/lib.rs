//! Digest Job / Orchestrator (C7): the sweep loop and per-user state
//! machine that wire the Repository, Summary Enricher and Email
//! Dispatcher together.
//!
//! Grounded on `original_source/app/services/digest_job.py`'s `DigestJob`
//! (`run_sweep`/`_process_batch`/`_process_user`), with the batch loop's
//! concurrency generalized per SPEC_FULL.md §5 from
//! `temps-notifications/src/digest/scheduler.rs`'s single `tokio::spawn`
//! background loop to a bounded worker pool per sweep.

pub mod orchestrator;

pub use orchestrator::{DigestOrchestrator, DRY_RUN_SENTINEL, SKIPPED_SENTINEL};
