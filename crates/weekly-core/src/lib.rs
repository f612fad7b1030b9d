//! Domain types and pure logic for the weekly knowledge digest system.
//!
//! This crate has no database or network dependency; it defines the
//! shapes (`model`), the scheduling math (`clock`), content assembly
//! (`content`), the AI-summary seam (`summary`), rendering (`render`),
//! per-user outcomes (`outcome`), configuration (`config`) and the
//! shared error taxonomy (`error`) that every other crate builds on.

pub mod clock;
pub mod config;
pub mod content;
pub mod error;
pub mod model;
pub mod outcome;
pub mod render;
pub mod summary;

pub use config::WeeklyConfig;
pub use error::{DispatchError, RenderError, RepositoryError, WeeklyError, WeeklyResult};
