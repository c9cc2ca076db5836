//! formsheet-core: form submission normaliser and record store.
//!
//! This crate exposes the pipeline layers as public modules, plus the shared
//! types used across them.
//!
//! # Architecture
//!
//! ```text
//! Submission ──► Normalizer ──► Store (load ─► upsert ─► save)
//!                                 │
//!                                 └──► Admin (dashboard, export, clear)
//! ```
//!
//! Every request runs start to finish on the calling thread. The backing
//! file is the only state shared between requests.

pub mod admin;
pub mod config;
pub mod error;
pub mod export;
pub mod handler;
pub mod normalizer;
pub mod store;
pub mod types;

pub use config::{Config, DedupKey, FieldMap};
pub use handler::{Handled, SubmissionHandler};
pub use normalizer::Normalizer;
pub use store::{CsvFileStore, DataDir, MemoryStore, RecordStore, RecordTable, UpsertOutcome};
pub use types::{Consent, FieldValue, Submission, SubmissionRecord, NEWSLETTER_DECLINED};
