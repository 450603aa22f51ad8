//! `pecbox`: ingest a certified-mail (PEC) mailbox into a report and a
//! folder of attachments.
//!
//! The library is the ingestion core: an IMAP (or offline) session behind a
//! trait, a MIME parser with bounded traversal, rule-based categorization,
//! collision-safe attachment extraction and pluggable report sinks, tied
//! together by [`pipeline::Pipeline`].

pub mod categorize;
pub mod config;
pub mod error;
pub mod export;
pub mod i18n;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod session;
pub mod stats;
