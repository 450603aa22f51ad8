//! Core data model: ingested message records, categories, and attachment files.

pub mod attachment;
pub mod category;
pub mod record;
