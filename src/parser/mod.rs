//! Message parsing: header decoding and MIME traversal.

pub mod header;
pub mod mime;
