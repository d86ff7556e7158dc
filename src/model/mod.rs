//! Core data model: normalized messages, file attachments, headers and
//! content indicators.

pub mod email;
pub mod file;
pub mod header;
pub mod indicators;
