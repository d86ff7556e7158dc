//! `emlnorm`: normalize arbitrarily nested raw e-mail into deterministic,
//! serializable records.
//!
//! The entry point is [`parser::EmailParser`], which turns raw message bytes
//! into a [`model::email::NormalizedMessage`] tree: one canonical body,
//! recursively normalized attached messages, file attachments and content
//! fingerprints. [`export::json`] renders the tree as pruned JSON.

pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod parser;
