//! Output formats for normalized messages.

pub mod json;
