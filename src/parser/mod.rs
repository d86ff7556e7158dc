//! Message parsing: MIME tree, header and body decoding, attachment
//! classification and normalization, plus `.eml` and MBOX input.

pub mod address;
pub mod body;
pub mod eml;
pub mod header;
pub mod mbox;
pub mod mime;
pub mod normalize;
pub mod walker;

pub use normalize::EmailParser;
