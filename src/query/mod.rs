//! Selector evaluation against in-memory documents
//!
//! Parsing lives in the `mango` crate; this module decides which documents
//! a parsed selector accepts.

pub mod filter;

pub use filter::{evaluate, Matcher};
