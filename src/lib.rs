//! couchsql - the query core of a CouchDB-compatible store on SQL
//!
//! Turns CouchDB query semantics into something a relational backend can
//! run: a collation order for JSON keys, Mango selector evaluation, and
//! view/`_find` options compiled into SQL predicates.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       couchsql core                          │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────────┐  │
//! │  │ mango crate  │   │   options    │   │   options::Map   │  │
//! │  │ (selector    │   │ ViewOptions  │◄──┤ raw option bag   │  │
//! │  │  parser)     │   │ build_where  │   │ + coercion       │  │
//! │  └──────┬───────┘   └──────┬───────┘   └──────────────────┘  │
//! │         │                  │                                 │
//! │         ▼                  ▼                                 │
//! │  ┌──────────────┐   ┌──────────────┐                         │
//! │  │ query::filter│──►│   collate    │                         │
//! │  │ (Matcher)    │   │ (JSON order) │                         │
//! │  └──────────────┘   └──────────────┘                         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing here performs I/O. Parsed selectors and compiled options are
//! immutable and can be shared across threads; every error is returned to
//! the caller as an [`Error`] that maps to HTTP 400.

pub mod collate;
pub mod error;
pub mod options;
pub mod query;

pub use error::{Error, Result};

pub use collate::{compare_json, compare_strings, compare_values};
pub use mango::{ParseError, Selector};
pub use options::{find_options, Map, Param, PaginationOptions, ViewOptions};
pub use query::Matcher;

/// Parse a Mango selector
pub fn parse_selector(input: impl AsRef<[u8]>) -> Result<Selector> {
    Ok(mango::parse(input)?)
}
