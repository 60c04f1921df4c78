//! Key ranges, limit and skip
//!
//! Keys are kept as JSON text and compared with CouchDB collation, never
//! byte-wise.

use std::cmp::Ordering;

use tracing::trace;

use super::coerce::{bool_param, invalid_value, json_key, to_int64};
use super::Map;
use crate::collate::compare_json;
use crate::error::{Error, Result};

/// The paging options shared by every view query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationOptions {
    pub(crate) limit: i64,
    pub(crate) skip: i64,
    pub(crate) descending: bool,
    pub(crate) start_key: Option<String>,
    pub(crate) end_key: Option<String>,
    pub(crate) inclusive_end: bool,
}

impl Default for PaginationOptions {
    fn default() -> Self {
        Self {
            limit: -1,
            skip: 0,
            descending: false,
            start_key: None,
            end_key: None,
            inclusive_end: true,
        }
    }
}

impl PaginationOptions {
    /// Maximum number of rows, or -1 for no limit
    pub fn limit(&self) -> i64 {
        self.limit
    }

    pub fn skip(&self) -> i64 {
        self.skip
    }

    pub fn descending(&self) -> bool {
        self.descending
    }

    /// `startkey` as JSON text
    pub fn start_key(&self) -> Option<&str> {
        self.start_key.as_deref()
    }

    /// `endkey` as JSON text
    pub fn end_key(&self) -> Option<&str> {
        self.end_key.as_deref()
    }

    pub fn inclusive_end(&self) -> bool {
        self.inclusive_end
    }

    /// Reject a `startkey` that lies beyond `endkey` in the direction of
    /// iteration.
    pub fn validate(&self) -> Result<()> {
        if let (Some(start), Some(end)) = (&self.start_key, &self.end_key) {
            if self.directed(compare_json(start, end)) == Ordering::Greater {
                return Err(Error::validation(format!(
                    "no rows can match your key range, reverse your start_key and end_key or set descending={}",
                    !self.descending
                )));
            }
        }
        Ok(())
    }

    /// Range predicates over `view.key`, binding each key to `args`.
    pub fn build_where(&self, args: &mut Vec<String>) -> Vec<String> {
        let mut predicates = Vec::with_capacity(2);
        self.push_range(&mut predicates, args, "view.key", "view.key");
        predicates
    }

    /// Flip an ordering when iterating in descending order.
    pub(crate) fn directed(&self, ord: Ordering) -> Ordering {
        if self.descending {
            ord.reverse()
        } else {
            ord
        }
    }

    pub(crate) fn start_key_op(&self) -> &'static str {
        if self.descending {
            "<="
        } else {
            ">="
        }
    }

    pub(crate) fn end_key_op(&self) -> &'static str {
        match (self.descending, self.inclusive_end) {
            (true, true) => ">=",
            (true, false) => ">",
            (false, true) => "<=",
            (false, false) => "<",
        }
    }

    /// Append the `startkey` then `endkey` predicates, each against its own
    /// column.
    pub(crate) fn push_range(
        &self,
        predicates: &mut Vec<String>,
        args: &mut Vec<String>,
        start_column: &str,
        end_column: &str,
    ) {
        if let Some(start) = &self.start_key {
            let idx = bind(args, start);
            predicates.push(format!("{} {} ${}", start_column, self.start_key_op(), idx));
        }
        if let Some(end) = &self.end_key {
            let idx = bind(args, end);
            predicates.push(format!("{} {} ${}", end_column, self.end_key_op(), idx));
        }
        trace!(predicates = predicates.len(), args = args.len(), "key range bound");
    }
}

/// Append a bind value, returning its 1-based placeholder index.
pub(crate) fn bind(args: &mut Vec<String>, value: &str) -> usize {
    args.push(value.to_string());
    args.len()
}

/// `count` consecutive placeholders starting at `$start`
pub(crate) fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("${}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

impl Map {
    /// The `startkey` option (alias `start_key`) as JSON text
    pub fn start_key(&self) -> Result<Option<String>> {
        self.json_key_option(&["startkey", "start_key"])
    }

    /// The `endkey` option (alias `end_key`) as JSON text
    pub fn end_key(&self) -> Result<Option<String>> {
        self.json_key_option(&["endkey", "end_key"])
    }

    /// Defaults to true.
    pub fn inclusive_end(&self) -> Result<bool> {
        match self.param("inclusive_end") {
            Some(param) => bool_param("inclusive_end", param),
            None => Ok(true),
        }
    }

    pub fn descending(&self) -> Result<bool> {
        match self.param("descending") {
            Some(param) => bool_param("descending", param),
            None => Ok(false),
        }
    }

    /// The `limit` option, or -1 when unset. Negative values are unbounded.
    pub fn limit(&self) -> Result<i64> {
        match self.param("limit") {
            Some(param) => to_int64(param, "limit"),
            None => Ok(-1),
        }
    }

    /// The `skip` option, or 0 when unset
    pub fn skip(&self) -> Result<i64> {
        self.non_negative("skip", 0)
    }

    /// Read every paging option. The result is not validated yet.
    pub fn pagination_options(&self) -> Result<PaginationOptions> {
        Ok(PaginationOptions {
            limit: self.limit()?,
            skip: self.skip()?,
            descending: self.descending()?,
            start_key: self.start_key()?,
            end_key: self.end_key()?,
            inclusive_end: self.inclusive_end()?,
        })
    }

    pub(crate) fn json_key_option(&self, aliases: &[&str]) -> Result<Option<String>> {
        match self.get(aliases) {
            Some((key, param)) => json_key(key, param).map(Some),
            None => Ok(None),
        }
    }

    fn non_negative(&self, key: &str, default: i64) -> Result<i64> {
        let Some(param) = self.param(key) else {
            return Ok(default);
        };
        let n = to_int64(param, key)?;
        if n < 0 {
            return Err(invalid_value(key, param));
        }
        Ok(n)
    }
}
