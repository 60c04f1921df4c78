//! Options of the `_changes` feed

use std::fmt;
use std::time::Duration;

use serde_json::Value;
use tracing::trace;

use super::coerce::{invalid_value, to_uint64};
use super::pagination::{bind, placeholders};
use super::Map;
use crate::error::{Error, Result};

/// How changes are delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Feed {
    #[default]
    Normal,
    Longpoll,
    Continuous,
}

impl Feed {
    pub fn as_str(self) -> &'static str {
        match self {
            Feed::Normal => "normal",
            Feed::Longpoll => "longpoll",
            Feed::Continuous => "continuous",
        }
    }
}

impl fmt::Display for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which revisions each change row lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Style {
    /// Only the winning revision
    #[default]
    MainOnly,
    /// All leaf revisions, including conflicts
    AllDocs,
}

impl Style {
    pub fn as_str(self) -> &'static str {
        match self {
            Style::MainOnly => "main_only",
            Style::AllDocs => "all_docs",
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the feed starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Since {
    /// Only changes made after the request
    Now,
    Seq(u64),
}

/// The `filter` option, resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangesFilter {
    /// Only the documents listed in `doc_ids`
    DocIds,
    /// A filter function, `_design/<ddoc>` plus function name
    Filter { ddoc: String, name: String },
    /// A view's map function used as a filter (`filter=_view`)
    View { ddoc: String, name: String },
}

impl ChangesFilter {
    /// `_doc_ids`, `filter` or `map`
    pub fn filter_type(&self) -> &'static str {
        match self {
            ChangesFilter::DocIds => "_doc_ids",
            ChangesFilter::Filter { .. } => "filter",
            ChangesFilter::View { .. } => "map",
        }
    }
}

impl Map {
    pub fn feed(&self) -> Result<Feed> {
        match self.param("feed").and_then(|p| p.as_str()) {
            None | Some("normal") => Ok(Feed::Normal),
            Some("longpoll") => Ok(Feed::Longpoll),
            Some("continuous") => Ok(Feed::Continuous),
            Some(_) => Err(Error::parse(
                "supported `feed` types: normal, longpoll, continuous",
            )),
        }
    }

    /// Unrecognized styles fall back to `main_only`.
    pub fn style(&self) -> Style {
        match self.param("style").and_then(|p| p.as_str()) {
            Some("all_docs") => Style::AllDocs,
            _ => Style::MainOnly,
        }
    }

    /// The `timeout` option, given in milliseconds
    pub fn timeout(&self) -> Result<Duration> {
        match self.param("timeout") {
            Some(param) => to_uint64(param, "invalid value for 'timeout'").map(Duration::from_millis),
            None => Ok(Duration::ZERO),
        }
    }

    pub fn since(&self) -> Result<Option<Since>> {
        let Some(param) = self.param("since") else {
            return Ok(None);
        };
        if param.as_str() == Some("now") {
            return Ok(Some(Since::Now));
        }
        to_uint64(param, "malformed sequence supplied in 'since' parameter").map(|seq| Some(Since::Seq(seq)))
    }

    /// The changes-feed `limit`. Zero when unset; an explicit zero reads
    /// as one.
    pub fn changes_limit(&self) -> Result<u64> {
        match self.param("limit") {
            Some(param) => to_uint64(param, "invalid value for 'limit'").map(|limit| limit.max(1)),
            None => Ok(0),
        }
    }

    pub fn changes_filter(&self) -> Result<Option<ChangesFilter>> {
        let Some(param) = self.param("filter") else {
            return Ok(None);
        };
        let filter = param.as_str().unwrap_or_default();
        if filter == "_doc_ids" {
            return Ok(Some(ChangesFilter::DocIds));
        }

        let (field, spec, is_view) = if filter == "_view" {
            let view = self
                .param("view")
                .ok_or_else(|| Error::parse("filter=_view requires 'view' parameter"))?;
            ("view", view.as_str().unwrap_or_default(), true)
        } else {
            ("filter", filter, false)
        };

        let (ddoc, name) = spec.split_once('/').ok_or_else(|| {
            Error::parse(format!(
                "'{}' must be of the form 'designname/filtername'",
                field
            ))
        })?;
        let ddoc = format!("_design/{}", ddoc);
        let name = name.to_string();
        Ok(Some(if is_view {
            ChangesFilter::View { ddoc, name }
        } else {
            ChangesFilter::Filter { ddoc, name }
        }))
    }

    /// The WHERE clause restricting the feed to `doc_ids`. Empty unless
    /// `filter=_doc_ids`. Each id is appended to `args`.
    pub fn changes_where(&self, args: &mut Vec<String>) -> Result<String> {
        if self.changes_filter()? != Some(ChangesFilter::DocIds) {
            return Ok(String::new());
        }

        let param = self
            .param("doc_ids")
            .ok_or_else(|| Error::parse("filter=_doc_ids requires 'doc_ids' parameter"))?;
        let Ok(Value::Array(ids)) = param.decode() else {
            return Err(invalid_value("doc_ids", param));
        };

        let mut bound = Vec::with_capacity(ids.len());
        for id in ids {
            match id {
                Value::String(id) => bound.push(id),
                other => return Err(Error::parse(format!("invalid 'doc_ids' field: {}", other))),
            }
        }

        let start = args.len() + 1;
        let count = bound.len();
        for id in &bound {
            bind(args, id);
        }
        trace!(count, "bound changes doc_ids");
        Ok(format!("WHERE results.id IN ({})", placeholders(start, count)))
    }
}
