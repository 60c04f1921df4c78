//! View and `_find` options
//!
//! [`ViewOptions`] is built once per request, validated, and then only read:
//! the `build_*` methods render the SQL fragments a storage layer splices
//! into its view queries. Every bound value is pushed onto the caller's
//! argument list, and each placeholder is numbered from the length of that
//! list at the moment of binding, so fragments from several builders can
//! share one argument list.

use std::cmp::Ordering;
use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use mango::Selector;
use serde_json::Value;
use tracing::{debug, trace};

use super::coerce::{bool_param, invalid_value, string_list, to_uint64};
use super::pagination::{bind, placeholders, PaginationOptions};
use super::{is_builtin_view, Map, Param, VIEW_ALL_DOCS, VIEW_DESIGN_DOCS, VIEW_LOCAL_DOCS};
use crate::collate::compare_json;
use crate::error::{Error, Result};

const DEFAULT_WHERE_CAP: usize = 3;

/// Whether a view index is brought up to date before it is queried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateMode {
    /// Update before answering
    #[default]
    True,
    /// Answer from the index as it is
    False,
    /// Answer from the index as it is, then update it
    Lazy,
}

impl UpdateMode {
    pub fn as_str(self) -> &'static str {
        match self {
            UpdateMode::True => "true",
            UpdateMode::False => "false",
            UpdateMode::Lazy => "lazy",
        }
    }
}

impl fmt::Display for UpdateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// View accessors
// =============================================================================

impl Map {
    /// The `key` option as JSON text
    pub fn key(&self) -> Result<Option<String>> {
        self.json_key_option(&["key"])
    }

    /// The `keys` option, each element as JSON text. Empty when unset.
    pub fn keys(&self) -> Result<Vec<String>> {
        let Some(param) = self.param("keys") else {
            return Ok(Vec::new());
        };
        let invalid = |err: serde_json::Error| {
            Error::parse(format!("invalid value for 'keys': {}", err))
        };
        let items: Vec<Value> = match param {
            Param::Raw(text) => serde_json::from_str(text).map_err(invalid)?,
            Param::Value(value) => serde_json::from_value(value.clone()).map_err(invalid)?,
        };
        items
            .iter()
            .map(|item| serde_json::to_string(item).map_err(invalid))
            .collect()
    }

    /// The `startkey_docid` option (alias `start_key_doc_id`)
    pub fn start_key_doc_id(&self) -> Result<Option<String>> {
        self.doc_id_option(&["startkey_docid", "start_key_doc_id"])
    }

    /// The `endkey_docid` option (alias `end_key_doc_id`)
    pub fn end_key_doc_id(&self) -> Result<Option<String>> {
        self.doc_id_option(&["endkey_docid", "end_key_doc_id"])
    }

    /// Defaults to true. Any `descending` option, whatever its value,
    /// forces sorting back on.
    pub fn sorted(&self) -> Result<bool> {
        let Some(param) = self.param("sorted") else {
            return Ok(true);
        };
        let sorted = bool_param("sorted", param)?;
        Ok(sorted || self.contains("descending"))
    }

    pub fn update(&self) -> Result<UpdateMode> {
        let Some(param) = self.param("update") else {
            return Ok(UpdateMode::True);
        };
        match param.as_value() {
            Some(Value::Bool(true)) => Ok(UpdateMode::True),
            Some(Value::Bool(false)) => Ok(UpdateMode::False),
            Some(Value::String(s)) if s == "true" => Ok(UpdateMode::True),
            Some(Value::String(s)) if s == "false" => Ok(UpdateMode::False),
            Some(Value::String(s)) if s == "lazy" => Ok(UpdateMode::Lazy),
            _ => Err(invalid_value("update", param)),
        }
    }

    /// `None` leaves the choice to the view. Grouping implies reducing.
    pub fn reduce(&self) -> Result<Option<bool>> {
        if let Ok(true) = self.group() {
            return Ok(Some(true));
        }
        match self.param("reduce") {
            Some(param) => bool_param("reduce", param).map(Some),
            None => Ok(None),
        }
    }

    /// A positive `group_level` implies grouping.
    pub fn group(&self) -> Result<bool> {
        if let Ok(level) = self.group_level() {
            if level > 0 {
                return Ok(true);
            }
        }
        self.bool_or("group", false)
    }

    pub fn group_level(&self) -> Result<u64> {
        match self.param("group_level") {
            Some(param) => to_uint64(param, "invalid value for 'group_level'"),
            None => Ok(0),
        }
    }

    /// Fields to project from `_find` results
    pub fn fields(&self) -> Result<Vec<String>> {
        match self.param("fields") {
            Some(param) => string_list("fields", param),
            None => Ok(Vec::new()),
        }
    }

    pub fn sort(&self) -> Result<Vec<String>> {
        match self.param("sort") {
            Some(param) => string_list("sort", param),
            None => Ok(Vec::new()),
        }
    }

    /// The decoded `_find` bookmark. Bookmarks travel as standard base64.
    pub fn bookmark(&self) -> Result<Option<String>> {
        let Some(param) = self.param("bookmark") else {
            return Ok(None);
        };
        let encoded = param.as_str().ok_or_else(|| invalid_value("bookmark", param))?;
        let decoded = STANDARD
            .decode(encoded)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .ok_or_else(|| invalid_value("bookmark", param))?;
        Ok(Some(decoded).filter(|b| !b.is_empty()))
    }

    /// Compile the options of a query against `view`
    pub fn view_options(&self, view: &str) -> Result<ViewOptions> {
        let pagination = self.pagination_options()?;
        let reduce = self.reduce()?;
        let group = self.group()?;
        let group_level = self.group_level()?;
        if is_builtin_view(view) {
            if group_level > 0 {
                return Err(Error::validation("group_level is invalid for map-only views"));
            }
            if group {
                return Err(Error::validation("group is invalid for map-only views"));
            }
        }

        let v = ViewOptions {
            pagination,
            view: view.to_string(),
            include_docs: self.include_docs()?,
            conflicts: self.conflicts()?,
            reduce,
            group,
            group_level,
            attachments: self.attachments()?,
            update: self.update()?,
            update_seq: self.update_seq()?,
            end_key_doc_id: self.end_key_doc_id()?,
            start_key_doc_id: self.start_key_doc_id()?,
            key: self.key()?,
            keys: self.keys()?,
            sorted: self.sorted()?,
            att_encoding_info: self.att_encoding_info()?,
            ..ViewOptions::default()
        };
        v.validate()?;

        debug!(
            view,
            descending = v.pagination.descending,
            limit = v.pagination.limit,
            skip = v.pagination.skip,
            keys = v.keys.len(),
            reduce = ?v.reduce,
            group_level = v.reduce_group_level(),
            "compiled view options"
        );
        Ok(v)
    }

    fn doc_id_option(&self, aliases: &[&str]) -> Result<Option<String>> {
        match self.get(aliases) {
            Some((key, param)) => param
                .as_str()
                .map(|id| Some(id.to_string()))
                .ok_or_else(|| invalid_value(key, param)),
            None => Ok(None),
        }
    }
}

// =============================================================================
// Compiled options
// =============================================================================

/// Every option recognized by the view endpoints (`_all_docs`,
/// `_design_docs`, `_local_docs` and `_design/<ddoc>/_view/<view>`) and by
/// `_find`.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewOptions {
    pagination: PaginationOptions,
    view: String,
    include_docs: bool,
    conflicts: bool,
    reduce: Option<bool>,
    group: bool,
    group_level: u64,
    attachments: bool,
    update: UpdateMode,
    update_seq: bool,
    end_key_doc_id: Option<String>,
    start_key_doc_id: Option<String>,
    key: Option<String>,
    keys: Vec<String>,
    sorted: bool,
    att_encoding_info: bool,

    // _find only
    selector: Option<Selector>,
    find_limit: i64,
    find_skip: i64,
    fields: Vec<String>,
    bookmark: Option<String>,
    sort: Vec<String>,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            pagination: PaginationOptions::default(),
            view: String::new(),
            include_docs: false,
            conflicts: false,
            reduce: None,
            group: false,
            group_level: 0,
            attachments: false,
            update: UpdateMode::True,
            update_seq: false,
            end_key_doc_id: None,
            start_key_doc_id: None,
            key: None,
            keys: Vec::new(),
            sorted: true,
            att_encoding_info: false,
            selector: None,
            find_limit: -1,
            find_skip: 0,
            fields: Vec::new(),
            bookmark: None,
            sort: Vec::new(),
        }
    }
}

/// Compile a `_find` request body.
///
/// The query always runs against `_all_docs` with documents included; its
/// `limit` and `skip` apply to the documents the selector accepts, not to
/// the view rows. A bookmark replaces `skip`.
pub fn find_options(query: &Value) -> Result<ViewOptions> {
    let opts = Map::from_value(query.clone())?;
    let selector = match query.get("selector") {
        None | Some(Value::Null) => return Err(Error::parse("selector cannot be null")),
        Some(value) => mango::parse_value(value)?,
    };

    let limit = opts.limit()?;
    let mut skip = opts.skip()?;
    let fields = opts.fields()?;
    let conflicts = opts.conflicts()?;
    let bookmark = opts.bookmark()?;
    if bookmark.is_some() {
        skip = 0;
    }
    let sort = opts.sort()?;
    if !sort.is_empty() {
        return Err(Error::validation(
            "no index exists for this sort, try indexing by the sort fields",
        ));
    }

    let v = ViewOptions {
        view: VIEW_ALL_DOCS.to_string(),
        conflicts,
        include_docs: true,
        find_limit: limit,
        find_skip: skip,
        selector: Some(selector),
        fields,
        bookmark,
        sort,
        ..ViewOptions::default()
    };
    v.validate()?;

    debug!(
        limit,
        skip,
        fields = v.fields.len(),
        bookmark = v.bookmark.is_some(),
        "compiled find options"
    );
    Ok(v)
}

impl ViewOptions {
    /// Check that some row could satisfy the key options.
    pub fn validate(&self) -> Result<()> {
        let p = &self.pagination;
        if !self.keys.is_empty()
            && (self.key.is_some() || p.start_key.is_some() || p.end_key.is_some())
        {
            return Err(Error::validation(
                "`keys` is incompatible with `key`, `start_key` and `end_key`",
            ));
        }

        p.validate()?;

        let Some(key) = &self.key else {
            return Ok(());
        };
        let start_fail = p.start_key.as_ref().map_or(false, |start| {
            p.directed(compare_json(key, start)) == Ordering::Less
        });
        let end_fail = p.end_key.as_ref().map_or(false, |end| {
            p.directed(compare_json(key, end)) == Ordering::Greater
        });

        if (start_fail && p.end_key.is_some()) || (end_fail && p.start_key.is_some()) {
            return Err(Error::validation(
                "no rows can match your key range, change your start_key, end_key, or key",
            ));
        }
        if start_fail {
            return Err(Error::validation(format!(
                "no rows can match your key range, change your start_key or key or set descending={}",
                !p.descending
            )));
        }
        if end_fail {
            return Err(Error::validation(format!(
                "no rows can match your key range, reverse your end_key or key or set descending={}",
                !p.descending
            )));
        }
        Ok(())
    }

    /// WHERE predicates selecting the requested rows of the view, in order:
    /// the built-in view's document class, the key range, the document-ID
    /// bounds, then `key` or `keys`.
    pub fn build_where(&self, args: &mut Vec<String>) -> Vec<String> {
        let mut predicates = Vec::with_capacity(DEFAULT_WHERE_CAP);
        match self.view.as_str() {
            VIEW_ALL_DOCS => predicates.push(r#"view.key NOT LIKE '"_local/%'"#.to_string()),
            VIEW_LOCAL_DOCS => predicates.push(r#"view.key LIKE '"_local/%'"#.to_string()),
            VIEW_DESIGN_DOCS => predicates.push(r#"view.key LIKE '"_design/%'"#.to_string()),
            _ => {}
        }

        let p = &self.pagination;
        p.push_range(&mut predicates, args, "view.key", "view.key");
        if let (Some(_), Some(id)) = (&p.start_key, &self.start_key_doc_id) {
            let idx = bind(args, id);
            predicates.push(format!("view.id {} ${}", p.start_key_op(), idx));
        }
        if let (Some(_), Some(id)) = (&p.end_key, &self.end_key_doc_id) {
            let idx = bind(args, id);
            predicates.push(format!("view.id {} ${}", p.end_key_op(), idx));
        }
        self.push_keys(&mut predicates, args);

        trace!(view = %self.view, predicates = predicates.len(), "built view WHERE");
        predicates
    }

    /// WHERE predicates over grouped rows
    pub fn build_group_where(&self, args: &mut Vec<String>) -> Vec<String> {
        let mut predicates = Vec::with_capacity(DEFAULT_WHERE_CAP);
        self.pagination
            .push_range(&mut predicates, args, "view.key", "view.key");
        self.push_keys(&mut predicates, args);
        predicates
    }

    /// WHERE predicates over the reduce cache, whose rows cover the keys
    /// from `first_key` to `last_key`.
    pub fn build_reduce_cache_where(&self, args: &mut Vec<String>) -> Vec<String> {
        let mut predicates = Vec::with_capacity(DEFAULT_WHERE_CAP);
        self.pagination
            .push_range(&mut predicates, args, "view.first_key", "view.last_key");
        for key in self.key.iter().chain(&self.keys) {
            let idx = bind(args, key);
            predicates.push(format!("view.last_key = ${}", idx));
            predicates.push(format!("view.first_key = ${}", idx));
        }
        predicates
    }

    /// `ORDER BY view.key` followed by `more_columns`, all in the query's
    /// direction. Empty when results are unsorted.
    pub fn build_order_by(&self, more_columns: &[&str]) -> String {
        if !self.sorted {
            return String::new();
        }
        let direction = if self.pagination.descending { "DESC" } else { "ASC" };
        let columns: Vec<String> = std::iter::once("key")
            .chain(more_columns.iter().copied())
            .map(|col| format!("view.{} {}", col, direction))
            .collect();
        format!("ORDER BY {}", columns.join(", "))
    }

    /// The grouping depth for reducing: -1 groups by the whole key, 0 does
    /// not group, N groups by the first N key elements.
    pub fn reduce_group_level(&self) -> i64 {
        if self.group && self.group_level == 0 {
            return -1;
        }
        i64::try_from(self.group_level).unwrap_or(i64::MAX)
    }

    /// Restricts `_find` results to documents after the bookmarked one.
    pub fn bookmark_where(&self) -> &'static str {
        match self.bookmark {
            Some(_) => "WHERE main.doc_number > (SELECT doc_number FROM bookmark)",
            None => "",
        }
    }

    fn push_keys(&self, predicates: &mut Vec<String>, args: &mut Vec<String>) {
        if let Some(key) = &self.key {
            let idx = bind(args, key);
            predicates.push(format!("view.key = ${}", idx));
        }
        if !self.keys.is_empty() {
            let start = args.len() + 1;
            for key in &self.keys {
                bind(args, key);
            }
            predicates.push(format!(
                "view.key IN ({})",
                placeholders(start, self.keys.len())
            ));
        }
    }

    pub fn pagination(&self) -> &PaginationOptions {
        &self.pagination
    }

    pub fn descending(&self) -> bool {
        self.pagination.descending
    }

    pub fn limit(&self) -> i64 {
        self.pagination.limit
    }

    pub fn skip(&self) -> i64 {
        self.pagination.skip
    }

    pub fn view(&self) -> &str {
        &self.view
    }

    pub fn include_docs(&self) -> bool {
        self.include_docs
    }

    pub fn conflicts(&self) -> bool {
        self.conflicts
    }

    pub fn attachments(&self) -> bool {
        self.attachments
    }

    pub fn update(&self) -> UpdateMode {
        self.update
    }

    pub fn update_seq(&self) -> bool {
        self.update_seq
    }

    pub fn reduce(&self) -> Option<bool> {
        self.reduce
    }

    pub fn group(&self) -> bool {
        self.group
    }

    pub fn group_level(&self) -> u64 {
        self.group_level
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn start_key_doc_id(&self) -> Option<&str> {
        self.start_key_doc_id.as_deref()
    }

    pub fn end_key_doc_id(&self) -> Option<&str> {
        self.end_key_doc_id.as_deref()
    }

    pub fn sorted(&self) -> bool {
        self.sorted
    }

    pub fn att_encoding_info(&self) -> bool {
        self.att_encoding_info
    }

    /// The `_find` selector
    pub fn selector(&self) -> Option<&Selector> {
        self.selector.as_ref()
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// `_find` limit over matching documents, -1 for none
    pub fn find_limit(&self) -> i64 {
        self.find_limit
    }

    pub fn find_skip(&self) -> i64 {
        self.find_skip
    }

    pub fn bookmark(&self) -> Option<&str> {
        self.bookmark.as_deref()
    }

    pub fn sort(&self) -> &[String] {
        &self.sort
    }
}
