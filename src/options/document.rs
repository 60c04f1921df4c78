//! Options read when fetching single documents

use super::coerce::{bool_param, string_list, to_bool};
use super::Map;
use crate::error::Result;

impl Map {
    /// The `rev` option, or empty if unset
    pub fn rev(&self) -> String {
        self.param("rev")
            .and_then(|p| p.as_str())
            .unwrap_or_default()
            .to_string()
    }

    /// The `new_edits` option. Defaults to true.
    pub fn new_edits(&self) -> bool {
        self.flag("new_edits").unwrap_or(true)
    }

    pub fn latest(&self) -> bool {
        self.flag("latest").unwrap_or(false)
    }

    pub fn revs(&self) -> bool {
        self.flag("revs").unwrap_or(false)
    }

    /// `meta=true` implies `conflicts`, `deleted_conflicts` and `revs_info`.
    pub fn meta(&self) -> bool {
        self.flag("meta").unwrap_or(false)
    }

    pub fn conflicts(&self) -> Result<bool> {
        if self.meta() {
            return Ok(true);
        }
        self.bool_or("conflicts", false)
    }

    pub fn deleted_conflicts(&self) -> bool {
        self.meta() || self.flag("deleted_conflicts").unwrap_or(false)
    }

    pub fn revs_info(&self) -> bool {
        self.meta() || self.flag("revs_info").unwrap_or(false)
    }

    pub fn local_seq(&self) -> bool {
        self.flag("local_seq").unwrap_or(false)
    }

    /// Revisions whose attachments the client already has
    pub fn atts_since(&self) -> Result<Vec<String>> {
        match self.param("atts_since") {
            Some(param) => string_list("atts_since", param),
            None => Ok(Vec::new()),
        }
    }

    pub fn include_docs(&self) -> Result<bool> {
        self.bool_or("include_docs", false)
    }

    pub fn attachments(&self) -> Result<bool> {
        self.bool_or("attachments", false)
    }

    pub fn update_seq(&self) -> Result<bool> {
        self.bool_or("update_seq", false)
    }

    pub fn att_encoding_info(&self) -> Result<bool> {
        self.bool_or("att_encoding_info", false)
    }

    /// A lenient boolean: `None` when unset or not a boolean.
    fn flag(&self, key: &str) -> Option<bool> {
        self.param(key).and_then(to_bool)
    }

    /// A strict boolean with a default for the unset case.
    pub(crate) fn bool_or(&self, key: &str, default: bool) -> Result<bool> {
        match self.param(key) {
            Some(param) => bool_param(key, param),
            None => Ok(default),
        }
    }
}
