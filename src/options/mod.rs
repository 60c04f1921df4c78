//! CouchDB query options
//!
//! A [`Map`] holds the raw options of a request exactly as the client sent
//! them. Typed accessors read one option each, applying CouchDB's defaults,
//! historical key aliases (`endkey`/`end_key`) and permissive coercion
//! (`"true"` for `true`, `"3"` for `3`).
//!
//! The view endpoints compile a whole map at once into [`ViewOptions`],
//! which validates the key range and renders SQL predicates:
//!
//! ```
//! use couchsql::options::Map;
//!
//! let opts = Map::new().with("startkey", "a").with("endkey", "z");
//! let view = opts.view_options("_all_docs").unwrap();
//!
//! let mut args = Vec::new();
//! let predicates = view.build_where(&mut args);
//! assert_eq!(predicates[1], "view.key >= $1");
//! assert_eq!(args, vec![r#""a""#, r#""z""#]);
//! ```

mod changes;
mod coerce;
mod document;
mod pagination;
mod view;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{Error, Result};

pub use changes::{ChangesFilter, Feed, Since, Style};
pub use pagination::PaginationOptions;
pub use view::{find_options, UpdateMode, ViewOptions};

/// All documents except local ones
pub const VIEW_ALL_DOCS: &str = "_all_docs";
/// Local (non-replicated) documents
pub const VIEW_LOCAL_DOCS: &str = "_local_docs";
/// Design documents
pub const VIEW_DESIGN_DOCS: &str = "_design_docs";

/// Whether `view` names one of the built-in, map-only views
pub fn is_builtin_view(view: &str) -> bool {
    matches!(view, VIEW_ALL_DOCS | VIEW_LOCAL_DOCS | VIEW_DESIGN_DOCS)
}

/// A single option value
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    /// An already decoded value
    Value(Value),
    /// JSON text that has not been decoded yet
    Raw(String),
}

impl Param {
    /// The value, decoding raw JSON text if needed
    pub fn decode(&self) -> std::result::Result<Value, serde_json::Error> {
        match self {
            Param::Value(v) => Ok(v.clone()),
            Param::Raw(text) => serde_json::from_str(text),
        }
    }

    fn as_value(&self) -> Option<&Value> {
        match self {
            Param::Value(v) => Some(v),
            Param::Raw(_) => None,
        }
    }

    fn as_str(&self) -> Option<&str> {
        self.as_value().and_then(Value::as_str)
    }
}

impl From<Value> for Param {
    fn from(value: Value) -> Self {
        Param::Value(value)
    }
}

/// Strings print bare, everything else as compact JSON.
impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Value(Value::String(s)) => f.write_str(s),
            Param::Value(v) => write!(f, "{}", v),
            Param::Raw(text) => f.write_str(text),
        }
    }
}

/// The raw options of a single request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Map {
    params: BTreeMap<String, Param>,
}

impl Map {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a decoded option
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, Param::Value(value.into()));
        self
    }

    /// Add an option given as JSON text
    pub fn with_raw(mut self, key: impl Into<String>, json: impl Into<String>) -> Self {
        self.insert(key, Param::Raw(json.into()));
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, param: Param) {
        self.params.insert(key.into(), param);
    }

    /// Build a map from a JSON object, such as a `_find` request body
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(object) => Ok(object
                .into_iter()
                .map(|(k, v)| (k, Param::Value(v)))
                .collect()),
            other => Err(Error::parse(format!(
                "invalid type: {}, expected an options object",
                mango::JsonType::of(&other)
            ))),
        }
    }

    /// Look up the first key present, in order. Returns the key that was
    /// found along with its value.
    pub fn get<'k>(&self, keys: &[&'k str]) -> Option<(&'k str, &Param)> {
        keys.iter()
            .find_map(|k| self.params.get(*k).map(|param| (*k, param)))
    }

    pub fn param(&self, key: &str) -> Option<&Param> {
        self.params.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl FromIterator<(String, Param)> for Map {
    fn from_iter<I: IntoIterator<Item = (String, Param)>>(iter: I) -> Self {
        Self {
            params: iter.into_iter().collect(),
        }
    }
}

impl<'de> Deserialize<'de> for Map {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let object = BTreeMap::<String, Value>::deserialize(deserializer)?;
        Ok(object
            .into_iter()
            .map(|(k, v)| (k, Param::Value(v)))
            .collect())
    }
}
