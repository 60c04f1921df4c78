//! Mango - CouchDB's selector language
//!
//! Parses `_find` selectors into an AST. Evaluating a selector against a
//! document lives with the collation rules in the `couchsql` crate.
//!
//! # Syntax Overview
//!
//! ```json
//! {"year": {"$gte": 1990}, "genre": {"$elemMatch": {"$eq": "Horror"}}}
//! {"$or": [{"director": "Lucas"}, {"imdb.rating": {"$gt": 8}}]}
//! {"$not": {"tags": {"$all": ["old", "unrated"]}}}
//! ```
//!
//! # Notes
//!
//! - Several keys in one object are an implicit `$and`; their order carries
//!   no meaning.
//! - Field names are dotted paths. `\.` escapes a literal dot.
//! - A field whose value is not an object is an implicit `$eq`.

mod ast;
mod error;
mod parser;
mod path;

use std::str::FromStr;

pub use ast::*;
pub use error::ParseError;
pub use path::{field_to_json_path, split_keys};

/// Parse selector JSON into a [`Selector`]
pub fn parse(input: impl AsRef<[u8]>) -> Result<Selector, ParseError> {
    parser::parse_bytes(input.as_ref()).map(Selector::new)
}

/// Parse an already-decoded selector
pub fn parse_value(value: &serde_json::Value) -> Result<Selector, ParseError> {
    parser::parse_node(value).map(Selector::new)
}

impl FromStr for Selector {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_selector() {
        let sel = parse(r#"{"foo":{"$gt":42}}"#).unwrap();
        assert_eq!(sel.root().op(), Operator::Gt);
    }

    #[test]
    fn test_from_str() {
        let sel: Selector = r#"{"$and":[{"a":1}]}"#.parse().unwrap();
        assert_eq!(sel.root().op(), Operator::And);
    }

    #[test]
    fn test_deserialize_selector() {
        #[derive(serde::Deserialize)]
        struct Query {
            selector: Selector,
        }
        let q: Query = serde_json::from_value(json!({"selector": {"a": {"$exists": true}}})).unwrap();
        assert_eq!(q.selector.root().op(), Operator::Exists);

        let err = serde_json::from_value::<Query>(json!({"selector": {"a": {"$mod": [0, 1]}}}))
            .err()
            .unwrap();
        assert!(err.to_string().contains("$mod: divisor must be non-zero"));
    }

    #[test]
    fn test_serialize_selector() {
        let sel = parse(r#"{"a":{"$in":[1,2]}}"#).unwrap();
        assert_eq!(serde_json::to_value(&sel).unwrap(), json!({"a": {"$in": [1, 2]}}));
    }
}
