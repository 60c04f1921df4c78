//! Selector evaluation
//!
//! Matching never fails: an operand that does not apply to the value it
//! meets (`$size` on a string, `$regex` on a number) is simply no match.

use std::cmp::Ordering;

use mango::{Combinator, Condition, ElementOp, JsonType, Node, Selector};
use serde_json::Value;

use crate::collate::compare_values;

static NULL: Value = Value::Null;

/// Anything that can be tested against a decoded JSON document
pub trait Matcher {
    fn matches(&self, doc: &Value) -> bool;
}

impl Matcher for Selector {
    fn matches(&self, doc: &Value) -> bool {
        evaluate(self.root(), doc)
    }
}

impl Matcher for Node {
    fn matches(&self, doc: &Value) -> bool {
        evaluate(self, doc)
    }
}

/// Evaluate a selector node against a value
pub fn evaluate(node: &Node, value: &Value) -> bool {
    match node {
        Node::Combination { op, children } => match op {
            Combinator::And => children.iter().all(|child| evaluate(child, value)),
            Combinator::Or => children.iter().any(|child| evaluate(child, value)),
            Combinator::Nor => !children.iter().any(|child| evaluate(child, value)),
        },
        Node::Not(child) => !evaluate(child, value),
        Node::Field { path, cond, .. } => evaluate(cond, traverse(value, path)),
        Node::Condition(cond) => evaluate_condition(cond, value),
        Node::Element { op, cond } => evaluate_element(*op, cond, value),
    }
}

/// Walk `path` into `value`. Anything unreachable reads as null, which still
/// reaches the condition so that `$exists: false` can match.
fn traverse<'a>(value: &'a Value, path: &[String]) -> &'a Value {
    let mut current = value;
    for segment in path {
        current = match current {
            Value::Object(map) => map.get(segment).unwrap_or(&NULL),
            _ => &NULL,
        };
    }
    current
}

fn evaluate_condition(cond: &Condition, value: &Value) -> bool {
    match cond {
        Condition::Eq(operand) => compare_values(value, operand) == Ordering::Equal,
        Condition::Ne(operand) => compare_values(value, operand) != Ordering::Equal,
        Condition::Lt(operand) => compare_values(value, operand) == Ordering::Less,
        Condition::Lte(operand) => compare_values(value, operand) != Ordering::Greater,
        Condition::Gt(operand) => compare_values(value, operand) == Ordering::Greater,
        Condition::Gte(operand) => compare_values(value, operand) != Ordering::Less,
        Condition::Exists(expected) => !value.is_null() == *expected,
        Condition::Type(expected) => JsonType::of(value) == *expected,
        Condition::In(list) => contains(list, value),
        Condition::Nin(list) => !contains(list, value),
        Condition::Size(size) => match value {
            Value::Array(items) => items.len() as u64 == *size,
            _ => false,
        },
        Condition::Mod { divisor, remainder } => match integral(value) {
            Some(n) => n.wrapping_rem(*divisor) == *remainder,
            None => false,
        },
        Condition::Regex(re) => match value {
            Value::String(s) => re.is_match(s),
            _ => false,
        },
        Condition::All(required) => match value {
            Value::Array(items) => required.iter().all(|needle| contains(items, needle)),
            _ => false,
        },
    }
}

fn evaluate_element(op: ElementOp, cond: &Node, value: &Value) -> bool {
    match (op, value) {
        (ElementOp::ElemMatch, Value::Array(items)) => items.iter().any(|v| evaluate(cond, v)),
        (ElementOp::AllMatch, Value::Array(items)) => items.iter().all(|v| evaluate(cond, v)),
        (ElementOp::KeyMapMatch, Value::Object(map)) => map
            .keys()
            .any(|key| evaluate(cond, &Value::String(key.clone()))),
        _ => false,
    }
}

fn contains(haystack: &[Value], needle: &Value) -> bool {
    haystack
        .iter()
        .any(|v| compare_values(v, needle) == Ordering::Equal)
}

/// The value as an integer, if it is a number with no fractional part
fn integral(value: &Value) -> Option<i64> {
    let n = value.as_f64()?;
    if n.fract() != 0.0 || !n.is_finite() {
        return None;
    }
    match value.as_i64() {
        Some(i) => Some(i),
        None => Some(n as i64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sel(input: &str) -> Selector {
        mango::parse(input).unwrap()
    }

    #[test]
    fn test_comparison() {
        let s = sel(r#"{"foo":{"$gt":42}}"#);
        assert!(s.matches(&json!({"foo": 50})));
        assert!(!s.matches(&json!({"foo": 40})));
        assert!(!s.matches(&json!({})));
    }

    #[test]
    fn test_implicit_equality() {
        let s = sel(r#"{"name":"Bob"}"#);
        assert!(s.matches(&json!({"name": "Bob"})));
        assert!(!s.matches(&json!({"name": "bob"})));
        assert!(sel(r#"{"n":1}"#).matches(&json!({"n": 1.0})));
    }

    #[test]
    fn test_missing_field_is_null() {
        assert!(sel(r#"{"foo":{"$exists":false}}"#).matches(&json!({"bar": 1})));
        assert!(!sel(r#"{"foo":{"$exists":true}}"#).matches(&json!({"bar": 1})));
        assert!(sel(r#"{"foo":{"$lt":0}}"#).matches(&json!({})));
        assert!(sel(r#"{"a.b":{"$exists":false}}"#).matches(&json!({"a": 5})));
    }

    #[test]
    fn test_null_counts_as_absent() {
        assert!(!sel(r#"{"foo":{"$exists":true}}"#).matches(&json!({"foo": null})));
        assert!(sel(r#"{"foo":{"$type":"null"}}"#).matches(&json!({})));
    }

    #[test]
    fn test_nested_fields() {
        let s = sel(r#"{"a.b.c":{"$eq":"x"}}"#);
        assert!(s.matches(&json!({"a": {"b": {"c": "x"}}})));
        assert!(!s.matches(&json!({"a": {"b": "c"}})));

        let escaped = sel(r#"{"a\\.b":1}"#);
        assert!(escaped.matches(&json!({"a.b": 1})));
        assert!(!escaped.matches(&json!({"a": {"b": 1}})));
    }

    #[test]
    fn test_combinations() {
        let doc = json!({"a": 1, "b": 2});
        assert!(sel(r#"{"$and":[{"a":1},{"b":2}]}"#).matches(&doc));
        assert!(!sel(r#"{"$and":[{"a":1},{"b":3}]}"#).matches(&doc));
        assert!(sel(r#"{"$or":[{"a":5},{"b":2}]}"#).matches(&doc));
        assert!(!sel(r#"{"$or":[{"a":5},{"b":5}]}"#).matches(&doc));
        assert!(sel(r#"{"$nor":[{"a":5},{"b":5}]}"#).matches(&doc));
        assert!(!sel(r#"{"$nor":[{"a":1},{"b":5}]}"#).matches(&doc));
        assert!(sel(r#"{"$not":{"a":5}}"#).matches(&doc));
        assert!(sel("{}").matches(&doc));
    }

    #[test]
    fn test_implicit_and_matches_explicit_and() {
        let implicit = sel(r#"{"a":1,"b":{"$gt":1}}"#);
        let explicit = sel(r#"{"$and":[{"a":1},{"b":{"$gt":1}}]}"#);
        for doc in [
            json!({"a": 1, "b": 2}),
            json!({"a": 1, "b": 1}),
            json!({"a": 2, "b": 2}),
            json!({}),
        ] {
            assert_eq!(implicit.matches(&doc), explicit.matches(&doc), "{}", doc);
        }
    }

    #[test]
    fn test_type() {
        let doc = json!({"n": 1, "s": "x", "b": true, "a": [], "o": {}, "z": null});
        assert!(sel(r#"{"n":{"$type":"number"}}"#).matches(&doc));
        assert!(sel(r#"{"s":{"$type":"string"}}"#).matches(&doc));
        assert!(sel(r#"{"b":{"$type":"boolean"}}"#).matches(&doc));
        assert!(sel(r#"{"a":{"$type":"array"}}"#).matches(&doc));
        assert!(sel(r#"{"o":{"$type":"object"}}"#).matches(&doc));
        assert!(sel(r#"{"z":{"$type":"null"}}"#).matches(&doc));
        assert!(!sel(r#"{"n":{"$type":"string"}}"#).matches(&doc));
    }

    #[test]
    fn test_membership() {
        let doc = json!({"x": 2, "tags": ["a", "b", "c"]});
        assert!(sel(r#"{"x":{"$in":[1,2.0]}}"#).matches(&doc));
        assert!(!sel(r#"{"x":{"$nin":[1,2]}}"#).matches(&doc));
        assert!(sel(r#"{"x":{"$nin":[3]}}"#).matches(&doc));
        assert!(sel(r#"{"tags":{"$all":["c","a"]}}"#).matches(&doc));
        assert!(!sel(r#"{"tags":{"$all":["a","d"]}}"#).matches(&doc));
        assert!(!sel(r#"{"x":{"$all":[2]}}"#).matches(&doc));
    }

    #[test]
    fn test_size_mod_regex() {
        let doc = json!({"tags": [1, 2], "n": 10, "f": 10.5, "s": "hello"});
        assert!(sel(r#"{"tags":{"$size":2}}"#).matches(&doc));
        assert!(!sel(r#"{"tags":{"$size":3}}"#).matches(&doc));
        assert!(!sel(r#"{"s":{"$size":5}}"#).matches(&doc));

        assert!(sel(r#"{"n":{"$mod":[3,1]}}"#).matches(&doc));
        assert!(!sel(r#"{"n":{"$mod":[3,2]}}"#).matches(&doc));
        assert!(!sel(r#"{"f":{"$mod":[3,1]}}"#).matches(&doc));
        assert!(sel(r#"{"n":{"$mod":[-3,1]}}"#).matches(&doc));

        assert!(sel(r#"{"s":{"$regex":"^h.l"}}"#).matches(&doc));
        assert!(sel(r#"{"s":{"$regex":"llo"}}"#).matches(&doc));
        assert!(!sel(r#"{"n":{"$regex":"10"}}"#).matches(&doc));
    }

    #[test]
    fn test_element_operators() {
        let doc = json!({"genre": ["Horror", "Comedy"], "scores": [8, 9], "empty": [], "m": {"foo": 1, "bar": 2}});
        assert!(sel(r#"{"genre":{"$elemMatch":{"$eq":"Horror"}}}"#).matches(&doc));
        assert!(!sel(r#"{"genre":{"$elemMatch":{"$eq":"Drama"}}}"#).matches(&doc));
        assert!(sel(r#"{"scores":{"$allMatch":{"$gt":7}}}"#).matches(&doc));
        assert!(!sel(r#"{"scores":{"$allMatch":{"$gt":8}}}"#).matches(&doc));
        assert!(sel(r#"{"empty":{"$allMatch":{"$gt":8}}}"#).matches(&doc));
        assert!(!sel(r#"{"m":{"$allMatch":{"$gt":0}}}"#).matches(&doc));
        assert!(sel(r#"{"m":{"$keyMapMatch":{"$eq":"foo"}}}"#).matches(&doc));
        assert!(!sel(r#"{"m":{"$keyMapMatch":{"$eq":"baz"}}}"#).matches(&doc));
        assert!(!sel(r#"{"genre":{"$keyMapMatch":{"$eq":"0"}}}"#).matches(&doc));
    }

    #[test]
    fn test_elem_match_on_objects() {
        let doc = json!({"people": [{"name": "a", "age": 3}, {"name": "b", "age": 40}]});
        assert!(sel(r#"{"people":{"$elemMatch":{"name":"b","age":{"$gt":30}}}}"#).matches(&doc));
        assert!(!sel(r#"{"people":{"$elemMatch":{"name":"a","age":{"$gt":30}}}}"#).matches(&doc));
    }

    #[test]
    fn test_matching_is_deterministic() {
        let s = sel(r#"{"$or":[{"a":{"$regex":"x+"}},{"b":{"$in":[1,2]}}]}"#);
        let doc = json!({"a": "yxx", "b": 3});
        let first = s.matches(&doc);
        for _ in 0..10 {
            assert_eq!(s.matches(&doc), first);
        }
    }
}
