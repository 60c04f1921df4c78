//! CouchDB-compatible collation
//!
//! A total order over decoded JSON values, following the
//! [CouchDB collation specification]:
//!
//! ```text
//! null < false < true < numbers < strings < arrays < objects
//! ```
//!
//! Numbers compare numerically, arrays element by element (a shorter array
//! sorts first when it is a prefix of the longer one), and strings by a
//! multi-level comparison that approximates the Unicode default collation:
//! whitespace, then punctuation and symbols, then digits, then letters.
//! Letters compare case-insensitively and accent-insensitively first;
//! accents break ties next, then case (lowercase first).
//!
//! Known differences from CouchDB:
//!
//! - The caret (`^`) and backtick (`` ` ``) sort among the other symbols,
//!   not where CouchDB's ICU collator places them.
//! - Object members are compared in sorted key order, not in the order they
//!   appear, so `{"b":2,"a":1}` collates equal to `{"a":1,"b":2}`.
//! - Accent folding covers Latin-1 letters. Other scripts sort by code
//!   point within the letter group, case-insensitively.
//!
//! Every function here is pure; nothing is shared between calls, so
//! comparisons may run concurrently from any number of threads.
//!
//! [CouchDB collation specification]: https://docs.couchdb.org/en/stable/ddocs/views/collation.html#collation-specification

use std::cmp::Ordering;

use serde_json::{Map, Value};

/// Compare two decoded JSON values.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    let by_type = type_rank(a).cmp(&type_rank(b));
    if by_type != Ordering::Equal {
        return by_type;
    }

    match (a, b) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => {
            let a = a.as_f64().unwrap_or(0.0);
            let b = b.as_f64().unwrap_or(0.0);
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Value::String(a), Value::String(b)) => compare_strings(a, b),
        (Value::Array(a), Value::Array(b)) => {
            for (x, y) in a.iter().zip(b) {
                let ord = compare_values(x, y);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            a.len().cmp(&b.len())
        }
        (Value::Object(a), Value::Object(b)) => compare_objects(a, b),
        _ => Ordering::Equal,
    }
}

/// Compare two JSON documents given as text.
///
/// Empty input sorts before everything else. Text that does not decode
/// sorts after every valid value, with byte order between invalid inputs.
pub fn compare_json(a: impl AsRef<[u8]>, b: impl AsRef<[u8]>) -> Ordering {
    let (a, b) = (a.as_ref(), b.as_ref());
    if a == b {
        return Ordering::Equal;
    }
    if a.is_empty() {
        return Ordering::Less;
    }
    if b.is_empty() {
        return Ordering::Greater;
    }

    let decoded_a = serde_json::from_slice::<Value>(a).ok();
    let decoded_b = serde_json::from_slice::<Value>(b).ok();
    match (decoded_a, decoded_b) {
        (Some(x), Some(y)) => compare_values(&x, &y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// Sort JSON-encoded keys into collation order.
pub fn sort_json_keys<S: AsRef<str>>(keys: &mut [S]) {
    keys.sort_by(|a, b| compare_json(a.as_ref(), b.as_ref()));
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn compare_objects(a: &Map<String, Value>, b: &Map<String, Value>) -> Ordering {
    let a = sorted_members(a);
    let b = sorted_members(b);
    for ((ak, av), (bk, bv)) in a.iter().zip(&b) {
        let ord = compare_strings(ak, bk).then_with(|| compare_values(av, bv));
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

fn sorted_members(object: &Map<String, Value>) -> Vec<(&String, &Value)> {
    let mut members: Vec<_> = object.iter().collect();
    members.sort_by(|(a, _), (b, _)| compare_strings(a, b));
    members
}

// =============================================================================
// Strings
// =============================================================================

/// Compare two strings with the collation rules described in the module
/// documentation. Strings are equal only when they are identical.
pub fn compare_strings(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    let wa: Vec<Weight> = a.chars().map(weight).collect();
    let wb: Vec<Weight> = b.chars().map(weight).collect();

    level(&wa, &wb, |w| w.primary)
        .then_with(|| level(&wa, &wb, |w| u32::from(w.secondary)))
        .then_with(|| level(&wa, &wb, |w| u32::from(w.tertiary)))
        .then_with(|| a.chars().cmp(b.chars()))
}

fn level(a: &[Weight], b: &[Weight], key: impl Fn(&Weight) -> u32) -> Ordering {
    a.iter().map(&key).cmp(b.iter().map(&key))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Weight {
    primary: u32,
    secondary: u8,
    tertiary: u8,
}

// Primary weight groups, lowest first.
const WHITESPACE: u32 = 0x10;
const PUNCTUATION: u32 = 0x100;
const SYMBOLS: u32 = 0x1000;
const DIGITS: u32 = 0x20_0000;
const LATIN: u32 = 0x30_0000;
const OTHER_LETTERS: u32 = 0x40_0000;

/// ASCII punctuation and symbols in default collation order.
const ASCII_PUNCTUATION: &str = "_-,;:!?.'\"()[]{}@*/\\&#%`^+<=>|~$";

// Secondary weights for accented Latin letters.
const GRAVE: u8 = 1;
const ACUTE: u8 = 2;
const CIRCUMFLEX: u8 = 3;
const TILDE: u8 = 4;
const DIAERESIS: u8 = 5;
const RING: u8 = 6;
const CEDILLA: u8 = 7;
const STROKE: u8 = 8;

fn latin(base: char) -> u32 {
    LATIN + (base as u32 - 'a' as u32) * 4
}

fn weight(ch: char) -> Weight {
    let plain = |primary| Weight {
        primary,
        secondary: 0,
        tertiary: 0,
    };

    if ch.is_ascii() {
        return match ch {
            'a'..='z' => plain(latin(ch)),
            'A'..='Z' => Weight {
                tertiary: 1,
                ..plain(latin(ch.to_ascii_lowercase()))
            },
            '0'..='9' => plain(DIGITS + (ch as u32 - '0' as u32)),
            _ => match ASCII_PUNCTUATION.find(ch) {
                Some(idx) => plain(PUNCTUATION + idx as u32),
                None => plain(WHITESPACE + ch as u32),
            },
        };
    }

    if let Some(w) = latin1_letter(ch) {
        return w;
    }

    if ch.is_alphanumeric() {
        let mut lower = ch.to_lowercase();
        let folded = match (lower.next(), lower.next()) {
            (Some(l), None) => l,
            _ => ch,
        };
        return Weight {
            primary: OTHER_LETTERS + folded as u32,
            secondary: 0,
            tertiary: u8::from(folded != ch),
        };
    }

    plain(SYMBOLS + ch as u32)
}

/// Weights for the letters of the Latin-1 supplement block.
fn latin1_letter(ch: char) -> Option<Weight> {
    let code = ch as u32;
    let (lower, upper) = match code {
        0xC0..=0xDE if code != 0xD7 => (char::from_u32(code + 0x20)?, true),
        0xDF..=0xFF if code != 0xF7 => (ch, false),
        _ => return None,
    };

    let (primary, secondary) = match lower {
        'à' => (latin('a'), GRAVE),
        'á' => (latin('a'), ACUTE),
        'â' => (latin('a'), CIRCUMFLEX),
        'ã' => (latin('a'), TILDE),
        'ä' => (latin('a'), DIAERESIS),
        'å' => (latin('a'), RING),
        'æ' => (latin('a') + 2, 0),
        'ç' => (latin('c'), CEDILLA),
        'è' => (latin('e'), GRAVE),
        'é' => (latin('e'), ACUTE),
        'ê' => (latin('e'), CIRCUMFLEX),
        'ë' => (latin('e'), DIAERESIS),
        'ì' => (latin('i'), GRAVE),
        'í' => (latin('i'), ACUTE),
        'î' => (latin('i'), CIRCUMFLEX),
        'ï' => (latin('i'), DIAERESIS),
        'ð' => (latin('d') + 2, 0),
        'ñ' => (latin('n'), TILDE),
        'ò' => (latin('o'), GRAVE),
        'ó' => (latin('o'), ACUTE),
        'ô' => (latin('o'), CIRCUMFLEX),
        'õ' => (latin('o'), TILDE),
        'ö' => (latin('o'), DIAERESIS),
        'ø' => (latin('o'), STROKE),
        'ù' => (latin('u'), GRAVE),
        'ú' => (latin('u'), ACUTE),
        'û' => (latin('u'), CIRCUMFLEX),
        'ü' => (latin('u'), DIAERESIS),
        'ý' => (latin('y'), ACUTE),
        'þ' => (latin('z') + 2, 0),
        'ß' => (latin('s') + 2, 0),
        'ÿ' => (latin('y'), DIAERESIS),
        _ => return None,
    };

    Some(Weight {
        primary,
        secondary,
        tertiary: u8::from(upper),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Vec<Value> {
        vec![
            json!(null),
            json!(false),
            json!(true),
            json!(-3.5),
            json!(0),
            json!(1),
            json!(2.0),
            json!(1e10),
            json!(""),
            json!(" "),
            json!("_"),
            json!("$"),
            json!("1"),
            json!("10"),
            json!("9"),
            json!("a"),
            json!("A"),
            json!("aa"),
            json!("á"),
            json!("Á"),
            json!("b"),
            json!("B"),
            json!("ba"),
            json!("bb"),
            json!("straße"),
            json!("Ωmega"),
            json!([]),
            json!(["a"]),
            json!(["b"]),
            json!(["b", "c"]),
            json!([1, 2]),
            json!({}),
            json!({"a": 1}),
            json!({"a": 2}),
            json!({"b": 1}),
            json!({"a": 1, "b": 2}),
            json!({"B": 1}),
        ]
    }

    #[test]
    fn test_type_precedence() {
        let chain = [
            json!(null),
            json!(false),
            json!(true),
            json!(0),
            json!(""),
            json!([]),
            json!({}),
        ];
        for pair in chain.windows(2) {
            assert_eq!(compare_values(&pair[0], &pair[1]), Ordering::Less, "{:?}", pair);
            assert_eq!(compare_values(&pair[1], &pair[0]), Ordering::Greater, "{:?}", pair);
        }
        assert_eq!(compare_values(&json!(true), &json!(-100)), Ordering::Less);
        assert_eq!(compare_values(&json!(1e300), &json!("")), Ordering::Less);
        assert_eq!(compare_values(&json!("zzz"), &json!([null])), Ordering::Less);
    }

    #[test]
    fn test_couchdb_documented_order() {
        let ordered = [
            json!(null),
            json!(false),
            json!(true),
            json!(1),
            json!(2),
            json!(3.0),
            json!(4),
            json!("a"),
            json!("A"),
            json!("aa"),
            json!("b"),
            json!("B"),
            json!("ba"),
            json!("bb"),
            json!(["a"]),
            json!(["b"]),
            json!(["b", "c"]),
            json!(["b", "c", "a"]),
            json!(["b", "d"]),
            json!(["b", "d", "e"]),
            json!({"a": 1}),
            json!({"b": 2, "a": 1}),
            json!({"a": 2}),
            json!({"b": 1}),
            json!({"b": 2}),
            json!({"b": 2, "c": 2}),
        ];
        for pair in ordered.windows(2) {
            assert_eq!(compare_values(&pair[0], &pair[1]), Ordering::Less, "{:?}", pair);
        }
    }

    #[test]
    fn test_numbers_compare_numerically() {
        assert_eq!(compare_values(&json!(1), &json!(1.0)), Ordering::Equal);
        assert_eq!(compare_values(&json!(0.5), &json!(0.6)), Ordering::Less);
        assert_eq!(compare_values(&json!(-1), &json!(-0.5)), Ordering::Less);
    }

    #[test]
    fn test_strings() {
        assert_eq!(compare_strings("a", "A"), Ordering::Less);
        assert_eq!(compare_strings("A", "aa"), Ordering::Less);
        assert_eq!(compare_strings("_", "a"), Ordering::Less);
        assert_eq!(compare_strings("9", "a"), Ordering::Less);
        assert_eq!(compare_strings(" ", "_"), Ordering::Less);
        assert_eq!(compare_strings("10", "9"), Ordering::Less);
        assert_eq!(compare_strings("a", "á"), Ordering::Less);
        assert_eq!(compare_strings("á", "b"), Ordering::Less);
        assert_eq!(compare_strings("résumé", "resumes"), Ordering::Less);
        assert_eq!(compare_strings("z", "ω"), Ordering::Less);
        assert_eq!(compare_strings("same", "same"), Ordering::Equal);
    }

    #[test]
    fn test_object_member_order_is_ignored() {
        let a: Value = serde_json::from_str(r#"{"b":2,"a":1}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a":1,"b":2}"#).unwrap();
        assert_eq!(compare_values(&a, &b), Ordering::Equal);
    }

    #[test]
    fn test_total_order_over_sample() {
        let values = sample();
        for a in &values {
            assert_eq!(compare_values(a, a), Ordering::Equal, "{}", a);
            for b in &values {
                let ab = compare_values(a, b);
                assert_eq!(ab, compare_values(b, a).reverse(), "{} vs {}", a, b);
                for c in &values {
                    if ab == Ordering::Less && compare_values(b, c) == Ordering::Less {
                        assert_eq!(compare_values(a, c), Ordering::Less, "{} < {} < {}", a, b, c);
                    }
                }
            }
        }
    }

    #[test]
    fn test_compare_json_text() {
        assert_eq!(compare_json(r#""a""#, r#""b""#), Ordering::Less);
        assert_eq!(compare_json("1", "1.0"), Ordering::Equal);
        assert_eq!(compare_json("[1, 2]", "[1,2]"), Ordering::Equal);
        assert_eq!(compare_json("", "null"), Ordering::Less);
        assert_eq!(compare_json("null", ""), Ordering::Greater);
        assert_eq!(compare_json(r#"{"z":1}"#, "oink"), Ordering::Less);
        assert_eq!(compare_json("true", "10"), Ordering::Less);
    }

    #[test]
    fn test_sort_json_keys() {
        let mut keys = vec![r#""b""#, "[1]", "null", r#""A""#, "3", r#""a""#];
        sort_json_keys(&mut keys);
        assert_eq!(keys, vec!["null", "3", r#""a""#, r#""A""#, r#""b""#, "[1]"]);
    }

    #[test]
    fn test_concurrent_use() {
        let values = sample();
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    let mut sorted = values.clone();
                    sorted.sort_by(compare_values);
                    assert_eq!(sorted.first(), Some(&json!(null)));
                });
            }
        });
    }
}
