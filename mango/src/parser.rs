//! Selector parser
//!
//! Turns decoded selector JSON into [`Node`]s.

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::ast::*;
use crate::error::ParseError;

/// Parse selector JSON text
pub fn parse_bytes(input: &[u8]) -> Result<Node, ParseError> {
    let value: Value = serde_json::from_slice(input)?;
    parse_node(&value)
}

/// Parse an already-decoded selector
pub fn parse_node(value: &Value) -> Result<Node, ParseError> {
    parse_object(expect_object(value)?)
}

fn parse_object(object: &Map<String, Value>) -> Result<Node, ParseError> {
    if object.is_empty() {
        // Empty object is an implicit $and
        return Ok(Node::match_all());
    }

    let mut nodes = Vec::with_capacity(object.len());
    for (key, value) in object {
        let node = match Operator::from_name(key) {
            Some(Operator::And) => combination(Combinator::And, value),
            Some(Operator::Or) => combination(Combinator::Or, value),
            Some(Operator::Nor) => combination(Combinator::Nor, value),
            Some(Operator::Not) => parse_node(value)
                .map(|child| Node::Not(Box::new(child)))
                .map_err(|e| e.within(key)),
            // Bare comparisons let element operators test scalar members,
            // e.g. {"$elemMatch": {"$gt": 3}}
            Some(
                op @ (Operator::Eq
                | Operator::Ne
                | Operator::Lt
                | Operator::Lte
                | Operator::Gt
                | Operator::Gte),
            ) => operator(op, value),
            Some(_) | None if key.starts_with('$') => {
                Err(ParseError::new(format!("unknown operator {}", key)))
            }
            _ => field_condition(value).map(|cond| Node::field(key.as_str(), cond)),
        }?;
        nodes.push(node);
    }

    if nodes.len() == 1 {
        return Ok(nodes.remove(0));
    }

    // Multiple keys are an implicit $and. Keys arrive in sorted order, which
    // keeps the output deterministic.
    Ok(Node::Combination {
        op: Combinator::And,
        children: nodes,
    })
}

fn combination(op: Combinator, value: &Value) -> Result<Node, ParseError> {
    let context = op.operator().as_str();
    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(ParseError::new(format!(
                "invalid type: {}, expected an array of selectors",
                JsonType::of(other)
            ))
            .within(context))
        }
    };
    let children = items
        .iter()
        .map(parse_node)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| e.within(context))?;
    Ok(Node::Combination { op, children })
}

/// Parse the value attached to a field name. Non-objects are an implicit
/// `$eq`; objects must hold exactly one operator.
fn field_condition(value: &Value) -> Result<Node, ParseError> {
    let object = match value {
        Value::Object(object) => object,
        other => return Ok(Node::Condition(Condition::Eq(other.clone()))),
    };

    let mut entries = object.iter();
    match (entries.next(), entries.next()) {
        (None, _) => Ok(Node::Condition(Condition::Eq(Value::Object(Map::new())))),
        (Some((key, operand)), None) => match Operator::from_name(key) {
            Some(Operator::And | Operator::Or | Operator::Nor | Operator::Not) | None => {
                Err(ParseError::new(format!("invalid operator {}", key)))
            }
            Some(op) => operator(op, operand),
        },
        (Some(_), Some(_)) => Err(ParseError::new("too many keys in object")),
    }
}

/// Type-check an operand for `op` and build the matching node.
fn operator(op: Operator, operand: &Value) -> Result<Node, ParseError> {
    let context = op.as_str();
    let condition = match op {
        Operator::Eq => Condition::Eq(operand.clone()),
        Operator::Ne => Condition::Ne(operand.clone()),
        Operator::Lt => Condition::Lt(operand.clone()),
        Operator::Lte => Condition::Lte(operand.clone()),
        Operator::Gt => Condition::Gt(operand.clone()),
        Operator::Gte => Condition::Gte(operand.clone()),
        Operator::Exists => Condition::Exists(decode(op, operand)?),
        Operator::Type => {
            let name: String = decode(op, operand)?;
            let kind = JsonType::from_name(&name).ok_or_else(|| {
                ParseError::new(format!("invalid type name {:?}", name)).within(context)
            })?;
            Condition::Type(kind)
        }
        Operator::In => Condition::In(decode(op, operand)?),
        Operator::Nin => Condition::Nin(decode(op, operand)?),
        Operator::Size => Condition::Size(decode(op, operand)?),
        Operator::Mod => {
            let [divisor, remainder]: [i64; 2] = decode(op, operand)?;
            if divisor == 0 {
                return Err(ParseError::new("divisor must be non-zero").within(context));
            }
            Condition::Mod { divisor, remainder }
        }
        Operator::Regex => {
            let pattern: String = decode(op, operand)?;
            let re = Regex::new(&pattern)
                .map_err(|e| ParseError::new(e.to_string()).within(context))?;
            Condition::Regex(re)
        }
        Operator::All => Condition::All(decode(op, operand)?),
        Operator::ElemMatch => return element(ElementOp::ElemMatch, operand),
        Operator::AllMatch => return element(ElementOp::AllMatch, operand),
        Operator::KeyMapMatch => return element(ElementOp::KeyMapMatch, operand),
        Operator::And | Operator::Or | Operator::Nor | Operator::Not => {
            return Err(ParseError::new(format!("invalid operator {}", op)))
        }
    };
    Ok(Node::Condition(condition))
}

fn element(op: ElementOp, operand: &Value) -> Result<Node, ParseError> {
    let cond = parse_node(operand).map_err(|e| e.within(op.operator().as_str()))?;
    Ok(Node::Element {
        op,
        cond: Box::new(cond),
    })
}

fn decode<T: DeserializeOwned>(op: Operator, operand: &Value) -> Result<T, ParseError> {
    T::deserialize(operand).map_err(|e| ParseError::from(e).within(op.as_str()))
}

fn expect_object(value: &Value) -> Result<&Map<String, Value>, ParseError> {
    match value {
        Value::Object(object) => Ok(object),
        other => Err(ParseError::new(format!(
            "invalid type: {}, expected a selector object",
            JsonType::of(other)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn parse(input: &str) -> Result<Node, ParseError> {
        parse_bytes(input.as_bytes())
    }

    fn cond(field: &str, condition: Condition) -> Node {
        Node::field(field, Node::Condition(condition))
    }

    #[test]
    fn test_empty_selector() {
        assert_eq!(parse("{}").unwrap(), Node::match_all());
    }

    #[test]
    fn test_implicit_equality() {
        assert_eq!(parse(r#"{"foo":"bar"}"#).unwrap(), cond("foo", Condition::Eq(json!("bar"))));
    }

    #[test]
    fn test_explicit_operators() {
        assert_eq!(parse(r#"{"foo":{"$gt":42}}"#).unwrap(), cond("foo", Condition::Gt(json!(42))));
        assert_eq!(parse(r#"{"foo":{"$lte":"x"}}"#).unwrap(), cond("foo", Condition::Lte(json!("x"))));
        assert_eq!(parse(r#"{"foo":{"$ne":null}}"#).unwrap(), cond("foo", Condition::Ne(json!(null))));
        assert_eq!(
            parse(r#"{"foo":{"$exists":false}}"#).unwrap(),
            cond("foo", Condition::Exists(false))
        );
        assert_eq!(
            parse(r#"{"foo":{"$type":"array"}}"#).unwrap(),
            cond("foo", Condition::Type(JsonType::Array))
        );
        assert_eq!(
            parse(r#"{"foo":{"$in":[1,"a"]}}"#).unwrap(),
            cond("foo", Condition::In(vec![json!(1), json!("a")]))
        );
        assert_eq!(parse(r#"{"foo":{"$size":3}}"#).unwrap(), cond("foo", Condition::Size(3)));
        assert_eq!(
            parse(r#"{"foo":{"$mod":[4,1]}}"#).unwrap(),
            cond("foo", Condition::Mod { divisor: 4, remainder: 1 })
        );
    }

    #[test]
    fn test_empty_object_value_is_equality() {
        assert_eq!(parse(r#"{"foo":{}}"#).unwrap(), cond("foo", Condition::Eq(json!({}))));
    }

    #[test]
    fn test_too_many_keys() {
        let err = parse(r#"{"foo":{"$gt":1,"$lt":5}}"#).unwrap_err();
        assert_eq!(err.to_string(), "too many keys in object");
    }

    #[test]
    fn test_invalid_operator() {
        let err = parse(r#"{"foo":{"$invalid":1}}"#).unwrap_err();
        assert_eq!(err.to_string(), "invalid operator $invalid");
        let err = parse(r#"{"foo":{"$and":[]}}"#).unwrap_err();
        assert_eq!(err.to_string(), "invalid operator $and");
    }

    #[test]
    fn test_unknown_top_level_operator() {
        let err = parse(r#"{"$invalid":1}"#).unwrap_err();
        assert_eq!(err.to_string(), "unknown operator $invalid");
    }

    #[test]
    fn test_operand_type_errors_are_prefixed() {
        let cases = [
            (r#"{"foo":{"$exists":42}}"#, "$exists: "),
            (r#"{"foo":{"$type":42}}"#, "$type: "),
            (r#"{"foo":{"$in":42}}"#, "$in: "),
            (r#"{"foo":{"$nin":42}}"#, "$nin: "),
            (r#"{"foo":{"$size":42.5}}"#, "$size: "),
            (r#"{"foo":{"$size":-1}}"#, "$size: "),
            (r#"{"foo":{"$mod":42}}"#, "$mod: "),
            (r#"{"foo":{"$mod":[1]}}"#, "$mod: "),
            (r#"{"foo":{"$regex":42}}"#, "$regex: "),
            (r#"{"foo":{"$all":"x"}}"#, "$all: "),
            (r#"{"foo":{"$keyMapMatch":42}}"#, "$keyMapMatch: "),
        ];
        for (input, prefix) in cases {
            let err = parse(input).unwrap_err();
            assert!(err.to_string().starts_with(prefix), "{}: {}", input, err);
        }
    }

    #[test]
    fn test_mod_zero_divisor() {
        let err = parse(r#"{"foo":{"$mod":[0,1]}}"#).unwrap_err();
        assert_eq!(err.to_string(), "$mod: divisor must be non-zero");
    }

    #[test]
    fn test_invalid_regex() {
        let err = parse(r#"{"foo":{"$regex":"["}}"#).unwrap_err();
        assert!(err.to_string().starts_with("$regex: "), "{}", err);
    }

    #[test]
    fn test_invalid_type_name() {
        let err = parse(r#"{"foo":{"$type":"integer"}}"#).unwrap_err();
        assert_eq!(err.to_string(), r#"$type: invalid type name "integer""#);
    }

    #[test]
    fn test_combinations() {
        let got = parse(r#"{"$or":[{"a":1},{"b":{"$lt":2}}]}"#).unwrap();
        let want = Node::Combination {
            op: Combinator::Or,
            children: vec![cond("a", Condition::Eq(json!(1))), cond("b", Condition::Lt(json!(2)))],
        };
        assert_eq!(got, want);

        let got = parse(r#"{"$nor":[]}"#).unwrap();
        assert_eq!(
            got,
            Node::Combination {
                op: Combinator::Nor,
                children: vec![]
            }
        );
    }

    #[test]
    fn test_combination_errors() {
        let err = parse(r#"{"$and":{"a":1}}"#).unwrap_err();
        assert_eq!(err.to_string(), "$and: invalid type: object, expected an array of selectors");
        let err = parse(r#"{"$and":[1]}"#).unwrap_err();
        assert_eq!(err.to_string(), "$and: invalid type: number, expected a selector object");
        let err = parse(r#"{"$or":[{"a":{"$bogus":1}}]}"#).unwrap_err();
        assert_eq!(err.to_string(), "$or: invalid operator $bogus");
    }

    #[test]
    fn test_not() {
        let got = parse(r#"{"$not":{"a":1}}"#).unwrap();
        assert_eq!(got, Node::Not(Box::new(cond("a", Condition::Eq(json!(1))))));

        let err = parse(r#"{"$not":[]}"#).unwrap_err();
        assert_eq!(err.to_string(), "$not: invalid type: array, expected a selector object");
    }

    #[test]
    fn test_implicit_and() {
        let got = parse(r#"{"b":2,"a":1}"#).unwrap();
        let want = Node::Combination {
            op: Combinator::And,
            children: vec![cond("a", Condition::Eq(json!(1))), cond("b", Condition::Eq(json!(2)))],
        };
        assert_eq!(got.normalized(), want.normalized());
    }

    #[test]
    fn test_element_operators() {
        let got = parse(r#"{"genre":{"$elemMatch":{"$eq":"Horror"}}}"#).unwrap();
        let want = Node::field(
            "genre",
            Node::Element {
                op: ElementOp::ElemMatch,
                cond: Box::new(Node::Condition(Condition::Eq(json!("Horror")))),
            },
        );
        assert_eq!(got, want);

        let got = parse(r#"{"cameras":{"$keyMapMatch":{"$eq":"secondary"}}}"#).unwrap();
        assert_eq!(got.op(), Operator::KeyMapMatch);

        let got = parse(r#"{"people":{"$allMatch":{"age":{"$gte":18}}}}"#).unwrap();
        let want = Node::field(
            "people",
            Node::Element {
                op: ElementOp::AllMatch,
                cond: Box::new(cond("age", Condition::Gte(json!(18)))),
            },
        );
        assert_eq!(got, want);
    }

    #[test]
    fn test_top_level_condition() {
        assert_eq!(parse(r#"{"$gt":3}"#).unwrap(), Node::Condition(Condition::Gt(json!(3))));
        assert_eq!(parse(r#"{"$ne":"x"}"#).unwrap(), Node::Condition(Condition::Ne(json!("x"))));

        for input in [
            r#"{"$exists":true}"#,
            r#"{"$in":[1]}"#,
            r#"{"$elemMatch":{"a":1}}"#,
            r#"{"$size":2}"#,
        ] {
            let err = parse(input).unwrap_err();
            assert!(err.to_string().starts_with("unknown operator $"), "{}", input);
        }
    }

    #[test]
    fn test_not_an_object() {
        let err = parse("[]").unwrap_err();
        assert_eq!(err.to_string(), "invalid type: array, expected a selector object");
        assert!(parse("{").is_err());
    }

    #[test]
    fn test_render_reparses() {
        let inputs = [
            r#"{"foo":{"$gt":42}}"#,
            r#"{"a":1,"b":{"$in":[1,2]},"c.d":{"$regex":"^x"}}"#,
            r#"{"$or":[{"a":{"$exists":true}},{"$not":{"b":{"$size":2}}}]}"#,
            r#"{"tags":{"$elemMatch":{"$eq":"x"}},"n":{"$mod":[3,0]}}"#,
            r#"{"a":{"$all":[[1],{"x":null}]},"t":{"$type":"object"}}"#,
            "{}",
        ];
        for input in inputs {
            let first = parse(input).unwrap();
            let second = parse(&first.to_string()).unwrap();
            assert_eq!(first.normalized(), second.normalized(), "{}", input);
        }
    }
}
