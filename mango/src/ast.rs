//! Abstract Syntax Tree for Mango selectors

use std::fmt;

use regex::Regex;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::path::split_keys;

/// Every operator the selector language knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operator {
    // Combination
    And,
    Or,
    Nor,
    Not,
    // Comparison
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    // Predicates
    Exists,
    Type,
    In,
    Nin,
    Size,
    Mod,
    Regex,
    All,
    // Element
    ElemMatch,
    AllMatch,
    KeyMapMatch,
}

impl Operator {
    pub const ALL: [Operator; 21] = [
        Operator::And,
        Operator::Or,
        Operator::Nor,
        Operator::Not,
        Operator::Eq,
        Operator::Ne,
        Operator::Lt,
        Operator::Lte,
        Operator::Gt,
        Operator::Gte,
        Operator::Exists,
        Operator::Type,
        Operator::In,
        Operator::Nin,
        Operator::Size,
        Operator::Mod,
        Operator::Regex,
        Operator::All,
        Operator::ElemMatch,
        Operator::AllMatch,
        Operator::KeyMapMatch,
    ];

    /// The `$`-prefixed name used on the wire
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::And => "$and",
            Operator::Or => "$or",
            Operator::Nor => "$nor",
            Operator::Not => "$not",
            Operator::Eq => "$eq",
            Operator::Ne => "$ne",
            Operator::Lt => "$lt",
            Operator::Lte => "$lte",
            Operator::Gt => "$gt",
            Operator::Gte => "$gte",
            Operator::Exists => "$exists",
            Operator::Type => "$type",
            Operator::In => "$in",
            Operator::Nin => "$nin",
            Operator::Size => "$size",
            Operator::Mod => "$mod",
            Operator::Regex => "$regex",
            Operator::All => "$all",
            Operator::ElemMatch => "$elemMatch",
            Operator::AllMatch => "$allMatch",
            Operator::KeyMapMatch => "$keyMapMatch",
        }
    }

    pub fn from_name(name: &str) -> Option<Operator> {
        Operator::ALL.into_iter().find(|op| op.as_str() == name)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `$and`, `$or` and `$nor`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    And,
    Or,
    Nor,
}

impl Combinator {
    pub fn operator(self) -> Operator {
        match self {
            Combinator::And => Operator::And,
            Combinator::Or => Operator::Or,
            Combinator::Nor => Operator::Nor,
        }
    }
}

/// `$elemMatch`, `$allMatch` and `$keyMapMatch`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementOp {
    ElemMatch,
    AllMatch,
    KeyMapMatch,
}

impl ElementOp {
    pub fn operator(self) -> Operator {
        match self {
            ElementOp::ElemMatch => Operator::ElemMatch,
            ElementOp::AllMatch => Operator::AllMatch,
            ElementOp::KeyMapMatch => Operator::KeyMapMatch,
        }
    }
}

/// JSON type names accepted by `$type`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonType {
    Null,
    Boolean,
    Number,
    String,
    Array,
    Object,
}

impl JsonType {
    pub fn name(self) -> &'static str {
        match self {
            JsonType::Null => "null",
            JsonType::Boolean => "boolean",
            JsonType::Number => "number",
            JsonType::String => "string",
            JsonType::Array => "array",
            JsonType::Object => "object",
        }
    }

    pub fn from_name(name: &str) -> Option<JsonType> {
        match name {
            "null" => Some(JsonType::Null),
            "boolean" => Some(JsonType::Boolean),
            "number" => Some(JsonType::Number),
            "string" => Some(JsonType::String),
            "array" => Some(JsonType::Array),
            "object" => Some(JsonType::Object),
            _ => None,
        }
    }

    /// The dynamic type of a decoded JSON value
    pub fn of(value: &Value) -> JsonType {
        match value {
            Value::Null => JsonType::Null,
            Value::Bool(_) => JsonType::Boolean,
            Value::Number(_) => JsonType::Number,
            Value::String(_) => JsonType::String,
            Value::Array(_) => JsonType::Array,
            Value::Object(_) => JsonType::Object,
        }
    }
}

impl fmt::Display for JsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A leaf condition together with its operand, typed per operator
#[derive(Debug, Clone)]
pub enum Condition {
    Eq(Value),
    Ne(Value),
    Lt(Value),
    Lte(Value),
    Gt(Value),
    Gte(Value),
    Exists(bool),
    Type(JsonType),
    In(Vec<Value>),
    Nin(Vec<Value>),
    Size(u64),
    Mod { divisor: i64, remainder: i64 },
    Regex(Regex),
    All(Vec<Value>),
}

impl Condition {
    pub fn op(&self) -> Operator {
        match self {
            Condition::Eq(_) => Operator::Eq,
            Condition::Ne(_) => Operator::Ne,
            Condition::Lt(_) => Operator::Lt,
            Condition::Lte(_) => Operator::Lte,
            Condition::Gt(_) => Operator::Gt,
            Condition::Gte(_) => Operator::Gte,
            Condition::Exists(_) => Operator::Exists,
            Condition::Type(_) => Operator::Type,
            Condition::In(_) => Operator::In,
            Condition::Nin(_) => Operator::Nin,
            Condition::Size(_) => Operator::Size,
            Condition::Mod { .. } => Operator::Mod,
            Condition::Regex(_) => Operator::Regex,
            Condition::All(_) => Operator::All,
        }
    }

    /// The operand as it appears in selector JSON
    pub fn operand(&self) -> Value {
        match self {
            Condition::Eq(v)
            | Condition::Ne(v)
            | Condition::Lt(v)
            | Condition::Lte(v)
            | Condition::Gt(v)
            | Condition::Gte(v) => v.clone(),
            Condition::Exists(b) => Value::Bool(*b),
            Condition::Type(t) => Value::String(t.name().to_string()),
            Condition::In(list) | Condition::Nin(list) | Condition::All(list) => {
                Value::Array(list.clone())
            }
            Condition::Size(n) => Value::from(*n),
            Condition::Mod { divisor, remainder } => {
                Value::Array(vec![Value::from(*divisor), Value::from(*remainder)])
            }
            Condition::Regex(re) => Value::String(re.as_str().to_string()),
        }
    }
}

impl PartialEq for Condition {
    fn eq(&self, other: &Self) -> bool {
        self.op() == other.op() && self.operand() == other.operand()
    }
}

/// A node in a parsed selector
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// `$and`/`$or`/`$nor` over child selectors. An `$and` with no
    /// children matches everything.
    Combination { op: Combinator, children: Vec<Node> },
    Not(Box<Node>),
    /// Applies `cond` to the value found at `field`. `path` holds the
    /// unescaped segments of the dotted field name.
    Field {
        field: String,
        path: Vec<String>,
        cond: Box<Node>,
    },
    Condition(Condition),
    Element { op: ElementOp, cond: Box<Node> },
}

impl Node {
    /// Build a field node, splitting the dotted field name into its path.
    pub fn field(field: impl Into<String>, cond: Node) -> Node {
        let field = field.into();
        Node::Field {
            path: split_keys(&field),
            field,
            cond: Box::new(cond),
        }
    }

    /// The selector that matches every document.
    pub fn match_all() -> Node {
        Node::Combination {
            op: Combinator::And,
            children: Vec::new(),
        }
    }

    /// The operator at this node. Field nodes report their condition's
    /// operator.
    pub fn op(&self) -> Operator {
        match self {
            Node::Combination { op, .. } => op.operator(),
            Node::Not(_) => Operator::Not,
            Node::Field { cond, .. } => cond.op(),
            Node::Condition(cond) => cond.op(),
            Node::Element { op, .. } => op.operator(),
        }
    }

    /// Render the node back to Mango selector JSON.
    pub fn to_json(&self) -> Value {
        match self {
            Node::Combination { op, children } => {
                if *op == Combinator::And && children.is_empty() {
                    return Value::Object(Map::new());
                }
                let children = children.iter().map(Node::to_json).collect();
                single(op.operator().as_str(), Value::Array(children))
            }
            Node::Not(child) => single(Operator::Not.as_str(), child.to_json()),
            Node::Field { field, cond, .. } => single(field, cond.to_json()),
            Node::Condition(cond) => single(cond.op().as_str(), cond.operand()),
            Node::Element { op, cond } => single(op.operator().as_str(), cond.to_json()),
        }
    }

    /// Recursively order combination children by their rendered JSON, so
    /// that trees differing only in child order compare equal.
    pub fn normalized(&self) -> Node {
        match self {
            Node::Combination { op, children } => {
                let mut children: Vec<Node> = children.iter().map(Node::normalized).collect();
                children.sort_by_cached_key(|n| n.to_string());
                Node::Combination { op: *op, children }
            }
            Node::Not(child) => Node::Not(Box::new(child.normalized())),
            Node::Field { field, path, cond } => Node::Field {
                field: field.clone(),
                path: path.clone(),
                cond: Box::new(cond.normalized()),
            },
            Node::Condition(cond) => Node::Condition(cond.clone()),
            Node::Element { op, cond } => Node::Element {
                op: *op,
                cond: Box::new(cond.normalized()),
            },
        }
    }
}

fn single(key: &str, value: Value) -> Value {
    let mut map = Map::with_capacity(1);
    map.insert(key.to_string(), value);
    Value::Object(map)
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// A parsed Mango selector
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    root: Node,
}

impl Selector {
    pub fn new(root: Node) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn into_root(self) -> Node {
        self.root
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.root.fmt(f)
    }
}

impl Serialize for Selector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.root.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Selector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        crate::parse_value(&value).map_err(D::Error::custom)
    }
}
