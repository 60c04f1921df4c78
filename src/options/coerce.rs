//! Permissive conversion of option values
//!
//! Clients send numbers as numbers or strings and booleans as booleans or
//! the strings `"true"`/`"false"`. Failures carry the
//! `invalid value for '<key>': <value>` message.

use serde_json::Value;

use super::Param;
use crate::error::{Error, Result};

pub(crate) fn invalid_value(key: &str, value: impl std::fmt::Display) -> Error {
    Error::parse(format!("invalid value for '{}': {}", key, value))
}

pub(crate) fn to_bool(param: &Param) -> Option<bool> {
    match param.as_value()? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Read a boolean option, failing on anything that does not coerce.
pub(crate) fn bool_param(key: &str, param: &Param) -> Result<bool> {
    to_bool(param).ok_or_else(|| invalid_value(key, param))
}

/// Convert to a signed integer. Numeric strings with a fraction are
/// truncated (`"3.7"` reads as 3); numbers must be integral.
pub(crate) fn to_int64(param: &Param, key: &str) -> Result<i64> {
    let invalid = || invalid_value(key, param);
    match param.as_value().ok_or_else(invalid)? {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(i);
            }
            if n.is_u64() {
                return Err(invalid());
            }
            let f = n.as_f64().ok_or_else(invalid)?;
            integral_f64(f).ok_or_else(invalid)
        }
        Value::String(s) => {
            if let Ok(i) = s.parse::<i64>() {
                return Ok(i);
            }
            match s.parse::<f64>() {
                Ok(f) if f.is_finite() => Ok(f.trunc() as i64),
                _ => Err(invalid()),
            }
        }
        _ => Err(invalid()),
    }
}

/// Convert to an unsigned integer. `message` prefixes the error, which
/// then names the offending value.
pub(crate) fn to_uint64(param: &Param, message: &str) -> Result<u64> {
    let invalid = || Error::parse(format!("{}: {}", message, param));
    match param.as_value().ok_or_else(invalid)? {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                return Ok(u);
            }
            if n.is_i64() {
                return Err(invalid());
            }
            let f = n.as_f64().ok_or_else(invalid)?;
            match integral_f64(f) {
                Some(i) if i >= 0 => Ok(i as u64),
                _ => Err(invalid()),
            }
        }
        Value::String(s) => s.parse::<u64>().map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

fn integral_f64(f: f64) -> Option<i64> {
    if !f.is_finite() || f.fract() != 0.0 || f < i64::MIN as f64 || f >= i64::MAX as f64 {
        return None;
    }
    Some(f as i64)
}

/// Encode a key option as JSON text. Raw text is kept verbatim once it is
/// known to decode.
pub(crate) fn json_key(key: &str, param: &Param) -> Result<String> {
    let in_key = |err: serde_json::Error| {
        Error::parse(format!("invalid value for '{}': {} in key", key, err))
    };
    match param {
        Param::Raw(text) => {
            serde_json::from_str::<Value>(text).map_err(in_key)?;
            Ok(text.clone())
        }
        Param::Value(value) => serde_json::to_string(value).map_err(in_key),
    }
}

/// Decode an array of strings, as used by `fields`, `sort` and friends.
pub(crate) fn string_list(key: &str, param: &Param) -> Result<Vec<String>> {
    let value = param.decode().map_err(|_| invalid_value(key, param))?;
    let Value::Array(items) = value else {
        return Err(invalid_value(key, param));
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::String(s) => Ok(s),
            other => Err(Error::parse(format!("invalid '{}' field: {}", key, other))),
        })
        .collect()
}
