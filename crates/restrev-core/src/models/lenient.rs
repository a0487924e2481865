//! Forgiving field decoders.
//!
//! The backend is inconsistent about scalar types: ids and ratings created
//! through `POST` come back as strings, `is_favourite` flips between booleans
//! and strings, and timestamps are either epoch milliseconds or RFC 3339.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serializer};
use serde_json::Value;

/// 2^63, the first float outside the `i64` range
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

fn value_to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            // Accept `5.0` but never round `4.7`
            number
                .as_f64()
                .filter(|f| f.fract() == 0.0 && (-I64_BOUND..I64_BOUND).contains(f))
                .map(|f| f as i64)
        }),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Integer that may be encoded as a JSON number or a numeric string.
pub fn int<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<i64>,
{
    let value = Value::deserialize(deserializer)?;
    let raw = value_to_i64(&value)
        .ok_or_else(|| D::Error::custom(format!("expected an integer, found {value}")))?;
    T::try_from(raw).map_err(|_| D::Error::custom(format!("integer {raw} out of range")))
}

/// Optional integer; `null` and empty strings decode to `None`.
pub fn opt_int<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) if text.trim().is_empty() => Ok(None),
        Some(value) => value_to_i64(&value)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("expected an integer, found {value}"))),
    }
}

/// Optional text that may arrive as a number.
pub fn opt_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text)),
        Some(Value::Number(number)) => Ok(Some(number.to_string())),
        Some(other) => Err(D::Error::custom(format!("expected text, found {other}"))),
    }
}

/// Boolean stored as the strings `"true"` / `"false"`.
pub mod flag {
    use serde::de::Error as _;

    use super::{Deserialize, Deserializer, Serializer, Value};

    pub fn serialize<S>(value: &bool, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(if *value { "true" } else { "false" })
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(false),
            Some(Value::Bool(flag)) => Ok(flag),
            Some(Value::String(text)) => Ok(text.trim().eq_ignore_ascii_case("true")),
            Some(Value::Number(number)) => Ok(number.as_i64().is_some_and(|n| n != 0)),
            Some(other) => Err(D::Error::custom(format!("expected a flag, found {other}"))),
        }
    }
}

/// Epoch-millisecond timestamp that may arrive as an RFC 3339 string.
pub mod timestamp {
    use serde::de::Error as _;

    use super::{value_to_i64, Deserialize, Deserializer, Serializer, Value};

    pub fn serialize<S>(value: &Option<i64>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(ms) => serializer.serialize_i64(*ms),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(text)) => {
                if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(text.trim()) {
                    return Ok(Some(parsed.timestamp_millis()));
                }
                text.trim()
                    .parse()
                    .map(Some)
                    .map_err(|_| D::Error::custom(format!("unrecognised timestamp '{text}'")))
            }
            Some(value) => value_to_i64(&value)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("unrecognised timestamp {value}"))),
        }
    }
}
