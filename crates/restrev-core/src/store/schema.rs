//! Logical tables and store keys

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Prefix of keys generated for provisional records
pub const PROVISIONAL_PREFIX: &str = "local-";

/// How a table assigns keys to records that do not carry one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyGenerator {
    /// Records must carry their key
    Required,
    /// `local-<uuid v7>`, disjoint from server ids
    Provisional,
    /// Monotonically increasing integers
    Sequence,
}

/// The three logical tables of the local store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Table {
    Restaurants,
    Reviews,
    OfflineQueue,
}

impl Table {
    /// Logical name
    pub const fn name(self) -> &'static str {
        match self {
            Self::Restaurants => "restaurants",
            Self::Reviews => "reviews",
            Self::OfflineQueue => "offline-queue",
        }
    }

    /// Name of the backing SQL table
    pub(crate) const fn sql_name(self) -> &'static str {
        match self {
            Self::Restaurants => "restaurants",
            Self::Reviews => "reviews",
            Self::OfflineQueue => "offline_queue",
        }
    }

    /// Field of the record holding its primary key
    pub const fn key_path(self) -> Option<&'static str> {
        match self {
            Self::Restaurants | Self::Reviews => Some("id"),
            Self::OfflineQueue => None,
        }
    }

    pub const fn key_generator(self) -> KeyGenerator {
        match self {
            Self::Restaurants => KeyGenerator::Required,
            Self::Reviews => KeyGenerator::Provisional,
            Self::OfflineQueue => KeyGenerator::Sequence,
        }
    }

    /// Secondary indexes; each maps to a record field of the same name
    pub const fn indexes(self) -> &'static [&'static str] {
        match self {
            Self::Restaurants => &["is_favourite"],
            Self::Reviews => &["restaurant_id"],
            Self::OfflineQueue => &[],
        }
    }

    /// Reject index names the table does not declare
    pub fn check_index(self, index: &str) -> Result<&'static str> {
        self.indexes()
            .iter()
            .copied()
            .find(|name| *name == index)
            .ok_or_else(|| {
                Error::Validation(format!("table '{}' has no index '{index}'", self.name()))
            })
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Primary key or index value in the local store
///
/// Integer keys order before text keys, matching `SQLite` ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoreKey {
    Int(i64),
    Text(String),
}

impl StoreKey {
    /// Fresh key for a provisional record
    pub fn provisional() -> Self {
        Self::Text(format!("{PROVISIONAL_PREFIX}{}", Uuid::now_v7()))
    }

    /// Whether this key was generated for a provisional record
    pub fn is_provisional(&self) -> bool {
        matches!(self, Self::Text(text) if text.starts_with(PROVISIONAL_PREFIX))
    }

    /// Integer value, when this is an integer key
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            Self::Text(_) => None,
        }
    }

    /// Key extracted from a JSON scalar; `null`, arrays and objects have none
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Number(number) => number.as_i64().map(Self::Int),
            JsonValue::String(text) => Some(Self::Text(text.clone())),
            JsonValue::Bool(flag) => Some(Self::Text(flag.to_string())),
            _ => None,
        }
    }

    pub(crate) fn to_sql(&self) -> libsql::Value {
        match self {
            Self::Int(value) => libsql::Value::Integer(*value),
            Self::Text(text) => libsql::Value::Text(text.clone()),
        }
    }

    pub(crate) fn from_sql(value: libsql::Value) -> Result<Self> {
        match value {
            libsql::Value::Integer(value) => Ok(Self::Int(value)),
            libsql::Value::Text(text) => Ok(Self::Text(text)),
            other => Err(Error::Database(format!("unsupported store key {other:?}"))),
        }
    }
}

impl From<i64> for StoreKey {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for StoreKey {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

impl FromStr for StoreKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::Validation("store key cannot be empty".to_string()));
        }
        Ok(trimmed
            .parse::<i64>()
            .map_or_else(|_| Self::Text(trimmed.to_string()), Self::Int))
    }
}

/// A record together with the key it is stored under
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Keyed<T> {
    pub key: StoreKey,
    pub value: T,
}

impl<T> Keyed<T> {
    pub const fn new(key: StoreKey, value: T) -> Self {
        Self { key, value }
    }
}

impl Keyed<JsonValue> {
    /// Decode the JSON body into a model type
    pub fn decode<T: serde::de::DeserializeOwned>(self) -> Result<Keyed<T>> {
        Ok(Keyed {
            key: self.key,
            value: serde_json::from_value(self.value)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn provisional_keys_are_unique_and_tagged() {
        let first = StoreKey::provisional();
        let second = StoreKey::provisional();
        assert_ne!(first, second);
        assert!(first.is_provisional());
        assert!(!StoreKey::Int(5).is_provisional());
        assert!(!StoreKey::from("remote").is_provisional());
    }

    #[test]
    fn integer_keys_sort_before_text() {
        let mut keys = vec![
            StoreKey::from("local-b"),
            StoreKey::Int(10),
            StoreKey::from("local-a"),
            StoreKey::Int(2),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                StoreKey::Int(2),
                StoreKey::Int(10),
                StoreKey::from("local-a"),
                StoreKey::from("local-b"),
            ]
        );
    }

    #[test]
    fn parses_and_displays() {
        assert_eq!("42".parse::<StoreKey>().unwrap(), StoreKey::Int(42));
        let key: StoreKey = "local-0191".parse().unwrap();
        assert_eq!(key.to_string(), "local-0191");
        assert!(" ".parse::<StoreKey>().is_err());
    }

    #[test]
    fn extracts_keys_from_json_scalars() {
        assert_eq!(StoreKey::from_json(&json!(7)), Some(StoreKey::Int(7)));
        assert_eq!(
            StoreKey::from_json(&json!("true")),
            Some(StoreKey::from("true"))
        );
        assert_eq!(StoreKey::from_json(&json!(null)), None);
        assert_eq!(StoreKey::from_json(&json!({ "a": 1 })), None);
    }

    #[test]
    fn serializes_untagged() {
        assert_eq!(serde_json::to_value(StoreKey::Int(3)).unwrap(), json!(3));
        let key: StoreKey = serde_json::from_value(json!("local-x")).unwrap();
        assert_eq!(key, StoreKey::from("local-x"));
    }

    #[test]
    fn rejects_undeclared_indexes() {
        assert!(Table::Reviews.check_index("restaurant_id").is_ok());
        assert!(Table::Reviews.check_index("name").is_err());
        assert!(Table::OfflineQueue.check_index("anything").is_err());
    }
}
