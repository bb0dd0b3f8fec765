use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One measurement reported by the stress harness.
///
/// `entries` and `millis` are required. `method` and `batchapi` may be absent
/// or of the wrong type; either way they read as `None` and the record never
/// matches a categorical comparison filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRecord {
    /// Number of keys touched by the operation.
    pub entries: u64,
    /// Elapsed wall time in milliseconds.
    pub millis: f64,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub method: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub batchapi: Option<bool>,
}

/// Decode an optional field, treating a value of the wrong type as absent.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    match T::deserialize(&value) {
        Ok(v) => Ok(Some(v)),
        Err(e) => {
            tracing::debug!(%value, error = %e, "ignoring mistyped optional field");
            Ok(None)
        }
    }
}

impl BenchmarkRecord {
    /// Decode a record from an already-parsed JSON value. Only objects qualify.
    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        if !value.is_object() {
            return Err(serde_json::Error::custom("record is not a JSON object"));
        }
        serde_json::from_value(value)
    }

    pub fn is_method(&self, method: &str) -> bool {
        self.method.as_deref() == Some(method)
    }
}
