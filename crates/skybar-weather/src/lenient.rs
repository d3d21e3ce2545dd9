//! Forgiving deserializers for the optional parts of the proxy payload.
//!
//! A wrong type in an optional field reads as absent instead of rejecting the
//! whole payload.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Any value that does not fit `T` becomes `None`.
pub fn option<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(d)?;
    Ok(T::deserialize(value).ok())
}

/// Unix seconds, also accepted as a float (truncated).
pub fn timestamp<'de, D>(d: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Number(n) = Value::deserialize(d)? else {
        return Ok(None);
    };
    Ok(n.as_i64().or_else(|| {
        n.as_f64()
            .filter(|f| f.is_finite())
            .map(|f| f.trunc() as i64)
    }))
}

/// A series that must be an array; entries that are not objects become
/// `T::default()` so positions are kept.
pub fn series<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let entries = Vec::<Value>::deserialize(d)?;
    Ok(entries
        .into_iter()
        .map(|v| T::deserialize(v).unwrap_or_default())
        .collect())
}

/// An optional list; a non-array is `None` and unreadable entries are dropped.
pub fn list<'de, D, T>(d: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Value::Array(entries) = Value::deserialize(d)? else {
        return Ok(None);
    };
    Ok(Some(
        entries
            .into_iter()
            .filter_map(|v| T::deserialize(v).ok())
            .collect(),
    ))
}
