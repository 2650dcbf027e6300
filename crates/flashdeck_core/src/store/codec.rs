//! Text encoding of stored values.
//!
//! Values are stored as JSON text next to an integer `format_version`.
//! Version 1 is plain `serde_json` output of the value.

use super::{StoreError, StoreResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Encoding version written by this binary.
pub const CURRENT_FORMAT_VERSION: u32 = 1;

/// Encodes `value` for storage under `key`.
pub fn encode<T: Serialize + ?Sized>(key: &str, value: &T) -> StoreResult<String> {
    serde_json::to_string(value).map_err(|source| StoreError::Serialization {
        key: key.to_string(),
        source,
    })
}

/// Decodes stored text written with `version`.
///
/// # Errors
/// - `UnsupportedFormat` when `version` is newer than [`CURRENT_FORMAT_VERSION`].
/// - `Serialization` when the text does not decode into `T`.
pub fn decode<T: DeserializeOwned>(key: &str, text: &str, version: u32) -> StoreResult<T> {
    if version > CURRENT_FORMAT_VERSION {
        return Err(StoreError::UnsupportedFormat {
            key: key.to_string(),
            version,
            latest_supported: CURRENT_FORMAT_VERSION,
        });
    }
    serde_json::from_str(text).map_err(|source| StoreError::Serialization {
        key: key.to_string(),
        source,
    })
}

/// Reads a `format_version` column value.
///
/// Values outside `u32` mean the row itself is damaged, so they surface as a
/// `Serialization` error for `key` rather than a storage failure.
pub fn format_version(key: &str, raw: i64) -> StoreResult<u32> {
    u32::try_from(raw).map_err(|_| StoreError::Serialization {
        key: key.to_string(),
        source: serde::de::Error::custom(format!("invalid format_version {raw}")),
    })
}

/// Converts a serializable value to a JSON tree.
pub fn to_json<T: Serialize + ?Sized>(key: &str, value: &T) -> StoreResult<Value> {
    serde_json::to_value(value).map_err(|source| StoreError::Serialization {
        key: key.to_string(),
        source,
    })
}

/// Shallow-merges `partial` into `existing`.
///
/// Top-level fields of `partial` overwrite those of `existing`; nested
/// objects and arrays are replaced, not merged.
pub fn shallow_merge(key: &str, existing: Value, partial: Value) -> StoreResult<Value> {
    match (existing, partial) {
        (Value::Object(mut base), Value::Object(patch)) => {
            for (field, value) in patch {
                base.insert(field, value);
            }
            Ok(Value::Object(base))
        }
        _ => Err(StoreError::NotMergeable(key.to_string())),
    }
}
