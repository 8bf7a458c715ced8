//! Field values for typed access
//!
//! The accessor layer supports a closed set of seven field kinds. [`FieldKind`]
//! names them and [`FieldValue`] carries one value of any of them.
//!
//! ## The Seven Kinds
//!
//! 1. `String` - UTF-8 text
//! 2. `Bool` - boolean
//! 3. `Int32` - 32-bit integer, stored through the 64-bit primitive
//! 4. `Int64` - 64-bit integer
//! 5. `Float` - 32-bit IEEE-754
//! 6. `Double` - 64-bit IEEE-754
//! 7. `Timestamp` - absolute UTC time with whole-second precision
//!
//! Anything else (binary data, mixed, links, lists) is not a field value.

use crate::schema::PropertyType;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Kind of a supported field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    /// UTF-8 text
    String,
    /// Boolean
    Bool,
    /// 32-bit signed integer
    Int32,
    /// 64-bit signed integer
    Int64,
    /// 32-bit float
    Float,
    /// 64-bit float
    Double,
    /// Absolute UTC time, whole seconds
    Timestamp,
}

impl FieldKind {
    /// Property type whose columns store this kind
    pub fn property_type(self) -> PropertyType {
        match self {
            FieldKind::String => PropertyType::String,
            FieldKind::Bool => PropertyType::Bool,
            FieldKind::Int32 | FieldKind::Int64 => PropertyType::Int,
            FieldKind::Float => PropertyType::Float,
            FieldKind::Double => PropertyType::Double,
            FieldKind::Timestamp => PropertyType::Date,
        }
    }

    /// Check if a column of `declared` type can be accessed as this kind
    pub fn is_compatible_with(self, declared: PropertyType) -> bool {
        self.property_type() == declared
    }
}

/// One value of a supported field kind
///
/// Floats use IEEE-754 equality (`NaN != NaN`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// UTF-8 text
    String(String),
    /// Boolean
    Bool(bool),
    /// 32-bit signed integer
    Int32(i32),
    /// 64-bit signed integer
    Int64(i64),
    /// 32-bit float
    Float(f32),
    /// 64-bit float
    Double(f64),
    /// Absolute UTC time
    Timestamp(DateTime<Utc>),
}

impl FieldValue {
    /// Kind of this value
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::String(_) => FieldKind::String,
            FieldValue::Bool(_) => FieldKind::Bool,
            FieldValue::Int32(_) => FieldKind::Int32,
            FieldValue::Int64(_) => FieldKind::Int64,
            FieldValue::Float(_) => FieldKind::Float,
            FieldValue::Double(_) => FieldKind::Double,
            FieldValue::Timestamp(_) => FieldKind::Timestamp,
        }
    }

    /// Try to get as string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as i64, widening `Int32`
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int32(v) => Some(i64::from(*v)),
            FieldValue::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Int32(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int64(v)
    }
}

impl From<f32> for FieldValue {
    fn from(v: f32) -> Self {
        FieldValue::Float(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Double(v)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(v: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(v)
    }
}

/// Normalize a timestamp to whole seconds since the Unix epoch
///
/// Sub-second precision is dropped: times before the epoch round toward
/// negative infinity, matching `DateTime::timestamp`.
pub fn to_unix_seconds(ts: &DateTime<Utc>) -> i64 {
    ts.timestamp()
}

/// Rebuild an absolute time from whole seconds since the Unix epoch
///
/// Seconds outside chrono's representable range clamp to its bounds.
pub fn from_unix_seconds(seconds: i64) -> DateTime<Utc> {
    match Utc.timestamp_opt(seconds, 0).single() {
        Some(ts) => ts,
        None if seconds < 0 => DateTime::<Utc>::MIN_UTC,
        None => DateTime::<Utc>::MAX_UTC,
    }
}

/// Truncate a timestamp to the precision the store keeps
pub fn truncate_to_seconds(ts: &DateTime<Utc>) -> DateTime<Utc> {
    from_unix_seconds(to_unix_seconds(ts))
}
