//! Typed field accessor
//!
//! Reads and writes one cell addressed by a [`RowCoordinate`], dispatching on
//! the field type to the matching native primitive.
//!
//! ## Static and dynamic access
//!
//! - [`Field`] is sealed and implemented for exactly seven Rust types:
//!   `String`, `bool`, `i32`, `i64`, `f32`, `f64` and `DateTime<Utc>`. Any
//!   other type is rejected at compile time.
//! - [`read_value`] / [`write_value`] carry a [`FieldValue`] and dispatch on
//!   the column's declared [`PropertyType`]. Property types outside the field
//!   set fail with `UnsupportedFieldType` before any native call.
//!
//! ## Conversions
//!
//! - `i32` goes through the 64-bit primitive; a stored value outside the `i32`
//!   range fails with `ValueOutOfRange`.
//! - Timestamps cross the boundary as whole Unix seconds.
//! - Strings are read into a caller buffer that grows until the engine reports
//!   a length that fits (see [`read_string`]).

use chrono::{DateTime, Utc};
use vellum_core::value::{from_unix_seconds, to_unix_seconds};
use vellum_core::{ColumnIndex, Error, FieldKind, FieldValue, Property, PropertyType, Result, RowIndex};
use vellum_native::{NativeEngine, NativePtr};

/// Size of the first buffer handed to the string primitive
pub const INITIAL_STRING_BUFFER: usize = 16;

/// Address of one cell
///
/// Rebuilt for every access: the row position is re-read from the row handle
/// each time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowCoordinate {
    /// Table pointer
    pub table: NativePtr,
    /// Column position
    pub column: ColumnIndex,
    /// Current row position
    pub row: RowIndex,
}

mod sealed {
    pub trait Sealed {}

    impl Sealed for String {}
    impl Sealed for bool {}
    impl Sealed for i32 {}
    impl Sealed for i64 {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
    impl Sealed for chrono::DateTime<chrono::Utc> {}
}

/// A Rust type the accessor can read and write
pub trait Field: sealed::Sealed + Sized {
    /// Field kind of the type
    const KIND: FieldKind;

    /// Read the cell at `at`; `property` names the field in errors
    fn read(engine: &dyn NativeEngine, at: &RowCoordinate, property: &str) -> Result<Self>;

    /// Write the cell at `at`
    fn write(self, engine: &dyn NativeEngine, at: &RowCoordinate) -> Result<()>;
}

impl Field for String {
    const KIND: FieldKind = FieldKind::String;

    fn read(engine: &dyn NativeEngine, at: &RowCoordinate, property: &str) -> Result<Self> {
        read_string(engine, at, property)
    }

    fn write(self, engine: &dyn NativeEngine, at: &RowCoordinate) -> Result<()> {
        Ok(engine.set_string(at.table, at.column, at.row, &self)?)
    }
}

impl Field for bool {
    const KIND: FieldKind = FieldKind::Bool;

    fn read(engine: &dyn NativeEngine, at: &RowCoordinate, _property: &str) -> Result<Self> {
        Ok(engine.get_bool(at.table, at.column, at.row)?)
    }

    fn write(self, engine: &dyn NativeEngine, at: &RowCoordinate) -> Result<()> {
        Ok(engine.set_bool(at.table, at.column, at.row, self)?)
    }
}

impl Field for i32 {
    const KIND: FieldKind = FieldKind::Int32;

    fn read(engine: &dyn NativeEngine, at: &RowCoordinate, property: &str) -> Result<Self> {
        let value = engine.get_int64(at.table, at.column, at.row)?;
        i32::try_from(value).map_err(|_| Error::ValueOutOfRange {
            property: property.to_string(),
            value,
            requested: FieldKind::Int32,
        })
    }

    fn write(self, engine: &dyn NativeEngine, at: &RowCoordinate) -> Result<()> {
        Ok(engine.set_int64(at.table, at.column, at.row, i64::from(self))?)
    }
}

impl Field for i64 {
    const KIND: FieldKind = FieldKind::Int64;

    fn read(engine: &dyn NativeEngine, at: &RowCoordinate, _property: &str) -> Result<Self> {
        Ok(engine.get_int64(at.table, at.column, at.row)?)
    }

    fn write(self, engine: &dyn NativeEngine, at: &RowCoordinate) -> Result<()> {
        Ok(engine.set_int64(at.table, at.column, at.row, self)?)
    }
}

impl Field for f32 {
    const KIND: FieldKind = FieldKind::Float;

    fn read(engine: &dyn NativeEngine, at: &RowCoordinate, _property: &str) -> Result<Self> {
        Ok(engine.get_float(at.table, at.column, at.row)?)
    }

    fn write(self, engine: &dyn NativeEngine, at: &RowCoordinate) -> Result<()> {
        Ok(engine.set_float(at.table, at.column, at.row, self)?)
    }
}

impl Field for f64 {
    const KIND: FieldKind = FieldKind::Double;

    fn read(engine: &dyn NativeEngine, at: &RowCoordinate, _property: &str) -> Result<Self> {
        Ok(engine.get_double(at.table, at.column, at.row)?)
    }

    fn write(self, engine: &dyn NativeEngine, at: &RowCoordinate) -> Result<()> {
        Ok(engine.set_double(at.table, at.column, at.row, self)?)
    }
}

impl Field for DateTime<Utc> {
    const KIND: FieldKind = FieldKind::Timestamp;

    fn read(engine: &dyn NativeEngine, at: &RowCoordinate, _property: &str) -> Result<Self> {
        let seconds = engine.get_timestamp_seconds(at.table, at.column, at.row)?;
        Ok(from_unix_seconds(seconds))
    }

    fn write(self, engine: &dyn NativeEngine, at: &RowCoordinate) -> Result<()> {
        Ok(engine.set_timestamp_seconds(at.table, at.column, at.row, to_unix_seconds(&self))?)
    }
}

/// Read a string cell, growing the buffer until the value fits
///
/// The first attempt uses [`INITIAL_STRING_BUFFER`] bytes. When the engine
/// reports a larger length the buffer is resized to
/// `max(required, len + 1)`, so every retry is strictly larger.
pub fn read_string(engine: &dyn NativeEngine, at: &RowCoordinate, property: &str) -> Result<String> {
    let mut buffer = vec![0u8; INITIAL_STRING_BUFFER];
    loop {
        let required = engine.get_string(at.table, at.column, at.row, &mut buffer)?;
        if required <= buffer.len() {
            buffer.truncate(required);
            return String::from_utf8(buffer).map_err(|_| Error::InvalidUtf8 {
                property: property.to_string(),
            });
        }
        let grown = required.max(buffer.len() + 1);
        buffer.resize(grown, 0);
    }
}

/// Check that `property` can be accessed as `kind`
///
/// Runs before any native call.
pub fn check_kind(property: &Property, kind: FieldKind) -> Result<()> {
    if !property.property_type.is_field() {
        return Err(Error::UnsupportedFieldType {
            property_type: property.property_type,
        });
    }
    if !kind.is_compatible_with(property.property_type) {
        return Err(Error::TypeMismatch {
            property: property.name.clone(),
            declared: property.property_type,
            requested: kind,
        });
    }
    Ok(())
}

/// Fail with `UnsupportedFieldType` unless `property` is a field
pub fn check_field(property: &Property) -> Result<()> {
    if property.property_type.is_field() {
        Ok(())
    } else {
        Err(Error::UnsupportedFieldType {
            property_type: property.property_type,
        })
    }
}

/// Read a cell as a [`FieldValue`] chosen by the declared property type
pub fn read_value(engine: &dyn NativeEngine, at: &RowCoordinate, property: &Property) -> Result<FieldValue> {
    let name = property.name.as_str();
    let value = match property.property_type {
        PropertyType::Int => FieldValue::Int64(i64::read(engine, at, name)?),
        PropertyType::Bool => FieldValue::Bool(bool::read(engine, at, name)?),
        PropertyType::Float => FieldValue::Float(f32::read(engine, at, name)?),
        PropertyType::Double => FieldValue::Double(f64::read(engine, at, name)?),
        PropertyType::String => FieldValue::String(String::read(engine, at, name)?),
        PropertyType::Date => FieldValue::Timestamp(DateTime::<Utc>::read(engine, at, name)?),
        other => return Err(Error::UnsupportedFieldType { property_type: other }),
    };
    Ok(value)
}

/// Write a [`FieldValue`] to a cell of a compatible declared type
pub fn write_value(engine: &dyn NativeEngine, at: &RowCoordinate, property: &Property, value: FieldValue) -> Result<()> {
    check_kind(property, value.kind())?;
    match value {
        FieldValue::String(v) => v.write(engine, at),
        FieldValue::Bool(v) => v.write(engine, at),
        FieldValue::Int32(v) => v.write(engine, at),
        FieldValue::Int64(v) => v.write(engine, at),
        FieldValue::Float(v) => v.write(engine, at),
        FieldValue::Double(v) => v.write(engine, at),
        FieldValue::Timestamp(v) => v.write(engine, at),
    }
}
