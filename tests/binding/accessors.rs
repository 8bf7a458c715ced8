//! Typed field accessors

use crate::common::*;
use chrono::{TimeZone, Utc};

#[test]
fn every_supported_type_round_trips() {
    let db = TestDb::open();
    let person = db.person("Ada", 36);
    let born = Utc.with_ymd_and_hms(1815, 12, 10, 8, 30, 0).unwrap();

    db.session
        .write(|_| {
            person.set("active", true)?;
            person.set("score", 1.5f32)?;
            person.set("rating", 4.25f64)?;
            person.set("born", born)?;
            Ok(())
        })
        .unwrap();

    assert_eq!(person.get::<String>("name").unwrap(), "Ada");
    assert_eq!(person.get::<i64>("age").unwrap(), 36);
    assert_eq!(person.get::<i32>("age").unwrap(), 36);
    assert!(person.get::<bool>("active").unwrap());
    assert_eq!(person.get::<f32>("score").unwrap(), 1.5);
    assert_eq!(person.get::<f64>("rating").unwrap(), 4.25);
    assert_eq!(person.get::<chrono::DateTime<Utc>>("born").unwrap(), born);
}

#[test]
fn value_of_row_three() {
    let db = TestDb::open();
    for i in 0..4 {
        db.person(&format!("p{i}"), 0);
    }
    db.session
        .write(|s| s.object_at("Person", 3)?.set("age", 42i64))
        .unwrap();

    let fourth = db.session.object_at("Person", 3).unwrap();
    assert_eq!(fourth.row_index().unwrap(), RowIndex(3));
    assert_eq!(fourth.get::<i64>("age").unwrap(), 42);
    assert_eq!(db.session.object_at("Person", 2).unwrap().get::<i64>("age").unwrap(), 0);
}

#[test]
fn long_string_needs_one_retry() {
    let db = TestDb::open();
    let long = "x".repeat(100);
    let person = db.person(&long, 1);

    let before = db.engine.stats().string_reads;
    assert_eq!(person.get::<String>("name").unwrap(), long);
    assert_eq!(db.engine.stats().string_reads - before, 2);
}

#[test]
fn short_and_empty_strings_read_once() {
    let db = TestDb::open();
    let short = db.person("Bo", 1);
    let empty = db.person("", 2);

    let before = db.engine.stats().string_reads;
    assert_eq!(short.get::<String>("name").unwrap(), "Bo");
    assert_eq!(empty.get::<String>("name").unwrap(), "");
    assert_eq!(db.engine.stats().string_reads - before, 2);
}

#[test]
fn multibyte_string_round_trips() {
    let db = TestDb::open();
    let person = db.person("Ã…", 1);
    assert_eq!(person.get::<String>("name").unwrap(), "Ã…");

    let exactly_sixteen_bytes = "ÅÅÅÅÅÅÅÅ";
    assert_eq!(exactly_sixteen_bytes.len(), 16);
    db.session
        .write(|_| person.set("name", exactly_sixteen_bytes.to_string()))
        .unwrap();
    let before = db.engine.stats().string_reads;
    assert_eq!(person.get::<String>("name").unwrap(), exactly_sixteen_bytes);
    assert_eq!(db.engine.stats().string_reads - before, 1);
}

#[test]
fn unsupported_type_never_reaches_the_engine() {
    let db = TestDb::open();
    let person = db.person("Ada", 36);
    let before = db.engine.stats();

    let err = person.get::<String>("avatar").unwrap_err();
    assert!(matches!(
        err,
        BindingError::UnsupportedFieldType {
            property_type: PropertyType::Data
        }
    ));
    assert!(matches!(
        person.get_value("avatar").unwrap_err(),
        BindingError::UnsupportedFieldType { .. }
    ));
    assert!(matches!(
        person.get::<String>("dog").unwrap_err(),
        BindingError::UnsupportedFieldType { .. }
    ));

    // Checked before the transaction requirement.
    assert!(matches!(
        person.set("avatar", "bytes".to_string()).unwrap_err(),
        BindingError::UnsupportedFieldType { .. }
    ));

    assert_eq!(db.engine.stats().cell_calls(), before.cell_calls());
    assert_eq!(db.engine.stats().string_reads, before.string_reads);
}

#[test]
fn wrong_kind_is_a_type_mismatch() {
    let db = TestDb::open();
    let person = db.person("Ada", 36);
    let before = db.engine.stats().cell_calls();

    match person.get::<bool>("age").unwrap_err() {
        BindingError::TypeMismatch {
            property,
            declared,
            requested,
        } => {
            assert_eq!(property, "age");
            assert_eq!(declared, PropertyType::Int);
            assert_eq!(requested, FieldKind::Bool);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(person.get::<String>("age").unwrap_err().is_programmer_error());
    assert_eq!(db.engine.stats().cell_calls(), before);
}

#[test]
fn unknown_names_are_reported() {
    let db = TestDb::open();
    let person = db.person("Ada", 36);

    assert!(matches!(
        person.get::<i64>("height").unwrap_err(),
        BindingError::UnknownProperty { .. }
    ));
    assert!(matches!(
        db.session.count("Cat").unwrap_err(),
        BindingError::UnknownObjectType(name) if name == "Cat"
    ));
}

#[test]
fn narrow_read_of_wide_value_is_out_of_range() {
    let db = TestDb::open();
    let person = db.person("Ada", i64::from(i32::MAX) + 1);

    assert!(matches!(
        person.get::<i32>("age").unwrap_err(),
        BindingError::ValueOutOfRange {
            requested: FieldKind::Int32,
            ..
        }
    ));
    assert_eq!(person.get::<i64>("age").unwrap(), i64::from(i32::MAX) + 1);
}

#[test]
fn timestamps_keep_whole_seconds() {
    let db = TestDb::open();
    let person = db.person("Ada", 36);
    let precise = Utc.timestamp_opt(1_700_000_000, 750_000_000).unwrap();

    db.session.write(|_| person.set("born", precise)).unwrap();

    let stored = person.get::<chrono::DateTime<Utc>>("born").unwrap();
    assert_eq!(stored, Utc.timestamp_opt(1_700_000_000, 0).unwrap());
}

#[test]
fn dynamic_values_follow_the_declared_type() {
    let db = TestDb::open();
    let person = db.person("Ada", 36);

    assert_eq!(person.get_value("name").unwrap(), FieldValue::String("Ada".into()));
    assert_eq!(person.get_value("age").unwrap(), FieldValue::Int64(36));

    db.session
        .write(|_| {
            person.set_value("age", FieldValue::Int32(7))?;
            person.set_value("rating", FieldValue::Double(0.5))
        })
        .unwrap();
    assert_eq!(person.get::<i64>("age").unwrap(), 7);
    assert_eq!(person.get_value("rating").unwrap(), FieldValue::Double(0.5));

    let err = db
        .session
        .write(|_| person.set_value("age", FieldValue::Bool(true)))
        .unwrap_err();
    assert!(matches!(err, BindingError::TypeMismatch { .. }));
}
