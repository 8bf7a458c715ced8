//! Write transactions

use crate::common::*;

#[test]
fn write_outside_transaction_fails_and_changes_nothing() {
    let db = TestDb::open();
    let person = db.person("Ada", 36);
    let writes = db.engine.stats().cell_writes;

    let err = person.set("age", 40i64).unwrap_err();
    assert!(matches!(err, BindingError::OutsideTransaction));
    assert!(err.is_recoverable());

    assert_eq!(person.get::<i64>("age").unwrap(), 36);
    assert_eq!(db.engine.stats().cell_writes, writes);
}

#[test]
fn structural_changes_need_a_transaction() {
    let db = TestDb::open();
    let person = db.person("Ada", 36);

    assert!(matches!(
        db.session.create_object("Person").unwrap_err(),
        BindingError::OutsideTransaction
    ));
    assert!(matches!(
        db.session.remove_object(&person).unwrap_err(),
        BindingError::OutsideTransaction
    ));
    assert!(matches!(
        person.set_link("dog", None).unwrap_err(),
        BindingError::OutsideTransaction
    ));
    assert_eq!(db.session.count("Person").unwrap(), 1);
}

#[test]
fn commit_makes_changes_visible_to_other_sessions() {
    let db = TestDb::open();
    let person = db.person("Ada", 36);

    let txn = db.session.begin_write().unwrap();
    assert!(db.session.is_in_write_transaction());
    person.set("age", 37i64).unwrap();
    txn.commit().unwrap();
    assert!(!db.session.is_in_write_transaction());

    let other = db.reopen();
    assert_eq!(other.object_at("Person", 0).unwrap().get::<i64>("age").unwrap(), 37);
}

#[test]
fn dropped_transaction_rolls_back() {
    let db = TestDb::open();
    let person = db.person("Ada", 36);

    {
        let _txn = db.session.begin_write().unwrap();
        person.set("age", 99i64).unwrap();
        db.session.create_object("Person").unwrap();
        assert_eq!(db.session.count("Person").unwrap(), 2);
    }

    assert!(!db.session.is_in_write_transaction());
    assert_eq!(person.get::<i64>("age").unwrap(), 36);
    assert_eq!(db.session.count("Person").unwrap(), 1);
}

#[test]
fn explicit_rollback_discards_changes() {
    let db = TestDb::open();
    let person = db.person("Ada", 36);

    let txn = db.session.begin_write().unwrap();
    person.set("name", "Grace".to_string()).unwrap();
    txn.rollback().unwrap();

    assert_eq!(person.get::<String>("name").unwrap(), "Ada");
}

#[test]
fn failed_closure_rolls_back() {
    let db = TestDb::open();
    let person = db.person("Ada", 36);

    let err = db
        .session
        .write(|_| {
            person.set("age", 50i64)?;
            person.set("age", true)
        })
        .unwrap_err();
    assert!(matches!(err, BindingError::TypeMismatch { .. }));
    assert_eq!(person.get::<i64>("age").unwrap(), 36);
    assert!(!db.session.is_in_write_transaction());
}

#[test]
fn nested_write_is_rejected() {
    let db = TestDb::open();
    let _txn = db.session.begin_write().unwrap();

    assert!(matches!(
        db.session.begin_write().unwrap_err(),
        BindingError::TransactionActive
    ));
    assert!(matches!(
        db.session.write(|_| Ok(())).unwrap_err(),
        BindingError::TransactionActive
    ));
    assert!(db.session.is_in_write_transaction());
}

#[test]
fn write_transaction_debug_shows_state() {
    let db = TestDb::open();
    let txn = db.session.begin_write().unwrap();

    let rendered = format!("{txn:?}");
    assert!(rendered.starts_with("WriteTransaction"));
    assert!(rendered.contains("finished: false"));
    txn.rollback().unwrap();
}

#[test]
fn second_session_waits_for_the_file_lock() {
    let db = TestDb::open();
    let other = db.reopen();

    let txn = db.session.begin_write().unwrap();
    assert!(other.begin_write().is_err());
    assert!(!other.is_in_write_transaction());
    txn.commit().unwrap();

    other.write(|s| s.create_object("Dog").map(|_| ())).unwrap();
    assert_eq!(db.session.count("Dog").unwrap(), 1);
}

#[test]
fn read_only_session_cannot_write() {
    let db = TestDb::open();
    db.person("Ada", 36);

    let reader = builder(&db.engine, &db.settings)
        .path(&db.path)
        .schema(test_schema())
        .read_only()
        .open()
        .unwrap();
    assert!(reader.is_read_only());
    assert!(reader.begin_write().is_err());
    assert!(!reader.is_in_write_transaction());
    assert_eq!(reader.object_at("Person", 0).unwrap().get::<String>("name").unwrap(), "Ada");
}

#[test]
fn closing_inside_a_write_rolls_back() {
    let db = TestDb::open();
    let writer = db.reopen();

    let txn = writer.begin_write().unwrap();
    writer.create_object("Dog").unwrap();
    std::mem::forget(txn);
    assert!(writer.close());

    assert_eq!(db.session.count("Dog").unwrap(), 0);
    db.session.write(|s| s.create_object("Dog").map(|_| ())).unwrap();
}
