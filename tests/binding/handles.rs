//! Native handle lifetimes

use crate::common::*;

#[test]
fn everything_is_released_exactly_once() {
    let db = TestDb::open();
    let dog = db.dog("Rex");
    let person = db.person("Ada", 36);
    db.session
        .write(|_| {
            person.set_link("dog", Some(&dog))?;
            person.get_list("dogs")?.push(&dog)
        })
        .unwrap();
    let view = db.session.all("Person").unwrap();
    let linked = person.get_link("dog").unwrap().unwrap();
    assert!(linked.is_same_object(&dog));
    assert!(db.engine.live_resources() > 0);

    let TestDb { engine, session, .. } = db;
    drop(view);
    drop(linked);
    drop(person);
    drop(dog);
    drop(session);

    let stats = engine.stats();
    assert_eq!(engine.live_resources(), 0);
    assert_eq!(stats.invalid_releases, 0);
    for kind in ResourceKind::ALL {
        assert_eq!(stats.allocated(kind), stats.released(kind), "{}", kind.name());
    }
}

#[test]
fn early_release_is_idempotent() {
    let db = TestDb::open();
    let person = db.person("Ada", 36);
    let rows = db.engine.stats().released(ResourceKind::Row);

    assert!(person.release());
    assert!(!person.release());
    assert_eq!(db.engine.stats().released(ResourceKind::Row), rows + 1);
    assert_eq!(db.engine.stats().invalid_releases, 0);

    match person.get::<i64>("age").unwrap_err() {
        BindingError::ResourceDisposed { kind } => assert_eq!(kind, "row"),
        other => panic!("unexpected {other:?}"),
    }
    assert!(!person.is_valid());
    drop(person);
    assert_eq!(db.engine.stats().released(ResourceKind::Row), rows + 1);
}

#[test]
fn close_releases_session_and_tables() {
    let db = TestDb::open();
    let person = db.person("Ada", 36);
    assert_eq!(db.session.resolved_tables(), 1);

    assert!(db.session.close());
    assert!(!db.session.close());
    assert!(db.session.is_closed());

    let stats = db.engine.stats();
    assert_eq!(stats.live(ResourceKind::Session), 0);
    assert_eq!(stats.live(ResourceKind::Table), 0);
    assert_eq!(db.session.resolved_tables(), 0);

    assert!(matches!(
        person.get::<String>("name").unwrap_err(),
        BindingError::SessionClosed
    ));
    assert!(matches!(
        db.session.count("Person").unwrap_err(),
        BindingError::SessionClosed
    ));
    assert!(matches!(
        db.session.begin_write().unwrap_err(),
        BindingError::SessionClosed
    ));
}

#[test]
fn objects_outlive_a_dropped_session_safely() {
    let db = TestDb::open();
    let person = db.person("Ada", 36);
    let TestDb { engine, session, .. } = db;
    drop(session);

    assert_eq!(engine.stats().live(ResourceKind::Session), 0);
    assert!(matches!(
        person.get::<i64>("age").unwrap_err(),
        BindingError::SessionClosed
    ));
    assert!(!person.is_valid());

    drop(person);
    assert_eq!(engine.live_resources(), 0);
}

#[test]
fn clones_share_one_native_session() {
    let db = TestDb::open();
    let clone = db.session.clone();
    let sessions = db.engine.stats().allocated(ResourceKind::Session);

    clone.write(|s| s.create_object("Dog").map(|_| ())).unwrap();
    assert_eq!(db.session.count("Dog").unwrap(), 1);
    drop(clone);

    assert!(!db.session.is_closed());
    assert_eq!(db.engine.stats().allocated(ResourceKind::Session), sessions);
}

#[test]
fn tables_are_resolved_once_per_session() {
    let db = TestDb::open();
    let people: Vec<_> = (0..5).map(|i| db.person(&format!("p{i}"), i)).collect();
    let tables = db.engine.stats().allocated(ResourceKind::Table);

    for person in &people {
        person.get::<String>("name").unwrap();
        person.get::<i64>("age").unwrap();
    }
    assert_eq!(db.engine.stats().allocated(ResourceKind::Table), tables);
    assert_eq!(db.session.resolved_tables(), 1);
}

#[test]
fn handles_are_usable_from_other_threads() {
    let db = TestDb::open();
    let person = db.person("Ada", 36);
    let session = db.session.clone();

    let name = std::thread::spawn(move || {
        let name = person.get::<String>("name").unwrap();
        drop(person);
        name
    })
    .join()
    .unwrap();
    assert_eq!(name, "Ada");

    std::thread::spawn(move || session.count("Person").unwrap())
        .join()
        .map(|count| assert_eq!(count, 1))
        .unwrap();
    assert_eq!(db.engine.stats().invalid_releases, 0);
}
