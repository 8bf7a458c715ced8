//! Links, link lists, views and detached rows

use crate::common::*;

struct Dog(ManagedObject);

impl ObjectModel for Dog {
    const OBJECT_TYPE: &'static str = "Dog";

    fn from_managed(object: ManagedObject) -> Self {
        Dog(object)
    }

    fn as_managed(&self) -> Option<&ManagedObject> {
        Some(&self.0)
    }
}

/// A model value that was never added to a session
struct DraftDog;

impl ObjectModel for DraftDog {
    const OBJECT_TYPE: &'static str = "Dog";

    fn from_managed(_object: ManagedObject) -> Self {
        DraftDog
    }

    fn as_managed(&self) -> Option<&ManagedObject> {
        None
    }
}

#[test]
fn single_link_set_follow_and_clear() {
    let db = TestDb::open();
    let person = db.person("Ada", 36);
    let rex = db.dog("Rex");

    assert!(person.get_link("dog").unwrap().is_none());

    db.session.write(|_| person.set_link("dog", Some(&rex))).unwrap();
    let linked = person.get_link("dog").unwrap().unwrap();
    assert_eq!(linked.object_type().as_str(), "Dog");
    assert_eq!(linked.get::<String>("name").unwrap(), "Rex");

    db.session.write(|_| person.set_link("dog", None)).unwrap();
    assert!(person.get_link("dog").unwrap().is_none());
}

#[test]
fn link_targets_are_checked() {
    let db = TestDb::open();
    let person = db.person("Ada", 36);
    let other_person = db.person("Grace", 40);

    let err = db
        .session
        .write(|_| person.set_link("dog", Some(&other_person)))
        .unwrap_err();
    assert!(matches!(err, BindingError::InvalidLinkTarget(_)));

    let err = db
        .session
        .write(|_| person.set_link("dogs", None))
        .unwrap_err();
    assert!(matches!(err, BindingError::InvalidLinkTarget(_)));

    let other = TestDb::open();
    let foreign_dog = other.dog("Fido");
    let err = db
        .session
        .write(|_| person.set_link("dog", Some(&foreign_dog)))
        .unwrap_err();
    assert!(matches!(err, BindingError::InvalidLinkTarget(_)));
}

#[test]
fn models_wrap_managed_objects() {
    let db = TestDb::open();
    let person = db.person("Ada", 36);

    let dog: Dog = db
        .session
        .write(|s| {
            let dog = s.create::<Dog>()?;
            dog.0.set("name", "Rex".to_string())?;
            person.set_related("dog", Some(&dog))?;
            Ok(dog)
        })
        .unwrap();

    let related: Dog = person.get_related("dog").unwrap().unwrap();
    assert!(related.0.is_same_object(&dog.0));

    let err = db
        .session
        .write(|_| person.set_related("dog", Some(&DraftDog)))
        .unwrap_err();
    assert!(matches!(err, BindingError::NotManaged));
}

#[test]
fn link_list_keeps_order() {
    let db = TestDb::open();
    let person = db.person("Ada", 36);
    let rex = db.dog("Rex");
    let fido = db.dog("Fido");
    let bo = db.dog("Bo");

    let dogs = person.get_list("dogs").unwrap();
    assert!(!dogs.is_initialized());
    assert!(dogs.is_empty().unwrap());
    assert!(dogs.is_initialized());
    assert_eq!(dogs.target_type().as_str(), "Dog");

    db.session
        .write(|_| {
            dogs.push(&rex)?;
            dogs.push(&bo)?;
            dogs.insert(1, &fido)?;
            dogs.insert(3, &rex)
        })
        .unwrap();

    let names: Vec<String> = dogs
        .to_vec()
        .unwrap()
        .iter()
        .map(|d| d.get::<String>("name").unwrap())
        .collect();
    assert_eq!(names, ["Rex", "Fido", "Bo", "Rex"]);

    db.session.write(|_| dogs.remove(0)).unwrap();
    assert_eq!(dogs.len().unwrap(), 3);
    assert_eq!(dogs.get(0).unwrap().get::<String>("name").unwrap(), "Fido");
    // Removing a link keeps the target object.
    assert_eq!(db.session.count("Dog").unwrap(), 3);

    db.session.write(|_| dogs.clear()).unwrap();
    assert!(dogs.is_empty().unwrap());
}

#[test]
fn link_list_finds_entries() {
    let db = TestDb::open();
    let person = db.person("Ada", 36);
    let rex = db.dog("Rex");
    let fido = db.dog("Fido");
    let bo = db.dog("Bo");
    let dogs = person.get_list("dogs").unwrap();
    db.session
        .write(|_| {
            dogs.push(&rex)?;
            dogs.push(&fido)?;
            dogs.push(&rex)
        })
        .unwrap();

    assert_eq!(dogs.index_of(&rex).unwrap(), Some(0));
    assert_eq!(dogs.find_from(&rex, 1).unwrap(), Some(2));
    assert_eq!(dogs.find_from(&fido, 2).unwrap(), None);
    assert_eq!(dogs.find_from(&rex, 3).unwrap(), None);
    assert_eq!(dogs.index_of(&bo).unwrap(), None);
    assert!(matches!(
        dogs.find_from(&rex, 4).unwrap_err(),
        BindingError::IndexOutOfRange { index: 4, len: 3, .. }
    ));
    assert!(matches!(
        dogs.index_of(&person).unwrap_err(),
        BindingError::InvalidLinkTarget(_)
    ));
}

#[test]
fn link_list_bounds_and_writability() {
    let db = TestDb::open();
    let person = db.person("Ada", 36);
    let rex = db.dog("Rex");
    let dogs = person.get_list("dogs").unwrap();

    assert!(matches!(dogs.push(&rex).unwrap_err(), BindingError::OutsideTransaction));

    let err = db.session.write(|_| dogs.insert(1, &rex)).unwrap_err();
    assert!(matches!(
        err,
        BindingError::IndexOutOfRange { index: 1, len: 0, .. }
    ));
    assert!(matches!(
        dogs.get(0).unwrap_err(),
        BindingError::IndexOutOfRange { index: 0, len: 0, .. }
    ));

    let err = db.session.write(|_| dogs.push(&person)).unwrap_err();
    assert!(matches!(err, BindingError::InvalidLinkTarget(_)));

    assert!(matches!(
        person.get_list("dog").unwrap_err(),
        BindingError::InvalidLinkTarget(_)
    ));
    assert!(matches!(
        person.set_list("dogs", &[rex]).unwrap_err(),
        BindingError::NotSupported(_)
    ));
}

#[test]
fn set_list_checks_the_field_first() {
    let db = TestDb::open();
    let person = db.person("Ada", 36);

    assert!(matches!(
        person.set_list("name", &[]).unwrap_err(),
        BindingError::InvalidLinkTarget(_)
    ));
    assert!(matches!(
        person.set_list("cats", &[]).unwrap_err(),
        BindingError::UnknownProperty { .. }
    ));

    db.session.close();
    assert!(matches!(
        person.set_list("dogs", &[]).unwrap_err(),
        BindingError::SessionClosed
    ));
}

#[test]
fn removed_row_detaches_every_handle() {
    let db = TestDb::open();
    let person = db.person("Ada", 36);
    let rex = db.dog("Rex");
    let fido = db.dog("Fido");
    let dogs = person.get_list("dogs").unwrap();
    db.session
        .write(|_| {
            person.set_link("dog", Some(&rex))?;
            dogs.push(&rex)?;
            dogs.push(&fido)
        })
        .unwrap();
    let same_rex = db.session.object_at("Dog", 0).unwrap();

    db.session.write(|s| s.remove_object(&rex)).unwrap();

    for handle in [&rex, &same_rex] {
        assert!(!handle.is_valid());
        assert!(matches!(
            handle.get::<String>("name").unwrap_err(),
            BindingError::RowDetached { ref object_type } if object_type == "Dog"
        ));
    }
    assert!(person.get_link("dog").unwrap().is_none());
    assert_eq!(dogs.len().unwrap(), 1);
    assert_eq!(fido.row_index().unwrap(), RowIndex(0));
    assert_eq!(fido.get::<String>("name").unwrap(), "Fido");
}

#[test]
fn list_of_removed_owner_is_detached() {
    let db = TestDb::open();
    let person = db.person("Ada", 36);
    let dogs = person.get_list("dogs").unwrap();
    db.session.write(|s| s.remove_object(&person)).unwrap();

    assert!(matches!(dogs.len().unwrap_err(), BindingError::RowDetached { .. }));
}

#[test]
fn removing_a_foreign_object_is_rejected() {
    let db = TestDb::open();
    let other = TestDb::open();
    let foreign = other.dog("Fido");

    let err = db.session.write(|s| s.remove_object(&foreign)).unwrap_err();
    assert!(matches!(err, BindingError::NotManaged));
    assert_eq!(other.session.count("Dog").unwrap(), 1);
}

#[test]
fn views_snapshot_matching_rows() {
    let db = TestDb::open();
    for (name, age) in [("a", 30), ("b", 42), ("c", 42), ("d", 7)] {
        db.person(name, age);
    }

    let all = db.session.all("Person").unwrap();
    assert_eq!(all.len().unwrap(), 4);
    assert_eq!(all.object_type().as_str(), "Person");

    let answer = db.session.find_all_int("Person", "age", 42).unwrap();
    let names: Vec<String> = answer
        .iter()
        .unwrap()
        .map(|p| p.and_then(|p| p.get::<String>("name")))
        .collect::<std::result::Result<_, _>>()
        .unwrap();
    assert_eq!(names, ["b", "c"]);
    assert!(matches!(
        answer.get(2).unwrap_err(),
        BindingError::IndexOutOfRange { index: 2, len: 2, .. }
    ));

    let none = db.session.find_all_int("Person", "age", 1000).unwrap();
    assert!(none.is_empty().unwrap());
    assert_eq!(none.iter().unwrap().count(), 0);
}

#[test]
fn view_entries_detach_after_removal() {
    let db = TestDb::open();
    db.person("a", 1);
    db.person("b", 2);
    let view = db.session.all("Person").unwrap();

    db.session
        .write(|s| s.remove_object(&s.object_at("Person", 0)?))
        .unwrap();

    assert_eq!(view.len().unwrap(), 2);
    let first = view.get(0).unwrap();
    assert!(matches!(first.get::<String>("name").unwrap_err(), BindingError::RowDetached { .. }));
    assert_eq!(view.get(1).unwrap().get::<String>("name").unwrap(), "b");
}

#[test]
fn view_removes_its_rows() {
    let db = TestDb::open();
    for (name, age) in [("a", 42), ("b", 42), ("c", 7)] {
        db.person(name, age);
    }
    let all = db.session.all("Person").unwrap();
    let answer = db.session.find_all_int("Person", "age", 42).unwrap();

    assert!(matches!(answer.remove(0).unwrap_err(), BindingError::OutsideTransaction));
    assert_eq!(db.session.count("Person").unwrap(), 3);

    db.session.write(|_| answer.remove(0)).unwrap();
    assert_eq!(answer.len().unwrap(), 1);
    assert_eq!(answer.get(0).unwrap().get::<String>("name").unwrap(), "b");
    assert_eq!(db.session.count("Person").unwrap(), 2);
    assert!(matches!(
        all.get(0).unwrap().get::<String>("name").unwrap_err(),
        BindingError::RowDetached { .. }
    ));

    let err = db.session.write(|_| answer.remove(1)).unwrap_err();
    assert!(matches!(err, BindingError::IndexOutOfRange { index: 1, len: 1, .. }));
}

#[test]
fn find_all_int_requires_an_int_field() {
    let db = TestDb::open();
    db.person("a", 1);

    assert!(matches!(
        db.session.find_all_int("Person", "name", 1).unwrap_err(),
        BindingError::TypeMismatch { .. }
    ));
    assert!(matches!(
        db.session.object_at("Person", 5).unwrap_err(),
        BindingError::IndexOutOfRange { index: 5, len: 1, .. }
    ));
}
