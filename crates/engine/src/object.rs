//! Managed objects
//!
//! A [`ManagedObject`] is one row of a session, addressed by its object type
//! and an owned row handle. Every access rebuilds the cell coordinate: the
//! table comes from the session registry, the column from the column cache
//! and the row position is re-read from the row handle.
//!
//! Access order for every accessor:
//! 1. the session must be alive (`SessionClosed`)
//! 2. the field is checked against the schema (`UnknownProperty`,
//!    `UnsupportedFieldType`, `TypeMismatch`), without any native call
//! 3. setters check the write transaction (`OutsideTransaction`)
//! 4. the row must still exist (`RowDetached`)
//! 5. the native primitive is called

use crate::accessor::{self, check_field, check_kind, Field, RowCoordinate};
use crate::list::LinkList;
use crate::registry::ColumnInfo;
use crate::session::SessionInner;
use std::fmt;
use std::sync::{Arc, Weak};
use vellum_concurrency::{require_writable, RowHandle};
use vellum_core::{Error, FieldValue, ObjectTypeId, Property, PropertyType, Result, RowIndex};

/// A typed object model bound to one object type
///
/// Implemented by application types that wrap a [`ManagedObject`]. A model
/// value that was never added to a session returns `None` from
/// [`as_managed`](Self::as_managed).
pub trait ObjectModel: Sized {
    /// Schema name of the object type
    const OBJECT_TYPE: &'static str;

    /// Wrap a managed object of [`OBJECT_TYPE`](Self::OBJECT_TYPE)
    fn from_managed(object: ManagedObject) -> Self;

    /// The managed object behind this model, if any
    fn as_managed(&self) -> Option<&ManagedObject>;
}

/// One row of an open session
pub struct ManagedObject {
    session: Weak<SessionInner>,
    object_type: ObjectTypeId,
    row: Arc<RowHandle>,
}

impl ManagedObject {
    pub(crate) fn new(session: Weak<SessionInner>, object_type: ObjectTypeId, row: Arc<RowHandle>) -> Self {
        Self {
            session,
            object_type,
            row,
        }
    }

    /// Object type
    pub fn object_type(&self) -> &ObjectTypeId {
        &self.object_type
    }

    /// Check if the session is open and the row still exists
    pub fn is_valid(&self) -> bool {
        self.session()
            .and_then(|session| self.row_index_in(&session))
            .is_ok()
    }

    /// Current position of the row in its table
    pub fn row_index(&self) -> Result<RowIndex> {
        let session = self.session()?;
        self.row_index_in(&session)
    }

    /// Release the row handle early
    ///
    /// Returns `false` if it was already released.
    pub fn release(&self) -> bool {
        self.row.release()
    }

    /// Check if both objects address the same row of the same session
    pub fn is_same_object(&self, other: &ManagedObject) -> bool {
        Weak::ptr_eq(&self.session, &other.session)
            && self.object_type == other.object_type
            && matches!(
                (self.row_index(), other.row_index()),
                (Ok(a), Ok(b)) if a == b
            )
    }

    /// Read a typed field
    pub fn get<T: Field>(&self, field: &str) -> Result<T> {
        let session = self.session()?;
        check_kind(session.registry.property(&self.object_type, field)?, T::KIND)?;
        let at = self.locate(&session, field)?;
        T::read(&*session.engine, &at, field)
    }

    /// Write a typed field
    pub fn set<T: Field>(&self, field: &str, value: T) -> Result<()> {
        let session = self.session()?;
        check_kind(session.registry.property(&self.object_type, field)?, T::KIND)?;
        require_writable(&session.write)?;
        let at = self.locate(&session, field)?;
        value.write(&*session.engine, &at)
    }

    /// Read a field as a [`FieldValue`] chosen by its declared type
    pub fn get_value(&self, field: &str) -> Result<FieldValue> {
        let session = self.session()?;
        let property = session.registry.property(&self.object_type, field)?;
        check_field(property)?;
        let at = self.locate(&session, field)?;
        accessor::read_value(&*session.engine, &at, property)
    }

    /// Write a [`FieldValue`] to a field of a compatible declared type
    pub fn set_value(&self, field: &str, value: FieldValue) -> Result<()> {
        let session = self.session()?;
        let property = session.registry.property(&self.object_type, field)?;
        check_kind(property, value.kind())?;
        require_writable(&session.write)?;
        let at = self.locate(&session, field)?;
        accessor::write_value(&*session.engine, &at, property, value)
    }

    /// Follow a single link; `None` for a null link
    pub fn get_link(&self, field: &str) -> Result<Option<ManagedObject>> {
        let session = self.session()?;
        let target = link_target(session.registry.property(&self.object_type, field)?, PropertyType::Object)?;
        let at = self.locate(&session, field)?;
        let linked = session.engine.get_link(at.table, at.column, at.row)?;
        Ok(linked.map(|ptr| session.adopt_row(target, ptr)))
    }

    /// Point a single link at `target`, or null it with `None`
    pub fn set_link(&self, field: &str, target: Option<&ManagedObject>) -> Result<()> {
        let session = self.session()?;
        let expected = link_target(session.registry.property(&self.object_type, field)?, PropertyType::Object)?;
        require_writable(&session.write)?;
        let at = self.locate(&session, field)?;
        match target {
            Some(object) => {
                let target_row = object.link_row(&session, &expected)?;
                session.engine.set_link(at.table, at.column, at.row, target_row)?;
            }
            None => session.engine.clear_link(at.table, at.column, at.row)?,
        }
        Ok(())
    }

    /// Follow a single link as a model type
    pub fn get_related<M: ObjectModel>(&self, field: &str) -> Result<Option<M>> {
        match self.get_link(field)? {
            Some(object) if object.object_type.as_str() != M::OBJECT_TYPE => Err(Error::InvalidLinkTarget(
                format!("{} links to {}, not {}", field, object.object_type, M::OBJECT_TYPE),
            )),
            linked => Ok(linked.map(M::from_managed)),
        }
    }

    /// Point a single link at a model, or null it with `None`
    pub fn set_related<M: ObjectModel>(&self, field: &str, target: Option<&M>) -> Result<()> {
        let target = match target {
            Some(model) => Some(model.as_managed().ok_or(Error::NotManaged)?),
            None => None,
        };
        self.set_link(field, target)
    }

    /// Link list of a list field
    ///
    /// The native list is created on first use of the returned value.
    pub fn get_list(&self, field: &str) -> Result<LinkList> {
        let session = self.session()?;
        let target = link_target(session.registry.property(&self.object_type, field)?, PropertyType::List)?;
        let column = session.column(&self.object_type, field)?;
        Ok(LinkList::new(
            self.session.clone(),
            self.object_type.clone(),
            target,
            column,
            self.row.clone(),
        ))
    }

    /// Assigning a whole list is not supported; mutate the [`LinkList`]
    pub fn set_list(&self, field: &str, _objects: &[ManagedObject]) -> Result<()> {
        let session = self.session()?;
        link_target(session.registry.property(&self.object_type, field)?, PropertyType::List)?;
        Err(Error::NotSupported(format!(
            "cannot assign list property {}; mutate its LinkList instead",
            field
        )))
    }

    pub(crate) fn belongs_to(&self, session: &Arc<SessionInner>) -> bool {
        std::ptr::eq(self.session.as_ptr(), Arc::as_ptr(session))
    }

    /// Row position of this object as a link target of `expected` type
    pub(crate) fn link_row(&self, session: &Arc<SessionInner>, expected: &ObjectTypeId) -> Result<RowIndex> {
        if !self.belongs_to(session) {
            return Err(Error::InvalidLinkTarget(
                "object belongs to another session".to_string(),
            ));
        }
        if &self.object_type != expected {
            return Err(Error::InvalidLinkTarget(format!(
                "expected {}, got {}",
                expected, self.object_type
            )));
        }
        self.row_index_in(session)
    }

    fn session(&self) -> Result<Arc<SessionInner>> {
        let session = self.session.upgrade().ok_or(Error::SessionClosed)?;
        if !session.handle.is_valid() {
            return Err(Error::SessionClosed);
        }
        Ok(session)
    }

    fn row_index_in(&self, session: &SessionInner) -> Result<RowIndex> {
        session
            .engine
            .row_index(self.row.ptr()?)
            .ok_or_else(|| Error::RowDetached {
                object_type: self.object_type.to_string(),
            })
    }

    fn locate(&self, session: &SessionInner, field: &str) -> Result<RowCoordinate> {
        let ColumnInfo { index, .. } = session.column(&self.object_type, field)?;
        let table = session.table(&self.object_type)?;
        Ok(RowCoordinate {
            table: table.ptr()?,
            column: index,
            row: self.row_index_in(session)?,
        })
    }
}

/// Target type of a link property of the given kind
fn link_target(property: &Property, kind: PropertyType) -> Result<ObjectTypeId> {
    if property.property_type != kind {
        return Err(Error::InvalidLinkTarget(format!(
            "{} is a {:?} property, not {:?}",
            property.name, property.property_type, kind
        )));
    }
    Ok(ObjectTypeId::new(property.object_type.as_deref().unwrap_or_default()))
}

impl fmt::Debug for ManagedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedObject")
            .field("object_type", &self.object_type)
            .field("row", &self.row)
            .finish()
    }
}
