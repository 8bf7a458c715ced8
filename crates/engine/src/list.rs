//! Link lists
//!
//! A [`LinkList`] is bound to one list cell (owner row + column). The native
//! link-list handle is created on first use and reused afterwards. Mutations
//! require an active write transaction; targets must be objects of the
//! declared target type in the same session.

use crate::object::ManagedObject;
use crate::registry::ColumnInfo;
use crate::session::SessionInner;
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::{Arc, Weak};
use vellum_concurrency::{require_writable, LinkListHandle, RowHandle};
use vellum_core::{Error, ObjectTypeId, Result};
use vellum_native::NativePtr;

/// Ordered links from one object to objects of a target type
pub struct LinkList {
    session: Weak<SessionInner>,
    owner_type: ObjectTypeId,
    target_type: ObjectTypeId,
    column: ColumnInfo,
    owner: Arc<RowHandle>,
    handle: OnceCell<LinkListHandle>,
}

impl LinkList {
    pub(crate) fn new(
        session: Weak<SessionInner>,
        owner_type: ObjectTypeId,
        target_type: ObjectTypeId,
        column: ColumnInfo,
        owner: Arc<RowHandle>,
    ) -> Self {
        Self {
            session,
            owner_type,
            target_type,
            column,
            owner,
            handle: OnceCell::new(),
        }
    }

    /// Object type of the list entries
    pub fn target_type(&self) -> &ObjectTypeId {
        &self.target_type
    }

    /// Check if the native list was created
    pub fn is_initialized(&self) -> bool {
        self.handle.get().is_some()
    }

    /// Number of links
    pub fn len(&self) -> Result<usize> {
        let (session, list) = self.resolve()?;
        Ok(session.engine.link_list_size(list)?)
    }

    /// Check if the list has no links
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Linked object at `index`
    pub fn get(&self, index: usize) -> Result<ManagedObject> {
        let (session, list) = self.resolve()?;
        self.check_index(&session, list, index, false)?;
        let row = session.engine.link_list_get(list, index)?;
        Ok(session.adopt_row(self.target_type.clone(), row))
    }

    /// Every linked object, in order
    pub fn to_vec(&self) -> Result<Vec<ManagedObject>> {
        (0..self.len()?).map(|i| self.get(i)).collect()
    }

    /// Position of the first link to `object`
    pub fn index_of(&self, object: &ManagedObject) -> Result<Option<usize>> {
        self.find_from(object, 0)
    }

    /// Position of the first link to `object` at or after `start`
    pub fn find_from(&self, object: &ManagedObject, start: usize) -> Result<Option<usize>> {
        let (session, list) = self.resolve()?;
        self.check_index(&session, list, start, true)?;
        let target = object.link_row(&session, &self.target_type)?;
        Ok(session.engine.link_list_find(list, target, start)?)
    }

    /// Append a link to `object`
    pub fn push(&self, object: &ManagedObject) -> Result<()> {
        let (session, list) = self.resolve_writable()?;
        let target = object.link_row(&session, &self.target_type)?;
        Ok(session.engine.link_list_add(list, target)?)
    }

    /// Insert a link to `object` before `index`
    pub fn insert(&self, index: usize, object: &ManagedObject) -> Result<()> {
        let (session, list) = self.resolve_writable()?;
        self.check_index(&session, list, index, true)?;
        let target = object.link_row(&session, &self.target_type)?;
        Ok(session.engine.link_list_insert(list, index, target)?)
    }

    /// Remove the link at `index`; the target object is kept
    pub fn remove(&self, index: usize) -> Result<()> {
        let (session, list) = self.resolve_writable()?;
        self.check_index(&session, list, index, false)?;
        Ok(session.engine.link_list_erase(list, index)?)
    }

    /// Remove every link
    pub fn clear(&self) -> Result<()> {
        let (session, list) = self.resolve_writable()?;
        Ok(session.engine.link_list_clear(list)?)
    }

    /// Release the native list early
    pub fn release(&self) -> bool {
        self.handle.get().map(LinkListHandle::release).unwrap_or(false)
    }

    fn check_index(&self, session: &SessionInner, list: NativePtr, index: usize, inclusive: bool) -> Result<()> {
        let len = session.engine.link_list_size(list)?;
        if index > len || (index == len && !inclusive) {
            return Err(Error::IndexOutOfRange {
                what: "link list",
                index,
                len,
            });
        }
        Ok(())
    }

    fn resolve_writable(&self) -> Result<(Arc<SessionInner>, NativePtr)> {
        let (session, list) = self.resolve()?;
        require_writable(&session.write)?;
        Ok((session, list))
    }

    /// Live session and native list pointer, creating the list on first use
    fn resolve(&self) -> Result<(Arc<SessionInner>, NativePtr)> {
        let session = self.session.upgrade().ok_or(Error::SessionClosed)?;
        if !session.handle.is_valid() {
            return Err(Error::SessionClosed);
        }
        let row = session
            .engine
            .row_index(self.owner.ptr()?)
            .ok_or_else(|| Error::RowDetached {
                object_type: self.owner_type.to_string(),
            })?;
        let handle = self.handle.get_or_try_init(|| -> Result<LinkListHandle> {
            let table = session.table(&self.owner_type)?;
            let ptr = session.engine.get_link_list(table.ptr()?, self.column.index, row)?;
            Ok(LinkListHandle::acquire(session.engine.clone(), ptr))
        })?;
        let list = handle.ptr()?;
        Ok((session, list))
    }
}

impl fmt::Debug for LinkList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkList")
            .field("owner_type", &self.owner_type)
            .field("property", &self.column.property.name)
            .field("target_type", &self.target_type)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
