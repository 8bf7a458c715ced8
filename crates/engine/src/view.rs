//! Table views: query results over one object type

use crate::object::ManagedObject;
use crate::session::SessionInner;
use std::fmt;
use std::sync::{Arc, Weak};
use vellum_concurrency::{require_writable, ViewHandle};
use vellum_core::{Error, ObjectTypeId, Result};
use vellum_native::NativePtr;

/// Snapshot of matching rows
///
/// Rows removed after the view was built are reported as `RowDetached` when
/// their object is accessed.
pub struct TableView {
    session: Weak<SessionInner>,
    object_type: ObjectTypeId,
    handle: ViewHandle,
}

impl TableView {
    pub(crate) fn new(session: &Arc<SessionInner>, object_type: ObjectTypeId, view: NativePtr) -> Self {
        Self {
            session: Arc::downgrade(session),
            handle: ViewHandle::acquire(session.engine.clone(), view),
            object_type,
        }
    }

    /// Object type of the rows
    pub fn object_type(&self) -> &ObjectTypeId {
        &self.object_type
    }

    /// Number of rows
    pub fn len(&self) -> Result<usize> {
        let session = self.session()?;
        Ok(session.engine.view_size(self.handle.ptr()?)?)
    }

    /// Check if the view is empty
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Object at `index`
    pub fn get(&self, index: usize) -> Result<ManagedObject> {
        let session = self.session()?;
        let view = self.handle.ptr()?;
        let len = session.engine.view_size(view)?;
        if index >= len {
            return Err(Error::IndexOutOfRange {
                what: "table view",
                index,
                len,
            });
        }
        let row = session.engine.view_row_at(view, index)?;
        Ok(session.adopt_row(self.object_type.clone(), row))
    }

    /// Iterate the objects in order
    pub fn iter(&self) -> Result<TableViewIter<'_>> {
        Ok(TableViewIter {
            view: self,
            next: 0,
            len: self.len()?,
        })
    }

    /// Every object, in order
    pub fn to_vec(&self) -> Result<Vec<ManagedObject>> {
        self.iter()?.collect()
    }

    /// Delete the object at `index` from its table and from this view
    ///
    /// Needs an active write transaction. Other views keep their entry for
    /// the row, which then reports `RowDetached`.
    pub fn remove(&self, index: usize) -> Result<()> {
        let session = self.session()?;
        require_writable(&session.write)?;
        let view = self.handle.ptr()?;
        let len = session.engine.view_size(view)?;
        if index >= len {
            return Err(Error::IndexOutOfRange {
                what: "table view",
                index,
                len,
            });
        }
        Ok(session.engine.view_remove_row(view, index)?)
    }

    /// Release the native view early
    pub fn release(&self) -> bool {
        self.handle.release()
    }

    fn session(&self) -> Result<Arc<SessionInner>> {
        let session = self.session.upgrade().ok_or(Error::SessionClosed)?;
        if !session.handle.is_valid() {
            return Err(Error::SessionClosed);
        }
        Ok(session)
    }
}

impl fmt::Debug for TableView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableView")
            .field("object_type", &self.object_type)
            .field("handle", &self.handle)
            .finish()
    }
}

/// Iterator over a [`TableView`]
#[derive(Debug)]
pub struct TableViewIter<'a> {
    view: &'a TableView,
    next: usize,
    len: usize,
}

impl Iterator for TableViewIter<'_> {
    type Item = Result<ManagedObject>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.len {
            return None;
        }
        let item = self.view.get(self.next);
        self.next += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.len - self.next;
        (remaining, Some(remaining))
    }
}
