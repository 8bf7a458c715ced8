//! Open database sessions
//!
//! A [`Session`] owns the native session handle, the table registry and the
//! write-transaction state. Managed objects, link lists and views hold a
//! `Weak` reference to the session; once it is closed or dropped their
//! accessors fail with `SessionClosed`.

use crate::object::{ManagedObject, ObjectModel};
use crate::registry::{ColumnInfo, TableRegistry};
use crate::transaction::WriteTransaction;
use crate::view::TableView;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use vellum_concurrency::{require_writable, RowHandle, SessionHandle, TableHandle, WriteState};
use vellum_core::{Error, FieldKind, ObjectTypeId, PropertyType, Result, RowIndex, Schema};
use vellum_native::{NativeEngine, NativePtr};

// Field order is drop order: cached tables go before the session pointer.
pub(crate) struct SessionInner {
    pub(crate) registry: TableRegistry,
    pub(crate) write: WriteState,
    pub(crate) handle: SessionHandle,
    pub(crate) engine: Arc<dyn NativeEngine>,
    pub(crate) path: PathBuf,
    read_only: bool,
}

impl SessionInner {
    pub(crate) fn ptr(&self) -> Result<NativePtr> {
        self.handle.ptr().map_err(|_| Error::SessionClosed)
    }

    pub(crate) fn table(&self, type_id: &ObjectTypeId) -> Result<Arc<TableHandle>> {
        self.registry.resolve_table(self.ptr()?, type_id)
    }

    pub(crate) fn column(&self, type_id: &ObjectTypeId, field: &str) -> Result<ColumnInfo> {
        self.registry.column(self.ptr()?, type_id, field)
    }

    /// Wrap the row at `row` of `type_id` in a managed object
    pub(crate) fn materialize(self: &Arc<Self>, type_id: &ObjectTypeId, row: RowIndex) -> Result<ManagedObject> {
        let table = self.table(type_id)?;
        let ptr = self.engine.row_at(table.ptr()?, row)?;
        Ok(self.adopt_row(type_id.clone(), ptr))
    }

    /// Take ownership of a row pointer the engine produced
    pub(crate) fn adopt_row(self: &Arc<Self>, type_id: ObjectTypeId, ptr: NativePtr) -> ManagedObject {
        let row = RowHandle::acquire(self.engine.clone(), ptr);
        ManagedObject::new(Arc::downgrade(self), type_id, Arc::new(row))
    }

    fn close(&self) -> bool {
        self.registry.clear();
        let closed = self.handle.release();
        if closed {
            info!(path = %self.path.display(), "session closed");
        }
        closed
    }
}

/// An open database
///
/// Cloning is cheap; clones share one native session.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    pub(crate) fn new(
        engine: Arc<dyn NativeEngine>,
        handle: SessionHandle,
        schema: Schema,
        path: PathBuf,
        read_only: bool,
    ) -> Self {
        debug!(path = %path.display(), types = schema.len(), "session ready");
        Self {
            inner: Arc::new(SessionInner {
                registry: TableRegistry::new(engine.clone(), schema),
                write: WriteState::new(),
                handle,
                engine,
                path,
                read_only,
            }),
        }
    }

    /// Database path
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Schema of the session
    pub fn schema(&self) -> &Schema {
        self.inner.registry.schema()
    }

    /// Check if the session was opened read-only
    pub fn is_read_only(&self) -> bool {
        self.inner.read_only
    }

    /// Check if the session was closed
    pub fn is_closed(&self) -> bool {
        !self.inner.handle.is_valid()
    }

    /// Close the session
    ///
    /// Releases the cached tables and the native session. Objects created
    /// from this session fail with `SessionClosed` afterwards. Returns `false`
    /// if the session was already closed.
    pub fn close(&self) -> bool {
        self.inner.close()
    }

    /// Check if a write transaction is active
    pub fn is_in_write_transaction(&self) -> bool {
        self.inner.write.is_active()
    }

    /// Start a write transaction
    ///
    /// The returned guard rolls back when dropped without `commit`.
    pub fn begin_write(&self) -> Result<WriteTransaction<'_>> {
        WriteTransaction::begin(&self.inner)
    }

    /// Run `f` inside a write transaction
    ///
    /// Commits when `f` returns `Ok`, rolls back otherwise.
    pub fn write<R>(&self, f: impl FnOnce(&Session) -> Result<R>) -> Result<R> {
        let txn = self.begin_write()?;
        match f(self) {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(e) => {
                txn.rollback()?;
                Err(e)
            }
        }
    }

    /// Append a new object of `object_type`
    pub fn create_object(&self, object_type: &str) -> Result<ManagedObject> {
        require_writable(&self.inner.write)?;
        let type_id = ObjectTypeId::new(object_type);
        let table = self.inner.table(&type_id)?;
        let row = self.inner.engine.add_row(table.ptr()?)?;
        self.inner.materialize(&type_id, row)
    }

    /// Append a new object of a model type
    pub fn create<M: ObjectModel>(&self) -> Result<M> {
        self.create_object(M::OBJECT_TYPE).map(M::from_managed)
    }

    /// Delete an object's row
    ///
    /// Every handle to the row becomes detached; links to it are nulled.
    pub fn remove_object(&self, object: &ManagedObject) -> Result<()> {
        require_writable(&self.inner.write)?;
        if !object.belongs_to(&self.inner) {
            return Err(Error::NotManaged);
        }
        let row = object.row_index()?;
        let table = self.inner.table(object.object_type())?;
        self.inner.engine.remove_row(table.ptr()?, row)?;
        Ok(())
    }

    /// Number of objects of `object_type`
    pub fn count(&self, object_type: &str) -> Result<usize> {
        let table = self.inner.table(&ObjectTypeId::new(object_type))?;
        Ok(self.inner.engine.row_count(table.ptr()?)?)
    }

    /// Object at position `index` of its table
    pub fn object_at(&self, object_type: &str, index: usize) -> Result<ManagedObject> {
        let len = self.count(object_type)?;
        if index >= len {
            return Err(Error::IndexOutOfRange {
                what: "table",
                index,
                len,
            });
        }
        self.inner.materialize(&ObjectTypeId::new(object_type), RowIndex(index))
    }

    /// View over every object of `object_type`
    pub fn all(&self, object_type: &str) -> Result<TableView> {
        let type_id = ObjectTypeId::new(object_type);
        let table = self.inner.table(&type_id)?;
        let view = self.inner.engine.table_view_all(table.ptr()?)?;
        Ok(TableView::new(&self.inner, type_id, view))
    }

    /// View over objects whose integer `field` equals `value`
    pub fn find_all_int(&self, object_type: &str, field: &str, value: i64) -> Result<TableView> {
        let type_id = ObjectTypeId::new(object_type);
        let property = self.inner.registry.property(&type_id, field)?;
        if property.property_type != PropertyType::Int {
            return Err(Error::TypeMismatch {
                property: field.to_string(),
                declared: property.property_type,
                requested: FieldKind::Int64,
            });
        }
        let column = self.inner.column(&type_id, field)?;
        let table = self.inner.table(&type_id)?;
        let view = self.inner.engine.find_all_int(table.ptr()?, column.index, value)?;
        Ok(TableView::new(&self.inner, type_id, view))
    }

    /// Number of object types whose table was resolved so far
    pub fn resolved_tables(&self) -> usize {
        self.inner.registry.table_count()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("path", &self.inner.path)
            .field("closed", &self.is_closed())
            .field("in_write", &self.is_in_write_transaction())
            .finish()
    }
}
