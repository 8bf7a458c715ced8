//! Per-session table and column cache
//!
//! The registry maps object types to table handles and (type, field) pairs to
//! column positions. Both maps are append-only: an entry is computed at most
//! once per session and shared by every object of the type. A registry
//! belongs to exactly one session and dies with it.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::trace;
use vellum_concurrency::TableHandle;
use vellum_core::{ColumnIndex, Error, ObjectTypeId, Property, Result, Schema};
use vellum_native::{NativeEngine, NativePtr};

/// Cached position and declared shape of one property
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column position in the native table
    pub index: ColumnIndex,
    /// Declared property
    pub property: Property,
}

/// Table and column cache of one session
pub struct TableRegistry {
    engine: Arc<dyn NativeEngine>,
    schema: Schema,
    tables: DashMap<ObjectTypeId, Arc<TableHandle>>,
    columns: DashMap<(ObjectTypeId, String), ColumnInfo>,
}

impl TableRegistry {
    /// Create an empty registry for a session with `schema`
    pub fn new(engine: Arc<dyn NativeEngine>, schema: Schema) -> Self {
        Self {
            engine,
            schema,
            tables: DashMap::new(),
            columns: DashMap::new(),
        }
    }

    /// Schema the session was opened with
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Declared property of a field, without touching the engine
    pub fn property(&self, type_id: &ObjectTypeId, field: &str) -> Result<&Property> {
        let object = self
            .schema
            .find(type_id.as_str())
            .ok_or_else(|| Error::UnknownObjectType(type_id.to_string()))?;
        object.property(field).ok_or_else(|| Error::UnknownProperty {
            object_type: type_id.to_string(),
            property: field.to_string(),
        })
    }

    /// Table handle of an object type, resolved on first use
    pub fn resolve_table(&self, session: NativePtr, type_id: &ObjectTypeId) -> Result<Arc<TableHandle>> {
        if let Some(table) = self.tables.get(type_id) {
            return Ok(table.clone());
        }
        match self.tables.entry(type_id.clone()) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let ptr = self
                    .engine
                    .get_table(session, type_id.as_str())?
                    .ok_or_else(|| Error::UnknownObjectType(type_id.to_string()))?;
                trace!(object_type = %type_id, "table resolved");
                let table = Arc::new(TableHandle::acquire(self.engine.clone(), ptr));
                entry.insert(table.clone());
                Ok(table)
            }
        }
    }

    /// Column position and declared property of a field
    pub fn column(&self, session: NativePtr, type_id: &ObjectTypeId, field: &str) -> Result<ColumnInfo> {
        let key = (type_id.clone(), field.to_string());
        if let Some(info) = self.columns.get(&key) {
            return Ok(info.clone());
        }
        let property = self.property(type_id, field)?.clone();
        let table = self.resolve_table(session, type_id)?;
        let index = self
            .engine
            .get_column_index(table.ptr()?, field)?
            .ok_or_else(|| Error::UnknownProperty {
                object_type: type_id.to_string(),
                property: field.to_string(),
            })?;
        let info = ColumnInfo { index, property };
        self.columns.entry(key).or_insert(info.clone());
        Ok(info)
    }

    /// Column position of a field
    pub fn column_index(&self, session: NativePtr, type_id: &ObjectTypeId, field: &str) -> Result<ColumnIndex> {
        Ok(self.column(session, type_id, field)?.index)
    }

    /// Number of resolved tables
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Drop every cached table handle
    pub(crate) fn clear(&self) {
        self.columns.clear();
        self.tables.clear();
    }
}
