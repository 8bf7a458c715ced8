//! Table storage of the in-memory engine
//!
//! A [`MemoryFile`] plays the role of one database file: a set of tables with
//! typed columns. Rows carry a stable id so row pointers survive index shifts
//! caused by removals. Write transactions snapshot the whole file and restore
//! it on rollback.

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::path::PathBuf;
use vellum_core::config::ENCRYPTION_KEY_LEN;
use vellum_core::{
    ColumnIndex, NativeError, NativeErrorCode, ObjectSchema, Property, PropertyType, RowIndex,
    Schema,
};

use crate::engine::NativeResult;

/// One stored cell
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Cell {
    Null,
    Int(i64),
    Bool(bool),
    Float(f32),
    Double(f64),
    String(String),
    Date(i64),
    Data(Vec<u8>),
    Link(Option<u64>),
    List(Vec<u64>),
}

impl Cell {
    fn default_for(property_type: PropertyType) -> Self {
        match property_type {
            PropertyType::Int => Cell::Int(0),
            PropertyType::Bool => Cell::Bool(false),
            PropertyType::Float => Cell::Float(0.0),
            PropertyType::Double => Cell::Double(0.0),
            PropertyType::String => Cell::String(String::new()),
            PropertyType::Date => Cell::Date(0),
            PropertyType::Data => Cell::Data(Vec::new()),
            PropertyType::Mixed => Cell::Null,
            PropertyType::Object => Cell::Link(None),
            PropertyType::List => Cell::List(Vec::new()),
        }
    }

    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            Cell::Null => "null",
            Cell::Int(_) => "int",
            Cell::Bool(_) => "bool",
            Cell::Float(_) => "float",
            Cell::Double(_) => "double",
            Cell::String(_) => "string",
            Cell::Date(_) => "timestamp",
            Cell::Data(_) => "binary",
            Cell::Link(_) => "link",
            Cell::List(_) => "link list",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Column {
    pub(crate) name: String,
    pub(crate) property_type: PropertyType,
    pub(crate) target: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct RowData {
    pub(crate) id: u64,
    pub(crate) cells: SmallVec<[Cell; 8]>,
}

#[derive(Debug, Clone)]
pub(crate) struct TableData {
    pub(crate) name: String,
    pub(crate) columns: Vec<Column>,
    pub(crate) rows: Vec<RowData>,
    next_row_id: u64,
}

pub(crate) fn out_of_bounds(what: &str, index: usize, len: usize) -> NativeError {
    NativeError::new(
        NativeErrorCode::IndexOutOfBounds,
        format!("{} index {} out of bounds (size {})", what, index, len),
    )
}

impl TableData {
    fn from_schema(object: &ObjectSchema) -> Self {
        Self {
            name: object.name.clone(),
            columns: object
                .properties
                .iter()
                .map(|p| Column {
                    name: p.name.clone(),
                    property_type: p.property_type,
                    target: p.object_type.clone(),
                })
                .collect(),
            rows: Vec::new(),
            next_row_id: 1,
        }
    }

    pub(crate) fn to_schema(&self) -> ObjectSchema {
        ObjectSchema::new(
            self.name.clone(),
            self.columns
                .iter()
                .map(|c| Property {
                    name: c.name.clone(),
                    property_type: c.property_type,
                    object_type: c.target.clone(),
                })
                .collect(),
        )
    }

    pub(crate) fn column_index(&self, name: &str) -> Option<ColumnIndex> {
        self.columns.iter().position(|c| c.name == name).map(ColumnIndex)
    }

    pub(crate) fn column(&self, column: ColumnIndex) -> NativeResult<&Column> {
        self.columns
            .get(column.0)
            .ok_or_else(|| out_of_bounds("column", column.0, self.columns.len()))
    }

    pub(crate) fn position(&self, row_id: u64) -> Option<RowIndex> {
        self.rows.iter().position(|r| r.id == row_id).map(RowIndex)
    }

    pub(crate) fn row(&self, row: RowIndex) -> NativeResult<&RowData> {
        self.rows
            .get(row.0)
            .ok_or_else(|| out_of_bounds("row", row.0, self.rows.len()))
    }

    pub(crate) fn cell(&self, column: ColumnIndex, row: RowIndex) -> NativeResult<&Cell> {
        self.column(column)?;
        Ok(&self.row(row)?.cells[column.0])
    }

    pub(crate) fn cell_mut(&mut self, column: ColumnIndex, row: RowIndex) -> NativeResult<&mut Cell> {
        self.column(column)?;
        let len = self.rows.len();
        let data = self
            .rows
            .get_mut(row.0)
            .ok_or_else(|| out_of_bounds("row", row.0, len))?;
        Ok(&mut data.cells[column.0])
    }

    pub(crate) fn add_row(&mut self) -> RowIndex {
        let id = self.next_row_id;
        self.next_row_id += 1;
        let cells = self
            .columns
            .iter()
            .map(|c| Cell::default_for(c.property_type))
            .collect();
        self.rows.push(RowData { id, cells });
        RowIndex(self.rows.len() - 1)
    }

    fn add_column(&mut self, property: &Property) {
        self.columns.push(Column {
            name: property.name.clone(),
            property_type: property.property_type,
            target: property.object_type.clone(),
        });
        let default = Cell::default_for(property.property_type);
        for row in &mut self.rows {
            row.cells.push(default.clone());
        }
    }

    /// Drop every link that points at `row_id` of `target`
    fn unlink(&mut self, target: &str, row_id: u64) {
        let linked: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.target.as_deref() == Some(target))
            .map(|(i, _)| i)
            .collect();
        for row in &mut self.rows {
            for &i in &linked {
                match &mut row.cells[i] {
                    Cell::Link(link) if *link == Some(row_id) => *link = None,
                    Cell::List(ids) => ids.retain(|id| *id != row_id),
                    _ => {}
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FileData {
    pub(crate) schema_version: u64,
    pub(crate) order: Vec<String>,
    pub(crate) tables: FxHashMap<String, TableData>,
}

impl FileData {
    pub(crate) fn table(&self, name: &str) -> NativeResult<&TableData> {
        self.tables.get(name).ok_or_else(|| missing_table(name))
    }

    pub(crate) fn table_mut(&mut self, name: &str) -> NativeResult<&mut TableData> {
        self.tables.get_mut(name).ok_or_else(|| missing_table(name))
    }

    pub(crate) fn schema(&self) -> Schema {
        self.order
            .iter()
            .filter_map(|name| self.tables.get(name))
            .map(TableData::to_schema)
            .collect()
    }

    /// Remove a row and null every link pointing at it
    pub(crate) fn remove_row(&mut self, table: &str, row: RowIndex) -> NativeResult<()> {
        let data = self.table_mut(table)?;
        let len = data.rows.len();
        if row.0 >= len {
            return Err(out_of_bounds("row", row.0, len));
        }
        let removed = data.rows.remove(row.0);
        for other in self.tables.values_mut() {
            other.unlink(table, removed.id);
        }
        Ok(())
    }
}

fn missing_table(name: &str) -> NativeError {
    NativeError::new(NativeErrorCode::InvalidState, format!("no table named {}", name))
}

struct WriteTxn {
    session: u64,
    backup: FileData,
}

/// One database "file"
pub(crate) struct MemoryFile {
    pub(crate) path: PathBuf,
    encryption_key: Option<[u8; ENCRYPTION_KEY_LEN]>,
    pub(crate) data: RwLock<FileData>,
    txn: Mutex<Option<WriteTxn>>,
}

impl MemoryFile {
    pub(crate) fn new(path: PathBuf, encryption_key: Option<[u8; ENCRYPTION_KEY_LEN]>) -> Self {
        Self {
            path,
            encryption_key,
            data: RwLock::new(FileData::default()),
            txn: Mutex::new(None),
        }
    }

    pub(crate) fn check_key(&self, key: Option<&[u8; ENCRYPTION_KEY_LEN]>) -> NativeResult<()> {
        if self.encryption_key.as_ref() != key {
            return Err(NativeError::new(
                NativeErrorCode::InvalidEncryptionKey,
                format!("{}: encryption key does not match", self.path.display()),
            ));
        }
        Ok(())
    }

    /// Create missing tables and columns
    ///
    /// New columns on existing tables require a higher schema version; a
    /// changed column type is always a mismatch.
    pub(crate) fn apply_schema(&self, schema: &Schema, version: u64) -> NativeResult<()> {
        let mut guard = self.data.write();
        let data = &mut *guard;
        for object in schema.iter() {
            match data.tables.get(&object.name) {
                None => {
                    data.order.push(object.name.clone());
                    data.tables
                        .insert(object.name.clone(), TableData::from_schema(object));
                }
                Some(existing) => {
                    for property in &object.properties {
                        match existing.column_index(&property.name) {
                            Some(index) => {
                                if existing.columns[index.0].property_type != property.property_type {
                                    return Err(mismatch(&object.name, &property.name));
                                }
                            }
                            None if version > data.schema_version => {}
                            None => return Err(mismatch(&object.name, &property.name)),
                        }
                    }
                    let table = data.table_mut(&object.name)?;
                    for property in &object.properties {
                        if table.column_index(&property.name).is_none() {
                            table.add_column(property);
                        }
                    }
                }
            }
        }
        data.schema_version = data.schema_version.max(version);
        Ok(())
    }

    pub(crate) fn in_write(&self) -> bool {
        self.txn.lock().is_some()
    }

    pub(crate) fn begin_write(&self, session: u64) -> NativeResult<()> {
        let mut txn = self.txn.lock();
        if txn.is_some() {
            return Err(NativeError::new(
                NativeErrorCode::InvalidState,
                "a write transaction is already active on this file",
            ));
        }
        *txn = Some(WriteTxn {
            session,
            backup: self.data.read().clone(),
        });
        Ok(())
    }

    pub(crate) fn commit_write(&self, session: u64) -> NativeResult<()> {
        let mut txn = self.txn.lock();
        match txn.as_ref() {
            Some(active) if active.session == session => {
                *txn = None;
                Ok(())
            }
            _ => Err(not_writing()),
        }
    }

    pub(crate) fn cancel_write(&self, session: u64) -> NativeResult<()> {
        let mut txn = self.txn.lock();
        match txn.take() {
            Some(active) if active.session == session => {
                *self.data.write() = active.backup;
                Ok(())
            }
            other => {
                *txn = other;
                Err(not_writing())
            }
        }
    }

    /// Roll back a transaction left open by a closing session
    pub(crate) fn abandon(&self, session: u64) -> bool {
        self.cancel_write(session).is_ok()
    }
}

fn mismatch(object: &str, property: &str) -> NativeError {
    NativeError::new(
        NativeErrorCode::SchemaMismatch,
        format!("property {}.{} does not match the stored schema", object, property),
    )
}

pub(crate) fn not_writing() -> NativeError {
    NativeError::new(
        NativeErrorCode::InvalidState,
        "not inside a write transaction",
    )
}
