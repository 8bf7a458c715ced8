//! In-memory reference engine
//!
//! [`MemoryEngine`] implements every [`NativeEngine`] primitive on top of
//! process-local tables. It is the default engine of the binding and the
//! engine the test suite runs against.
//!
//! Besides the primitives it keeps [`StatsSnapshot`] counters (allocations and
//! releases per resource kind, cell reads and writes, cancel calls) so tests
//! can prove that a release happened exactly once or that a rejected call never
//! reached the engine. The `complete_open`, `fail_open` and `report_progress`
//! methods let a test play the sync client when the engine runs in
//! [`AsyncOpenMode::Manual`].

mod async_open;
mod store;

pub use async_open::AsyncOpenMode;

use crate::engine::{NativeConfig, NativeEngine, NativeResult, ProgressCallback};
use crate::pending::CompletionSlot;
use crate::ptr::{NativePtr, ProgressTokenId};
use async_open::AsyncOp;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use store::{not_writing, out_of_bounds, Cell, MemoryFile};
use tracing::{debug, trace, warn};
use vellum_core::{
    ColumnIndex, LogLevel, NativeError, NativeErrorCode, PropertyType, RowIndex, Schema,
    SyncClientSettings, SyncProgress,
};

/// Kind of a pointer handed out by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Session
    Session,
    /// Thread-safe session reference
    Reference,
    /// Table
    Table,
    /// Tracked row
    Row,
    /// Link list
    LinkList,
    /// Table view
    View,
    /// Async-open operation
    AsyncOpen,
}

const KIND_COUNT: usize = 7;

impl ResourceKind {
    /// All kinds
    pub const ALL: [ResourceKind; KIND_COUNT] = [
        ResourceKind::Session,
        ResourceKind::Reference,
        ResourceKind::Table,
        ResourceKind::Row,
        ResourceKind::LinkList,
        ResourceKind::View,
        ResourceKind::AsyncOpen,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Name used in logs
    pub fn name(self) -> &'static str {
        match self {
            ResourceKind::Session => "session",
            ResourceKind::Reference => "session reference",
            ResourceKind::Table => "table",
            ResourceKind::Row => "row",
            ResourceKind::LinkList => "link list",
            ResourceKind::View => "table view",
            ResourceKind::AsyncOpen => "async open",
        }
    }
}

#[derive(Default)]
struct EngineStats {
    allocated: [AtomicU64; KIND_COUNT],
    released: [AtomicU64; KIND_COUNT],
    invalid_releases: AtomicU64,
    cancel_calls: AtomicU64,
    cell_reads: AtomicU64,
    cell_writes: AtomicU64,
    string_reads: AtomicU64,
    progress_registered: AtomicU64,
    progress_unregistered: AtomicU64,
    sync_client_configured: AtomicU64,
    opens: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Point-in-time copy of the engine counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    allocated: [u64; KIND_COUNT],
    released: [u64; KIND_COUNT],
    /// Releases of unknown pointers or pointers of another kind
    pub invalid_releases: u64,
    /// `cancel_open` calls
    pub cancel_calls: u64,
    /// Typed cell reads, strings included
    pub cell_reads: u64,
    /// Typed cell writes, links included
    pub cell_writes: u64,
    /// `get_string` calls
    pub string_reads: u64,
    /// Progress registrations
    pub progress_registered: u64,
    /// Progress unregistrations
    pub progress_unregistered: u64,
    /// `configure_sync_client` calls
    pub sync_client_configured: u64,
    /// Synchronous `open` calls
    pub opens: u64,
}

impl StatsSnapshot {
    /// Pointers of `kind` handed out
    pub fn allocated(&self, kind: ResourceKind) -> u64 {
        self.allocated[kind.index()]
    }

    /// Pointers of `kind` released
    pub fn released(&self, kind: ResourceKind) -> u64 {
        self.released[kind.index()]
    }

    /// Pointers of `kind` still live
    pub fn live(&self, kind: ResourceKind) -> u64 {
        self.allocated(kind) - self.released(kind)
    }

    /// Cell reads and writes combined
    pub fn cell_calls(&self) -> u64 {
        self.cell_reads + self.cell_writes
    }
}

enum Resource {
    Session {
        file: Arc<MemoryFile>,
        read_only: bool,
    },
    Reference {
        file: Arc<MemoryFile>,
        read_only: bool,
    },
    Table {
        file: Arc<MemoryFile>,
        table: String,
    },
    Row {
        file: Arc<MemoryFile>,
        table: String,
        row_id: u64,
    },
    LinkList {
        file: Arc<MemoryFile>,
        table: String,
        column: ColumnIndex,
        row_id: u64,
    },
    View {
        file: Arc<MemoryFile>,
        table: String,
        rows: Vec<u64>,
    },
    AsyncOpen(Arc<AsyncOp>),
}

impl Resource {
    fn kind(&self) -> ResourceKind {
        match self {
            Resource::Session { .. } => ResourceKind::Session,
            Resource::Reference { .. } => ResourceKind::Reference,
            Resource::Table { .. } => ResourceKind::Table,
            Resource::Row { .. } => ResourceKind::Row,
            Resource::LinkList { .. } => ResourceKind::LinkList,
            Resource::View { .. } => ResourceKind::View,
            Resource::AsyncOpen(_) => ResourceKind::AsyncOpen,
        }
    }
}

fn invalid_pointer(ptr: NativePtr, expected: ResourceKind) -> NativeError {
    NativeError::new(
        NativeErrorCode::InvalidState,
        format!("{:#x} is not a live {} pointer", ptr.as_raw(), expected.name()),
    )
}

fn column_type(expected: &str, found: &Cell) -> NativeError {
    NativeError::new(
        NativeErrorCode::ColumnType,
        format!("expected {} cell, found {}", expected, found.type_name()),
    )
}

fn detached(table: &str) -> NativeError {
    NativeError::new(
        NativeErrorCode::InvalidState,
        format!("row of {} has been removed", table),
    )
}

fn read_only_session() -> NativeError {
    NativeError::new(NativeErrorCode::InvalidState, "session is read-only")
}

struct ListRef {
    file: Arc<MemoryFile>,
    table: String,
    column: ColumnIndex,
    row_id: u64,
}

/// Process-local storage engine
pub struct MemoryEngine {
    me: Weak<MemoryEngine>,
    files: Mutex<FxHashMap<PathBuf, Arc<MemoryFile>>>,
    resources: RwLock<FxHashMap<u64, Resource>>,
    next_ptr: AtomicU64,
    next_token: AtomicU64,
    stats: EngineStats,
    sync_client: RwLock<Option<SyncClientSettings>>,
    async_mode: Mutex<AsyncOpenMode>,
    open_failures: Mutex<FxHashMap<PathBuf, NativeError>>,
}

impl MemoryEngine {
    /// Create an engine with background async opens
    pub fn new() -> Arc<Self> {
        Self::with_async_mode(AsyncOpenMode::default())
    }

    /// Create an engine with the given async-open driver
    pub fn with_async_mode(mode: AsyncOpenMode) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            files: Mutex::new(FxHashMap::default()),
            resources: RwLock::new(FxHashMap::default()),
            next_ptr: AtomicU64::new(0x1000),
            next_token: AtomicU64::new(1),
            stats: EngineStats::default(),
            sync_client: RwLock::new(None),
            async_mode: Mutex::new(mode),
            open_failures: Mutex::new(FxHashMap::default()),
        })
    }

    /// Change how later async opens are driven
    pub fn set_async_mode(&self, mode: AsyncOpenMode) {
        *self.async_mode.lock() = mode;
    }

    /// Copy of the counters
    pub fn stats(&self) -> StatsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        let mut snapshot = StatsSnapshot {
            invalid_releases: load(&self.stats.invalid_releases),
            cancel_calls: load(&self.stats.cancel_calls),
            cell_reads: load(&self.stats.cell_reads),
            cell_writes: load(&self.stats.cell_writes),
            string_reads: load(&self.stats.string_reads),
            progress_registered: load(&self.stats.progress_registered),
            progress_unregistered: load(&self.stats.progress_unregistered),
            sync_client_configured: load(&self.stats.sync_client_configured),
            opens: load(&self.stats.opens),
            ..StatsSnapshot::default()
        };
        for kind in ResourceKind::ALL {
            snapshot.allocated[kind.index()] = load(&self.stats.allocated[kind.index()]);
            snapshot.released[kind.index()] = load(&self.stats.released[kind.index()]);
        }
        snapshot
    }

    /// Number of pointers not yet released
    pub fn live_resources(&self) -> usize {
        self.resources.read().len()
    }

    /// Make the next open of `path` fail with `error`
    pub fn fail_next_open(&self, path: impl Into<PathBuf>, error: NativeError) {
        self.open_failures.lock().insert(path.into(), error);
    }

    /// Schema stored in the file at `path`, if it was ever opened
    pub fn file_schema(&self, path: &Path) -> Option<Schema> {
        let file = self.files.lock().get(path).cloned()?;
        let schema = file.data.read().schema();
        Some(schema)
    }

    /// Settings installed by `configure_sync_client`
    pub fn sync_client_settings(&self) -> Option<SyncClientSettings> {
        self.sync_client.read().clone()
    }

    /// Emit a sync client log line through the installed settings
    pub fn sync_log(&self, level: LogLevel, message: &str) {
        match self.sync_client_settings() {
            Some(settings) => settings.log(level, message),
            None => trace!(target: "vellum::sync", "{}", message),
        }
    }

    /// Async-open operations that can still complete, oldest first
    pub fn pending_opens(&self) -> Vec<NativePtr> {
        let mut pending: Vec<NativePtr> = self
            .resources
            .read()
            .iter()
            .filter_map(|(raw, resource)| match resource {
                Resource::AsyncOpen(op) if op.is_pending() => NativePtr::new(*raw),
                _ => None,
            })
            .collect();
        pending.sort();
        pending
    }

    /// Number of progress callbacks registered on an operation
    pub fn progress_listeners(&self, operation: NativePtr) -> usize {
        self.async_op(operation)
            .map(|op| op.listener_count())
            .unwrap_or(0)
    }

    /// Deliver a progress update; returns the number of callbacks invoked
    pub fn report_progress(&self, operation: NativePtr, progress: SyncProgress) -> NativeResult<usize> {
        Ok(self.async_op(operation)?.report(progress))
    }

    /// Finish an async open successfully
    ///
    /// Returns `false` if the binding refused the outcome (it cancelled
    /// first); the reference created for it is then released here.
    pub fn complete_open(&self, operation: NativePtr) -> NativeResult<bool> {
        let op = self.async_op(operation)?;
        Ok(self.finish(&op, None))
    }

    /// Finish an async open with an error
    pub fn fail_open(&self, operation: NativePtr, error: NativeError) -> NativeResult<bool> {
        let op = self.async_op(operation)?;
        Ok(self.finish(&op, Some(error)))
    }

    fn finish(&self, op: &AsyncOp, failure: Option<NativeError>) -> bool {
        let Some(slot) = op.take_slot() else {
            return false;
        };
        let outcome = match failure {
            Some(error) => Err(error),
            None => self.open_file(&op.config, &op.schema).map(|file| {
                self.alloc(Resource::Reference {
                    file,
                    read_only: op.config.read_only,
                })
            }),
        };
        match slot.complete(outcome) {
            Ok(()) => true,
            Err(Ok(reference)) => {
                debug!(reference = reference.as_raw(), "async open outcome refused, releasing reference");
                self.release(reference, ResourceKind::Reference);
                false
            }
            Err(Err(_)) => false,
        }
    }

    fn alloc(&self, resource: Resource) -> NativePtr {
        let ptr = NativePtr::from_counter(self.next_ptr.fetch_add(1, Ordering::Relaxed));
        bump(&self.stats.allocated[resource.kind().index()]);
        self.resources.write().insert(ptr.as_raw(), resource);
        ptr
    }

    fn release(&self, ptr: NativePtr, kind: ResourceKind) -> Option<Resource> {
        let mut resources = self.resources.write();
        match resources.get(&ptr.as_raw()).map(Resource::kind) {
            Some(found) if found == kind => {
                bump(&self.stats.released[kind.index()]);
                resources.remove(&ptr.as_raw())
            }
            _ => {
                bump(&self.stats.invalid_releases);
                warn!(ptr = ptr.as_raw(), kind = kind.name(), "release of a pointer that is not live");
                None
            }
        }
    }

    fn open_file(&self, config: &NativeConfig, schema: &Schema) -> NativeResult<Arc<MemoryFile>> {
        if let Some(error) = self.open_failures.lock().remove(&config.path) {
            return Err(error);
        }
        let file = self
            .files
            .lock()
            .entry(config.path.clone())
            .or_insert_with(|| Arc::new(MemoryFile::new(config.path.clone(), config.encryption_key)))
            .clone();
        file.check_key(config.encryption_key.as_ref())?;
        if !schema.is_empty() {
            file.apply_schema(schema, config.schema_version)?;
        }
        Ok(file)
    }

    fn async_op(&self, ptr: NativePtr) -> NativeResult<Arc<AsyncOp>> {
        match self.resources.read().get(&ptr.as_raw()) {
            Some(Resource::AsyncOpen(op)) => Ok(op.clone()),
            _ => Err(invalid_pointer(ptr, ResourceKind::AsyncOpen)),
        }
    }

    fn session_ref(&self, ptr: NativePtr) -> NativeResult<(Arc<MemoryFile>, bool)> {
        match self.resources.read().get(&ptr.as_raw()) {
            Some(Resource::Session { file, read_only }) => Ok((file.clone(), *read_only)),
            _ => Err(invalid_pointer(ptr, ResourceKind::Session)),
        }
    }

    fn table_ref(&self, ptr: NativePtr) -> NativeResult<(Arc<MemoryFile>, String)> {
        match self.resources.read().get(&ptr.as_raw()) {
            Some(Resource::Table { file, table }) => Ok((file.clone(), table.clone())),
            _ => Err(invalid_pointer(ptr, ResourceKind::Table)),
        }
    }

    fn list_ref(&self, ptr: NativePtr) -> NativeResult<ListRef> {
        match self.resources.read().get(&ptr.as_raw()) {
            Some(Resource::LinkList {
                file,
                table,
                column,
                row_id,
            }) => Ok(ListRef {
                file: file.clone(),
                table: table.clone(),
                column: *column,
                row_id: *row_id,
            }),
            _ => Err(invalid_pointer(ptr, ResourceKind::LinkList)),
        }
    }

    fn view_rows(&self, ptr: NativePtr) -> NativeResult<(Arc<MemoryFile>, String, Vec<u64>)> {
        match self.resources.read().get(&ptr.as_raw()) {
            Some(Resource::View { file, table, rows }) => Ok((file.clone(), table.clone(), rows.clone())),
            _ => Err(invalid_pointer(ptr, ResourceKind::View)),
        }
    }

    fn writable_table(&self, ptr: NativePtr) -> NativeResult<(Arc<MemoryFile>, String)> {
        let (file, table) = self.table_ref(ptr)?;
        if !file.in_write() {
            return Err(not_writing());
        }
        Ok((file, table))
    }

    fn read_cell<T>(
        &self,
        table: NativePtr,
        column: ColumnIndex,
        row: RowIndex,
        expected: &'static str,
        read: impl FnOnce(&Cell) -> Option<T>,
    ) -> NativeResult<T> {
        bump(&self.stats.cell_reads);
        let (file, name) = self.table_ref(table)?;
        let data = file.data.read();
        let cell = data.table(&name)?.cell(column, row)?;
        match read(cell) {
            Some(value) => Ok(value),
            None => Err(column_type(expected, cell)),
        }
    }

    fn write_cell(&self, table: NativePtr, column: ColumnIndex, row: RowIndex, value: Cell) -> NativeResult<()> {
        bump(&self.stats.cell_writes);
        let (file, name) = self.writable_table(table)?;
        let mut data = file.data.write();
        let cell = data.table_mut(&name)?.cell_mut(column, row)?;
        if std::mem::discriminant(cell) != std::mem::discriminant(&value) {
            return Err(column_type(value.type_name(), cell));
        }
        *cell = value;
        Ok(())
    }

    /// Resolve a list pointer to the target table and current row index
    fn list_location(data: &store::FileData, list: &ListRef) -> NativeResult<(RowIndex, String)> {
        let table = data.table(&list.table)?;
        let row = table.position(list.row_id).ok_or_else(|| detached(&list.table))?;
        let target = table.column(list.column)?.target.clone().unwrap_or_default();
        Ok((row, target))
    }

    fn edit_list(&self, list: NativePtr, edit: impl FnOnce(&mut Vec<u64>, Option<u64>) -> NativeResult<()>, target: Option<RowIndex>) -> NativeResult<()> {
        bump(&self.stats.cell_writes);
        let list = self.list_ref(list)?;
        if !list.file.in_write() {
            return Err(not_writing());
        }
        let mut data = list.file.data.write();
        let (row, target_table) = Self::list_location(&data, &list)?;
        let target_id = match target {
            Some(index) => Some(data.table(&target_table)?.row(index)?.id),
            None => None,
        };
        match data.table_mut(&list.table)?.cell_mut(list.column, row)? {
            Cell::List(ids) => edit(ids, target_id),
            other => Err(column_type("link list", other)),
        }
    }
}

impl NativeEngine for MemoryEngine {
    fn open(&self, config: &NativeConfig, schema: &Schema) -> NativeResult<NativePtr> {
        bump(&self.stats.opens);
        let file = self.open_file(config, schema)?;
        if let Some(sync) = &config.sync {
            self.sync_log(
                LogLevel::Info,
                &format!("connecting to {} for partition {}", sync.server_url, sync.partition),
            );
        }
        debug!(path = %config.path.display(), read_only = config.read_only, "session opened");
        Ok(self.alloc(Resource::Session {
            file,
            read_only: config.read_only,
        }))
    }

    fn close_session(&self, session: NativePtr) {
        if let Some(Resource::Session { file, .. }) = self.release(session, ResourceKind::Session) {
            if file.abandon(session.as_raw()) {
                warn!(path = %file.path.display(), "session closed inside a write transaction, rolled back");
            }
        }
    }

    fn get_schema(&self, session: NativePtr, callback: &mut dyn FnMut(&Schema)) -> NativeResult<()> {
        let (file, _) = self.session_ref(session)?;
        let schema = file.data.read().schema();
        callback(&schema);
        Ok(())
    }

    fn configure_sync_client(&self, settings: SyncClientSettings) {
        bump(&self.stats.sync_client_configured);
        debug!(user_agent = %settings.user_agent, "sync client configured");
        *self.sync_client.write() = Some(settings);
    }

    fn open_async(&self, config: &NativeConfig, schema: &Schema, slot: CompletionSlot) -> NativeResult<NativePtr> {
        let op = Arc::new(AsyncOp::new(config.clone(), schema.clone(), slot));
        let ptr = self.alloc(Resource::AsyncOpen(op.clone()));
        let mode = self.async_mode.lock().clone();
        if let AsyncOpenMode::Background { delay, steps } = mode {
            let engine = self.me.clone();
            let spawned = std::thread::Builder::new()
                .name("vellum-async-open".to_string())
                .spawn(move || {
                    std::thread::sleep(delay);
                    for step in steps {
                        if !op.is_pending() {
                            return;
                        }
                        op.report(step);
                    }
                    if let Some(engine) = engine.upgrade() {
                        engine.finish(&op, None);
                    }
                });
            if let Err(e) = spawned {
                self.release(ptr, ResourceKind::AsyncOpen);
                return Err(NativeError::new(NativeErrorCode::Other, e.to_string()));
            }
        }
        Ok(ptr)
    }

    fn cancel_open(&self, operation: NativePtr) {
        bump(&self.stats.cancel_calls);
        if let Ok(op) = self.async_op(operation) {
            op.cancel();
        }
    }

    fn release_open(&self, operation: NativePtr) {
        if let Some(Resource::AsyncOpen(op)) = self.release(operation, ResourceKind::AsyncOpen) {
            op.cancel();
        }
    }

    fn register_progress(&self, operation: NativePtr, callback: ProgressCallback) -> NativeResult<ProgressTokenId> {
        let op = self.async_op(operation)?;
        let token = ProgressTokenId(self.next_token.fetch_add(1, Ordering::Relaxed));
        op.add_listener(token, callback);
        bump(&self.stats.progress_registered);
        Ok(token)
    }

    fn unregister_progress(&self, operation: NativePtr, token: ProgressTokenId) {
        if let Ok(op) = self.async_op(operation) {
            if op.remove_listener(token) {
                bump(&self.stats.progress_unregistered);
            }
        }
    }

    fn resolve_reference(&self, reference: NativePtr) -> NativeResult<NativePtr> {
        let (file, read_only) = match self.resources.read().get(&reference.as_raw()) {
            Some(Resource::Reference { file, read_only }) => (file.clone(), *read_only),
            _ => return Err(invalid_pointer(reference, ResourceKind::Reference)),
        };
        Ok(self.alloc(Resource::Session { file, read_only }))
    }

    fn release_reference(&self, reference: NativePtr) {
        self.release(reference, ResourceKind::Reference);
    }

    fn begin_write(&self, session: NativePtr) -> NativeResult<()> {
        let (file, read_only) = self.session_ref(session)?;
        if read_only {
            return Err(read_only_session());
        }
        file.begin_write(session.as_raw())
    }

    fn commit_write(&self, session: NativePtr) -> NativeResult<()> {
        let (file, _) = self.session_ref(session)?;
        file.commit_write(session.as_raw())
    }

    fn cancel_write(&self, session: NativePtr) -> NativeResult<()> {
        let (file, _) = self.session_ref(session)?;
        file.cancel_write(session.as_raw())
    }

    fn get_table(&self, session: NativePtr, name: &str) -> NativeResult<Option<NativePtr>> {
        let (file, _) = self.session_ref(session)?;
        if !file.data.read().tables.contains_key(name) {
            return Ok(None);
        }
        Ok(Some(self.alloc(Resource::Table {
            file,
            table: name.to_string(),
        })))
    }

    fn release_table(&self, table: NativePtr) {
        self.release(table, ResourceKind::Table);
    }

    fn get_column_index(&self, table: NativePtr, name: &str) -> NativeResult<Option<ColumnIndex>> {
        let (file, table) = self.table_ref(table)?;
        let data = file.data.read();
        Ok(data.table(&table)?.column_index(name))
    }

    fn row_count(&self, table: NativePtr) -> NativeResult<usize> {
        let (file, table) = self.table_ref(table)?;
        let data = file.data.read();
        Ok(data.table(&table)?.rows.len())
    }

    fn add_row(&self, table: NativePtr) -> NativeResult<RowIndex> {
        let (file, table) = self.writable_table(table)?;
        let mut data = file.data.write();
        Ok(data.table_mut(&table)?.add_row())
    }

    fn remove_row(&self, table: NativePtr, row: RowIndex) -> NativeResult<()> {
        let (file, table) = self.writable_table(table)?;
        let mut data = file.data.write();
        data.remove_row(&table, row)
    }

    fn row_at(&self, table: NativePtr, row: RowIndex) -> NativeResult<NativePtr> {
        let (file, table) = self.table_ref(table)?;
        let row_id = file.data.read().table(&table)?.row(row)?.id;
        Ok(self.alloc(Resource::Row { file, table, row_id }))
    }

    fn row_index(&self, row: NativePtr) -> Option<RowIndex> {
        let (file, table, row_id) = match self.resources.read().get(&row.as_raw()) {
            Some(Resource::Row { file, table, row_id }) => (file.clone(), table.clone(), *row_id),
            _ => return None,
        };
        let data = file.data.read();
        data.table(&table).ok()?.position(row_id)
    }

    fn release_row(&self, row: NativePtr) {
        self.release(row, ResourceKind::Row);
    }

    fn get_bool(&self, table: NativePtr, column: ColumnIndex, row: RowIndex) -> NativeResult<bool> {
        self.read_cell(table, column, row, "bool", |cell| match cell {
            Cell::Bool(v) => Some(*v),
            _ => None,
        })
    }

    fn set_bool(&self, table: NativePtr, column: ColumnIndex, row: RowIndex, value: bool) -> NativeResult<()> {
        self.write_cell(table, column, row, Cell::Bool(value))
    }

    fn get_int64(&self, table: NativePtr, column: ColumnIndex, row: RowIndex) -> NativeResult<i64> {
        self.read_cell(table, column, row, "int", |cell| match cell {
            Cell::Int(v) => Some(*v),
            _ => None,
        })
    }

    fn set_int64(&self, table: NativePtr, column: ColumnIndex, row: RowIndex, value: i64) -> NativeResult<()> {
        self.write_cell(table, column, row, Cell::Int(value))
    }

    fn get_float(&self, table: NativePtr, column: ColumnIndex, row: RowIndex) -> NativeResult<f32> {
        self.read_cell(table, column, row, "float", |cell| match cell {
            Cell::Float(v) => Some(*v),
            _ => None,
        })
    }

    fn set_float(&self, table: NativePtr, column: ColumnIndex, row: RowIndex, value: f32) -> NativeResult<()> {
        self.write_cell(table, column, row, Cell::Float(value))
    }

    fn get_double(&self, table: NativePtr, column: ColumnIndex, row: RowIndex) -> NativeResult<f64> {
        self.read_cell(table, column, row, "double", |cell| match cell {
            Cell::Double(v) => Some(*v),
            _ => None,
        })
    }

    fn set_double(&self, table: NativePtr, column: ColumnIndex, row: RowIndex, value: f64) -> NativeResult<()> {
        self.write_cell(table, column, row, Cell::Double(value))
    }

    fn get_timestamp_seconds(&self, table: NativePtr, column: ColumnIndex, row: RowIndex) -> NativeResult<i64> {
        self.read_cell(table, column, row, "timestamp", |cell| match cell {
            Cell::Date(v) => Some(*v),
            _ => None,
        })
    }

    fn set_timestamp_seconds(
        &self,
        table: NativePtr,
        column: ColumnIndex,
        row: RowIndex,
        seconds: i64,
    ) -> NativeResult<()> {
        self.write_cell(table, column, row, Cell::Date(seconds))
    }

    fn get_string(
        &self,
        table: NativePtr,
        column: ColumnIndex,
        row: RowIndex,
        buffer: &mut [u8],
    ) -> NativeResult<usize> {
        bump(&self.stats.string_reads);
        self.read_cell(table, column, row, "string", |cell| match cell {
            Cell::String(s) => {
                let bytes = s.as_bytes();
                if bytes.len() <= buffer.len() {
                    buffer[..bytes.len()].copy_from_slice(bytes);
                }
                Some(bytes.len())
            }
            _ => None,
        })
    }

    fn set_string(&self, table: NativePtr, column: ColumnIndex, row: RowIndex, value: &str) -> NativeResult<()> {
        self.write_cell(table, column, row, Cell::String(value.to_string()))
    }

    fn get_link(&self, table: NativePtr, column: ColumnIndex, row: RowIndex) -> NativeResult<Option<NativePtr>> {
        bump(&self.stats.cell_reads);
        let (file, name) = self.table_ref(table)?;
        let target = {
            let data = file.data.read();
            let table = data.table(&name)?;
            let target = table.column(column)?.target.clone().unwrap_or_default();
            match table.cell(column, row)? {
                Cell::Link(Some(id)) => Some((target, *id)),
                Cell::Link(None) => None,
                other => return Err(column_type("link", other)),
            }
        };
        Ok(target.map(|(table, row_id)| self.alloc(Resource::Row { file, table, row_id })))
    }

    fn set_link(&self, table: NativePtr, column: ColumnIndex, row: RowIndex, target: RowIndex) -> NativeResult<()> {
        bump(&self.stats.cell_writes);
        let (file, name) = self.writable_table(table)?;
        let mut data = file.data.write();
        let target_table = data.table(&name)?.column(column)?.target.clone().unwrap_or_default();
        let target_id = data.table(&target_table)?.row(target)?.id;
        match data.table_mut(&name)?.cell_mut(column, row)? {
            Cell::Link(link) => {
                *link = Some(target_id);
                Ok(())
            }
            other => Err(column_type("link", other)),
        }
    }

    fn clear_link(&self, table: NativePtr, column: ColumnIndex, row: RowIndex) -> NativeResult<()> {
        self.write_cell(table, column, row, Cell::Link(None))
    }

    fn get_link_list(&self, table: NativePtr, column: ColumnIndex, row: RowIndex) -> NativeResult<NativePtr> {
        let (file, name) = self.table_ref(table)?;
        let row_id = {
            let data = file.data.read();
            let table = data.table(&name)?;
            if table.column(column)?.property_type != PropertyType::List {
                return Err(column_type("link list", table.cell(column, row)?));
            }
            table.row(row)?.id
        };
        Ok(self.alloc(Resource::LinkList {
            file,
            table: name,
            column,
            row_id,
        }))
    }

    fn release_link_list(&self, list: NativePtr) {
        self.release(list, ResourceKind::LinkList);
    }

    fn link_list_size(&self, list: NativePtr) -> NativeResult<usize> {
        let list = self.list_ref(list)?;
        let data = list.file.data.read();
        let (row, _) = Self::list_location(&data, &list)?;
        match data.table(&list.table)?.cell(list.column, row)? {
            Cell::List(ids) => Ok(ids.len()),
            other => Err(column_type("link list", other)),
        }
    }

    fn link_list_get(&self, list: NativePtr, index: usize) -> NativeResult<NativePtr> {
        let list = self.list_ref(list)?;
        let (target, row_id) = {
            let data = list.file.data.read();
            let (row, target) = Self::list_location(&data, &list)?;
            match data.table(&list.table)?.cell(list.column, row)? {
                Cell::List(ids) => match ids.get(index) {
                    Some(id) => (target, *id),
                    None => return Err(out_of_bounds("link list", index, ids.len())),
                },
                other => return Err(column_type("link list", other)),
            }
        };
        Ok(self.alloc(Resource::Row {
            file: list.file,
            table: target,
            row_id,
        }))
    }

    fn link_list_add(&self, list: NativePtr, target: RowIndex) -> NativeResult<()> {
        self.edit_list(
            list,
            |ids, id| {
                ids.extend(id);
                Ok(())
            },
            Some(target),
        )
    }

    fn link_list_insert(&self, list: NativePtr, index: usize, target: RowIndex) -> NativeResult<()> {
        self.edit_list(
            list,
            |ids, id| {
                if index > ids.len() {
                    return Err(out_of_bounds("link list", index, ids.len()));
                }
                if let Some(id) = id {
                    ids.insert(index, id);
                }
                Ok(())
            },
            Some(target),
        )
    }

    fn link_list_erase(&self, list: NativePtr, index: usize) -> NativeResult<()> {
        self.edit_list(
            list,
            |ids, _| {
                if index >= ids.len() {
                    return Err(out_of_bounds("link list", index, ids.len()));
                }
                ids.remove(index);
                Ok(())
            },
            None,
        )
    }

    fn link_list_clear(&self, list: NativePtr) -> NativeResult<()> {
        self.edit_list(
            list,
            |ids, _| {
                ids.clear();
                Ok(())
            },
            None,
        )
    }

    fn link_list_find(&self, list: NativePtr, target: RowIndex, start_from: usize) -> NativeResult<Option<usize>> {
        bump(&self.stats.cell_reads);
        let list = self.list_ref(list)?;
        let data = list.file.data.read();
        let (row, target_table) = Self::list_location(&data, &list)?;
        let target_id = data.table(&target_table)?.row(target)?.id;
        match data.table(&list.table)?.cell(list.column, row)? {
            Cell::List(ids) if start_from > ids.len() => Err(out_of_bounds("link list", start_from, ids.len())),
            Cell::List(ids) => Ok(ids[start_from..]
                .iter()
                .position(|id| *id == target_id)
                .map(|offset| start_from + offset)),
            other => Err(column_type("link list", other)),
        }
    }

    fn table_view_all(&self, table: NativePtr) -> NativeResult<NativePtr> {
        let (file, name) = self.table_ref(table)?;
        let rows = file.data.read().table(&name)?.rows.iter().map(|r| r.id).collect();
        Ok(self.alloc(Resource::View { file, table: name, rows }))
    }

    fn find_all_int(&self, table: NativePtr, column: ColumnIndex, value: i64) -> NativeResult<NativePtr> {
        let (file, name) = self.table_ref(table)?;
        let rows = {
            let data = file.data.read();
            let table = data.table(&name)?;
            let declared = table.column(column)?.property_type;
            if declared != PropertyType::Int {
                return Err(NativeError::new(
                    NativeErrorCode::ColumnType,
                    format!("column {} is {:?}, not Int", column, declared),
                ));
            }
            table
                .rows
                .iter()
                .filter(|r| r.cells[column.0] == Cell::Int(value))
                .map(|r| r.id)
                .collect()
        };
        Ok(self.alloc(Resource::View { file, table: name, rows }))
    }

    fn view_size(&self, view: NativePtr) -> NativeResult<usize> {
        Ok(self.view_rows(view)?.2.len())
    }

    fn view_row_at(&self, view: NativePtr, index: usize) -> NativeResult<NativePtr> {
        let (file, table, rows) = self.view_rows(view)?;
        let row_id = *rows
            .get(index)
            .ok_or_else(|| out_of_bounds("table view", index, rows.len()))?;
        Ok(self.alloc(Resource::Row { file, table, row_id }))
    }

    fn view_remove_row(&self, view: NativePtr, index: usize) -> NativeResult<()> {
        let (file, table, rows) = self.view_rows(view)?;
        if !file.in_write() {
            return Err(not_writing());
        }
        let row_id = *rows
            .get(index)
            .ok_or_else(|| out_of_bounds("table view", index, rows.len()))?;
        {
            let mut data = file.data.write();
            let row = data.table(&table)?.position(row_id).ok_or_else(|| detached(&table))?;
            data.remove_row(&table, row)?;
        }
        if let Some(Resource::View { rows, .. }) = self.resources.write().get_mut(&view.as_raw()) {
            rows.retain(|id| *id != row_id);
        }
        Ok(())
    }

    fn release_view(&self, view: NativePtr) {
        self.release(view, ResourceKind::View);
    }
}
