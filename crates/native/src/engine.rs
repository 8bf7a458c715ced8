//! Native engine boundary
//!
//! [`NativeEngine`] is the narrow interface through which the binding reaches
//! the storage/sync engine. The binding calls these primitives; it never
//! implements them. Every pointer returned by a primitive is owned by the
//! caller until it is passed to the matching `release_*` primitive exactly
//! once.
//!
//! | Resource | Produced by | Released by |
//! |----------|-------------|-------------|
//! | session | `open`, `resolve_reference` | `close_session` |
//! | session reference | async-open completion | `release_reference` |
//! | async-open operation | `open_async` | `release_open` |
//! | table | `get_table` | `release_table` |
//! | row | `row_at`, `get_link`, `link_list_get`, `view_row_at` | `release_row` |
//! | link list | `get_link_list` | `release_link_list` |
//! | table view | `table_view_all`, `find_all_int` | `release_view` |

use crate::pending::CompletionSlot;
use crate::ptr::{NativePtr, ProgressTokenId};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;
use vellum_core::config::ENCRYPTION_KEY_LEN;
use vellum_core::{
    ClientResyncMode, ColumnIndex, Configuration, NativeError, RowIndex, Schema,
    SyncClientSettings, SyncProgress,
};

/// Result of a native primitive
pub type NativeResult<T> = std::result::Result<T, NativeError>;

/// Progress callback registered on an async-open operation
pub type ProgressCallback = Arc<dyn Fn(SyncProgress) + Send + Sync>;

/// Sync section of a native configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeSyncConfig {
    /// Server endpoint
    pub server_url: String,
    /// Authenticated user id
    pub user_id: Uuid,
    /// Server-side identity of the user
    pub user_identity: String,
    /// Partition value
    pub partition: String,
    /// Divergence policy
    pub resync_mode: ClientResyncMode,
}

/// Configuration value passed to the native open primitives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeConfig {
    /// Database file path
    pub path: PathBuf,
    /// Encryption key bytes
    pub encryption_key: Option<[u8; ENCRYPTION_KEY_LEN]>,
    /// Version of the caller's schema
    pub schema_version: u64,
    /// Open read-only
    pub read_only: bool,
    /// Schema will be introspected after open
    pub dynamic: bool,
    /// Sync section
    pub sync: Option<NativeSyncConfig>,
}

impl NativeConfig {
    /// Build the native value from a managed configuration
    pub fn from_configuration(config: &Configuration) -> Self {
        Self {
            path: config.path.clone(),
            encryption_key: config.encryption_key.as_ref().map(|k| *k.as_bytes()),
            schema_version: config.schema_version,
            read_only: config.read_only,
            dynamic: config.is_dynamic,
            sync: config.sync.as_ref().map(|sync| NativeSyncConfig {
                server_url: sync.server_url.clone(),
                user_id: sync.user.id,
                user_identity: sync.user.identity.clone(),
                partition: sync.partition.clone(),
                resync_mode: sync.resync_mode,
            }),
        }
    }
}

/// Primitives exposed by the native storage/sync engine
///
/// Implementations must be callable from any thread. Accessor primitives
/// address one cell by (table, column, row) and fail with an
/// `IndexOutOfBounds` or `ColumnType` error rather than reading garbage.
pub trait NativeEngine: Send + Sync + 'static {
    // ------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------

    /// Open a session synchronously
    fn open(&self, config: &NativeConfig, schema: &Schema) -> NativeResult<NativePtr>;

    /// Close a session and free its pointer
    fn close_session(&self, session: NativePtr);

    /// Report the session's schema through `callback`
    fn get_schema(&self, session: NativePtr, callback: &mut dyn FnMut(&Schema)) -> NativeResult<()>;

    /// Install process-wide sync client settings
    fn configure_sync_client(&self, settings: SyncClientSettings);

    // ------------------------------------------------------------------
    // Async open
    // ------------------------------------------------------------------

    /// Start an async open; the outcome is delivered through `slot`
    ///
    /// Returns the operation pointer. The engine may complete the slot before
    /// this call returns.
    fn open_async(
        &self,
        config: &NativeConfig,
        schema: &Schema,
        slot: CompletionSlot,
    ) -> NativeResult<NativePtr>;

    /// Ask an in-flight async open to stop
    fn cancel_open(&self, operation: NativePtr);

    /// Free an async-open operation pointer
    fn release_open(&self, operation: NativePtr);

    /// Register a download-progress callback on an async open
    fn register_progress(
        &self,
        operation: NativePtr,
        callback: ProgressCallback,
    ) -> NativeResult<ProgressTokenId>;

    /// Remove a progress registration
    fn unregister_progress(&self, operation: NativePtr, token: ProgressTokenId);

    /// Turn a thread-safe session reference into a session on this thread
    fn resolve_reference(&self, reference: NativePtr) -> NativeResult<NativePtr>;

    /// Free a thread-safe session reference
    fn release_reference(&self, reference: NativePtr);

    // ------------------------------------------------------------------
    // Write transactions
    // ------------------------------------------------------------------

    /// Begin a write transaction
    fn begin_write(&self, session: NativePtr) -> NativeResult<()>;

    /// Commit the active write transaction
    fn commit_write(&self, session: NativePtr) -> NativeResult<()>;

    /// Roll back the active write transaction
    fn cancel_write(&self, session: NativePtr) -> NativeResult<()>;

    // ------------------------------------------------------------------
    // Tables and rows
    // ------------------------------------------------------------------

    /// Look up the table backing an object type
    fn get_table(&self, session: NativePtr, name: &str) -> NativeResult<Option<NativePtr>>;

    /// Free a table pointer
    fn release_table(&self, table: NativePtr);

    /// Look up a column by name
    fn get_column_index(&self, table: NativePtr, name: &str) -> NativeResult<Option<ColumnIndex>>;

    /// Number of rows
    fn row_count(&self, table: NativePtr) -> NativeResult<usize>;

    /// Append a row with default cells
    fn add_row(&self, table: NativePtr) -> NativeResult<RowIndex>;

    /// Remove a row; handles to it become detached
    fn remove_row(&self, table: NativePtr, row: RowIndex) -> NativeResult<()>;

    /// Create a row pointer that tracks the row across index shifts
    fn row_at(&self, table: NativePtr, row: RowIndex) -> NativeResult<NativePtr>;

    /// Current index of a tracked row, `None` once the row was removed
    fn row_index(&self, row: NativePtr) -> Option<RowIndex>;

    /// Free a row pointer
    fn release_row(&self, row: NativePtr);

    // ------------------------------------------------------------------
    // Typed cells
    // ------------------------------------------------------------------

    /// Read a boolean cell
    fn get_bool(&self, table: NativePtr, column: ColumnIndex, row: RowIndex) -> NativeResult<bool>;

    /// Write a boolean cell
    fn set_bool(&self, table: NativePtr, column: ColumnIndex, row: RowIndex, value: bool) -> NativeResult<()>;

    /// Read a 64-bit integer cell
    fn get_int64(&self, table: NativePtr, column: ColumnIndex, row: RowIndex) -> NativeResult<i64>;

    /// Write a 64-bit integer cell
    fn set_int64(&self, table: NativePtr, column: ColumnIndex, row: RowIndex, value: i64) -> NativeResult<()>;

    /// Read a 32-bit float cell
    fn get_float(&self, table: NativePtr, column: ColumnIndex, row: RowIndex) -> NativeResult<f32>;

    /// Write a 32-bit float cell
    fn set_float(&self, table: NativePtr, column: ColumnIndex, row: RowIndex, value: f32) -> NativeResult<()>;

    /// Read a 64-bit float cell
    fn get_double(&self, table: NativePtr, column: ColumnIndex, row: RowIndex) -> NativeResult<f64>;

    /// Write a 64-bit float cell
    fn set_double(&self, table: NativePtr, column: ColumnIndex, row: RowIndex, value: f64) -> NativeResult<()>;

    /// Read a timestamp cell as whole seconds since the Unix epoch
    fn get_timestamp_seconds(&self, table: NativePtr, column: ColumnIndex, row: RowIndex) -> NativeResult<i64>;

    /// Write a timestamp cell as whole seconds since the Unix epoch
    fn set_timestamp_seconds(
        &self,
        table: NativePtr,
        column: ColumnIndex,
        row: RowIndex,
        seconds: i64,
    ) -> NativeResult<()>;

    /// Copy a string cell's UTF-8 bytes into `buffer`
    ///
    /// Returns the byte length of the stored string. When that exceeds
    /// `buffer.len()` nothing useful was copied and the caller must retry with
    /// a larger buffer.
    fn get_string(
        &self,
        table: NativePtr,
        column: ColumnIndex,
        row: RowIndex,
        buffer: &mut [u8],
    ) -> NativeResult<usize>;

    /// Write a string cell
    fn set_string(&self, table: NativePtr, column: ColumnIndex, row: RowIndex, value: &str) -> NativeResult<()>;

    // ------------------------------------------------------------------
    // Links
    // ------------------------------------------------------------------

    /// Row pointer of the link target, `None` for a null link
    fn get_link(&self, table: NativePtr, column: ColumnIndex, row: RowIndex) -> NativeResult<Option<NativePtr>>;

    /// Point a link at a row of the target table
    fn set_link(&self, table: NativePtr, column: ColumnIndex, row: RowIndex, target: RowIndex) -> NativeResult<()>;

    /// Null a link
    fn clear_link(&self, table: NativePtr, column: ColumnIndex, row: RowIndex) -> NativeResult<()>;

    /// Create a link-list pointer for a list cell
    fn get_link_list(&self, table: NativePtr, column: ColumnIndex, row: RowIndex) -> NativeResult<NativePtr>;

    /// Free a link-list pointer
    fn release_link_list(&self, list: NativePtr);

    /// Number of links in the list
    fn link_list_size(&self, list: NativePtr) -> NativeResult<usize>;

    /// Row pointer of the link at `index`
    fn link_list_get(&self, list: NativePtr, index: usize) -> NativeResult<NativePtr>;

    /// Append a link to a target row
    fn link_list_add(&self, list: NativePtr, target: RowIndex) -> NativeResult<()>;

    /// Insert a link before `index`
    fn link_list_insert(&self, list: NativePtr, index: usize, target: RowIndex) -> NativeResult<()>;

    /// Remove the link at `index` (the target row is kept)
    fn link_list_erase(&self, list: NativePtr, index: usize) -> NativeResult<()>;

    /// Remove all links
    fn link_list_clear(&self, list: NativePtr) -> NativeResult<()>;

    /// Position of the first link to `target` at or after `start_from`
    fn link_list_find(&self, list: NativePtr, target: RowIndex, start_from: usize) -> NativeResult<Option<usize>>;

    // ------------------------------------------------------------------
    // Table views
    // ------------------------------------------------------------------

    /// View over every row of a table
    fn table_view_all(&self, table: NativePtr) -> NativeResult<NativePtr>;

    /// View over rows whose integer column equals `value`
    fn find_all_int(&self, table: NativePtr, column: ColumnIndex, value: i64) -> NativeResult<NativePtr>;

    /// Number of rows in a view
    fn view_size(&self, view: NativePtr) -> NativeResult<usize>;

    /// Row pointer of the view entry at `index`
    fn view_row_at(&self, view: NativePtr, index: usize) -> NativeResult<NativePtr>;

    /// Remove the row behind view entry `index` from its table and the view
    ///
    /// Requires an active write transaction. Links and list entries pointing
    /// at the row are removed as with [`remove_row`](Self::remove_row).
    fn view_remove_row(&self, view: NativePtr, index: usize) -> NativeResult<()>;

    /// Free a view pointer
    fn release_view(&self, view: NativePtr);
}
