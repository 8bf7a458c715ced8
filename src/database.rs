//! Main database entry point for Vellum.
//!
//! [`Database`] opens sessions against an engine with a set of process
//! settings. By default both are process-wide: the in-memory engine and the
//! shared [`ProcessSettings`]. [`DatabaseBuilder`] assembles a
//! [`Configuration`] and a [`Schema`] and opens the session.

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use vellum_concurrency::CancellationSignal;
use vellum_core::{
    Configuration, EncryptionKey, ObjectSchema, ProcessSettings, Schema, SyncConfiguration,
};
use vellum_engine::{Session, SessionOpener};
use vellum_native::{MemoryEngine, NativeEngine, ProgressCallback};

static DEFAULT_ENGINE: Lazy<Arc<MemoryEngine>> = Lazy::new(MemoryEngine::new);

static PROCESS_SETTINGS: Lazy<Arc<ProcessSettings>> = Lazy::new(|| Arc::new(ProcessSettings::new()));

/// Session factory bound to one engine and one set of process settings.
///
/// # Example
///
/// ```ignore
/// use vellum::prelude::*;
///
/// let session = Database::open(Configuration::new("/tmp/app.realm"))?;
/// println!("{} object types", session.schema().len());
/// ```
#[derive(Clone)]
pub struct Database {
    opener: SessionOpener,
}

impl Database {
    /// Open a session with the default engine and settings.
    ///
    /// The session schema is empty unless `config` is dynamic, in which case
    /// it is read from the file.
    pub fn open(config: Configuration) -> Result<Session> {
        Self::builder().configuration(config).open()
    }

    /// Create a builder.
    pub fn builder() -> DatabaseBuilder {
        DatabaseBuilder::new()
    }

    /// Database bound to the default engine and the process-wide settings.
    pub fn shared() -> Self {
        Self::with_engine(Self::default_engine(), Self::process_settings())
    }

    /// Database bound to a specific engine and settings.
    pub fn with_engine(engine: Arc<dyn NativeEngine>, settings: Arc<ProcessSettings>) -> Self {
        Self {
            opener: SessionOpener::new(engine, settings),
        }
    }

    /// Process-wide in-memory engine.
    pub fn default_engine() -> Arc<MemoryEngine> {
        DEFAULT_ENGINE.clone()
    }

    /// Process-wide settings handed to the sync client.
    ///
    /// Mutable until the first synchronized session is opened.
    pub fn process_settings() -> Arc<ProcessSettings> {
        PROCESS_SETTINGS.clone()
    }

    /// Engine this database opens sessions on.
    pub fn engine(&self) -> &Arc<dyn NativeEngine> {
        self.opener.engine()
    }

    /// Settings this database hands to the sync client.
    pub fn settings(&self) -> &Arc<ProcessSettings> {
        self.opener.settings()
    }

    /// Open a session synchronously.
    pub fn open_session(&self, config: &Configuration, schema: &Schema) -> Result<Session> {
        Ok(self.opener.open_sync(config, schema)?)
    }

    /// Open a session asynchronously.
    pub async fn open_session_async(
        &self,
        config: &Configuration,
        schema: &Schema,
        cancel: &CancellationSignal,
        progress: Option<ProgressCallback>,
    ) -> Result<Session> {
        Ok(self.opener.open_async(config, schema, cancel, progress).await?)
    }
}

/// Builder for a session.
///
/// # Example
///
/// ```ignore
/// let session = Database::builder()
///     .path("/tmp/app.realm")
///     .object(ObjectSchema::new("Dog", vec![Property::new("name", PropertyType::String)]))
///     .schema_version(2)
///     .open()?;
/// ```
pub struct DatabaseBuilder {
    config: Configuration,
    schema: Schema,
    engine: Option<Arc<dyn NativeEngine>>,
    settings: Option<Arc<ProcessSettings>>,
}

impl DatabaseBuilder {
    /// Create a builder with no path and an empty schema.
    pub fn new() -> Self {
        Self {
            config: Configuration::new(PathBuf::new()),
            schema: Schema::empty(),
            engine: None,
            settings: None,
        }
    }

    /// Start from an existing configuration.
    pub fn configuration(mut self, config: Configuration) -> Self {
        self.config = config;
        self
    }

    /// Load the configuration from a TOML string.
    pub fn config_toml(self, source: &str) -> Result<Self> {
        Ok(self.configuration(Configuration::from_toml_str(source)?))
    }

    /// Load the configuration from a TOML file.
    pub fn config_file(self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| Error::ConfigFile {
            path: path.to_path_buf(),
            source,
        })?;
        self.config_toml(&source)
    }

    /// Set the database file path.
    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.config.path = path.as_ref().to_path_buf();
        self
    }

    /// Set the schema.
    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    /// Add or replace one object type in the schema.
    pub fn object(mut self, object: ObjectSchema) -> Self {
        self.schema.insert(object);
        self
    }

    /// Set the schema version.
    pub fn schema_version(mut self, version: u64) -> Self {
        self.config.schema_version = version;
        self
    }

    /// Open without a caller schema; the schema is read from the file.
    pub fn dynamic(mut self) -> Self {
        self.config.is_dynamic = true;
        self
    }

    /// Open read-only.
    pub fn read_only(mut self) -> Self {
        self.config.read_only = true;
        self
    }

    /// Set the encryption key.
    pub fn encryption_key(mut self, key: EncryptionKey) -> Self {
        self.config.encryption_key = Some(key);
        self
    }

    /// Synchronize with a server.
    pub fn sync(mut self, sync: SyncConfiguration) -> Self {
        self.config.sync = Some(sync);
        self
    }

    /// Use a specific engine instead of the process-wide one.
    pub fn engine(mut self, engine: Arc<dyn NativeEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Use specific settings instead of the process-wide ones.
    pub fn settings(mut self, settings: Arc<ProcessSettings>) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Configuration built so far.
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Open the session synchronously.
    pub fn open(self) -> Result<Session> {
        let (database, config, schema) = self.into_parts();
        database.open_session(&config, &schema)
    }

    /// Open the session through the async-open operation.
    ///
    /// Resolves with `OperationCancelled` if `cancel` fires before the
    /// engine completes. `progress` is called only before resolution.
    pub async fn open_async(
        self,
        cancel: &CancellationSignal,
        progress: Option<ProgressCallback>,
    ) -> Result<Session> {
        let (database, config, schema) = self.into_parts();
        database
            .open_session_async(&config, &schema, cancel, progress)
            .await
    }

    fn into_parts(self) -> (Database, Configuration, Schema) {
        let engine = self
            .engine
            .unwrap_or_else(|| Database::default_engine() as Arc<dyn NativeEngine>);
        let settings = self.settings.unwrap_or_else(Database::process_settings);
        (Database::with_engine(engine, settings), self.config, self.schema)
    }
}

impl Default for DatabaseBuilder {
    fn default() -> Self {
        Self::new()
    }
}
