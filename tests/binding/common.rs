//! Shared fixtures for the binding tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
pub use vellum::prelude::*;
pub use vellum::{
    AsyncOpenMode, FieldKind, LogLevel, MemoryEngine, NativeError, NativeErrorCode, NativePtr,
    ProcessSettings, ProgressCallback, ResourceKind, RowIndex, INITIAL_STRING_BUFFER,
};

/// `Person` and `Dog`, covering every field type plus links and lists
pub fn test_schema() -> Schema {
    Schema::new(vec![
        ObjectSchema::new(
            "Person",
            vec![
                Property::new("name", PropertyType::String),
                Property::new("age", PropertyType::Int),
                Property::new("active", PropertyType::Bool),
                Property::new("score", PropertyType::Float),
                Property::new("rating", PropertyType::Double),
                Property::new("born", PropertyType::Date),
                Property::new("avatar", PropertyType::Data),
                Property::link("dog", "Dog"),
                Property::list("dogs", "Dog"),
            ],
        ),
        ObjectSchema::new(
            "Dog",
            vec![
                Property::new("name", PropertyType::String),
                Property::new("age", PropertyType::Int),
            ],
        ),
    ])
}

/// An open session on a private engine
pub struct TestDb {
    pub engine: Arc<MemoryEngine>,
    pub settings: Arc<ProcessSettings>,
    pub session: Session,
    pub path: PathBuf,
    _dir: TempDir,
}

impl TestDb {
    /// Open a session with [`test_schema`]
    pub fn open() -> Self {
        Self::open_with_mode(AsyncOpenMode::Manual)
    }

    /// Open a session; async opens on the engine use `mode`
    pub fn open_with_mode(mode: AsyncOpenMode) -> Self {
        init_tracing();
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("test.realm");
        let engine = MemoryEngine::with_async_mode(mode);
        let settings = Arc::new(ProcessSettings::new());
        let session = builder(&engine, &settings)
            .path(&path)
            .schema(test_schema())
            .open()
            .expect("open session");
        Self {
            engine,
            settings,
            session,
            path,
            _dir: dir,
        }
    }

    /// Another session on the same file and engine
    pub fn reopen(&self) -> Session {
        builder(&self.engine, &self.settings)
            .path(&self.path)
            .schema(test_schema())
            .open()
            .expect("reopen session")
    }

    /// Create a `Person` in its own transaction
    pub fn person(&self, name: &str, age: i64) -> ManagedObject {
        self.session
            .write(|s| {
                let person = s.create_object("Person")?;
                person.set("name", name.to_string())?;
                person.set("age", age)?;
                Ok(person)
            })
            .expect("create person")
    }

    /// Create a `Dog` in its own transaction
    pub fn dog(&self, name: &str) -> ManagedObject {
        self.session
            .write(|s| {
                let dog = s.create_object("Dog")?;
                dog.set("name", name.to_string())?;
                Ok(dog)
            })
            .expect("create dog")
    }
}

/// Route debug-level `tracing` output through the test harness
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Builder bound to a private engine and settings
pub fn builder(engine: &Arc<MemoryEngine>, settings: &Arc<ProcessSettings>) -> DatabaseBuilder {
    Database::builder()
        .engine(engine.clone())
        .settings(settings.clone())
}

/// A sync section pointing at a local test server
pub fn sync_section() -> SyncConfiguration {
    SyncConfiguration::new(
        "wss://sync.test.local",
        SyncUser::new(uuid::Uuid::new_v4(), "tester"),
        "partition-a",
    )
}

/// Unwrap the binding error inside a facade error
pub fn binding(err: Error) -> BindingError {
    match err {
        Error::Binding(inner) => inner,
        other => panic!("expected a binding error, got {other:?}"),
    }
}

/// Yield until the engine has a pending async open, then return it
pub async fn next_pending_open(engine: &MemoryEngine) -> NativePtr {
    for _ in 0..10_000 {
        if let Some(op) = engine.pending_opens().first().copied() {
            return op;
        }
        tokio::task::yield_now().await;
    }
    panic!("no async open became pending");
}

/// Engine that completes async opens on a worker thread after a short delay
pub fn background_mode(steps: Vec<SyncProgress>) -> AsyncOpenMode {
    AsyncOpenMode::Background {
        delay: Duration::from_millis(5),
        steps,
    }
}
