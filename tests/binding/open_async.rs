//! Async open: completion, cancellation, progress and cleanup

use crate::common::*;
use parking_lot::Mutex;
use std::sync::Arc;

struct AsyncFixture {
    engine: Arc<MemoryEngine>,
    settings: Arc<ProcessSettings>,
    _dir: tempfile::TempDir,
    path: std::path::PathBuf,
}

impl AsyncFixture {
    fn manual() -> Self {
        Self::with_mode(AsyncOpenMode::Manual)
    }

    fn with_mode(mode: AsyncOpenMode) -> Self {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        Self {
            engine: MemoryEngine::with_async_mode(mode),
            settings: Arc::new(ProcessSettings::new()),
            path: dir.path().join("async.realm"),
            _dir: dir,
        }
    }

    fn builder(&self) -> DatabaseBuilder {
        builder(&self.engine, &self.settings)
            .path(&self.path)
            .schema(test_schema())
            .sync(sync_section())
    }

    /// Everything the async path allocated has been released
    fn assert_quiescent(&self) {
        let stats = self.engine.stats();
        assert!(self.engine.pending_opens().is_empty());
        assert_eq!(stats.live(ResourceKind::AsyncOpen), 0);
        assert_eq!(stats.live(ResourceKind::Reference), 0);
        assert_eq!(stats.invalid_releases, 0);
        assert_eq!(stats.progress_registered, stats.progress_unregistered);
    }
}

fn recorder() -> (ProgressCallback, Arc<Mutex<Vec<SyncProgress>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let callback: ProgressCallback = Arc::new(move |progress: SyncProgress| sink.lock().push(progress));
    (callback, seen)
}

#[tokio::test]
async fn completes_when_the_engine_completes() {
    let fx = AsyncFixture::manual();
    let cancel = CancellationSignal::new();

    let open = fx.builder().open_async(&cancel, None);
    let drive = async {
        let op = next_pending_open(&fx.engine).await;
        assert!(fx.engine.complete_open(op).unwrap());
    };
    let (session, ()) = tokio::join!(open, drive);

    let session = session.unwrap();
    session.write(|s| s.create_object("Dog").map(|_| ())).unwrap();
    assert_eq!(session.count("Dog").unwrap(), 1);
    assert_eq!(fx.engine.stats().cancel_calls, 0);
    fx.assert_quiescent();
}

#[tokio::test]
async fn cancel_before_completion_resolves_cancelled() {
    let fx = AsyncFixture::manual();
    let cancel = CancellationSignal::new();

    let open = fx.builder().open_async(&cancel, None);
    let drive = async {
        let op = next_pending_open(&fx.engine).await;
        cancel.cancel();
        op
    };
    let (result, op) = tokio::join!(open, drive);

    let err = binding(result.unwrap_err());
    assert!(matches!(err, BindingError::OperationCancelled));
    assert!(err.is_cancelled());
    assert_eq!(fx.engine.stats().cancel_calls, 1);
    assert_eq!(fx.engine.stats().live(ResourceKind::Session), 0);
    fx.assert_quiescent();

    // The operation is gone; a late completion cannot resurrect it.
    assert!(fx.engine.complete_open(op).is_err());
    assert_eq!(fx.engine.stats().live(ResourceKind::Reference), 0);
}

#[tokio::test]
async fn cancel_after_completion_is_a_noop() {
    let fx = AsyncFixture::manual();
    let cancel = CancellationSignal::new();

    let open = fx.builder().open_async(&cancel, None);
    let drive = async {
        let op = next_pending_open(&fx.engine).await;
        assert!(fx.engine.complete_open(op).unwrap());
        cancel.cancel();
    };
    let (session, ()) = tokio::join!(open, drive);

    assert!(session.is_ok());
    assert!(cancel.is_cancelled());
    assert_eq!(fx.engine.stats().cancel_calls, 0);
    fx.assert_quiescent();
}

#[tokio::test]
async fn already_cancelled_signal_never_opens() {
    let fx = AsyncFixture::manual();
    let cancel = CancellationSignal::new();
    cancel.cancel();

    let err = fx.builder().open_async(&cancel, None).await.unwrap_err();
    assert!(binding(err).is_cancelled());
    assert_eq!(fx.engine.stats().cancel_calls, 1);
    assert_eq!(fx.engine.stats().live(ResourceKind::Session), 0);
    fx.assert_quiescent();
}

#[tokio::test]
async fn engine_failure_resolves_session_open_failed() {
    let fx = AsyncFixture::manual();
    let cancel = CancellationSignal::new();

    let open = fx.builder().open_async(&cancel, None);
    let drive = async {
        let op = next_pending_open(&fx.engine).await;
        let error = NativeError::new(NativeErrorCode::Sync, "handshake rejected");
        assert!(fx.engine.fail_open(op, error).unwrap());
    };
    let (result, ()) = tokio::join!(open, drive);

    match binding(result.unwrap_err()) {
        BindingError::SessionOpenFailed { detail } => {
            assert_eq!(detail.code, NativeErrorCode::Sync);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(fx.engine.stats().cancel_calls, 0);
    fx.assert_quiescent();
}

#[tokio::test]
async fn progress_is_delivered_only_before_resolution() {
    let fx = AsyncFixture::manual();
    let cancel = CancellationSignal::new();
    let (callback, seen) = recorder();

    let open = fx.builder().open_async(&cancel, Some(callback));
    let drive = async {
        let op = next_pending_open(&fx.engine).await;
        assert_eq!(fx.engine.progress_listeners(op), 1);
        assert_eq!(fx.engine.report_progress(op, SyncProgress::new(10, 100)).unwrap(), 1);
        assert_eq!(fx.engine.report_progress(op, SyncProgress::new(100, 100)).unwrap(), 1);
        assert!(fx.engine.complete_open(op).unwrap());
        op
    };
    let (session, op) = tokio::join!(open, drive);
    session.unwrap();

    assert!(fx.engine.report_progress(op, SyncProgress::new(200, 200)).is_err());
    assert_eq!(
        *seen.lock(),
        [SyncProgress::new(10, 100), SyncProgress::new(100, 100)]
    );
    assert_eq!(fx.engine.stats().progress_registered, 1);
    fx.assert_quiescent();
}

#[tokio::test]
async fn cancelled_open_stops_progress() {
    let fx = AsyncFixture::manual();
    let cancel = CancellationSignal::new();
    let (callback, seen) = recorder();

    let open = fx.builder().open_async(&cancel, Some(callback));
    let drive = async {
        let op = next_pending_open(&fx.engine).await;
        fx.engine.report_progress(op, SyncProgress::new(1, 10)).unwrap();
        cancel.cancel();
    };
    let (result, ()) = tokio::join!(open, drive);

    assert!(binding(result.unwrap_err()).is_cancelled());
    assert_eq!(*seen.lock(), [SyncProgress::new(1, 10)]);
    fx.assert_quiescent();
}

#[tokio::test]
async fn dropping_the_future_cleans_up() {
    let fx = AsyncFixture::manual();
    let cancel = CancellationSignal::new();
    let (callback, seen) = recorder();

    let op = tokio::select! {
        biased;
        _ = fx.builder().open_async(&cancel, Some(callback)) => panic!("open resolved without the engine"),
        op = next_pending_open(&fx.engine) => op,
    };

    assert_eq!(fx.engine.stats().cancel_calls, 1);
    assert!(!fx.engine.complete_open(op).unwrap_or(false));
    assert!(seen.lock().is_empty());
    assert!(!cancel.is_cancelled());
    fx.assert_quiescent();
}

#[tokio::test]
async fn dropping_a_completed_future_releases_the_reference() {
    let fx = AsyncFixture::manual();
    let cancel = CancellationSignal::new();

    let mut open = Box::pin(fx.builder().open_async(&cancel, None));
    let op = tokio::select! {
        biased;
        _ = &mut open => panic!("open resolved without the engine"),
        op = next_pending_open(&fx.engine) => op,
    };
    assert!(fx.engine.complete_open(op).unwrap());
    assert_eq!(fx.engine.stats().live(ResourceKind::Reference), 1);

    drop(open);
    assert_eq!(fx.engine.stats().cancel_calls, 0);
    assert_eq!(fx.engine.stats().live(ResourceKind::Session), 0);
    fx.assert_quiescent();
}

#[tokio::test]
async fn background_engine_reports_steps_then_completes() {
    let steps = vec![
        SyncProgress::new(0, 300),
        SyncProgress::new(150, 300),
        SyncProgress::new(300, 300),
    ];
    let fx = AsyncFixture::with_mode(background_mode(steps.clone()));
    let cancel = CancellationSignal::new();
    let (callback, seen) = recorder();

    let session = fx
        .builder()
        .open_async(&cancel, Some(callback))
        .await
        .unwrap();

    assert!(!session.is_closed());
    assert_eq!(*seen.lock(), steps);
    assert!(seen.lock().last().unwrap().is_complete());
    fx.assert_quiescent();
}

#[tokio::test]
async fn async_open_configures_the_sync_client_once() {
    let fx = AsyncFixture::with_mode(background_mode(Vec::new()));
    let cancel = CancellationSignal::new();

    for _ in 0..2 {
        fx.builder().open_async(&cancel, None).await.unwrap();
    }
    assert_eq!(fx.engine.stats().sync_client_configured, 1);
    assert!(fx.settings.is_frozen());
}

#[tokio::test]
async fn invalid_configuration_fails_before_native_open() {
    let fx = AsyncFixture::manual();
    let cancel = CancellationSignal::new();

    let err = builder(&fx.engine, &fx.settings)
        .schema(test_schema())
        .open_async(&cancel, None)
        .await
        .unwrap_err();
    assert!(matches!(binding(err), BindingError::InvalidConfiguration(_)));
    assert_eq!(fx.engine.stats().allocated(ResourceKind::AsyncOpen), 0);
}
