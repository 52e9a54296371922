use async_trait::async_trait;
use mockall::mock;
use shotlift::{
    BackendFactory, BackendOptions, BackendShared, CaptureSource, MemoryArtifact, NotificationSink, Protocol,
    Settings, TransferBackend, TransferError, TransferErrorKind, TransferEvent, TransferItem, TransferResult,
    UploadManager, UploadOutcome,
};
use std::sync::{Arc, Mutex};
use tokio_test::{assert_err, assert_ok};

mock! {
    pub Sink {}
    impl NotificationSink for Sink {
        fn upload_succeeded(&self, item: &TransferItem, url: &str);
        fn upload_failed(&self, item: &TransferItem, hostname: &str, error: &TransferError);
        fn delete_succeeded(&self, item: &TransferItem);
        fn delete_failed(&self, item: &TransferItem, hostname: &str);
    }
}

// ─── Scripted backend ────────────────────────────────────────────────

#[derive(Clone, Copy)]
enum Script {
    Succeed,
    Fail,
    Abort,
}

struct ScriptedBackend {
    shared: BackendShared,
    script: Script,
}

#[async_trait]
impl TransferBackend for ScriptedBackend {
    fn protocol(&self) -> Protocol {
        Protocol::Ftp
    }

    fn hostname(&self) -> String {
        self.shared.hostname().to_string()
    }

    async fn upload(&self, item: Arc<TransferItem>, target: &str) -> TransferResult<UploadOutcome> {
        Ok(match self.script {
            Script::Succeed => self.shared.upload_succeeded(&item, target),
            Script::Fail => self
                .shared
                .upload_failed(&item, TransferError::transfer_failed("552 Quota exceeded")),
            Script::Abort => self.shared.upload_aborted(&item),
        })
    }

    async fn undo_upload(&self, item: Arc<TransferItem>) -> TransferResult<bool> {
        Ok(self.shared.delete_succeeded(&item))
    }
}

struct ScriptedFactory {
    script: Script,
    build_error: Option<TransferError>,
    duplicate_checks: Mutex<Vec<bool>>,
}

impl ScriptedFactory {
    fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            build_error: None,
            duplicate_checks: Mutex::new(Vec::new()),
        })
    }

    fn failing(error: TransferError) -> Arc<Self> {
        Arc::new(Self {
            script: Script::Succeed,
            build_error: Some(error),
            duplicate_checks: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl BackendFactory for ScriptedFactory {
    async fn build(&self, _settings: &Settings, options: BackendOptions) -> TransferResult<Arc<dyn TransferBackend>> {
        if let Some(e) = &self.build_error {
            return Err(e.clone());
        }
        self.duplicate_checks.lock().unwrap().push(options.check_for_duplicates);
        Ok(Arc::new(ScriptedBackend {
            shared: BackendShared::new("files.example.com", options),
            script: self.script,
        }))
    }
}

fn settings() -> Settings {
    Settings {
        host: "files.example.com".into(),
        server_path: "/public/shots".into(),
        http_base_uri: "https://img.example.com/shots/".into(),
        filename_format: "capture".into(),
        ..Default::default()
    }
}

fn manager(settings: Settings, sink: MockSink, factory: Arc<ScriptedFactory>) -> Arc<UploadManager> {
    Arc::new(UploadManager::new(settings, Arc::new(sink)).with_factory(factory))
}

fn capture() -> Arc<TransferItem> {
    TransferItem::new(MemoryArtifact::png(b"pixels".to_vec(), CaptureSource::Desktop))
}

// ─── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_success_is_recorded_and_undone() {
    let mut sink = MockSink::new();
    sink.expect_upload_succeeded()
        .withf(|_, url| url.to_string() == "https://img.example.com/shots/capture.png")
        .times(1)
        .return_const(());
    sink.expect_delete_succeeded().times(1).return_const(());
    let manager = manager(settings(), sink, ScriptedFactory::new(Script::Succeed));

    let item = capture();
    let ticket = assert_ok!(manager.upload(Arc::clone(&item)));
    let outcome = assert_ok!(ticket.handle.await.unwrap());
    assert_eq!(outcome.remote_path(), Some("/public/shots/capture.png"));
    assert_eq!(manager.history_len(), 1);
    assert_eq!(manager.last_uploaded().unwrap().id(), item.id());

    let undo = manager.undo_last().expect("history has an entry");
    assert!(assert_ok!(undo.await.unwrap()));
    assert!(!item.is_uploaded());
    assert_eq!(manager.history_len(), 0);
    assert!(manager.undo_last().is_none());
}

#[tokio::test]
async fn test_unreachable_server_is_reported_with_host_and_backed_up() {
    let folder = tempfile::tempdir().unwrap();
    let backup_dir = folder.path().join("failed");
    let mut sink = MockSink::new();
    sink.expect_upload_failed()
        .withf(|_, host, error| host.to_string() == "down.example.com" && error.is_connection_error())
        .times(1)
        .return_const(());
    let manager = manager(
        Settings {
            failed_uploads_folder: Some(backup_dir.clone()),
            ..settings()
        },
        sink,
        ScriptedFactory::failing(TransferError::connection_failed("down.example.com", "connection refused")),
    );

    let ticket = assert_ok!(manager.upload(capture()));
    let error = assert_err!(ticket.handle.await.unwrap());
    assert_eq!(error.kind, TransferErrorKind::ConnectionFailed);

    assert_eq!(std::fs::read(backup_dir.join("capture.png")).unwrap(), b"pixels");
    assert_eq!(manager.history_len(), 0);
}

#[tokio::test]
async fn test_failed_transfer_names_backend_host() {
    let mut sink = MockSink::new();
    sink.expect_upload_failed()
        .withf(|_, host, error| {
            host.to_string() == "files.example.com" && error.kind == TransferErrorKind::TransferFailed
        })
        .times(1)
        .return_const(());
    let manager = manager(settings(), sink, ScriptedFactory::new(Script::Fail));

    let ticket = assert_ok!(manager.upload(capture()));
    let outcome = assert_ok!(ticket.handle.await.unwrap());
    assert!(!outcome.is_success());
    assert_eq!(manager.history_len(), 0);
}

#[tokio::test]
async fn test_aborted_upload_is_reported_and_backed_up() {
    let folder = tempfile::tempdir().unwrap();
    let mut sink = MockSink::new();
    sink.expect_upload_failed()
        .withf(|_, host, error| host.to_string() == "files.example.com" && error.kind == TransferErrorKind::Aborted)
        .times(1)
        .return_const(());
    let manager = manager(
        Settings {
            failed_uploads_folder: Some(folder.path().to_path_buf()),
            ..settings()
        },
        sink,
        ScriptedFactory::new(Script::Abort),
    );

    let ticket = assert_ok!(manager.upload(capture()));
    match assert_ok!(ticket.handle.await.unwrap()) {
        UploadOutcome::Failure { cause } => assert_eq!(cause.kind, TransferErrorKind::Aborted),
        UploadOutcome::Success { .. } => panic!("aborted upload reported success"),
    }
    assert_eq!(std::fs::read(folder.path().join("capture.png")).unwrap(), b"pixels");
    assert_eq!(manager.history_len(), 0);
}

#[tokio::test]
async fn test_subscribers_see_backend_events() {
    let mut sink = MockSink::new();
    sink.expect_upload_succeeded().return_const(());
    let manager = manager(settings(), sink, ScriptedFactory::new(Script::Succeed));
    let mut events = manager.subscribe();

    let ticket = assert_ok!(manager.upload(capture()));
    ticket.handle.await.unwrap().unwrap();

    match events.recv().await.unwrap() {
        TransferEvent::UploadSucceeded { remote_path, .. } => assert_eq!(remote_path, "/public/shots/capture.png"),
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_duplicate_check_follows_settings() {
    let mut sink = MockSink::new();
    sink.expect_upload_succeeded().return_const(());
    let factory = ScriptedFactory::new(Script::Succeed);
    let manager = Arc::new(
        UploadManager::new(settings(), Arc::new(sink))
            .with_factory(factory.clone())
            .with_resolver(Arc::new(|r: &shotlift::DuplicateRequest| r.replace())),
    );

    manager.upload(capture()).unwrap().handle.await.unwrap().unwrap();
    manager
        .configuration_changed(Settings {
            check_for_duplicate_files: true,
            ..settings()
        })
        .await;
    manager.upload(capture()).unwrap().handle.await.unwrap().unwrap();

    assert_eq!(*factory.duplicate_checks.lock().unwrap(), vec![false, true]);
}

#[tokio::test]
async fn test_upload_files_skips_non_images() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("diagram.PNG");
    let notes = dir.path().join("notes.txt");
    std::fs::write(&image, b"png").unwrap();
    std::fs::write(&notes, b"text").unwrap();

    let mut sink = MockSink::new();
    sink.expect_upload_succeeded().times(1).return_const(());
    let manager = manager(settings(), sink, ScriptedFactory::new(Script::Succeed));

    let tickets = manager.upload_files(&[image, notes]);
    assert_eq!(tickets.len(), 1);
    for ticket in tickets {
        assert_ok!(ticket.handle.await.unwrap());
    }
}
