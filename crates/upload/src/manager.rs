//! Transfer manager: validates a selection and uploads it file by file.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use filedeck_store::RemoteStore;
use filedeck_transfer::{
    QuotaCandidate, QuotaLimits, RetryPolicy, SessionDriver, SpeedCalculator, TimeoutPolicy,
    TransferProgress, TransferSession, TransferSettings, resolve_mime_type, validate_upload_path,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::SubmitError;
use crate::guard::{UploadGuardStore, build_signature};
use crate::scanner::{ScanSource, ScannedEntry, scan};
use crate::types::{
    DestinationContext, FileFailure, FileOutcome, FileStatus, ScanWarning, TransferEvent,
    TransferSummary,
};

/// Notified once per submission after the summary is built.
pub trait TransferObserver: Send + Sync {
    fn transfer_finished<'a>(
        &'a self,
        destination: &'a DestinationContext,
        summary: &'a TransferSummary,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

/// Runs submissions against one [`RemoteStore`].
pub struct TransferManager {
    store: Arc<dyn RemoteStore>,
    guard: Arc<UploadGuardStore>,
    limits: QuotaLimits,
    retry: RetryPolicy,
    timeout: TimeoutPolicy,
    progress_interval: Duration,
    observer: Option<Arc<dyn TransferObserver>>,
}

impl TransferManager {
    pub fn new(store: Arc<dyn RemoteStore>, guard: Arc<UploadGuardStore>) -> Self {
        let settings = TransferSettings::default();
        Self {
            store,
            guard,
            limits: QuotaLimits::default(),
            retry: RetryPolicy::from(&settings),
            timeout: TimeoutPolicy::from(&settings),
            progress_interval: Duration::from_millis(settings.progress_interval_ms),
            observer: None,
        }
    }

    pub fn with_limits(mut self, limits: QuotaLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_settings(mut self, settings: &TransferSettings) -> Self {
        self.retry = RetryPolicy::from(settings);
        self.timeout = TimeoutPolicy::from(settings);
        self.progress_interval = Duration::from_millis(settings.progress_interval_ms);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn TransferObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn guard(&self) -> &Arc<UploadGuardStore> {
        &self.guard
    }

    /// Scans `input`, runs the pre-flight checks and starts the upload.
    ///
    /// Quota, duplicate and path errors are returned before any request is
    /// made. Once a handle is returned, per-file failures are reported
    /// through its events and summary.
    pub async fn submit(
        &self,
        input: ScanSource,
        destination: DestinationContext,
    ) -> Result<TransferHandle, SubmitError> {
        let scanned = tokio::task::spawn_blocking(move || scan(input))
            .await
            .map_err(|e| SubmitError::Scan(e.to_string()))?;

        if scanned.entries.is_empty() {
            return Err(SubmitError::EmptySelection {
                warnings: scanned.warnings,
            });
        }

        let paths: Vec<String> = scanned.entries.iter().map(ScannedEntry::upload_path).collect();
        let candidates: Vec<QuotaCandidate<'_>> = scanned
            .entries
            .iter()
            .zip(&paths)
            .map(|(e, path)| QuotaCandidate {
                relative_path: path,
                size: e.size,
            })
            .collect();
        if let Err(e) = self.limits.check(&candidates, scanned.folder_root.as_deref()) {
            warn!(destination = %destination.guard_target(), error = %e, "quota exceeded");
            return Err(e.into());
        }

        let target = destination.guard_target();
        let signature = build_signature(&scanned.entries);
        if self.guard.should_skip(&target, &signature) {
            info!(destination = %target, "duplicate submission ignored");
            return Err(SubmitError::DuplicateSubmission);
        }

        if !destination.base_path.is_empty() {
            validate_upload_path(&destination.base_path)
                .map_err(|e| SubmitError::InvalidPath(e.to_string()))?;
        }
        for path in &paths {
            validate_upload_path(path).map_err(|e| SubmitError::InvalidPath(e.to_string()))?;
        }

        self.guard.arm(&target, &signature);

        let files: Vec<FileOutcome> = scanned
            .entries
            .iter()
            .zip(&paths)
            .map(|(e, path)| FileOutcome {
                relative_path: path.clone(),
                storage_key: destination.storage_key(path),
                size: e.size,
                status: FileStatus::Pending,
                error: None,
                object: None,
            })
            .collect();
        let files = Arc::new(Mutex::new(files));
        let total_bytes = scanned.total_bytes();
        let cancel = CancellationToken::new();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        info!(
            destination = %target,
            files = scanned.entries.len(),
            bytes = total_bytes,
            folder_root = ?scanned.folder_root,
            "transfer started"
        );

        let run = TransferRun {
            driver: SessionDriver::new(
                Arc::clone(&self.store),
                self.retry,
                self.timeout,
                cancel.clone(),
            ),
            guard: Arc::clone(&self.guard),
            observer: self.observer.clone(),
            destination: destination.clone(),
            target: target.clone(),
            signature: signature.clone(),
            folder_root: scanned.folder_root.clone(),
            warnings: scanned.warnings.clone(),
            total_bytes,
            progress_interval: self.progress_interval,
            files: Arc::clone(&files),
            events: events_tx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(run.execute(scanned.entries));

        Ok(TransferHandle {
            events: Some(events_rx),
            cancel,
            files,
            guard: Arc::clone(&self.guard),
            target,
            signature,
            destination,
            folder_root: scanned.folder_root,
            warnings: scanned.warnings,
            total_bytes,
            task,
        })
    }
}

/// Handle to a running submission.
#[derive(Debug)]
pub struct TransferHandle {
    events: Option<mpsc::UnboundedReceiver<TransferEvent>>,
    cancel: CancellationToken,
    files: Arc<Mutex<Vec<FileOutcome>>>,
    guard: Arc<UploadGuardStore>,
    target: String,
    signature: String,
    destination: DestinationContext,
    folder_root: Option<String>,
    warnings: Vec<ScanWarning>,
    total_bytes: u64,
    task: JoinHandle<TransferSummary>,
}

impl TransferHandle {
    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<TransferEvent>> {
        self.events.take()
    }

    /// Stops scheduling further parts and files. A request already in
    /// flight completes.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Current per-file status.
    pub fn files(&self) -> Vec<FileOutcome> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn folder_root(&self) -> Option<&str> {
        self.folder_root.as_deref()
    }

    /// Waits for the terminal summary.
    pub async fn wait(self) -> TransferSummary {
        match self.task.await {
            Ok(summary) => summary,
            Err(e) => {
                error!(error = %e, "transfer task ended abnormally");
                self.guard.release(&self.target, &self.signature);
                let files = self
                    .files
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                let mut summary = TransferSummary {
                    destination: self.destination,
                    folder_root: self.folder_root,
                    succeeded: 0,
                    failed: Vec::new(),
                    skipped: 0,
                    cancelled: true,
                    total_bytes: self.total_bytes,
                    transferred_bytes: 0,
                    warnings: self.warnings,
                    files: Vec::new(),
                };
                for file in &files {
                    match file.status {
                        FileStatus::Succeeded => {
                            summary.succeeded += 1;
                            summary.transferred_bytes += file.size;
                        }
                        FileStatus::Pending => summary.skipped += 1,
                        FileStatus::Uploading | FileStatus::Failed => {
                            summary.failed.push(FileFailure {
                                relative_path: file.relative_path.clone(),
                                reason: file
                                    .error
                                    .clone()
                                    .unwrap_or_else(|| format!("task failed: {e}")),
                                offset: None,
                            });
                        }
                    }
                }
                summary.files = files;
                summary
            }
        }
    }
}

/// State moved into the spawned upload task.
struct TransferRun {
    driver: SessionDriver,
    guard: Arc<UploadGuardStore>,
    observer: Option<Arc<dyn TransferObserver>>,
    destination: DestinationContext,
    target: String,
    signature: String,
    folder_root: Option<String>,
    warnings: Vec<ScanWarning>,
    total_bytes: u64,
    progress_interval: Duration,
    files: Arc<Mutex<Vec<FileOutcome>>>,
    events: mpsc::UnboundedSender<TransferEvent>,
    cancel: CancellationToken,
}

impl TransferRun {
    async fn execute(self, entries: Vec<ScannedEntry>) -> TransferSummary {
        let speed = SpeedCalculator::default();
        let mut succeeded = 0;
        let mut failed = Vec::new();
        let mut skipped = 0;
        let mut transferred = 0u64;

        for (index, entry) in entries.iter().enumerate() {
            let path = entry.upload_path();
            if self.cancel.is_cancelled() {
                skipped = entries.len() - index;
                info!(skipped, "transfer cancelled, remaining files skipped");
                break;
            }

            self.set_status(index, FileStatus::Uploading, None);
            self.emit(TransferEvent::FileStarted {
                index,
                relative_path: path.clone(),
                size: entry.size,
            });

            let mime_type = match &entry.mime_type {
                Some(m) => m.clone(),
                None => resolve_mime_type(entry.source.as_ref()).await,
            };
            let storage_key = self.destination.storage_key(&path);
            let session = TransferSession::new(entry.source.name(), storage_key, entry.size);
            let progress = FileProgress {
                run: &self,
                speed: &speed,
                relative_path: &path,
                file_total: entry.size,
                base: transferred,
                last: Mutex::new((None, 0)),
            };

            debug!(file = %path, size = entry.size, mime = %mime_type, "uploading");
            let result = self
                .driver
                .upload(&session, entry.source.as_ref(), &mime_type, &|b: u64| {
                    progress.report(b)
                })
                .await;

            match result {
                Ok(object) => {
                    succeeded += 1;
                    transferred += entry.size;
                    info!(file = %path, key = %object.storage_key, "file uploaded");
                    {
                        let mut files = self.files.lock().unwrap_or_else(PoisonError::into_inner);
                        if let Some(file) = files.get_mut(index) {
                            file.status = FileStatus::Succeeded;
                            file.object = Some(object.clone());
                        }
                    }
                    self.emit(TransferEvent::FileCompleted {
                        index,
                        relative_path: path.clone(),
                        object,
                    });
                }
                Err(e) => {
                    let reason = e.to_string();
                    warn!(file = %path, error = %reason, "file upload failed");
                    self.set_status(index, FileStatus::Failed, Some(reason.clone()));
                    self.emit(TransferEvent::FileFailed {
                        index,
                        relative_path: path.clone(),
                        error: reason.clone(),
                        offset: e.offset(),
                    });
                    failed.push(FileFailure {
                        relative_path: path.clone(),
                        reason,
                        offset: e.offset(),
                    });
                }
            }
        }

        let files = self
            .files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let summary = TransferSummary {
            destination: self.destination.clone(),
            folder_root: self.folder_root.clone(),
            succeeded,
            failed,
            skipped,
            cancelled: self.cancel.is_cancelled(),
            total_bytes: self.total_bytes,
            transferred_bytes: transferred,
            warnings: self.warnings.clone(),
            files,
        };

        self.guard.release(&self.target, &self.signature);
        info!(
            destination = %self.target,
            succeeded = summary.succeeded,
            failed = summary.failed_count(),
            skipped = summary.skipped,
            cancelled = summary.cancelled,
            "transfer finished"
        );
        self.emit(TransferEvent::Finished(summary.clone()));

        if let Some(observer) = &self.observer {
            observer
                .transfer_finished(&self.destination, &summary)
                .await;
        }
        summary
    }

    fn set_status(&self, index: usize, status: FileStatus, error: Option<String>) {
        let mut files = self.files.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(file) = files.get_mut(index) {
            file.status = status;
            file.error = error;
        }
    }

    fn emit(&self, event: TransferEvent) {
        // A dropped receiver only means nobody is listening.
        let _ = self.events.send(event);
    }
}

/// Turns per-file byte counts into throttled progress events.
struct FileProgress<'a> {
    run: &'a TransferRun,
    speed: &'a SpeedCalculator,
    relative_path: &'a str,
    file_total: u64,
    /// Bytes of earlier files already transferred.
    base: u64,
    /// Last emission time and last reported byte count.
    last: Mutex<(Option<Instant>, u64)>,
}

impl FileProgress<'_> {
    fn report(&self, file_bytes: u64) {
        let now = Instant::now();
        {
            let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
            let delta = file_bytes.saturating_sub(last.1);
            if delta == 0 {
                return;
            }
            self.speed.add_sample(delta);
            last.1 = file_bytes;

            let due = match last.0 {
                None => true,
                Some(at) => now.duration_since(at) >= self.run.progress_interval,
            };
            if !due && file_bytes < self.file_total {
                return;
            }
            last.0 = Some(now);
        }

        let transferred = self.base + file_bytes;
        let remaining = self.run.total_bytes.saturating_sub(transferred);
        self.run.emit(TransferEvent::Progress {
            relative_path: self.relative_path.to_string(),
            file_bytes,
            file_total: self.file_total,
            overall: TransferProgress {
                transferred_bytes: transferred,
                total_bytes: self.run.total_bytes,
                bytes_per_second: self.speed.bytes_per_second(),
                eta: self.speed.eta(remaining),
            },
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use filedeck_protocol::{
        BatchDeleteResponse, CompleteUploadRequest, FileListing, FileQuery, InitUploadRequest,
        InitUploadResponse, ObjectDescriptor, PartReceipt, RenameRequest, TreeListing, TreeQuery,
        UploadMode, UploadPartRequest,
    };
    use filedeck_store::{StoreError, StoreFuture};
    use filedeck_transfer::{MemoryFile, QuotaLimit, TransferSource};
    use tempfile::TempDir;

    use crate::scanner::{DropItem, PickedFile, drop_item_from_path};

    /// Records every call. Payloads above `part_size` go chunked.
    struct MockStore {
        calls: Mutex<Vec<String>>,
        part_size: u64,
        fail_init_for: Mutex<Vec<String>>,
        part_delay: Duration,
    }

    impl MockStore {
        fn new(part_size: u64) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                part_size,
                fail_init_for: Mutex::new(Vec::new()),
                part_delay: Duration::ZERO,
            }
        }

        fn slow_parts(mut self, delay: Duration) -> Self {
            self.part_delay = delay;
            self
        }

        fn fail_init(&self, storage_key: &str) {
            self.fail_init_for
                .lock()
                .unwrap()
                .push(storage_key.to_string());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn inits(&self) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter(|c| c.starts_with("init:"))
                .collect()
        }
    }

    impl RemoteStore for MockStore {
        fn init_upload(&self, req: &InitUploadRequest) -> StoreFuture<'_, InitUploadResponse> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("init:{}", req.storage_key));
            let fail = self.fail_init_for.lock().unwrap().contains(&req.storage_key);
            let chunked = req.filesize > self.part_size;
            let part_size = self.part_size;
            let filesize = req.filesize;
            let key = req.storage_key.clone();
            Box::pin(async move {
                if fail {
                    return Err(StoreError::Rejected("storage unavailable".into()));
                }
                Ok(if chunked {
                    InitUploadResponse {
                        transfer_id: format!("t-{key}"),
                        mode: UploadMode::Chunked,
                        upload_id: Some(format!("u-{key}")),
                        part_size: Some(part_size),
                        total_parts: Some(filesize.div_ceil(part_size) as u32),
                    }
                } else {
                    InitUploadResponse {
                        transfer_id: format!("t-{key}"),
                        mode: UploadMode::Direct,
                        upload_id: None,
                        part_size: None,
                        total_parts: None,
                    }
                })
            })
        }

        fn upload_part(
            &self,
            req: &UploadPartRequest,
            _body: Vec<u8>,
        ) -> StoreFuture<'_, PartReceipt> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("part:{}:{}", req.storage_key, req.part_number));
            let n = req.part_number;
            let delay = self.part_delay;
            Box::pin(async move {
                tokio::time::sleep(delay).await;
                Ok(PartReceipt {
                    etag: format!("e{n}"),
                })
            })
        }

        fn upload_direct(
            &self,
            transfer_id: &str,
            filename: &str,
            _mime_type: &str,
            body: Vec<u8>,
        ) -> StoreFuture<'_, ObjectDescriptor> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("direct:{transfer_id}"));
            let filename = filename.to_string();
            Box::pin(async move {
                Ok(ObjectDescriptor {
                    id: None,
                    storage_key: String::new(),
                    filename,
                    filesize: body.len() as u64,
                    url: None,
                })
            })
        }

        fn complete_upload(
            &self,
            req: &CompleteUploadRequest,
        ) -> StoreFuture<'_, ObjectDescriptor> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("complete:{}", req.storage_key));
            let key = req.storage_key.clone();
            Box::pin(async move {
                Ok(ObjectDescriptor {
                    id: Some(1),
                    filename: key.rsplit('/').next().unwrap_or_default().to_string(),
                    storage_key: key,
                    filesize: 0,
                    url: None,
                })
            })
        }

        fn list_tree(&self, _query: &TreeQuery) -> StoreFuture<'_, TreeListing> {
            Box::pin(async { Ok(TreeListing::default()) })
        }

        fn list_files(&self, _query: &FileQuery) -> StoreFuture<'_, FileListing> {
            Box::pin(async { Ok(FileListing::default()) })
        }

        fn delete_file(&self, _file_id: i64) -> StoreFuture<'_, ()> {
            Box::pin(async { Ok(()) })
        }

        fn batch_delete(&self, _ids: &[i64]) -> StoreFuture<'_, BatchDeleteResponse> {
            Box::pin(async { Ok(BatchDeleteResponse::default()) })
        }

        fn rename(&self, _req: &RenameRequest) -> StoreFuture<'_, ()> {
            Box::pin(async { Ok(()) })
        }
    }

    struct RecordingObserver {
        seen: Mutex<Vec<(String, usize)>>,
    }

    impl TransferObserver for RecordingObserver {
        fn transfer_finished<'a>(
            &'a self,
            destination: &'a DestinationContext,
            summary: &'a TransferSummary,
        ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
            Box::pin(async move {
                self.seen
                    .lock()
                    .unwrap()
                    .push((destination.base_path.clone(), summary.succeeded));
            })
        }
    }

    fn manager(store: &Arc<MockStore>) -> TransferManager {
        TransferManager::new(store.clone(), Arc::new(UploadGuardStore::default())).with_settings(
            &TransferSettings {
                max_retries: 0,
                ..TransferSettings::default()
            },
        )
    }

    fn mem(name: &str, data: &[u8], modified: u64) -> Arc<dyn TransferSource> {
        Arc::new(MemoryFile::new(name, data.to_vec(), modified))
    }

    fn clipboard(files: &[(&str, &[u8])]) -> ScanSource {
        ScanSource::ClipboardItems(files.iter().map(|(n, d)| mem(n, d, 1)).collect())
    }

    fn dest(base: &str) -> DestinationContext {
        DestinationContext::new("42", "client_material", base)
    }

    #[tokio::test]
    async fn dropped_folder_uploads_with_root_prefix() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("reports");
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("a.txt"), b"alpha").unwrap();
        fs::write(root.join("sub").join("b.txt"), b"beta").unwrap();

        let store = Arc::new(MockStore::new(1024));
        let handle = manager(&store)
            .submit(
                ScanSource::DropEvent(vec![drop_item_from_path(&root)]),
                dest("2024"),
            )
            .await
            .unwrap();
        assert_eq!(handle.folder_root(), Some("reports"));

        let summary = handle.wait().await;
        assert_eq!(summary.folder_root.as_deref(), Some("reports"));
        assert_eq!(summary.succeeded, 2);
        assert!(summary.is_success());
        assert_eq!(summary.transferred_bytes, 9);
        assert_eq!(
            store.inits(),
            vec!["init:2024/reports/a.txt", "init:2024/reports/sub/b.txt"]
        );
        assert_eq!(summary.files[1].relative_path, "reports/sub/b.txt");
    }

    #[tokio::test]
    async fn oversized_file_fails_before_any_request() {
        let store = Arc::new(MockStore::new(1024));
        let mgr = manager(&store).with_limits(QuotaLimits {
            max_single_file_bytes: 100,
            ..QuotaLimits::default()
        });

        let err = mgr
            .submit(clipboard(&[("big.bin", &[0u8; 150])]), dest(""))
            .await
            .unwrap_err();

        match err {
            SubmitError::Quota(q) => {
                assert_eq!(q.limit, QuotaLimit::MaxSingleFileBytes);
                assert_eq!(q.observed, 150);
                assert_eq!(q.max, 100);
            }
            other => panic!("expected quota error, got {other:?}"),
        }
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn empty_selection_is_refused() {
        let store = Arc::new(MockStore::new(1024));
        let err = manager(&store)
            .submit(clipboard(&[("empty.txt", b"")]), dest(""))
            .await
            .unwrap_err();

        match err {
            SubmitError::EmptySelection { warnings } => assert_eq!(warnings.len(), 1),
            other => panic!("expected empty selection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn traversal_paths_are_rejected() {
        let store = Arc::new(MockStore::new(1024));
        let err = manager(&store)
            .submit(
                ScanSource::PickerInput(vec![PickedFile {
                    source: mem("x.txt", b"x", 1),
                    relative_path: "docs/../../x.txt".into(),
                }]),
                dest(""),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, SubmitError::InvalidPath(_)));
        assert!(store.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_suppressed_within_window() {
        let store = Arc::new(MockStore::new(4).slow_parts(Duration::from_secs(1)));
        let mgr = manager(&store);
        let files: &[(&str, &[u8])] = &[("a.bin", b"0123456789")];

        let first = mgr.submit(clipboard(files), dest("x")).await.unwrap();
        let err = mgr.submit(clipboard(files), dest("x")).await.unwrap_err();
        assert!(matches!(err, SubmitError::DuplicateSubmission));

        // Same selection to another folder is a different target.
        let other = mgr.submit(clipboard(files), dest("y")).await.unwrap();

        first.wait().await;
        other.wait().await;

        // Released after the owning transfer finished.
        let again = mgr.submit(clipboard(files), dest("x")).await.unwrap();
        assert!(again.wait().await.is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn guard_expires_after_window() {
        let store = Arc::new(MockStore::new(1024));
        let guard = Arc::new(UploadGuardStore::new(Duration::from_secs(5)));
        let mgr = TransferManager::new(store.clone(), Arc::clone(&guard));
        let files: &[(&str, &[u8])] = &[("a.txt", b"abc")];

        let sig = build_signature(&[ScannedEntry {
            source: mem("a.txt", b"abc", 1),
            folder: None,
            relative_path: "a.txt".into(),
            size: 3,
            mime_type: None,
        }]);
        guard.arm(&dest("").guard_target(), &sig);

        assert!(matches!(
            mgr.submit(clipboard(files), dest("")).await.unwrap_err(),
            SubmitError::DuplicateSubmission
        ));

        tokio::time::advance(Duration::from_secs(6)).await;
        let handle = mgr.submit(clipboard(files), dest("")).await.unwrap();
        assert_eq!(handle.wait().await.succeeded, 1);
    }

    /// A source whose reads bring the upload task down.
    struct ExplodingFile;

    impl TransferSource for ExplodingFile {
        fn name(&self) -> &str {
            "boom.bin"
        }

        fn size(&self) -> u64 {
            4
        }

        fn last_modified(&self) -> u64 {
            1
        }

        fn read_range(
            &self,
            _offset: u64,
            _len: usize,
        ) -> filedeck_transfer::SourceFuture<'_, Vec<u8>> {
            panic!("disk vanished")
        }
    }

    #[tokio::test]
    async fn crashed_run_releases_guard() {
        let store = Arc::new(MockStore::new(1024));
        let mgr = manager(&store);
        let selection = || ScanSource::ClipboardItems(vec![Arc::new(ExplodingFile) as Arc<dyn TransferSource>]);

        let summary = mgr.submit(selection(), dest("")).await.unwrap().wait().await;
        assert!(summary.cancelled);
        assert_eq!(summary.failed_count(), 1);
        assert_eq!(summary.failed[0].relative_path, "boom.bin");

        // Within the window, but the crashed run no longer holds the target.
        assert!(!mgr.guard().should_skip(&dest("").guard_target(), "boom.bin:4:1"));
        mgr.submit(selection(), dest("")).await.unwrap().wait().await;
    }

    #[tokio::test]
    async fn failing_file_does_not_stop_siblings() {
        let store = Arc::new(MockStore::new(1024));
        store.fail_init("b.txt");
        let mgr = manager(&store);

        let summary = mgr
            .submit(
                clipboard(&[("a.txt", b"a"), ("b.txt", b"b"), ("c.txt", b"c")]),
                dest(""),
            )
            .await
            .unwrap()
            .wait()
            .await;

        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed_count(), 1);
        assert_eq!(summary.failed[0].relative_path, "b.txt");
        assert!(summary.failed[0].reason.contains("storage unavailable"));
        assert_eq!(summary.failed[0].offset, Some(0));
        assert_eq!(
            store.inits(),
            vec!["init:a.txt", "init:b.txt", "init:c.txt"]
        );
        let statuses: Vec<_> = summary.files.iter().map(|f| f.status).collect();
        assert_eq!(
            statuses,
            vec![FileStatus::Succeeded, FileStatus::Failed, FileStatus::Succeeded]
        );
    }

    #[tokio::test]
    async fn events_describe_the_run() {
        let store = Arc::new(MockStore::new(4));
        let mut handle = manager(&store)
            .submit(clipboard(&[("a.bin", b"0123456789")]), dest(""))
            .await
            .unwrap();
        let mut events = handle.take_events().unwrap();
        assert!(handle.take_events().is_none());
        handle.wait().await;

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }

        assert!(matches!(seen.first(), Some(TransferEvent::FileStarted { index: 0, .. })));
        assert!(matches!(
            seen[seen.len() - 2],
            TransferEvent::FileCompleted { index: 0, .. }
        ));
        match seen.last() {
            Some(TransferEvent::Finished(summary)) => assert_eq!(summary.succeeded, 1),
            other => panic!("expected finished event, got {other:?}"),
        }
        let last_progress = seen
            .iter()
            .rev()
            .find_map(|e| match e {
                TransferEvent::Progress { overall, .. } => Some(*overall),
                _ => None,
            })
            .unwrap();
        assert_eq!(last_progress.transferred_bytes, 10);
        assert_eq!(last_progress.percent(), 100.0);
        assert_eq!(
            store.calls(),
            vec![
                "init:a.bin",
                "part:a.bin:1",
                "part:a.bin:2",
                "part:a.bin:3",
                "complete:a.bin"
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_skips_remaining_files() {
        let store = Arc::new(MockStore::new(4).slow_parts(Duration::from_secs(1)));
        let handle = manager(&store)
            .submit(
                clipboard(&[("a.bin", b"0123456789"), ("b.bin", b"0123456789")]),
                dest(""),
            )
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(1500)).await;
        handle.cancel();
        let summary = handle.wait().await;

        assert!(summary.cancelled);
        assert_eq!(summary.succeeded, 0);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed_count(), 1);
        assert_eq!(summary.failed[0].offset, Some(8));
        assert!(!store.calls().iter().any(|c| c.contains("b.bin")));
        assert!(!store.calls().iter().any(|c| c.starts_with("complete")));
    }

    #[tokio::test]
    async fn observer_receives_summary() {
        let store = Arc::new(MockStore::new(1024));
        let observer = Arc::new(RecordingObserver {
            seen: Mutex::new(Vec::new()),
        });
        let mgr = manager(&store).with_observer(observer.clone());

        mgr.submit(clipboard(&[("a.txt", b"a")]), dest("inbox"))
            .await
            .unwrap()
            .wait()
            .await;

        assert_eq!(
            *observer.seen.lock().unwrap(),
            vec![("inbox".to_string(), 1)]
        );
    }

    #[tokio::test]
    async fn unreadable_drop_items_surface_as_warnings() {
        let store = Arc::new(MockStore::new(1024));
        let summary = manager(&store)
            .submit(
                ScanSource::DropEvent(vec![
                    DropItem::Unreadable {
                        name: "ghost".into(),
                        reason: "gone".into(),
                    },
                    DropItem::File(mem("ok.txt", b"ok", 1)),
                ]),
                dest(""),
            )
            .await
            .unwrap()
            .wait()
            .await;

        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.warnings.len(), 1);
        assert_eq!(summary.warnings[0].path, "ghost");
    }
}
