//! Engine facade: one store, one transfer manager, and a browsing session
//! per `(scope, category)` that is refreshed when an upload lands.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use filedeck_browser::{BrowserError, FileTree, ListingSettings, ListingView};
use filedeck_protocol::RenameTarget;
use filedeck_store::{HttpStore, RemoteStore};
use filedeck_upload::{
    DestinationContext, ScanSource, SubmitError, TransferHandle, TransferManager,
    TransferObserver, TransferSummary, UploadGuardStore,
};
use tracing::{debug, info, warn};

use crate::EngineError;
use crate::config::EngineConfig;

/// Tree and listing of one `(scope, category)` pair.
pub struct BrowserSession {
    tree: FileTree,
    listing: ListingView,
}

impl BrowserSession {
    fn new(
        store: Arc<dyn RemoteStore>,
        scope: &str,
        category: &str,
        settings: &ListingSettings,
    ) -> Self {
        Self {
            tree: FileTree::new(Arc::clone(&store), scope, category),
            listing: ListingView::new(store, scope, category, settings),
        }
    }

    pub fn tree(&self) -> &FileTree {
        &self.tree
    }

    pub fn listing(&self) -> &ListingView {
        &self.listing
    }

    /// Expands the tree down to `path` and lists its files.
    pub async fn open_folder(&self, path: &str) -> Result<(), BrowserError> {
        self.tree.ensure_expanded_path(path).await?;
        self.listing.set_folder(path).await
    }

    /// Refetches the root, the current folder and the current page.
    pub async fn refresh(&self) -> Result<(), BrowserError> {
        self.tree.refresh_all(&self.listing.folder_path()).await?;
        self.listing.reload().await
    }

    pub async fn delete_file(&self, id: i64) -> Result<(), BrowserError> {
        self.listing.delete_file(id).await?;
        self.tree.refresh_all(&self.listing.folder_path()).await
    }

    pub async fn delete_selected(&self) -> Result<u64, BrowserError> {
        let deleted = self.listing.delete_selected().await?;
        if deleted > 0 {
            self.tree.refresh_all(&self.listing.folder_path()).await?;
        }
        Ok(deleted)
    }

    pub async fn rename(&self, target: RenameTarget, new_name: &str) -> Result<(), BrowserError> {
        self.listing.rename(target, new_name).await?;
        self.tree.refresh_all(&self.listing.folder_path()).await
    }

    /// Refreshes what an upload into `base_path` may have changed.
    async fn refresh_after_upload(&self, base_path: &str) -> Result<(), BrowserError> {
        let current = self.listing.folder_path();
        self.tree.refresh_all(&current).await?;
        if !base_path.is_empty() && base_path != current && self.tree.node(base_path).is_some() {
            self.tree.refresh_node(base_path).await?;
        }
        self.listing.reload().await
    }
}

/// Open browsing sessions, keyed by `(scope, category)`.
struct SessionRegistry {
    store: Arc<dyn RemoteStore>,
    listing: ListingSettings,
    sessions: Mutex<HashMap<(String, String), Arc<BrowserSession>>>,
}

impl SessionRegistry {
    fn get_or_open(&self, scope: &str, category: &str) -> Arc<BrowserSession> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let key = (scope.to_string(), category.to_string());
        Arc::clone(sessions.entry(key).or_insert_with(|| {
            debug!(scope, category, "browser session opened");
            Arc::new(BrowserSession::new(
                Arc::clone(&self.store),
                scope,
                category,
                &self.listing,
            ))
        }))
    }

    fn get(&self, scope: &str, category: &str) -> Option<Arc<BrowserSession>> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(scope.to_string(), category.to_string()))
            .cloned()
    }
}

impl TransferObserver for SessionRegistry {
    fn transfer_finished<'a>(
        &'a self,
        destination: &'a DestinationContext,
        summary: &'a TransferSummary,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            if summary.succeeded == 0 {
                return;
            }
            let Some(session) = self.get(&destination.customer_scope, &destination.category)
            else {
                return;
            };
            if let Err(e) = session.refresh_after_upload(&destination.base_path).await {
                warn!(
                    scope = %destination.customer_scope,
                    category = %destination.category,
                    error = %e,
                    "refresh after upload failed"
                );
            }
        })
    }
}

/// Entry point: uploads and browsing against one remote store.
pub struct Engine {
    config: EngineConfig,
    store: Arc<dyn RemoteStore>,
    transfers: TransferManager,
    sessions: Arc<SessionRegistry>,
}

impl Engine {
    /// Builds an engine talking HTTP to `config.api`.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let store = HttpStore::new(&config.api)?;
        info!(base_url = %store.base_url(), "engine started");
        Ok(Self::with_store(config, Arc::new(store)))
    }

    /// Builds an engine over any [`RemoteStore`].
    pub fn with_store(config: EngineConfig, store: Arc<dyn RemoteStore>) -> Self {
        let sessions = Arc::new(SessionRegistry {
            store: Arc::clone(&store),
            listing: config.listing.clone(),
            sessions: Mutex::new(HashMap::new()),
        });
        let guard = Arc::new(UploadGuardStore::new(config.guard.window()));
        let transfers = TransferManager::new(Arc::clone(&store), guard)
            .with_limits(config.limits.clone())
            .with_settings(&config.transfer)
            .with_observer(Arc::clone(&sessions) as Arc<dyn TransferObserver>);
        Self {
            config,
            store,
            transfers,
            sessions,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn RemoteStore> {
        &self.store
    }

    pub fn transfers(&self) -> &TransferManager {
        &self.transfers
    }

    /// Returns the browsing session for `(scope, category)`, opening it on
    /// first use.
    pub fn session(&self, scope: &str, category: &str) -> Arc<BrowserSession> {
        self.sessions.get_or_open(scope, category)
    }

    /// Starts an upload. When at least one file lands, the matching
    /// browsing session (if open) is refreshed before the handle resolves.
    pub async fn submit(
        &self,
        input: ScanSource,
        destination: DestinationContext,
    ) -> Result<TransferHandle, SubmitError> {
        self.transfers.submit(input, destination).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use filedeck_protocol::{
        BatchDeleteResponse, CompleteUploadRequest, FileListing, FileQuery, InitUploadRequest,
        InitUploadResponse, ObjectDescriptor, PartReceipt, RenameRequest, TreeListing, TreeQuery,
        UploadMode, UploadPartRequest,
    };
    use filedeck_store::{StoreError, StoreFuture};
    use filedeck_transfer::{MemoryFile, TransferSource};

    /// Accepts every upload directly and records browse requests.
    #[derive(Default)]
    struct MockStore {
        calls: Mutex<Vec<String>>,
        fail_uploads: Mutex<bool>,
    }

    impl MockStore {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl RemoteStore for MockStore {
        fn init_upload(&self, req: &InitUploadRequest) -> StoreFuture<'_, InitUploadResponse> {
            self.record(format!("init:{}", req.storage_key));
            let fail = *self.fail_uploads.lock().unwrap();
            Box::pin(async move {
                if fail {
                    return Err(StoreError::Rejected("disk full".into()));
                }
                Ok(InitUploadResponse {
                    transfer_id: "t1".into(),
                    mode: UploadMode::Direct,
                    upload_id: None,
                    part_size: None,
                    total_parts: None,
                })
            })
        }

        fn upload_part(
            &self,
            _req: &UploadPartRequest,
            _body: Vec<u8>,
        ) -> StoreFuture<'_, PartReceipt> {
            Box::pin(async { Err(StoreError::Rejected("unused".into())) })
        }

        fn upload_direct(
            &self,
            transfer_id: &str,
            filename: &str,
            _mime_type: &str,
            body: Vec<u8>,
        ) -> StoreFuture<'_, ObjectDescriptor> {
            self.record(format!("direct:{transfer_id}"));
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
            self.record("complete".into());
            let key = req.storage_key.clone();
            Box::pin(async move {
                Ok(ObjectDescriptor {
                    id: Some(7),
                    storage_key: key,
                    filename: "stored".into(),
                    filesize: 0,
                    url: None,
                })
            })
        }

        fn list_tree(&self, query: &TreeQuery) -> StoreFuture<'_, TreeListing> {
            self.record(format!("tree:{}:{}", query.category, query.parent_path));
            Box::pin(async { Ok(TreeListing::default()) })
        }

        fn list_files(&self, query: &FileQuery) -> StoreFuture<'_, FileListing> {
            self.record(format!("files:{}:{}", query.category, query.folder_path));
            Box::pin(async { Ok(FileListing::default()) })
        }

        fn delete_file(&self, file_id: i64) -> StoreFuture<'_, ()> {
            self.record(format!("delete:{file_id}"));
            Box::pin(async { Ok(()) })
        }

        fn batch_delete(&self, ids: &[i64]) -> StoreFuture<'_, BatchDeleteResponse> {
            let deleted_count = ids.len() as u64;
            Box::pin(async move { Ok(BatchDeleteResponse { deleted_count }) })
        }

        fn rename(&self, _req: &RenameRequest) -> StoreFuture<'_, ()> {
            Box::pin(async { Ok(()) })
        }
    }

    fn engine(store: &Arc<MockStore>) -> Engine {
        Engine::with_store(EngineConfig::default(), store.clone())
    }

    fn pasted(name: &str) -> ScanSource {
        let file: Arc<dyn TransferSource> = Arc::new(MemoryFile::new(name, b"hello".to_vec(), 3));
        ScanSource::ClipboardItems(vec![file])
    }

    #[tokio::test]
    async fn sessions_are_shared_per_scope_and_category() {
        let store = Arc::new(MockStore::default());
        let engine = engine(&store);

        let a = engine.session("42", "client_material");
        let b = engine.session("42", "client_material");
        let c = engine.session("42", "internal_solution");

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[tokio::test]
    async fn successful_upload_refreshes_open_session() {
        let store = Arc::new(MockStore::default());
        let engine = engine(&store);
        let session = engine.session("42", "client_material");
        session.open_folder("inbox").await.unwrap();
        let before = store.calls().len();

        let summary = engine
            .submit(
                pasted("a.txt"),
                DestinationContext::new("42", "client_material", "inbox"),
            )
            .await
            .unwrap()
            .wait()
            .await;
        assert_eq!(summary.succeeded, 1);

        let after: Vec<_> = store.calls().split_off(before);
        assert_eq!(
            after,
            vec![
                "init:inbox/a.txt",
                "direct:t1",
                "complete",
                "tree:client_material:",
                "tree:client_material:inbox",
                "files:client_material:inbox",
            ]
        );
    }

    #[tokio::test]
    async fn failed_upload_leaves_sessions_alone() {
        let store = Arc::new(MockStore::default());
        *store.fail_uploads.lock().unwrap() = true;
        let engine = engine(&store);
        engine.session("42", "client_material");

        let summary = engine
            .submit(
                pasted("a.txt"),
                DestinationContext::new("42", "client_material", ""),
            )
            .await
            .unwrap()
            .wait()
            .await;

        assert_eq!(summary.failed_count(), 1);
        assert!(!store.calls().iter().any(|c| c.starts_with("tree:")));
    }

    #[tokio::test]
    async fn other_category_is_not_refreshed() {
        let store = Arc::new(MockStore::default());
        let engine = engine(&store);
        engine.session("42", "internal_solution");

        engine
            .submit(
                pasted("a.txt"),
                DestinationContext::new("42", "client_material", ""),
            )
            .await
            .unwrap()
            .wait()
            .await;

        assert!(!store.calls().iter().any(|c| c.starts_with("files:")));
    }

    #[tokio::test]
    async fn delete_refreshes_tree_and_listing() {
        let store = Arc::new(MockStore::default());
        let engine = engine(&store);
        let session = engine.session("42", "client_material");

        session.delete_file(9).await.unwrap();

        assert_eq!(
            store.calls(),
            vec!["delete:9", "files:client_material:", "tree:client_material:"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn guard_window_comes_from_config() {
        let store = Arc::new(MockStore::default());
        let mut config = EngineConfig::default();
        config.guard.window_ms = 1000;
        let engine = Engine::with_store(config, store.clone());
        let guard = engine.transfers().guard();

        guard.arm("t", "s");
        tokio::time::advance(Duration::from_millis(1500)).await;
        assert!(!guard.should_skip("t", "s"));
    }

    #[test]
    fn http_engine_builds_from_config() {
        let engine = Engine::new(EngineConfig::default()).unwrap();
        assert_eq!(engine.config().listing.page_size, 10);
    }
}
