//! Paginated file listing with folder, keyword and selection state.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use filedeck_protocol::{FileQuery, FileRecord, RenameRequest, RenameTarget};
use filedeck_store::RemoteStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::BrowserError;

/// Listing tunables, as stored in the engine config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingSettings {
    pub page_size: u32,
    /// Quiet period before a keyword change triggers a reload.
    pub search_debounce_ms: u64,
}

impl Default for ListingSettings {
    fn default() -> Self {
        Self {
            page_size: 10,
            search_debounce_ms: 300,
        }
    }
}

/// Read-only copy of the listing state for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingSnapshot {
    pub folder_path: String,
    pub include_descendants: bool,
    pub keyword: String,
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub items: Vec<FileRecord>,
    pub selected: Vec<i64>,
    pub loading: bool,
    pub last_error: Option<String>,
}

struct ListingState {
    folder_path: String,
    include_descendants: bool,
    keyword: String,
    page: u32,
    page_size: u32,
    total: u64,
    items: Vec<FileRecord>,
    selected: BTreeSet<i64>,
    /// Ids seen per page in the current folder/keyword/mode context.
    page_ids: HashMap<u32, HashSet<i64>>,
    loading: bool,
    last_error: Option<String>,
    /// Only the response of the latest request is applied.
    generation: u64,
}

impl ListingState {
    fn total_pages(&self) -> u32 {
        if self.total == 0 || self.page_size == 0 {
            return 1;
        }
        let pages = self.total.div_ceil(u64::from(self.page_size));
        u32::try_from(pages).unwrap_or(u32::MAX).max(1)
    }

    /// Starts a new context: page 1, forget the pages seen so far.
    fn reset_context(&mut self) {
        self.page = 1;
        self.page_ids.clear();
    }

    fn prune_selection(&mut self) {
        let known: HashSet<i64> = self.page_ids.values().flatten().copied().collect();
        self.selected.retain(|id| known.contains(id));
    }
}

/// File list of one `(scope, category)` pair.
pub struct ListingView {
    store: Arc<dyn RemoteStore>,
    scope: String,
    category: String,
    debounce: Duration,
    keyword_generation: AtomicU64,
    state: Mutex<ListingState>,
}

impl ListingView {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        scope: impl Into<String>,
        category: impl Into<String>,
        settings: &ListingSettings,
    ) -> Self {
        Self {
            store,
            scope: scope.into(),
            category: category.into(),
            debounce: Duration::from_millis(settings.search_debounce_ms),
            keyword_generation: AtomicU64::new(0),
            state: Mutex::new(ListingState {
                folder_path: String::new(),
                include_descendants: true,
                keyword: String::new(),
                page: 1,
                page_size: settings.page_size.max(1),
                total: 0,
                items: Vec::new(),
                selected: BTreeSet::new(),
                page_ids: HashMap::new(),
                loading: false,
                last_error: None,
                generation: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ListingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> ListingSnapshot {
        let s = self.lock();
        ListingSnapshot {
            folder_path: s.folder_path.clone(),
            include_descendants: s.include_descendants,
            keyword: s.keyword.clone(),
            page: s.page,
            page_size: s.page_size,
            total: s.total,
            items: s.items.clone(),
            selected: s.selected.iter().copied().collect(),
            loading: s.loading,
            last_error: s.last_error.clone(),
        }
    }

    pub fn folder_path(&self) -> String {
        self.lock().folder_path.clone()
    }

    pub fn total_pages(&self) -> u32 {
        self.lock().total_pages()
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    /// Pager text, e.g. `page 2 / 5 · 48 files`.
    pub fn page_info(&self) -> String {
        let s = self.lock();
        format!("page {} / {} · {} files", s.page, s.total_pages(), s.total)
    }

    /// Loads the current page. A response that arrives after a newer
    /// request was issued is dropped. On failure the previous items stay.
    /// When the total shrank below the current page, the last page is
    /// loaded instead.
    pub async fn reload(&self) -> Result<(), BrowserError> {
        if self.load_page().await? {
            self.load_page().await?;
        }
        Ok(())
    }

    /// One listing request. Returns `true` when the page had to be clamped
    /// and nothing was applied.
    async fn load_page(&self) -> Result<bool, BrowserError> {
        let (generation, query) = {
            let mut s = self.lock();
            s.generation += 1;
            s.loading = true;
            (
                s.generation,
                FileQuery {
                    scope: self.scope.clone(),
                    category: self.category.clone(),
                    folder_path: s.folder_path.clone(),
                    include_children: s.include_descendants,
                    keyword: s.keyword.clone(),
                    page: s.page,
                    page_size: s.page_size,
                },
            )
        };
        debug!(
            folder = %query.folder_path,
            page = query.page,
            keyword = %query.keyword,
            "loading file list"
        );
        let result = self.store.list_files(&query).await;

        let mut s = self.lock();
        if s.generation != generation {
            debug!(generation, "stale listing response dropped");
            return Ok(false);
        }
        s.loading = false;
        match result {
            Ok(listing) => {
                if listing.pagination.page > 0 {
                    s.page = listing.pagination.page;
                }
                s.total = listing.pagination.total;
                let last = s.total_pages();
                if s.page > last {
                    debug!(page = s.page, last, "page past the end, clamping");
                    s.page = last;
                    return Ok(true);
                }
                let page = s.page;
                s.page_ids
                    .insert(page, listing.items.iter().map(|f| f.id).collect());
                s.items = listing.items;
                s.last_error = None;
                s.prune_selection();
                debug!(items = s.items.len(), total = s.total, "file list loaded");
                Ok(false)
            }
            Err(source) => {
                warn!(error = %source, "file list fetch failed");
                s.last_error = Some(source.to_string());
                Err(BrowserError::ListingFetchFailed { source })
            }
        }
    }

    /// Switches folder, back to page 1, and reloads.
    pub async fn set_folder(&self, path: &str) -> Result<(), BrowserError> {
        {
            let mut s = self.lock();
            s.folder_path = path.trim_matches('/').to_string();
            s.reset_context();
        }
        self.reload().await
    }

    /// Applies `text` as the keyword after the debounce period, unless a
    /// newer keyword arrived meanwhile. Returns whether a reload ran.
    pub async fn set_keyword(&self, text: &str) -> Result<bool, BrowserError> {
        let ticket = self.keyword_generation.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.debounce).await;
        if self.keyword_generation.load(Ordering::SeqCst) != ticket {
            return Ok(false);
        }
        {
            let mut s = self.lock();
            s.keyword = text.trim().to_string();
            s.reset_context();
        }
        self.reload().await?;
        Ok(true)
    }

    /// Toggles descendant aggregation. No-op when unchanged.
    pub async fn set_include_descendants(&self, include: bool) -> Result<bool, BrowserError> {
        {
            let mut s = self.lock();
            if s.include_descendants == include {
                return Ok(false);
            }
            s.include_descendants = include;
            s.reset_context();
        }
        self.reload().await?;
        Ok(true)
    }

    /// Moves `delta` pages. Out of `[1, total_pages]` it does nothing and
    /// returns `false`.
    pub async fn change_page(&self, delta: i32) -> Result<bool, BrowserError> {
        {
            let mut s = self.lock();
            let target = i64::from(s.page) + i64::from(delta);
            if delta == 0 || target < 1 || target > i64::from(s.total_pages()) {
                return Ok(false);
            }
            s.page = target as u32;
        }
        self.reload().await?;
        Ok(true)
    }

    /// Flips selection of `id`; returns whether it is now selected.
    pub fn toggle_selection(&self, id: i64) -> bool {
        let mut s = self.lock();
        if s.selected.remove(&id) {
            false
        } else {
            s.selected.insert(id);
            true
        }
    }

    /// Selects every item of the current page.
    pub fn select_all(&self) {
        let mut s = self.lock();
        let ids: Vec<i64> = s.items.iter().map(|f| f.id).collect();
        s.selected.extend(ids);
    }

    pub fn clear_selection(&self) {
        self.lock().selected.clear();
    }

    pub fn selected_ids(&self) -> Vec<i64> {
        self.lock().selected.iter().copied().collect()
    }

    pub async fn delete_file(&self, id: i64) -> Result<(), BrowserError> {
        self.store.delete_file(id).await?;
        info!(file_id = id, "file deleted");
        self.lock().selected.remove(&id);
        self.reload().await
    }

    /// Deletes every selected file in one request and reloads. Returns the
    /// number the backend reports deleted; nothing selected means no request.
    pub async fn delete_selected(&self) -> Result<u64, BrowserError> {
        let ids = self.selected_ids();
        if ids.is_empty() {
            return Ok(0);
        }
        let resp = self.store.batch_delete(&ids).await?;
        info!(requested = ids.len(), deleted = resp.deleted_count, "batch delete");
        self.clear_selection();
        self.reload().await?;
        Ok(resp.deleted_count)
    }

    /// Renames a file or folder and reloads.
    pub async fn rename(&self, target: RenameTarget, new_name: &str) -> Result<(), BrowserError> {
        let new_name = new_name.trim();
        if new_name.is_empty() || new_name.contains('/') || new_name.contains('\\') {
            return Err(BrowserError::InvalidName(new_name.to_string()));
        }
        self.store
            .rename(&RenameRequest {
                target,
                new_name: new_name.to_string(),
            })
            .await?;
        self.reload().await
    }
}
