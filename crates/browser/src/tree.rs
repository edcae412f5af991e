//! Client-side mirror of a remote folder hierarchy.
//!
//! Nodes live in one flat index keyed by full path; parents refer to
//! children by path. Each node is fetched on demand and replaced wholesale
//! by the response. Expand/collapse is tracked separately from load state.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use filedeck_protocol::{Breadcrumb, FolderStats, TreeListing, TreeQuery};
use filedeck_store::RemoteStore;
use tracing::{debug, warn};

use crate::BrowserError;

/// Load state of a node's children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Unfetched,
    Loading,
    Loaded,
}

/// One folder in the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    /// Empty for the root.
    pub full_path: String,
    pub parent_path: Option<String>,
    pub label: String,
    pub has_children: bool,
    /// Child paths in backend order.
    pub children: Vec<String>,
    pub load_state: LoadState,
    pub stats: FolderStats,
    pub breadcrumbs: Vec<Breadcrumb>,
}

impl TreeNode {
    fn placeholder(path: &str, root_label: &str) -> Self {
        Self {
            full_path: path.to_string(),
            parent_path: parent_path(path),
            label: path_label(path, root_label),
            // Unknown until fetched; the root is assumed to have content.
            has_children: true,
            children: Vec::new(),
            load_state: LoadState::Unfetched,
            stats: FolderStats::default(),
            breadcrumbs: fallback_breadcrumbs(path, root_label),
        }
    }

    pub fn children_loaded(&self) -> bool {
        self.load_state == LoadState::Loaded
    }
}

/// A node flattened for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeRow {
    pub full_path: String,
    pub label: String,
    pub depth: usize,
    pub expanded: bool,
    pub has_children: bool,
    pub loading: bool,
    pub stats: FolderStats,
}

struct TreeState {
    nodes: HashMap<String, TreeNode>,
    expanded: HashSet<String>,
    /// Generation of the fetch allowed to write each node.
    in_flight: HashMap<String, u64>,
    /// Nodes whose children arrived at least once.
    settled: HashSet<String>,
    next_generation: u64,
}

/// Lazily-loaded folder tree for one `(scope, category)` pair.
pub struct FileTree {
    store: Arc<dyn RemoteStore>,
    scope: String,
    category: String,
    root_label: String,
    state: Mutex<TreeState>,
}

impl FileTree {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        scope: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        let category = category.into();
        Self::with_root_label(store, scope, category.clone(), category)
    }

    /// Like [`FileTree::new`] with a display label for the root node.
    pub fn with_root_label(
        store: Arc<dyn RemoteStore>,
        scope: impl Into<String>,
        category: impl Into<String>,
        root_label: impl Into<String>,
    ) -> Self {
        let root_label = root_label.into();
        let mut nodes = HashMap::new();
        nodes.insert(String::new(), TreeNode::placeholder("", &root_label));
        Self {
            store,
            scope: scope.into(),
            category: category.into(),
            root_label,
            state: Mutex::new(TreeState {
                nodes,
                expanded: HashSet::from([String::new()]),
                in_flight: HashMap::new(),
                settled: HashSet::new(),
                next_generation: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TreeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    /// Fetches the children of `path`.
    ///
    /// Returns `Ok(false)` without a request while the same path is already
    /// loading, and also when a newer forced fetch superseded this one.
    pub async fn fetch_node(&self, path: &str) -> Result<bool, BrowserError> {
        self.fetch(path, false).await
    }

    /// Refetches `path` even if a fetch is in flight; the older response is
    /// discarded when it arrives.
    pub async fn refresh_node(&self, path: &str) -> Result<bool, BrowserError> {
        self.fetch(path, true).await
    }

    async fn fetch(&self, path: &str, force: bool) -> Result<bool, BrowserError> {
        let path = normalize(path);
        let generation = {
            let mut state = self.lock();
            if !force && state.in_flight.contains_key(&path) {
                debug!(path = %path, "tree fetch coalesced");
                return Ok(false);
            }
            state.next_generation += 1;
            let generation = state.next_generation;
            state.in_flight.insert(path.clone(), generation);
            let root_label = self.root_label.clone();
            let node = state
                .nodes
                .entry(path.clone())
                .or_insert_with(|| TreeNode::placeholder(&path, &root_label));
            node.load_state = LoadState::Loading;
            generation
        };

        let query = TreeQuery {
            scope: self.scope.clone(),
            category: self.category.clone(),
            parent_path: path.clone(),
        };
        debug!(path = %path, generation, "fetching tree node");
        let result = self.store.list_tree(&query).await;

        let mut state = self.lock();
        if state.in_flight.get(&path) != Some(&generation) {
            debug!(path = %path, generation, "stale tree response dropped");
            return Ok(false);
        }
        state.in_flight.remove(&path);

        match result {
            Ok(listing) => {
                self.apply(&mut state, &path, listing);
                Ok(true)
            }
            Err(source) => {
                warn!(path = %path, error = %source, "tree fetch failed");
                let settled = if state.settled.contains(&path) {
                    LoadState::Loaded
                } else {
                    LoadState::Unfetched
                };
                if let Some(node) = state.nodes.get_mut(&path) {
                    node.load_state = settled;
                }
                Err(BrowserError::TreeFetchFailed { path, source })
            }
        }
    }

    fn apply(&self, state: &mut TreeState, path: &str, listing: TreeListing) {
        state.settled.insert(path.to_string());
        let mut child_paths = Vec::with_capacity(listing.children.len());
        for child in listing.children {
            let child_path = normalize(&child.full_path);
            let label = if child.label.is_empty() {
                path_label(&child_path, &self.root_label)
            } else {
                child.label
            };
            let node = state
                .nodes
                .entry(child_path.clone())
                .or_insert_with(|| TreeNode::placeholder(&child_path, &self.root_label));
            node.parent_path = Some(path.to_string());
            node.label = label;
            node.has_children = child.has_children;
            node.stats = child.stats;
            node.breadcrumbs = fallback_breadcrumbs(&child_path, &self.root_label);
            child_paths.push(child_path);
        }

        let root_label = &self.root_label;
        let node = state
            .nodes
            .entry(path.to_string())
            .or_insert_with(|| TreeNode::placeholder(path, root_label));
        match listing.node {
            Some(info) => {
                node.has_children = info.has_children;
                node.stats = info.stats;
                node.breadcrumbs = info
                    .breadcrumbs
                    .filter(|b| !b.is_empty())
                    .unwrap_or_else(|| fallback_breadcrumbs(path, root_label));
            }
            None => {
                node.has_children = !child_paths.is_empty();
                node.breadcrumbs = fallback_breadcrumbs(path, root_label);
            }
        }
        node.children = child_paths;
        node.load_state = LoadState::Loaded;
        debug!(path = %path, children = node.children.len(), "tree node loaded");
    }

    /// Expands every node from the root down to `path`, fetching, in order,
    /// each one whose children are not loaded yet.
    pub async fn ensure_expanded_path(&self, path: &str) -> Result<(), BrowserError> {
        let chain = ancestor_chain(&normalize(path));
        for prefix in &chain {
            let loaded = self
                .lock()
                .nodes
                .get(prefix)
                .is_some_and(TreeNode::children_loaded);
            if !loaded {
                self.fetch_node(prefix).await?;
            }
        }
        let mut state = self.lock();
        state.expanded.extend(chain);
        Ok(())
    }

    /// Flips expand/collapse of `path`. Expanding an unfetched node fetches
    /// it. Returns the new expanded state.
    pub async fn toggle(&self, path: &str) -> Result<bool, BrowserError> {
        let path = normalize(path);
        let needs_fetch = {
            let mut state = self.lock();
            if state.expanded.remove(&path) {
                return Ok(false);
            }
            state.expanded.insert(path.clone());
            state
                .nodes
                .get(&path)
                .is_none_or(|n| n.load_state == LoadState::Unfetched)
        };
        if needs_fetch {
            self.fetch_node(&path).await?;
        }
        Ok(true)
    }

    /// Refetches the root and `current_folder`, overriding in-flight fetches.
    pub async fn refresh_all(&self, current_folder: &str) -> Result<(), BrowserError> {
        let current = normalize(current_folder);
        self.refresh_node("").await?;
        if !current.is_empty() {
            self.refresh_node(&current).await?;
        }
        Ok(())
    }

    pub fn node(&self, path: &str) -> Option<TreeNode> {
        self.lock().nodes.get(&normalize(path)).cloned()
    }

    pub fn is_expanded(&self, path: &str) -> bool {
        self.lock().expanded.contains(&normalize(path))
    }

    pub fn is_loading(&self, path: &str) -> bool {
        self.lock().in_flight.contains_key(&normalize(path))
    }

    /// Breadcrumbs of `path`: the backend's when known, else derived.
    pub fn breadcrumbs(&self, path: &str) -> Vec<Breadcrumb> {
        let path = normalize(path);
        self.lock()
            .nodes
            .get(&path)
            .map(|n| n.breadcrumbs.clone())
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| fallback_breadcrumbs(&path, &self.root_label))
    }

    /// Depth-first flattening of the expanded part of the tree, root first.
    pub fn visible_rows(&self) -> Vec<TreeRow> {
        let state = self.lock();
        let mut rows = Vec::new();
        let mut stack = vec![(String::new(), 0usize)];
        while let Some((path, depth)) = stack.pop() {
            let Some(node) = state.nodes.get(&path) else {
                continue;
            };
            let expanded = state.expanded.contains(&path);
            rows.push(TreeRow {
                full_path: path.clone(),
                label: node.label.clone(),
                depth,
                expanded,
                has_children: node.has_children,
                loading: state.in_flight.contains_key(&path),
                stats: node.stats,
            });
            if expanded {
                for child in node.children.iter().rev() {
                    stack.push((child.clone(), depth + 1));
                }
            }
        }
        rows
    }
}

/// Derived breadcrumbs: the root, then one crumb per path prefix.
pub fn fallback_breadcrumbs(path: &str, root_label: &str) -> Vec<Breadcrumb> {
    let mut crumbs = vec![Breadcrumb {
        label: root_label.to_string(),
        full_path: String::new(),
    }];
    let mut current = String::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if !current.is_empty() {
            current.push('/');
        }
        current.push_str(segment);
        crumbs.push(Breadcrumb {
            label: segment.to_string(),
            full_path: current.clone(),
        });
    }
    crumbs
}

/// `""` for top-level folders, `None` for the root.
pub fn parent_path(path: &str) -> Option<String> {
    if path.is_empty() {
        return None;
    }
    Some(
        path.rsplit_once('/')
            .map(|(parent, _)| parent.to_string())
            .unwrap_or_default(),
    )
}

fn path_label(path: &str, root_label: &str) -> String {
    if path.is_empty() {
        return root_label.to_string();
    }
    path.rsplit('/').next().unwrap_or(path).to_string()
}

/// `"a/b"` → `["", "a", "a/b"]`.
fn ancestor_chain(path: &str) -> Vec<String> {
    let mut chain = vec![String::new()];
    let mut current = String::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if !current.is_empty() {
            current.push('/');
        }
        current.push_str(segment);
        chain.push(current.clone());
    }
    chain
}

fn normalize(path: &str) -> String {
    path.split('/')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}
