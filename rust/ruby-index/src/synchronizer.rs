//! Keeps the index in sync with the workspace.
//!
//! The `Synchronizer` owns the shared [`Index`] behind a single `RwLock`. Every mutation (a bulk pass, an unsaved
//! buffer, a batch of file watcher events) replaces one file at a time under the write lock, so a reader sees each file
//! either entirely before or entirely after its update. Readers that run during the initial indexing get whatever has
//! been merged so far.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};
use std::thread::{self, JoinHandle};

use url::Url;

use crate::config::IndexingConfig;
use crate::errors::Errors;
use crate::indexing::{self, IndexingSummary};
use crate::listing;
use crate::model::index::Index;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexingState {
    Indexing,
    Ready,
    /// The initial indexing died. Holds the message reported to the user
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChangeKind {
    Created,
    Changed,
    Deleted,
}

/// One file watcher event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub uri: String,
    pub kind: FileChangeKind,
}

impl FileChange {
    #[must_use]
    pub fn new(uri: impl Into<String>, kind: FileChangeKind) -> Self {
        Self { uri: uri.into(), kind }
    }
}

pub struct Synchronizer {
    index: Arc<RwLock<Index>>,
    config: Arc<IndexingConfig>,
    state: Arc<RwLock<IndexingState>>,
}

impl Synchronizer {
    #[must_use]
    pub fn new(config: IndexingConfig) -> Self {
        Self {
            index: Arc::new(RwLock::new(Index::new())),
            config: Arc::new(config),
            state: Arc::new(RwLock::new(IndexingState::Ready)),
        }
    }

    #[must_use]
    pub fn config(&self) -> &IndexingConfig {
        &self.config
    }

    /// Shared handle to the index, for components that outlive a single read
    #[must_use]
    pub fn index(&self) -> Arc<RwLock<Index>> {
        Arc::clone(&self.index)
    }

    /// Locks the index for reading. Writers wait until the guard is dropped
    pub fn read(&self) -> RwLockReadGuard<'_, Index> {
        self.index.read().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn state(&self) -> IndexingState {
        self.state.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    #[must_use]
    pub fn is_indexing(&self) -> bool {
        self.state() == IndexingState::Indexing
    }

    /// Lists the Ruby files under `paths` and indexes all of them. Listing problems are returned, per file indexing
    /// failures are counted in the summary
    pub fn index_all(&self, paths: Vec<String>) -> (IndexingSummary, Vec<Errors>) {
        index_workspace(&self.index, &self.config, paths)
    }

    /// Indexes the unsaved contents of `uri`, replacing what the file contributed before
    pub fn index_source(&self, uri: &str, source: &str) {
        let local_index = indexing::collect_source(uri.to_string(), source, self.config.tolerate_parse_errors);

        self.index
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .index_single(local_index);
    }

    /// Removes everything `uri` contributed. Returns whether the file was indexed
    pub fn delete(&self, uri: &str) -> bool {
        self.index.write().unwrap_or_else(PoisonError::into_inner).delete(uri)
    }

    /// Applies a batch of file watcher events.
    ///
    /// Events for the same URI are collapsed into the last one. Events for directories, for files that aren't Ruby or
    /// are excluded by the configuration, and for URIs that aren't local files are ignored.
    pub fn handle_file_changes(&self, changes: Vec<FileChange>) -> IndexingSummary {
        let mut order: Vec<String> = Vec::new();
        let mut latest: HashMap<String, FileChangeKind> = HashMap::new();

        for change in changes {
            if latest.insert(change.uri.clone(), change.kind).is_none() {
                order.push(change.uri);
            }
        }

        let mut summary = IndexingSummary::default();
        let mut to_index: Vec<PathBuf> = Vec::new();

        for uri in order {
            let Some(kind) = latest.get(&uri) else {
                continue;
            };

            let Some(path) = self.watched_path(&uri) else {
                tracing::debug!(uri = %uri, "ignoring file change");
                continue;
            };

            match kind {
                FileChangeKind::Deleted => {
                    if self.delete(&uri) {
                        summary.deleted += 1;
                    }
                }
                FileChangeKind::Created | FileChangeKind::Changed => to_index.push(path),
            }
        }

        if !to_index.is_empty() {
            summary.merge(indexing::index_files(&self.index, to_index, &self.config));
        }

        summary
    }

    /// The local path of `uri` if changes to it affect the index
    fn watched_path(&self, uri: &str) -> Option<PathBuf> {
        let path = Url::parse(uri).ok()?.to_file_path().ok()?;

        // TODO: re-list the directory on directory events so files moved in or out with it are picked up
        if path.is_dir() || !listing::is_ruby_file(&path) || self.config.is_excluded(&path) {
            return None;
        }

        Some(path)
    }

    /// Indexes `paths` on a background thread. The state is `Indexing` until it finishes, then `Ready`. A panic during
    /// the pass is reported once through `IndexingState::Failed`
    pub fn spawn_initial_indexing(&self, paths: Vec<String>) -> JoinHandle<()> {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = IndexingState::Indexing;

        let index = Arc::clone(&self.index);
        let config = Arc::clone(&self.config);
        let state = Arc::clone(&self.state);

        thread::spawn(move || {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                index_workspace(&index, &config, paths)
            }));

            let next = match result {
                Ok((summary, errors)) => {
                    tracing::info!(
                        indexed = summary.indexed,
                        failed = summary.failed,
                        listing_errors = errors.len(),
                        "initial indexing finished"
                    );
                    IndexingState::Ready
                }
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<String>()
                        .map(String::as_str)
                        .or_else(|| panic.downcast_ref::<&str>().copied())
                        .unwrap_or("unknown error");
                    tracing::error!(error = message, "initial indexing failed");
                    IndexingState::Failed(format!("Indexing failed: {message}"))
                }
            };

            *state.write().unwrap_or_else(PoisonError::into_inner) = next;
        })
    }
}

fn index_workspace(
    index: &RwLock<Index>,
    config: &IndexingConfig,
    paths: Vec<String>,
) -> (IndexingSummary, Vec<Errors>) {
    let (file_paths, errors) = listing::collect_file_paths(paths, config);

    for error in &errors {
        tracing::warn!(error = %error, "failed to list path");
    }

    (indexing::index_files(index, file_paths, config), errors)
}

/// Builds the `file://` URI of a local path
///
/// # Errors
///
/// Returns `Errors::InvalidUri` if the path is not absolute
pub fn uri_for_path(path: &Path) -> Result<String, Errors> {
    Url::from_file_path(path)
        .map(|url| url.to_string())
        .map_err(|()| Errors::InvalidUri(format!("Couldn't build URI from path `{}`", path.display())))
}
