use crate::{
    config::IndexingConfig,
    errors::Errors,
    indexing::{collector::Collector, local_index::LocalIndex},
    job_queue::{Job, JobQueue},
    model::index::Index,
};
use crossbeam_channel::{Sender, unbounded};
use std::sync::{PoisonError, RwLock};
use std::{fs, path::PathBuf, sync::Arc, thread};
use url::Url;

pub mod collector;
pub mod local_index;

/// Outcome of indexing a batch of files
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IndexingSummary {
    pub indexed: usize,
    pub failed: usize,
    pub deleted: usize,
    /// Files left alone because a newer version was stored while they were being read
    pub superseded: usize,
}

impl IndexingSummary {
    pub fn merge(&mut self, other: IndexingSummary) {
        self.indexed += other.indexed;
        self.failed += other.failed;
        self.deleted += other.deleted;
        self.superseded += other.superseded;
    }
}

/// Job that reads and collects a single Ruby file
pub struct IndexingFileJob {
    path: PathBuf,
    tolerate_parse_errors: bool,
    results_tx: Sender<Result<LocalIndex, Errors>>,
}

impl IndexingFileJob {
    #[must_use]
    pub fn new(path: PathBuf, tolerate_parse_errors: bool, results_tx: Sender<Result<LocalIndex, Errors>>) -> Self {
        Self {
            path,
            tolerate_parse_errors,
            results_tx,
        }
    }

    fn collect(&self) -> Result<LocalIndex, Errors> {
        let source = fs::read_to_string(&self.path)
            .map_err(|e| Errors::FileError(format!("Failed to read file `{}`: {e}", self.path.display())))?;

        let path = fs::canonicalize(&self.path)
            .map_err(|e| Errors::FileError(format!("Failed to canonicalize `{}`: {e}", self.path.display())))?;

        let url = Url::from_file_path(&path).map_err(|()| {
            Errors::InvalidUri(format!("Couldn't build URI from path `{}`", self.path.display()))
        })?;

        Ok(collect_source(url.to_string(), &source, self.tolerate_parse_errors))
    }
}

impl Job for IndexingFileJob {
    fn run(&self) {
        // The merging side drains until every job is gone, so the receiver outlives all sends
        let _ = self.results_tx.send(self.collect());
    }
}

/// Runs the collector over `source`, producing the entries `uri` contributes
#[must_use]
pub fn collect_source(uri: String, source: &str, tolerate_parse_errors: bool) -> LocalIndex {
    let mut collector = Collector::new(uri, source, tolerate_parse_errors);
    collector.collect();
    collector.local_index()
}

/// Indexes the given paths, reading their content from disk and replacing what each file previously contributed to
/// `index`.
///
/// Files are read and parsed in parallel on the job queue while this thread merges the results. The write lock is
/// taken once per file, so readers can run between two files and never see a file half replaced. A file that can't be
/// read, or whose job panics, is logged and counted as failed; the rest of the batch still completes. A file that
/// something else replaced or deleted after the batch started keeps that newer state and is counted as superseded.
pub fn index_files(index: &RwLock<Index>, paths: Vec<PathBuf>, config: &IndexingConfig) -> IndexingSummary {
    let started = index.read().unwrap_or_else(PoisonError::into_inner).generation();
    let queue = Arc::new(JobQueue::new());
    let (results_tx, results_rx) = unbounded();

    for path in paths {
        queue.push(Box::new(IndexingFileJob::new(
            path,
            config.tolerate_parse_errors,
            results_tx.clone(),
        )));
    }

    drop(results_tx);

    let mut summary = IndexingSummary::default();

    thread::scope(|scope| {
        scope.spawn(|| JobQueue::run(&queue));

        for result in &results_rx {
            match result {
                Ok(local_index) => {
                    let uri = local_index.document().uri().to_string();
                    let diagnostics = local_index.document().diagnostics().len();

                    let stored = index
                        .write()
                        .unwrap_or_else(PoisonError::into_inner)
                        .index_single_since(local_index, started);

                    if stored {
                        tracing::debug!(uri = %uri, diagnostics, "indexed file");
                        summary.indexed += 1;
                    } else {
                        tracing::debug!(uri = %uri, "skipped file replaced during the batch");
                        summary.superseded += 1;
                    }
                }
                Err(error) => {
                    tracing::warn!(error = %error, "failed to index file");
                    summary.failed += 1;
                }
            }
        }
    });

    summary.failed += queue.panicked_count();

    tracing::info!(
        indexed = summary.indexed,
        failed = summary.failed,
        superseded = summary.superseded,
        "finished indexing batch"
    );

    summary
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::test_utils::Context;
    use std::path::Path;

    #[test]
    fn index_relative_paths() {
        let relative_path = Path::new("foo").join("bar.rb");
        let context = Context::new();
        context.touch(&relative_path);

        let working_directory = std::env::current_dir().unwrap();
        let absolute_path = context.absolute_path_to("foo/bar.rb");

        let mut dots = PathBuf::from("..");

        for _ in 0..working_directory.components().count() - 1 {
            dots = dots.join("..");
        }

        let relative_to_pwd = &dots.join(absolute_path);

        let index = RwLock::new(Index::new());
        let summary = index_files(&index, vec![relative_to_pwd.clone()], &IndexingConfig::default());

        assert_eq!(summary, IndexingSummary { indexed: 1, ..IndexingSummary::default() });
        assert_eq!(index.read().unwrap().documents().len(), 1);
    }

    #[test]
    fn index_absolute_paths() {
        let context = Context::new();
        context.write("app/user.rb", "class User; def name; end; end");
        context.write("app/admin.rb", "class Admin < User; end");

        let index = RwLock::new(Index::new());
        let summary = index_files(
            &index,
            vec![context.absolute_path_to("app/user.rb"), context.absolute_path_to("app/admin.rb")],
            &IndexingConfig::default(),
        );

        assert_eq!(summary, IndexingSummary { indexed: 2, ..IndexingSummary::default() });

        let index = index.read().unwrap();
        assert_eq!(index.documents().len(), 2);
        assert_eq!(index.lookup("User").len(), 1);
        assert_eq!(index.resolve_method("name", "Admin").len(), 1);
    }

    #[test]
    fn missing_files_are_counted_and_the_batch_completes() {
        let context = Context::new();
        context.write("foo.rb", "class Foo; end");

        let index = RwLock::new(Index::new());
        let summary = index_files(
            &index,
            vec![context.absolute_path_to("missing.rb"), context.absolute_path_to("foo.rb")],
            &IndexingConfig::default(),
        );

        assert_eq!(summary.indexed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(index.read().unwrap().lookup("Foo").len(), 1);
    }

    #[test]
    fn reindexing_replaces_previous_contributions() {
        let context = Context::new();
        context.write("foo.rb", "class Foo; end");

        let index = RwLock::new(Index::new());
        let paths = vec![context.absolute_path_to("foo.rb")];
        index_files(&index, paths.clone(), &IndexingConfig::default());

        context.write("foo.rb", "class Bar; end");
        index_files(&index, paths, &IndexingConfig::default());

        let index = index.read().unwrap();
        assert!(index.lookup("Foo").is_empty());
        assert_eq!(index.lookup("Bar").len(), 1);
        assert_eq!(index.documents().len(), 1);
    }

    #[test]
    fn parse_errors_follow_the_configuration() {
        let context = Context::new();
        context.write("broken.rb", "class Foo\n  def bar\n");

        let index = RwLock::new(Index::new());
        let paths = vec![context.absolute_path_to("broken.rb")];

        index_files(&index, paths.clone(), &IndexingConfig::default());
        assert!(index.read().unwrap().lookup("Foo").is_empty());
        assert!(index.read().unwrap().diagnostics().count() > 0);

        let tolerant = IndexingConfig {
            tolerate_parse_errors: true,
            ..IndexingConfig::default()
        };
        index_files(&index, paths, &tolerant);
        assert_eq!(index.read().unwrap().lookup("Foo").len(), 1);
    }
}
