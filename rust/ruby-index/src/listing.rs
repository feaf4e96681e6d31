use crate::{
    config::IndexingConfig,
    errors::Errors,
    job_queue::{Job, JobQueue},
};
use crossbeam_channel::{Sender, unbounded};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

/// Walks one path of the workspace. Directories push one job per child so large trees are listed in parallel
pub struct FileDiscoveryJob {
    path: PathBuf,
    queue: Arc<JobQueue>,
    config: Arc<IndexingConfig>,
    paths_tx: Sender<PathBuf>,
    errors_tx: Sender<Errors>,
}

impl FileDiscoveryJob {
    #[must_use]
    pub fn new(
        path: PathBuf,
        queue: Arc<JobQueue>,
        config: Arc<IndexingConfig>,
        paths_tx: Sender<PathBuf>,
        errors_tx: Sender<Errors>,
    ) -> Self {
        Self {
            path,
            queue,
            config,
            paths_tx,
            errors_tx,
        }
    }

    fn child(&self, path: PathBuf) -> Self {
        Self::new(
            path,
            Arc::clone(&self.queue),
            Arc::clone(&self.config),
            self.paths_tx.clone(),
            self.errors_tx.clone(),
        )
    }

    fn handle_file(&self, path: &Path) {
        if is_ruby_file(path) && !self.config.is_excluded(path) {
            // The receiver only goes away once the queue is done, so a failed send can't lose anything
            let _ = self.paths_tx.send(path.to_path_buf());
        }
    }

    fn handle_symlink(&self, path: &Path) {
        let Ok(canonicalized) = fs::canonicalize(path) else {
            self.send_error(Errors::FileError(format!(
                "Failed to canonicalize symlink: `{}`",
                path.display(),
            )));

            return;
        };

        self.queue.push(Box::new(self.child(canonicalized)));
    }

    fn send_error(&self, error: Errors) {
        let _ = self.errors_tx.send(error);
    }
}

impl Job for FileDiscoveryJob {
    fn run(&self) {
        if self.config.is_excluded(&self.path) {
            return;
        }

        if self.path.is_dir() {
            let Ok(read_dir) = self.path.read_dir() else {
                self.send_error(Errors::FileError(format!(
                    "Failed to read directory `{}`",
                    self.path.display(),
                )));

                return;
            };

            for result in read_dir {
                let entry = match result {
                    Ok(entry) => entry,
                    Err(error) => {
                        self.send_error(Errors::FileError(format!(
                            "Failed to read directory `{}`: {error}",
                            self.path.display(),
                        )));

                        continue;
                    }
                };

                let Ok(kind) = entry.file_type() else {
                    self.send_error(Errors::FileError(format!(
                        "Failed to read the type of `{}`",
                        entry.path().display()
                    )));

                    continue;
                };

                if kind.is_dir() {
                    self.queue.push(Box::new(self.child(entry.path())));
                } else if kind.is_file() {
                    self.handle_file(&entry.path());
                } else if kind.is_symlink() {
                    self.handle_symlink(&entry.path());
                }
            }
        } else if self.path.is_file() {
            self.handle_file(&self.path);
        } else if self.path.is_symlink() {
            self.handle_symlink(&self.path);
        } else {
            self.send_error(Errors::FileError(format!(
                "Path `{}` is not a file or directory",
                self.path.display()
            )));
        }
    }
}

#[must_use]
pub fn is_ruby_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "rb")
}

/// Recursively collects the Ruby files under `paths` and under every path matched by the configured
/// `included_patterns`, skipping anything that matches an excluded pattern. Paths that don't exist and included
/// patterns that match nothing are reported as errors and the rest are still listed. The returned paths are sorted
/// and free of duplicates
#[must_use]
pub fn collect_file_paths(paths: Vec<String>, config: &IndexingConfig) -> (Vec<PathBuf>, Vec<Errors>) {
    let queue = Arc::new(JobQueue::new());
    let config = Arc::new(config.clone());
    let (files_tx, files_rx) = unbounded();
    let (errors_tx, errors_rx) = unbounded();

    let mut roots = paths;
    roots.extend(expand_included_patterns(&config.included_patterns, &errors_tx));

    for path in &roots {
        let Ok(canonicalized) = fs::canonicalize(path) else {
            let _ = errors_tx.send(Errors::FileError(format!("Path `{path}` does not exist")));
            continue;
        };

        queue.push(Box::new(FileDiscoveryJob::new(
            canonicalized,
            Arc::clone(&queue),
            Arc::clone(&config),
            files_tx.clone(),
            errors_tx.clone(),
        )));
    }

    JobQueue::run(&queue);

    drop(files_tx);
    drop(errors_tx);

    let mut files: Vec<PathBuf> = files_rx.iter().collect();
    files.sort();
    files.dedup();

    (files, errors_rx.iter().collect())
}

fn expand_included_patterns(patterns: &[String], errors_tx: &Sender<Errors>) -> Vec<String> {
    let mut roots = Vec::new();

    for pattern in patterns {
        let matches = match glob::glob(pattern) {
            Ok(matches) => matches,
            Err(error) => {
                let _ = errors_tx.send(Errors::ConfigError(format!("Invalid included pattern `{pattern}`: {error}")));
                continue;
            }
        };

        let before = roots.len();

        for entry in matches {
            match entry {
                Ok(path) => roots.push(path.to_string_lossy().into_owned()),
                Err(error) => {
                    let _ = errors_tx.send(Errors::FileError(format!("Failed to expand `{pattern}`: {error}")));
                }
            }
        }

        if roots.len() == before {
            let _ = errors_tx.send(Errors::FileError(format!("Included pattern `{pattern}` matched no paths")));
        }
    }

    roots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::Context;

    fn collect_document_paths(
        context: &Context,
        paths: &[&str],
        config: &IndexingConfig,
    ) -> (Vec<String>, Vec<Errors>) {
        let (files, errors) = collect_file_paths(
            paths
                .iter()
                .map(|p| context.absolute_path_to(p).to_string_lossy().into_owned())
                .collect(),
            config,
        );

        let files: Vec<String> = files
            .iter()
            .map(|path| context.relative_path_to(path).to_string_lossy().into_owned())
            .collect();

        (files, errors)
    }

    #[test]
    fn collect_all_documents() {
        let context = Context::new();
        let baz = PathBuf::from("bar").join("baz.rb");
        let qux = PathBuf::from("bar").join("qux.rb");
        let bar = PathBuf::from("foo").join("bar.rb");
        context.touch(&baz);
        context.touch(&qux);
        context.touch(&bar);
        context.touch("foo/README.md");

        let (files, errors) = collect_document_paths(&context, &["foo", "bar"], &IndexingConfig::default());

        assert!(errors.is_empty());

        assert_eq!(
            files,
            [
                baz.to_str().unwrap().to_string(),
                qux.to_str().unwrap().to_string(),
                bar.to_str().unwrap().to_string()
            ]
        );
    }

    #[test]
    fn collect_some_documents_based_on_paths() {
        let context = Context::new();
        let baz = PathBuf::from("bar").join("baz.rb");
        let qux = PathBuf::from("bar").join("qux.rb");
        let bar = PathBuf::from("foo").join("bar.rb");

        context.touch(&baz);
        context.touch(&qux);
        context.touch(&bar);

        let (files, errors) = collect_document_paths(&context, &["bar"], &IndexingConfig::default());

        assert!(errors.is_empty());

        assert_eq!(
            files,
            [baz.to_str().unwrap().to_string(), qux.to_str().unwrap().to_string()]
        );
    }

    #[test]
    fn collect_skips_excluded_patterns() {
        let context = Context::new();
        context.touch("lib/foo.rb");
        context.touch("lib/foo_spec.rb");
        context.touch("vendor/rack/rack.rb");
        context.touch("node_modules/pkg/cache.rb");

        let config = IndexingConfig::from_toml(
            "excluded_patterns = [\"**/vendor/**\", \"**/*_spec.rb\", \"**/node_modules/**\"]",
        )
        .unwrap();
        let (files, errors) = collect_document_paths(&context, &[""], &config);

        assert!(errors.is_empty());
        assert_eq!(files, [PathBuf::from("lib").join("foo.rb").to_str().unwrap().to_string()]);
    }

    #[test]
    fn collect_included_patterns() {
        let context = Context::new();
        context.touch("app/foo.rb");
        context.touch("gems/rack/rack.rb");

        let config = IndexingConfig {
            included_patterns: vec![context.absolute_path_to("gems").to_string_lossy().into_owned()],
            ..IndexingConfig::default()
        };
        let (files, errors) = collect_document_paths(&context, &["app"], &config);

        assert!(errors.is_empty());
        assert_eq!(
            files,
            [
                PathBuf::from("app").join("foo.rb").to_str().unwrap().to_string(),
                PathBuf::from("gems").join("rack").join("rack.rb").to_str().unwrap().to_string(),
            ]
        );
    }

    #[test]
    fn collect_globbed_included_patterns() {
        let context = Context::new();
        context.touch("app/foo.rb");
        context.touch("gems/rack/lib/rack.rb");
        context.touch("gems/rack/test/rack_test.rb");
        context.touch("gems/json/lib/json.rb");

        let gems = context.absolute_path_to("gems").to_string_lossy().into_owned();
        let config = IndexingConfig {
            included_patterns: vec![format!("{gems}/*/lib")],
            ..IndexingConfig::default()
        };
        let (files, errors) = collect_document_paths(&context, &["app"], &config);

        assert!(errors.is_empty());
        assert_eq!(
            files,
            [
                PathBuf::from("app").join("foo.rb").to_str().unwrap().to_string(),
                PathBuf::from("gems").join("json").join("lib").join("json.rb").to_str().unwrap().to_string(),
                PathBuf::from("gems").join("rack").join("lib").join("rack.rb").to_str().unwrap().to_string(),
            ]
        );
    }

    #[test]
    fn included_patterns_matching_nothing_are_reported() {
        let context = Context::new();
        context.touch("app/foo.rb");

        let gems = context.absolute_path_to("gems").to_string_lossy().into_owned();
        let config = IndexingConfig {
            included_patterns: vec![format!("{gems}/*/lib")],
            ..IndexingConfig::default()
        };
        let (files, errors) = collect_document_paths(&context, &["app"], &config);

        assert_eq!(files, [PathBuf::from("app").join("foo.rb").to_str().unwrap().to_string()]);
        assert_eq!(errors.len(), 1);
        assert!(matches!(&errors[0], Errors::FileError(message) if message.contains("matched no paths")));
    }

    #[test]
    fn collect_the_same_file_once() {
        let context = Context::new();
        context.touch("lib/foo.rb");

        let (files, _) = collect_document_paths(&context, &["lib", "lib/foo.rb"], &IndexingConfig::default());

        assert_eq!(files.len(), 1);
    }

    #[test]
    fn collect_non_existing_paths() {
        let context = Context::new();

        let (files, errors) = collect_file_paths(
            vec![
                context
                    .absolute_path_to("non_existing_path")
                    .to_string_lossy()
                    .into_owned(),
            ],
            &IndexingConfig::default(),
        );

        assert!(files.is_empty());

        assert_eq!(
            errors,
            [Errors::FileError(format!(
                "Path `{}` does not exist",
                context.absolute_path_to("non_existing_path").display()
            ))]
        );
    }
}
