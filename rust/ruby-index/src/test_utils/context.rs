use super::normalize_indentation;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[derive(Debug)]
pub struct Context {
    _root: TempDir,
    absolute_path: PathBuf,
}

/// Runs `f` with a fresh temporary workspace that is removed afterwards
pub fn with_context<F, R>(f: F) -> R
where
    F: FnOnce(&Context) -> R,
{
    let context = Context::new();
    f(&context)
}

impl Context {
    /// Creates a workspace in a new temporary directory
    ///
    /// # Panics
    ///
    /// Panics if the temp directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("failed to create temp dir");
        let absolute_path = fs::canonicalize(root.path()).unwrap();
        Self {
            _root: root,
            absolute_path,
        }
    }

    /// The canonical path of the workspace root
    #[must_use]
    pub fn absolute_path(&self) -> PathBuf {
        self.absolute_path.clone()
    }

    /// Joins `relative` onto the workspace root
    #[must_use]
    pub fn absolute_path_to(&self, relative: &str) -> PathBuf {
        self.absolute_path.join(relative)
    }

    /// Returns the path of `absolute` relative to the context root.
    ///
    /// # Panics
    ///
    /// Panics if the provided path cannot be canonicalized or is not under the root.
    #[must_use]
    pub fn relative_path_to<P: AsRef<Path>>(&self, absolute: P) -> PathBuf {
        absolute
            .as_ref()
            .strip_prefix(self.absolute_path())
            .unwrap()
            .to_path_buf()
    }

    /// # Panics
    ///
    /// Panics if the directory cannot be created.
    pub fn mkdir<P: AsRef<Path>>(&self, relative: P) {
        let dir = self.absolute_path().join(relative);
        fs::create_dir_all(dir).unwrap();
    }

    /// Creates an empty file relative to the root
    pub fn touch<P: AsRef<Path>>(&self, relative: P) {
        self.write(relative, "");
    }

    /// Writes a Ruby source (or config file) relative to the root, creating parent directories as needed. The
    /// content's indentation is normalized first
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be created.
    pub fn write<P: AsRef<Path>>(&self, relative: P, content: &str) {
        let path = self.absolute_path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let content = normalize_indentation(content);
        fs::write(path, content).unwrap();
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
