//! Indexing configuration, read from an optional `.ruby-index.toml` at the workspace root.
//!
//! ```toml
//! excluded_patterns = ["**/vendor/**", "**/*_spec.rb"]
//! included_patterns = ["/opt/gems/*/lib"]
//! max_listed_namespaces = 1000
//! tolerate_parse_errors = true
//! ```

use std::fs;
use std::path::Path;

use glob::Pattern;
use serde::{Deserialize, Deserializer, de};

use crate::errors::Errors;

pub const CONFIG_FILE_NAME: &str = ".ruby-index.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexingConfig {
    /// Glob patterns matched against absolute file paths. Matching files are never indexed. Compiled once when the
    /// configuration is read
    #[serde(deserialize_with = "deserialize_patterns")]
    pub excluded_patterns: Vec<Pattern>,
    /// Glob patterns expanded into extra roots indexed together with the requested paths, such as
    /// `/opt/gems/*/lib` for dependency directories
    pub included_patterns: Vec<String>,
    /// Maximum number of namespaces returned by listings and by an empty search
    pub max_listed_namespaces: usize,
    /// Maximum number of entries returned by a non-empty search
    pub max_search_results: usize,
    /// Keep the entries of files that parse with errors instead of discarding them
    pub tolerate_parse_errors: bool,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            excluded_patterns: ["**/.git/**", "**/node_modules/**"]
                .into_iter()
                .filter_map(|pattern| Pattern::new(pattern).ok())
                .collect(),
            included_patterns: Vec::new(),
            max_listed_namespaces: 5000,
            max_search_results: 100,
            tolerate_parse_errors: false,
        }
    }
}

impl IndexingConfig {
    /// Parses a configuration from TOML, validating every glob pattern
    ///
    /// # Errors
    ///
    /// Returns `Errors::ConfigError` if the TOML is malformed or a pattern is not a valid glob
    pub fn from_toml(contents: &str) -> Result<Self, Errors> {
        let config: Self = toml::from_str(contents).map_err(|e| Errors::ConfigError(e.to_string()))?;

        for pattern in &config.included_patterns {
            Pattern::new(pattern)
                .map_err(|e| Errors::ConfigError(format!("Invalid included pattern `{pattern}`: {e}")))?;
        }

        Ok(config)
    }

    /// Reads the configuration at `path`
    ///
    /// # Errors
    ///
    /// Returns `Errors::ConfigError` if the file can't be read or parsed
    pub fn load(path: &Path) -> Result<Self, Errors> {
        let contents = fs::read_to_string(path)
            .map_err(|e| Errors::ConfigError(format!("Failed to read `{}`: {e}", path.display())))?;

        Self::from_toml(&contents)
    }

    /// Reads `<root>/.ruby-index.toml` if it exists, falling back to the defaults
    ///
    /// # Errors
    ///
    /// Returns `Errors::ConfigError` if the file exists but is invalid
    pub fn discover(root: &Path) -> Result<Self, Errors> {
        let path = root.join(CONFIG_FILE_NAME);

        if path.is_file() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    #[must_use]
    pub fn is_excluded(&self, path: &Path) -> bool {
        self.excluded_patterns.iter().any(|pattern| pattern.matches_path(path))
    }
}

fn deserialize_patterns<'de, D>(deserializer: D) -> Result<Vec<Pattern>, D::Error>
where
    D: Deserializer<'de>,
{
    Vec::<String>::deserialize(deserializer)?
        .iter()
        .map(|pattern| {
            Pattern::new(pattern)
                .map_err(|e| de::Error::custom(format!("Invalid excluded pattern `{pattern}`: {e}")))
        })
        .collect()
}
