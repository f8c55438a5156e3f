//! Glob-based selection of the files a run is allowed to touch.

use crate::error::{Error, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;

/// Backups written by this tool are never fed back into the model.
const BACKUP_PATTERN: &str = "**/*.backup.*";

/// Configuration for file filtering with glob patterns.
///
/// Allows selective file and directory inclusion/exclusion during repository scanning.
#[derive(Debug, Clone, Default)]
pub struct FileFilterConfig {
    exclude_files: Vec<String>,
    exclude_all_files_except: Vec<String>,
    exclude_directories: Vec<String>,
}

impl FileFilterConfig {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Excludes files matching any of the patterns.
    #[must_use]
    pub fn exclude_files(mut self, patterns: Vec<String>) -> Self {
        self.exclude_files = patterns;
        self
    }

    /// Excludes every file below directories matching any of the patterns.
    #[must_use]
    pub fn exclude_directories(mut self, patterns: Vec<String>) -> Self {
        self.exclude_directories = patterns;
        self
    }

    /// Restricts the run to files matching at least one of the patterns.
    #[must_use]
    pub fn allow_only(mut self, patterns: Vec<String>) -> Self {
        self.exclude_all_files_except = patterns;
        self
    }
}

#[derive(Debug, Clone)]
pub(crate) struct FileFilter {
    exclude_files: GlobSet,
    include_files: Option<GlobSet>,
    exclude_directories: GlobSet,
}

impl FileFilter {
    /// Compiles the configured patterns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] for a malformed glob.
    pub(crate) fn new(config: &FileFilterConfig) -> Result<Self> {
        let mut exclude_files = config.exclude_files.clone();
        exclude_files.push(BACKUP_PATTERN.to_string());

        let include_files = if config.exclude_all_files_except.is_empty() {
            None
        } else {
            Some(Self::build_globset(&config.exclude_all_files_except)?)
        };

        Ok(Self {
            exclude_files: Self::build_globset(&exclude_files)?,
            include_files,
            exclude_directories: Self::build_globset(&config.exclude_directories)?,
        })
    }

    fn build_globset(patterns: &[String]) -> Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();

        for pattern in patterns {
            let glob = Glob::new(pattern)
                .map_err(|e| Error::invalid_pattern(pattern, e.to_string()))?;
            builder.add(glob);
        }

        builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build glob set: {e}")))
    }

    pub(crate) fn should_process(&self, path: &Path) -> bool {
        if let Some(ref include) = self.include_files {
            if !include.is_match(path) {
                return false;
            }
        }

        if self.exclude_directories.is_match(path) {
            return false;
        }

        for ancestor in path.ancestors().skip(1) {
            if self.exclude_directories.is_match(ancestor) {
                return false;
            }
        }

        !self.exclude_files.is_match(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_accepts_everything() {
        let filter = FileFilter::new(&FileFilterConfig::new()).unwrap();
        assert!(filter.should_process(Path::new("/repo/src/main.rs")));
    }

    #[test]
    fn test_backups_always_excluded() {
        let filter = FileFilter::new(&FileFilterConfig::new()).unwrap();
        assert!(!filter.should_process(Path::new("/repo/src/main.rs.backup.1700000000")));
    }

    #[test]
    fn test_exclude_directories() {
        let config = FileFilterConfig::new().exclude_directories(vec!["**/target".to_string()]);
        let filter = FileFilter::new(&config).unwrap();

        assert!(!filter.should_process(Path::new("/repo/target/debug/out.txt")));
        assert!(filter.should_process(Path::new("/repo/src/lib.rs")));
    }

    #[test]
    fn test_exclude_files() {
        let config = FileFilterConfig::new().exclude_files(vec!["**/*.lock".to_string()]);
        let filter = FileFilter::new(&config).unwrap();

        assert!(!filter.should_process(Path::new("/repo/Cargo.lock")));
        assert!(filter.should_process(Path::new("/repo/Cargo.toml")));
    }

    #[test]
    fn test_allow_only() {
        let config = FileFilterConfig::new().allow_only(vec!["**/*.py".to_string()]);
        let filter = FileFilter::new(&config).unwrap();

        assert!(filter.should_process(Path::new("/repo/app/main.py")));
        assert!(!filter.should_process(Path::new("/repo/app/main.rs")));
    }

    #[test]
    fn test_invalid_pattern() {
        let config = FileFilterConfig::new().exclude_files(vec!["[".to_string()]);
        let err = FileFilter::new(&config).unwrap_err();
        assert!(matches!(err, Error::InvalidPattern { .. }));
    }
}
