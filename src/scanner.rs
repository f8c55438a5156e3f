use crate::filter::FileFilter;
use crate::{
    config::Config,
    error::{Error, Result},
    file::{has_binary_extension, is_likely_binary, SourceFile},
};
use ignore::{DirEntry, WalkBuilder};
use serde::Serialize;
use std::{fs, path::PathBuf};
use tracing::{debug, trace, warn};

/// Statistics collected during scanning.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct ScanStats {
    /// Regular files that passed the filters
    pub total_files: usize,

    /// Text files read
    pub text_files: usize,

    /// Binary files left alone
    pub binary_files: usize,

    /// Files that could not be read
    pub errors: usize,
}

/// Discovers the files a run will rewrite.
pub(crate) struct Scanner {
    root_dir: PathBuf,
    file_filter: FileFilter,
}

impl Scanner {
    /// Creates a new scanner from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a filter pattern is invalid.
    pub(crate) fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            root_dir: config.root_dir.clone(),
            file_filter: FileFilter::new(&config.file_filter_config)?,
        })
    }

    /// Walks the root directory and reads every processable text file.
    ///
    /// Files are returned in a stable, name-sorted depth-first order. Binary
    /// and unreadable files are skipped with a diagnostic. An empty result is
    /// not an error.
    ///
    /// # Errors
    ///
    /// Returns an error only if the root directory itself cannot be listed.
    pub(crate) fn scan(&self) -> Result<(Vec<SourceFile>, ScanStats)> {
        fs::read_dir(&self.root_dir).map_err(|e| Error::io(&self.root_dir, e))?;

        debug!("Starting scan of {}", self.root_dir.display());

        let walker = WalkBuilder::new(&self.root_dir)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .require_git(false)
            .hidden(true)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        let mut files = Vec::new();
        let mut stats = ScanStats::default();

        for result in walker {
            let entry = match result {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Walk error: {}", e);
                    stats.errors += 1;
                    continue;
                }
            };

            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }

            if !self.file_filter.should_process(entry.path()) {
                trace!("Excluded by filter: {}", entry.path().display());
                continue;
            }

            stats.total_files += 1;

            match self.process_entry(&entry) {
                Ok(Some(file)) => {
                    stats.text_files += 1;
                    files.push(file);
                }
                Ok(None) => stats.binary_files += 1,
                Err(e) => {
                    warn!("Failed to read {}: {}", entry.path().display(), e);
                    stats.errors += 1;
                }
            }
        }

        debug!(
            "Scan complete: {} total, {} text, {} binary, {} errors",
            stats.total_files, stats.text_files, stats.binary_files, stats.errors
        );

        if files.is_empty() {
            warn!("No text files found in {}", self.root_dir.display());
        }

        Ok((files, stats))
    }

    /// Reads one entry, returning `None` for binary files.
    fn process_entry(&self, entry: &DirEntry) -> Result<Option<SourceFile>> {
        let path = entry.path();

        if has_binary_extension(path) {
            debug!("Skipping binary file (by extension): {}", path.display());
            return Ok(None);
        }

        if is_likely_binary(path)? {
            debug!("Skipping binary file (by content): {}", path.display());
            return Ok(None);
        }

        SourceFile::read(path, &self.root_dir).map(Some)
    }
}
