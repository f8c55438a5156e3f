use crate::{
    config::{Config, OutputMode},
    edit::{modify_file_lines, LineRange},
    error::{Error, Result},
    file::SourceFile,
    pipeline::PipelineStats,
};
use serde::Serialize;
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    time::SystemTime,
};
use tracing::{debug, info, warn};

/// JSON report describing a finished run.
#[derive(Debug, Serialize)]
pub(crate) struct RunReport<'a> {
    /// Root directory that was processed
    pub(crate) root_directory: String,

    /// Merge or divide
    pub(crate) mode: OutputMode,

    /// Prompt applied to every file
    pub(crate) prompt: &'a str,

    /// Aggregated counters
    pub(crate) stats: &'a PipelineStats,

    /// One entry per processed file, in processing order
    pub(crate) files: Vec<FileReport>,

    /// Generation timestamp
    pub(crate) generated_at: String,
}

/// Outcome of a single file in the run report.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct FileReport {
    /// Path relative to the root directory
    pub(crate) path: String,

    /// `modified`, `divided`, `skipped` or `failed`
    pub(crate) outcome: &'static str,

    /// Part files created (divide mode)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) parts: Vec<String>,

    /// Failure or skip reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) detail: Option<String>,
}

/// Applies transformation results to the file system.
#[derive(Debug, Clone)]
pub(crate) struct Writer {
    backup_originals: bool,
}

impl Writer {
    /// Creates a new writer from configuration.
    pub(crate) const fn new(config: &Config) -> Self {
        Self {
            backup_originals: config.backup_originals,
        }
    }

    /// Replaces the whole content of `file` with `text`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backup or the write fails; the original is left
    /// untouched in that case.
    pub(crate) fn write_back(&self, file: &SourceFile, text: &str) -> Result<()> {
        if self.backup_originals {
            backup_file(&file.absolute_path)?;
        }

        modify_file_lines(&file.absolute_path, LineRange::Whole, text)?;

        debug!(
            "Rewrote {} ({} -> {} bytes)",
            file.relative_path,
            file.size_bytes(),
            text.len()
        );
        Ok(())
    }

    /// Writes one transformed chunk next to the original as a part file.
    ///
    /// An existing part file with the same name, left over from an earlier
    /// run, is overwritten.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the part file cannot be written.
    pub(crate) fn write_part(
        &self,
        file: &SourceFile,
        index: usize,
        total: usize,
        prompt: &str,
        text: &str,
    ) -> Result<PathBuf> {
        let path = part_path(&file.absolute_path, index);
        if path.exists() {
            warn!("Overwriting existing part file {}", path.display());
        }

        let mut content = render_part_header(&file.name, index, total, prompt);
        content.push_str(text);

        write_file_atomic(&path, &content)?;

        debug!("Wrote part {}/{} to {}", index, total, path.display());
        Ok(path)
    }

    /// Deletes the original after all of its parts were written.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the backup or the removal fails.
    pub(crate) fn remove_original(&self, file: &SourceFile) -> Result<()> {
        if self.backup_originals {
            backup_file(&file.absolute_path)?;
        }

        fs::remove_file(&file.absolute_path).map_err(|e| Error::io(&file.absolute_path, e))?;

        debug!("Removed original {}", file.relative_path);
        Ok(())
    }

    /// Writes the JSON run report.
    ///
    /// # Errors
    ///
    /// Returns an error if the report cannot be serialized or written.
    pub(crate) fn write_report(&self, path: &Path, report: &RunReport<'_>) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let json = serde_json::to_string_pretty(report)?;
        write_file_atomic(path, &json)?;

        info!("Wrote run report to {}", path.display());
        Ok(())
    }
}

impl<'a> RunReport<'a> {
    pub(crate) fn new(
        config: &'a Config,
        stats: &'a PipelineStats,
        files: Vec<FileReport>,
    ) -> Self {
        Self {
            root_directory: config.root_dir.display().to_string(),
            mode: config.mode,
            prompt: &config.prompt,
            stats,
            files,
            generated_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// Returns `<stem>.part<N><.ext>` beside `original`.
#[must_use]
pub fn part_path(original: &Path, index: usize) -> PathBuf {
    let stem = original
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    let name = match original.extension() {
        Some(ext) => format!("{stem}.part{index}.{}", ext.to_string_lossy()),
        None => format!("{stem}.part{index}"),
    };

    original.with_file_name(name)
}

/// Returns the original a part file was cut from, if `path` is named like one.
///
/// This is the inverse of [`part_path`]; it does not check that either file exists.
#[must_use]
pub fn original_of_part(path: &Path) -> Option<PathBuf> {
    let is_index = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

    let stem = path.file_stem()?.to_str()?;
    let ext = path.extension().and_then(|e| e.to_str());

    if let Some((original_stem, index)) = stem.rsplit_once(".part") {
        if is_index(index) && !original_stem.is_empty() {
            let name = match ext {
                Some(ext) => format!("{original_stem}.{ext}"),
                None => original_stem.to_string(),
            };
            return Some(path.with_file_name(name));
        }
    }

    // `Makefile.part1`: the index sits in the extension.
    match ext.and_then(|e| e.strip_prefix("part")) {
        Some(index) if is_index(index) => Some(path.with_file_name(stem)),
        _ => None,
    }
}

/// Renders the four-line header placed at the top of every part file.
///
/// The prompt is collapsed onto one line so the header height never changes.
#[must_use]
pub fn render_part_header(original_name: &str, index: usize, total: usize, prompt: &str) -> String {
    let prompt = prompt.split_whitespace().collect::<Vec<_>>().join(" ");
    format!("Original file: {original_name}\nPart: {index}/{total}\nPrompt: {prompt}\n\n")
}

/// Writes a file atomically.
///
/// # Process
///
/// 1. Writes content to a hidden temporary file in the same directory
/// 2. Syncs the temporary file to disk
/// 3. Copies the permissions of an existing target onto it
/// 4. Atomically renames it over the target path
///
/// The temporary file is removed if any step fails.
pub(crate) fn write_file_atomic(path: &Path, content: &str) -> Result<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::config(format!("Invalid file path: {}", path.display())))?
        .to_string_lossy();
    let temp_path = path.with_file_name(format!(".{file_name}.llm-rewrite.tmp"));

    let result = (|| {
        let mut temp_file = fs::File::create(&temp_path).map_err(|e| Error::io(&temp_path, e))?;
        temp_file
            .write_all(content.as_bytes())
            .map_err(|e| Error::io(&temp_path, e))?;
        temp_file.sync_all().map_err(|e| Error::io(&temp_path, e))?;
        drop(temp_file);

        if let Ok(metadata) = fs::metadata(path) {
            fs::set_permissions(&temp_path, metadata.permissions())
                .map_err(|e| Error::io(&temp_path, e))?;
        }

        fs::rename(&temp_path, path).map_err(|e| Error::io(path, e))
    })();

    if result.is_err() && temp_path.exists() {
        let _ = fs::remove_file(&temp_path);
    }

    result
}

/// Creates a timestamped backup of an existing file and returns its path.
pub(crate) fn backup_file(path: &Path) -> Result<PathBuf> {
    let timestamp = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)?
        .as_nanos();

    let filename = path
        .file_name()
        .ok_or_else(|| Error::config("Invalid file path"))?
        .to_string_lossy();

    let backup_path = path.with_file_name(format!("{filename}.backup.{timestamp}"));

    fs::copy(path, &backup_path).map_err(|e| Error::io(&backup_path, e))?;

    debug!("Created backup: {}", backup_path.display());
    Ok(backup_path)
}
