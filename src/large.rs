//! Chunked transformation of files above the line threshold.
//!
//! A large file moves through `split -> chunk loop -> finalize`. The first
//! failing chunk aborts the file: no later chunk is sent and nothing is
//! merged. In divide mode each successful chunk is persisted immediately, so
//! part files written before a failure stay on disk.

use crate::{
    config::OutputMode,
    error::{Error, Result},
    file::SourceFile,
    splitter::Splitter,
    transform::Transform,
    writer::Writer,
};
use std::path::PathBuf;
use tracing::{debug, info, instrument, warn};

/// Successful result of processing one large file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LargeOutcome {
    /// Transformed chunks concatenated in order, ready to be written back
    Merged(String),
    /// Part files written, in chunk order; the original may now be deleted
    Divided(Vec<PathBuf>),
}

/// Drives the splitter and the transformer over one large file.
#[derive(Debug, Clone)]
pub(crate) struct LargeFilePipeline<'w> {
    splitter: Splitter,
    writer: &'w Writer,
}

impl<'w> LargeFilePipeline<'w> {
    pub(crate) const fn new(splitter: Splitter, writer: &'w Writer) -> Self {
        Self { splitter, writer }
    }

    /// Transforms every chunk of `file` with `prompt`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Chunk`] wrapping the first chunk failure, or
    /// [`Error::EmptyResult`] if the file has no content to split.
    #[instrument(skip_all, fields(file = %file.relative_path, mode = ?mode))]
    pub(crate) fn process<T>(
        &self,
        file: &SourceFile,
        prompt: &str,
        mode: OutputMode,
        transformer: &T,
    ) -> Result<LargeOutcome>
    where
        T: Transform + ?Sized,
    {
        let chunks = self.splitter.split(&file.content);
        if chunks.is_empty() {
            return Err(Error::EmptyResult);
        }

        let total = chunks.len();
        info!(
            "Processing {} ({} lines) in {} chunks of up to {} lines",
            file.relative_path,
            file.line_count(),
            total,
            self.splitter.max_lines()
        );

        match mode {
            OutputMode::Merge => {
                // Dropped on every return path, including early aborts.
                let mut merged = String::with_capacity(file.content.len());

                for chunk in &chunks {
                    debug!("Transforming chunk {}/{}", chunk.index, total);
                    let text = transformer
                        .transform(prompt, chunk.text)
                        .map_err(|e| Error::chunk(chunk.index, total, 0, e))?;
                    merged.push_str(&text);
                }

                Ok(LargeOutcome::Merged(merged))
            }
            OutputMode::Divide => {
                let mut parts: Vec<PathBuf> = Vec::with_capacity(total);

                for chunk in &chunks {
                    debug!("Transforming chunk {}/{}", chunk.index, total);
                    let written = parts.len();

                    let text = transformer
                        .transform(prompt, chunk.text)
                        .and_then(|text| {
                            if text.is_empty() {
                                Err(Error::EmptyResult)
                            } else {
                                Ok(text)
                            }
                        })
                        .and_then(|text| {
                            self.writer
                                .write_part(file, chunk.index, total, prompt, &text)
                        });

                    match text {
                        Ok(path) => parts.push(path),
                        Err(e) => {
                            if !parts.is_empty() {
                                warn!(
                                    "Keeping {} part file(s) already written for {}: {}",
                                    written,
                                    file.relative_path,
                                    parts
                                        .iter()
                                        .map(|p| p.display().to_string())
                                        .collect::<Vec<_>>()
                                        .join(", ")
                                );
                            }
                            return Err(Error::chunk(chunk.index, total, written, e));
                        }
                    }
                }

                Ok(LargeOutcome::Divided(parts))
            }
        }
    }
}
