use crate::config::Config;
use tracing::trace;

/// A contiguous, line-aligned slice of a file's text.
///
/// Chunks borrow from the file content and live only as long as the pipeline
/// invocation that created them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    /// Sequential chunk index (1-based)
    pub index: usize,

    /// Number of chunks the file was split into
    pub total: usize,

    /// Raw text, line terminators included
    pub text: &'a str,
}

impl Chunk<'_> {
    /// Returns the number of lines in this chunk.
    #[must_use]
    pub fn line_count(&self) -> usize {
        crate::file::line_count(self.text)
    }

    /// Returns true if this is the final chunk of the file.
    #[must_use]
    pub const fn is_last(&self) -> bool {
        self.index == self.total
    }
}

/// Splits text into fixed-size groups of lines.
#[derive(Debug, Clone, Copy)]
pub struct Splitter {
    max_lines: usize,
}

impl Splitter {
    /// Creates a splitter using the configured chunk size.
    #[must_use]
    pub const fn new(config: &Config) -> Self {
        Self::with_max_lines(config.chunk_lines)
    }

    /// Creates a splitter with an explicit chunk size.
    ///
    /// `max_lines` must be positive; [`Config`] rejects zero. Release builds
    /// treat a zero size as one line per chunk.
    #[must_use]
    pub const fn with_max_lines(max_lines: usize) -> Self {
        debug_assert!(max_lines > 0, "chunk size must be at least one line");
        Self {
            max_lines: if max_lines == 0 { 1 } else { max_lines },
        }
    }

    /// Returns the maximum number of lines per chunk.
    #[must_use]
    pub const fn max_lines(&self) -> usize {
        self.max_lines
    }

    /// Returns true if a file of `line_count` lines must be chunked.
    #[must_use]
    pub const fn needs_split(&self, line_count: usize) -> bool {
        line_count > self.max_lines
    }

    /// Returns how many chunks `line_count` lines produce.
    #[must_use]
    pub const fn chunk_count(&self, line_count: usize) -> usize {
        line_count.div_ceil(self.max_lines)
    }

    /// Partitions `text` into ordered chunks of at most `max_lines` lines.
    ///
    /// Concatenating the chunk texts in order yields `text` unchanged. Empty
    /// input produces no chunks.
    #[must_use]
    pub fn split<'a>(&self, text: &'a str) -> Vec<Chunk<'a>> {
        let total = self.chunk_count(crate::file::line_count(text));
        let mut chunks = Vec::with_capacity(total);

        let mut start = 0;
        let mut lines_in_chunk = 0;

        for (offset, byte) in text.bytes().enumerate() {
            if byte != b'\n' {
                continue;
            }

            lines_in_chunk += 1;
            if lines_in_chunk == self.max_lines {
                let end = offset + 1;
                chunks.push(Chunk {
                    index: chunks.len() + 1,
                    total,
                    text: &text[start..end],
                });
                start = end;
                lines_in_chunk = 0;
            }
        }

        if start < text.len() {
            chunks.push(Chunk {
                index: chunks.len() + 1,
                total,
                text: &text[start..],
            });
        }

        debug_assert_eq!(chunks.len(), total);
        trace!(
            "Split {} bytes into {} chunk(s) of up to {} lines",
            text.len(),
            chunks.len(),
            self.max_lines
        );

        chunks
    }
}
