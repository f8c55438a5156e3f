//! In-place replacement of a line range inside a text file.

use crate::error::{Error, Result};
use crate::writer::write_file_atomic;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Lines of a file to replace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineRange {
    /// Inclusive, 1-based range of lines
    Lines {
        /// First line replaced
        start: usize,
        /// Last line replaced
        end: usize,
    },
    /// The whole file
    Whole,
}

impl LineRange {
    /// Creates an inclusive 1-based range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Range`] if either bound is zero or `start > end`.
    pub fn new(start: usize, end: usize) -> Result<Self> {
        if start == 0 || end == 0 {
            return Err(Error::range(format!(
                "line numbers start at 1 (got {start}..={end})"
            )));
        }
        if start > end {
            return Err(Error::range(format!(
                "start line {start} is after end line {end}"
            )));
        }
        Ok(Self::Lines { start, end })
    }
}

impl FromStr for LineRange {
    type Err = Error;

    /// Parses `all`, `N` or `START:END`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(Self::Whole);
        }

        let parse = |part: &str| {
            part.trim()
                .parse::<usize>()
                .map_err(|_| Error::range(format!("'{part}' is not a line number")))
        };

        match s.split_once(':') {
            Some((start, end)) => Self::new(parse(start)?, parse(end)?),
            None => {
                let line = parse(s)?;
                Self::new(line, line)
            }
        }
    }
}

impl fmt::Display for LineRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lines { start, end } => write!(f, "{start}:{end}"),
            Self::Whole => f.write_str("all"),
        }
    }
}

/// New content for a line range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Replacement {
    /// A block of text with embedded line breaks
    Text(String),
    /// One entry per line, without terminators
    Lines(Vec<String>),
}

impl Replacement {
    /// Returns the replacement as lines, each terminated by `\n`.
    fn terminated_lines(&self) -> Vec<String> {
        let lines: Vec<&str> = match self {
            Self::Text(text) if text.is_empty() => Vec::new(),
            Self::Text(text) => text.strip_suffix('\n').unwrap_or(text).split('\n').collect(),
            Self::Lines(lines) => lines.iter().map(String::as_str).collect(),
        };

        lines.into_iter().map(|l| format!("{l}\n")).collect()
    }
}

impl From<String> for Replacement {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Replacement {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Vec<String>> for Replacement {
    fn from(lines: Vec<String>) -> Self {
        Self::Lines(lines)
    }
}

impl From<Vec<&str>> for Replacement {
    fn from(lines: Vec<&str>) -> Self {
        Self::Lines(lines.into_iter().map(str::to_string).collect())
    }
}

/// Replaces `range` in the file at `path` with `content`, leaving other lines untouched.
///
/// For [`LineRange::Lines`] every replacement line is written with a `\n`
/// terminator. [`LineRange::Whole`] with [`Replacement::Text`] writes the text
/// exactly as given.
///
/// # Errors
///
/// Returns an IO error if the file does not exist or cannot be written, and
/// [`Error::Range`] if the range is invalid or extends past the end of the file.
pub fn modify_file_lines(
    path: &Path,
    range: LineRange,
    content: impl Into<Replacement>,
) -> Result<()> {
    let content = content.into();

    if !path.exists() {
        return Err(Error::io(
            path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        ));
    }
    if !path.is_file() {
        return Err(Error::not_a_file(path));
    }

    let updated = match range {
        LineRange::Whole => match content {
            Replacement::Text(text) => text,
            lines @ Replacement::Lines(_) => lines.terminated_lines().concat(),
        },
        LineRange::Lines { start, end } => {
            let current = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
            splice(&current, start, end, &content)?
        }
    };

    write_file_atomic(path, &updated)
}

fn splice(current: &str, start: usize, end: usize, content: &Replacement) -> Result<String> {
    LineRange::new(start, end)?;

    let lines: Vec<&str> = current.split_inclusive('\n').collect();
    if end > lines.len() {
        return Err(Error::range(format!(
            "range {start}:{end} exceeds the file's {} line(s)",
            lines.len()
        )));
    }

    let mut out = String::with_capacity(current.len());
    lines[..start - 1].iter().for_each(|l| out.push_str(l));
    for line in content.terminated_lines() {
        out.push_str(&line);
    }
    lines[end..].iter().for_each(|l| out.push_str(l));

    Ok(out)
}
