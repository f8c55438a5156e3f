use crate::error::{Error, Result};
use chrono::{DateTime, Local};
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

static BINARY_EXTENSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "exe", "dll", "so", "dylib", "a", "o", "obj", "png", "jpg", "jpeg", "gif", "bmp", "ico",
        "webp", "mp3", "mp4", "avi", "mkv", "mov", "wav", "flac", "pdf", "doc", "docx", "xls",
        "xlsx", "ppt", "pptx", "zip", "tar", "gz", "bz2", "xz", "7z", "rar", "wasm", "pyc",
        "class",
    ]
    .into_iter()
    .collect()
});

/// File system object type as reported by metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Regular file
    File,
    /// Directory
    Directory,
    /// Symbolic link (not followed)
    Symlink,
    /// Anything else (sockets, devices, ...)
    Other,
}

impl From<fs::FileType> for FileKind {
    fn from(ft: fs::FileType) -> Self {
        if ft.is_file() {
            Self::File
        } else if ft.is_dir() {
            Self::Directory
        } else if ft.is_symlink() {
            Self::Symlink
        } else {
            Self::Other
        }
    }
}

/// Metadata captured when a file is discovered.
#[derive(Debug, Clone)]
pub struct FileMetadata {
    /// Size on disk in bytes
    pub size: u64,
    /// Object type
    pub kind: FileKind,
    /// Last modification time, if the platform reports one
    pub modified: Option<DateTime<Local>>,
}

impl FileMetadata {
    /// Reads metadata for `path` without following symlinks.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the path is missing or inaccessible.
    pub fn read(path: &Path) -> Result<Self> {
        let metadata = fs::symlink_metadata(path).map_err(|e| Error::io(path, e))?;

        Ok(Self {
            size: metadata.len(),
            kind: metadata.file_type().into(),
            modified: metadata.modified().ok().map(DateTime::<Local>::from),
        })
    }
}

/// A text file discovered under the run's root directory.
///
/// Content is read once at discovery; the file on disk stays authoritative and
/// is only changed by the final write-back.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// File name for display
    pub name: String,

    /// Absolute path to the file
    pub absolute_path: PathBuf,

    /// Path relative to the root directory
    pub relative_path: String,

    /// Full UTF-8 content
    pub content: String,

    /// Metadata at discovery time
    pub metadata: FileMetadata,
}

impl SourceFile {
    /// Reads a file and its metadata.
    ///
    /// `root` is used only to compute [`SourceFile::relative_path`].
    ///
    /// # Errors
    ///
    /// Returns an error if the path does not exist, is not a regular file,
    /// cannot be read, or is not valid UTF-8.
    pub fn read(path: &Path, root: &Path) -> Result<Self> {
        let absolute_path = fs::canonicalize(path).map_err(|e| Error::io(path, e))?;
        let metadata = FileMetadata::read(&absolute_path)?;

        if metadata.kind != FileKind::File {
            return Err(Error::not_a_file(&absolute_path));
        }

        let content = fs::read_to_string(&absolute_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::InvalidData {
                Error::invalid_utf8(&absolute_path)
            } else {
                Error::io(&absolute_path, e)
            }
        })?;

        let relative_path = pathdiff::diff_paths(path, root)
            .unwrap_or_else(|| path.to_path_buf())
            .to_string_lossy()
            .to_string();

        let name = absolute_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| relative_path.clone());

        Ok(Self {
            name,
            absolute_path,
            relative_path,
            content,
            metadata,
        })
    }

    /// Creates an in-memory file, used by callers that already hold the content.
    #[must_use]
    pub fn new(absolute_path: PathBuf, content: String) -> Self {
        let name = absolute_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        Self {
            relative_path: name.clone(),
            name,
            metadata: FileMetadata {
                size: content.len() as u64,
                kind: FileKind::File,
                modified: None,
            },
            absolute_path,
            content,
        }
    }

    /// Returns the number of lines, counting a trailing unterminated line.
    #[must_use]
    pub fn line_count(&self) -> usize {
        line_count(&self.content)
    }

    /// Returns the size in bytes.
    #[must_use]
    pub const fn size_bytes(&self) -> u64 {
        self.metadata.size
    }

    /// Returns true if the file has no content at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Counts `\n`-terminated lines plus a final unterminated one, if any.
#[must_use]
pub fn line_count(text: &str) -> usize {
    text.split_inclusive('\n').count()
}

/// Determines if a file is likely binary by analyzing its content.
///
/// # Algorithm
///
/// 1. Reads the first 8KB of the file
/// 2. Checks for null bytes (binary indicator)
/// 3. Calculates the ratio of ASCII characters
/// 4. Files with null bytes or low ASCII ratio are considered binary
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub(crate) fn is_likely_binary(path: &Path) -> Result<bool> {
    const BUFFER_SIZE: usize = 8192;
    const ASCII_THRESHOLD: f64 = 0.85;

    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, file);
    let mut buffer = [0u8; BUFFER_SIZE];

    let bytes_read = reader.read(&mut buffer).map_err(|e| Error::io(path, e))?;

    if bytes_read == 0 {
        return Ok(false);
    }

    let sample = &buffer[..bytes_read];

    if memchr::memchr(0, sample).is_some() {
        return Ok(true);
    }

    // Non-ASCII text is fine as long as it decodes.
    if std::str::from_utf8(sample).is_ok() {
        return Ok(false);
    }

    let ascii_count = sample.iter().filter(|&&b| b < 128).count();
    let ascii_ratio = ascii_count as f64 / bytes_read as f64;

    Ok(ascii_ratio < ASCII_THRESHOLD)
}

/// Checks if a file extension suggests a binary file.
#[must_use]
pub(crate) fn has_binary_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| BINARY_EXTENSIONS.contains(ext.to_ascii_lowercase().as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use std::io::Write;

    #[test]
    fn test_read_source_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("src/main.rs");
        file.write_str("fn main() {}\n").unwrap();

        let data = SourceFile::read(file.path(), temp.path()).unwrap();

        assert_eq!(data.name, "main.rs");
        assert_eq!(data.content, "fn main() {}\n");
        assert!(data.absolute_path.is_absolute());
        assert!(data.relative_path.ends_with("main.rs"));
        assert_eq!(data.size_bytes(), 13);
        assert_eq!(data.metadata.kind, FileKind::File);
        assert!(data.metadata.modified.is_some());
        assert_eq!(data.line_count(), 1);
    }

    #[test]
    fn test_read_missing_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let err = SourceFile::read(&temp.path().join("missing.txt"), temp.path()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_read_directory_is_type_mismatch() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("sub").create_dir_all().unwrap();

        let err = SourceFile::read(&temp.path().join("sub"), temp.path()).unwrap_err();
        assert!(matches!(err, Error::NotAFile { .. }));
    }

    #[test]
    fn test_read_invalid_utf8() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("latin1.txt");
        file.write_binary(&[0x63, 0x61, 0x66, 0xe9]).unwrap();

        let err = SourceFile::read(file.path(), temp.path()).unwrap_err();
        assert!(matches!(err, Error::InvalidUtf8 { .. }));
    }

    #[test]
    fn test_line_count() {
        assert_eq!(line_count(""), 0);
        assert_eq!(line_count("one"), 1);
        assert_eq!(line_count("one\n"), 1);
        assert_eq!(line_count("one\ntwo"), 2);
        assert_eq!(line_count("one\r\ntwo\r\n"), 2);
        assert_eq!(line_count("\n\n"), 2);
    }

    #[test]
    fn test_is_likely_binary() {
        let temp = assert_fs::TempDir::new().unwrap();

        let text = temp.child("test.txt");
        text.write_str("Hello, world! ¿Qué tal?").unwrap();
        assert!(!is_likely_binary(text.path()).unwrap());

        let binary = temp.child("test.bin");
        let mut f = File::create(binary.path()).unwrap();
        f.write_all(&[0u8; 100]).unwrap();
        assert!(is_likely_binary(binary.path()).unwrap());

        let empty = temp.child("empty.txt");
        empty.touch().unwrap();
        assert!(!is_likely_binary(empty.path()).unwrap());
    }

    #[test]
    fn test_has_binary_extension() {
        assert!(has_binary_extension(Path::new("app.exe")));
        assert!(has_binary_extension(Path::new("image.PNG")));
        assert!(!has_binary_extension(Path::new("code.rs")));
        assert!(!has_binary_extension(Path::new("no_extension")));
    }
}
