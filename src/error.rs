use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for the llm-rewrite library.
///
/// Every variant is cheap to clone so per-file failures can be kept in the
/// run report after they were logged.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// IO error with context about the file path.
    #[error("IO error accessing '{path}': {message}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// Kind of the underlying IO error
        kind: std::io::ErrorKind,
        /// Error message
        message: String,
    },

    /// Path exists but is not a regular file.
    #[error("'{path}' is not a regular file")]
    NotAFile {
        /// Offending path
        path: PathBuf,
    },

    /// Invalid UTF-8 encountered in file.
    #[error("Invalid UTF-8 encoding in file '{path}'. File may be binary or use unsupported encoding.")]
    InvalidUtf8 {
        /// Path to file with encoding issues
        path: PathBuf,
    },

    /// Configuration validation error.
    #[error("Invalid configuration: {message}")]
    Config {
        /// Detailed error message
        message: String,
    },

    /// The completion service could not be reached or answered with an error.
    #[error("Transport error: {message}")]
    Transport {
        /// HTTP status code, when the server answered
        status: Option<u16>,
        /// Error message
        message: String,
    },

    /// The completion response could not be turned into text.
    #[error("Could not decode model response: {message}")]
    Decode {
        /// Error message
        message: String,
    },

    /// Invalid line range passed to the line-splice primitive.
    #[error("Invalid line range: {message}")]
    Range {
        /// Error message
        message: String,
    },

    /// The model answered successfully but with nothing usable.
    #[error("Model returned empty text")]
    EmptyResult,

    /// A chunk of a large file failed; the file was abandoned at this chunk.
    #[error("Chunk {index}/{total} failed ({parts_written} part file(s) already written): {source}")]
    Chunk {
        /// 1-based index of the failing chunk
        index: usize,
        /// Total chunks for the file
        total: usize,
        /// Part files written before the failure (divide mode only)
        parts_written: usize,
        /// Underlying failure
        #[source]
        source: Box<Error>,
    },

    /// JSON serialization error.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message
        message: String,
    },

    /// System time error.
    #[error("System time error: {message}")]
    SystemTime {
        /// Error message
        message: String,
    },

    /// Invalid glob pattern.
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The invalid pattern
        pattern: String,
        /// Reason why it's invalid
        reason: String,
    },
}

impl Error {
    /// Creates an IO error with path context.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            kind: source.kind(),
            message: source.to_string(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a transport error without an HTTP status.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            status: None,
            message: message.into(),
        }
    }

    /// Creates a transport error for a non-success HTTP status.
    #[must_use]
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self::Transport {
            status: Some(status),
            message: format!("server returned {status}: {}", body.into()),
        }
    }

    /// Creates a decode error.
    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates a line range error.
    #[must_use]
    pub fn range(message: impl Into<String>) -> Self {
        Self::Range {
            message: message.into(),
        }
    }

    /// Creates an invalid UTF-8 error.
    #[must_use]
    pub fn invalid_utf8(path: impl Into<PathBuf>) -> Self {
        Self::InvalidUtf8 { path: path.into() }
    }

    /// Creates a not-a-file error.
    #[must_use]
    pub fn not_a_file(path: impl Into<PathBuf>) -> Self {
        Self::NotAFile { path: path.into() }
    }

    /// Creates an invalid pattern error.
    #[must_use]
    pub fn invalid_pattern(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }

    /// Wraps a failure of one chunk of a large file.
    #[must_use]
    pub fn chunk(index: usize, total: usize, parts_written: usize, source: Self) -> Self {
        Self::Chunk {
            index,
            total,
            parts_written,
            source: Box::new(source),
        }
    }

    /// Returns true if this is an IO error.
    #[must_use]
    pub const fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// Returns true if this is an IO error caused by a missing path.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { kind, .. } if *kind == std::io::ErrorKind::NotFound)
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    /// Returns true if this is a transport error.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Returns true if this is a decode error.
    #[must_use]
    pub const fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }

    /// Returns true if this is a line range error.
    #[must_use]
    pub const fn is_range(&self) -> bool {
        matches!(self, Self::Range { .. })
    }

    /// Returns the innermost error, looking through chunk wrappers.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::Chunk { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<std::time::SystemTimeError> for Error {
    fn from(e: std::time::SystemTimeError) -> Self {
        Self::SystemTime {
            message: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            message: e.to_string(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_builder() {
            return Self::config(format!("failed to build HTTP client: {e}"));
        }
        if e.is_timeout() {
            return Self::transport(format!("request timed out: {e}"));
        }
        Self::Transport {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::config("test message");
        assert!(err.is_config());
        assert!(err.to_string().contains("test message"));
    }

    #[test]
    fn test_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::io("/tmp/test.txt", io_err);
        assert!(err.is_io());
        assert!(err.is_not_found());
        assert!(err.to_string().contains("/tmp/test.txt"));
    }

    #[test]
    fn test_http_status_error() {
        let err = Error::http_status(503, "overloaded");
        assert!(err.is_transport());
        assert!(matches!(err, Error::Transport { status: Some(503), .. }));
        assert!(err.to_string().contains("overloaded"));
    }

    #[test]
    fn test_chunk_error_root_cause() {
        let err = Error::chunk(2, 3, 1, Error::decode("no object"));
        assert!(err.to_string().contains("Chunk 2/3"));
        assert!(err.to_string().contains("1 part file(s)"));
        assert!(err.root_cause().is_decode());
    }

    #[test]
    fn test_error_clone() {
        let err = Error::range("start > end");
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }

    #[test]
    fn test_serialization_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: Error = json_err.into();
        assert!(err.to_string().contains("Serialization error"));
    }

    #[test]
    fn test_system_time_error() {
        use std::time::{Duration, SystemTime};

        let past = SystemTime::UNIX_EPOCH;
        let future = past + Duration::from_secs(1);
        let result = past.duration_since(future);

        if let Err(e) = result {
            let err: Error = e.into();
            assert!(err.to_string().contains("System time error"));
        }
    }
}
