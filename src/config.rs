use crate::error::{Error, Result};
use crate::filter::FileFilterConfig;
use std::fs;
use std::path::{Path, PathBuf};

/// Line threshold above which a file is chunked, and the size of each chunk.
pub const DEFAULT_CHUNK_LINES: usize = 300;

const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Environment variable consulted for the Gemini API key.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// What happens to a large file once all of its chunks were transformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Reassemble the transformed chunks into the original file.
    #[default]
    Merge,
    /// Write each transformed chunk to its own `.part<N>` file and remove the original.
    Divide,
}

/// Connection settings for the Gemini completion service.
#[derive(Clone, PartialEq, Eq)]
pub struct GeminiConfig {
    /// API key sent as the `key` query parameter
    pub api_key: String,

    /// Model identifier, e.g. `gemini-2.0-flash`
    pub model: String,

    /// Base URL of the REST API, without trailing slash
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl GeminiConfig {
    /// Creates a configuration with default model and endpoint.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Reads the API key from [`API_KEY_ENV`].
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the variable is unset or blank.
    pub fn from_env() -> Result<Self> {
        match std::env::var(API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => Ok(Self::new(key.trim())),
            _ => Err(Error::config(format!(
                "{API_KEY_ENV} is not set; pass --api-key or export the variable"
            ))),
        }
    }

    /// Returns the streaming generation endpoint for the configured model.
    #[must_use]
    pub fn stream_endpoint(&self) -> String {
        format!(
            "{}/models/{}:streamGenerateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    /// Validates the transport settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the key or model is empty, the URL is not HTTP(S),
    /// or the timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(Error::config("Gemini API key must not be empty"));
        }

        if self.model.trim().is_empty() {
            return Err(Error::config("Gemini model must not be empty"));
        }

        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(Error::config(format!(
                "Gemini base URL must start with http:// or https://: {}",
                self.base_url
            )));
        }

        if self.timeout_secs == 0 {
            return Err(Error::config("timeout must be greater than 0 seconds"));
        }

        Ok(())
    }
}

// Keep the key out of logs.
impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Configuration for a rewrite run.
///
/// Use [`Config::builder()`] to construct a new configuration.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Config {
    /// Root directory whose files are rewritten
    pub root_dir: PathBuf,

    /// Transformation prompt applied to every file or chunk
    pub prompt: String,

    /// Merge or divide large files
    pub mode: OutputMode,

    /// Large-file threshold and chunk size, in lines
    pub chunk_lines: usize,

    /// Glob-based file exclusions
    pub file_filter_config: FileFilterConfig,

    /// Dry run mode (no model calls, no file writes)
    pub dry_run: bool,

    /// Copy originals to a timestamped backup before rewriting or deleting them
    pub backup_originals: bool,

    /// Optional path for a JSON run report
    pub report_path: Option<PathBuf>,
}

impl Config {
    /// Creates a new configuration builder.
    ///
    /// # Examples
    ///
    /// ```
    /// use llm_rewrite::{Config, OutputMode};
    ///
    /// let config = Config::builder()
    ///     .root_dir(".")
    ///     .prompt("Translate every comment to English")
    ///     .mode(OutputMode::Divide)
    ///     .build()
    ///     .expect("valid configuration");
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Root directory doesn't exist or is not a directory
    /// - Prompt is empty
    /// - Chunk size is zero
    pub fn validate(&self) -> Result<()> {
        if !self.root_dir.exists() {
            return Err(Error::config(format!(
                "Root directory does not exist: {}",
                self.root_dir.display()
            )));
        }

        if !self.root_dir.is_dir() {
            return Err(Error::config(format!(
                "Root path is not a directory: {}",
                self.root_dir.display()
            )));
        }

        if self.prompt.trim().is_empty() {
            return Err(Error::config("prompt must not be empty"));
        }

        if self.chunk_lines == 0 {
            return Err(Error::config("chunk_lines must be greater than 0"));
        }

        if let Some(ref report) = self.report_path {
            if report.is_dir() {
                return Err(Error::config(format!(
                    "Report path is a directory: {}",
                    report.display()
                )));
            }
        }

        Ok(())
    }

    /// Returns true if a file with `line_count` lines goes through the chunked pipeline.
    #[must_use]
    pub const fn is_large(&self, line_count: usize) -> bool {
        line_count > self.chunk_lines
    }
}

/// Reads a prompt file, rejecting missing or blank prompts.
///
/// # Errors
///
/// Returns an IO error if the file cannot be read, and a configuration error
/// if it only contains whitespace.
pub fn load_prompt(path: &Path) -> Result<String> {
    if path.is_dir() {
        return Err(Error::not_a_file(path));
    }

    let prompt = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::InvalidData {
            Error::invalid_utf8(path)
        } else {
            Error::io(path, e)
        }
    })?;

    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(Error::config(format!(
            "Prompt file is empty: {}",
            path.display()
        )));
    }

    Ok(prompt.to_string())
}

/// Builder for creating a [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    root_dir: Option<PathBuf>,
    prompt: Option<String>,
    mode: OutputMode,
    chunk_lines: Option<usize>,
    file_filter_config: Option<FileFilterConfig>,
    dry_run: bool,
    backup_originals: bool,
    report_path: Option<PathBuf>,
}

impl ConfigBuilder {
    /// Sets the root directory to rewrite.
    #[must_use]
    pub fn root_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.root_dir = Some(path.into());
        self
    }

    /// Sets the transformation prompt.
    #[must_use]
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Sets the large-file output mode.
    #[must_use]
    pub fn mode(mut self, mode: OutputMode) -> Self {
        self.mode = mode;
        self
    }

    /// Shorthand for `mode(OutputMode::Divide)` when `enabled`.
    #[must_use]
    pub fn divide(mut self, enabled: bool) -> Self {
        self.mode = if enabled {
            OutputMode::Divide
        } else {
            OutputMode::Merge
        };
        self
    }

    /// Sets the large-file threshold and chunk size in lines.
    #[must_use]
    pub fn chunk_lines(mut self, lines: usize) -> Self {
        self.chunk_lines = Some(lines);
        self
    }

    /// Sets the file filtering configuration.
    #[must_use]
    pub fn file_filter_config(mut self, config: FileFilterConfig) -> Self {
        self.file_filter_config = Some(config);
        self
    }

    /// Enables dry run mode (no model calls, no file writes).
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Enables or disables backups of originals.
    #[must_use]
    pub fn backup_originals(mut self, enabled: bool) -> Self {
        self.backup_originals = enabled;
        self
    }

    /// Sets where the JSON run report is written.
    #[must_use]
    pub fn report_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.report_path = Some(path.into());
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn build(self) -> Result<Config> {
        let config = Config {
            root_dir: self.root_dir.unwrap_or_else(|| PathBuf::from(".")),
            prompt: self.prompt.unwrap_or_default(),
            mode: self.mode,
            chunk_lines: self.chunk_lines.unwrap_or(DEFAULT_CHUNK_LINES),
            file_filter_config: self.file_filter_config.unwrap_or_default(),
            dry_run: self.dry_run,
            backup_originals: self.backup_originals,
            report_path: self.report_path,
        };

        config.validate()?;
        Ok(config)
    }
}
