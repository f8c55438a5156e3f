//! # llm-rewrite
//!
//! Applies one natural-language prompt to every text file in a directory,
//! using a remote completion model, and writes the results back.
//!
//! ## Features
//!
//! - Sequential, `.gitignore`-aware directory scanning
//! - Line-based chunking of large files
//! - Merge mode (rewrite in place) or divide mode (one part file per chunk)
//! - Atomic writes with optional backups
//! - Per-file failure isolation and a JSON run report
//!
//! ## Quick Start
//!
//! ```no_run
//! use llm_rewrite::{ChunkTransformer, Config, GeminiClient, GeminiConfig, Pipeline};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::builder()
//!     .root_dir("./docs")
//!     .prompt("Translate every comment to English")
//!     .build()?;
//!
//! let client = GeminiClient::new(GeminiConfig::from_env()?)?;
//! Pipeline::new(config, ChunkTransformer::new(client))?.run()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! 1. **Scanner**: discovers text files respecting `.gitignore`
//! 2. **Splitter**: cuts large files into fixed-size groups of lines
//! 3. **Transformer**: sends prompt + text to the model and decodes the answer
//! 4. **Writer**: rewrites originals, writes part files and the run report

#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

mod client;
mod config;
mod edit;
mod error;
mod file;
mod filter;
mod large;
mod pipeline;
mod scanner;
mod splitter;
mod transform;
mod writer;

pub use client::{
    parse_stream_body, CompletionBackend, GeminiClient, GenerateRequest, ResponseFragment,
};
pub use config::{load_prompt, Config, ConfigBuilder, GeminiConfig, OutputMode, API_KEY_ENV, DEFAULT_CHUNK_LINES};
pub use edit::{modify_file_lines, LineRange, Replacement};
pub use error::{Error, Result};
pub use file::{FileKind, FileMetadata, SourceFile};
pub use filter::FileFilterConfig;
pub use large::LargeOutcome;
pub use pipeline::{Pipeline, PipelineStats, ProcessingOutcome};
pub use scanner::ScanStats;
pub use splitter::{Chunk, Splitter};
pub use transform::{build_instruction, extract_first_value, ChunkTransformer, Transform};
pub use writer::{original_of_part, part_path, render_part_header};

/// Runs the complete rewrite pipeline with the given configuration.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration is invalid
/// - Root directory doesn't exist or is inaccessible
/// - The run report cannot be written
///
/// Individual file failures are reported in [`PipelineStats`], not here.
///
/// # Examples
///
/// ```no_run
/// use llm_rewrite::{run, Config, Result};
///
/// # fn main() -> anyhow::Result<()> {
/// let config = Config::builder()
///     .root_dir(".")
///     .prompt("uppercase")
///     .build()?;
///
/// run(config, |_: &str, input: &str| -> Result<String> { Ok(input.to_uppercase()) })?;
/// # Ok(())
/// # }
/// ```
pub fn run<T: Transform>(config: Config, transformer: T) -> Result<PipelineStats> {
    Pipeline::new(config, transformer)?.run()
}
