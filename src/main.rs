use anyhow::{bail, Context};
use clap::Parser;
use llm_rewrite::{
    load_prompt, ChunkTransformer, Config, FileFilterConfig, GeminiClient, GeminiConfig,
    Pipeline, API_KEY_ENV, DEFAULT_CHUNK_LINES,
};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "llm-rewrite",
    version,
    author,
    about = "Rewrite every text file in a folder with an LLM prompt",
    long_about = "Apply one natural-language instruction to every text file in a folder.\n\n\
    Each file is sent to a Gemini model together with the prompt and the answer \
    replaces the file. Files longer than --chunk-lines lines are processed in chunks \
    and either merged back or written as numbered part files (--divide).\n\n\
    USAGE EXAMPLES:\n  \
      # Translate comments in a project\n  \
      llm-rewrite ./src prompt.txt\n\n  \
      # Preview what would be sent\n  \
      llm-rewrite ./docs prompt.txt --dry-run\n\n  \
      # Split large files into parts, keeping backups\n  \
      llm-rewrite ./data prompt.txt --divide --backup --report run.json"
)]
struct Cli {
    /// Folder whose files are rewritten
    #[arg(value_name = "FOLDER")]
    folder: PathBuf,

    /// File containing the transformation prompt
    #[arg(value_name = "PROMPT_FILE")]
    prompt_file: PathBuf,

    /// Write each chunk of a large file to its own part file and delete the original
    #[arg(long)]
    divide: bool,

    /// Dry run (no requests, no file writes)
    #[arg(long)]
    dry_run: bool,

    /// Keep a timestamped copy of each original before it is rewritten or deleted
    #[arg(long)]
    backup: bool,

    /// Write a JSON run report to this path
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,

    /// Glob of files to leave alone (can be used multiple times)
    #[arg(long, value_name = "GLOB")]
    exclude: Vec<String>,

    /// Gemini model name
    #[arg(long, value_name = "MODEL")]
    model: Option<String>,

    /// Gemini API key
    #[arg(long, env = API_KEY_ENV, hide_env_values = true)]
    api_key: Option<String>,

    /// Base URL of the Gemini REST API
    #[arg(long, value_name = "URL")]
    endpoint: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Large-file threshold and chunk size, in lines
    #[arg(long, default_value_t = DEFAULT_CHUNK_LINES)]
    chunk_lines: usize,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_tracing(cli.verbose)?;

    if !cli.folder.is_dir() {
        bail!("Folder not found: {}", cli.folder.display());
    }

    let prompt = load_prompt(&cli.prompt_file)
        .with_context(|| format!("Failed to load prompt from {}", cli.prompt_file.display()))?;

    let mut builder = Config::builder()
        .root_dir(&cli.folder)
        .prompt(prompt)
        .divide(cli.divide)
        .chunk_lines(cli.chunk_lines)
        .dry_run(cli.dry_run)
        .backup_originals(cli.backup)
        .file_filter_config(
            FileFilterConfig::default()
                .exclude_files(cli.exclude)
                .exclude_directories(vec!["**/.git".to_string(), "**/target".to_string()]),
        );

    if let Some(report) = cli.report {
        builder = builder.report_path(report);
    }

    let config = builder.build().context("Failed to build configuration")?;

    let api_key = match cli.api_key {
        Some(key) if !key.trim().is_empty() => key.trim().to_string(),
        _ if cli.dry_run => String::from("dry-run"),
        _ => bail!("Missing API key: pass --api-key or set {API_KEY_ENV}"),
    };

    let mut gemini = GeminiConfig::new(api_key);
    if let Some(model) = cli.model {
        gemini.model = model;
    }
    if let Some(endpoint) = cli.endpoint {
        gemini.base_url = endpoint;
    }
    if let Some(timeout) = cli.timeout {
        gemini.timeout_secs = timeout;
    }

    let client = GeminiClient::new(gemini).context("Failed to create Gemini client")?;

    let stats = Pipeline::new(config, ChunkTransformer::new(client))
        .context("Failed to create pipeline")?
        .run()
        .context("Rewrite failed")?;

    stats.print_summary();

    Ok(())
}

fn setup_tracing(verbosity: u8) -> anyhow::Result<()> {
    let filter = match verbosity {
        0 => EnvFilter::new("llm_rewrite=info"),
        1 => EnvFilter::new("llm_rewrite=debug"),
        _ => EnvFilter::new("llm_rewrite=trace"),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_thread_ids(false))
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(())
}
