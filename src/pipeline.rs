use crate::{
    config::{Config, OutputMode},
    error::{Error, Result},
    file::SourceFile,
    large::{LargeFilePipeline, LargeOutcome},
    scanner::{ScanStats, Scanner},
    splitter::Splitter,
    transform::Transform,
    writer::{original_of_part, FileReport, RunReport, Writer},
};
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// What happened to one file.
#[derive(Debug, Clone)]
pub enum ProcessingOutcome {
    /// The file was rewritten in place
    Modified,
    /// The file was split into part files and the original removed
    Divided {
        /// Part files in chunk order
        parts: Vec<PathBuf>,
    },
    /// Nothing to write: the file or the transformed text was empty
    SkippedNoContent,
    /// The file was left untouched
    Failed(Error),
}

impl ProcessingOutcome {
    /// Short label used in logs and in the run report.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Modified => "modified",
            Self::Divided { .. } => "divided",
            Self::SkippedNoContent => "skipped",
            Self::Failed(_) => "failed",
        }
    }

    fn to_report(&self, file: &SourceFile) -> FileReport {
        let (parts, detail) = match self {
            Self::Divided { parts } => (
                parts.iter().map(|p| p.display().to_string()).collect(),
                None,
            ),
            Self::SkippedNoContent => (Vec::new(), Some("no content".to_string())),
            Self::Failed(e) => (Vec::new(), Some(e.to_string())),
            Self::Modified => (Vec::new(), None),
        };

        FileReport {
            path: file.relative_path.clone(),
            outcome: self.label(),
            parts,
            detail,
        }
    }
}

/// Statistics collected during pipeline execution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineStats {
    /// Files discovered by the scanner
    pub scan: ScanStats,

    /// Files handed to the driver
    pub total_files: usize,

    /// Files rewritten in place
    pub modified: usize,

    /// Files replaced by part files
    pub divided: usize,

    /// Files skipped for lack of content
    pub skipped: usize,

    /// Files left untouched after a failure
    pub failed: usize,

    /// Files that went through the chunked pipeline
    pub large_files: usize,

    /// Chunks produced for large files
    pub total_chunks: usize,

    /// Part files written (divide mode)
    pub parts_written: usize,

    /// Completion requests sent (planned requests in dry run mode)
    pub requests: usize,

    /// True if no model was called and no file was touched
    pub dry_run: bool,

    /// Total execution time
    pub duration: Duration,

    /// Time spent scanning
    pub scan_duration: Duration,

    /// Time spent transforming and writing
    pub process_duration: Duration,
}

impl PipelineStats {
    /// Returns true if at least one file failed.
    #[must_use]
    pub const fn has_failures(&self) -> bool {
        self.failed > 0
    }

    fn record(&mut self, outcome: &ProcessingOutcome) {
        match outcome {
            ProcessingOutcome::Modified => self.modified += 1,
            ProcessingOutcome::Divided { parts } => {
                self.divided += 1;
                self.parts_written += parts.len();
            }
            ProcessingOutcome::SkippedNoContent => self.skipped += 1,
            ProcessingOutcome::Failed(_) => self.failed += 1,
        }
    }

    /// Prints a human-readable summary to stdout.
    pub fn print_summary(&self) {
        println!("\n╔═══════════════════════════════════════════════════════╗");
        if self.dry_run {
            println!("║                 Dry Run Summary                       ║");
        } else {
            println!("║              Rewrite Execution Summary                ║");
        }
        println!("╠═══════════════════════════════════════════════════════╣");
        println!(
            "║ Files Scanned:        {:>8}                        ║",
            self.scan.total_files
        );
        println!(
            "║   - Text files:       {:>8}                        ║",
            self.scan.text_files
        );
        println!(
            "║   - Binary files:     {:>8}                        ║",
            self.scan.binary_files
        );
        println!(
            "║   - Unreadable:       {:>8}                        ║",
            self.scan.errors
        );
        println!("║                                                       ║");
        println!(
            "║ Large Files:          {:>8}                        ║",
            self.large_files
        );
        println!(
            "║ Chunks:               {:>8}                        ║",
            self.total_chunks
        );
        println!(
            "║ Requests:             {:>8}                        ║",
            self.requests
        );
        println!("║                                                       ║");
        if self.dry_run {
            println!("║ ⚠ No files were modified (dry run mode)               ║");
        } else {
            println!(
                "║ Modified:             {:>8}                        ║",
                self.modified
            );
            println!(
                "║ Divided:              {:>8}                        ║",
                self.divided
            );
            println!(
                "║   - Part files:       {:>8}                        ║",
                self.parts_written
            );
            println!(
                "║ Skipped:              {:>8}                        ║",
                self.skipped
            );
            println!(
                "║ Failed:               {:>8}                        ║",
                self.failed
            );
        }
        println!("║                                                       ║");
        println!("║ Timing Breakdown:                                     ║");
        println!(
            "║   - Scanning:         {:>8.2}s                     ║",
            self.scan_duration.as_secs_f64()
        );
        println!(
            "║   - Processing:       {:>8.2}s                     ║",
            self.process_duration.as_secs_f64()
        );
        println!(
            "║   - Total:            {:>8.2}s                     ║",
            self.duration.as_secs_f64()
        );
        println!("╚═══════════════════════════════════════════════════════╝\n");
    }
}

/// Applies one prompt to every file under a root directory.
pub struct Pipeline<T> {
    config: Config,
    scanner: Scanner,
    splitter: Splitter,
    writer: Writer,
    transformer: T,
}

impl<T: Transform> Pipeline<T> {
    /// Creates a new pipeline with the given configuration and transformer.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration validation fails
    /// - A filter pattern is invalid
    pub fn new(config: Config, transformer: T) -> Result<Self> {
        config.validate()?;

        let scanner = Scanner::new(&config)?;
        let splitter = Splitter::new(&config);
        let writer = Writer::new(&config);

        Ok(Self {
            config,
            scanner,
            splitter,
            writer,
            transformer,
        })
    }

    /// Processes every discovered file and returns statistics.
    ///
    /// # Process
    ///
    /// 1. **Scan**: discovers and reads text files under the root directory
    /// 2. **Transform**: sends each file (or each chunk of a large file) to the transformer
    /// 3. **Write**: rewrites the file, or writes part files and removes the original
    ///
    /// A failing file is logged and left untouched; the batch continues.
    ///
    /// # Errors
    ///
    /// Returns an error only if the root directory cannot be listed or the
    /// run report cannot be written.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use llm_rewrite::{Config, Pipeline, Result};
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let config = Config::builder()
    ///     .root_dir("./docs")
    ///     .prompt("Fix spelling mistakes")
    ///     .build()?;
    ///
    /// let shout = |_: &str, input: &str| -> Result<String> { Ok(input.to_uppercase()) };
    /// let stats = Pipeline::new(config, shout)?.run()?;
    /// stats.print_summary();
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip(self), fields(root_dir = %self.config.root_dir.display()))]
    pub fn run(self) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let mut stats = PipelineStats {
            dry_run: self.config.dry_run,
            ..PipelineStats::default()
        };

        info!("Starting rewrite in {:?} mode", self.config.mode);

        info!("Stage 1/2: Scanning directory...");
        let scan_start = Instant::now();
        let (mut files, scan_stats) = self.scanner.scan()?;
        if self.config.mode == OutputMode::Divide {
            skip_stale_parts(&mut files);
        }
        stats.scan = scan_stats;
        stats.scan_duration = scan_start.elapsed();
        stats.total_files = files.len();

        info!(
            "✓ Found {} text file(s) in {:.2}s",
            files.len(),
            stats.scan_duration.as_secs_f64()
        );

        let process_start = Instant::now();
        let reports = if self.config.dry_run {
            warn!("Dry run mode enabled - no requests, no file writes");
            self.plan(&files, &mut stats)
        } else {
            info!("Stage 2/2: Transforming files...");
            files
                .iter()
                .map(|file| {
                    let outcome = self.process_file(file, &mut stats);
                    stats.record(&outcome);
                    outcome.to_report(file)
                })
                .collect()
        };
        stats.process_duration = process_start.elapsed();
        stats.duration = start_time.elapsed();

        if let Some(ref path) = self.config.report_path {
            if self.config.dry_run {
                info!("Dry run: not writing report to {}", path.display());
            } else {
                let report = RunReport::new(&self.config, &stats, reports);
                self.writer.write_report(path, &report)?;
            }
        }

        info!(
            "✓ Done in {:.2}s: {} modified, {} divided, {} skipped, {} failed",
            stats.duration.as_secs_f64(),
            stats.modified,
            stats.divided,
            stats.skipped,
            stats.failed
        );

        Ok(stats)
    }

    /// Transforms one file and applies the result to disk.
    #[instrument(skip_all, fields(file = %file.relative_path))]
    fn process_file(&self, file: &SourceFile, stats: &mut PipelineStats) -> ProcessingOutcome {
        if file.is_empty() {
            info!("Skipping {}: file is empty", file.relative_path);
            return ProcessingOutcome::SkippedNoContent;
        }

        let prompt = self.config.prompt.as_str();
        let line_count = file.line_count();

        if !self.config.is_large(line_count) {
            debug!("Transforming {} ({} lines) in one request", file.relative_path, line_count);
            stats.requests += 1;

            return match self.transformer.transform(prompt, &file.content) {
                Ok(text) => self.write_back(file, &text),
                Err(e) => self.fail(file, e),
            };
        }

        stats.large_files += 1;
        let total = self.splitter.chunk_count(line_count);
        stats.total_chunks += total;

        let large = LargeFilePipeline::new(self.splitter, &self.writer);
        match large.process(file, prompt, self.config.mode, &self.transformer) {
            Ok(LargeOutcome::Merged(text)) => {
                stats.requests += total;
                self.write_back(file, &text)
            }
            Ok(LargeOutcome::Divided(parts)) => {
                stats.requests += total;
                if let Err(e) = self.writer.remove_original(file) {
                    warn!(
                        "Wrote {} part file(s) but could not remove {}: {}",
                        parts.len(),
                        file.relative_path,
                        e
                    );
                } else {
                    info!(
                        "Divided {} into {} part file(s)",
                        file.relative_path,
                        parts.len()
                    );
                }
                ProcessingOutcome::Divided { parts }
            }
            Err(e) => {
                if let Error::Chunk { index, .. } = &e {
                    stats.requests += *index;
                }
                if matches!(e.root_cause(), Error::EmptyResult) {
                    warn!("Skipping {}: {}", file.relative_path, e);
                    return ProcessingOutcome::SkippedNoContent;
                }
                self.fail(file, e)
            }
        }
    }

    fn write_back(&self, file: &SourceFile, text: &str) -> ProcessingOutcome {
        if text.is_empty() {
            warn!(
                "Skipping {}: transformation returned no content",
                file.relative_path
            );
            return ProcessingOutcome::SkippedNoContent;
        }

        match self.writer.write_back(file, text) {
            Ok(()) => {
                info!("Modified {}", file.relative_path);
                ProcessingOutcome::Modified
            }
            Err(e) => self.fail(file, e),
        }
    }

    fn fail(&self, file: &SourceFile, e: Error) -> ProcessingOutcome {
        warn!("Skipping {}: {}", file.relative_path, e);
        ProcessingOutcome::Failed(e)
    }

    /// Logs what a real run would do, without calling the transformer.
    fn plan(&self, files: &[SourceFile], stats: &mut PipelineStats) -> Vec<FileReport> {
        files
            .iter()
            .map(|file| {
                let line_count = file.line_count();
                let detail = if file.is_empty() {
                    stats.skipped += 1;
                    "empty, would be skipped".to_string()
                } else if self.config.is_large(line_count) {
                    let total = self.splitter.chunk_count(line_count);
                    stats.large_files += 1;
                    stats.total_chunks += total;
                    stats.requests += total;
                    match self.config.mode {
                        OutputMode::Merge => format!("{total} chunks, merged back"),
                        OutputMode::Divide => format!("{total} chunks, divided into parts"),
                    }
                } else {
                    stats.requests += 1;
                    "one request".to_string()
                };

                info!("Plan: {} ({} lines): {}", file.relative_path, line_count, detail);

                FileReport {
                    path: file.relative_path.clone(),
                    outcome: "planned",
                    parts: Vec::new(),
                    detail: Some(detail),
                }
            })
            .collect()
    }
}

/// Drops part files left by an earlier divide run when their original is
/// about to be divided again; they would be overwritten anyway.
fn skip_stale_parts(files: &mut Vec<SourceFile>) {
    let originals: HashSet<PathBuf> = files.iter().map(|f| f.absolute_path.clone()).collect();

    files.retain(|file| {
        let stale = original_of_part(&file.absolute_path).is_some_and(|o| originals.contains(&o));
        if stale {
            info!("Leaving {} alone: part of a file being divided", file.relative_path);
        }
        !stale
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use std::cell::{Cell, RefCell};
    use std::fs;
    use std::path::Path;

    fn numbered_lines(count: usize) -> String {
        (1..=count).map(|i| format!("line {i}\n")).collect()
    }

    fn create_test_config(root: &Path) -> Config {
        Config::builder()
            .root_dir(root)
            .prompt("uppercase")
            .build()
            .unwrap()
    }

    fn uppercase(_: &str, input: &str) -> Result<String> {
        Ok(input.to_uppercase())
    }

    #[test]
    fn test_small_file_is_rewritten() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("notes.txt");
        file.write_str("one\ntwo\nthree\nfour\nfive\n").unwrap();

        let stats = Pipeline::new(create_test_config(temp.path()), uppercase)
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(
            fs::read_to_string(file.path()).unwrap(),
            "ONE\nTWO\nTHREE\nFOUR\nFIVE\n"
        );
        assert_eq!(stats.modified, 1);
        assert_eq!(stats.requests, 1);
        assert_eq!(stats.large_files, 0);
        assert!(!temp.child("notes.part1.txt").path().exists());
    }

    #[test]
    fn test_decode_failure_skips_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("a.txt");
        file.write_str("keep me\n").unwrap();

        let refuse = |_: &str, _: &str| -> Result<String> {
            crate::transform::extract_first_value("I cannot help with that.")
        };

        let stats = Pipeline::new(create_test_config(temp.path()), refuse)
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(stats.failed, 1);
        assert!(stats.has_failures());
        assert_eq!(fs::read_to_string(file.path()).unwrap(), "keep me\n");
    }

    #[test]
    fn test_threshold_routing() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("a_small.txt").write_str(&numbered_lines(300)).unwrap();
        temp.child("b_large.txt").write_str(&numbered_lines(301)).unwrap();

        let seen = RefCell::new(Vec::new());
        let record = |_: &str, input: &str| -> Result<String> {
            seen.borrow_mut().push(crate::file::line_count(input));
            Ok(input.to_string())
        };

        let stats = Pipeline::new(create_test_config(temp.path()), record)
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(*seen.borrow(), vec![300, 300, 1]);
        assert_eq!(stats.large_files, 1);
        assert_eq!(stats.total_chunks, 2);
        assert_eq!(stats.requests, 3);
        assert_eq!(stats.modified, 2);
    }

    #[test]
    fn test_batch_continues_after_failure() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("a.txt").write_str("first\n").unwrap();
        temp.child("b.txt").write_str("second\n").unwrap();
        temp.child("c.txt").write_str("third\n").unwrap();

        let fail_second = |_: &str, input: &str| -> Result<String> {
            if input.starts_with("second") {
                Err(Error::http_status(500, "internal"))
            } else {
                Ok(input.to_uppercase())
            }
        };

        let stats = Pipeline::new(create_test_config(temp.path()), fail_second)
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(stats.modified, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(fs::read_to_string(temp.path().join("a.txt")).unwrap(), "FIRST\n");
        assert_eq!(fs::read_to_string(temp.path().join("b.txt")).unwrap(), "second\n");
        assert_eq!(fs::read_to_string(temp.path().join("c.txt")).unwrap(), "THIRD\n");
    }

    #[test]
    fn test_empty_file_skipped_without_request() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("empty.txt").write_str("").unwrap();

        let calls = Cell::new(0);
        let count = |_: &str, input: &str| -> Result<String> {
            calls.set(calls.get() + 1);
            Ok(input.to_string())
        };

        let stats = Pipeline::new(create_test_config(temp.path()), count)
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(calls.get(), 0);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.requests, 0);
    }

    #[test]
    fn test_empty_result_is_skipped() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("a.txt");
        file.write_str("content\n").unwrap();

        let blank = |_: &str, _: &str| -> Result<String> { Ok(String::new()) };

        let stats = Pipeline::new(create_test_config(temp.path()), blank)
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(stats.skipped, 1);
        assert_eq!(fs::read_to_string(file.path()).unwrap(), "content\n");
    }

    #[test]
    fn test_merge_failure_leaves_original() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("big.txt");
        file.write_str(&numbered_lines(700)).unwrap();

        let calls = Cell::new(0);
        let fail_second = |_: &str, input: &str| -> Result<String> {
            calls.set(calls.get() + 1);
            if calls.get() == 2 {
                Err(Error::decode("response contains no JSON object"))
            } else {
                Ok(input.to_uppercase())
            }
        };

        let stats = Pipeline::new(create_test_config(temp.path()), fail_second)
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(stats.failed, 1);
        assert_eq!(stats.requests, 2);
        assert_eq!(fs::read_to_string(file.path()).unwrap(), numbered_lines(700));
    }

    #[test]
    fn test_divide_success_removes_original() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("big.txt");
        file.write_str(&numbered_lines(700)).unwrap();

        let config = Config::builder()
            .root_dir(temp.path())
            .prompt("uppercase")
            .divide(true)
            .build()
            .unwrap();

        let stats = Pipeline::new(config, uppercase).unwrap().run().unwrap();

        assert_eq!(stats.divided, 1);
        assert_eq!(stats.parts_written, 3);
        assert!(!file.path().exists());
        for n in 1..=3 {
            let part = fs::read_to_string(temp.path().join(format!("big.part{n}.txt"))).unwrap();
            assert!(part.starts_with(&format!(
                "Original file: big.txt\nPart: {n}/3\nPrompt: uppercase\n\n"
            )));
        }
    }

    #[test]
    fn test_divide_mode_small_file_is_rewritten_in_place() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("small.txt");
        file.write_str("abc\n").unwrap();

        let config = Config::builder()
            .root_dir(temp.path())
            .prompt("uppercase")
            .divide(true)
            .build()
            .unwrap();

        let stats = Pipeline::new(config, uppercase).unwrap().run().unwrap();

        assert_eq!(stats.modified, 1);
        assert_eq!(fs::read_to_string(file.path()).unwrap(), "ABC\n");
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("big.txt");
        file.write_str(&numbered_lines(700)).unwrap();

        let config = Config::builder()
            .root_dir(temp.path())
            .prompt("uppercase")
            .dry_run(true)
            .report_path(temp.path().join("report.json"))
            .build()
            .unwrap();

        let calls = Cell::new(0);
        let count = |_: &str, input: &str| -> Result<String> {
            calls.set(calls.get() + 1);
            Ok(input.to_uppercase())
        };

        let stats = Pipeline::new(config, count).unwrap().run().unwrap();

        assert!(stats.dry_run);
        assert_eq!(calls.get(), 0);
        assert_eq!(stats.requests, 3);
        assert_eq!(stats.modified, 0);
        assert_eq!(fs::read_to_string(file.path()).unwrap(), numbered_lines(700));
        assert!(!temp.child("report.json").path().exists());
    }

    #[test]
    fn test_run_report_is_written() {
        let temp = assert_fs::TempDir::new().unwrap();
        let src = temp.child("src");
        src.create_dir_all().unwrap();
        src.child("a.txt").write_str("abc\n").unwrap();
        let report_path = temp.path().join("reports/run.json");

        let config = Config::builder()
            .root_dir(src.path())
            .prompt("uppercase")
            .report_path(&report_path)
            .build()
            .unwrap();

        Pipeline::new(config, uppercase).unwrap().run().unwrap();

        let report: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&report_path).unwrap()).unwrap();
        assert_eq!(report["mode"], "merge");
        assert_eq!(report["stats"]["modified"], 1);
        assert_eq!(report["files"][0]["path"], "a.txt");
        assert_eq!(report["files"][0]["outcome"], "modified");
    }

    #[test]
    fn test_empty_directory_runs_cleanly() {
        let temp = assert_fs::TempDir::new().unwrap();

        let stats = Pipeline::new(create_test_config(temp.path()), uppercase)
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(stats.total_files, 0);
        assert!(!stats.has_failures());
    }

    fn divide_config(root: &Path) -> Config {
        Config::builder()
            .root_dir(root)
            .prompt("uppercase")
            .divide(true)
            .build()
            .unwrap()
    }

    #[test]
    fn test_divide_failure_keeps_original() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("big.txt");
        file.write_str(&numbered_lines(700)).unwrap();

        let calls = Cell::new(0);
        let fail_second = |_: &str, input: &str| -> Result<String> {
            calls.set(calls.get() + 1);
            if calls.get() == 2 {
                Err(Error::http_status(503, "overloaded"))
            } else {
                Ok(input.to_uppercase())
            }
        };

        let stats = Pipeline::new(divide_config(temp.path()), fail_second)
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(stats.failed, 1);
        assert_eq!(stats.divided, 0);
        assert_eq!(calls.get(), 2);
        assert_eq!(fs::read_to_string(file.path()).unwrap(), numbered_lines(700));
        assert!(temp.child("big.part1.txt").path().exists());
        assert!(!temp.child("big.part2.txt").path().exists());
        assert!(!temp.child("big.part3.txt").path().exists());
    }

    #[test]
    fn test_divide_removal_failure_still_counts_as_divided() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("big.txt");
        file.write_str(&numbered_lines(700)).unwrap();
        let original = file.path().to_path_buf();

        // Removing the original before the last chunk makes the final deletion fail.
        let calls = Cell::new(0);
        let vanish = |_: &str, input: &str| -> Result<String> {
            calls.set(calls.get() + 1);
            if calls.get() == 3 {
                fs::remove_file(&original).unwrap();
            }
            Ok(input.to_uppercase())
        };

        let config = Config::builder()
            .root_dir(temp.path())
            .prompt("uppercase")
            .divide(true)
            .report_path(temp.path().join("report.json"))
            .build()
            .unwrap();

        let stats = Pipeline::new(config, vanish).unwrap().run().unwrap();

        assert_eq!(stats.divided, 1);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.parts_written, 3);
        for n in 1..=3 {
            assert!(temp.path().join(format!("big.part{n}.txt")).exists());
        }

        let report: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(temp.path().join("report.json")).unwrap())
                .unwrap();
        assert_eq!(report["files"][0]["outcome"], "divided");
    }

    #[test]
    fn test_divide_empty_chunk_is_skipped_not_failed() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("big.txt");
        file.write_str(&numbered_lines(700)).unwrap();

        let calls = Cell::new(0);
        let blank_second = |_: &str, input: &str| -> Result<String> {
            calls.set(calls.get() + 1);
            if calls.get() == 2 {
                Ok(String::new())
            } else {
                Ok(input.to_uppercase())
            }
        };

        let stats = Pipeline::new(divide_config(temp.path()), blank_second)
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.failed, 0);
        assert_eq!(fs::read_to_string(file.path()).unwrap(), numbered_lines(700));
        assert!(!temp.child("big.part2.txt").path().exists());
    }

    #[test]
    fn test_divide_rerun_ignores_stale_parts() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("big.txt");
        file.write_str(&numbered_lines(700)).unwrap();
        temp.child("big.part1.txt").write_str("stale\n").unwrap();
        temp.child("other.part1.txt").write_str("keep\n").unwrap();

        let seen = RefCell::new(Vec::new());
        let record = |_: &str, input: &str| -> Result<String> {
            seen.borrow_mut().push(input.to_string());
            Ok(input.to_uppercase())
        };

        let stats = Pipeline::new(divide_config(temp.path()), record)
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(stats.total_files, 2);
        assert_eq!(stats.divided, 1);
        assert_eq!(stats.modified, 1);
        assert!(!seen.borrow().iter().any(|input| input == "stale\n"));
        assert!(!file.path().exists());

        let part1 = fs::read_to_string(temp.path().join("big.part1.txt")).unwrap();
        assert!(part1.starts_with("Original file: big.txt\nPart: 1/3\n"));
        assert_eq!(
            fs::read_to_string(temp.path().join("other.part1.txt")).unwrap(),
            "KEEP\n"
        );
    }
}
