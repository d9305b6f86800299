use std::fs;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;

use crate::stats::RunStats;
use crate::status::GroupStatus;
use crate::types::ActionResult;

/// Simple file logger for rename operations with buffered writes
pub struct FileLogger {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl FileLogger {
    /// Create a new file logger, writing to ~/logs/episode-rename/episode_rename_<timestamp>.log
    pub fn new() -> Result<Self> {
        let log_dir = crate::config::LOG_DIR
            .as_deref()
            .context("Failed to get home directory")?;
        let log_path = log_dir.join(format!(
            "episode_rename_{}.log",
            Local::now().format("%Y-%m-%d_%H-%M-%S")
        ));
        Self::with_path(&log_path)
    }

    /// Create a file logger appending to the given file.
    pub fn with_path(log_path: &Path) -> Result<Self> {
        if let Some(log_dir) = log_path.parent()
            && !log_dir.as_os_str().is_empty()
            && !log_dir.exists()
        {
            fs::create_dir_all(log_dir).context("Failed to create log directory")?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
            .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;

        Ok(Self {
            writer: BufWriter::new(file),
            path: log_path.to_path_buf(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn timestamp() -> String {
        Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
    }

    /// Log when starting the program
    pub fn log_init(&mut self, root: &Path, settings: &[(&str, String)]) {
        let _ = writeln!(self.writer, "[{}] INIT \"{}\"", Self::timestamp(), root.display());
        for (key, value) in settings {
            let _ = writeln!(self.writer, "  {key}: {value}");
        }
        let _ = self.writer.flush();
    }

    /// Log the status of a scanned folder
    pub fn log_folder(&mut self, folder: &Path, status: GroupStatus) {
        let _ = writeln!(
            self.writer,
            "[{}] FOLDER  \"{}\" | {}",
            Self::timestamp(),
            folder.display(),
            status
        );
        let _ = self.writer.flush();
    }

    /// Log the outcome of one primary file
    pub fn log_result(&mut self, result: ActionResult, source: &Path, dest: &Path) {
        let _ = writeln!(
            self.writer,
            "[{}] {:<7} \"{}\" -> \"{}\"",
            Self::timestamp(),
            result.label(),
            source.display(),
            dest.display()
        );
        let _ = self.writer.flush();
    }

    /// Log final statistics
    pub fn log_stats(&mut self, stats: &RunStats) {
        let _ = writeln!(self.writer, "[{}] STATISTICS", Self::timestamp());
        let _ = writeln!(self.writer, "  Files attempted: {}", stats.total_attempted());
        for result in ActionResult::ALL {
            let _ = writeln!(self.writer, "    - {:<8} {}", result.label(), stats.count(result));
        }
        if stats.interrupted {
            let _ = writeln!(self.writer, "  Interrupted");
        }
        let _ = writeln!(
            self.writer,
            "  Total time: {}",
            crate::format_duration(stats.total_duration)
        );
        let _ = writeln!(self.writer, "[{}] END", Self::timestamp());
        let _ = self.writer.flush();
    }
}

#[cfg(test)]
mod logger_tests {
    use super::*;

    use std::time::Duration;

    use tempfile::tempdir;

    #[test]
    fn writes_init_results_and_statistics() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("logs").join("run.log");
        let mut logger = FileLogger::with_path(&log_path).unwrap();
        assert_eq!(logger.path(), log_path);

        logger.log_init(Path::new("/tv"), &[("overwrite", "false".to_string())]);
        logger.log_folder(Path::new("/tv/Show/Season 1"), GroupStatus::Ok);
        logger.log_result(ActionResult::Success, Path::new("/tv/a.mkv"), Path::new("/tv/b.mkv"));
        logger.log_result(ActionResult::Failed, Path::new("/tv/c.mkv"), Path::new("/tv/d.mkv"));

        let mut stats = RunStats::new();
        stats.add_result(ActionResult::Success, Duration::from_secs(1));
        stats.add_result(ActionResult::Failed, Duration::ZERO);
        logger.log_stats(&stats);

        let content = fs::read_to_string(&log_path).unwrap();
        assert!(content.contains("INIT \"/tv\""));
        assert!(content.contains("  overwrite: false"));
        assert!(content.contains("FOLDER  \"/tv/Show/Season 1\" | OK"));
        assert!(content.contains("SUCCESS \"/tv/a.mkv\" -> \"/tv/b.mkv\""));
        assert!(content.contains("FAILED  \"/tv/c.mkv\" -> \"/tv/d.mkv\""));
        assert!(content.contains("Files attempted: 2"));
        assert!(content.trim_end().ends_with("END"));
    }

    #[test]
    fn appends_to_existing_log() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("run.log");
        fs::write(&log_path, "previous\n").unwrap();

        let mut logger = FileLogger::with_path(&log_path).unwrap();
        logger.log_result(ActionResult::SourceMissing, Path::new("a"), Path::new("b"));
        drop(logger);

        let content = fs::read_to_string(&log_path).unwrap();
        assert!(content.starts_with("previous\n"));
        assert!(content.contains("MISSING"));
    }
}
