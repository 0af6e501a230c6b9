//! Structured logging
//!
//! Sets up the global `tracing` subscriber from [`LoggingConfig`]: JSON or
//! text lines, written through a non-blocking worker to stdout or to a
//! size-rotated log file.

use crate::core::config::LoggingConfig;
use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Keeps the background log writer alive; drop it last in `main`.
pub struct Logger {
    _guard: WorkerGuard,
}

impl Logger {
    /// Install the global subscriber. `RUST_LOG`, when set, wins over
    /// `config.level`.
    pub fn init(config: &LoggingConfig) -> Result<Self> {
        let level = parse_log_level(&config.level)?;
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level.as_str()));

        let (writer, guard) = match config.output.as_str() {
            "stdout" => tracing_appender::non_blocking(io::stdout()),
            "file" => {
                let log_file = config.log_file.as_ref()
                    .context("log_file must be specified when output is 'file'")?;
                let appender = RollingFileAppender::open(
                    log_file,
                    config.max_file_size,
                    config.max_backups,
                )?;
                tracing_appender::non_blocking(appender)
            }
            other => anyhow::bail!("Invalid output configuration: {}", other),
        };

        let fmt_layer = match config.format.as_str() {
            "json" => fmt::layer()
                .json()
                .with_writer(writer)
                .with_span_events(FmtSpan::CLOSE)
                .with_current_span(true)
                .with_target(true)
                .boxed(),
            "text" => fmt::layer()
                .with_writer(writer)
                .with_span_events(FmtSpan::CLOSE)
                .with_target(true)
                .boxed(),
            other => anyhow::bail!("Invalid format configuration: {}", other),
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .context("Failed to initialize tracing subscriber")?;

        tracing::info!(
            level = %config.level,
            format = %config.format,
            output = %config.output,
            "Logging system initialized"
        );

        Ok(Logger { _guard: guard })
    }
}

fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!("Invalid log level: {}", level),
    }
}

struct ActiveFile {
    file: Option<File>,
    size: usize,
}

/// File writer that rotates `name` → `name.1` → ... → `name.<max_backups>`
/// once the active file would exceed `max_file_size` bytes.
pub struct RollingFileAppender {
    directory: PathBuf,
    filename: String,
    max_file_size: usize,
    max_backups: usize,
    active: Mutex<ActiveFile>,
}

impl RollingFileAppender {
    /// Create the parent directory if needed and prepare the appender
    pub fn open(log_file: &Path, max_file_size: usize, max_backups: usize) -> Result<Self> {
        let directory = log_file.parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(directory).context("Failed to create log directory")?;

        let filename = log_file.file_name()
            .context("Log file must have a filename")?
            .to_str()
            .context("Log filename must be valid UTF-8")?;

        Ok(Self {
            directory: directory.to_path_buf(),
            filename: filename.to_string(),
            max_file_size,
            max_backups,
            active: Mutex::new(ActiveFile { file: None, size: 0 }),
        })
    }

    fn current_path(&self) -> PathBuf {
        self.directory.join(&self.filename)
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        self.directory.join(format!("{}.{}", self.filename, index))
    }

    fn rotate(&self, active: &mut ActiveFile) -> io::Result<()> {
        active.file = None;

        for i in (1..self.max_backups).rev() {
            let from = self.backup_path(i);
            if from.exists() {
                std::fs::rename(&from, self.backup_path(i + 1))?;
            }
        }

        let current = self.current_path();
        if current.exists() {
            std::fs::rename(&current, self.backup_path(1))?;
        }

        active.size = 0;
        Ok(())
    }

    fn ensure_open(&self, active: &mut ActiveFile) -> io::Result<()> {
        if active.file.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.current_path())?;
            active.size = file.metadata()?.len() as usize;
            active.file = Some(file);
        }
        Ok(())
    }

    fn lock(&self) -> io::Result<std::sync::MutexGuard<'_, ActiveFile>> {
        self.active
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log file lock poisoned"))
    }
}

impl Write for RollingFileAppender {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut active = self.lock()?;
        self.ensure_open(&mut active)?;

        if active.size > 0 && active.size + buf.len() > self.max_file_size {
            self.rotate(&mut active)?;
            self.ensure_open(&mut active)?;
        }

        let written = match active.file.as_mut() {
            Some(file) => file.write(buf)?,
            None => return Err(io::Error::new(io::ErrorKind::Other, "log file not open")),
        };
        active.size += written;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut active = self.lock()?;
        match active.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_log_level() {
        assert!(matches!(parse_log_level("debug"), Ok(Level::DEBUG)));
        assert!(matches!(parse_log_level("INFO"), Ok(Level::INFO)));
        assert!(matches!(parse_log_level("warn"), Ok(Level::WARN)));
        assert!(matches!(parse_log_level("error"), Ok(Level::ERROR)));
        assert!(parse_log_level("trace").is_err());
    }

    #[test]
    fn test_rolling_appender_paths() {
        let dir = TempDir::new().unwrap();
        let appender = RollingFileAppender::open(&dir.path().join("conductor.log"), 1024, 5).unwrap();

        assert_eq!(appender.current_path(), dir.path().join("conductor.log"));
        assert_eq!(appender.backup_path(2), dir.path().join("conductor.log.2"));
    }

    #[test]
    fn test_rolling_appender_rotates() {
        let dir = TempDir::new().unwrap();
        let mut appender = RollingFileAppender::open(&dir.path().join("app.log"), 16, 2).unwrap();

        appender.write_all(b"0123456789\n").unwrap();
        appender.write_all(b"abcdefghij\n").unwrap();
        appender.write_all(b"ABCDEFGHIJ\n").unwrap();
        appender.flush().unwrap();

        let current = std::fs::read_to_string(dir.path().join("app.log")).unwrap();
        let first_backup = std::fs::read_to_string(dir.path().join("app.log.1")).unwrap();
        let second_backup = std::fs::read_to_string(dir.path().join("app.log.2")).unwrap();

        assert_eq!(current, "ABCDEFGHIJ\n");
        assert_eq!(first_backup, "abcdefghij\n");
        assert_eq!(second_backup, "0123456789\n");
    }
}
