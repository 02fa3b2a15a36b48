use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, LevelFilter, SharedLogger, TermLogger,
    TerminalMode, WriteLogger,
};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use verso_platform::AppPaths;

pub const MAX_LOG_SIZE: u64 = 5 * 1024 * 1024;

/// Appends to the log file, reopening it if it was deleted underneath us.
struct ResilientFileWriter {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl ResilientFileWriter {
    fn new(path: PathBuf) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(Some(file)),
        })
    }

    fn ensure_file(&self) -> io::Result<()> {
        let mut guard = self
            .file
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if !self.path.exists() {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            *guard = Some(
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)?,
            );
        }

        Ok(())
    }
}

impl Write for ResilientFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.ensure_file()?;
        let mut guard = self
            .file
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match guard.as_mut() {
            Some(file) => file.write(buf),
            None => Err(io::Error::other("log file not available")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut guard = self
            .file
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.as_mut().map_or(Ok(()), File::flush)
    }
}

/// Keeps the newer half of the log once it grows past `max_log_size`.
fn trim_log_file_if_oversized(log_path: &Path, max_log_size: u64) {
    if let Ok(metadata) = std::fs::metadata(log_path)
        && metadata.len() > max_log_size
        && let Ok(contents) = std::fs::read(log_path)
    {
        let half = contents.len() / 2;
        let keep_from = contents[half..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(half, |pos| half + pos + 1);
        let _ = std::fs::write(log_path, &contents[keep_from..]);
    }
}

fn level_for(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// File logging always, terminal logging on stderr with `--verbose`.
///
/// Logging problems never stop the command from running.
pub fn init_logging(paths: &AppPaths, verbose: bool, max_log_size: u64) {
    let _ = paths.ensure_dirs();
    let log_path = paths.log_file();
    trim_log_file_if_oversized(&log_path, max_log_size);

    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .add_filter_allow_str("verso")
        .build();
    let level = level_for(verbose);

    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
    if verbose {
        loggers.push(TermLogger::new(
            level,
            config.clone(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ));
    }
    match ResilientFileWriter::new(log_path.clone()) {
        Ok(writer) => loggers.push(WriteLogger::new(level, config, writer)),
        Err(error) if verbose => {
            eprintln!("Cannot write log file {}: {error}", log_path.display());
        }
        Err(_) => {}
    }

    if !loggers.is_empty() {
        let _ = CombinedLogger::init(loggers);
    }
    log::set_max_level(level);
    log::debug!("Logging to {}", log_path.display());
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::{ResilientFileWriter, level_for, trim_log_file_if_oversized};
    use simplelog::LevelFilter;

    #[test]
    fn resilient_writer_recreates_missing_file_on_write() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let log_path = temp_dir.path().join("verso.log");
        let mut writer =
            ResilientFileWriter::new(log_path.clone()).expect("writer should open log file");

        writer.write_all(b"first line\n").unwrap();
        std::fs::remove_file(&log_path).unwrap();
        writer
            .write_all(b"second line\n")
            .expect("writer should recreate file after deletion");

        let contents = std::fs::read_to_string(&log_path).unwrap();
        assert_eq!(contents, "second line\n");
    }

    #[test]
    fn trim_keeps_recent_half_on_line_boundary() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let log_path = temp_dir.path().join("verso.log");
        std::fs::write(&log_path, "line-1\nline-2\nline-3\nline-4\nline-5\n").unwrap();

        trim_log_file_if_oversized(&log_path, 10);

        let trimmed = std::fs::read_to_string(&log_path).unwrap();
        assert!(trimmed.starts_with("line-4\n") || trimmed.starts_with("line-3\n"));
        assert!(!trimmed.contains("line-1"));
    }

    #[test]
    fn small_log_is_left_alone() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let log_path = temp_dir.path().join("verso.log");
        std::fs::write(&log_path, "line-1\n").unwrap();

        trim_log_file_if_oversized(&log_path, 1024);

        assert_eq!(std::fs::read_to_string(&log_path).unwrap(), "line-1\n");
    }

    #[test]
    fn verbose_raises_level_to_debug() {
        assert_eq!(level_for(true), LevelFilter::Debug);
        assert_eq!(level_for(false), LevelFilter::Info);
    }
}
