//! Logging setup for the `frostline` binary.
//!
//! Two `tracing-subscriber` layers share one registry: a plain-text file under the logs directory,
//! kept to a few size-capped generations (`frostline.log`, `frostline.log.1`, ...), and a
//! colored stderr layer. Both honor `RUST_LOG`; `--verbose` forces debug on stderr only.

use anyhow::{Context, Result};
use frostline_protocol::paths::default_logs_dir;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const LOGGED_CRATES: &[&str] = &[
    "frostline",
    "frostline_db",
    "frostline_sinks",
    "frostline_protocol",
];
const GENERATIONS: usize = 5;
const GENERATION_BYTES: u64 = 10 * 1024 * 1024;

pub struct LogConfig<'a> {
    /// Base name of the log file.
    pub app_name: &'a str,
    pub verbose: bool,
    /// Overrides `~/.frostline/logs`.
    pub log_dir: Option<PathBuf>,
}

pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let dir = config.log_dir.unwrap_or_else(default_logs_dir);
    let log = CappedLog::open(&dir, config.app_name, GENERATIONS, GENERATION_BYTES)
        .with_context(|| format!("Failed to open log file in {}", dir.display()))?;

    let stderr_filter = if config.verbose {
        directives("debug")
    } else {
        env_or_default()
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(log))
                .with_ansi(false)
                .with_filter(env_or_default()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_filter(stderr_filter),
        )
        .try_init()
        .context("Failed to install tracing subscriber")
}

fn env_or_default() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| directives("info"))
}

fn directives(level: &str) -> EnvFilter {
    let joined = LOGGED_CRATES
        .iter()
        .map(|krate| format!("{}={}", krate, level))
        .collect::<Vec<_>>()
        .join(",");
    EnvFilter::new(joined)
}

/// Append-only log file that shifts to a new generation once it reaches `cap` bytes.
struct CappedLog {
    base: PathBuf,
    generations: usize,
    cap: u64,
    file: File,
    written: u64,
}

impl CappedLog {
    fn open(dir: &Path, name: &str, generations: usize, cap: u64) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let stem: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        let base = dir.join(format!("{}.log", stem));
        let (file, written) = append_to(&base)?;
        let mut log = Self {
            base,
            generations: generations.max(1),
            cap,
            file,
            written,
        };
        if log.written >= log.cap {
            log.shift()?;
        }
        Ok(log)
    }

    fn generation(&self, n: usize) -> PathBuf {
        let mut name = self.base.clone().into_os_string();
        name.push(format!(".{}", n));
        PathBuf::from(name)
    }

    /// `base.log.(k)` becomes `base.log.(k+1)`, the oldest falls off, and `base.log` restarts.
    fn shift(&mut self) -> io::Result<()> {
        self.file.flush()?;
        let oldest = self.generations - 1;
        if oldest > 0 {
            match fs::remove_file(self.generation(oldest)) {
                Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e),
                _ => {}
            }
            for n in (1..oldest).rev() {
                let from = self.generation(n);
                if from.exists() {
                    fs::rename(&from, self.generation(n + 1))?;
                }
            }
            fs::rename(&self.base, self.generation(1))?;
        } else {
            fs::remove_file(&self.base)?;
        }
        let (file, written) = append_to(&self.base)?;
        self.file = file;
        self.written = written;
        Ok(())
    }
}

impl Write for CappedLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > 0 && self.written + buf.len() as u64 > self.cap {
            self.shift()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

fn append_to(path: &Path) -> io::Result<(File, u64)> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let len = file.metadata()?.len();
    Ok((file, len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shifts_generations_and_drops_the_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = CappedLog::open(dir.path(), "frostline", 3, 16).unwrap();

        let lines = [
            b"first-line-0001\n",
            b"second-line-002\n",
            b"third-line-0003\n",
            b"fourth-line-004\n",
        ];
        for line in lines {
            log.write_all(line).unwrap();
        }
        log.flush().unwrap();

        let read = |name: &str| fs::read_to_string(dir.path().join(name)).unwrap();
        assert_eq!(read("frostline.log"), "fourth-line-004\n");
        assert_eq!(read("frostline.log.1"), "third-line-0003\n");
        assert_eq!(read("frostline.log.2"), "second-line-002\n");
        assert!(!dir.path().join("frostline.log.3").exists());
    }

    #[test]
    fn app_name_is_made_file_safe() {
        let dir = tempfile::tempdir().unwrap();
        CappedLog::open(dir.path(), "frost line/run", 2, 1024).unwrap();
        assert!(dir.path().join("frost_line_run.log").exists());
    }

    #[test]
    fn single_generation_truncates_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = CappedLog::open(dir.path(), "one", 1, 8).unwrap();
        log.write_all(b"aaaaaaa\n").unwrap();
        log.write_all(b"bbbbbbb\n").unwrap();
        log.flush().unwrap();

        assert_eq!(fs::read_to_string(dir.path().join("one.log")).unwrap(), "bbbbbbb\n");
        assert!(!dir.path().join("one.log.1").exists());
    }
}
