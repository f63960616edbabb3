pub mod agent_core;
pub mod config;
pub mod inference;
pub mod mcp_client;

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Environment variable overriding the data directory.
pub const HOME_ENV_VAR: &str = "MCPBRIDGE_HOME";

/// Return the directory for logs and other runtime state.
///
/// `$MCPBRIDGE_HOME` if set, otherwise `~/.mcpbridge/`. Falls back to
/// `./.mcpbridge/` only if the home directory cannot be resolved.
pub fn data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(HOME_ENV_VAR).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mcpbridge")
}

/// Where log output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    /// Rotated `agent.log` in the data directory.
    File,
    Stderr,
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the default `mcpbridge=info,warn` filter. With
/// [`LogTarget::File`] the previous `agent.log` files are rotated first and
/// the fresh file is flushed line by line.
///
/// Returns the log file path, if logging to a file.
pub fn init_tracing(target: LogTarget) -> io::Result<Option<PathBuf>> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("mcpbridge=info,warn"));

    let log_path = match target {
        LogTarget::Stderr => {
            fmt::fmt()
                .with_env_filter(filter)
                .with_writer(io::stderr)
                .with_target(true)
                .init();
            None
        }
        LogTarget::File => {
            let log_dir = data_dir();
            std::fs::create_dir_all(&log_dir)?;
            let log_path = log_dir.join("agent.log");
            rotate_log_file(&log_path, LOG_BACKUPS);

            let log_file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)?;

            fmt::fmt()
                .with_env_filter(filter)
                .with_writer(FlushingWriter::new(log_file))
                .with_ansi(false)
                .with_target(true)
                .init();
            Some(log_path)
        }
    };

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_file = %log_path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<stderr>".into()),
        pid = std::process::id(),
        "=== mcpbridge starting ==="
    );

    Ok(log_path)
}

/// Numbered backups kept next to `agent.log`.
const LOG_BACKUPS: u32 = 3;

/// Shift `base` into `base.1`, `base.1` into `base.2` and so on, deleting
/// whatever would land past `base.{keep}`.
fn rotate_log_file(base: &Path, keep: u32) {
    let backup = |n: u32| {
        let mut name = base.as_os_str().to_owned();
        name.push(format!(".{n}"));
        PathBuf::from(name)
    };

    let _ = std::fs::remove_file(backup(keep));
    for n in (1..keep).rev() {
        let _ = std::fs::rename(backup(n), backup(n + 1));
    }
    if base.exists() {
        let _ = std::fs::rename(base, backup(1));
    }
}

/// Shared log file handle that flushes after every write.
#[derive(Clone)]
struct FlushingWriter(Arc<Mutex<File>>);

impl FlushingWriter {
    fn new(file: File) -> Self {
        Self(Arc::new(Mutex::new(file)))
    }

    fn with_file<T>(&self, op: impl FnOnce(&mut File) -> io::Result<T>) -> io::Result<T> {
        let mut file = self
            .0
            .lock()
            .map_err(|_| io::Error::other("log file lock poisoned"))?;
        op(&mut *file)
    }
}

impl Write for FlushingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.with_file(|file| {
            let n = file.write(buf)?;
            file.flush()?;
            Ok(n)
        })
    }

    fn flush(&mut self) -> io::Result<()> {
        self.with_file(|file| file.flush())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for FlushingWriter {
    type Writer = FlushingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotate_log_file_shifts_and_drops_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("agent.log");
        for (name, body) in [
            ("agent.log", "current"),
            ("agent.log.1", "one"),
            ("agent.log.2", "two"),
            ("agent.log.3", "three"),
        ] {
            std::fs::write(dir.path().join(name), body).unwrap();
        }

        rotate_log_file(&base, 3);

        assert!(!base.exists());
        let read = |n: &str| std::fs::read_to_string(dir.path().join(n)).unwrap();
        assert_eq!(read("agent.log.1"), "current");
        assert_eq!(read("agent.log.2"), "one");
        assert_eq!(read("agent.log.3"), "two");
    }

    #[test]
    fn test_rotate_log_file_missing_chain() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("agent.log");
        rotate_log_file(&base, 3);
        assert!(!base.exists());
    }

    #[test]
    fn test_flushing_writer_writes_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.log");
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = FlushingWriter::new(file);
        writer.write_all(b"line one\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "line one\n");
    }
}
