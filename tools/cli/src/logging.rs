//! Subscriber setup.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter};

use sharehub_server::FilterHandle;

/// Install the global subscriber and return a handle to its filter.
///
/// `RUST_LOG` overrides `level` when set. With a `log_dir` output is
/// appended to `<log_dir>/<hostname>.log`, otherwise it goes to stderr.
pub fn init(level: &str, log_dir: Option<&Path>) -> Result<FilterHandle> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("Invalid log level: {}", level))?;
    let (filter, handle) = reload::Layer::new(filter);
    let registry = tracing_subscriber::registry().with(filter);

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Cannot create log dir {}", dir.display()))?;
            let path = log_file(dir);
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Cannot open log file {}", path.display()))?;

            registry
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .try_init()?;
        }
        None => {
            registry
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_writer(std::io::stderr)
                        .compact(),
                )
                .try_init()?;
        }
    }

    Ok(handle)
}

/// Per-host log file inside `dir`.
pub fn log_file(dir: &Path) -> PathBuf {
    dir.join(format!("{}.log", hostname()))
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "sharehub".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_is_per_host() {
        let dir = tempfile::tempdir().unwrap();
        let path = log_file(dir.path());

        assert_eq!(path.parent(), Some(dir.path()));
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("log"));
        assert!(!path.file_stem().unwrap().is_empty());
    }
}
