use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::Subscriber;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::error::ConfigError;

const LOG_FILE: &str = "georesolver.log";

/// Install a compact stderr subscriber. `RUST_LOG` takes precedence over
/// `verbose`. Calling this again after a subscriber is set does nothing.
pub fn init_logging(verbose: bool) {
    let _ = tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(stderr_layer())
        .try_init();
}

/// Like [`init_logging`], also appending timestamped records to
/// `<dir>/georesolver.log`. Returns the log file path.
pub fn init_logging_to(dir: &Path, verbose: bool) -> Result<PathBuf, ConfigError> {
    let (path, file) = open_log_file(dir)?;
    let _ = tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(stderr_layer())
        .with(file_layer(file))
        .try_init();
    Ok(path)
}

fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "georesolver=debug" } else { "georesolver=info" })
    })
}

fn stderr_layer<S>() -> impl Layer<S> + Send + Sync
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
}

/// Full-format records: timestamp, level, target, message and fields.
fn file_layer<S>(file: File) -> impl Layer<S> + Send + Sync
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    tracing_subscriber::fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
}

fn open_log_file(dir: &Path) -> Result<(PathBuf, File), ConfigError> {
    fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = dir.join(LOG_FILE);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
    Ok((path, file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_twice_is_harmless() {
        init_logging(true);
        init_logging(false);
        tracing::info!("logging initialised");
    }

    #[test]
    fn test_file_sink_writes_records() {
        let dir = TempDir::new().unwrap();
        let (path, file) = open_log_file(&dir.path().join("logs")).unwrap();
        assert_eq!(path, dir.path().join("logs").join("georesolver.log"));

        let subscriber = tracing_subscriber::registry()
            .with(EnvFilter::new("georesolver=info"))
            .with(file_layer(file));
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(place = "Aucará", service = "TGN", "place resolved");
            tracing::debug!("below the filter");
        });

        let contents = fs::read_to_string(&path).unwrap();
        let line = contents.lines().next().unwrap();
        assert!(line.starts_with(|c: char| c.is_ascii_digit()), "no timestamp: {}", line);
        assert!(line.contains("INFO"));
        assert!(line.contains("georesolver::logging::tests"));
        assert!(line.contains("place resolved"));
        assert!(line.contains("place=\"Aucará\""));
        assert!(!contents.contains("below the filter"));
    }

    #[test]
    fn test_log_file_appends() {
        let dir = TempDir::new().unwrap();
        let (path, _) = open_log_file(dir.path()).unwrap();
        fs::write(&path, "earlier run\n").unwrap();
        let (_, mut file) = open_log_file(dir.path()).unwrap();
        std::io::Write::write_all(&mut file, b"next run\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "earlier run\nnext run\n");
    }

    #[test]
    fn test_init_logging_to_creates_dir() {
        let dir = TempDir::new().unwrap();
        let path = init_logging_to(&dir.path().join("audit"), false).unwrap();
        assert!(path.exists());
    }
}
