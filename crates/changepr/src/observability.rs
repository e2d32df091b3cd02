//! Logging setup.
//!
//! Human-readable log lines go to stderr. stdout carries command output only,
//! so `--json` results stay parseable. A JSONL log file is added when a log
//! location is configured.

use anyhow::{Result, bail};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const ENV_LOG_PATH: &str = "CHANGEPR_LOG_PATH";
const ENV_LOG_DIR: &str = "CHANGEPR_LOG_DIR";
const LOG_FILE_SUFFIX: &str = ".jsonl";

/// Where logs go.
#[derive(Clone, Debug)]
pub struct ObservabilityConfig {
    /// Base name of the log file.
    pub service: String,
    /// Directory from configuration; environment overrides win.
    pub log_dir: Option<PathBuf>,
}

impl ObservabilityConfig {
    /// Create config with an optional configured log directory.
    pub fn from_env_with_overrides(log_dir: Option<PathBuf>) -> Self {
        Self {
            service: env!("CARGO_PKG_NAME").to_string(),
            log_dir,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct LogTarget {
    dir: PathBuf,
    file_name: String,
}

/// Keeps the file writer flushing until dropped.
pub struct ObservabilityGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Install the global subscriber.
///
/// Hold the returned guard for the life of the process.
pub fn init_observability(
    cfg: &ObservabilityConfig,
    env_filter: EnvFilter,
) -> Result<ObservabilityGuard> {
    let target = resolve_log_target_with(
        &cfg.service,
        std::env::var_os(ENV_LOG_PATH).map(PathBuf::from),
        std::env::var_os(ENV_LOG_DIR).map(PathBuf::from),
        cfg.log_dir.clone(),
    );

    let (file_writer, file_guard) = match target {
        Some(Ok(target)) => {
            let (writer, guard) = file_writer(&target);
            (Some(writer), Some(guard))
        }
        Some(Err(err)) => {
            eprintln!("Warning: {err}. Logging to stderr only.");
            (None, None)
        }
        None => (None, None),
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time();
    let file_layer = file_writer.map(|writer| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_writer(writer)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()?;

    tracing::debug!("logging initialized");

    Ok(ObservabilityGuard {
        _file_guard: file_guard,
    })
}

/// Build an `EnvFilter` based on CLI flags and environment.
///
/// Priority: quiet flag > verbose flag > RUST_LOG env > default_level
pub fn env_filter(quiet: bool, verbose: u8, default_level: &str) -> EnvFilter {
    if quiet {
        return EnvFilter::new("error");
    }

    if verbose > 0 {
        let level = match verbose {
            1 => "debug",
            _ => "trace",
        };
        return EnvFilter::new(level);
    }

    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn file_writer(target: &LogTarget) -> (NonBlocking, WorkerGuard) {
    let appender = tracing_appender::rolling::daily(&target.dir, &target.file_name);
    tracing_appender::non_blocking(appender)
}

/// Pick the log file, if any. `None` means no file logging was asked for.
fn resolve_log_target_with(
    service: &str,
    path_override: Option<PathBuf>,
    dir_override: Option<PathBuf>,
    config_dir: Option<PathBuf>,
) -> Option<Result<LogTarget>> {
    if let Some(path) = path_override {
        return Some(log_target_from_path(&path));
    }
    dir_override
        .or(config_dir)
        .map(|dir| log_target_from_dir(dir, service))
}

fn log_target_from_dir(dir: PathBuf, service: &str) -> Result<LogTarget> {
    let file_name = format!("{service}{LOG_FILE_SUFFIX}");
    ensure_writable(&dir, &file_name)?;
    Ok(LogTarget { dir, file_name })
}

fn log_target_from_path(path: &Path) -> Result<LogTarget> {
    let Some(file_name) = path.file_name() else {
        bail!("{ENV_LOG_PATH} must include a file name");
    };
    let Some(file_name) = file_name.to_str() else {
        bail!("{ENV_LOG_PATH} must be valid UTF-8");
    };
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    ensure_writable(dir, file_name)?;
    Ok(LogTarget {
        dir: dir.to_path_buf(),
        file_name: file_name.to_string(),
    })
}

fn ensure_writable(dir: &Path, file_name: &str) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| {
        anyhow::anyhow!("failed to create log directory {}: {e}", dir.display())
    })?;
    let path = dir.join(file_name);
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| anyhow::anyhow!("failed to open log file {}: {e}", path.display()))?;
    Ok(())
}
