use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};
use tokio::task;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const LOG_PREFIX: &str = "aaisp-exporter";

/// How log lines are rendered on stderr.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    /// One JSON object per line
    #[default]
    Json,
    /// Human-readable, coloured
    Console,
}

/// Keeps the file writer flushing until dropped.
#[allow(dead_code)]
pub struct LoggerGuard(Option<WorkerGuard>);

/// Map a level name onto a filter.
pub fn parse_level(level: &str) -> Option<LevelFilter> {
    let filter = match level.to_ascii_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" | "warning" => LevelFilter::WARN,
        "error" | "fatal" | "panic" => LevelFilter::ERROR,
        "disabled" | "off" => LevelFilter::OFF,
        _ => return None,
    };
    Some(filter)
}

pub fn init_logging(level: &str, output: LogOutput, log_dir: Option<&Path>) -> anyhow::Result<LoggerGuard> {
    let default_level = parse_level(level);
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.unwrap_or(LevelFilter::INFO).into())
        .parse_lossy(std::env::var("RUST_LOG").unwrap_or_default());

    let stderr_layer = match output {
        LogOutput::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed(),
        LogOutput::Console => fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .boxed(),
    };

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(LOG_PREFIX)
                .filename_suffix("log")
                .build(dir)?;
            let (non_blocking, guard) = NonBlocking::new(file_appender);
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()?;

    if default_level.is_none() {
        tracing::warn!("Invalid log level '{}', defaulting to 'info'", level);
    }

    if let Some(dir) = log_dir {
        spawn_log_sweeper(dir.to_path_buf());
    }

    Ok(LoggerGuard(guard))
}

/// Daily files older than this are swept.
const LOG_RETENTION: Duration = Duration::from_secs(60 * 60 * 24 * 3);
const SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

fn spawn_log_sweeper(log_dir: PathBuf) {
    task::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            match sweep_logs(&log_dir, SystemTime::now(), LOG_RETENTION) {
                Ok(0) => {}
                Ok(removed) => tracing::debug!(removed, dir = %log_dir.display(), "swept old log files"),
                Err(e) => tracing::warn!(error = %e, dir = %log_dir.display(), "log sweep failed"),
            }
        }
    });
}

/// Names the rolling appender produces, e.g. `aaisp-exporter.2023-06-15.log`.
fn is_rolled_log(name: &str) -> bool {
    name.starts_with(LOG_PREFIX) && name.ends_with(".log")
}

/// Rolled log files last modified more than `retention` before `now`.
fn expired_logs(log_dir: &Path, now: SystemTime, retention: Duration) -> std::io::Result<Vec<PathBuf>> {
    let expired = fs::read_dir(log_dir)?
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().to_str().is_some_and(is_rolled_log))
        .filter(|entry| {
            entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .is_some_and(|age| age > retention)
        })
        .map(|entry| entry.path())
        .collect();
    Ok(expired)
}

fn sweep_logs(log_dir: &Path, now: SystemTime, retention: Duration) -> std::io::Result<usize> {
    let expired = expired_logs(log_dir, now, retention)?;
    for path in &expired {
        fs::remove_file(path)?;
    }
    Ok(expired.len())
}
