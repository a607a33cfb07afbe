use anyhow::{anyhow, Result};
use std::path::Path;
use talawa_config::domains::logging::{LogFormat, LogLevel, LogTarget};
use talawa_config::LoggingConfig;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// A formatted, filtered output layer
pub type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Keeps the non-blocking file writers flushing.
///
/// Dropping it flushes and closes every file target.
#[must_use = "file targets stop receiving events once the guard is dropped"]
#[derive(Default)]
pub struct LoggingGuard {
    file_guards: Vec<WorkerGuard>,
}

impl LoggingGuard {
    /// Number of file targets kept alive
    pub fn file_targets(&self) -> usize {
        self.file_guards.len()
    }
}

/// Build the env filter for a config, falling back to `RUST_LOG` then `info`
pub fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_new(config.filter_directives())
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Env filter for one target; a target level replaces the global one
fn target_filter(config: &LoggingConfig, level: Option<LogLevel>) -> EnvFilter {
    match level {
        Some(level) => build_env_filter(&LoggingConfig {
            level,
            ..config.clone()
        }),
        None => build_env_filter(config),
    }
}

fn fmt_layer<W>(config: &LoggingConfig, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    match config.format {
        LogFormat::Json => layer.json().boxed(),
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Text => layer.boxed(),
    }
}

/// Non-blocking writer appending to `path`, creating parent directories
fn file_writer(path: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow!("Log file path has no file name: {}", path.display()))?;
    let directory = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(directory)?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy().into_owned())
        .build(directory)
        .map_err(|e| anyhow!("Failed to open log file {}: {}", path.display(), e))?;

    Ok(tracing_appender::non_blocking(appender))
}

/// Build one layer per configured target.
///
/// File targets write through a non-blocking appender whose guard is
/// returned alongside the layers.
pub fn build_layers(config: &LoggingConfig) -> Result<(Vec<BoxedLayer>, LoggingGuard)> {
    let mut layers = Vec::with_capacity(config.targets.len());
    let mut guard = LoggingGuard::default();

    for target in &config.targets {
        match target {
            LogTarget::Console { level } => {
                let filter = target_filter(config, *level);
                layers.push(fmt_layer(config, std::io::stdout, true).with_filter(filter).boxed());
            }
            LogTarget::File { path, level } => {
                let (writer, file_guard) = file_writer(Path::new(path))?;
                let filter = target_filter(config, *level);
                layers.push(fmt_layer(config, writer, false).with_filter(filter).boxed());
                guard.file_guards.push(file_guard);
            }
        }
    }

    Ok((layers, guard))
}

/// Initialize logging from configuration.
///
/// Hold the returned guard for as long as file targets should be written.
pub fn init_logging_from_config(config: &LoggingConfig) -> Result<LoggingGuard> {
    let (layers, guard) = build_layers(config)?;

    // Use try_init to avoid panic if global subscriber already set
    if tracing_subscriber::registry().with(layers).try_init().is_err() {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(guard)
}

/// Initialize simple tracing for basic console output
pub fn init_simple_tracing(log_level: &str) -> Result<()> {
    let env_filter = EnvFilter::try_new(log_level)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init()
        .is_err()
    {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}
