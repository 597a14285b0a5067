//! Logging setup for the modlog audit log
//!
//! Console output is human-readable by default and goes to stderr, so
//! command output on stdout stays machine-readable. File output is JSON lines
//! through a non-blocking, optionally rotating writer.
//!
//! # Quick Start
//!
//! ```ignore
//! use modlog_logging::{LogConfig, ModlogSubscriberBuilder};
//!
//! // Keep the guard alive for as long as file output is needed
//! let _guard = ModlogSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init();
//! ```

pub mod config;

pub use config::{ConsoleConfig, FileConfig, JsonConfig, LogConfig, RotationStrategy};
pub use tracing_appender::non_blocking::WorkerGuard;

use std::fs::{self, File};
use std::path::PathBuf;

use thiserror::Error;
use tracing_appender::non_blocking::NonBlocking;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Errors while installing the subscriber
#[derive(Debug, Error)]
pub enum LogError {
    /// The log directory or file could not be created
    #[error("Cannot open log output at {path}: {message}")]
    File { path: PathBuf, message: String },

    /// Another global subscriber was installed first
    #[error("Global subscriber already set: {0}")]
    AlreadyInitialized(String),
}

/// Builder for configuring and initializing the logging subscriber
pub struct ModlogSubscriberBuilder {
    config: LogConfig,
}

impl ModlogSubscriberBuilder {
    /// Create a new subscriber builder with default configuration
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    /// Enable or disable console output
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    /// The configuration this builder will install
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Install the subscriber globally
    ///
    /// Returns the file writer guard, if file output is enabled. Dropping the
    /// guard flushes and stops the writer.
    pub fn try_init(self) -> Result<Option<WorkerGuard>, LogError> {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.config.default_level));

        let mut layers: Vec<BoxedLayer> = Vec::new();
        let mut guard = None;

        let console = &self.config.console;
        if console.enabled {
            let layer = if console.pretty {
                tracing_subscriber::fmt::layer()
                    .with_ansi(console.ansi)
                    .with_target(true)
                    .with_writer(std::io::stderr)
                    .boxed()
            } else {
                json_layer(&self.config.json, std::io::stderr)
            };

            layers.push(match &console.level {
                Some(level) => layer.with_filter(EnvFilter::new(level)).boxed(),
                None => layer,
            });
        }

        if let Some(file_config) = &self.config.file {
            let (writer, file_guard) = file_writer(file_config)?;
            layers.push(json_layer(&self.config.json, writer));
            guard = Some(file_guard);
        }

        Registry::default()
            .with(layers)
            .with(env_filter)
            .try_init()
            .map_err(|e| LogError::AlreadyInitialized(e.to_string()))?;

        Ok(guard)
    }

    /// Install the subscriber globally, reporting failures on stderr
    pub fn init(self) -> Option<WorkerGuard> {
        match self.try_init() {
            Ok(guard) => guard,
            Err(e) => {
                eprintln!("Warning: logging not initialized: {e}");
                None
            }
        }
    }
}

impl Default for ModlogSubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn json_layer<W>(json: &JsonConfig, writer: W) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(json.include_spans)
        .flatten_event(json.flatten_events)
        .with_file(json.include_location)
        .with_line_number(json.include_location)
        .with_writer(writer)
        .boxed()
}

/// Create the file writer; truncates for `Never`, appends for rotating files
fn file_writer(config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LogError> {
    let file_error = |path: &PathBuf, message: String| LogError::File {
        path: path.clone(),
        message,
    };

    fs::create_dir_all(&config.directory)
        .map_err(|e| file_error(&config.directory, e.to_string()))?;

    let rotation = match config.rotation {
        RotationStrategy::Never => {
            let path = config.directory.join(format!("{}.log", config.prefix));
            let file = File::create(&path).map_err(|e| file_error(&path, e.to_string()))?;
            return Ok(tracing_appender::non_blocking(file));
        }
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
    };

    let appender = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(&config.prefix)
        .filename_suffix("log")
        .build(&config.directory)
        .map_err(|e| file_error(&config.directory, e.to_string()))?;

    Ok(tracing_appender::non_blocking(appender))
}

/// Initialize logging for development (verbose, pretty console output)
pub fn init_development() -> Option<WorkerGuard> {
    ModlogSubscriberBuilder::new()
        .with_config(LogConfig::development())
        .init()
}

/// Initialize logging for tests; ignores an already installed subscriber
pub fn init_testing() {
    let _ = ModlogSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_builder_defaults() {
        let builder = ModlogSubscriberBuilder::new();
        assert_eq!(builder.config().default_level, "info");
        assert!(builder.config().console.pretty);
    }

    #[test]
    fn test_builder_setters() {
        let builder = ModlogSubscriberBuilder::new()
            .with_level("trace")
            .with_console(false)
            .with_file_output(FileConfig::default());
        assert_eq!(builder.config().default_level, "trace");
        assert!(!builder.config().console.enabled);
        assert!(builder.config().file.is_some());
    }

    #[test]
    fn test_file_writer_never_rotation() {
        let temp = TempDir::new().unwrap();
        let config = FileConfig {
            directory: temp.path().join("nested"),
            prefix: "audit".to_string(),
            rotation: RotationStrategy::Never,
        };

        let (_writer, guard) = file_writer(&config).unwrap();
        drop(guard);
        assert!(temp.path().join("nested").join("audit.log").exists());
    }

    #[test]
    fn test_file_writer_daily_rotation() {
        let temp = TempDir::new().unwrap();
        let config = FileConfig {
            directory: temp.path().to_path_buf(),
            ..FileConfig::default()
        };

        let (_writer, _guard) = file_writer(&config).unwrap();
        assert!(temp.path().is_dir());
    }
}
