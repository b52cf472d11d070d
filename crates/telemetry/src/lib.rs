//! Structured logging and timing for UAVO tools
//!
//! Installs a `tracing` subscriber once per process and provides:
//! - Compact or JSON log lines on stderr, filtered by `RUST_LOG`
//! - A per-process session id for correlating log lines
//! - [`Timer`] and [`timed_span!`] for timing engine passes

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

#[doc(hidden)]
pub use tracing as __tracing;

/// Global session ID for correlating logs
static SESSION_ID: Lazy<String> = Lazy::new(|| Uuid::new_v4().to_string());

/// Initialize the telemetry system
pub fn init() -> anyhow::Result<()> {
    init_with_config(TelemetryConfig::default())
}

/// Initialize with custom configuration
///
/// `RUST_LOG` takes precedence over `config.log_level`. Logs go to stderr so
/// command output on stdout stays machine-readable.
pub fn init_with_config(config: TelemetryConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.format {
        LogFormat::Compact => tracing::subscriber::set_global_default(
            registry.with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(config.show_target)
                    .with_thread_ids(config.show_thread_ids)
                    .with_file(config.show_file)
                    .with_line_number(config.show_line_number)
                    .compact(),
            ),
        ),
        LogFormat::Json => tracing::subscriber::set_global_default(
            registry.with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(config.show_target)
                    .with_thread_ids(config.show_thread_ids)
                    .with_file(config.show_file)
                    .with_line_number(config.show_line_number)
                    .json(),
            ),
        ),
    };
    installed.map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))?;

    tracing::debug!(
        session_id = %session_id(),
        version = env!("CARGO_PKG_VERSION"),
        "Telemetry initialized"
    );

    Ok(())
}

/// Get the current session ID
pub fn session_id() -> &'static str {
    &SESSION_ID
}

/// Log line layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

/// Telemetry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub format: LogFormat,
    pub show_target: bool,
    pub show_thread_ids: bool,
    pub show_file: bool,
    pub show_line_number: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            format: LogFormat::Compact,
            show_target: false,
            show_thread_ids: false,
            show_file: false,
            show_line_number: false,
        }
    }
}

impl TelemetryConfig {
    /// Derives the level from `-v`/`-q` style flags.
    ///
    /// Each `-v` lowers the threshold by one step from `warn`; `quiet` wins.
    pub fn with_verbosity(mut self, verbose: u8, quiet: bool) -> Self {
        self.log_level = if quiet {
            "error"
        } else {
            match verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            }
        }
        .to_string();
        self
    }
}

/// Timer for measuring operation duration
///
/// Logs the elapsed time at `debug` when stopped or dropped.
pub struct Timer {
    name: String,
    start: Instant,
    stopped: bool,
}

impl Timer {
    /// Start a new timer
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: Instant::now(),
            stopped: false,
        }
    }

    /// Time since the timer started
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and log the duration
    pub fn stop(mut self) -> Duration {
        self.stopped = true;
        let duration = self.start.elapsed();
        self.report(duration);
        duration
    }

    fn report(&self, duration: Duration) {
        tracing::debug!(
            operation = %self.name,
            duration_ms = duration.as_secs_f64() * 1000.0,
            "Timer completed"
        );
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if !self.stopped {
            self.report(self.start.elapsed());
        }
    }
}

/// Enters an `info` span and times it until the end of the enclosing scope
#[macro_export]
macro_rules! timed_span {
    ($name:expr) => {
        let _timer = $crate::Timer::start($name);
        let _span = $crate::__tracing::info_span!($name).entered();
    };
    ($name:expr, $($field:tt)*) => {
        let _timer = $crate::Timer::start($name);
        let _span = $crate::__tracing::info_span!($name, $($field)*).entered();
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer() {
        let timer = Timer::start("test_operation");
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert!(timer.elapsed().as_millis() >= 10);
        let duration = timer.stop();
        assert!(duration.as_millis() >= 10);
    }

    #[test]
    fn test_timed_span_compiles_without_subscriber() {
        timed_span!("analysis", incidents = 3);
        timed_span!("projection");
    }

    #[test]
    fn test_session_id() {
        let id = session_id();
        assert!(!id.is_empty());
        // Should be a valid UUID
        assert!(Uuid::parse_str(id).is_ok());
        assert_eq!(id, session_id());
    }

    #[test]
    fn test_verbosity_levels() {
        let level = |v, q| TelemetryConfig::default().with_verbosity(v, q).log_level;
        assert_eq!(level(0, false), "warn");
        assert_eq!(level(1, false), "info");
        assert_eq!(level(2, false), "debug");
        assert_eq!(level(7, false), "trace");
        assert_eq!(level(3, true), "error");
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: TelemetryConfig = serde_json::from_str(r#"{"format": "json"}"#).unwrap();
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.log_level, "warn");
        assert!(!config.show_target);
    }
}
