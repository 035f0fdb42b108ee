//! Tracing integration for structured logging.
//!
//! moshlink itself only emits `tracing` events; installing a subscriber is
//! left to the host. Hosts without their own tracing setup can call
//! [`init_logging`], which supports:
//! - Verbosity levels mapped onto the moshlink crates
//! - `RUST_LOG` overrides
//! - stderr or file output, text or JSON

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{Error, Result};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// Structured JSON output.
    Json,
}

/// Map a verbosity count (0=error .. 4+=trace) to a level name.
pub fn level_for_verbosity(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "error",
        1 => "warn",
        2 => "info",
        3 => "debug",
        _ => "trace",
    }
}

/// Filter directive covering the moshlink crates at `level`.
fn default_directive(level: &str) -> String {
    format!("moshlink_core={level},moshlink_client={level}")
}

/// Initialize the logging system.
///
/// # Arguments
///
/// * `verbosity` - Verbosity level (0=error, 1=warn, 2=info, 3=debug, 4+=trace)
/// * `log_file` - Optional path to append logs to instead of stderr
/// * `format` - Output format (text or JSON)
///
/// Fails if a global subscriber is already installed or the log file cannot
/// be opened.
///
/// # Example
///
/// ```ignore
/// use moshlink_core::logging::{init_logging, LogFormat};
///
/// init_logging(3, Some(Path::new("/tmp/moshlink.log")), LogFormat::Json)?;
/// ```
pub fn init_logging(verbosity: u8, log_file: Option<&Path>, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(level_for_verbosity(verbosity))));
    let detailed = verbosity >= 3;

    let writer = match log_file {
        Some(path) => Some(Mutex::new(
            OpenOptions::new().create(true).append(true).open(path)?,
        )),
        None => None,
    };

    let result = match (writer, format) {
        (None, LogFormat::Text) => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_file(detailed)
                    .with_line_number(detailed),
            )
            .try_init(),
        (None, LogFormat::Json) => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_thread_names(true))
            .try_init(),
        (Some(file), LogFormat::Text) => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(file)
                    .with_ansi(false)
                    .with_thread_names(true)
                    .with_file(detailed)
                    .with_line_number(detailed),
            )
            .try_init(),
        (Some(file), LogFormat::Json) => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(file))
            .try_init(),
    };

    result.map_err(|e| Error::Io(std::io::Error::other(e.to_string())))
}

/// Initialize logging with defaults for testing.
///
/// Uses info level with text format to stderr.
/// Silently ignores errors (logging may already be initialized).
pub fn init_test_logging() {
    let _ = init_logging(2, None, LogFormat::Text);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_default() {
        assert_eq!(LogFormat::default(), LogFormat::Text);
    }

    #[test]
    fn verbosity_mapping() {
        assert_eq!(level_for_verbosity(0), "error");
        assert_eq!(level_for_verbosity(2), "info");
        assert_eq!(level_for_verbosity(3), "debug");
        assert_eq!(level_for_verbosity(9), "trace");
    }

    #[test]
    fn directive_names_both_crates() {
        let directive = default_directive("debug");
        assert!(directive.contains("moshlink_core=debug"));
        assert!(directive.contains("moshlink_client=debug"));
    }

    #[test]
    fn unopenable_log_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no-such-dir").join("moshlink.log");
        let err = init_logging(2, Some(&missing), LogFormat::Text).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    // Only one global subscriber can be installed per process, so the
    // successful path is exercised once here.
    #[test]
    fn init_test_logging_is_idempotent() {
        init_test_logging();
        init_test_logging();
    }
}
