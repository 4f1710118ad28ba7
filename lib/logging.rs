use crate::build_info;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error as StdError;
use std::fmt::Write as _;
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing_log::LogTracer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format for runtime logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

impl LogFormat {
    /// Reads `LOG_FORMAT`. Text is the default since this runs in a
    /// terminal; set `LOG_FORMAT=json` when a collector scrapes the output.
    fn from_env() -> Self {
        match std::env::var("LOG_FORMAT") {
            Ok(raw) if raw.trim().eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Text,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Text => "text",
        }
    }
}

/// Identity fields shared by every log line of one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingContext {
    pub service: String,
    pub mode: String,
    pub run_id: String,
    pub build_version: String,
    pub build_commit: String,
    pub format: LogFormat,
}

/// Installs the process-wide subscriber and returns the context fields the
/// caller should attach to its root span.
///
/// `log` records are bridged into `tracing`, and `RUST_LOG` overrides
/// `default_level` when set.
pub fn init_logging(service: &str, mode: &str, default_level: &str) -> LoggingContext {
    let format = LogFormat::from_env();
    install_subscriber(format, default_level);

    let context = LoggingContext {
        service: service.to_string(),
        mode: mode.to_string(),
        run_id: new_run_id(service),
        build_version: build_info::VERSION.to_string(),
        build_commit: build_info::short_commit_hash().to_string(),
        format,
    };

    tracing::debug!(
        event = "logging_initialized",
        service = %context.service,
        mode = %context.mode,
        run_id = %context.run_id,
        build_version = %context.build_version,
        build_commit = %context.build_commit,
        log_format = context.format.as_str(),
        "initialized logging"
    );

    context
}

fn install_subscriber(format: LogFormat, default_level: &str) {
    let _ = LogTracer::init();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter);
    let installed = match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_list(false)
                    .flatten_event(true),
            )
            .try_init(),
        // Human output goes to stderr so exports and listings own stdout.
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };
    let _ = installed;
}

fn new_run_id(service: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    format!("{service}-{}-{millis}", process::id())
}

/// Renders an error with its full source chain, plus a backtrace when
/// `RUST_BACKTRACE` asks for one.
///
/// Printing only the top-level message at a process boundary hides nested
/// causes such as DNS or socket failures wrapped by client layers.
pub fn format_error_report(err: &(dyn StdError + 'static)) -> String {
    let mut report = format!("error: {err}");

    let mut depth = 1usize;
    let mut cause = err.source();
    while let Some(inner) = cause {
        let _ = write!(report, "\ncaused by ({depth}): {inner}");
        cause = inner.source();
        depth += 1;
    }

    let backtrace = Backtrace::capture();
    if backtrace.status() == BacktraceStatus::Captured {
        let _ = write!(report, "\nbacktrace:\n{backtrace}");
    }
    report
}
