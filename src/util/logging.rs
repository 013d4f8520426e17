//! Structured logging setup for repoguide
//!
//! Logs go to stderr so that stdout only ever carries the rendered guide. Filtering
//! honours `RUST_LOG`; otherwise `repoguide=<level>` is applied with the HTTP stack
//! quietened to `warn`.
//!
//! # Example
//!
//! ```no_run
//! use repoguide::util::logging;
//! use tracing::{debug, info};
//!
//! logging::init_from_env();
//!
//! info!("Application started");
//! debug!(repository = "acme/demo", "Listing files");
//! ```

use std::env;
use std::io;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Minimum level for the `repoguide` target
    pub level: Level,

    /// Emit one JSON object per event
    pub use_json: bool,

    /// Include the module target (e.g., repoguide::signals) in logs
    pub include_target: bool,

    /// Include file and line number information
    pub include_location: bool,

    /// Include thread ID and name in logs
    pub include_thread_ids: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            use_json: false,
            include_target: false,
            include_location: false,
            include_thread_ids: false,
        }
    }
}

impl LoggingConfig {
    /// ```
    /// use repoguide::util::LoggingConfig;
    /// use tracing::Level;
    ///
    /// let config = LoggingConfig::with_level(Level::DEBUG);
    /// assert_eq!(config.level, Level::DEBUG);
    /// ```
    pub fn with_level(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// JSON output with full metadata.
    pub fn production() -> Self {
        Self {
            level: Level::INFO,
            use_json: true,
            include_target: true,
            include_location: true,
            include_thread_ids: true,
        }
    }

    /// Debug level, human-readable output with targets.
    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            use_json: false,
            include_target: true,
            include_location: false,
            include_thread_ids: false,
        }
    }

    pub fn json(mut self, use_json: bool) -> Self {
        self.use_json = use_json;
        self
    }
}

/// Strict level parsing; `None` for anything but the five level names.
pub fn try_parse_level(level_str: &str) -> Option<Level> {
    match level_str.trim().to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Parses a log level, falling back to INFO with a warning on stderr
///
/// ```
/// use repoguide::util::logging::parse_level;
/// use tracing::Level;
///
/// assert_eq!(parse_level("debug"), Level::DEBUG);
/// assert_eq!(parse_level("WARN"), Level::WARN);
/// assert_eq!(parse_level("chatty"), Level::INFO);
/// ```
pub fn parse_level(level_str: &str) -> Level {
    try_parse_level(level_str).unwrap_or_else(|| {
        eprintln!(
            "Invalid log level '{}', defaulting to INFO. Valid levels: trace, debug, info, warn, error",
            level_str
        );
        Level::INFO
    })
}

fn directive(spec: &str) -> Option<Directive> {
    spec.parse().ok()
}

fn build_filter(level: Level) -> EnvFilter {
    if env::var("RUST_LOG").is_ok() {
        return EnvFilter::from_default_env();
    }

    [
        format!("repoguide={}", level),
        "h2=warn".to_string(),
        "hyper=warn".to_string(),
        "hyper_util=warn".to_string(),
        "reqwest=warn".to_string(),
    ]
    .iter()
    .filter_map(|spec| directive(spec))
    .fold(EnvFilter::new("warn"), |filter, d| filter.add_directive(d))
}

/// Installs the global subscriber. Later calls are ignored.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = build_filter(config.level);

        let layer = fmt::layer()
            .with_writer(io::stderr)
            .with_target(config.include_target)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_thread_ids(config.include_thread_ids)
            .with_thread_names(config.include_thread_ids);

        // try_init: an embedding application may already own the global subscriber.
        let result = if config.use_json {
            tracing_subscriber::registry()
                .with(filter)
                .with(layer.json())
                .try_init()
        } else {
            tracing_subscriber::registry().with(filter).with(layer).try_init()
        };

        if let Err(e) = result {
            eprintln!("Logging already initialised: {}", e);
        }
    });
}

pub fn init_default() {
    init_logging(LoggingConfig::default());
}

/// Reads `REPOGUIDE_LOG_LEVEL` and `REPOGUIDE_LOG_JSON`.
pub fn init_from_env() {
    init_logging(config_from_env(None));
}

/// Level from the explicit override, else `REPOGUIDE_LOG_LEVEL`, else INFO.
pub fn config_from_env(level_override: Option<Level>) -> LoggingConfig {
    let level = level_override.unwrap_or_else(|| {
        env::var("REPOGUIDE_LOG_LEVEL")
            .map(|v| parse_level(&v))
            .unwrap_or(Level::INFO)
    });

    let use_json = env::var("REPOGUIDE_LOG_JSON")
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(false);

    LoggingConfig::with_level(level).json(use_json)
}
