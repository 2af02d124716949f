//! Logging setup for Strata.
//!
//! Every crate logs through `tracing`; nothing is printed until a subscriber
//! is installed. With the `tracing-subscriber` feature, [`init`] installs one
//! configured from the environment:
//!
//! - `STRATA_DEBUG=true` - debug level for the `strata*` crates
//! - `STRATA_LOG_LEVEL=trace|debug|info|warn|error` - explicit level
//! - `STRATA_LOG_FORMAT=json|pretty|compact` - output format (default: json)
//!
//! ```rust,no_run
//! use strata_query::logging::{self, LogSettings};
//!
//! // From the environment, once at startup.
//! logging::init();
//!
//! // Or explicitly, without touching the environment.
//! logging::init_with(LogSettings::new("debug").pretty());
//! ```

use std::env;
use std::sync::Once;

static INIT: Once = Once::new();

const CRATES: [&str; 5] = ["strata", "strata_schema", "strata_introspect", "strata_query", "strata_postgres"];

/// Check if `STRATA_DEBUG` is set to "true", "1" or "yes" (case-insensitive).
#[inline]
pub fn is_debug_enabled() -> bool {
    env::var("STRATA_DEBUG")
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

/// Output format of the installed subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Multi-line, human readable.
    Pretty,
    /// Single line per event.
    Compact,
}

/// What [`init_with`] installs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Level applied to every `strata*` target.
    pub level: &'static str,
    /// Output format.
    pub format: LogFormat,
}

impl LogSettings {
    /// Settings for `level`, JSON output. Unknown levels fall back to "warn".
    pub fn new(level: &str) -> Self {
        Self {
            level: parse_level(level).unwrap_or("warn"),
            format: LogFormat::Json,
        }
    }

    /// Read settings from the environment. `None` when neither
    /// `STRATA_DEBUG` nor `STRATA_LOG_LEVEL` asks for logging.
    pub fn from_env() -> Option<Self> {
        let explicit = env::var("STRATA_LOG_LEVEL").ok();
        if explicit.is_none() && !is_debug_enabled() {
            return None;
        }

        let fallback = if is_debug_enabled() { "debug" } else { "warn" };
        let level = explicit.as_deref().and_then(parse_level).unwrap_or(fallback);
        let format = match env::var("STRATA_LOG_FORMAT").map(|f| f.to_lowercase()).as_deref() {
            Ok("pretty") => LogFormat::Pretty,
            Ok("compact") => LogFormat::Compact,
            _ => LogFormat::Json,
        };
        Some(Self { level, format })
    }

    /// Use pretty output.
    pub fn pretty(mut self) -> Self {
        self.format = LogFormat::Pretty;
        self
    }

    /// Use compact output.
    pub fn compact(mut self) -> Self {
        self.format = LogFormat::Compact;
        self
    }

    /// The `EnvFilter` directive covering every `strata*` crate.
    pub fn directive(&self) -> String {
        CRATES
            .iter()
            .map(|target| format!("{}={}", target, self.level))
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn parse_level(level: &str) -> Option<&'static str> {
    match level.to_lowercase().as_str() {
        "trace" => Some("trace"),
        "debug" => Some("debug"),
        "info" => Some("info"),
        "warn" => Some("warn"),
        "error" => Some("error"),
        _ => None,
    }
}

/// Install a subscriber configured from the environment.
///
/// Subsequent calls, and calls with logging not requested, are no-ops.
pub fn init() {
    if let Some(settings) = LogSettings::from_env() {
        init_with(settings);
    }
}

/// Install a subscriber with explicit settings. Only the first call of
/// [`init`] or `init_with` has an effect.
pub fn init_with(settings: LogSettings) {
    INIT.call_once(|| {
        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let filter = EnvFilter::try_new(settings.directive()).unwrap_or_else(|_| EnvFilter::new("warn"));
            let registry = tracing_subscriber::registry().with(filter);
            let installed = match settings.format {
                LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
                LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
                LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
            };
            if installed.is_ok() {
                tracing::info!(level = settings.level, format = ?settings.format, "Strata logging initialized");
            }
        }
        #[cfg(not(feature = "tracing-subscriber"))]
        let _ = settings;
    });
}

/// Debug logging gated on `STRATA_DEBUG` at runtime.
#[macro_export]
macro_rules! strata_debug {
    ($($arg:tt)*) => {
        if $crate::logging::is_debug_enabled() {
            tracing::debug!($($arg)*);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_settings() {
        let settings = LogSettings::new("DEBUG").compact();
        assert_eq!(settings.level, "debug");
        assert_eq!(settings.format, LogFormat::Compact);
        assert!(settings.directive().starts_with("strata=debug,strata_schema=debug"));

        assert_eq!(LogSettings::new("loud").level, "warn");
    }
}
