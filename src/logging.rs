//! Log output setup for binaries embedding Tessera.
//!
//! Library code only emits `tracing` events; nothing is printed until a
//! subscriber is installed, usually by calling [`init`] once from `main`.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

/// Filter directives, e.g. `info,tessera_session=debug`.
pub const LOG_ENV: &str = "TESSERA_LOG";

/// Output format: `pretty`, `compact` or `json`.
pub const FORMAT_ENV: &str = "TESSERA_LOG_FORMAT";

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    /// Multi-line, human oriented.
    Pretty,
    /// One line per event.
    #[default]
    Compact,
    /// One JSON object per event.
    Json,
}

impl Format {
    /// Parse a format name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Some(Self::Pretty),
            "compact" | "text" => Some(Self::Compact),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// Format named by [`FORMAT_ENV`], compact when unset or unknown.
    pub fn from_env() -> Self {
        std::env::var(FORMAT_ENV)
            .ok()
            .and_then(|s| Self::parse(&s))
            .unwrap_or_default()
    }
}

/// Filter from [`LOG_ENV`], then `RUST_LOG`, then `info`.
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber configured from the environment.
///
/// Fails if a global subscriber is already set.
pub fn init() -> Result<(), TryInitError> {
    init_with(Format::from_env())
}

/// Install the global subscriber with an explicit format.
pub fn init_with(format: Format) -> Result<(), TryInitError> {
    let registry = tracing_subscriber::registry().with(env_filter());

    match format {
        Format::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
        Format::Compact => registry
            .with(tracing_subscriber::fmt::layer().compact())
            .try_init(),
        Format::Json => registry
            .with(tracing_subscriber::fmt::layer().json().flatten_event(true))
            .try_init(),
    }
}
