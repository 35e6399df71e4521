/*!
Logging setup for the slapper binaries.

All diagnostics go through `tracing`; this module installs the global
subscriber that renders them on stderr as text or JSON lines.
*/

use tracing::level_filters::LevelFilter;
use tracing::subscriber::set_global_default;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry as TracingRegistry};

use crate::config::LogFormat;
use crate::{Result, SnapshotError};

/// Parse a configured level name, falling back to `info`
pub fn resolve_level(level: &str) -> LevelFilter {
    level.trim().parse().unwrap_or(LevelFilter::INFO)
}

/// Build the event filter. A valid `RUST_LOG` directive wins over `level`.
pub fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(resolve_level(level).into()))
}

/// Install the global tracing subscriber
///
/// Can only succeed once per process.
pub fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = build_filter(level);

    let installed = match format {
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_current_span(false);
            set_global_default(TracingRegistry::default().with(filter).with(fmt_layer))
        }
        LogFormat::Text => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false);
            set_global_default(TracingRegistry::default().with(filter).with(fmt_layer))
        }
    };

    installed.map_err(|e| {
        SnapshotError::config(format!("Failed to set global tracing subscriber: {e}"))
    })?;

    tracing::debug!(?format, "Logging initialized");
    Ok(())
}
