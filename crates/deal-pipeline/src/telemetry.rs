//! Tracing setup shared by the service and the CLI commands.

use crate::config::TelemetryConfig;
use tracing_subscriber::filter::{Directive, ParseError};
use tracing_subscriber::EnvFilter;

/// Log target of the engine, scheduler and dispatcher.
const PIPELINE_TARGET: &str = "deal_pipeline";

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid log filter '{directive}'")]
    InvalidFilter {
        directive: String,
        #[source]
        source: ParseError,
    },
    #[error("tracing subscriber could not be installed")]
    Install(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// `RUST_LOG` wins over the configured level. The pipeline level, when set,
/// is layered on top so timers and dispatch can be traced without raising
/// the level of the HTTP stack.
fn build_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level).map_err(|source| {
            TelemetryError::InvalidFilter {
                directive: config.log_level.clone(),
                source,
            }
        })?,
    };

    let Some(level) = &config.pipeline_log_level else {
        return Ok(filter);
    };
    let directive = format!("{PIPELINE_TARGET}={level}");
    match directive.parse::<Directive>() {
        Ok(parsed) => Ok(filter.add_directive(parsed)),
        Err(source) => Err(TelemetryError::InvalidFilter { directive, source }),
    }
}

/// Installs the global fmt subscriber. Fails if one is already installed.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = build_filter(config)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.pipeline_log_level.is_some())
        .compact()
        .with_ansi(false)
        .try_init()
        .map_err(TelemetryError::Install)?;

    tracing::debug!(
        level = %config.log_level,
        pipeline_level = config.pipeline_log_level.as_deref().unwrap_or("inherit"),
        "telemetry initialised"
    );
    Ok(())
}
