//! Process-wide tracing subscriber.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::error::AppError;

/// Install the fmt subscriber on stderr. Call once, after config is loaded.
///
/// With `cli_override` (a `-v` flag was given) `level` is final and
/// `RUST_LOG` is ignored. Otherwise non-empty `RUST_LOG` directives replace
/// `level`.
pub fn init(level: LevelFilter, cli_override: bool) -> Result<(), AppError> {
    let rust_log = if cli_override { None } else { std::env::var("RUST_LOG").ok() };
    let filter = build_filter(level, rust_log.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| AppError::Logger(format!("failed to set subscriber: {e}")))
}

/// `level` as the default directive, replaced by `directives` when given.
pub fn build_filter(level: LevelFilter, directives: Option<&str>) -> Result<EnvFilter, AppError> {
    EnvFilter::builder()
        .with_default_directive(level.into())
        .parse(directives.unwrap_or_default().trim())
        .map_err(|e| AppError::Logger(format!("invalid RUST_LOG directives: {e}")))
}
