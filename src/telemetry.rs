//! Telemetry initialization (tracing/tracing-subscriber).
//!
//! - LOG_LEVEL is an EnvFilter directive, e.g. "debug" or
//!   "info,exercise=debug,progression=debug,content=info".
//! - LOG_FORMAT=json switches to structured JSON lines.
//!
//! Targets used across the crate: `cours_engine` (lifecycle), `content`
//! (loading), `exercise` (generation), `progression` (grading and progress).

use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "info,exercise=debug,progression=debug,cours_engine=debug,tower_http=info";

pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => builder.json().init(),
        _ => builder.init(),
    }
}
