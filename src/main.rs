//! Cours Engine · Learning Road Backend
//!
//! - Axum HTTP API (roads, exercise batches, submissions, reload)
//! - Content loaded from a directory of TOML road and template files
//! - In-memory learner progress
//!
//! Important env variables:
//!   PORT               : u16 (default 3000)
//!   ENGINE_CONFIG_PATH : path to TOML engine config (optional)
//!   CONTENT_DIR        : overrides the config's content directory
//!   LOG_LEVEL          : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT         : "pretty" (default) or "json"

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use cours_engine::routes::build_router;
use cours_engine::state::AppState;
use cours_engine::telemetry;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared state: config, content catalog, generators, progress store.
  let state = Arc::new(AppState::new());

  let app = build_router(state);

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "cours_engine", %addr, "HTTP server listening");
  axum::serve(listener, app).await?;
  Ok(())
}
