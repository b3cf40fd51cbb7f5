//! Statistics course backend
//!
//! - Axum HTTP + WebSocket API for the course's interactive widgets
//!   (challenge runner, matching boards, calculators)
//! - Fire-and-forget student tracking to an external endpoint
//! - Static front-end fallback (STATIC_DIR/index.html)
//!
//! Important env variables:
//!   PORT                : u16 (default 3000)
//!   COURSE_CONFIG_PATH  : path to TOML config (runner, tracking, extra content)
//!   TRACK_BASE_URL      : base URL of the tracking backend
//!   TRACKING_DISABLED   : "1"/"true" turns tracking off
//!   STATIC_DIR          : front-end directory (default "./static")
//!   LOG_LEVEL           : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT          : "pretty" (default) or "json"

mod telemetry;
mod error;
mod domain;
mod runner;
mod session;
mod matching;
mod calculators;
mod tracking;
mod catalog;
mod config;
mod seeds;
mod state;
mod protocol;
mod logic;
mod routes;

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::ServerSettings;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let settings = ServerSettings::from_env();
  let state = Arc::new(AppState::new(&settings));
  let app = build_router(state, &settings.static_dir);

  let listener = TcpListener::bind(settings.addr).await?;
  info!(target: "statcourse_backend", addr = %settings.addr, static_dir = %settings.static_dir, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  info!(target: "statcourse_backend", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "statcourse_backend", error = %e, "Failed to listen for shutdown signal");
  }
}
