// crates/worker/src/lib.rs
//! Background process: owns the debug state store, answers the popup's
//! protocol requests, reconciles navigation events and drives the browser
//! through the host shim bridge.

pub mod bridge;
pub mod client;
pub mod config;
pub mod routes;
pub mod state;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use client::HttpProtocolClient;
pub use config::{ConfigError, WorkerConfig};
pub use state::WorkerState;

pub fn app(state: WorkerState) -> Router {
    // The popup and the shim run on extension origins.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/message", post(routes::message))
        .route("/events/address-changed", post(routes::address_changed))
        .route("/events/session-closed", post(routes::session_closed))
        .route("/bridge", get(bridge::bridge_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
