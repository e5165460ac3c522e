//! Room Coordinator
//!
//! Hosts real-time blackjack rooms over WebSocket. One room is one actor
//! task: every client intent for that room and every timer it schedules
//! funnels through a single mpsc queue, so betting, dealing, turn order, and
//! settlement are never observed interleaved with each other.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;

mod card;
mod config;
mod error;
mod ledger;
mod protocol;
mod registry;
mod room;
mod settlement;
mod ws;

use config::Config;
use registry::{ConnectionRegistry, RoomRegistry};
use ws::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    let connections = ConnectionRegistry::new();
    connections
        .clone()
        .spawn_sweeper(Duration::from_secs(config.idle_socket_timeout_secs));

    let state = Arc::new(AppState {
        rooms: RoomRegistry::new(),
        connections,
        idle_timeout: Duration::from_secs(config.idle_socket_timeout_secs),
    });

    let app = Router::new()
        .route("/healthz", get(ws::healthz))
        .route("/ws", get(ws::ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state);

    tracing::info!("coordinator listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
