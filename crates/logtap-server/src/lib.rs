//! # logtap-server
//!
//! Axum WebSocket server that distributes structured log records to
//! authenticated subscribers.
//!
//! - Connection gateway: token check → authentication → flow parse →
//!   WebSocket upgrade, strictly in that order
//! - Subscriber registry: concurrency-safe flow → subscriber mapping
//! - Per-subscriber send protocol with access-list filtering
//! - `/health` and Prometheus `/metrics` endpoints
//! - Graceful shutdown via `tokio::signal` + `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use server::{AppState, TapServer};
