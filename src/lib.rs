pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod models;
pub mod services;
pub mod store;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use services::TicketingService;
use store::TicketStore;

// Shared state for every handler
pub struct AppState<S> {
    pub ticketing: Arc<TicketingService<S>>,
}

impl<S: TicketStore> AppState<S> {
    pub fn new(ticketing: Arc<TicketingService<S>>) -> Arc<Self> {
        Arc::new(Self { ticketing })
    }
}

pub fn build_router<S: TicketStore>(state: Arc<AppState<S>>) -> Router {
    Router::new()
        .route("/", get(|| async { "Concert Ticketing API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/api", controllers::routes::<S>())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
