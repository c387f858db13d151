//! Shades API Library
//!
//! Backend for a sunglasses catalog: product CRUD plus image uploads served
//! from local disk.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod openapi;
pub mod repositories;
pub mod services;
pub mod uploads;

use axum::{routing::get, Router};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

/// Routes mounted under `/api`
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/products", handlers::products::products_routes())
}

/// Full application router: health root, API, stored uploads, Swagger UI.
/// CORS is layered on by the binary so tests can skip it.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::health::health))
        .nest("/api", api_routes())
        .nest("/uploads", handlers::uploads::uploads_routes())
        .merge(openapi::swagger_ui())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
