//! HTTP application wiring (Axum router + service wiring).
//!
//! Layout:
//! - `services.rs`: engine wiring (store, locks, services, idempotency)
//! - `routes/`: HTTP routes + handlers (one file per domain area)
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use crate::config::Config;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(config: &Config) -> Router {
    let services = Arc::new(services::build_services(config).await);

    // Protected routes: require actor headers.
    let protected = routes::router()
        .layer(ServiceBuilder::new().layer(Extension(services)))
        .layer(axum::middleware::from_fn(middleware::actor_middleware));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
}
