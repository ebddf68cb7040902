use axum::{routing::get, Router};

pub mod audit;
pub mod common;
pub mod customers;
pub mod depots;
pub mod distributions;
pub mod sales;
pub mod system;
pub mod transactions;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/depots", depots::router())
        .nest("/customers", customers::router())
        .nest("/distributions", distributions::router())
        .nest("/sales", sales::router())
        .nest("/transactions", transactions::router())
        .nest("/audit", audit::router())
}
