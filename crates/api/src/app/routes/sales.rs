use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, routing::post, Json, Router};

use gasflow_auth::Capability;
use gasflow_core::CustomerId;

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::{ActorContext, IdempotencyContext};

pub fn router() -> Router {
    Router::new()
        .route("/meter", post(create_meter_sale))
        .route("/items", post(create_line_item_sale))
}

pub async fn create_meter_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Extension(idem): Extension<IdempotencyContext>,
    Json(body): Json<dto::MeterSaleRequest>,
) -> axum::response::Response {
    let actor = actor.actor();
    if let Err(resp) = authz::require(actor, Capability::RecordSale) {
        return resp;
    }
    let key = match common::require_key(&idem) {
        Ok(key) => key,
        Err(resp) => return resp,
    };
    let customer_id: CustomerId = match common::parse_id(&body.customer_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let fingerprint = common::fingerprint("sales.meter", &body);

    let result = common::run_blocking(move || {
        services.submit(&key, fingerprint, || {
            services.meter_sale(actor, customer_id, body.latest_reading)
        })
    })
    .await;

    match result {
        Ok(txn) => (StatusCode::CREATED, Json(dto::transaction_to_json(&txn))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn create_line_item_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Extension(idem): Extension<IdempotencyContext>,
    Json(body): Json<dto::LineItemSaleRequest>,
) -> axum::response::Response {
    let actor = actor.actor();
    if let Err(resp) = authz::require(actor, Capability::RecordSale) {
        return resp;
    }
    let key = match common::require_key(&idem) {
        Ok(key) => key,
        Err(resp) => return resp,
    };
    let customer_id: CustomerId = match common::parse_id(&body.customer_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let fingerprint = common::fingerprint("sales.items", &body);

    let result = common::run_blocking(move || {
        services.submit(&key, fingerprint, || {
            services.line_item_sale(actor, customer_id, body.items, body.latest_reading)
        })
    })
    .await;

    match result {
        Ok(txn) => (StatusCode::CREATED, Json(dto::transaction_to_json(&txn))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
