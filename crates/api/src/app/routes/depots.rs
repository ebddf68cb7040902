use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use gasflow_auth::Capability;
use gasflow_core::DepotId;

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::{ActorContext, IdempotencyContext};

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_depot))
        .route("/:id/stock", get(depot_stock))
}

pub async fn register_depot(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Extension(idem): Extension<IdempotencyContext>,
    Json(body): Json<dto::RegisterDepotRequest>,
) -> axum::response::Response {
    let actor = actor.actor();
    if let Err(resp) = authz::require(actor, Capability::RegisterDepot) {
        return resp;
    }
    let key = match common::require_key(&idem) {
        Ok(key) => key,
        Err(resp) => return resp,
    };
    let fingerprint = common::fingerprint("depots.register", &body);

    let result = common::run_blocking(move || {
        services.submit(&key, fingerprint, || services.register_depot(actor, &body.code))
    })
    .await;

    match result {
        Ok(depot) => (StatusCode::CREATED, Json(dto::depot_to_json(&depot))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn depot_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let actor = actor.actor();
    if let Err(resp) = authz::require(actor, Capability::ReadReports) {
        return resp;
    }
    let depot_id: DepotId = match common::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let result = common::run_blocking(move || services.depot_stock(depot_id)).await;

    match result {
        Ok(rows) => {
            let items = rows
                .into_iter()
                .map(|(equipment, quantity)| json!({ "equipment": equipment, "quantity": quantity }))
                .collect::<Vec<_>>();
            (StatusCode::OK, Json(json!({ "items": items }))).into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}
