use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, routing::post, Json, Router};

use gasflow_auth::Capability;
use gasflow_core::DepotId;

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::{ActorContext, IdempotencyContext};

pub fn router() -> Router {
    Router::new().route("/", post(create_distribution))
}

pub async fn create_distribution(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Extension(idem): Extension<IdempotencyContext>,
    Json(body): Json<dto::DistributionRequest>,
) -> axum::response::Response {
    let actor = actor.actor();
    if let Err(resp) = authz::require(actor, Capability::DistributeStock) {
        return resp;
    }
    let key = match common::require_key(&idem) {
        Ok(key) => key,
        Err(resp) => return resp,
    };
    let depot_id: DepotId = match common::parse_id(&body.depot_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let movement = match dto::parse_movement(&body.movement) {
        Ok(movement) => movement,
        Err(resp) => return resp,
    };
    let fingerprint = common::fingerprint("distributions.create", &body);

    let result = common::run_blocking(move || {
        services.submit(&key, fingerprint, || {
            services.distribute(actor, depot_id, &body.equipment, body.quantity, movement)
        })
    })
    .await;

    match result {
        Ok(distribution) => (
            StatusCode::CREATED,
            Json(dto::distribution_to_json(&distribution)),
        )
            .into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
