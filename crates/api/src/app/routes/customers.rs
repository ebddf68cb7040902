use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, routing::post, Json, Router};

use gasflow_auth::Capability;

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::{ActorContext, IdempotencyContext};

pub fn router() -> Router {
    Router::new().route("/", post(register_customer))
}

pub async fn register_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Extension(idem): Extension<IdempotencyContext>,
    Json(body): Json<dto::RegisterCustomerRequest>,
) -> axum::response::Response {
    let actor = actor.actor();
    if let Err(resp) = authz::require(actor, Capability::RegisterCustomer) {
        return resp;
    }
    let key = match common::require_key(&idem) {
        Ok(key) => key,
        Err(resp) => return resp,
    };
    let fingerprint = common::fingerprint("customers.register", &body);

    let result = common::run_blocking(move || {
        services.submit(&key, fingerprint, || {
            services.register_customer(actor, body.into_new_customer())
        })
    })
    .await;

    match result {
        Ok(customer) => {
            (StatusCode::CREATED, Json(dto::customer_to_json(&customer))).into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}
