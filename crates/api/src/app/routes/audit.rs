use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;

use gasflow_auth::Capability;

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new().route("/", get(list_audit_entries))
}

pub async fn list_audit_entries(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
) -> axum::response::Response {
    let actor = actor.actor();
    if let Err(resp) = authz::require(actor, Capability::ReadReports) {
        return resp;
    }

    let result = common::run_blocking(move || services.audit_entries()).await;

    match result {
        Ok(entries) => {
            let items = entries.iter().map(dto::audit_entry_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(json!({ "items": items }))).into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}
