use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::context::ActorContext;

pub async fn health() -> axum::response::Response {
    (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response()
}

pub async fn whoami(Extension(actor): Extension<ActorContext>) -> axum::response::Response {
    let actor = actor.actor();
    (
        StatusCode::OK,
        Json(json!({
            "user_id": actor.user_id.to_string(),
            "role": actor.role.as_str(),
            "capabilities": actor.role.capabilities(),
        })),
    )
        .into_response()
}
