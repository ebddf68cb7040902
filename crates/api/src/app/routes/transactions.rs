use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;

use gasflow_auth::Capability;
use gasflow_core::TransactionId;
use gasflow_invoicing::BillingPeriod;

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::{ActorContext, IdempotencyContext};

pub fn router() -> Router {
    Router::new()
        .route("/:id", get(get_transaction))
        .route("/:id/paid", post(mark_paid))
        .route("/:id/invoice", post(issue_invoice))
}

pub async fn get_transaction(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let actor = actor.actor();
    if let Err(resp) = authz::require(actor, Capability::ReadReports) {
        return resp;
    }
    let transaction_id: TransactionId = match common::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let result = common::run_blocking(move || {
        let txn = services.transaction(transaction_id)?;
        let invoice = services.invoice_for(transaction_id)?;
        Ok((txn, invoice))
    })
    .await;

    match result {
        Ok((txn, invoice)) => {
            let mut body = dto::transaction_to_json(&txn);
            body["invoice"] = invoice
                .as_ref()
                .map(dto::invoice_to_json)
                .unwrap_or(serde_json::Value::Null);
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn mark_paid(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Extension(idem): Extension<IdempotencyContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let actor = actor.actor();
    if let Err(resp) = authz::require(actor, Capability::MarkPaid) {
        return resp;
    }
    let key = match common::require_key(&idem) {
        Ok(key) => key,
        Err(resp) => return resp,
    };
    let transaction_id: TransactionId = match common::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let fingerprint = common::fingerprint("transactions.paid", &json!({ "id": id }));

    let result = common::run_blocking(move || {
        services.submit(&key, fingerprint, || services.mark_paid(actor, transaction_id))
    })
    .await;

    match result {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "transaction_id": transaction_id.to_string(), "paid": true })),
        )
            .into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn issue_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Extension(idem): Extension<IdempotencyContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::IssueInvoiceRequest>>,
) -> axum::response::Response {
    let actor = actor.actor();
    if let Err(resp) = authz::require(actor, Capability::IssueInvoice) {
        return resp;
    }
    let key = match common::require_key(&idem) {
        Ok(key) => key,
        Err(resp) => return resp,
    };
    let transaction_id: TransactionId = match common::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let request = body.map(|Json(b)| b).unwrap_or_default();
    let period = match (request.year, request.month) {
        (Some(year), Some(month)) => match BillingPeriod::new(year, month) {
            Ok(period) => period,
            Err(e) => return errors::domain_error_to_response(e),
        },
        _ => BillingPeriod::containing(Utc::now()),
    };
    let fingerprint = common::fingerprint(
        "transactions.invoice",
        &json!({ "id": id, "period": period.prefix() }),
    );

    let result = common::run_blocking(move || {
        services.submit(&key, fingerprint, || {
            services.issue_invoice(actor, transaction_id, period)
        })
    })
    .await;

    match result {
        Ok(invoice) => (StatusCode::CREATED, Json(dto::invoice_to_json(&invoice))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
