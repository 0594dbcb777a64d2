//! Checkout route handlers.
//!
//! The browser drives the payment widget; these endpoints decide what it
//! opens and receive what it reports. Credits always come from the server
//! catalog, never from the request body.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use dpicon_core::{Credits, PaymentId, PlanId, ReceiptId};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::middleware::Visitor;
use crate::services::checkout::Selection;
use crate::state::AppState;

/// Widget success report.
#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    pub receipt: ReceiptId,
    pub payment_id: PaymentId,
}

/// Response to a successful payment report.
#[derive(Debug, Serialize)]
pub struct CompleteResponse {
    pub credits: Credits,
}

/// Widget failure report. The receipt is absent when the script never loaded.
#[derive(Debug, Deserialize)]
pub struct FailedRequest {
    #[serde(default)]
    pub receipt: Option<ReceiptId>,
    #[serde(default)]
    pub reason: String,
}

/// Select a plan.
///
/// POST /plans/{id}/select
#[instrument(skip(state, visitor), fields(visitor = %visitor.id))]
pub async fn select(
    State(state): State<AppState>,
    visitor: Visitor,
    Path(id): Path<String>,
) -> Result<Json<Selection>> {
    let plan: PlanId = id
        .parse()
        .map_err(|e: dpicon_core::UnknownPlan| AppError::NotFound(e.to_string()))?;

    Ok(Json(state.checkout().select_plan(&visitor.context, plan).await))
}

/// Record a successful payment.
///
/// POST /checkout/complete
#[instrument(skip(state, visitor, request), fields(visitor = %visitor.id, receipt = %request.receipt))]
pub async fn complete(
    State(state): State<AppState>,
    visitor: Visitor,
    Json(request): Json<CompleteRequest>,
) -> Result<Json<CompleteResponse>> {
    let credits = state
        .checkout()
        .complete(&visitor.context, &request.receipt, &request.payment_id)
        .await?;
    Ok(Json(CompleteResponse { credits }))
}

/// Record a failed or abandoned payment.
///
/// POST /checkout/failed
#[instrument(skip(state, visitor, request), fields(visitor = %visitor.id))]
pub async fn failed(
    State(state): State<AppState>,
    visitor: Visitor,
    Json(request): Json<FailedRequest>,
) -> StatusCode {
    state
        .checkout()
        .fail(&visitor.context, request.receipt.as_ref(), &request.reason)
        .await;
    StatusCode::NO_CONTENT
}
