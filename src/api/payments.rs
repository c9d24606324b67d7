//! HTTP surface for the client-side checkout flow.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::database::repository::InstructionStore;
use crate::error::AppError;
use crate::middleware::get_request_id_from_headers;
use crate::services::{ConfirmOutcome, PaymentConfirmationService};

pub struct PaymentState {
    pub service: Arc<PaymentConfirmationService>,
    pub store: Arc<dyn InstructionStore>,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmPaymentRequest {
    #[serde(rename = "aliasId", default)]
    pub alias_id: String,
    #[serde(rename = "orderId", default)]
    pub order_id: String,
}

#[derive(Debug, Serialize)]
pub struct ConfirmPaymentResponse {
    pub success: bool,
    #[serde(rename = "alreadyProcessed", skip_serializing_if = "Option::is_none")]
    pub already_processed: Option<bool>,
}

/// Base64 HTML fragment the browser must render to complete 3-D Secure.
#[derive(Debug, Serialize)]
pub struct ChallengeResponse {
    pub challenge: String,
}

#[derive(Debug, Serialize)]
pub struct PaymentStatusResponse {
    #[serde(rename = "orderId")]
    pub order_id: String,
    #[serde(rename = "paymentResult")]
    pub payment_result: Option<String>,
}

/// POST /pitch/confirm-payment
pub async fn confirm_payment(
    State(state): State<Arc<PaymentState>>,
    headers: HeaderMap,
    Json(payload): Json<ConfirmPaymentRequest>,
) -> Result<Response, AppError> {
    let request_id = get_request_id_from_headers(&headers);
    info!(order_id = %payload.order_id, "💳 Confirming payment");

    let outcome = state
        .service
        .confirm(&payload.alias_id, &payload.order_id)
        .await
        .map_err(|e| {
            let mut err: AppError = e.into();
            err.request_id = request_id.clone();
            err
        })?;

    let response = match outcome {
        ConfirmOutcome::Captured => Json(ConfirmPaymentResponse {
            success: true,
            already_processed: None,
        })
        .into_response(),
        ConfirmOutcome::AlreadyProcessed => Json(ConfirmPaymentResponse {
            success: true,
            already_processed: Some(true),
        })
        .into_response(),
        ConfirmOutcome::ChallengeRequired(challenge) => {
            Json(ChallengeResponse { challenge }).into_response()
        }
    };
    Ok(response)
}

/// GET /pitch/payment-status/{order_id}
pub async fn payment_status(
    State(state): State<Arc<PaymentState>>,
    headers: HeaderMap,
    Path(order_id): Path<String>,
) -> Result<Json<PaymentStatusResponse>, AppError> {
    let request_id = get_request_id_from_headers(&headers);
    let instruction = state
        .store
        .get_instruction(&order_id)
        .await
        .map_err(|e| {
            let mut err: AppError = e.into();
            err.request_id = request_id.clone();
            err
        })?
        .ok_or_else(|| {
            let mut err = AppError::new(crate::error::AppErrorKind::OrderNotFound {
                order_id: order_id.clone(),
            });
            err.request_id = request_id.clone();
            err
        })?;

    Ok(Json(PaymentStatusResponse {
        order_id: instruction.order_id,
        payment_result: instruction.payment_result,
    }))
}

/// POST /pitch/deals/{deal_id}/close
///
/// Invoked by the back-office flow once a matter is fully opened. Payment
/// confirmation never closes deals on its own.
pub async fn close_deal(
    State(state): State<Arc<PaymentState>>,
    headers: HeaderMap,
    Path(deal_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let request_id = get_request_id_from_headers(&headers);
    state.store.close_deal(deal_id).await.map_err(|e| {
        let mut err: AppError = e.into();
        err.request_id = request_id;
        err
    })?;
    info!(deal_id = %deal_id, "🤝 Deal closed");
    Ok(Json(serde_json::json!({ "success": true })))
}

pub fn router(state: Arc<PaymentState>) -> Router {
    Router::new()
        .route("/pitch/confirm-payment", post(confirm_payment))
        .route("/pitch/payment-status/{order_id}", get(payment_status))
        .route("/pitch/deals/{deal_id}/close", post(close_deal))
        .with_state(state)
}
