//! Payment endpoints
//!
//! - `POST /initiate-payment` - send an STK push prompt to the given phone
//! - `POST /mpesa/callback` - receive the gateway's result for a prompt

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use tracing::{error, info, warn};

use crate::models::{
    AppState, CallbackAck, InitiatePaymentRequest, InitiatePaymentResponse, StkCallbackEnvelope,
};
use crate::payment::mask_phone;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/initiate-payment", post(initiate_payment))
        .route("/mpesa/callback", post(stk_callback))
        .with_state(state)
}

/// Every failure on the way to the gateway is reported the same way: 500 and `success: false`.
/// An unreadable body counts as such a failure.
async fn initiate_payment(
    State(state): State<AppState>,
    payload: Result<Json<InitiatePaymentRequest>, JsonRejection>,
) -> impl IntoResponse {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            error!("Unreadable payment request: {}", rejection.body_text());
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(InitiatePaymentResponse { success: false }),
            );
        }
    };

    info!(phone = %mask_phone(&request.phone_number), "Initiating M-PESA payment");

    match state.gateway.initiate_payment(&request.phone_number).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(InitiatePaymentResponse { success: outcome.accepted }),
        ),
        Err(e) => {
            error!("Payment initiation failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(InitiatePaymentResponse { success: false }),
            )
        }
    }
}

async fn stk_callback(Json(envelope): Json<StkCallbackEnvelope>) -> impl IntoResponse {
    let callback = envelope.body.stk_callback;

    if callback.is_success() {
        info!(
            checkout_request_id = %callback.checkout_request_id,
            receipt = ?callback.metadata("MpesaReceiptNumber"),
            amount = ?callback.metadata("Amount"),
            "M-PESA payment completed"
        );
    } else {
        warn!(
            checkout_request_id = %callback.checkout_request_id,
            result_code = callback.result_code,
            result_desc = %callback.result_desc,
            "M-PESA payment not completed"
        );
    }

    Json(CallbackAck::accepted())
}
