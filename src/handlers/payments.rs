//! Payment handshake endpoints.
//!
//! `approve` and `complete` are the two idempotent RPCs the wallet SDK's
//! server callbacks hit; the SDK retries them freely, so a replay resolves
//! to the same terminal state with an `already_*` marker instead of an
//! error.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::error::AppError;
use crate::schemas::{
    ApprovePaymentRequest, CompletePaymentRequest, CreatePaymentRequest, HandshakeResponse,
    PaymentIntentSchema, SubmitPaymentRequest,
};
use crate::services::handshake::{Approval, Completion, CreatePayment};
use crate::AppState;

pub async fn create_payment(
    State(state): State<AppState>,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let intent = state
        .handshake
        .create(CreatePayment {
            merchant_id: request.merchant_id,
            base_amount: request.base_amount,
            payer: request.payer,
            memo: request.memo,
            metadata: request.metadata,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(PaymentIntentSchema::from(intent))))
}

pub async fn submit_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SubmitPaymentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let intent = state
        .handshake
        .register_submission(id, &request.payment_id)
        .await?;

    Ok(Json(HandshakeResponse {
        status: intent.status.as_str().to_string(),
        payment: intent.into(),
    }))
}

pub async fn approve_payment(
    State(state): State<AppState>,
    Json(request): Json<ApprovePaymentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let approval = state
        .handshake
        .approve(&request.payment_id, &request.amount)
        .await?;

    let (status, intent) = match approval {
        Approval::Approved(intent) => ("approved", intent),
        Approval::AlreadyApproved(intent) => ("already_approved", intent),
    };

    Ok(Json(HandshakeResponse {
        status: status.to_string(),
        payment: intent.into(),
    }))
}

pub async fn complete_payment(
    State(state): State<AppState>,
    Json(request): Json<CompletePaymentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let completion = state
        .handshake
        .complete(&request.payment_id, &request.tx_hash)
        .await?;

    let (status, intent) = match completion {
        Completion::Completed(intent) => ("completed", intent),
        Completion::AlreadyCompleted(intent) => ("already_completed", intent),
    };

    Ok(Json(HandshakeResponse {
        status: status.to_string(),
        payment: intent.into(),
    }))
}

pub async fn cancel_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let intent = state.handshake.cancel(id).await?;

    Ok(Json(HandshakeResponse {
        status: intent.status.as_str().to_string(),
        payment: intent.into(),
    }))
}

pub async fn get_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let intent = state.handshake.get(id).await?;
    Ok(Json(PaymentIntentSchema::from(intent)))
}
