//! Withdrawal request and admin approval endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::error::AppError;
use crate::schemas::{
    ApproveWithdrawalRequest, CreateWithdrawalRequest, WithdrawalApprovalResponse,
    WithdrawalSchema, WithdrawalStatusResponse,
};
use crate::AppState;

pub async fn request_withdrawal(
    State(state): State<AppState>,
    Json(request): Json<CreateWithdrawalRequest>,
) -> Result<impl IntoResponse, AppError> {
    let withdrawal = state
        .withdrawals
        .request(request.merchant_id, request.amount, request.destination)
        .await?;

    Ok((StatusCode::CREATED, Json(WithdrawalSchema::from(withdrawal))))
}

pub async fn approve_withdrawal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<ApproveWithdrawalRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let external_tx_ref = body.and_then(|Json(b)| b.external_tx_ref);
    let approval = state.withdrawals.approve(id, external_tx_ref).await?;

    Ok(Json(WithdrawalApprovalResponse {
        status: "completed".to_string(),
        withdrawal: approval.withdrawal.into(),
        fee_amount: approval.fee_amount,
        net_amount: approval.net_amount,
    }))
}

pub async fn reject_withdrawal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let rejection = state.withdrawals.reject(id).await?;

    Ok(Json(WithdrawalStatusResponse {
        status: "rejected".to_string(),
        withdrawal: rejection.withdrawal.into(),
    }))
}
