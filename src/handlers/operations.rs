//! Reconciliation view over the remote ledger.
//!
//! Read-only: streams the account's operations out of the sync engine and
//! never treats them as authoritative. An interrupted run returns the pages
//! collected so far with `partial: true` rather than a hard error.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::error::AppError;
use crate::schemas::OperationListResponse;
use crate::services::ledger_sync::LedgerSyncEngine;
use crate::utils::cursor;
use crate::AppState;

#[derive(Debug, Deserialize, IntoParams)]
pub struct OperationsQuery {
    /// Opaque resume cursor from a previous response.
    pub cursor: Option<String>,
    /// Page size override towards the upstream API.
    pub limit: Option<u32>,
}

pub async fn list_operations(
    State(state): State<AppState>,
    Path(account): Path<String>,
    Query(query): Query<OperationsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let resume = match query.cursor {
        Some(raw) => {
            let (cursor_account, token) =
                cursor::decode(&raw).map_err(AppError::Validation)?;
            if cursor_account != account {
                return Err(AppError::Validation(
                    "cursor does not belong to this account".into(),
                ));
            }
            Some(token)
        }
        None => None,
    };

    let mut sync_config = state.sync_config.clone();
    if let Some(limit) = query.limit {
        sync_config.page_size = limit.clamp(1, 200);
    }

    let engine = LedgerSyncEngine::new(state.horizon_client.clone(), sync_config);
    let report = engine.sync_operations(&account, resume).await;

    let next_cursor = report
        .last_cursor
        .as_deref()
        .map(|token| cursor::encode(&account, token));
    let (error, error_kind) = match &report.error {
        Some(err) => (Some(err.to_string()), Some(err.kind().to_string())),
        None => (None, None),
    };

    let partial = report.is_partial();
    Ok(Json(OperationListResponse {
        account,
        operations: report.operations.into_iter().map(Into::into).collect(),
        next_cursor,
        pages_fetched: report.pages_fetched,
        partial,
        error,
        error_kind,
    }))
}
