pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod health;
pub mod middleware;
pub mod ports;
pub mod schemas;
pub mod services;
pub mod stellar;
pub mod utils;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::services::ledger_sync::SyncConfig;
use crate::services::{PaymentHandshake, WithdrawalWorkflow};
use crate::stellar::HorizonClient;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub horizon_client: HorizonClient,
    pub handshake: Arc<PaymentHandshake>,
    pub withdrawals: Arc<WithdrawalWorkflow>,
    pub sync_config: SyncConfig,
    pub start_time: std::time::Instant,
}

pub fn create_app(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/payments", post(handlers::payments::create_payment))
        .route("/payments/approve", post(handlers::payments::approve_payment))
        .route("/payments/complete", post(handlers::payments::complete_payment))
        .route("/payments/:id", get(handlers::payments::get_payment))
        .route("/payments/:id/submit", post(handlers::payments::submit_payment))
        .route("/payments/:id/cancel", post(handlers::payments::cancel_payment))
        .route("/withdrawals", post(handlers::withdrawals::request_withdrawal))
        .route(
            "/withdrawals/:id/approve",
            post(handlers::withdrawals::approve_withdrawal),
        )
        .route(
            "/withdrawals/:id/reject",
            post(handlers::withdrawals::reject_withdrawal),
        )
        .route(
            "/accounts/:account/operations",
            get(handlers::operations::list_operations),
        )
        .layer(axum::middleware::from_fn(
            middleware::request_logger::request_logger_middleware,
        ))
        .with_state(app_state)
}
