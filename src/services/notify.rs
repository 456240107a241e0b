//! Notification and email collaborators.
//!
//! Both are fire-and-forget from the workflows' point of view; the real
//! email transport lives outside this service and is only invoked through
//! the [`WithdrawalMailer`] port.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;

use crate::db::models::Notification;
use crate::db::queries;
use crate::ports::{Notifier, SideEffectError, WithdrawalEmail, WithdrawalMailer};

/// Persists merchant notifications for the dashboard to read.
#[derive(Clone)]
pub struct PgNotifier {
    pool: PgPool,
}

impl PgNotifier {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Notifier for PgNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), SideEffectError> {
        queries::insert_notification(&self.pool, notification)
            .await
            .map_err(|e| SideEffectError(e.to_string()))?;
        Ok(())
    }
}

/// Hands the payload to the external dispatcher by logging it; the actual
/// transport is owned by the platform's mail service.
#[derive(Clone, Default)]
pub struct TracingMailer;

#[async_trait]
impl WithdrawalMailer for TracingMailer {
    async fn send_withdrawal_email(&self, email: &WithdrawalEmail) -> Result<(), SideEffectError> {
        info!(
            merchant_id = %email.merchant_id,
            withdrawal_id = %email.withdrawal_id,
            gross = %email.gross_amount,
            net = %email.net_amount,
            approved = email.approved,
            "withdrawal email dispatched"
        );
        Ok(())
    }
}
