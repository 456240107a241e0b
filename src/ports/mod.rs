//! Persistence and side-effect ports.
//!
//! The services talk to storage through [`PaymentIntentStore`] so the same
//! handshake and withdrawal logic runs against Postgres in production and
//! the in-memory store in tests. Every mutating method is a conditional
//! update: the store applies the write only when the caller's precondition
//! still holds, which is what makes retried SDK callbacks and concurrent
//! approvals safe.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use uuid::Uuid;

use crate::db::models::{
    Merchant, Notification, PaymentIntent, PlatformFee, TransactionRecord, Withdrawal,
};
use crate::domain::payment::PaymentStatus;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A conditional update found the row in a different state.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),
    /// A uniqueness constraint rejected the write.
    #[error("duplicate: {0}")]
    Duplicate(String),
    #[error("insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance {
        available: BigDecimal,
        requested: BigDecimal,
    },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Duplicate(db.to_string())
            }
            sqlx::Error::RowNotFound => StoreError::NotFound(err.to_string()),
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

#[async_trait]
pub trait PaymentIntentStore: Send + Sync {
    // Payment intents
    async fn insert_intent(&self, intent: &PaymentIntent) -> Result<(), StoreError>;
    async fn intent_by_id(&self, id: Uuid) -> Result<Option<PaymentIntent>, StoreError>;
    async fn intent_by_external_id(
        &self,
        external_payment_id: &str,
    ) -> Result<Option<PaymentIntent>, StoreError>;

    /// Binds the SDK-assigned payment identifier and moves the intent from
    /// `created` to `pending_approval`. The identifier is unique across all
    /// intents; rebinding to a different intent is a [`StoreError::Duplicate`].
    async fn bind_external_id(
        &self,
        intent_id: Uuid,
        external_payment_id: &str,
    ) -> Result<PaymentIntent, StoreError>;

    /// Compare-and-set on the intent status. Returns the updated row, or
    /// `None` when the intent was not in `from` (the caller lost a race or
    /// is replaying a callback).
    async fn transition_intent(
        &self,
        intent_id: Uuid,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> Result<Option<PaymentIntent>, StoreError>;

    /// Winning completion: `pending_completion -> completed` plus the
    /// exactly-once side effects (transaction record, merchant balance
    /// credit, optional payment fee) applied atomically. Returns `None`
    /// when another caller already completed the intent.
    async fn complete_intent(
        &self,
        intent_id: Uuid,
        tx_hash: &str,
        record: &TransactionRecord,
        credit: &BigDecimal,
        fee: Option<&PlatformFee>,
    ) -> Result<Option<PaymentIntent>, StoreError>;

    /// `created | pending_approval | approved -> cancelled`. Returns `None`
    /// when the intent was already past the point of no return.
    async fn cancel_intent(&self, intent_id: Uuid) -> Result<Option<PaymentIntent>, StoreError>;

    // Withdrawals
    async fn insert_withdrawal(&self, withdrawal: &Withdrawal) -> Result<(), StoreError>;
    async fn withdrawal_by_id(&self, id: Uuid) -> Result<Option<Withdrawal>, StoreError>;

    /// Claims `pending -> completed`, debits the merchant's available
    /// balance by the gross amount guarded by `available_balance >= gross`,
    /// and credits `total_withdrawn` by the net amount, as one atomic unit.
    ///
    /// Errors: [`StoreError::PreconditionFailed`] when the withdrawal is not
    /// pending (a concurrent approval won), [`StoreError::InsufficientBalance`]
    /// when the guard fails; in both cases nothing is mutated.
    async fn approve_withdrawal(
        &self,
        id: Uuid,
        gross: &BigDecimal,
        net: &BigDecimal,
        external_tx_ref: &str,
        note: &str,
    ) -> Result<Withdrawal, StoreError>;

    /// `pending -> rejected`; no balance or fee mutation.
    async fn reject_withdrawal(&self, id: Uuid) -> Result<Withdrawal, StoreError>;

    // Fees and merchants
    async fn insert_fee(&self, fee: &PlatformFee) -> Result<(), StoreError>;
    async fn merchant_by_id(&self, id: Uuid) -> Result<Option<Merchant>, StoreError>;
}

/// Merchant-facing notification collaborator. Fire-and-forget: failures are
/// logged by the caller, never propagated.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), SideEffectError>;
}

/// Payload handed to the external email dispatcher on withdrawal resolution.
#[derive(Debug, Clone, serde::Serialize)]
pub struct WithdrawalEmail {
    pub merchant_id: Uuid,
    pub withdrawal_id: Uuid,
    pub gross_amount: BigDecimal,
    pub fee_amount: BigDecimal,
    pub net_amount: BigDecimal,
    pub destination: String,
    pub approved: bool,
}

/// Opaque email dispatch collaborator.
#[async_trait]
pub trait WithdrawalMailer: Send + Sync {
    async fn send_withdrawal_email(&self, email: &WithdrawalEmail) -> Result<(), SideEffectError>;
}

#[derive(Debug, thiserror::Error)]
#[error("side effect failed: {0}")]
pub struct SideEffectError(pub String);
