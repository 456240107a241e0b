use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::models::{PaymentIntent, Withdrawal, WithdrawalStatus};
use crate::domain::ledger::LedgerOperation;
use crate::domain::payment::PaymentStatus;

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub merchant_id: Uuid,
    pub base_amount: BigDecimal,
    #[serde(default)]
    pub payer: Option<String>,
    #[serde(default)]
    pub memo: Option<String>,
    #[serde(default = "default_metadata")]
    pub metadata: serde_json::Value,
}

fn default_metadata() -> serde_json::Value {
    serde_json::json!({})
}

#[derive(Debug, Deserialize)]
pub struct SubmitPaymentRequest {
    /// Wallet-SDK assigned payment identifier.
    pub payment_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ApprovePaymentRequest {
    pub payment_id: String,
    /// Amount the wallet reports for the payment; must match the intent.
    pub amount: BigDecimal,
}

#[derive(Debug, Deserialize)]
pub struct CompletePaymentRequest {
    pub payment_id: String,
    pub tx_hash: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentIntentSchema {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub gross_amount: BigDecimal,
    pub base_amount: BigDecimal,
    pub fee_amount: BigDecimal,
    pub asset_code: String,
    pub status: PaymentStatus,
    pub external_payment_id: Option<String>,
    pub tx_hash: Option<String>,
    pub payer: Option<String>,
    pub memo: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<PaymentIntent> for PaymentIntentSchema {
    fn from(intent: PaymentIntent) -> Self {
        Self {
            id: intent.id,
            merchant_id: intent.merchant_id,
            gross_amount: intent.gross_amount,
            base_amount: intent.base_amount,
            fee_amount: intent.fee_amount,
            asset_code: intent.asset_code,
            status: intent.status,
            external_payment_id: intent.external_payment_id,
            tx_hash: intent.tx_hash,
            payer: intent.payer,
            memo: intent.memo,
            metadata: intent.metadata,
            created_at: intent.created_at,
            approved_at: intent.approved_at,
            completed_at: intent.completed_at,
        }
    }
}

/// Single success/failure signal per handshake phase; `status` carries the
/// `already_*` marker when an SDK retry was resolved as a no-op.
#[derive(Debug, Serialize, Deserialize)]
pub struct HandshakeResponse {
    pub status: String,
    pub payment: PaymentIntentSchema,
}

#[derive(Debug, Deserialize)]
pub struct CreateWithdrawalRequest {
    pub merchant_id: Uuid,
    pub amount: BigDecimal,
    pub destination: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApproveWithdrawalRequest {
    #[serde(default)]
    pub external_tx_ref: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WithdrawalSchema {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub amount: BigDecimal,
    pub status: WithdrawalStatus,
    pub destination: String,
    pub external_tx_ref: Option<String>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl From<Withdrawal> for WithdrawalSchema {
    fn from(w: Withdrawal) -> Self {
        Self {
            id: w.id,
            merchant_id: w.merchant_id,
            amount: w.amount,
            status: w.status,
            destination: w.destination,
            external_tx_ref: w.external_tx_ref,
            note: w.note,
            created_at: w.created_at,
            resolved_at: w.resolved_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WithdrawalStatusResponse {
    pub status: String,
    pub withdrawal: WithdrawalSchema,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WithdrawalApprovalResponse {
    pub status: String,
    pub withdrawal: WithdrawalSchema,
    pub fee_amount: BigDecimal,
    pub net_amount: BigDecimal,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OperationSchema {
    pub id: String,
    pub kind: String,
    pub source_account: String,
    pub from: Option<String>,
    pub to: Option<String>,
    pub amount: Option<BigDecimal>,
    pub asset_code: String,
    pub tx_hash: String,
    pub ledger_time: DateTime<Utc>,
}

impl From<LedgerOperation> for OperationSchema {
    fn from(op: LedgerOperation) -> Self {
        Self {
            id: op.id,
            kind: op.kind,
            source_account: op.source_account,
            from: op.from,
            to: op.to,
            amount: op.amount,
            asset_code: op.asset_code,
            tx_hash: op.tx_hash,
            ledger_time: op.ledger_time,
        }
    }
}

/// Reconciliation view. A partial run keeps the operations collected so far
/// and reports the failure alongside them instead of discarding the work.
#[derive(Debug, Serialize, Deserialize)]
pub struct OperationListResponse {
    pub account: String,
    pub operations: Vec<OperationSchema>,
    pub next_cursor: Option<String>,
    pub pages_fetched: u32,
    pub partial: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}
