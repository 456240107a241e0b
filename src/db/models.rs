//! Persisted entities.
//!
//! Every status field is a closed enum backed by a Postgres enum type, so
//! an invalid state is unrepresentable both in Rust and at rest.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::payment::PaymentStatus;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema,
)]
#[sqlx(type_name = "withdrawal_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    Pending,
    Completed,
    Rejected,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema,
)]
#[sqlx(type_name = "fee_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FeeType {
    Withdrawal,
    Payment,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema,
)]
#[sqlx(type_name = "fee_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FeeStatus {
    Pending,
    Completed,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema,
)]
#[sqlx(type_name = "notification_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Payment,
    Withdrawal,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Merchant {
    pub id: Uuid,
    pub display_name: String,
    pub payout_address: Option<String>,
    pub available_balance: BigDecimal,
    pub total_withdrawn: BigDecimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PaymentIntent {
    pub id: Uuid,
    pub merchant_id: Uuid,
    /// Customer-facing charge, fee included.
    pub gross_amount: BigDecimal,
    /// Merchant-facing amount before platform fee.
    pub base_amount: BigDecimal,
    pub fee_amount: BigDecimal,
    pub asset_code: String,
    pub status: PaymentStatus,
    /// Wallet-SDK assigned identifier; unique once bound.
    pub external_payment_id: Option<String>,
    /// Ledger-assigned hash; present exactly when status is `completed`.
    pub tx_hash: Option<String>,
    pub payer: Option<String>,
    pub memo: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentIntent {
    pub fn new(
        merchant_id: Uuid,
        gross_amount: BigDecimal,
        base_amount: BigDecimal,
        fee_amount: BigDecimal,
        asset_code: String,
        payer: Option<String>,
        memo: Option<String>,
        metadata: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            merchant_id,
            gross_amount,
            base_amount,
            fee_amount,
            asset_code,
            status: PaymentStatus::Created,
            external_payment_id: None,
            tx_hash: None,
            payer,
            memo,
            metadata,
            created_at: now,
            approved_at: None,
            completed_at: None,
            updated_at: now,
        }
    }
}

/// Settled (or terminally failed) payment, persisted once per intent.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub intent_id: Uuid,
    pub amount: BigDecimal,
    pub status: PaymentStatus,
    pub payer: Option<String>,
    pub memo: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Withdrawal {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub amount: BigDecimal,
    pub status: WithdrawalStatus,
    pub destination: String,
    pub external_tx_ref: Option<String>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Withdrawal {
    pub fn new(merchant_id: Uuid, amount: BigDecimal, destination: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            merchant_id,
            amount,
            status: WithdrawalStatus::Pending,
            destination,
            external_tx_ref: None,
            note: None,
            created_at: now,
            resolved_at: None,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PlatformFee {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub amount: BigDecimal,
    pub fee_type: FeeType,
    /// Linked withdrawal or transaction id.
    pub source_id: Uuid,
    pub status: FeeStatus,
    pub created_at: DateTime<Utc>,
}

impl PlatformFee {
    pub fn completed(merchant_id: Uuid, amount: BigDecimal, fee_type: FeeType, source_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            merchant_id,
            amount,
            fee_type,
            source_id,
            status: FeeStatus::Completed,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(merchant_id: Uuid, title: String, message: String, kind: NotificationKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            merchant_id,
            title,
            message,
            kind,
            read: false,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_new_intent_starts_created_without_hash() {
        let intent = PaymentIntent::new(
            Uuid::new_v4(),
            BigDecimal::from_str("10.2000000").unwrap(),
            BigDecimal::from_str("10.0000000").unwrap(),
            BigDecimal::from_str("0.2000000").unwrap(),
            "PI".to_string(),
            None,
            Some("order-77".to_string()),
            serde_json::json!({}),
        );
        assert_eq!(intent.status, PaymentStatus::Created);
        assert!(intent.tx_hash.is_none());
        assert!(intent.external_payment_id.is_none());
    }

    #[test]
    fn test_new_withdrawal_is_pending() {
        let w = Withdrawal::new(
            Uuid::new_v4(),
            BigDecimal::from_str("5").unwrap(),
            "GBBD47UZQ5CSKQPV456PYYH4FSYJHBWGQJUVNMCNWZ2NBEHKQPW3KXKJ".to_string(),
        );
        assert_eq!(w.status, WithdrawalStatus::Pending);
        assert!(w.external_tx_ref.is_none());
    }
}
