//! In-memory [`PaymentIntentStore`].
//!
//! All maps live behind a single `RwLock`, so every conditional update is
//! applied under one write guard and observes the same atomicity the
//! Postgres store gets from its transactions. Used by tests and useful for
//! local development without a database.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::models::{
    Merchant, PaymentIntent, PlatformFee, TransactionRecord, Withdrawal, WithdrawalStatus,
};
use crate::domain::payment::PaymentStatus;
use crate::ports::{PaymentIntentStore, StoreError};

#[derive(Default)]
struct Inner {
    intents: HashMap<Uuid, PaymentIntent>,
    by_external_id: HashMap<String, Uuid>,
    transactions: Vec<TransactionRecord>,
    withdrawals: HashMap<Uuid, Withdrawal>,
    fees: Vec<PlatformFee>,
    merchants: HashMap<Uuid, Merchant>,
}

#[derive(Default, Clone)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a merchant with the given starting balance.
    pub async fn seed_merchant(&self, id: Uuid, available_balance: BigDecimal) {
        let now = Utc::now();
        let merchant = Merchant {
            id,
            display_name: format!("merchant-{}", id),
            payout_address: None,
            available_balance,
            total_withdrawn: BigDecimal::from(0),
            created_at: now,
            updated_at: now,
        };
        self.inner.write().await.merchants.insert(id, merchant);
    }

    /// Snapshot of persisted transaction records, oldest first.
    pub async fn transactions(&self) -> Vec<TransactionRecord> {
        self.inner.read().await.transactions.clone()
    }

    /// Snapshot of recorded platform fees, oldest first.
    pub async fn fees(&self) -> Vec<PlatformFee> {
        self.inner.read().await.fees.clone()
    }
}

#[async_trait]
impl PaymentIntentStore for InMemoryStore {
    async fn insert_intent(&self, intent: &PaymentIntent) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.intents.contains_key(&intent.id) {
            return Err(StoreError::Duplicate(format!(
                "payment intent {} already exists",
                intent.id
            )));
        }
        inner.intents.insert(intent.id, intent.clone());
        Ok(())
    }

    async fn intent_by_id(&self, id: Uuid) -> Result<Option<PaymentIntent>, StoreError> {
        Ok(self.inner.read().await.intents.get(&id).cloned())
    }

    async fn intent_by_external_id(
        &self,
        external_payment_id: &str,
    ) -> Result<Option<PaymentIntent>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_external_id
            .get(external_payment_id)
            .and_then(|id| inner.intents.get(id))
            .cloned())
    }

    async fn bind_external_id(
        &self,
        intent_id: Uuid,
        external_payment_id: &str,
    ) -> Result<PaymentIntent, StoreError> {
        let mut inner = self.inner.write().await;

        if let Some(owner) = inner.by_external_id.get(external_payment_id) {
            if *owner != intent_id {
                return Err(StoreError::Duplicate(format!(
                    "payment id {} is already bound to another intent",
                    external_payment_id
                )));
            }
        }

        let intent = inner
            .intents
            .get_mut(&intent_id)
            .ok_or_else(|| StoreError::NotFound(format!("payment intent {}", intent_id)))?;

        if intent.status != PaymentStatus::Created || intent.external_payment_id.is_some() {
            return Err(StoreError::PreconditionFailed(format!(
                "payment intent {} is not awaiting submission",
                intent_id
            )));
        }

        intent.external_payment_id = Some(external_payment_id.to_string());
        intent.status = PaymentStatus::PendingApproval;
        intent.updated_at = Utc::now();
        let snapshot = intent.clone();
        inner
            .by_external_id
            .insert(external_payment_id.to_string(), intent_id);
        Ok(snapshot)
    }

    async fn transition_intent(
        &self,
        intent_id: Uuid,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> Result<Option<PaymentIntent>, StoreError> {
        let mut inner = self.inner.write().await;
        let Some(intent) = inner.intents.get_mut(&intent_id) else {
            return Err(StoreError::NotFound(format!("payment intent {}", intent_id)));
        };
        if intent.status != from {
            return Ok(None);
        }
        intent.status = to;
        let now = Utc::now();
        if to == PaymentStatus::Approved {
            intent.approved_at = Some(now);
        }
        intent.updated_at = now;
        Ok(Some(intent.clone()))
    }

    async fn complete_intent(
        &self,
        intent_id: Uuid,
        tx_hash: &str,
        record: &TransactionRecord,
        credit: &BigDecimal,
        fee: Option<&PlatformFee>,
    ) -> Result<Option<PaymentIntent>, StoreError> {
        let mut inner = self.inner.write().await;

        let Some(intent) = inner.intents.get_mut(&intent_id) else {
            return Err(StoreError::NotFound(format!("payment intent {}", intent_id)));
        };
        if intent.status != PaymentStatus::PendingCompletion {
            return Ok(None);
        }

        let now = Utc::now();
        intent.status = PaymentStatus::Completed;
        intent.tx_hash = Some(tx_hash.to_string());
        intent.completed_at = Some(now);
        intent.updated_at = now;
        let merchant_id = intent.merchant_id;
        let snapshot = intent.clone();

        inner.transactions.push(record.clone());
        if let Some(merchant) = inner.merchants.get_mut(&merchant_id) {
            merchant.available_balance = &merchant.available_balance + credit;
            merchant.updated_at = now;
        }
        if let Some(fee) = fee {
            inner.fees.push(fee.clone());
        }
        Ok(Some(snapshot))
    }

    async fn cancel_intent(&self, intent_id: Uuid) -> Result<Option<PaymentIntent>, StoreError> {
        let mut inner = self.inner.write().await;
        let Some(intent) = inner.intents.get_mut(&intent_id) else {
            return Err(StoreError::NotFound(format!("payment intent {}", intent_id)));
        };
        if !matches!(
            intent.status,
            PaymentStatus::Created | PaymentStatus::PendingApproval | PaymentStatus::Approved
        ) {
            return Ok(None);
        }
        intent.status = PaymentStatus::Cancelled;
        intent.updated_at = Utc::now();
        Ok(Some(intent.clone()))
    }

    async fn insert_withdrawal(&self, withdrawal: &Withdrawal) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.withdrawals.contains_key(&withdrawal.id) {
            return Err(StoreError::Duplicate(format!(
                "withdrawal {} already exists",
                withdrawal.id
            )));
        }
        inner.withdrawals.insert(withdrawal.id, withdrawal.clone());
        Ok(())
    }

    async fn withdrawal_by_id(&self, id: Uuid) -> Result<Option<Withdrawal>, StoreError> {
        Ok(self.inner.read().await.withdrawals.get(&id).cloned())
    }

    async fn approve_withdrawal(
        &self,
        id: Uuid,
        gross: &BigDecimal,
        net: &BigDecimal,
        external_tx_ref: &str,
        note: &str,
    ) -> Result<Withdrawal, StoreError> {
        let mut inner = self.inner.write().await;

        let merchant_id = {
            let withdrawal = inner
                .withdrawals
                .get(&id)
                .ok_or_else(|| StoreError::NotFound(format!("withdrawal {}", id)))?;
            if withdrawal.status != WithdrawalStatus::Pending {
                return Err(StoreError::PreconditionFailed(format!(
                    "withdrawal {} is not pending",
                    id
                )));
            }
            withdrawal.merchant_id
        };

        // Balance guard before any mutation; an insufficient balance must
        // leave both the withdrawal and the merchant untouched.
        let available = inner
            .merchants
            .get(&merchant_id)
            .map(|m| m.available_balance.clone())
            .ok_or_else(|| StoreError::NotFound(format!("merchant {}", merchant_id)))?;
        if available < *gross {
            return Err(StoreError::InsufficientBalance {
                available,
                requested: gross.clone(),
            });
        }

        let now = Utc::now();
        let merchant = inner
            .merchants
            .get_mut(&merchant_id)
            .expect("merchant checked above");
        merchant.available_balance = &merchant.available_balance - gross;
        merchant.total_withdrawn = &merchant.total_withdrawn + net;
        merchant.updated_at = now;

        let withdrawal = inner
            .withdrawals
            .get_mut(&id)
            .expect("withdrawal checked above");
        withdrawal.status = WithdrawalStatus::Completed;
        withdrawal.external_tx_ref = Some(external_tx_ref.to_string());
        withdrawal.note = Some(note.to_string());
        withdrawal.resolved_at = Some(now);
        withdrawal.updated_at = now;
        Ok(withdrawal.clone())
    }

    async fn reject_withdrawal(&self, id: Uuid) -> Result<Withdrawal, StoreError> {
        let mut inner = self.inner.write().await;
        let withdrawal = inner
            .withdrawals
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("withdrawal {}", id)))?;
        if withdrawal.status != WithdrawalStatus::Pending {
            return Err(StoreError::PreconditionFailed(format!(
                "withdrawal {} is not pending",
                id
            )));
        }
        let now = Utc::now();
        withdrawal.status = WithdrawalStatus::Rejected;
        withdrawal.resolved_at = Some(now);
        withdrawal.updated_at = now;
        Ok(withdrawal.clone())
    }

    async fn insert_fee(&self, fee: &PlatformFee) -> Result<(), StoreError> {
        self.inner.write().await.fees.push(fee.clone());
        Ok(())
    }

    async fn merchant_by_id(&self, id: Uuid) -> Result<Option<Merchant>, StoreError> {
        Ok(self.inner.read().await.merchants.get(&id).cloned())
    }
}
