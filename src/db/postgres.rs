//! Postgres-backed [`PaymentIntentStore`].
//!
//! Single-row conditional updates live in [`crate::db::queries`]; the
//! multi-entity operations (completion side effects, withdrawal approval)
//! run inside one database transaction so the balance mutation and the
//! status claim commit or roll back together.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::{Merchant, PaymentIntent, PlatformFee, TransactionRecord, Withdrawal};
use crate::db::queries;
use crate::domain::payment::PaymentStatus;
use crate::ports::{PaymentIntentStore, StoreError};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentIntentStore for PgStore {
    async fn insert_intent(&self, intent: &PaymentIntent) -> Result<(), StoreError> {
        queries::insert_intent(&self.pool, intent).await?;
        Ok(())
    }

    async fn intent_by_id(&self, id: Uuid) -> Result<Option<PaymentIntent>, StoreError> {
        Ok(queries::get_intent(&self.pool, id).await?)
    }

    async fn intent_by_external_id(
        &self,
        external_payment_id: &str,
    ) -> Result<Option<PaymentIntent>, StoreError> {
        Ok(queries::get_intent_by_external_id(&self.pool, external_payment_id).await?)
    }

    async fn bind_external_id(
        &self,
        intent_id: Uuid,
        external_payment_id: &str,
    ) -> Result<PaymentIntent, StoreError> {
        queries::bind_external_id(&self.pool, intent_id, external_payment_id)
            .await?
            .ok_or_else(|| {
                StoreError::PreconditionFailed(format!(
                    "payment intent {} is not awaiting submission",
                    intent_id
                ))
            })
    }

    async fn transition_intent(
        &self,
        intent_id: Uuid,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> Result<Option<PaymentIntent>, StoreError> {
        Ok(queries::transition_intent(&self.pool, intent_id, from, to).await?)
    }

    async fn complete_intent(
        &self,
        intent_id: Uuid,
        tx_hash: &str,
        record: &TransactionRecord,
        credit: &BigDecimal,
        fee: Option<&PlatformFee>,
    ) -> Result<Option<PaymentIntent>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;

        let updated = sqlx::query_as::<_, PaymentIntent>(
            "UPDATE payment_intents \
             SET status = 'completed', tx_hash = $2, completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status = 'pending_completion' \
             RETURNING *",
        )
        .bind(intent_id)
        .bind(tx_hash)
        .fetch_optional(&mut *tx)
        .await
        .map_err(StoreError::from)?;

        let Some(intent) = updated else {
            tx.rollback().await.map_err(StoreError::from)?;
            return Ok(None);
        };

        sqlx::query(
            "INSERT INTO transactions (id, merchant_id, intent_id, amount, status, payer, memo, metadata, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(record.id)
        .bind(record.merchant_id)
        .bind(record.intent_id)
        .bind(&record.amount)
        .bind(record.status)
        .bind(&record.payer)
        .bind(&record.memo)
        .bind(&record.metadata)
        .bind(record.created_at)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from)?;

        sqlx::query(
            "UPDATE merchants \
             SET available_balance = available_balance + $2, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(intent.merchant_id)
        .bind(credit)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from)?;

        if let Some(fee) = fee {
            sqlx::query(
                "INSERT INTO platform_fees (id, merchant_id, amount, fee_type, source_id, status, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(fee.id)
            .bind(fee.merchant_id)
            .bind(&fee.amount)
            .bind(fee.fee_type)
            .bind(fee.source_id)
            .bind(fee.status)
            .bind(fee.created_at)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from)?;
        }

        tx.commit().await.map_err(StoreError::from)?;
        Ok(Some(intent))
    }

    async fn cancel_intent(&self, intent_id: Uuid) -> Result<Option<PaymentIntent>, StoreError> {
        Ok(queries::cancel_intent(&self.pool, intent_id).await?)
    }

    async fn insert_withdrawal(&self, withdrawal: &Withdrawal) -> Result<(), StoreError> {
        queries::insert_withdrawal(&self.pool, withdrawal).await?;
        Ok(())
    }

    async fn withdrawal_by_id(&self, id: Uuid) -> Result<Option<Withdrawal>, StoreError> {
        Ok(queries::get_withdrawal(&self.pool, id).await?)
    }

    async fn approve_withdrawal(
        &self,
        id: Uuid,
        gross: &BigDecimal,
        net: &BigDecimal,
        external_tx_ref: &str,
        note: &str,
    ) -> Result<Withdrawal, StoreError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;

        let claimed = sqlx::query_as::<_, Withdrawal>(
            "UPDATE withdrawals \
             SET status = 'completed', external_tx_ref = $2, note = $3, \
                 resolved_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status = 'pending' \
             RETURNING *",
        )
        .bind(id)
        .bind(external_tx_ref)
        .bind(note)
        .fetch_optional(&mut *tx)
        .await
        .map_err(StoreError::from)?;

        let Some(withdrawal) = claimed else {
            tx.rollback().await.map_err(StoreError::from)?;
            return Err(StoreError::PreconditionFailed(format!(
                "withdrawal {} is not pending",
                id
            )));
        };

        // Gross comes off the available balance; the merchant's running
        // total only ever reflects what was actually paid out.
        let debited = sqlx::query_scalar::<_, BigDecimal>(
            "UPDATE merchants \
             SET available_balance = available_balance - $2, \
                 total_withdrawn = total_withdrawn + $3, \
                 updated_at = NOW() \
             WHERE id = $1 AND available_balance >= $2 \
             RETURNING available_balance",
        )
        .bind(withdrawal.merchant_id)
        .bind(gross)
        .bind(net)
        .fetch_optional(&mut *tx)
        .await
        .map_err(StoreError::from)?;

        if debited.is_none() {
            let available = sqlx::query_scalar::<_, BigDecimal>(
                "SELECT available_balance FROM merchants WHERE id = $1",
            )
            .bind(withdrawal.merchant_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(StoreError::from)?;

            tx.rollback().await.map_err(StoreError::from)?;
            return Err(StoreError::InsufficientBalance {
                available,
                requested: gross.clone(),
            });
        }

        tx.commit().await.map_err(StoreError::from)?;
        Ok(withdrawal)
    }

    async fn reject_withdrawal(&self, id: Uuid) -> Result<Withdrawal, StoreError> {
        queries::reject_withdrawal(&self.pool, id)
            .await?
            .ok_or_else(|| {
                StoreError::PreconditionFailed(format!("withdrawal {} is not pending", id))
            })
    }

    async fn insert_fee(&self, fee: &PlatformFee) -> Result<(), StoreError> {
        queries::insert_fee(&self.pool, fee).await?;
        Ok(())
    }

    async fn merchant_by_id(&self, id: Uuid) -> Result<Option<Merchant>, StoreError> {
        Ok(queries::get_merchant(&self.pool, id).await?)
    }
}
