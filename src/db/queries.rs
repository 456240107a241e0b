use sqlx::{PgPool, Result};
use uuid::Uuid;

use crate::db::models::{
    Merchant, Notification, PaymentIntent, PlatformFee, TransactionRecord, Withdrawal,
};
use crate::domain::payment::PaymentStatus;

pub async fn insert_intent(pool: &PgPool, intent: &PaymentIntent) -> Result<PaymentIntent> {
    sqlx::query_as::<_, PaymentIntent>(
        "INSERT INTO payment_intents (id, merchant_id, gross_amount, base_amount, fee_amount, asset_code, status, external_payment_id, tx_hash, payer, memo, metadata, created_at, approved_at, completed_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) RETURNING *",
    )
    .bind(intent.id)
    .bind(intent.merchant_id)
    .bind(&intent.gross_amount)
    .bind(&intent.base_amount)
    .bind(&intent.fee_amount)
    .bind(&intent.asset_code)
    .bind(intent.status)
    .bind(&intent.external_payment_id)
    .bind(&intent.tx_hash)
    .bind(&intent.payer)
    .bind(&intent.memo)
    .bind(&intent.metadata)
    .bind(intent.created_at)
    .bind(intent.approved_at)
    .bind(intent.completed_at)
    .bind(intent.updated_at)
    .fetch_one(pool)
    .await
}

pub async fn get_intent(pool: &PgPool, id: Uuid) -> Result<Option<PaymentIntent>> {
    sqlx::query_as::<_, PaymentIntent>("SELECT * FROM payment_intents WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn get_intent_by_external_id(
    pool: &PgPool,
    external_payment_id: &str,
) -> Result<Option<PaymentIntent>> {
    sqlx::query_as::<_, PaymentIntent>(
        "SELECT * FROM payment_intents WHERE external_payment_id = $1",
    )
    .bind(external_payment_id)
    .fetch_optional(pool)
    .await
}

/// Binds the SDK payment id and advances `created -> pending_approval` in
/// one conditional update. Returns `None` when the intent is past `created`.
pub async fn bind_external_id(
    pool: &PgPool,
    id: Uuid,
    external_payment_id: &str,
) -> Result<Option<PaymentIntent>> {
    sqlx::query_as::<_, PaymentIntent>(
        "UPDATE payment_intents \
         SET external_payment_id = $2, status = 'pending_approval', updated_at = NOW() \
         WHERE id = $1 AND status = 'created' AND external_payment_id IS NULL \
         RETURNING *",
    )
    .bind(id)
    .bind(external_payment_id)
    .fetch_optional(pool)
    .await
}

/// Status compare-and-set. Stamps `approved_at` when the target is
/// `approved`; `updated_at` always.
pub async fn transition_intent(
    pool: &PgPool,
    id: Uuid,
    from: PaymentStatus,
    to: PaymentStatus,
) -> Result<Option<PaymentIntent>> {
    sqlx::query_as::<_, PaymentIntent>(
        "UPDATE payment_intents \
         SET status = $3, \
             approved_at = CASE WHEN $3 = 'approved'::payment_status THEN NOW() ELSE approved_at END, \
             updated_at = NOW() \
         WHERE id = $1 AND status = $2 \
         RETURNING *",
    )
    .bind(id)
    .bind(from)
    .bind(to)
    .fetch_optional(pool)
    .await
}

pub async fn cancel_intent(pool: &PgPool, id: Uuid) -> Result<Option<PaymentIntent>> {
    sqlx::query_as::<_, PaymentIntent>(
        "UPDATE payment_intents \
         SET status = 'cancelled', updated_at = NOW() \
         WHERE id = $1 AND status IN ('created', 'pending_approval', 'approved') \
         RETURNING *",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn insert_withdrawal(pool: &PgPool, withdrawal: &Withdrawal) -> Result<Withdrawal> {
    sqlx::query_as::<_, Withdrawal>(
        "INSERT INTO withdrawals (id, merchant_id, amount, status, destination, external_tx_ref, note, created_at, resolved_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING *",
    )
    .bind(withdrawal.id)
    .bind(withdrawal.merchant_id)
    .bind(&withdrawal.amount)
    .bind(withdrawal.status)
    .bind(&withdrawal.destination)
    .bind(&withdrawal.external_tx_ref)
    .bind(&withdrawal.note)
    .bind(withdrawal.created_at)
    .bind(withdrawal.resolved_at)
    .bind(withdrawal.updated_at)
    .fetch_one(pool)
    .await
}

pub async fn get_withdrawal(pool: &PgPool, id: Uuid) -> Result<Option<Withdrawal>> {
    sqlx::query_as::<_, Withdrawal>("SELECT * FROM withdrawals WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn reject_withdrawal(pool: &PgPool, id: Uuid) -> Result<Option<Withdrawal>> {
    sqlx::query_as::<_, Withdrawal>(
        "UPDATE withdrawals \
         SET status = 'rejected', resolved_at = NOW(), updated_at = NOW() \
         WHERE id = $1 AND status = 'pending' \
         RETURNING *",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn insert_fee(pool: &PgPool, fee: &PlatformFee) -> Result<PlatformFee> {
    sqlx::query_as::<_, PlatformFee>(
        "INSERT INTO platform_fees (id, merchant_id, amount, fee_type, source_id, status, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
    )
    .bind(fee.id)
    .bind(fee.merchant_id)
    .bind(&fee.amount)
    .bind(fee.fee_type)
    .bind(fee.source_id)
    .bind(fee.status)
    .bind(fee.created_at)
    .fetch_one(pool)
    .await
}

pub async fn get_merchant(pool: &PgPool, id: Uuid) -> Result<Option<Merchant>> {
    sqlx::query_as::<_, Merchant>("SELECT * FROM merchants WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn insert_transaction_record(
    pool: &PgPool,
    record: &TransactionRecord,
) -> Result<TransactionRecord> {
    sqlx::query_as::<_, TransactionRecord>(
        "INSERT INTO transactions (id, merchant_id, intent_id, amount, status, payer, memo, metadata, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *",
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
    .fetch_one(pool)
    .await
}

pub async fn insert_notification(pool: &PgPool, n: &Notification) -> Result<Notification> {
    sqlx::query_as::<_, Notification>(
        "INSERT INTO notifications (id, merchant_id, title, message, kind, read, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
    )
    .bind(n.id)
    .bind(n.merchant_id)
    .bind(&n.title)
    .bind(&n.message)
    .bind(n.kind)
    .bind(n.read)
    .bind(n.created_at)
    .fetch_one(pool)
    .await
}
