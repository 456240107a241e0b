//! Three-phase payment handshake.
//!
//! Coordinates one payment across the client wallet SDK, this backend and
//! the ledger: create the intent locally, approve it when the SDK reports a
//! payment identifier, complete it when the SDK reports a broadcast
//! transaction hash. The pure transition rules live in
//! [`crate::domain::payment`]; this service pairs them with the store's
//! conditional updates so SDK retries and concurrent callbacks cannot apply
//! a transition twice.

use bigdecimal::BigDecimal;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::models::{FeeType, PaymentIntent, PlatformFee, TransactionRecord};
use crate::domain::fees::{FeeCalculator, FeePolicy};
use crate::domain::payment::{transition, PaymentEvent, PaymentStatus};
use crate::error::AppError;
use crate::ports::PaymentIntentStore;
use crate::stellar::{HorizonClient, HorizonError};

#[derive(Debug)]
pub struct CreatePayment {
    pub merchant_id: Uuid,
    pub base_amount: BigDecimal,
    pub payer: Option<String>,
    pub memo: Option<String>,
    pub metadata: serde_json::Value,
}

/// Outcome of the approval phase. A retried callback that finds the intent
/// already approved is a success, not an error.
#[derive(Debug)]
pub enum Approval {
    Approved(PaymentIntent),
    AlreadyApproved(PaymentIntent),
}

impl Approval {
    pub fn intent(&self) -> &PaymentIntent {
        match self {
            Approval::Approved(i) | Approval::AlreadyApproved(i) => i,
        }
    }
}

/// Outcome of the completion phase.
#[derive(Debug)]
pub enum Completion {
    Completed(PaymentIntent),
    AlreadyCompleted(PaymentIntent),
}

impl Completion {
    pub fn intent(&self) -> &PaymentIntent {
        match self {
            Completion::Completed(i) | Completion::AlreadyCompleted(i) => i,
        }
    }
}

pub struct PaymentHandshake {
    store: Arc<dyn PaymentIntentStore>,
    horizon: HorizonClient,
    policy: FeePolicy,
    asset_code: String,
}

impl PaymentHandshake {
    pub fn new(
        store: Arc<dyn PaymentIntentStore>,
        horizon: HorizonClient,
        policy: FeePolicy,
        asset_code: String,
    ) -> Self {
        Self {
            store,
            horizon,
            policy,
            asset_code,
        }
    }

    /// Records a new intent before any blockchain interaction happens.
    pub async fn create(&self, request: CreatePayment) -> Result<PaymentIntent, AppError> {
        if request.base_amount < BigDecimal::from(0) {
            return Err(AppError::Validation(
                "base amount must not be negative".into(),
            ));
        }
        self.store
            .merchant_by_id(request.merchant_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("merchant {}", request.merchant_id)))?;

        let charge = FeeCalculator::compute_charge(&request.base_amount, &self.policy);
        let intent = PaymentIntent::new(
            request.merchant_id,
            charge.customer_charge,
            charge.merchant_net,
            charge.fee_amount,
            self.asset_code.clone(),
            request.payer,
            request.memo,
            request.metadata,
        );
        self.store.insert_intent(&intent).await?;
        info!(intent_id = %intent.id, merchant_id = %intent.merchant_id,
              gross = %intent.gross_amount, "payment intent created");
        Ok(intent)
    }

    /// Binds the wallet-SDK payment identifier reported by
    /// `onReadyForServerApproval` and moves the intent to `pending_approval`.
    pub async fn register_submission(
        &self,
        intent_id: Uuid,
        external_payment_id: &str,
    ) -> Result<PaymentIntent, AppError> {
        let intent = self
            .store
            .intent_by_id(intent_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("payment intent {}", intent_id)))?;

        // SDK retry of a submission we already recorded.
        if intent.external_payment_id.as_deref() == Some(external_payment_id)
            && intent.status != PaymentStatus::Created
        {
            return Ok(intent);
        }

        let event = PaymentEvent::SdkSubmitted {
            external_payment_id: external_payment_id.to_string(),
        };
        transition(intent.status, &event)
            .map_err(|e| AppError::InvalidState(e.to_string()))?;

        match self.store.bind_external_id(intent_id, external_payment_id).await {
            Ok(updated) => Ok(updated),
            // Lost a race against an identical retry; re-read and accept.
            Err(err) => {
                let current = self.store.intent_by_id(intent_id).await?;
                match current {
                    Some(i)
                        if i.external_payment_id.as_deref() == Some(external_payment_id) =>
                    {
                        Ok(i)
                    }
                    _ => Err(err.into()),
                }
            }
        }
    }

    /// Approval RPC invoked by the wallet SDK callback. Idempotent per
    /// external payment identifier; an amount that disagrees with the
    /// recorded intent is an integrity signal and always surfaces.
    pub async fn approve(
        &self,
        external_payment_id: &str,
        reported_amount: &BigDecimal,
    ) -> Result<Approval, AppError> {
        let intent = self
            .store
            .intent_by_external_id(external_payment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("payment {}", external_payment_id)))?;

        if *reported_amount != intent.gross_amount {
            return Err(AppError::AmountMismatch {
                expected: intent.gross_amount,
                reported: reported_amount.clone(),
            });
        }

        match intent.status {
            PaymentStatus::PendingApproval => {
                let next = transition(intent.status, &PaymentEvent::ServerApproved)
                    .map_err(|e| AppError::InvalidState(e.to_string()))?;
                match self
                    .store
                    .transition_intent(intent.id, PaymentStatus::PendingApproval, next)
                    .await?
                {
                    Some(updated) => {
                        info!(intent_id = %updated.id, payment_id = external_payment_id,
                              "payment approved");
                        Ok(Approval::Approved(updated))
                    }
                    // A concurrent retry won the compare-and-set.
                    None => self.resolve_duplicate_approval(external_payment_id).await,
                }
            }
            PaymentStatus::Approved
            | PaymentStatus::PendingCompletion
            | PaymentStatus::Completed => {
                debug!(
                    payment_id = external_payment_id,
                    "{}",
                    AppError::DuplicateApproval(external_payment_id.to_string())
                );
                Ok(Approval::AlreadyApproved(intent))
            }
            _ => Err(AppError::InvalidState(format!(
                "payment {} cannot be approved from state {}",
                external_payment_id,
                intent.status.as_str()
            ))),
        }
    }

    async fn resolve_duplicate_approval(
        &self,
        external_payment_id: &str,
    ) -> Result<Approval, AppError> {
        let current = self
            .store
            .intent_by_external_id(external_payment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("payment {}", external_payment_id)))?;
        match current.status {
            PaymentStatus::Approved
            | PaymentStatus::PendingCompletion
            | PaymentStatus::Completed => Ok(Approval::AlreadyApproved(current)),
            other => Err(AppError::InvalidState(format!(
                "payment {} cannot be approved from state {}",
                external_payment_id,
                other.as_str()
            ))),
        }
    }

    /// Completion RPC invoked when the SDK reports a broadcast transaction
    /// hash. Verifies the hash against the ledger when the ledger is
    /// reachable; an unreachable ledger accepts the hash provisionally and
    /// leaves it to reconciliation. The transaction record, balance credit
    /// and payment fee fire exactly once.
    pub async fn complete(
        &self,
        external_payment_id: &str,
        tx_hash: &str,
    ) -> Result<Completion, AppError> {
        let intent = self
            .store
            .intent_by_external_id(external_payment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("payment {}", external_payment_id)))?;

        let intent = match intent.status {
            PaymentStatus::Completed => {
                return if intent.tx_hash.as_deref() == Some(tx_hash) {
                    debug!(
                        payment_id = external_payment_id,
                        "{}",
                        AppError::DuplicateCompletion(external_payment_id.to_string())
                    );
                    Ok(Completion::AlreadyCompleted(intent))
                } else {
                    Err(AppError::InvalidState(format!(
                        "payment {} already completed with a different transaction hash",
                        external_payment_id
                    )))
                };
            }
            PaymentStatus::Approved => {
                let event = PaymentEvent::BroadcastReported {
                    tx_hash: tx_hash.to_string(),
                };
                let next = transition(intent.status, &event)
                    .map_err(|e| AppError::InvalidState(e.to_string()))?;
                match self
                    .store
                    .transition_intent(intent.id, PaymentStatus::Approved, next)
                    .await?
                {
                    Some(updated) => updated,
                    None => self
                        .store
                        .intent_by_external_id(external_payment_id)
                        .await?
                        .ok_or_else(|| {
                            AppError::NotFound(format!("payment {}", external_payment_id))
                        })?,
                }
            }
            PaymentStatus::PendingCompletion => intent,
            other => {
                return Err(AppError::InvalidState(format!(
                    "payment {} cannot be completed from state {}",
                    external_payment_id,
                    other.as_str()
                )))
            }
        };

        // Re-check: the race above may have handed us a completed intent.
        if intent.status == PaymentStatus::Completed {
            return if intent.tx_hash.as_deref() == Some(tx_hash) {
                Ok(Completion::AlreadyCompleted(intent))
            } else {
                Err(AppError::InvalidState(format!(
                    "payment {} already completed with a different transaction hash",
                    external_payment_id
                )))
            };
        }

        if !self.verify_on_ledger(&intent, tx_hash).await? {
            return Err(AppError::Validation(format!(
                "transaction {} was not found or not successful on the ledger",
                tx_hash
            )));
        }

        let record = TransactionRecord {
            id: Uuid::new_v4(),
            merchant_id: intent.merchant_id,
            intent_id: intent.id,
            amount: intent.base_amount.clone(),
            status: PaymentStatus::Completed,
            payer: intent.payer.clone(),
            memo: intent.memo.clone(),
            metadata: intent.metadata.clone(),
            created_at: chrono::Utc::now(),
        };
        let fee = if intent.fee_amount > BigDecimal::from(0) {
            Some(PlatformFee::completed(
                intent.merchant_id,
                intent.fee_amount.clone(),
                FeeType::Payment,
                intent.id,
            ))
        } else {
            None
        };

        match self
            .store
            .complete_intent(intent.id, tx_hash, &record, &intent.base_amount, fee.as_ref())
            .await?
        {
            Some(updated) => {
                info!(intent_id = %updated.id, payment_id = external_payment_id,
                      tx_hash, credit = %intent.base_amount, "payment completed");
                Ok(Completion::Completed(updated))
            }
            None => {
                let current = self
                    .store
                    .intent_by_external_id(external_payment_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::NotFound(format!("payment {}", external_payment_id))
                    })?;
                if current.status == PaymentStatus::Completed
                    && current.tx_hash.as_deref() == Some(tx_hash)
                {
                    Ok(Completion::AlreadyCompleted(current))
                } else {
                    Err(AppError::InvalidState(format!(
                        "payment {} changed state during completion",
                        external_payment_id
                    )))
                }
            }
        }
    }

    /// Returns `Ok(true)` when the hash is verified or provisionally
    /// accepted, `Ok(false)` when the ledger definitively rejects it (the
    /// intent is moved to `failed`).
    async fn verify_on_ledger(
        &self,
        intent: &PaymentIntent,
        tx_hash: &str,
    ) -> Result<bool, AppError> {
        match self.horizon.get_transaction(tx_hash).await {
            Ok(tx) if tx.successful => Ok(true),
            Ok(_) => {
                self.fail_verification(intent).await?;
                Ok(false)
            }
            Err(HorizonError::TransactionNotFound(_)) => {
                self.fail_verification(intent).await?;
                Ok(false)
            }
            Err(err) => {
                // The handshake does not depend on the ledger being
                // reachable once the SDK has supplied a hash; reconciliation
                // will cross-check it later.
                warn!(intent_id = %intent.id, tx_hash, error = %err,
                      "ledger unreachable, accepting transaction hash provisionally");
                Ok(true)
            }
        }
    }

    async fn fail_verification(&self, intent: &PaymentIntent) -> Result<(), AppError> {
        let next = transition(PaymentStatus::PendingCompletion, &PaymentEvent::VerificationFailed)
            .map_err(|e| AppError::InvalidState(e.to_string()))?;
        self.store
            .transition_intent(intent.id, PaymentStatus::PendingCompletion, next)
            .await?;
        warn!(intent_id = %intent.id, "ledger verification failed, payment marked failed");
        Ok(())
    }

    /// User or client abort, valid any time before the broadcast phase.
    /// Idempotent: cancelling a cancelled intent is a no-op.
    pub async fn cancel(&self, intent_id: Uuid) -> Result<PaymentIntent, AppError> {
        match self.store.cancel_intent(intent_id).await? {
            Some(updated) => {
                info!(intent_id = %updated.id, "payment cancelled");
                Ok(updated)
            }
            None => {
                let current = self
                    .store
                    .intent_by_id(intent_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("payment intent {}", intent_id)))?;
                if current.status == PaymentStatus::Cancelled {
                    Ok(current)
                } else {
                    Err(AppError::InvalidState(format!(
                        "payment intent {} cannot be cancelled from state {}",
                        intent_id,
                        current.status.as_str()
                    )))
                }
            }
        }
    }

    /// Intent lookup for the read-side endpoints.
    pub async fn get(&self, intent_id: Uuid) -> Result<PaymentIntent, AppError> {
        self.store
            .intent_by_id(intent_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("payment intent {}", intent_id)))
    }
}
