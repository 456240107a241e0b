//! Manual withdrawal approval workflow.
//!
//! An administrator approves or rejects a merchant's pending withdrawal.
//! The status claim and the balance debit are one atomic store operation;
//! notification and email are best-effort side effects that never roll the
//! approval back.

use bigdecimal::BigDecimal;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::models::{FeeType, Notification, NotificationKind, PlatformFee, Withdrawal};
use crate::domain::fees::FeeCalculator;
use crate::error::AppError;
use crate::ports::{Notifier, PaymentIntentStore, WithdrawalEmail, WithdrawalMailer};

#[derive(Debug)]
pub struct WithdrawalApproval {
    pub withdrawal: Withdrawal,
    pub fee_amount: BigDecimal,
    pub net_amount: BigDecimal,
}

#[derive(Debug)]
pub struct WithdrawalRejection {
    pub withdrawal: Withdrawal,
}

pub struct WithdrawalWorkflow {
    store: Arc<dyn PaymentIntentStore>,
    notifier: Arc<dyn Notifier>,
    mailer: Arc<dyn WithdrawalMailer>,
    fee_rate: BigDecimal,
}

impl WithdrawalWorkflow {
    pub fn new(
        store: Arc<dyn PaymentIntentStore>,
        notifier: Arc<dyn Notifier>,
        mailer: Arc<dyn WithdrawalMailer>,
        fee_rate: BigDecimal,
    ) -> Self {
        Self {
            store,
            notifier,
            mailer,
            fee_rate,
        }
    }

    /// Records a merchant's withdrawal request as pending.
    pub async fn request(
        &self,
        merchant_id: Uuid,
        amount: BigDecimal,
        destination: String,
    ) -> Result<Withdrawal, AppError> {
        if amount <= BigDecimal::from(0) {
            return Err(AppError::Validation(
                "withdrawal amount must be positive".into(),
            ));
        }
        if destination.trim().is_empty() {
            return Err(AppError::Validation("destination is required".into()));
        }
        self.store
            .merchant_by_id(merchant_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("merchant {}", merchant_id)))?;

        let withdrawal = Withdrawal::new(merchant_id, amount, destination);
        self.store.insert_withdrawal(&withdrawal).await?;
        info!(withdrawal_id = %withdrawal.id, merchant_id = %merchant_id,
              amount = %withdrawal.amount, "withdrawal requested");
        Ok(withdrawal)
    }

    /// Approves a pending withdrawal: claims the status, debits the gross
    /// amount off the merchant's balance (guarded, never below zero),
    /// records the fee and notifies the merchant. A withdrawal whose gross
    /// amount exceeds the available balance is rejected with
    /// [`AppError::InsufficientBalance`] and nothing is mutated.
    pub async fn approve(
        &self,
        withdrawal_id: Uuid,
        external_tx_ref: Option<String>,
    ) -> Result<WithdrawalApproval, AppError> {
        let withdrawal = self
            .store
            .withdrawal_by_id(withdrawal_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("withdrawal {}", withdrawal_id)))?;

        let payout = FeeCalculator::withdrawal_fee(&withdrawal.amount, &self.fee_rate);
        let tx_ref =
            external_tx_ref.unwrap_or_else(|| format!("payout-{}", Uuid::new_v4().simple()));
        let note = format!(
            "Paid {} net to {} ({} fee withheld)",
            payout.net_amount, withdrawal.destination, payout.fee_amount
        );

        // One atomic unit: pending -> completed plus the guarded debit. A
        // concurrent approval loses the claim here and mutates nothing.
        let completed = self
            .store
            .approve_withdrawal(
                withdrawal_id,
                &withdrawal.amount,
                &payout.net_amount,
                &tx_ref,
                &note,
            )
            .await?;

        let fee = PlatformFee::completed(
            completed.merchant_id,
            payout.fee_amount.clone(),
            FeeType::Withdrawal,
            completed.id,
        );
        self.store.insert_fee(&fee).await?;

        info!(withdrawal_id = %completed.id, merchant_id = %completed.merchant_id,
              gross = %completed.amount, net = %payout.net_amount, tx_ref = %tx_ref,
              "withdrawal approved");

        let message = format!(
            "Your withdrawal of {} was approved: {} fee, {} paid to {}.",
            completed.amount, payout.fee_amount, payout.net_amount, completed.destination
        );
        self.notify_best_effort(&completed, "Withdrawal approved", &message)
            .await;
        self.email_best_effort(&completed, &payout.fee_amount, &payout.net_amount, true)
            .await;

        Ok(WithdrawalApproval {
            withdrawal: completed,
            fee_amount: payout.fee_amount,
            net_amount: payout.net_amount,
        })
    }

    /// Rejects a pending withdrawal. No balance or fee mutation.
    pub async fn reject(&self, withdrawal_id: Uuid) -> Result<WithdrawalRejection, AppError> {
        let rejected = self.store.reject_withdrawal(withdrawal_id).await.map_err(
            |err| match err {
                crate::ports::StoreError::NotFound(_) => {
                    AppError::NotFound(format!("withdrawal {}", withdrawal_id))
                }
                other => other.into(),
            },
        )?;

        info!(withdrawal_id = %rejected.id, merchant_id = %rejected.merchant_id,
              "withdrawal rejected");

        let message = format!(
            "Your withdrawal of {} to {} was rejected.",
            rejected.amount, rejected.destination
        );
        self.notify_best_effort(&rejected, "Withdrawal rejected", &message)
            .await;
        let gross = rejected.amount.clone();
        self.email_best_effort(&rejected, &BigDecimal::from(0), &gross, false)
            .await;

        Ok(WithdrawalRejection {
            withdrawal: rejected,
        })
    }

    async fn notify_best_effort(&self, withdrawal: &Withdrawal, title: &str, message: &str) {
        let notification = Notification::new(
            withdrawal.merchant_id,
            title.to_string(),
            message.to_string(),
            NotificationKind::Withdrawal,
        );
        if let Err(err) = self.notifier.notify(&notification).await {
            warn!(withdrawal_id = %withdrawal.id, error = %err,
                  "side effect failure: merchant notification");
        }
    }

    async fn email_best_effort(
        &self,
        withdrawal: &Withdrawal,
        fee_amount: &BigDecimal,
        net_amount: &BigDecimal,
        approved: bool,
    ) {
        let email = WithdrawalEmail {
            merchant_id: withdrawal.merchant_id,
            withdrawal_id: withdrawal.id,
            gross_amount: withdrawal.amount.clone(),
            fee_amount: fee_amount.clone(),
            net_amount: net_amount.clone(),
            destination: withdrawal.destination.clone(),
            approved,
        };
        if let Err(err) = self.mailer.send_withdrawal_email(&email).await {
            warn!(withdrawal_id = %withdrawal.id, error = %err,
                  "side effect failure: withdrawal email");
        }
    }
}
