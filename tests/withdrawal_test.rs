//! Withdrawal approval workflow tests: fee direction, atomic balance
//! debits, the concurrent-approval race and best-effort side effects.

mod common;

use common::*;
use std::sync::Arc;
use uuid::Uuid;

use lumenpay_core::db::models::{FeeType, NotificationKind, Withdrawal, WithdrawalStatus};
use lumenpay_core::error::AppError;
use lumenpay_core::ports::PaymentIntentStore;

async fn pending_withdrawal(
    store: &Arc<lumenpay_core::db::memory::InMemoryStore>,
    merchant_id: Uuid,
    amount: &str,
) -> Withdrawal {
    let withdrawal = Withdrawal::new(
        merchant_id,
        dec(amount),
        "GBBD47UZQ5CSKQPV456PYYH4FSYJHBWGQJUVNMCNWZ2NBEHKQPW3KXKJ".to_string(),
    );
    store.insert_withdrawal(&withdrawal).await.unwrap();
    withdrawal
}

#[tokio::test]
async fn test_approve_debits_gross_and_credits_net() {
    let merchant_id = Uuid::new_v4();
    let store = seeded_store(merchant_id, "50").await;
    let notifier = RecordingNotifier::default();
    let mailer = RecordingMailer::default();
    let workflow = workflow_with(
        store.clone(),
        notifier.clone(),
        Arc::new(mailer.clone()),
        "0.02",
    );

    let withdrawal = pending_withdrawal(&store, merchant_id, "10.0000000").await;
    let approval = workflow.approve(withdrawal.id, None).await.unwrap();

    assert_eq!(approval.withdrawal.status, WithdrawalStatus::Completed);
    assert_eq!(approval.fee_amount, dec("0.2000000"));
    assert_eq!(approval.net_amount, dec("9.8000000"));
    assert!(approval.withdrawal.external_tx_ref.is_some());
    assert!(approval
        .withdrawal
        .note
        .as_deref()
        .unwrap()
        .contains("9.8000000"));

    // Gross off available, net onto total_withdrawn.
    let merchant = store.merchant_by_id(merchant_id).await.unwrap().unwrap();
    assert_eq!(merchant.available_balance, dec("40.0000000"));
    assert_eq!(merchant.total_withdrawn, dec("9.8000000"));

    // Fee record linked to the withdrawal.
    let fees = store.fees().await;
    assert_eq!(fees.len(), 1);
    assert_eq!(fees[0].fee_type, FeeType::Withdrawal);
    assert_eq!(fees[0].amount, dec("0.2000000"));
    assert_eq!(fees[0].source_id, withdrawal.id);

    // Merchant was notified and the email payload carried the breakdown.
    let sent = notifier.sent.lock().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, NotificationKind::Withdrawal);
    let emails = mailer.sent.lock().await;
    assert_eq!(emails.len(), 1);
    assert_eq!(emails[0].net_amount, dec("9.8000000"));
    assert!(emails[0].approved);
}

#[tokio::test]
async fn test_approve_with_supplied_tx_ref() {
    let merchant_id = Uuid::new_v4();
    let store = seeded_store(merchant_id, "10").await;
    let workflow = workflow_with(
        store.clone(),
        RecordingNotifier::default(),
        Arc::new(RecordingMailer::default()),
        "0.02",
    );

    let withdrawal = pending_withdrawal(&store, merchant_id, "4").await;
    let approval = workflow
        .approve(withdrawal.id, Some("ledger-tx-abc".to_string()))
        .await
        .unwrap();
    assert_eq!(
        approval.withdrawal.external_tx_ref.as_deref(),
        Some("ledger-tx-abc")
    );
}

#[tokio::test]
async fn test_insufficient_balance_rejects_without_mutation() {
    let merchant_id = Uuid::new_v4();
    let store = seeded_store(merchant_id, "3").await;
    let notifier = RecordingNotifier::default();
    let workflow = workflow_with(
        store.clone(),
        notifier.clone(),
        Arc::new(RecordingMailer::default()),
        "0.02",
    );

    let withdrawal = pending_withdrawal(&store, merchant_id, "5").await;
    let err = workflow.approve(withdrawal.id, None).await.unwrap_err();
    assert!(matches!(err, AppError::InsufficientBalance { .. }));

    // Nothing moved: withdrawal still pending, balance intact, no fee, no
    // notification.
    let merchant = store.merchant_by_id(merchant_id).await.unwrap().unwrap();
    assert_eq!(merchant.available_balance, dec("3"));
    assert_eq!(merchant.total_withdrawn, dec("0"));
    let current = store
        .withdrawal_by_id(withdrawal.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(current.status, WithdrawalStatus::Pending);
    assert!(store.fees().await.is_empty());
    assert!(notifier.sent.lock().await.is_empty());
}

#[tokio::test]
async fn test_concurrent_approvals_debit_exactly_once() {
    let merchant_id = Uuid::new_v4();
    let store = seeded_store(merchant_id, "20").await;
    let workflow = workflow_with(
        store.clone(),
        RecordingNotifier::default(),
        Arc::new(RecordingMailer::default()),
        "0.02",
    );

    let withdrawal = pending_withdrawal(&store, merchant_id, "5").await;

    let (a, b) = tokio::join!(
        workflow.approve(withdrawal.id, None),
        workflow.approve(withdrawal.id, None)
    );
    let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one approval may claim the withdrawal");
    let loser = if a.is_ok() { b } else { a };
    assert!(matches!(loser.unwrap_err(), AppError::InvalidState(_)));

    // The balance came down by 5 exactly once.
    let merchant = store.merchant_by_id(merchant_id).await.unwrap().unwrap();
    assert_eq!(merchant.available_balance, dec("15.0000000"));
    assert_eq!(store.fees().await.len(), 1);
}

#[tokio::test]
async fn test_email_failure_does_not_roll_back_approval() {
    let merchant_id = Uuid::new_v4();
    let store = seeded_store(merchant_id, "10").await;
    let notifier = RecordingNotifier::default();
    let workflow = workflow_with(store.clone(), notifier.clone(), Arc::new(FailingMailer), "0.02");

    let withdrawal = pending_withdrawal(&store, merchant_id, "4").await;
    let approval = workflow.approve(withdrawal.id, None).await.unwrap();
    assert_eq!(approval.withdrawal.status, WithdrawalStatus::Completed);

    // Approval stood; the merchant was still notified.
    let merchant = store.merchant_by_id(merchant_id).await.unwrap().unwrap();
    assert_eq!(merchant.available_balance, dec("6.0000000"));
    assert_eq!(notifier.sent.lock().await.len(), 1);
}

#[tokio::test]
async fn test_reject_mutates_no_balance_and_notifies() {
    let merchant_id = Uuid::new_v4();
    let store = seeded_store(merchant_id, "10").await;
    let notifier = RecordingNotifier::default();
    let mailer = RecordingMailer::default();
    let workflow = workflow_with(
        store.clone(),
        notifier.clone(),
        Arc::new(mailer.clone()),
        "0.02",
    );

    let withdrawal = pending_withdrawal(&store, merchant_id, "4").await;
    let rejection = workflow.reject(withdrawal.id).await.unwrap();
    assert_eq!(rejection.withdrawal.status, WithdrawalStatus::Rejected);

    let merchant = store.merchant_by_id(merchant_id).await.unwrap().unwrap();
    assert_eq!(merchant.available_balance, dec("10"));
    assert_eq!(merchant.total_withdrawn, dec("0"));
    assert!(store.fees().await.is_empty());
    assert_eq!(notifier.sent.lock().await.len(), 1);
    let emails = mailer.sent.lock().await;
    assert_eq!(emails.len(), 1);
    assert!(!emails[0].approved);

    // Terminal: approving or re-rejecting afterwards is invalid.
    let err = workflow.approve(withdrawal.id, None).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
    let err = workflow.reject(withdrawal.id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
}

#[tokio::test]
async fn test_request_validates_amount_and_merchant() {
    let merchant_id = Uuid::new_v4();
    let store = seeded_store(merchant_id, "10").await;
    let workflow = workflow_with(
        store.clone(),
        RecordingNotifier::default(),
        Arc::new(RecordingMailer::default()),
        "0.02",
    );

    let err = workflow
        .request(merchant_id, dec("0"), "GDEST".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = workflow
        .request(Uuid::new_v4(), dec("1"), "GDEST".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let withdrawal = workflow
        .request(merchant_id, dec("1"), "GDEST".to_string())
        .await
        .unwrap();
    assert_eq!(withdrawal.status, WithdrawalStatus::Pending);
}

#[tokio::test]
async fn test_balance_never_goes_negative_across_sequences() {
    let merchant_id = Uuid::new_v4();
    let store = seeded_store(merchant_id, "12").await;
    let workflow = workflow_with(
        store.clone(),
        RecordingNotifier::default(),
        Arc::new(RecordingMailer::default()),
        "0.02",
    );

    // Three 5-unit withdrawals against a balance of 12: only two can clear.
    let mut approved = 0;
    for _ in 0..3 {
        let withdrawal = pending_withdrawal(&store, merchant_id, "5").await;
        match workflow.approve(withdrawal.id, None).await {
            Ok(_) => approved += 1,
            Err(AppError::InsufficientBalance { .. }) => {}
            Err(other) => panic!("unexpected error: {}", other),
        }
        let merchant = store.merchant_by_id(merchant_id).await.unwrap().unwrap();
        assert!(merchant.available_balance >= dec("0"));
    }
    assert_eq!(approved, 2);

    let merchant = store.merchant_by_id(merchant_id).await.unwrap().unwrap();
    assert_eq!(merchant.available_balance, dec("2.0000000"));
    assert_eq!(merchant.total_withdrawn, dec("9.8000000"));
}
