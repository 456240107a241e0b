#![allow(dead_code)]

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

use lumenpay_core::db::memory::InMemoryStore;
use lumenpay_core::db::models::Notification;
use lumenpay_core::domain::fees::FeePolicy;
use lumenpay_core::ports::{Notifier, SideEffectError, WithdrawalEmail, WithdrawalMailer};
use lumenpay_core::services::{PaymentHandshake, WithdrawalWorkflow};
use lumenpay_core::stellar::HorizonClient;

pub fn dec(s: &str) -> BigDecimal {
    BigDecimal::from_str(s).unwrap()
}

pub fn horizon(base_url: &str) -> HorizonClient {
    HorizonClient::new(base_url.to_string(), Duration::from_secs(5))
}

/// A ledger endpoint nothing listens on; connections are refused instantly.
pub fn unreachable_horizon() -> HorizonClient {
    HorizonClient::new("http://127.0.0.1:9".to_string(), Duration::from_secs(1))
}

pub async fn seeded_store(merchant_id: Uuid, balance: &str) -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    store.seed_merchant(merchant_id, dec(balance)).await;
    store
}

pub fn handshake_with(
    store: Arc<InMemoryStore>,
    horizon: HorizonClient,
    policy: FeePolicy,
) -> PaymentHandshake {
    PaymentHandshake::new(store, horizon, policy, "PI".to_string())
}

/// Notifier that records everything it is asked to send.
#[derive(Default, Clone)]
pub struct RecordingNotifier {
    pub sent: Arc<Mutex<Vec<Notification>>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), SideEffectError> {
        self.sent.lock().await.push(notification.clone());
        Ok(())
    }
}

/// Mailer that records payloads instead of dispatching them.
#[derive(Default, Clone)]
pub struct RecordingMailer {
    pub sent: Arc<Mutex<Vec<WithdrawalEmail>>>,
}

#[async_trait]
impl WithdrawalMailer for RecordingMailer {
    async fn send_withdrawal_email(&self, email: &WithdrawalEmail) -> Result<(), SideEffectError> {
        self.sent.lock().await.push(email.clone());
        Ok(())
    }
}

/// Mailer that always fails, for exercising the best-effort contract.
#[derive(Default, Clone)]
pub struct FailingMailer;

#[async_trait]
impl WithdrawalMailer for FailingMailer {
    async fn send_withdrawal_email(&self, _email: &WithdrawalEmail) -> Result<(), SideEffectError> {
        Err(SideEffectError("smtp relay refused connection".into()))
    }
}

pub fn workflow_with(
    store: Arc<InMemoryStore>,
    notifier: RecordingNotifier,
    mailer: Arc<dyn WithdrawalMailer>,
    fee_rate: &str,
) -> WithdrawalWorkflow {
    WithdrawalWorkflow::new(store, Arc::new(notifier), mailer, dec(fee_rate))
}
