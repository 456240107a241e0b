use chrono::{DateTime, Utc};
use failsafe::futures::CircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HorizonError {
    #[error("HTTP request failed: {0}")]
    RequestError(reqwest::Error),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("account not found: {0}")]
    AccountNotFound(String),
    #[error("transaction not found: {0}")]
    TransactionNotFound(String),
    #[error("invalid response from Horizon: {0}")]
    InvalidResponse(String),
    #[error("Horizon returned status {0}")]
    UpstreamStatus(u16),
    #[error("circuit breaker open - Horizon API unavailable")]
    CircuitBreakerOpen,
}

impl From<reqwest::Error> for HorizonError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            HorizonError::Timeout(err.to_string())
        } else {
            HorizonError::RequestError(err)
        }
    }
}

/// Response from the Horizon /transactions/{hash} endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub hash: String,
    #[serde(default = "default_successful")]
    pub successful: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub memo: Option<String>,
}

fn default_successful() -> bool {
    true
}

/// One record from the Horizon /accounts/{id}/operations endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationRecord {
    pub id: String,
    pub paging_token: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub source_account: String,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub asset_code: Option<String>,
    pub transaction_hash: String,
    /// Some deployments omit per-operation timestamps; the sync engine
    /// then resolves the owning transaction's creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// One page of operations plus the cursor for the next page.
#[derive(Debug, Clone)]
pub struct OperationsPage {
    pub records: Vec<OperationRecord>,
    pub next_cursor: Option<String>,
}

#[derive(Deserialize)]
struct OperationsResponse {
    #[serde(rename = "_embedded")]
    embedded: Embedded,
}

#[derive(Deserialize)]
struct Embedded {
    records: Vec<OperationRecord>,
}

/// HTTP client for interacting with a Stellar Horizon-compatible API
pub struct HorizonClient {
    client: Client,
    base_url: String,
    circuit_breaker: StateMachine<
        failure_policy::ConsecutiveFailures<backoff::Exponential>,
        (),
    >,
}

impl HorizonClient {
    /// Creates a new HorizonClient with the specified base URL and a
    /// per-request timeout.
    pub fn new(base_url: String, request_timeout: Duration) -> Self {
        Self::with_circuit_breaker_config(base_url, request_timeout, 5, Duration::from_secs(60))
    }

    /// Creates a new HorizonClient with custom circuit breaker configuration
    pub fn with_circuit_breaker_config(
        base_url: String,
        request_timeout: Duration,
        failure_threshold: u32,
        reset_timeout: Duration,
    ) -> Self {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .unwrap_or_default();

        let backoff = backoff::exponential(Duration::from_secs(10), reset_timeout);
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        HorizonClient {
            client,
            base_url,
            circuit_breaker,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetches a single transaction; used to verify a reported hash and to
    /// resolve operation timestamps.
    pub async fn get_transaction(&self, hash: &str) -> Result<TransactionResponse, HorizonError> {
        let url = format!(
            "{}/transactions/{}",
            self.base_url.trim_end_matches('/'),
            hash
        );
        let client = self.client.clone();
        let hash = hash.to_string();

        let result = self
            .circuit_breaker
            .call(async move {
                let response = client.get(&url).send().await?;

                if response.status() == 404 {
                    return Err(HorizonError::TransactionNotFound(hash));
                }
                if !response.status().is_success() {
                    return Err(HorizonError::UpstreamStatus(response.status().as_u16()));
                }

                let tx = response.json::<TransactionResponse>().await?;
                Ok(tx)
            })
            .await;

        match result {
            Ok(tx) => Ok(tx),
            Err(FailsafeError::Rejected) => Err(HorizonError::CircuitBreakerOpen),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }

    /// Fetches one page of operations for an account, ascending by ledger
    /// sequence. The next-page cursor is the last record's paging token.
    pub async fn get_operations(
        &self,
        account: &str,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<OperationsPage, HorizonError> {
        let mut url = format!(
            "{}/accounts/{}/operations?order=asc&limit={}",
            self.base_url.trim_end_matches('/'),
            account,
            limit
        );
        if let Some(c) = cursor {
            url.push_str(&format!("&cursor={}", c));
        }

        let client = self.client.clone();
        let account = account.to_string();

        let result = self
            .circuit_breaker
            .call(async move {
                let response = client.get(&url).send().await?;

                if response.status() == 404 {
                    return Err(HorizonError::AccountNotFound(account));
                }
                if !response.status().is_success() {
                    return Err(HorizonError::UpstreamStatus(response.status().as_u16()));
                }

                let page = response.json::<OperationsResponse>().await?;
                Ok(page)
            })
            .await;

        let response = match result {
            Ok(r) => r,
            Err(FailsafeError::Rejected) => return Err(HorizonError::CircuitBreakerOpen),
            Err(FailsafeError::Inner(e)) => return Err(e),
        };

        let records = response.embedded.records;
        let next_cursor = records.last().map(|r| r.paging_token.clone());
        Ok(OperationsPage {
            records,
            next_cursor,
        })
    }

    /// Lightweight reachability probe against the API root.
    pub async fn ping(&self) -> Result<(), HorizonError> {
        let response = self.client.get(&self.base_url).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(HorizonError::UpstreamStatus(response.status().as_u16()))
        }
    }
}

impl Clone for HorizonClient {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            circuit_breaker: self.circuit_breaker.clone(),
        }
    }
}
