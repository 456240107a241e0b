//! Paginated, rate-limited reader of the remote ledger operations API.
//!
//! Pure read-and-normalize pipeline: fetch pages in ascending cursor order,
//! resolve missing timestamps through the owning transaction (cached per
//! run), and stop at the first empty page. A failed page aborts the rest of
//! the run and surfaces whatever was collected so far; callers must treat
//! a partial report as best effort, never authoritative. Every await is a
//! cancellation point; dropping the future stops further fetches without
//! corrupting anything, because the engine performs no writes.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::domain::ledger::LedgerOperation;
use crate::stellar::{HorizonClient, HorizonError, OperationRecord};

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub page_size: u32,
    /// Pause between page fetches, for upstream rate limits.
    pub page_delay: Duration,
    /// Hard stop on runaway pagination.
    pub max_pages: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: 50,
            page_delay: Duration::from_millis(100),
            max_pages: 200,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("page {page} timed out: {message}")]
    Timeout { page: u32, message: String },
    #[error("page {page} fetch failed: {message}")]
    Upstream { page: u32, message: String },
}

impl SyncError {
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Timeout { .. } => "upstream_timeout",
            SyncError::Upstream { .. } => "upstream_unavailable",
        }
    }

    fn from_horizon(err: HorizonError, page: u32) -> Self {
        match err {
            HorizonError::Timeout(message) => SyncError::Timeout { page, message },
            other => SyncError::Upstream {
                page,
                message: other.to_string(),
            },
        }
    }
}

/// Result of one sync run. `last_cursor` is the paging token of the last
/// operation delivered; resuming from it continues where this run stopped.
#[derive(Debug)]
pub struct SyncReport {
    pub operations: Vec<LedgerOperation>,
    pub last_cursor: Option<String>,
    pub pages_fetched: u32,
    pub error: Option<SyncError>,
}

impl SyncReport {
    pub fn is_partial(&self) -> bool {
        self.error.is_some()
    }
}

pub struct LedgerSyncEngine {
    horizon: HorizonClient,
    config: SyncConfig,
}

impl LedgerSyncEngine {
    pub fn new(horizon: HorizonClient, config: SyncConfig) -> Self {
        Self { horizon, config }
    }

    /// Pulls all operations for `account` after `resume`, in ascending
    /// ledger order, finitely many pages.
    pub async fn sync_operations(&self, account: &str, resume: Option<String>) -> SyncReport {
        let mut cursor = resume.clone();
        let mut operations: Vec<LedgerOperation> = Vec::new();
        let mut seen_ids: HashSet<String> = HashSet::new();
        let mut timestamps: HashMap<String, DateTime<Utc>> = HashMap::new();
        let mut pages_fetched = 0u32;
        let mut error = None;

        while pages_fetched < self.config.max_pages {
            let page = match self
                .horizon
                .get_operations(account, cursor.as_deref(), self.config.page_size)
                .await
            {
                Ok(page) => page,
                Err(err) => {
                    warn!(account, page = pages_fetched + 1, error = %err,
                          "page fetch failed, aborting sync run");
                    error = Some(SyncError::from_horizon(err, pages_fetched + 1));
                    break;
                }
            };
            pages_fetched += 1;

            if page.records.is_empty() {
                break;
            }

            let mut page_failed = false;
            for record in page.records {
                if !seen_ids.insert(record.id.clone()) {
                    debug!(operation_id = %record.id, "skipping duplicate operation");
                    continue;
                }
                match self.normalize(record, &mut timestamps).await {
                    Ok(op) => operations.push(op),
                    Err(err) => {
                        warn!(account, page = pages_fetched, error = %err,
                              "timestamp lookup failed, aborting sync run");
                        error = Some(SyncError::from_horizon(err, pages_fetched));
                        page_failed = true;
                        break;
                    }
                }
            }
            if page_failed {
                break;
            }

            cursor = page.next_cursor;
            if cursor.is_none() {
                break;
            }
            if !self.config.page_delay.is_zero() {
                sleep(self.config.page_delay).await;
            }
        }

        let last_cursor = operations
            .last()
            .map(|op| op.paging_token.clone())
            .or(resume);

        info!(
            account,
            operations = operations.len(),
            pages = pages_fetched,
            partial = error.is_some(),
            "ledger sync run finished"
        );

        SyncReport {
            operations,
            last_cursor,
            pages_fetched,
            error,
        }
    }

    /// Normalizes one raw record, resolving a missing timestamp through the
    /// owning transaction. The hash lookup is cached for the run, since the
    /// same transaction commonly owns several operations.
    async fn normalize(
        &self,
        record: OperationRecord,
        timestamps: &mut HashMap<String, DateTime<Utc>>,
    ) -> Result<LedgerOperation, HorizonError> {
        let ledger_time = match record.created_at {
            Some(t) => t,
            None => match timestamps.get(&record.transaction_hash) {
                Some(t) => *t,
                None => {
                    let tx = self.horizon.get_transaction(&record.transaction_hash).await?;
                    timestamps.insert(record.transaction_hash.clone(), tx.created_at);
                    tx.created_at
                }
            },
        };

        let amount = record
            .amount
            .as_deref()
            .map(BigDecimal::from_str)
            .transpose()
            .map_err(|e| {
                HorizonError::InvalidResponse(format!(
                    "operation {} carries unparseable amount: {}",
                    record.id, e
                ))
            })?;

        Ok(LedgerOperation {
            id: record.id,
            kind: record.kind,
            source_account: record.source_account,
            from: record.from,
            to: record.to,
            amount,
            asset_code: record.asset_code.unwrap_or_else(|| "native".to_string()),
            tx_hash: record.transaction_hash,
            paging_token: record.paging_token,
            ledger_time,
        })
    }
}
