//! Normalized view of a remote ledger operation.
//!
//! Sourced entirely from the Horizon-style operations API; never persisted
//! as authoritative data. Used for the reconciliation display only.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerOperation {
    pub id: String,
    pub kind: String,
    pub source_account: String,
    pub from: Option<String>,
    pub to: Option<String>,
    pub amount: Option<BigDecimal>,
    pub asset_code: String,
    pub tx_hash: String,
    pub paging_token: String,
    pub ledger_time: DateTime<Utc>,
}
