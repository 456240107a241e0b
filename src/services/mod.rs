pub mod handshake;
pub mod ledger_sync;
pub mod notify;
pub mod withdrawal;

pub use handshake::{Approval, Completion, CreatePayment, PaymentHandshake};
pub use ledger_sync::{LedgerSyncEngine, SyncConfig, SyncError, SyncReport};
pub use notify::{PgNotifier, TracingMailer};
pub use withdrawal::{WithdrawalApproval, WithdrawalRejection, WithdrawalWorkflow};
