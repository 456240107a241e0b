pub mod fees;
pub mod ledger;
pub mod payment;

pub use fees::{Charge, FeeCalculator, FeePolicy, Payout};
pub use ledger::LedgerOperation;
pub use payment::{transition, PaymentEvent, PaymentStatus, TransitionError};
