pub mod client;

pub use client::{HorizonClient, HorizonError, OperationRecord, OperationsPage, TransactionResponse};
