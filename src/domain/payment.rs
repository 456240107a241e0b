//! Payment handshake state machine.
//!
//! The wallet SDK drives a payment through three phases (client submit,
//! server approval, server completion) and reports progress through a bag
//! of callbacks. Those callbacks are normalized into [`PaymentEvent`] so the
//! whole lifecycle is a single exhaustive `transition` function:
//!
//! ```text
//! created --(SdkSubmitted)--> pending_approval
//! pending_approval --(ServerApproved)--> approved
//! pending_approval --(ApprovalFailed)--> failed
//! approved --(BroadcastReported)--> pending_completion
//! pending_completion --(LedgerVerified)--> completed
//! pending_completion --(VerificationFailed)--> failed
//! created | pending_approval | approved --(Aborted)--> cancelled
//! ```
//!
//! `completed`, `failed` and `cancelled` are terminal.

use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema,
)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Created,
    PendingApproval,
    Approved,
    PendingCompletion,
    Completed,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Completed | PaymentStatus::Failed | PaymentStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Created => "created",
            PaymentStatus::PendingApproval => "pending_approval",
            PaymentStatus::Approved => "approved",
            PaymentStatus::PendingCompletion => "pending_completion",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
        }
    }
}

/// The wallet SDK callback bag, flattened into one event type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentEvent {
    /// `onReadyForServerApproval`: the SDK assigned a payment identifier.
    SdkSubmitted { external_payment_id: String },
    /// Server-side validation passed.
    ServerApproved,
    /// Server-side validation rejected the payment.
    ApprovalFailed,
    /// `onReadyForServerCompletion`: the client broadcast a transaction.
    BroadcastReported { tx_hash: String },
    /// The transaction hash was verified against (or provisionally accepted
    /// for) the ledger.
    LedgerVerified,
    /// The reported hash is definitively absent from the ledger.
    VerificationFailed,
    /// `onCancel`: user or client aborted.
    Aborted,
}

impl PaymentEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PaymentEvent::SdkSubmitted { .. } => "sdk_submitted",
            PaymentEvent::ServerApproved => "server_approved",
            PaymentEvent::ApprovalFailed => "approval_failed",
            PaymentEvent::BroadcastReported { .. } => "broadcast_reported",
            PaymentEvent::LedgerVerified => "ledger_verified",
            PaymentEvent::VerificationFailed => "verification_failed",
            PaymentEvent::Aborted => "aborted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("event {event} is not valid in state {from}")]
pub struct TransitionError {
    pub from: &'static str,
    pub event: &'static str,
}

/// Applies one event to a payment state.
///
/// Pure; the caller owns persistence and must re-check the precondition
/// atomically when writing (the SDK retries callbacks).
pub fn transition(
    status: PaymentStatus,
    event: &PaymentEvent,
) -> Result<PaymentStatus, TransitionError> {
    use self::PaymentEvent as E;
    use self::PaymentStatus as S;

    let next = match (status, event) {
        (S::Created, E::SdkSubmitted { .. }) => S::PendingApproval,
        (S::PendingApproval, E::ServerApproved) => S::Approved,
        (S::PendingApproval, E::ApprovalFailed) => S::Failed,
        (S::Approved, E::BroadcastReported { .. }) => S::PendingCompletion,
        (S::PendingCompletion, E::LedgerVerified) => S::Completed,
        (S::PendingCompletion, E::VerificationFailed) => S::Failed,
        (S::Created | S::PendingApproval | S::Approved, E::Aborted) => S::Cancelled,
        (from, event) => {
            return Err(TransitionError {
                from: from.as_str(),
                event: event.name(),
            })
        }
    };
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::{PaymentEvent as E, PaymentStatus as S};

    fn submitted() -> E {
        E::SdkSubmitted {
            external_payment_id: "pay_abc".into(),
        }
    }

    fn broadcast() -> E {
        E::BroadcastReported {
            tx_hash: "deadbeef".into(),
        }
    }

    #[test]
    fn test_happy_path() {
        let mut status = S::Created;
        for event in [&submitted(), &E::ServerApproved, &broadcast(), &E::LedgerVerified] {
            status = transition(status, event).unwrap();
        }
        assert_eq!(status, S::Completed);
    }

    #[test]
    fn test_completion_before_approval_is_rejected() {
        let err = transition(S::PendingApproval, &broadcast()).unwrap_err();
        assert_eq!(err.from, "pending_approval");
        assert_eq!(err.event, "broadcast_reported");

        assert!(transition(S::Created, &E::LedgerVerified).is_err());
    }

    #[test]
    fn test_abort_only_before_broadcast() {
        assert_eq!(transition(S::Created, &E::Aborted).unwrap(), S::Cancelled);
        assert_eq!(
            transition(S::PendingApproval, &E::Aborted).unwrap(),
            S::Cancelled
        );
        assert_eq!(transition(S::Approved, &E::Aborted).unwrap(), S::Cancelled);
        assert!(transition(S::PendingCompletion, &E::Aborted).is_err());
    }

    #[test]
    fn test_terminal_states_accept_nothing() {
        for terminal in [S::Completed, S::Failed, S::Cancelled] {
            assert!(terminal.is_terminal());
            for event in [
                &submitted(),
                &E::ServerApproved,
                &E::ApprovalFailed,
                &broadcast(),
                &E::LedgerVerified,
                &E::VerificationFailed,
                &E::Aborted,
            ] {
                assert!(
                    transition(terminal, event).is_err(),
                    "{:?} must reject {:?}",
                    terminal,
                    event
                );
            }
        }
    }

    #[test]
    fn test_verification_failure_fails_the_payment() {
        assert_eq!(
            transition(S::PendingCompletion, &E::VerificationFailed).unwrap(),
            S::Failed
        );
    }
}
