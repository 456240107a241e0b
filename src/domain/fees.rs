//! Platform fee arithmetic.
//!
//! Incoming payments add the fee on top of the merchant's base amount
//! (the customer pays base × (1 + rate), the merchant keeps the base),
//! while withdrawals subtract it (the merchant receives amount × (1 − rate)).
//! That asymmetry is intentional and must hold in both directions.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Number of fractional digits carried by every chain amount: one stroop.
pub const AMOUNT_SCALE: i64 = 7;

/// Smallest charge the network will accept for a free-tier payment.
pub fn minimum_charge() -> BigDecimal {
    BigDecimal::from_str("0.0000001").expect("constant parses")
}

/// Fee policy attached to a merchant's plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", content = "rate", rename_all = "snake_case")]
pub enum FeePolicy {
    /// No fee; the charge is clamped up to the platform minimum unit.
    Free,
    /// Fee added on top of the base amount for payments, subtracted on
    /// withdrawals. Rate is a fraction, e.g. 0.02 for 2%.
    FlatPercent(BigDecimal),
    /// Enterprise-tier override: no fee, no clamping.
    Zero,
}

/// Breakdown of an incoming payment charge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Charge {
    pub customer_charge: BigDecimal,
    pub merchant_net: BigDecimal,
    pub fee_amount: BigDecimal,
}

/// Breakdown of a withdrawal payout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payout {
    pub fee_amount: BigDecimal,
    pub net_amount: BigDecimal,
}

pub struct FeeCalculator;

impl FeeCalculator {
    /// Computes the customer-facing charge for an incoming payment.
    ///
    /// Pure and deterministic; all results carry [`AMOUNT_SCALE`] digits.
    pub fn compute_charge(base_amount: &BigDecimal, policy: &FeePolicy) -> Charge {
        let base = scaled(base_amount);
        match policy {
            FeePolicy::Free => {
                let min = minimum_charge();
                let charge = if base < min { min } else { base };
                Charge {
                    customer_charge: charge.clone(),
                    merchant_net: charge,
                    fee_amount: scaled(&BigDecimal::from(0)),
                }
            }
            FeePolicy::Zero => Charge {
                customer_charge: base.clone(),
                merchant_net: base,
                fee_amount: scaled(&BigDecimal::from(0)),
            },
            FeePolicy::FlatPercent(rate) => {
                let fee = scaled(&(&base * rate));
                Charge {
                    customer_charge: &base + &fee,
                    merchant_net: base,
                    fee_amount: fee,
                }
            }
        }
    }

    /// Computes the fee taken out of a withdrawal.
    pub fn withdrawal_fee(amount: &BigDecimal, rate: &BigDecimal) -> Payout {
        let amount = scaled(amount);
        let fee = scaled(&(&amount * rate));
        Payout {
            net_amount: &amount - &fee,
            fee_amount: fee,
        }
    }
}

fn scaled(value: &BigDecimal) -> BigDecimal {
    value.round(AMOUNT_SCALE).with_scale(AMOUNT_SCALE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn test_flat_percent_adds_fee_on_top() {
        let charge =
            FeeCalculator::compute_charge(&dec("10.0000000"), &FeePolicy::FlatPercent(dec("0.02")));
        assert_eq!(charge.customer_charge, dec("10.2000000"));
        assert_eq!(charge.merchant_net, dec("10.0000000"));
        assert_eq!(charge.fee_amount, dec("0.2000000"));
    }

    #[test]
    fn test_withdrawal_subtracts_fee() {
        let payout = FeeCalculator::withdrawal_fee(&dec("10.0000000"), &dec("0.02"));
        assert_eq!(payout.fee_amount, dec("0.2000000"));
        assert_eq!(payout.net_amount, dec("9.8000000"));
    }

    #[test]
    fn test_directions_are_asymmetric() {
        // For the same amount and rate the customer-side charge and the
        // merchant-side payout must diverge in opposite directions.
        let base = dec("100");
        let rate = dec("0.05");
        let charge = FeeCalculator::compute_charge(&base, &FeePolicy::FlatPercent(rate.clone()));
        let payout = FeeCalculator::withdrawal_fee(&base, &rate);
        assert!(charge.customer_charge > base);
        assert!(payout.net_amount < base);
        assert_eq!(charge.fee_amount, payout.fee_amount);
    }

    #[test]
    fn test_free_policy_clamps_to_minimum() {
        let charge = FeeCalculator::compute_charge(&dec("0"), &FeePolicy::Free);
        assert_eq!(charge.customer_charge, dec("0.0000001"));
        assert_eq!(charge.fee_amount, dec("0.0000000"));

        let charge = FeeCalculator::compute_charge(&dec("3.5"), &FeePolicy::Free);
        assert_eq!(charge.customer_charge, dec("3.5000000"));
    }

    #[test]
    fn test_zero_policy_takes_nothing_and_never_clamps() {
        let charge = FeeCalculator::compute_charge(&dec("0"), &FeePolicy::Zero);
        assert_eq!(charge.customer_charge, dec("0.0000000"));
        assert_eq!(charge.fee_amount, dec("0.0000000"));
    }

    #[test]
    fn test_rounding_half_up_at_scale_seven() {
        // 0.0000015 * 0.5 = 0.00000075, rounds up to 0.0000008
        let charge = FeeCalculator::compute_charge(
            &dec("0.0000015"),
            &FeePolicy::FlatPercent(dec("0.5")),
        );
        assert_eq!(charge.fee_amount, dec("0.0000008"));
        assert_eq!(charge.customer_charge, dec("0.0000023"));
    }
}
