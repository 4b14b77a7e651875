//! Pure money policy: how a cancelled booking's amount is split between the
//! customer and the provider, and what share of a completed booking the
//! provider keeps. No I/O here; the booking service applies the results.

use rust_decimal::Decimal;

use crate::models::CancelParty;

/// Policy rates, normally sourced from [`crate::config::PlatformSettings`].
#[derive(Debug, Clone)]
pub struct PolicyRates {
    /// Platform commission withheld from a completed booking.
    pub commission_rate: Decimal,
    /// Fraction refunded to the customer when the customer cancels.
    pub customer_cancel_refund_rate: Decimal,
}

impl Default for PolicyRates {
    fn default() -> Self {
        Self {
            commission_rate: Decimal::new(10, 2),              // 0.10
            customer_cancel_refund_rate: Decimal::new(50, 2),  // 0.50
        }
    }
}

/// Outcome of the refund policy for one cancelled booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefundSplit {
    pub customer_refund: Decimal,
    pub provider_compensation: Decimal,
}

/// Splits a cancelled booking's amount.
///
/// Provider-cancelled bookings refund the full amount. Customer-cancelled
/// bookings refund half, floored to the whole currency unit; the provider is
/// compensated with the exact remainder, so the two legs always sum to the
/// original total.
pub fn refund_split(total_amount: Decimal, cancelled_by: CancelParty, rates: &PolicyRates) -> RefundSplit {
    match cancelled_by {
        CancelParty::Provider => RefundSplit {
            customer_refund: total_amount,
            provider_compensation: Decimal::ZERO,
        },
        CancelParty::Customer => {
            let refund = (total_amount * rates.customer_cancel_refund_rate).floor();
            RefundSplit {
                customer_refund: refund,
                provider_compensation: total_amount - refund,
            }
        }
    }
}

/// Provider share of a completed booking: the total minus the platform
/// commission, with the commission floored to the whole currency unit.
pub fn provider_earning(total_amount: Decimal, rates: &PolicyRates) -> Decimal {
    total_amount - (total_amount * rates.commission_rate).floor()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_provider_cancel_full_refund() {
        let split = refund_split(dec!(1000), CancelParty::Provider, &PolicyRates::default());
        assert_eq!(split.customer_refund, dec!(1000));
        assert_eq!(split.provider_compensation, dec!(0));
    }

    #[test]
    fn test_customer_cancel_floors_refund() {
        let split = refund_split(dec!(1001), CancelParty::Customer, &PolicyRates::default());
        assert_eq!(split.customer_refund, dec!(500));
        assert_eq!(split.provider_compensation, dec!(501));
    }

    #[test]
    fn test_customer_cancel_even_amount() {
        let split = refund_split(dec!(1000), CancelParty::Customer, &PolicyRates::default());
        assert_eq!(split.customer_refund, dec!(500));
        assert_eq!(split.provider_compensation, dec!(500));
    }

    #[test]
    fn test_split_legs_always_sum_to_total() {
        for total in [dec!(1), dec!(99), dec!(100), dec!(101), dec!(12345.50)] {
            for party in [CancelParty::Customer, CancelParty::Provider] {
                let split = refund_split(total, party, &PolicyRates::default());
                assert_eq!(split.customer_refund + split.provider_compensation, total);
            }
        }
    }

    #[test]
    fn test_provider_earning_floors_commission() {
        let rates = PolicyRates::default();
        assert_eq!(provider_earning(dec!(1500), &rates), dec!(1350));
        // Commission on 1005 is 100.5, floored to 100.
        assert_eq!(provider_earning(dec!(1005), &rates), dec!(905));
    }

    #[test]
    fn test_zero_amount_is_harmless() {
        let rates = PolicyRates::default();
        let split = refund_split(dec!(0), CancelParty::Customer, &rates);
        assert_eq!(split.customer_refund, dec!(0));
        assert_eq!(split.provider_compensation, dec!(0));
        assert_eq!(provider_earning(dec!(0), &rates), dec!(0));
    }
}
