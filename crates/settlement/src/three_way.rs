//! Three-way match: purchase order vs goods receipt vs invoice.
//!
//! A pure function over the three documents' totals and quantities. The
//! tolerance is configurable as an absolute amount plus a relative fraction
//! in basis points; a discrepancy passes if it is within **either** bound.

use serde::{Deserialize, Serialize};

use procura_core::Money;

/// Tolerance for amount discrepancies.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchTolerance {
    /// Absolute amount the invoice may deviate from the receipted value.
    pub absolute: Money,
    /// Relative deviation in basis points of the receipted value.
    pub relative_bps: u32,
}

impl Default for MatchTolerance {
    fn default() -> Self {
        Self {
            absolute: Money::from_minor(100),
            relative_bps: 50,
        }
    }
}

/// The three documents' figures, reduced to what the match needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchInput {
    pub po_total: Money,
    pub po_quantity: i64,
    pub grn_accepted_quantity: i64,
    /// Value of the accepted goods at PO prices.
    pub grn_accepted_value: Money,
    pub invoice_total: Money,
    pub invoice_quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchOutcome {
    Matched,
    QuantityMismatch { invoiced: i64, accepted: i64 },
    AmountMismatch { invoiced: Money, expected: Money, tolerance: Money },
}

impl MatchOutcome {
    pub fn is_matched(&self) -> bool {
        matches!(self, MatchOutcome::Matched)
    }
}

/// Run the match. Quantity must agree exactly with the accepted quantity;
/// the amount is compared against the accepted value within tolerance.
pub fn three_way_match(input: &MatchInput, tolerance: &MatchTolerance) -> MatchOutcome {
    if input.invoice_quantity != input.grn_accepted_quantity {
        return MatchOutcome::QuantityMismatch {
            invoiced: input.invoice_quantity,
            accepted: input.grn_accepted_quantity,
        };
    }

    let expected = input.grn_accepted_value;
    let deviation = input.invoice_total.abs_diff(expected);
    let relative_allowance = Money::from_minor(
        (expected.minor().unsigned_abs() as u128 * tolerance.relative_bps as u128 / 10_000)
            .min(i64::MAX as u128) as i64,
    );
    let allowed = tolerance.absolute.max(relative_allowance);

    if deviation <= allowed {
        MatchOutcome::Matched
    } else {
        MatchOutcome::AmountMismatch {
            invoiced: input.invoice_total,
            expected,
            tolerance: allowed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn input(accepted_value: i64, invoice_total: i64, qty: i64) -> MatchInput {
        MatchInput {
            po_total: Money::from_minor(accepted_value),
            po_quantity: qty,
            grn_accepted_quantity: qty,
            grn_accepted_value: Money::from_minor(accepted_value),
            invoice_total: Money::from_minor(invoice_total),
            invoice_quantity: qty,
        }
    }

    #[test]
    fn exact_figures_match() {
        let outcome = three_way_match(&input(1_650_00, 1_650_00, 15), &MatchTolerance::default());
        assert!(outcome.is_matched());
    }

    #[test]
    fn quantity_mismatch_is_reported_first() {
        let mut i = input(1_000_00, 1_000_00, 10);
        i.invoice_quantity = 12;
        let outcome = three_way_match(&i, &MatchTolerance::default());
        assert_eq!(
            outcome,
            MatchOutcome::QuantityMismatch {
                invoiced: 12,
                accepted: 10,
            }
        );
    }

    #[test]
    fn deviation_within_absolute_tolerance_matches() {
        let tolerance = MatchTolerance {
            absolute: Money::from_minor(5_00),
            relative_bps: 0,
        };
        assert!(three_way_match(&input(1_000_00, 1_004_00, 10), &tolerance).is_matched());
        assert!(!three_way_match(&input(1_000_00, 1_006_00, 10), &tolerance).is_matched());
    }

    #[test]
    fn relative_tolerance_scales_with_value() {
        // 50 bps of 10_000_00 = 50_00.
        let tolerance = MatchTolerance {
            absolute: Money::ZERO,
            relative_bps: 50,
        };
        assert!(three_way_match(&input(10_000_00, 10_040_00, 10), &tolerance).is_matched());
        assert!(!three_way_match(&input(10_000_00, 10_060_00, 10), &tolerance).is_matched());
    }

    proptest! {
        /// Symmetric: over- and under-invoicing by the same deviation give
        /// the same verdict.
        #[test]
        fn match_is_symmetric_in_deviation(
            value in 1i64..10_000_000,
            deviation in 0i64..100_000,
            qty in 1i64..1_000,
        ) {
            let tolerance = MatchTolerance::default();
            let over = three_way_match(&input(value, value + deviation, qty), &tolerance);
            let under = three_way_match(&input(value, value - deviation, qty), &tolerance);
            prop_assert_eq!(over.is_matched(), under.is_matched());
        }
    }
}
