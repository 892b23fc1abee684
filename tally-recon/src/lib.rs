//! Reconciliation of derived settlement fields on parent documents.
//!
//! The engine is a pure function over the full payment history of one
//! document. It is never fed increments: re-running it on the same
//! snapshot always yields the same result, which is what makes crash
//! recovery and repair sweeps safe.

use rust_decimal::Decimal;
use tally_core::PaymentStatus;

/// Result of recomputing a document's derived settlement fields.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Reconciliation {
    /// Remaining balance, clamped at zero. Never negative.
    pub outstanding: Decimal,
    pub status: PaymentStatus,
    /// Sum of every payment recorded against the document.
    pub total_paid: Decimal,
}

/// Recompute outstanding balance and settlement status from the complete
/// set of payment amounts recorded against a document.
///
/// A missing or zero `total_amount` is treated as zero, so any payment
/// settles the document immediately. Overpayment clamps the outstanding
/// balance to zero; the excess is not tracked as a credit.
pub fn recompute<I>(total_amount: Option<Decimal>, amounts: I) -> Reconciliation
where
    I: IntoIterator<Item = Decimal>,
{
    let total = total_amount.unwrap_or(Decimal::ZERO);
    let total_paid: Decimal = amounts.into_iter().sum();
    let outstanding = total - total_paid;
    if outstanding <= Decimal::ZERO {
        Reconciliation {
            outstanding: Decimal::ZERO,
            status: PaymentStatus::Paid,
            total_paid,
        }
    } else if outstanding < total {
        Reconciliation {
            outstanding,
            status: PaymentStatus::Partial,
            total_paid,
        }
    } else {
        Reconciliation {
            outstanding,
            status: PaymentStatus::Unpaid,
            total_paid,
        }
    }
}
