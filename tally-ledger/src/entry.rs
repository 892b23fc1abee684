use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_core::{ParentRef, PaymentId, PaymentMethod, TenantId, UserId};

use crate::{FieldViolation, LedgerError, LedgerResult};

/// Immutable record of money received against a parent financial document.
///
/// Once persisted, no operation in this crate mutates or deletes one; the
/// ledger is the audit trail.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub id: PaymentId,
    pub tenant_id: TenantId,
    pub parent: ParentRef,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub reference_number: Option<String>,
    pub payment_date: NaiveDate,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Acting user at creation time; `None` once the user is removed.
    pub created_by: Option<UserId>,
}

/// Payment attributes supplied by the caller. Identifier, tenant, and the
/// creation timestamp are assigned by the ledger at append time.
#[derive(Clone, Debug)]
pub struct NewPayment {
    pub parent: ParentRef,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub reference_number: Option<String>,
    pub payment_date: NaiveDate,
    pub notes: Option<String>,
    pub created_by: Option<UserId>,
}

impl NewPayment {
    pub fn new(
        parent: ParentRef,
        amount: Decimal,
        method: PaymentMethod,
        payment_date: NaiveDate,
    ) -> Self {
        Self {
            parent,
            amount,
            method,
            reference_number: None,
            payment_date,
            notes: None,
            created_by: None,
        }
    }

    pub fn with_reference_number(mut self, reference: impl Into<String>) -> Self {
        self.reference_number = Some(reference.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_created_by(mut self, user: UserId) -> Self {
        self.created_by = Some(user);
        self
    }

    /// Check the caller-supplied fields against the ledger's input rules,
    /// collecting every violation rather than stopping at the first.
    pub fn validate(&self, today: NaiveDate) -> LedgerResult<()> {
        let mut violations = Vec::new();
        if self.amount <= Decimal::ZERO {
            violations.push(FieldViolation::new("amount", "must be strictly positive"));
        }
        if self.payment_date > today {
            violations.push(FieldViolation::new(
                "payment_date",
                "must not be in the future",
            ));
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(LedgerError::Validation(violations))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Days;
    use rust_decimal_macros::dec;
    use tally_core::DocumentId;

    fn sample_draft(amount: Decimal, payment_date: NaiveDate) -> NewPayment {
        NewPayment::new(
            ParentRef::Invoice(DocumentId::new()),
            amount,
            PaymentMethod::Wire,
            payment_date,
        )
    }

    #[test]
    fn accepts_positive_amount_today() {
        let today = Utc::now().date_naive();
        assert!(sample_draft(dec!(50.00), today).validate(today).is_ok());
    }

    #[test]
    fn rejects_zero_and_negative_amounts() {
        let today = Utc::now().date_naive();
        for amount in [Decimal::ZERO, dec!(-50.00)] {
            let err = sample_draft(amount, today).validate(today).unwrap_err();
            match err {
                LedgerError::Validation(violations) => {
                    assert_eq!(violations.len(), 1);
                    assert_eq!(violations[0].field, "amount");
                }
                other => panic!("expected validation error, got {other}"),
            }
        }
    }

    #[test]
    fn rejects_future_payment_date() {
        let today = Utc::now().date_naive();
        let tomorrow = today.checked_add_days(Days::new(1)).unwrap();
        let err = sample_draft(dec!(10.00), tomorrow)
            .validate(today)
            .unwrap_err();
        match err {
            LedgerError::Validation(violations) => {
                assert_eq!(violations[0].field, "payment_date");
            }
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[test]
    fn collects_every_violation() {
        let today = Utc::now().date_naive();
        let tomorrow = today.checked_add_days(Days::new(1)).unwrap();
        let err = sample_draft(dec!(-1), tomorrow).validate(today).unwrap_err();
        match err {
            LedgerError::Validation(violations) => assert_eq!(violations.len(), 2),
            other => panic!("expected validation error, got {other}"),
        }
    }
}
