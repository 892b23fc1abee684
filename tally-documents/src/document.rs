use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_core::{DocumentId, DocumentKind, ParentRef, PaymentStatus, TenantId};

/// A parent financial document as the payment core sees it: a fixed total
/// plus the two derived fields only the reconciliation engine may write.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParentDocument {
    pub id: DocumentId,
    pub tenant_id: TenantId,
    pub kind: DocumentKind,
    /// Human-readable document number, e.g. `INV-2031`.
    pub reference: String,
    /// `None` is treated as zero by reconciliation.
    pub total_amount: Option<Decimal>,
    pub outstanding_amount: Decimal,
    pub payment_status: PaymentStatus,
    pub updated_at: DateTime<Utc>,
}

impl ParentDocument {
    pub fn parent_ref(&self) -> ParentRef {
        ParentRef::new(self.kind, self.id)
    }

    /// Billed total with the missing-total edge case folded in.
    pub fn effective_total(&self) -> Decimal {
        self.total_amount.unwrap_or(Decimal::ZERO)
    }
}
