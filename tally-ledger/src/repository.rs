use tally_core::{ParentRef, PaymentId, TenantId};
use tally_recon::Reconciliation;

use crate::{LedgerResult, NewPayment, PaymentQuery, PaymentTransaction};

/// Abstraction over durable payment-ledger storage engines.
///
/// Deliberately append-only: there is no update or delete. Every method is
/// scoped by an explicit tenant identifier produced by the tenant
/// resolver, never taken from a client payload.
pub trait PaymentLedger: Send + Sync {
    /// Validate, persist, and reconcile a payment in one atomic step.
    ///
    /// Fails `TenantMismatch` when the parent document exists under a
    /// different tenant — checked loudly, not filtered away — and
    /// `ParentNotFound` when it does not exist at all.
    fn append(&self, tenant: TenantId, payment: NewPayment) -> LedgerResult<PaymentTransaction>;

    /// Payments recorded against one document, newest payment date first,
    /// ties broken by creation time. Same tenant rule as [`append`].
    ///
    /// [`append`]: PaymentLedger::append
    fn list_for_parent(
        &self,
        tenant: TenantId,
        parent: ParentRef,
    ) -> LedgerResult<Vec<PaymentTransaction>>;

    /// Single-payment lookup. A foreign tenant's id behaves exactly like a
    /// nonexistent one.
    fn get(&self, tenant: TenantId, id: PaymentId) -> LedgerResult<Option<PaymentTransaction>>;

    /// Payments matching the supplied filter within one tenant.
    fn query(
        &self,
        tenant: TenantId,
        query: PaymentQuery,
    ) -> LedgerResult<Vec<PaymentTransaction>>;

    /// Re-run reconciliation for a document from its full history. Safe to
    /// repeat; used by crash-recovery and repair sweeps.
    fn resync_parent(&self, tenant: TenantId, parent: ParentRef) -> LedgerResult<Reconciliation>;
}
