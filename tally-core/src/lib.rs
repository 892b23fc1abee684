//! Core domain types shared across the Tally payment reconciliation service.

mod document;
mod ids;
mod payment;

pub use document::{DocumentKind, ParentRef, PaymentStatus};
pub use ids::{DocumentId, PaymentId, TenantId, UserId};
pub use payment::PaymentMethod;
