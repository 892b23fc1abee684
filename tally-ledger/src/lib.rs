//! Payment ledger primitives and storage backends for Tally.
//!
//! The ledger is append-only: entries are immutable once written, and the
//! parent document's outstanding balance is recomputed from the full entry
//! set on every append, never adjusted incrementally.

mod entry;
mod error;
mod export;
mod query;
mod repository;
mod sqlite;

pub use entry::{NewPayment, PaymentTransaction};
pub use error::{FieldViolation, LedgerError, LedgerResult};
pub use export::write_csv;
pub use query::PaymentQuery;
pub use repository::PaymentLedger;
pub use sqlite::SqlitePaymentLedger;
