//! Parent financial documents as seen by the payment core.
//!
//! Document CRUD belongs to external flows; this crate carries only the
//! contract the core consumes — find a document, update its derived
//! settlement fields — plus the SQLite projection behind it.

mod document;
mod error;
mod store;

pub use document::ParentDocument;
pub use error::{DocumentError, DocumentResult};
pub use store::{DocumentStore, SqliteDocumentStore};
