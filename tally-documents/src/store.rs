use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use tally_core::{DocumentId, DocumentKind, ParentRef, PaymentStatus, TenantId};

use crate::{DocumentError, DocumentResult, ParentDocument};

const DOCUMENT_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS parent_documents (
    id TEXT NOT NULL,
    kind TEXT NOT NULL,
    tenant_id TEXT NOT NULL,
    doc_reference TEXT NOT NULL,
    total_amount TEXT,
    outstanding_amount TEXT NOT NULL,
    payment_status TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (id, kind)
);
CREATE INDEX IF NOT EXISTS parent_documents_idx_tenant_kind
    ON parent_documents(tenant_id, kind);
"#;

/// Narrow interface the payment core needs from the document modules.
///
/// Methods take a live [`Connection`] so the ledger can run lookups and the
/// derived-field update inside its own transaction; a
/// [`rusqlite::Transaction`] dereferences to `Connection`.
pub trait DocumentStore: Send + Sync {
    /// Load a document row regardless of tenant. Callers decide how a
    /// tenant mismatch is surfaced — append fails loudly, reads filter.
    fn load(&self, conn: &Connection, parent: ParentRef) -> DocumentResult<Option<ParentDocument>>;

    /// Load a document scoped to the acting tenant.
    fn find(
        &self,
        conn: &Connection,
        tenant: TenantId,
        parent: ParentRef,
    ) -> DocumentResult<Option<ParentDocument>> {
        Ok(self
            .load(conn, parent)?
            .filter(|document| document.tenant_id == tenant))
    }

    /// Persist recomputed derived fields. The only mutation the payment
    /// core ever performs on a document.
    fn update_derived_fields(
        &self,
        conn: &Connection,
        tenant: TenantId,
        parent: ParentRef,
        outstanding: Decimal,
        status: PaymentStatus,
    ) -> DocumentResult<()>;
}

/// SQLite projection of the document modules' records, sharing a database
/// file with the payment ledger.
#[derive(Clone, Copy, Debug, Default)]
pub struct SqliteDocumentStore;

impl SqliteDocumentStore {
    /// Create the projection tables if they do not exist yet.
    pub fn initialize_schema(conn: &Connection) -> DocumentResult<()> {
        conn.execute_batch(DOCUMENT_SCHEMA)?;
        Ok(())
    }

    /// Insert a document row. Used by seeding and tests; production rows
    /// arrive through the external document-management flows.
    pub fn insert(&self, conn: &Connection, document: &ParentDocument) -> DocumentResult<()> {
        conn.execute(
            "INSERT INTO parent_documents (
                id, kind, tenant_id, doc_reference, total_amount,
                outstanding_amount, payment_status, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                document.id.to_string(),
                document.kind.as_str(),
                document.tenant_id.to_string(),
                document.reference,
                document.total_amount.map(|amount| amount.to_string()),
                document.outstanding_amount.to_string(),
                document.payment_status.as_str(),
                document.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Every document belonging to one tenant. Drives the repair sweep.
    pub fn list_for_tenant(
        &self,
        conn: &Connection,
        tenant: TenantId,
    ) -> DocumentResult<Vec<ParentDocument>> {
        let mut stmt = conn.prepare(
            "SELECT id, kind, tenant_id, doc_reference, total_amount,
                    outstanding_amount, payment_status, updated_at
             FROM parent_documents
             WHERE tenant_id = ?1
             ORDER BY kind, doc_reference",
        )?;
        let mut rows = stmt.query(params![tenant.to_string()])?;
        let mut documents = Vec::new();
        while let Some(row) = rows.next()? {
            documents.push(row_to_document(row)?);
        }
        Ok(documents)
    }
}

impl DocumentStore for SqliteDocumentStore {
    fn load(&self, conn: &Connection, parent: ParentRef) -> DocumentResult<Option<ParentDocument>> {
        conn.query_row(
            "SELECT id, kind, tenant_id, doc_reference, total_amount,
                    outstanding_amount, payment_status, updated_at
             FROM parent_documents
             WHERE id = ?1 AND kind = ?2",
            params![parent.document_id().to_string(), parent.kind().as_str()],
            |row| Ok(row_to_document(row)),
        )
        .optional()?
        .transpose()
    }

    fn update_derived_fields(
        &self,
        conn: &Connection,
        tenant: TenantId,
        parent: ParentRef,
        outstanding: Decimal,
        status: PaymentStatus,
    ) -> DocumentResult<()> {
        let updated = conn.execute(
            "UPDATE parent_documents
             SET outstanding_amount = ?1, payment_status = ?2, updated_at = ?3
             WHERE id = ?4 AND kind = ?5 AND tenant_id = ?6",
            params![
                outstanding.to_string(),
                status.as_str(),
                Utc::now().to_rfc3339(),
                parent.document_id().to_string(),
                parent.kind().as_str(),
                tenant.to_string(),
            ],
        )?;
        if updated != 1 {
            return Err(DocumentError::InvalidState(format!(
                "derived-field update matched {updated} rows for {parent}"
            )));
        }
        Ok(())
    }
}

fn row_to_document(row: &Row<'_>) -> DocumentResult<ParentDocument> {
    let id: String = row.get(0)?;
    let kind: String = row.get(1)?;
    let tenant: String = row.get(2)?;
    let reference: String = row.get(3)?;
    let total: Option<String> = row.get(4)?;
    let outstanding: String = row.get(5)?;
    let status: String = row.get(6)?;
    let updated_at: String = row.get(7)?;

    Ok(ParentDocument {
        id: parse_id(&id)?,
        kind: DocumentKind::from_str(&kind).map_err(DocumentError::Serialization)?,
        tenant_id: tenant
            .parse::<TenantId>()
            .map_err(|err| DocumentError::Serialization(format!("invalid tenant {tenant}: {err}")))?,
        reference,
        total_amount: total.as_deref().map(parse_decimal).transpose()?,
        outstanding_amount: parse_decimal(&outstanding)?,
        payment_status: PaymentStatus::from_str(&status).map_err(DocumentError::Serialization)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn parse_id(value: &str) -> DocumentResult<DocumentId> {
    value
        .parse()
        .map_err(|err| DocumentError::Serialization(format!("invalid document id {value}: {err}")))
}

fn parse_decimal(value: &str) -> DocumentResult<Decimal> {
    Decimal::from_str(value)
        .map_err(|err| DocumentError::Serialization(format!("invalid decimal {value}: {err}")))
}

fn parse_timestamp(value: &str) -> DocumentResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|err| DocumentError::Serialization(format!("invalid timestamp {value}: {err}")))
}
