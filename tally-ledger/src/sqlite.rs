use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior,
};
use rust_decimal::Decimal;
use tally_core::{DocumentId, ParentRef, PaymentId, TenantId, UserId};
use tally_documents::{DocumentStore, ParentDocument, SqliteDocumentStore};
use tally_recon::Reconciliation;

use crate::{
    LedgerError, LedgerResult, NewPayment, PaymentLedger, PaymentQuery, PaymentTransaction,
};

const LEDGER_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS payment_transactions (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL,
    purchase_order_id TEXT,
    sales_order_id TEXT,
    invoice_id TEXT,
    amount TEXT NOT NULL,
    payment_method TEXT NOT NULL,
    reference_number TEXT,
    payment_date TEXT NOT NULL,
    notes TEXT,
    created_at TEXT NOT NULL,
    created_by TEXT,
    CHECK (
        (purchase_order_id IS NOT NULL)
        + (sales_order_id IS NOT NULL)
        + (invoice_id IS NOT NULL) = 1
    )
);
CREATE INDEX IF NOT EXISTS payments_idx_tenant_date
    ON payment_transactions(tenant_id, payment_date);
CREATE INDEX IF NOT EXISTS payments_idx_tenant_po
    ON payment_transactions(tenant_id, purchase_order_id);
CREATE INDEX IF NOT EXISTS payments_idx_tenant_so
    ON payment_transactions(tenant_id, sales_order_id);
CREATE INDEX IF NOT EXISTS payments_idx_tenant_invoice
    ON payment_transactions(tenant_id, invoice_id);
"#;

const SELECT_COLUMNS: &str = "id, tenant_id, purchase_order_id, sales_order_id, invoice_id, \
     amount, payment_method, reference_number, payment_date, notes, created_at, created_by";

/// SQLite-backed payment ledger sharing one database file with the parent
/// document projection, so an append and its reconciliation ride a single
/// write transaction.
#[derive(Clone, Debug)]
pub struct SqlitePaymentLedger {
    path: PathBuf,
    documents: SqliteDocumentStore,
}

impl SqlitePaymentLedger {
    pub fn new(path: impl Into<PathBuf>) -> LedgerResult<Self> {
        let ledger = Self {
            path: path.into(),
            documents: SqliteDocumentStore,
        };
        ledger.initialize_schema()?;
        Ok(ledger)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn initialize_schema(&self) -> LedgerResult<()> {
        let conn = self.connect()?;
        SqliteDocumentStore::initialize_schema(&conn)?;
        conn.execute_batch(LEDGER_SCHEMA)?;
        Ok(())
    }

    fn connect(&self) -> LedgerResult<Connection> {
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&self.path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(conn)
    }

    /// Read-side join used by the API surface to label responses with the
    /// parent's reference number.
    pub fn parent_document(
        &self,
        tenant: TenantId,
        parent: ParentRef,
    ) -> LedgerResult<Option<ParentDocument>> {
        let conn = self.connect()?;
        Ok(self.documents.find(&conn, tenant, parent)?)
    }

    /// Re-run reconciliation for every document of one tenant. Each
    /// document gets its own short write transaction.
    pub fn resync_tenant(
        &self,
        tenant: TenantId,
    ) -> LedgerResult<Vec<(ParentRef, Reconciliation)>> {
        let documents = {
            let conn = self.connect()?;
            self.documents.list_for_tenant(&conn, tenant)?
        };
        let mut outcomes = Vec::with_capacity(documents.len());
        for document in documents {
            let parent = document.parent_ref();
            outcomes.push((parent, self.resync_parent(tenant, parent)?));
        }
        Ok(outcomes)
    }

    /// Load a parent and enforce ownership: absent is `ParentNotFound`,
    /// present under another tenant fails loudly with `TenantMismatch`.
    fn load_owned_document(
        &self,
        conn: &Connection,
        tenant: TenantId,
        parent: ParentRef,
    ) -> LedgerResult<ParentDocument> {
        let document = self
            .documents
            .load(conn, parent)?
            .ok_or(LedgerError::ParentNotFound)?;
        if document.tenant_id != tenant {
            return Err(LedgerError::TenantMismatch);
        }
        Ok(document)
    }

    /// Recompute the parent's derived fields from its full payment history
    /// and persist them on the same connection (and thus transaction).
    fn reconcile_parent(
        &self,
        conn: &Connection,
        document: &ParentDocument,
    ) -> LedgerResult<Reconciliation> {
        let amounts = amounts_for_parent(conn, document.tenant_id, document.parent_ref())?;
        let outcome = tally_recon::recompute(document.total_amount, amounts);
        self.documents.update_derived_fields(
            conn,
            document.tenant_id,
            document.parent_ref(),
            outcome.outstanding,
            outcome.status,
        )?;
        Ok(outcome)
    }
}

impl PaymentLedger for SqlitePaymentLedger {
    fn append(&self, tenant: TenantId, payment: NewPayment) -> LedgerResult<PaymentTransaction> {
        payment.validate(Utc::now().date_naive())?;
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let document = self.load_owned_document(&tx, tenant, payment.parent)?;
        let entry = PaymentTransaction {
            id: PaymentId::new(),
            tenant_id: tenant,
            parent: payment.parent,
            amount: payment.amount,
            method: payment.method,
            reference_number: payment.reference_number,
            payment_date: payment.payment_date,
            notes: payment.notes,
            created_at: Utc::now(),
            created_by: payment.created_by,
        };
        insert_entry(&tx, &entry)?;
        self.reconcile_parent(&tx, &document)?;
        tx.commit()?;
        Ok(entry)
    }

    fn list_for_parent(
        &self,
        tenant: TenantId,
        parent: ParentRef,
    ) -> LedgerResult<Vec<PaymentTransaction>> {
        let conn = self.connect()?;
        self.load_owned_document(&conn, tenant, parent)?;
        select_payments(&conn, tenant, &PaymentQuery::default().with_parent(parent))
    }

    fn get(&self, tenant: TenantId, id: PaymentId) -> LedgerResult<Option<PaymentTransaction>> {
        let conn = self.connect()?;
        conn.query_row(
            &format!(
                "SELECT {SELECT_COLUMNS} FROM payment_transactions
                 WHERE id = ?1 AND tenant_id = ?2"
            ),
            params![id.to_string(), tenant.to_string()],
            |row| Ok(row_to_entry(row)),
        )
        .optional()?
        .transpose()
    }

    fn query(
        &self,
        tenant: TenantId,
        query: PaymentQuery,
    ) -> LedgerResult<Vec<PaymentTransaction>> {
        let conn = self.connect()?;
        select_payments(&conn, tenant, &query)
    }

    fn resync_parent(&self, tenant: TenantId, parent: ParentRef) -> LedgerResult<Reconciliation> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let document = self.load_owned_document(&tx, tenant, parent)?;
        let outcome = self.reconcile_parent(&tx, &document)?;
        tx.commit()?;
        Ok(outcome)
    }
}

fn insert_entry(conn: &Connection, entry: &PaymentTransaction) -> LedgerResult<()> {
    let (purchase_order, sales_order, invoice) = parent_columns(entry.parent);
    conn.execute(
        "INSERT INTO payment_transactions (
            id, tenant_id, purchase_order_id, sales_order_id, invoice_id,
            amount, payment_method, reference_number, payment_date, notes,
            created_at, created_by
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            entry.id.to_string(),
            entry.tenant_id.to_string(),
            purchase_order.map(|id| id.to_string()),
            sales_order.map(|id| id.to_string()),
            invoice.map(|id| id.to_string()),
            entry.amount.to_string(),
            entry.method.as_str(),
            entry.reference_number,
            entry.payment_date.to_string(),
            entry.notes,
            entry.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            entry.created_by.map(|user| user.to_string()),
        ],
    )?;
    Ok(())
}

fn select_payments(
    conn: &Connection,
    tenant: TenantId,
    query: &PaymentQuery,
) -> LedgerResult<Vec<PaymentTransaction>> {
    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM payment_transactions
         WHERE tenant_id = ?1
           AND (?2 IS NULL OR purchase_order_id = ?2)
           AND (?3 IS NULL OR sales_order_id = ?3)
           AND (?4 IS NULL OR invoice_id = ?4)
           AND (?5 IS NULL OR payment_method = ?5)
           AND (?6 IS NULL OR payment_date >= ?6)
           AND (?7 IS NULL OR payment_date <= ?7)
         ORDER BY payment_date DESC, created_at DESC
         LIMIT ?8 OFFSET ?9"
    );
    let (purchase_order, sales_order, invoice) = match query.parent {
        Some(parent) => parent_columns(parent),
        None => (None, None, None),
    };
    let params: Vec<Value> = vec![
        Value::from(tenant.to_string()),
        optional_text(purchase_order.map(|id| id.to_string())),
        optional_text(sales_order.map(|id| id.to_string())),
        optional_text(invoice.map(|id| id.to_string())),
        optional_text(query.method.map(|method| method.as_str().to_string())),
        optional_text(query.date_from.map(|date| date.to_string())),
        optional_text(query.date_to.map(|date| date.to_string())),
        Value::Integer(query.limit.map(|limit| limit as i64).unwrap_or(-1)),
        Value::Integer(query.offset.map(|offset| offset as i64).unwrap_or(0)),
    ];

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(params.iter()))?;
    let mut entries = Vec::new();
    while let Some(row) = rows.next()? {
        entries.push(row_to_entry(row)?);
    }
    Ok(entries)
}

fn amounts_for_parent(
    conn: &Connection,
    tenant: TenantId,
    parent: ParentRef,
) -> LedgerResult<Vec<Decimal>> {
    let column = match parent {
        ParentRef::PurchaseOrder(_) => "purchase_order_id",
        ParentRef::SalesOrder(_) => "sales_order_id",
        ParentRef::Invoice(_) => "invoice_id",
    };
    let mut stmt = conn.prepare(&format!(
        "SELECT amount FROM payment_transactions
         WHERE tenant_id = ?1 AND {column} = ?2"
    ))?;
    let mut rows = stmt.query(params![
        tenant.to_string(),
        parent.document_id().to_string()
    ])?;
    let mut amounts = Vec::new();
    while let Some(row) = rows.next()? {
        let raw: String = row.get(0)?;
        amounts.push(parse_decimal(&raw)?);
    }
    Ok(amounts)
}

fn parent_columns(parent: ParentRef) -> (Option<DocumentId>, Option<DocumentId>, Option<DocumentId>) {
    match parent {
        ParentRef::PurchaseOrder(id) => (Some(id), None, None),
        ParentRef::SalesOrder(id) => (None, Some(id), None),
        ParentRef::Invoice(id) => (None, None, Some(id)),
    }
}

fn optional_text(value: Option<String>) -> Value {
    value.map(Value::from).unwrap_or(Value::Null)
}

fn row_to_entry(row: &Row<'_>) -> LedgerResult<PaymentTransaction> {
    let id: String = row.get(0)?;
    let tenant: String = row.get(1)?;
    let purchase_order: Option<String> = row.get(2)?;
    let sales_order: Option<String> = row.get(3)?;
    let invoice: Option<String> = row.get(4)?;
    let amount: String = row.get(5)?;
    let method: String = row.get(6)?;
    let reference_number: Option<String> = row.get(7)?;
    let payment_date: String = row.get(8)?;
    let notes: Option<String> = row.get(9)?;
    let created_at: String = row.get(10)?;
    let created_by: Option<String> = row.get(11)?;

    let parent = match (&purchase_order, &sales_order, &invoice) {
        (Some(id), None, None) => ParentRef::PurchaseOrder(parse_document_id(id)?),
        (None, Some(id), None) => ParentRef::SalesOrder(parse_document_id(id)?),
        (None, None, Some(id)) => ParentRef::Invoice(parse_document_id(id)?),
        _ => {
            return Err(LedgerError::Serialization(format!(
                "payment row {id} does not reference exactly one parent"
            )))
        }
    };

    Ok(PaymentTransaction {
        id: id
            .parse::<PaymentId>()
            .map_err(|err| LedgerError::Serialization(format!("invalid payment id {id}: {err}")))?,
        tenant_id: tenant
            .parse::<TenantId>()
            .map_err(|err| LedgerError::Serialization(format!("invalid tenant {tenant}: {err}")))?,
        parent,
        amount: parse_decimal(&amount)?,
        method: method.parse().map_err(LedgerError::Serialization)?,
        reference_number,
        payment_date: NaiveDate::from_str(&payment_date).map_err(|err| {
            LedgerError::Serialization(format!("invalid payment date {payment_date}: {err}"))
        })?,
        notes,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|err| {
                LedgerError::Serialization(format!("invalid timestamp {created_at}: {err}"))
            })?,
        created_by: created_by
            .map(|user| {
                user.parse::<UserId>().map_err(|err| {
                    LedgerError::Serialization(format!("invalid user id {user}: {err}"))
                })
            })
            .transpose()?,
    })
}

fn parse_document_id(value: &str) -> LedgerResult<DocumentId> {
    value
        .parse()
        .map_err(|err| LedgerError::Serialization(format!("invalid document id {value}: {err}")))
}

fn parse_decimal(value: &str) -> LedgerResult<Decimal> {
    Decimal::from_str(value)
        .map_err(|err| LedgerError::Serialization(format!("invalid decimal {value}: {err}")))
}
