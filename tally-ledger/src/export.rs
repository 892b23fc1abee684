use std::io::Write;

use crate::{LedgerResult, PaymentTransaction};

/// Write a payment history as CSV, one row per ledger entry, for
/// reporting and archival jobs.
pub fn write_csv<W: Write>(writer: W, entries: &[PaymentTransaction]) -> LedgerResult<()> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record([
        "id",
        "tenant_id",
        "entity_type",
        "entity_id",
        "amount",
        "payment_method",
        "reference_number",
        "payment_date",
        "notes",
        "created_at",
        "created_by",
    ])?;
    for entry in entries {
        writer.write_record([
            entry.id.to_string(),
            entry.tenant_id.to_string(),
            entry.parent.kind().to_string(),
            entry.parent.document_id().to_string(),
            entry.amount.to_string(),
            entry.method.to_string(),
            entry.reference_number.clone().unwrap_or_default(),
            entry.payment_date.to_string(),
            entry.notes.clone().unwrap_or_default(),
            entry.created_at.to_rfc3339(),
            entry
                .created_by
                .map(|user| user.to_string())
                .unwrap_or_default(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
