use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use tally_core::{DocumentId, DocumentKind, ParentRef, TenantId, UserId};
use tally_documents::{ParentDocument, SqliteDocumentStore};
use tally_ledger::{write_csv, PaymentLedger, PaymentQuery, SqlitePaymentLedger};

use crate::app;
use crate::config::{self, AppConfig};
use crate::telemetry;
use crate::tenant::TenantResolver;

#[derive(Debug, Parser)]
#[command(name = "tally-server", about = "Tally payment reconciliation service", version)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = "tally.toml")]
    pub config: PathBuf,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP API.
    Serve,
    /// Re-run reconciliation for one parent document or a whole tenant.
    Resync {
        #[arg(long)]
        tenant: TenantId,
        /// Parent document kind; paired with --id.
        #[arg(long, requires = "id")]
        kind: Option<DocumentKind>,
        /// Parent document id; paired with --kind.
        #[arg(long, requires = "kind")]
        id: Option<DocumentId>,
    },
    /// Export a tenant's payment history as CSV.
    Export {
        #[arg(long)]
        tenant: TenantId,
        /// Output file; stdout when omitted.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Load tenant memberships and parent documents from a TOML file.
    Seed {
        #[arg(long)]
        file: PathBuf,
    },
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load(&cli.config)?;
    let _guard = telemetry::init(&config.log);
    match cli.command {
        Command::Serve => app::serve(config).await,
        Command::Resync { tenant, kind, id } => resync(&config, tenant, kind.zip(id)),
        Command::Export { tenant, output } => export(&config, tenant, output),
        Command::Seed { file } => seed(&config, &file),
    }
}

fn resync(
    config: &AppConfig,
    tenant: TenantId,
    parent: Option<(DocumentKind, DocumentId)>,
) -> Result<()> {
    let ledger = SqlitePaymentLedger::new(&config.storage.database)?;
    match parent {
        Some((kind, id)) => {
            let parent = ParentRef::new(kind, id);
            let outcome = ledger.resync_parent(tenant, parent)?;
            info!(
                %parent,
                outstanding = %outcome.outstanding,
                status = %outcome.status,
                "reconciliation re-run"
            );
        }
        None => {
            let outcomes = ledger.resync_tenant(tenant)?;
            for (parent, outcome) in &outcomes {
                info!(
                    %parent,
                    outstanding = %outcome.outstanding,
                    status = %outcome.status,
                    "reconciliation re-run"
                );
            }
            info!(documents = outcomes.len(), "tenant resync complete");
        }
    }
    Ok(())
}

fn export(config: &AppConfig, tenant: TenantId, output: Option<PathBuf>) -> Result<()> {
    let ledger = SqlitePaymentLedger::new(&config.storage.database)?;
    let entries = ledger.query(tenant, PaymentQuery::default())?;
    match output {
        Some(path) => {
            let file = std::fs::File::create(&path)
                .with_context(|| format!("creating {}", path.display()))?;
            write_csv(file, &entries)?;
            info!(rows = entries.len(), path = %path.display(), "exported payment history");
        }
        None => write_csv(std::io::stdout().lock(), &entries)?,
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct SeedFile {
    #[serde(default)]
    members: Vec<SeedMember>,
    #[serde(default)]
    documents: Vec<SeedDocument>,
}

#[derive(Debug, Deserialize)]
struct SeedMember {
    tenant: TenantId,
    user: UserId,
}

#[derive(Debug, Deserialize)]
struct SeedDocument {
    #[serde(default)]
    id: Option<DocumentId>,
    tenant: TenantId,
    kind: DocumentKind,
    reference: String,
    total_amount: Option<Decimal>,
}

fn seed(config: &AppConfig, file: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let seed: SeedFile = toml::from_str(&raw).context("parsing seed file")?;

    let resolver = TenantResolver::new(&config.storage.database)?;
    for member in &seed.members {
        resolver.add_member(member.tenant, member.user)?;
    }

    // Derived fields start from a recompute over the (empty) history so
    // the reconciliation invariant holds from the first row.
    let ledger = SqlitePaymentLedger::new(&config.storage.database)?;
    let store = SqliteDocumentStore;
    let conn = rusqlite::Connection::open(ledger.path())?;
    let document_count = seed.documents.len();
    for document in seed.documents {
        let outcome = tally_recon::recompute(document.total_amount, []);
        store.insert(
            &conn,
            &ParentDocument {
                id: document.id.unwrap_or_default(),
                tenant_id: document.tenant,
                kind: document.kind,
                reference: document.reference,
                total_amount: document.total_amount,
                outstanding_amount: outcome.outstanding,
                payment_status: outcome.status,
                updated_at: Utc::now(),
            },
        )?;
    }
    info!(
        members = seed.members.len(),
        documents = document_count,
        "seed applied"
    );
    Ok(())
}
