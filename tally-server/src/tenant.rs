use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

use tally_core::{TenantId, UserId};

const MEMBERSHIP_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS tenant_members (
    tenant_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    PRIMARY KEY (tenant_id, user_id)
);
CREATE INDEX IF NOT EXISTS tenant_members_idx_user
    ON tenant_members(user_id);
"#;

/// Authenticated identity attached to a request by the trusted edge:
/// token issuance and verification happen upstream, membership does not.
#[derive(Clone, Copy, Debug)]
pub struct RequestIdentity {
    pub user: UserId,
    /// Explicit tenant selection for users belonging to several tenants.
    pub tenant_hint: Option<TenantId>,
}

/// Errors produced while resolving the acting tenant.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("request carries no authenticated identity")]
    MissingIdentity,
    #[error("identity is not a member of any tenant")]
    NoMembership,
    #[error("identity belongs to multiple tenants; a tenant hint is required")]
    AmbiguousTenant,
    #[error("identity is not a member of the requested tenant")]
    NotAMember,
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<rusqlite::Error> for ResolveError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(value.to_string())
    }
}

/// Membership-backed tenant resolution — the single choke point that
/// produces the tenant identifier every storage call is scoped to.
#[derive(Clone, Debug)]
pub struct TenantResolver {
    path: PathBuf,
}

impl TenantResolver {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, ResolveError> {
        let resolver = Self { path: path.into() };
        let conn = resolver.connect()?;
        conn.execute_batch(MEMBERSHIP_SCHEMA)?;
        Ok(resolver)
    }

    fn connect(&self) -> Result<Connection, ResolveError> {
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|err| ResolveError::Storage(err.to_string()))?;
            }
        }
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(conn)
    }

    /// Resolve the acting tenant for one request. No side effects.
    pub fn resolve(&self, identity: &RequestIdentity) -> Result<TenantId, ResolveError> {
        let conn = self.connect()?;
        match identity.tenant_hint {
            Some(tenant) => {
                let member: Option<i64> = conn
                    .query_row(
                        "SELECT 1 FROM tenant_members WHERE tenant_id = ?1 AND user_id = ?2",
                        params![tenant.to_string(), identity.user.to_string()],
                        |row| row.get(0),
                    )
                    .optional()?;
                if member.is_some() {
                    Ok(tenant)
                } else {
                    Err(ResolveError::NotAMember)
                }
            }
            None => {
                let mut stmt =
                    conn.prepare("SELECT tenant_id FROM tenant_members WHERE user_id = ?1")?;
                let mut rows = stmt.query(params![identity.user.to_string()])?;
                let mut tenants = Vec::new();
                while let Some(row) = rows.next()? {
                    let raw: String = row.get(0)?;
                    tenants.push(raw.parse::<TenantId>().map_err(|err| {
                        ResolveError::Storage(format!("invalid tenant id {raw}: {err}"))
                    })?);
                }
                match tenants.as_slice() {
                    [] => Err(ResolveError::NoMembership),
                    [tenant] => Ok(*tenant),
                    _ => Err(ResolveError::AmbiguousTenant),
                }
            }
        }
    }

    /// Register a membership. Used by seeding and tests; production
    /// memberships are provisioned by external tenant management.
    pub fn add_member(&self, tenant: TenantId, user: UserId) -> Result<(), ResolveError> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT OR IGNORE INTO tenant_members (tenant_id, user_id) VALUES (?1, ?2)",
            params![tenant.to_string(), user.to_string()],
        )?;
        Ok(())
    }
}
