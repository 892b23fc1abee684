use std::collections::{BTreeMap, HashMap};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_core::{DocumentId, DocumentKind, ParentRef, PaymentId, PaymentMethod, TenantId, UserId};
use tally_ledger::{NewPayment, PaymentLedger, PaymentQuery, PaymentTransaction};

use crate::app::{AppState, PageLimits};
use crate::error::ApiError;
use crate::tenant::{RequestIdentity, ResolveError};

pub const USER_HEADER: &str = "x-user-id";
pub const TENANT_HEADER: &str = "x-tenant-id";

/// Pull the edge-authenticated identity out of the request headers.
pub fn identity_from_headers(headers: &HeaderMap) -> Result<RequestIdentity, ApiError> {
    let user = headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(ResolveError::MissingIdentity)?
        .parse::<UserId>()
        .map_err(|_| ApiError::from(ResolveError::MissingIdentity))?;
    let tenant_hint = match headers.get(TENANT_HEADER) {
        Some(value) => Some(
            value
                .to_str()
                .ok()
                .and_then(|raw| raw.parse::<TenantId>().ok())
                .ok_or_else(|| ApiError::bad_request("invalid x-tenant-id header"))?,
        ),
        None => None,
    };
    Ok(RequestIdentity { user, tenant_hint })
}

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub purchase_order: Option<DocumentId>,
    pub sales_order: Option<DocumentId>,
    pub invoice: Option<DocumentId>,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub reference_number: Option<String>,
    pub payment_date: NaiveDate,
    pub notes: Option<String>,
}

impl CreatePaymentRequest {
    fn parent_ref(&self) -> Result<ParentRef, ApiError> {
        single_parent(self.purchase_order, self.sales_order, self.invoice)?.ok_or_else(|| {
            ApiError::validation(parent_violation(
                "exactly one of purchase_order, sales_order, invoice must be set",
            ))
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub purchase_order: Option<DocumentId>,
    pub sales_order: Option<DocumentId>,
    pub invoice: Option<DocumentId>,
    pub payment_method: Option<PaymentMethod>,
    #[serde(rename = "payment_date__gte")]
    pub payment_date_gte: Option<NaiveDate>,
    #[serde(rename = "payment_date__lte")]
    pub payment_date_lte: Option<NaiveDate>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl ListQuery {
    fn into_query(self, pages: &PageLimits) -> Result<PaymentQuery, ApiError> {
        let parent = single_parent(self.purchase_order, self.sales_order, self.invoice)?;
        let limit = self
            .limit
            .unwrap_or(pages.default_limit)
            .min(pages.max_limit);
        Ok(PaymentQuery {
            parent,
            method: self.payment_method,
            date_from: self.payment_date_gte,
            date_to: self.payment_date_lte,
            limit: Some(limit),
            offset: self.offset,
        })
    }
}

fn single_parent(
    purchase_order: Option<DocumentId>,
    sales_order: Option<DocumentId>,
    invoice: Option<DocumentId>,
) -> Result<Option<ParentRef>, ApiError> {
    let mut parents = Vec::new();
    if let Some(id) = purchase_order {
        parents.push(ParentRef::PurchaseOrder(id));
    }
    if let Some(id) = sales_order {
        parents.push(ParentRef::SalesOrder(id));
    }
    if let Some(id) = invoice {
        parents.push(ParentRef::Invoice(id));
    }
    if parents.len() > 1 {
        return Err(ApiError::validation(parent_violation(
            "at most one of purchase_order, sales_order, invoice may be set",
        )));
    }
    Ok(parents.pop())
}

fn parent_violation(message: &str) -> BTreeMap<&'static str, String> {
    let mut fields = BTreeMap::new();
    fields.insert("parent", message.to_string());
    fields
}

/// Ledger entry echoed to clients, enriched with the parent's kind label
/// and human-readable reference (a read-side join, not a stored field).
#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub id: PaymentId,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub reference_number: Option<String>,
    pub payment_date: NaiveDate,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<UserId>,
    pub entity_type: DocumentKind,
    pub entity_id: DocumentId,
    pub entity_reference: Option<String>,
}

fn payment_response(entry: PaymentTransaction, entity_reference: Option<String>) -> PaymentResponse {
    PaymentResponse {
        id: entry.id,
        amount: entry.amount,
        payment_method: entry.method,
        reference_number: entry.reference_number,
        payment_date: entry.payment_date,
        notes: entry.notes,
        created_at: entry.created_at,
        created_by: entry.created_by,
        entity_type: entry.parent.kind(),
        entity_id: entry.parent.document_id(),
        entity_reference,
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentListResponse {
    pub payments: Vec<PaymentResponse>,
    pub limit: usize,
    pub offset: usize,
}

async fn run_blocking<T, F>(task: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| ApiError::internal(format!("worker task failed: {err}")))?
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn create_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<PaymentResponse>), ApiError> {
    let identity = identity_from_headers(&headers)?;
    let parent = body.parent_ref()?;
    let response = run_blocking(move || {
        let tenant = state.resolver.resolve(&identity)?;
        let mut draft = NewPayment::new(parent, body.amount, body.payment_method, body.payment_date)
            .with_created_by(identity.user);
        if let Some(reference) = body.reference_number {
            draft = draft.with_reference_number(reference);
        }
        if let Some(notes) = body.notes {
            draft = draft.with_notes(notes);
        }
        let entry = state.ledger.append(tenant, draft)?;
        tracing::info!(payment = %entry.id, parent = %entry.parent, amount = %entry.amount, "payment recorded");
        let reference = parent_reference(&state, tenant, parent)?;
        Ok(payment_response(entry, reference))
    })
    .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn list_payments(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<PaymentListResponse>, ApiError> {
    let identity = identity_from_headers(&headers)?;
    let response = run_blocking(move || {
        let tenant = state.resolver.resolve(&identity)?;
        let query = query.into_query(&state.pages)?;
        let limit = query.limit.unwrap_or(state.pages.default_limit);
        let offset = query.offset.unwrap_or(0);
        let entries = state.ledger.query(tenant, query)?;

        // One join per distinct parent, not per row.
        let mut references: HashMap<ParentRef, Option<String>> = HashMap::new();
        let mut payments = Vec::with_capacity(entries.len());
        for entry in entries {
            let reference = match references.get(&entry.parent) {
                Some(reference) => reference.clone(),
                None => {
                    let reference = parent_reference(&state, tenant, entry.parent)?;
                    references.insert(entry.parent, reference.clone());
                    reference
                }
            };
            payments.push(payment_response(entry, reference));
        }
        Ok(PaymentListResponse {
            payments,
            limit,
            offset,
        })
    })
    .await?;
    Ok(Json(response))
}

pub async fn get_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<PaymentId>,
) -> Result<Json<PaymentResponse>, ApiError> {
    let identity = identity_from_headers(&headers)?;
    let response = run_blocking(move || {
        let tenant = state.resolver.resolve(&identity)?;
        let entry = state
            .ledger
            .get(tenant, id)?
            .ok_or_else(|| ApiError::not_found("payment not found"))?;
        let reference = parent_reference(&state, tenant, entry.parent)?;
        Ok(payment_response(entry, reference))
    })
    .await?;
    Ok(Json(response))
}

fn parent_reference(
    state: &AppState,
    tenant: TenantId,
    parent: ParentRef,
) -> Result<Option<String>, ApiError> {
    Ok(state
        .ledger
        .parent_document(tenant, parent)?
        .map(|document| document.reference))
}
