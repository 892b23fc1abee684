use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use chrono::Utc;
use http_body_util::BodyExt;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;

use tally_core::{DocumentId, DocumentKind, PaymentStatus, TenantId, UserId};
use tally_documents::{ParentDocument, SqliteDocumentStore};
use tally_ledger::SqlitePaymentLedger;
use tally_server::tenant::TenantResolver;
use tally_server::{build_router, AppState, PageLimits};

struct TestContext {
    _dir: tempfile::TempDir,
    state: AppState,
    tenant: TenantId,
    user: UserId,
    invoice: DocumentId,
}

fn setup() -> TestContext {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("tally.db");
    let ledger = Arc::new(SqlitePaymentLedger::new(&db).unwrap());
    let resolver = TenantResolver::new(&db).unwrap();

    let tenant = TenantId::new();
    let user = UserId::new();
    resolver.add_member(tenant, user).unwrap();
    let invoice = seed_document(&db, tenant, DocumentKind::Invoice, "INV-1001", dec_str("10000.00"));

    let state = AppState {
        ledger,
        resolver,
        pages: PageLimits {
            default_limit: 50,
            max_limit: 500,
        },
    };
    TestContext {
        _dir: dir,
        state,
        tenant,
        user,
        invoice,
    }
}

fn dec_str(value: &str) -> rust_decimal::Decimal {
    value.parse().unwrap()
}

fn seed_document(
    db: &Path,
    tenant: TenantId,
    kind: DocumentKind,
    reference: &str,
    total: rust_decimal::Decimal,
) -> DocumentId {
    let conn = rusqlite::Connection::open(db).unwrap();
    let id = DocumentId::new();
    SqliteDocumentStore
        .insert(
            &conn,
            &ParentDocument {
                id,
                tenant_id: tenant,
                kind,
                reference: reference.into(),
                total_amount: Some(total),
                outstanding_amount: total,
                payment_status: PaymentStatus::Unpaid,
                updated_at: Utc::now(),
            },
        )
        .unwrap();
    id
}

async fn request(
    state: &AppState,
    method: &str,
    uri: &str,
    user: Option<UserId>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user.to_string());
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = build_router(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn payment_body(invoice: DocumentId, amount: &str) -> Value {
    json!({
        "invoice": invoice.to_string(),
        "amount": amount,
        "payment_method": "wire",
        "payment_date": Utc::now().date_naive().to_string(),
    })
}

#[tokio::test]
async fn health_is_ok() {
    let ctx = setup();
    let (status, body) = request(&ctx.state, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn records_payment_and_reconciles() {
    let ctx = setup();
    let (status, body) = request(
        &ctx.state,
        "POST",
        "/payments",
        Some(ctx.user),
        Some(payment_body(ctx.invoice, "10000.00")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["entity_type"], "invoice");
    assert_eq!(body["entity_reference"], "INV-1001");
    assert_eq!(body["amount"], "10000.00");

    // The parent is settled once the full amount is in.
    let document = ctx
        .state
        .ledger
        .parent_document(ctx.tenant, tally_core::ParentRef::Invoice(ctx.invoice))
        .unwrap()
        .unwrap();
    assert_eq!(document.outstanding_amount, dec!(0));
    assert_eq!(document.payment_status, PaymentStatus::Paid);

    // And the created entry is retrievable by id.
    let id = body["id"].as_str().unwrap().to_string();
    let (status, fetched) = request(
        &ctx.state,
        "GET",
        &format!("/payments/{id}"),
        Some(ctx.user),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], id.as_str());
}

#[tokio::test]
async fn rejects_invalid_amount_with_field_detail() {
    let ctx = setup();
    let (status, body) = request(
        &ctx.state,
        "POST",
        "/payments",
        Some(ctx.user),
        Some(payment_body(ctx.invoice, "0")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_failed");
    assert!(body["fields"]["amount"].is_string());
}

#[tokio::test]
async fn rejects_multiple_parent_references() {
    let ctx = setup();
    let mut body = payment_body(ctx.invoice, "100.00");
    body["sales_order"] = Value::String(DocumentId::new().to_string());
    let (status, body) = request(&ctx.state, "POST", "/payments", Some(ctx.user), Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["parent"].is_string());
}

#[tokio::test]
async fn requires_an_identity() {
    let ctx = setup();
    let (status, body) = request(
        &ctx.state,
        "POST",
        "/payments",
        None,
        Some(payment_body(ctx.invoice, "100.00")),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn cross_tenant_create_is_forbidden() {
    let ctx = setup();
    let outsider = UserId::new();
    ctx.state.resolver.add_member(TenantId::new(), outsider).unwrap();

    let (status, body) = request(
        &ctx.state,
        "POST",
        "/payments",
        Some(outsider),
        Some(payment_body(ctx.invoice, "100.00")),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "tenant_mismatch");

    // The owner's document is untouched.
    let document = ctx
        .state
        .ledger
        .parent_document(ctx.tenant, tally_core::ParentRef::Invoice(ctx.invoice))
        .unwrap()
        .unwrap();
    assert_eq!(document.payment_status, PaymentStatus::Unpaid);
}

#[tokio::test]
async fn cross_tenant_get_reads_as_missing() {
    let ctx = setup();
    let (_, created) = request(
        &ctx.state,
        "POST",
        "/payments",
        Some(ctx.user),
        Some(payment_body(ctx.invoice, "100.00")),
    )
    .await;
    let id = created["id"].as_str().unwrap().to_string();

    let outsider = UserId::new();
    ctx.state.resolver.add_member(TenantId::new(), outsider).unwrap();
    let (status, body) = request(
        &ctx.state,
        "GET",
        &format!("/payments/{id}"),
        Some(outsider),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn list_filters_by_method_and_paginates() {
    let ctx = setup();
    for (amount, method) in [("100.00", "wire"), ("200.00", "check")] {
        let mut body = payment_body(ctx.invoice, amount);
        body["payment_method"] = Value::String(method.into());
        let (status, _) =
            request(&ctx.state, "POST", "/payments", Some(ctx.user), Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = request(
        &ctx.state,
        "GET",
        "/payments?payment_method=check",
        Some(ctx.user),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payments"].as_array().unwrap().len(), 1);
    assert_eq!(body["payments"][0]["amount"], "200.00");

    let (status, body) = request(
        &ctx.state,
        "GET",
        "/payments?limit=1&offset=1",
        Some(ctx.user),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payments"].as_array().unwrap().len(), 1);
    assert_eq!(body["limit"], 1);
    assert_eq!(body["offset"], 1);
}
