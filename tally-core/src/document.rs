use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::DocumentId;

/// The three kinds of parent financial document a payment can settle
/// against.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    PurchaseOrder,
    SalesOrder,
    Invoice,
}

impl DocumentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKind::PurchaseOrder => "purchase_order",
            DocumentKind::SalesOrder => "sales_order",
            DocumentKind::Invoice => "invoice",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "purchase_order" => Ok(DocumentKind::PurchaseOrder),
            "sales_order" => Ok(DocumentKind::SalesOrder),
            "invoice" => Ok(DocumentKind::Invoice),
            other => Err(format!("unknown document kind: {other}")),
        }
    }
}

/// Reference to exactly one parent financial document. Modeling the
/// reference as a tagged union keeps "more than one parent set" and "no
/// parent set" unrepresentable.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ParentRef {
    PurchaseOrder(DocumentId),
    SalesOrder(DocumentId),
    Invoice(DocumentId),
}

impl ParentRef {
    pub fn new(kind: DocumentKind, id: DocumentId) -> Self {
        match kind {
            DocumentKind::PurchaseOrder => ParentRef::PurchaseOrder(id),
            DocumentKind::SalesOrder => ParentRef::SalesOrder(id),
            DocumentKind::Invoice => ParentRef::Invoice(id),
        }
    }

    pub fn kind(&self) -> DocumentKind {
        match self {
            ParentRef::PurchaseOrder(_) => DocumentKind::PurchaseOrder,
            ParentRef::SalesOrder(_) => DocumentKind::SalesOrder,
            ParentRef::Invoice(_) => DocumentKind::Invoice,
        }
    }

    pub fn document_id(&self) -> DocumentId {
        match self {
            ParentRef::PurchaseOrder(id)
            | ParentRef::SalesOrder(id)
            | ParentRef::Invoice(id) => *id,
        }
    }
}

impl fmt::Display for ParentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind(), self.document_id())
    }
}

/// Settlement state derived from the full payment history of a document.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Partial,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Paid => "paid",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unpaid" => Ok(PaymentStatus::Unpaid),
            "partial" => Ok(PaymentStatus::Partial),
            "paid" => Ok(PaymentStatus::Paid),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}
