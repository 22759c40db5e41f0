//! Documents whose lines must be placed into (or picked from) cells.

use serde::{Deserialize, Serialize};

use super::id::{DocumentId, ProductId, WarehouseId};

/// Kind of document being distributed.
///
/// Invoices move stock into the warehouse, marketplace orders pick it out.
/// Both are distributed the same way; the kind only selects the backend
/// endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    #[default]
    Invoice,
    Order,
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invoice => write!(f, "invoice"),
            Self::Order => write!(f, "order"),
        }
    }
}

impl std::str::FromStr for DocumentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "invoice" => Ok(Self::Invoice),
            "order" => Ok(Self::Order),
            _ => Err(format!("invalid document kind: {s}")),
        }
    }
}

/// One product on a document and how many units of it must be allocated.
///
/// The required count is the conservation target for the product: a
/// distribution is complete once the allocated units reach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentLine {
    pub product_id: ProductId,
    pub required_count: u32,
}

impl DocumentLine {
    #[must_use]
    pub const fn new(product_id: ProductId, required_count: u32) -> Self {
        Self {
            product_id,
            required_count,
        }
    }
}

/// A document snapshot as delivered by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub kind: DocumentKind,
    /// Warehouse the document is distributed against, when assigned.
    pub warehouse_id: Option<WarehouseId>,
    pub lines: Vec<DocumentLine>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_document_kind_roundtrip() {
        for kind in [DocumentKind::Invoice, DocumentKind::Order] {
            let parsed: DocumentKind = kind.to_string().parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert!("return".parse::<DocumentKind>().is_err());
    }

    #[test]
    fn test_negative_required_count_is_rejected() {
        let result: Result<DocumentLine, _> =
            serde_json::from_str(r#"{"product_id": 1, "required_count": -2}"#);
        assert!(result.is_err());
    }
}
