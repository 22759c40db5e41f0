//! Backend JSON shapes and their conversion into core types.
//!
//! Field names follow the backend; everything not listed is ignored.

use serde::{Deserialize, Serialize};

use stowage_core::{
    CellId, CellRef, CommitLine, Document, DocumentId, DocumentKind, DocumentLine, ProductId,
    RackId, RowId, Warehouse, WarehouseId,
};

/// `GET /invoice/id/{id}`
#[derive(Debug, Deserialize)]
pub struct InvoiceResponse {
    #[serde(default)]
    pub products: Vec<InvoiceLine>,
    #[serde(rename = "storageId", default)]
    pub storage_id: Option<i32>,
}

/// A product line on an invoice. `id` is the line id, which is also the
/// product id the backend expects in the approved distribution.
#[derive(Debug, Deserialize)]
pub struct InvoiceLine {
    pub id: i32,
    #[serde(rename = "productId")]
    pub product_id: i32,
    pub count: u32,
}

/// `GET /order/{id}`
#[derive(Debug, Deserialize)]
pub struct OrderResponse {
    #[serde(default)]
    pub products: Vec<OrderLine>,
    #[serde(default)]
    pub storage_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct OrderLine {
    #[serde(rename = "productId")]
    pub product_id: i32,
    pub count: u32,
}

/// One element of `GET /storage/`.
#[derive(Debug, Deserialize)]
pub struct WarehouseResponse {
    pub id: i32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cells: Vec<CellResponse>,
}

#[derive(Debug, Deserialize)]
pub struct CellResponse {
    pub id: i32,
    #[serde(default)]
    pub name: String,
    /// Label code of the cell.
    #[serde(default)]
    pub article: String,
    pub rack: i32,
    pub row: i32,
}

/// Body of `POST /invoice/approve` and `POST /order/approve`.
#[derive(Debug, Serialize)]
pub struct ApproveRequest<'a> {
    pub id: String,
    pub products: &'a [CommitLine],
}

impl InvoiceResponse {
    #[must_use]
    pub fn into_document(self, id: DocumentId) -> Document {
        Document {
            id,
            kind: DocumentKind::Invoice,
            warehouse_id: self.storage_id.map(WarehouseId::new),
            lines: merge_lines(
                self.products
                    .iter()
                    .map(|line| (ProductId::new(line.id), line.count)),
            ),
        }
    }
}

impl OrderResponse {
    #[must_use]
    pub fn into_document(self, id: DocumentId) -> Document {
        Document {
            id,
            kind: DocumentKind::Order,
            warehouse_id: self.storage_id.map(WarehouseId::new),
            lines: merge_lines(
                self.products
                    .iter()
                    .map(|line| (ProductId::new(line.product_id), line.count)),
            ),
        }
    }
}

impl From<WarehouseResponse> for Warehouse {
    fn from(warehouse: WarehouseResponse) -> Self {
        Self {
            id: WarehouseId::new(warehouse.id),
            name: warehouse.name,
            cells: warehouse.cells.into_iter().map(CellRef::from).collect(),
        }
    }
}

impl From<CellResponse> for CellRef {
    fn from(cell: CellResponse) -> Self {
        Self {
            id: CellId::new(cell.id),
            name: cell.name,
            code: cell.article,
            rack: RackId::new(cell.rack),
            row: RowId::new(cell.row),
        }
    }
}

/// Collapse repeated products into one line, keeping first-seen order.
fn merge_lines(lines: impl Iterator<Item = (ProductId, u32)>) -> Vec<DocumentLine> {
    let mut merged: Vec<DocumentLine> = Vec::new();
    for (product_id, count) in lines {
        match merged.iter_mut().find(|line| line.product_id == product_id) {
            Some(line) => line.required_count = line.required_count.saturating_add(count),
            None => merged.push(DocumentLine::new(product_id, count)),
        }
    }
    merged
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_invoice_uses_line_ids() {
        let invoice: InvoiceResponse = serde_json::from_str(
            r#"{
                "id": "17",
                "type": "incoming",
                "storageId": 3,
                "products": [
                    {"id": 501, "productId": 9, "count": 4, "handled": false, "handled_count": 0},
                    {"id": 502, "productId": 12, "count": 1, "handled": false, "handled_count": 0}
                ]
            }"#,
        )
        .unwrap();

        let document = invoice.into_document(DocumentId::new(17));
        assert_eq!(document.kind, DocumentKind::Invoice);
        assert_eq!(document.warehouse_id, Some(WarehouseId::new(3)));
        assert_eq!(
            document.lines,
            vec![
                DocumentLine::new(ProductId::new(501), 4),
                DocumentLine::new(ProductId::new(502), 1),
            ]
        );
    }

    #[test]
    fn test_invoice_without_products() {
        let invoice: InvoiceResponse = serde_json::from_str(r#"{"id": "1"}"#).unwrap();
        let document = invoice.into_document(DocumentId::new(1));
        assert!(document.lines.is_empty());
        assert!(document.warehouse_id.is_none());
    }

    #[test]
    fn test_order_merges_repeated_products() {
        let order: OrderResponse = serde_json::from_str(
            r#"{
                "id": 8,
                "storage_id": 1,
                "products": [
                    {"id": 1, "orderId": 8, "productId": 40, "count": 2},
                    {"id": 2, "orderId": 8, "productId": 41, "count": 1},
                    {"id": 3, "orderId": 8, "productId": 40, "count": 3}
                ]
            }"#,
        )
        .unwrap();

        let document = order.into_document(DocumentId::new(8));
        assert_eq!(document.lines.len(), 2);
        assert_eq!(document.lines[0], DocumentLine::new(ProductId::new(40), 5));
    }

    #[test]
    fn test_warehouse_cells_take_article_as_code() {
        let warehouse: WarehouseResponse = serde_json::from_str(
            r#"{
                "id": 2, "name": "Main", "city": "Almaty",
                "cells": [{"id": 5, "name": "Cell 5", "article": "A-1-5", "rack": 1, "row": 1, "entites": []}]
            }"#,
        )
        .unwrap();

        let warehouse = Warehouse::from(warehouse);
        assert_eq!(warehouse.cells[0].code, "A-1-5");
        assert_eq!(warehouse.cells[0].rack, RackId::new(1));
    }

    #[test]
    fn test_approve_request_shape() {
        let lines = [CommitLine {
            product_id: ProductId::new(501),
            cell_id: CellId::new(5),
            count: 4,
        }];
        let body = ApproveRequest {
            id: "17".to_string(),
            products: &lines,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({
                "id": "17",
                "products": [{"product_id": 501, "cell_id": 5, "count": 4}]
            })
        );
    }
}
