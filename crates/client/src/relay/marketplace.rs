//! Marketplace order API payloads and their mapping to backend orders.
//!
//! The marketplace speaks JSON:API: orders come in `data` pages with a
//! `meta` block, and each order links to its entries instead of embedding
//! them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stowage_core::ProductId;

/// Orders requested per page.
pub const PAGE_SIZE: u32 = 100;

/// One page of `GET /v2/orders`.
#[derive(Debug, Deserialize)]
pub struct OrdersPage {
    #[serde(default)]
    pub data: Vec<MarketplaceOrder>,
    pub meta: PageMeta,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total_count: u64,
    #[serde(default)]
    pub page_count: u32,
}

impl OrdersPage {
    /// Whether `page` (zero-based) is the last one worth fetching.
    #[must_use]
    pub fn is_last(&self, page: u32) -> bool {
        self.meta.total_count == 0
            || self.data.is_empty()
            || page.saturating_add(1) >= self.meta.page_count
    }
}

#[derive(Debug, Deserialize)]
pub struct MarketplaceOrder {
    pub attributes: OrderAttributes,
    pub relationships: OrderRelationships,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAttributes {
    pub code: String,
    /// Milliseconds since the Unix epoch.
    pub creation_date: i64,
    pub total_price: Decimal,
    #[serde(default)]
    pub delivery_cost: Decimal,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub customer: Customer,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    #[serde(default)]
    pub cell_phone: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl Customer {
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Deserialize)]
pub struct OrderRelationships {
    pub entries: EntriesRelationship,
}

#[derive(Debug, Deserialize)]
pub struct EntriesRelationship {
    pub links: RelatedLink,
}

#[derive(Debug, Deserialize)]
pub struct RelatedLink {
    pub related: String,
}

/// Response of an order's entries link.
#[derive(Debug, Deserialize)]
pub struct EntriesPage {
    #[serde(default)]
    pub data: Vec<OrderEntry>,
}

#[derive(Debug, Deserialize)]
pub struct OrderEntry {
    pub attributes: EntryAttributes,
}

#[derive(Debug, Deserialize)]
pub struct EntryAttributes {
    pub quantity: u32,
    pub offer: Offer,
}

#[derive(Debug, Deserialize)]
pub struct Offer {
    pub code: String,
}

impl OrderEntry {
    /// Catalog article of the entry: the offer code up to the first `_`.
    #[must_use]
    pub fn article(&self) -> &str {
        article_of(&self.attributes.offer.code)
    }
}

/// Strip the seller suffix from an offer code.
#[must_use]
pub fn article_of(offer_code: &str) -> &str {
    offer_code
        .split_once('_')
        .map_or(offer_code, |(article, _)| article)
}

/// Response of `GET /product/article/{article}`.
#[derive(Debug, Deserialize)]
pub struct ProductLookup {
    pub id: ProductId,
}

/// Body of `POST /order/create`.
#[derive(Debug, Serialize)]
pub struct CreateOrderRequest {
    pub kaspi_code: String,
    pub marketplace_created_at: DateTime<Utc>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub delivery_cost: Decimal,
    pub kaspi_status: String,
    pub customer_phone: String,
    pub customer_name: String,
    pub products: NestedCreate<OrderProduct>,
}

/// Nested-write wrapper the backend expects for relation lists.
#[derive(Debug, Serialize)]
pub struct NestedCreate<T> {
    pub create: Vec<T>,
}

#[derive(Debug, Serialize)]
pub struct OrderProduct {
    pub product: Connect,
    pub count: u32,
}

#[derive(Debug, Serialize)]
pub struct Connect {
    pub connect: ConnectId,
}

#[derive(Debug, Serialize)]
pub struct ConnectId {
    pub id: ProductId,
}

impl OrderProduct {
    #[must_use]
    pub const fn new(product_id: ProductId, count: u32) -> Self {
        Self {
            product: Connect {
                connect: ConnectId { id: product_id },
            },
            count,
        }
    }
}

impl CreateOrderRequest {
    /// Build the backend order for a marketplace order whose entries have
    /// been resolved to catalog products.
    ///
    /// Returns `None` if the creation timestamp is out of range.
    #[must_use]
    pub fn new(attributes: &OrderAttributes, products: Vec<OrderProduct>) -> Option<Self> {
        Some(Self {
            kaspi_code: attributes.code.clone(),
            marketplace_created_at: DateTime::from_timestamp_millis(attributes.creation_date)?,
            total_price: attributes.total_price,
            delivery_cost: attributes.delivery_cost,
            kaspi_status: attributes.status.clone(),
            customer_phone: attributes.customer.cell_phone.clone(),
            customer_name: attributes.customer.full_name(),
            products: NestedCreate { create: products },
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const ORDERS_PAGE: &str = r#"{
        "data": [{
            "id": "MTAyNjQ0MDY0MQ==",
            "attributes": {
                "code": "516780712",
                "creationDate": 1739719580000,
                "totalPrice": 15990.5,
                "deliveryCost": 0,
                "status": "COMPLETED",
                "customer": {"cellPhone": "7011234567", "firstName": "Aigerim", "lastName": "S."}
            },
            "relationships": {
                "entries": {"links": {"related": "https://market.test/v2/orders/1/entries"}}
            }
        }],
        "meta": {"pageCount": 1, "totalCount": 1}
    }"#;

    #[test]
    fn test_article_of() {
        assert_eq!(article_of("100245_7710"), "100245");
        assert_eq!(article_of("100245_7710_b"), "100245");
        assert_eq!(article_of("100245"), "100245");
        assert_eq!(article_of("_x"), "");
    }

    #[test]
    fn test_orders_page_parses() {
        let page: OrdersPage = serde_json::from_str(ORDERS_PAGE).unwrap();
        assert_eq!(page.data.len(), 1);
        assert!(page.is_last(0));

        let order = page.data.first().unwrap();
        assert_eq!(order.attributes.code, "516780712");
        assert_eq!(order.attributes.total_price, Decimal::new(159_905, 1));
        assert_eq!(
            order.relationships.entries.links.related,
            "https://market.test/v2/orders/1/entries"
        );
    }

    #[test]
    fn test_empty_page_is_last() {
        let page: OrdersPage =
            serde_json::from_str(r#"{"data": [], "meta": {"pageCount": 0, "totalCount": 0}}"#)
                .unwrap();
        assert!(page.is_last(0));
    }

    #[test]
    fn test_page_count_bounds_paging() {
        let mut page: OrdersPage = serde_json::from_str(ORDERS_PAGE).unwrap();
        page.meta.page_count = 3;
        page.meta.total_count = 250;
        assert!(!page.is_last(0));
        assert!(!page.is_last(1));
        assert!(page.is_last(2));
    }

    #[test]
    fn test_entry_article() {
        let entries: EntriesPage = serde_json::from_str(
            r#"{"data": [{"attributes": {"quantity": 2, "offer": {"code": "55012_301"}}}]}"#,
        )
        .unwrap();
        let entry = entries.data.first().unwrap();
        assert_eq!(entry.article(), "55012");
        assert_eq!(entry.attributes.quantity, 2);
    }

    #[test]
    fn test_create_order_request_body() {
        let page: OrdersPage = serde_json::from_str(ORDERS_PAGE).unwrap();
        let attributes = &page.data.first().unwrap().attributes;
        let request =
            CreateOrderRequest::new(attributes, vec![OrderProduct::new(ProductId::new(12), 2)])
                .unwrap();

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["kaspi_code"], "516780712");
        assert_eq!(json["marketplace_created_at"], "2025-02-16T15:26:20Z");
        assert_eq!(json["total_price"], 15990.5);
        assert_eq!(json["delivery_cost"], 0.0);
        assert_eq!(json["kaspi_status"], "COMPLETED");
        assert_eq!(json["customer_phone"], "7011234567");
        assert_eq!(json["customer_name"], "Aigerim S.");
        assert_eq!(json["products"]["create"][0]["product"]["connect"]["id"], 12);
        assert_eq!(json["products"]["create"][0]["count"], 2);
    }

    #[test]
    fn test_customer_name_without_last_name() {
        let customer = Customer {
            first_name: "Dana".to_string(),
            ..Customer::default()
        };
        assert_eq!(customer.full_name(), "Dana");
    }
}
