//! Marketplace order relay.
//!
//! Polls the marketplace for recently created orders and recreates each of
//! them in the warehouse backend, resolving marketplace offers to catalog
//! products by article.
//!
//! # Architecture
//!
//! - Two independent schedules: order polling and backend token refresh
//! - The backend token lives in a file ([`TokenStore`]) so it survives
//!   restarts and can be inspected by operators
//! - A failed order is logged and abandons the pass; the next poll starts
//!   over with the same creation window

pub mod marketplace;
pub mod token;

pub use token::TokenStore;

use std::future::Future;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use marketplace::{
    CreateOrderRequest, EntriesPage, MarketplaceOrder, OrderProduct, OrdersPage, PAGE_SIZE,
    ProductLookup,
};

use crate::RelayConfig;
use crate::backend::http::error_marker_message;

/// JSON:API media type the marketplace requires.
const JSON_API: &str = "application/vnd.api+json";

/// Errors that can occur while relaying orders.
#[derive(Debug, Error)]
pub enum RelayError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Token file could not be read or written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No backend token has been stored yet.
    #[error("No backend token at {}", .0.display())]
    MissingToken(PathBuf),

    /// Backend login failed.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The marketplace or the backend answered with an error.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// No catalog product carries this article.
    #[error("No product with article '{0}'")]
    ProductNotFound(String),

    /// The marketplace sent an order we cannot represent.
    #[error("Invalid marketplace order {code}: {reason}")]
    InvalidOrder { code: String, reason: String },

    /// A header value could not be built from configuration.
    #[error("Invalid header value: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),
}

/// Outcome of one polling pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayReport {
    /// Order pages fetched from the marketplace.
    pub pages: u32,
    /// Orders created in the backend.
    pub orders_created: usize,
}

/// Imports marketplace orders into the warehouse backend.
pub struct MarketplaceRelay {
    config: RelayConfig,
    client: reqwest::Client,
    marketplace_headers: HeaderMap,
    tokens: TokenStore,
}

impl MarketplaceRelay {
    /// Create a relay from configuration.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::Http` if the HTTP client cannot be built, or
    /// `RelayError::Header` if the marketplace key is not a valid header.
    pub fn new(config: RelayConfig) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        let mut api_key = HeaderValue::from_str(config.marketplace_api_key.expose_secret())?;
        api_key.set_sensitive(true);
        let mut marketplace_headers = HeaderMap::new();
        marketplace_headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_API));
        marketplace_headers.insert("X-Auth-Token", api_key);

        let tokens = TokenStore::new(
            config.token_file.clone(),
            &config.backend_url,
            config.credentials.clone(),
        );

        Ok(Self {
            config,
            client,
            marketplace_headers,
            tokens,
        })
    }

    #[must_use]
    pub const fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Log in to the backend and store a fresh token.
    ///
    /// # Errors
    ///
    /// See [`TokenStore::refresh`].
    pub async fn refresh_token(&self) -> Result<(), RelayError> {
        self.tokens.refresh(&self.client).await.map(|_| ())
    }

    /// Import every order created within the lookback window.
    ///
    /// # Errors
    ///
    /// Returns the first error of the pass: a failed listing, a missing
    /// backend token, or an order that could not be relayed. Orders created
    /// before the failure stay created.
    #[instrument(skip(self), fields(state = %self.config.order_state))]
    pub async fn run_once(&self) -> Result<RelayReport, RelayError> {
        let now = Utc::now();
        let since = now - self.config.lookback;

        let mut report = RelayReport::default();
        let mut orders = self.fetch_orders(0, since, now).await?;
        report.pages = 1;
        if orders.meta.total_count == 0 {
            debug!("No new marketplace orders");
            return Ok(report);
        }

        let token = self.tokens.read().await?;
        let mut page = 0;

        loop {
            for order in &orders.data {
                if let Err(e) = self.relay_order(order, &token).await {
                    warn!(
                        code = %order.attributes.code,
                        created = report.orders_created,
                        error = %e,
                        "Failed to relay order, abandoning pass"
                    );
                    return Err(e);
                }
                report.orders_created += 1;
            }

            if orders.is_last(page) {
                break;
            }
            page += 1;
            orders = self.fetch_orders(page, since, now).await?;
            report.pages += 1;
        }

        info!(
            pages = report.pages,
            created = report.orders_created,
            "Relay pass finished"
        );
        Ok(report)
    }

    /// Poll and refresh on their own intervals until `shutdown` resolves.
    ///
    /// The token is refreshed before the first poll. A failing tick is
    /// logged and skipped; the next tick starts over.
    pub async fn run_scheduled(&self, shutdown: impl Future<Output = ()>) {
        let mut refresh = tokio::time::interval(self.config.token_refresh_interval);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut poll = tokio::time::interval(self.config.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => {
                    info!("Relay stopping");
                    break;
                }
                _ = refresh.tick() => {
                    if let Err(e) = self.refresh_token().await {
                        error!(error = %e, "Token refresh failed");
                    }
                }
                _ = poll.tick() => {
                    if let Err(e) = self.run_once().await {
                        error!(error = %e, "Order poll failed");
                    }
                }
            }
        }
    }

    async fn fetch_orders(
        &self,
        page: u32,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<OrdersPage, RelayError> {
        let url = format!(
            "{}/v2/orders",
            self.config.marketplace_url.as_str().trim_end_matches('/')
        );
        let response = self
            .client
            .get(url)
            .headers(self.marketplace_headers.clone())
            .query(&[
                ("page[number]", page.to_string()),
                ("page[size]", PAGE_SIZE.to_string()),
                (
                    "filter[orders][creationDate][$ge]",
                    since.timestamp_millis().to_string(),
                ),
                (
                    "filter[orders][creationDate][$le]",
                    until.timestamp_millis().to_string(),
                ),
                ("filter[orders][state]", self.config.order_state.clone()),
            ])
            .send()
            .await?;

        let page_body: OrdersPage = parse(response).await?;
        debug!(
            page,
            orders = page_body.data.len(),
            total = page_body.meta.total_count,
            "Fetched marketplace orders"
        );
        Ok(page_body)
    }

    #[instrument(skip_all, fields(code = %order.attributes.code))]
    async fn relay_order(
        &self,
        order: &MarketplaceOrder,
        token: &SecretString,
    ) -> Result<(), RelayError> {
        let response = self
            .client
            .get(&order.relationships.entries.links.related)
            .headers(self.marketplace_headers.clone())
            .send()
            .await?;
        let entries: EntriesPage = parse(response).await?;

        let mut products = Vec::with_capacity(entries.data.len());
        for entry in &entries.data {
            let product_id = self.lookup_product(entry.article(), token).await?;
            products.push(OrderProduct::new(product_id, entry.attributes.quantity));
        }

        let request = CreateOrderRequest::new(&order.attributes, products).ok_or_else(|| {
            RelayError::InvalidOrder {
                code: order.attributes.code.clone(),
                reason: format!("creation date {} out of range", order.attributes.creation_date),
            }
        })?;

        let response = self
            .client
            .post(self.backend_endpoint("order/create"))
            .bearer_auth(token.expose_secret())
            .json(&request)
            .send()
            .await?;
        check_backend(response).await?;

        debug!(products = request.products.create.len(), "Order created");
        Ok(())
    }

    async fn lookup_product(
        &self,
        article: &str,
        token: &SecretString,
    ) -> Result<stowage_core::ProductId, RelayError> {
        if article.is_empty() {
            return Err(RelayError::ProductNotFound(article.to_string()));
        }

        let response = self
            .client
            .get(self.backend_endpoint(&format!("product/article/{article}")))
            .bearer_auth(token.expose_secret())
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(RelayError::ProductNotFound(article.to_string()));
        }

        let body = check_backend(response).await?;
        // The backend answers an unknown article with an empty body.
        if body.trim().is_empty() || body.trim() == "null" {
            return Err(RelayError::ProductNotFound(article.to_string()));
        }
        let product: ProductLookup = serde_json::from_str(&body)?;
        Ok(product.id)
    }

    fn backend_endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.backend_url.as_str().trim_end_matches('/'),
            path
        )
    }
}

/// Parse a marketplace response, mapping error statuses to `RelayError::Api`.
async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, RelayError> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(RelayError::Api {
            status: status.as_u16(),
            message: text,
        });
    }
    Ok(serde_json::from_str(&text)?)
}

/// Return the body of a successful backend response.
async fn check_backend(response: reqwest::Response) -> Result<String, RelayError> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(RelayError::Api {
            status: status.as_u16(),
            message: text,
        });
    }
    if let Some(message) = error_marker_message(&text) {
        return Err(RelayError::Api {
            status: status.as_u16(),
            message,
        });
    }
    Ok(text)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config() -> RelayConfig {
        let vars = |key: &str| -> Option<String> {
            match key {
                "MARKETPLACE_API_URL" => Some("https://market.test/shop/".to_string()),
                "MARKETPLACE_API_KEY" => Some("mk-8812aa".to_string()),
                "STOWAGE_API_URL" => Some("https://backend.test/api".to_string()),
                "STOWAGE_AUTH" => Some("relay@stowage.test:hunter2".to_string()),
                _ => None,
            }
        };
        RelayConfig::from_vars(&vars).unwrap()
    }

    #[test]
    fn test_relay_builds_from_config() {
        let relay = MarketplaceRelay::new(config()).unwrap();
        assert_eq!(
            relay.backend_endpoint("order/create"),
            "https://backend.test/api/order/create"
        );
        assert_eq!(relay.tokens().path(), std::path::Path::new("token.json"));
        assert!(relay.marketplace_headers.get("X-Auth-Token").unwrap().is_sensitive());
        assert_eq!(relay.marketplace_headers.get(CONTENT_TYPE).unwrap(), JSON_API);
    }

    #[test]
    fn test_invalid_api_key_header() {
        let mut config = config();
        config.marketplace_api_key = SecretString::from("bad\nkey".to_string());
        assert!(matches!(
            MarketplaceRelay::new(config),
            Err(RelayError::Header(_))
        ));
    }

    #[tokio::test]
    async fn test_run_scheduled_stops_on_shutdown() {
        let relay = MarketplaceRelay::new(config()).unwrap();
        relay.run_scheduled(std::future::ready(())).await;
    }
}
