//! REST implementation of [`Backend`].

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, instrument};

use stowage_core::{CommitLine, Document, DocumentId, DocumentKind, Warehouse, WarehouseId};

use super::Backend;
use super::wire::{ApproveRequest, InvoiceResponse, OrderResponse, WarehouseResponse};
use crate::{BackendConfig, ClientError};

/// Marker the backend puts in `message` when a 2xx response is a failure.
const ERROR_MARKER: &str = "[ERROR]";

/// Warehouse backend client.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct HttpBackend {
    inner: Arc<HttpBackendInner>,
}

struct HttpBackendInner {
    client: reqwest::Client,
    /// Base URL without a trailing slash.
    base_url: String,
    token: Option<SecretString>,
}

impl HttpBackend {
    /// Create a backend client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Http` if the HTTP client cannot be built.
    pub fn new(config: &BackendConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(HttpBackendInner {
                client,
                base_url: config.api_url.as_str().trim_end_matches('/').to_string(),
                token: config.api_token.clone(),
            }),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.inner.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.inner.token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self
            .authorize(self.inner.client.get(self.endpoint(path)))
            .send()
            .await?;
        let body = read_body(response, path).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<(), ClientError> {
        let response = self
            .authorize(self.inner.client.post(self.endpoint(path)).json(body))
            .send()
            .await?;
        read_body(response, path).await?;
        Ok(())
    }
}

impl Backend for HttpBackend {
    #[instrument(skip_all, fields(%kind, %id))]
    async fn fetch_document(
        &self,
        kind: DocumentKind,
        id: DocumentId,
    ) -> Result<Document, ClientError> {
        let document = match kind {
            DocumentKind::Invoice => self
                .get_json::<InvoiceResponse>(&format!("invoice/id/{id}"))
                .await?
                .into_document(id),
            DocumentKind::Order => self
                .get_json::<OrderResponse>(&format!("order/{id}"))
                .await?
                .into_document(id),
        };
        debug!(lines = document.lines.len(), "Fetched document");
        Ok(document)
    }

    #[instrument(skip_all, fields(%id))]
    async fn fetch_warehouse(&self, id: WarehouseId) -> Result<Warehouse, ClientError> {
        let warehouses: Vec<WarehouseResponse> = self.get_json("storage/").await?;
        let warehouse = warehouses
            .into_iter()
            .find(|warehouse| warehouse.id == id.as_i32())
            .map(Warehouse::from)
            .ok_or(ClientError::WarehouseNotFound(id))?;
        debug!(cells = warehouse.cells.len(), "Fetched warehouse");
        Ok(warehouse)
    }

    #[instrument(skip_all, fields(%kind, %id, lines = lines.len()))]
    async fn approve_distribution(
        &self,
        kind: DocumentKind,
        id: DocumentId,
        lines: &[CommitLine],
    ) -> Result<(), ClientError> {
        let path = match kind {
            DocumentKind::Invoice => "invoice/approve",
            DocumentKind::Order => "order/approve",
        };
        self.post_json(
            path,
            &ApproveRequest {
                id: id.to_string(),
                products: lines,
            },
        )
        .await
    }
}

/// Map the response status to an error, or return the body text.
async fn read_body(response: reqwest::Response, path: &str) -> Result<String, ClientError> {
    let status = response.status();

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        let text = response.text().await.unwrap_or_default();
        return Err(ClientError::Unauthorized(if text.is_empty() {
            status.to_string()
        } else {
            text
        }));
    }

    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(ClientError::NotFound(path.to_string()));
    }

    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    if !status.is_success() {
        return Err(ClientError::Api {
            status: status.as_u16(),
            message: text,
        });
    }

    check_error_marker(status.as_u16(), &text)?;
    Ok(text)
}

/// The backend sometimes reports failures with a 2xx status and a
/// `message` containing [`ERROR_MARKER`].
fn check_error_marker(status: u16, body: &str) -> Result<(), ClientError> {
    error_marker_message(body).map_or(Ok(()), |message| {
        Err(ClientError::Api { status, message })
    })
}

/// The `message` of a JSON body if it carries [`ERROR_MARKER`].
pub(crate) fn error_marker_message(body: &str) -> Option<String> {
    let value = serde_json::from_str::<serde_json::Value>(body).ok()?;
    value
        .get("message")
        .and_then(serde_json::Value::as_str)
        .filter(|message| message.contains(ERROR_MARKER))
        .map(str::to_string)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_marker_detected() {
        let err = check_error_marker(200, r#"{"message": "[ERROR] -> [POST] -> /invoice/approve"}"#)
            .unwrap_err();
        assert!(matches!(err, ClientError::Api { status: 200, .. }));
    }

    #[test]
    fn test_error_marker_ignores_plain_bodies() {
        assert!(check_error_marker(200, r#"{"message": "ok"}"#).is_ok());
        assert!(check_error_marker(200, "[1, 2]").is_ok());
        assert!(check_error_marker(200, "").is_ok());
    }

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let config = BackendConfig::new(url::Url::parse("https://backend.test/api/").unwrap());
        let backend = HttpBackend::new(&config).unwrap();
        assert_eq!(backend.endpoint("/storage/"), "https://backend.test/api/storage/");
        assert_eq!(
            backend.endpoint("invoice/id/4"),
            "https://backend.test/api/invoice/id/4"
        );
    }
}
