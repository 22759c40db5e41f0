//! Local axum server for driving the real HTTP clients in tests.
//!
//! Every request lands in a single fallback handler, is recorded so tests
//! can assert on paths, headers and bodies, and is answered by the
//! test-supplied routing function.

use std::sync::{Arc, Mutex, PoisonError};

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A request as the stub received it.
#[derive(Debug, Clone)]
pub struct StubRequest {
    pub method: String,
    /// Path including the query string.
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl StubRequest {
    /// Path without the query string.
    #[must_use]
    pub fn path(&self) -> &str {
        self.target
            .split_once('?')
            .map_or(self.target.as_str(), |(path, _)| path)
    }

    /// Query string, if any.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.target.split_once('?').map(|(_, query)| query)
    }

    /// Case-insensitive header lookup.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Status and JSON body to answer with.
pub type StubResponse = (u16, String);

type Handler = dyn Fn(&StubRequest, &str) -> StubResponse + Send + Sync;

#[derive(Clone)]
struct StubState {
    base_url: String,
    handler: Arc<Handler>,
    requests: Arc<Mutex<Vec<StubRequest>>>,
}

/// A running stub server.
pub struct HttpStub {
    base_url: String,
    requests: Arc<Mutex<Vec<StubRequest>>>,
    task: JoinHandle<()>,
}

impl HttpStub {
    /// Bind to an ephemeral port and answer with `handler`, which receives
    /// the request and the server's base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn start<F>(handler: F) -> std::io::Result<Self>
    where
        F: Fn(&StubRequest, &str) -> StubResponse + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let base_url = format!("http://{}", listener.local_addr()?);
        let requests = Arc::new(Mutex::new(Vec::new()));

        let state = StubState {
            base_url: base_url.clone(),
            handler: Arc::new(handler),
            requests: Arc::clone(&requests),
        };
        let app = Router::new().fallback(record).with_state(state);

        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "Stub server stopped");
            }
        });

        Ok(Self {
            base_url,
            requests,
            task,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Requests received so far, in arrival order.
    #[must_use]
    pub fn requests(&self) -> Vec<StubRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Drop for HttpStub {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn record(
    State(state): State<StubState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = StubRequest {
        method: method.to_string(),
        target: uri
            .path_and_query()
            .map_or_else(|| uri.path().to_string(), ToString::to_string),
        headers: headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect(),
        body: String::from_utf8_lossy(&body).into_owned(),
    };

    let (status, body) = (state.handler)(&request, &state.base_url);
    state
        .requests
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(request);

    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_streamed_body() {
        let stub = HttpStub::start(|request: &StubRequest, _: &str| {
            (201, format!(r#"{{"echo": {}}}"#, request.body.len()))
        })
        .await
        .unwrap();

        let chunks: Vec<Result<&'static str, std::io::Error>> =
            vec![Ok(r#"{"count":"#), Ok(" 3}")];
        let response = reqwest::Client::new()
            .post(format!("{}/api/upload?dry=1", stub.base_url()))
            .header("X-Trace", "t-1")
            .body(reqwest::Body::wrap_stream(futures::stream::iter(chunks)))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::CREATED);

        let request = stub.requests().into_iter().next().unwrap();
        assert_eq!(request.method, "POST");
        assert_eq!(request.path(), "/api/upload");
        assert_eq!(request.query(), Some("dry=1"));
        assert_eq!(request.header("x-trace"), Some("t-1"));
        assert!(request.header("content-length").is_none());
        assert_eq!(request.body, r#"{"count": 3}"#);
    }

    #[tokio::test]
    async fn test_unknown_status_maps_to_server_error() {
        let stub = HttpStub::start(|_: &StubRequest, _: &str| (42, String::new()))
            .await
            .unwrap();
        let response = reqwest::get(format!("{}/anything", stub.base_url()))
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    }
}
