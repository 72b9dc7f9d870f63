//! Minimal JSON-RPC 2.0 transport used to reach the wallet provider and the
//! account directory gateway.

use super::{error::HttpError, http};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RpcError {
    #[error("endpoint unavailable: {0}")]
    Unavailable(String),
    #[error("remote error {code}: {message}")]
    Remote { code: i64, message: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<HttpError> for RpcError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Parse(message) => Self::InvalidResponse(message),
            other => Self::Unavailable(other.to_string()),
        }
    }
}

#[derive(Serialize)]
struct RpcRequest<'a, P> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    #[serde(default = "Option::default")]
    result: Option<T>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug)]
pub struct JsonRpcClient {
    http: Client,
    endpoint: Url,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    /// # Errors
    /// Returns `HttpError` if the HTTP client cannot be built.
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, HttpError> {
        Ok(Self {
            http: http::build_client(timeout)?,
            endpoint,
            next_id: AtomicU64::new(1),
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Call `method`; a `null` or absent result becomes `None`.
    ///
    /// # Errors
    /// Returns `RpcError` when the endpoint is unreachable, answers with a
    /// JSON-RPC error object, or sends an undecodable body.
    #[instrument(skip(self, params), fields(endpoint = %self.endpoint))]
    pub async fn call<P, T>(&self, method: &str, params: P) -> Result<Option<T>, RpcError>
    where
        P: Serialize + Send + Sync,
        T: DeserializeOwned,
    {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let response: RpcResponse<T> =
            http::post_json(&self.http, self.endpoint.clone(), &request).await?;

        if let Some(error) = response.error {
            debug!(code = error.code, "rpc call returned an error object");
            return Err(RpcError::Remote {
                code: error.code,
                message: error.message,
            });
        }

        Ok(response.result)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::net::TcpListener;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn can_bind_localhost() -> bool {
        TcpListener::bind("127.0.0.1:0").is_ok()
    }

    async fn client_for(server: &MockServer) -> JsonRpcClient {
        let endpoint = Url::parse(&format!("{}/rpc", server.uri())).unwrap();
        JsonRpcClient::new(endpoint, Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn call_returns_result() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rpc"))
            .and(body_partial_json(json!({"jsonrpc": "2.0", "method": "ping"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"jsonrpc": "2.0", "id": 1, "result": "pong"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let result: Option<String> = client.call("ping", json!([])).await.unwrap();
        assert_eq!(result.as_deref(), Some("pong"));
    }

    #[tokio::test]
    async fn null_result_is_none() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"jsonrpc": "2.0", "id": 1, "result": null})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let result: Option<Value> = client.call("ping", json!([])).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn error_object_becomes_remote_error() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {"code": 4001, "message": "User rejected the request."}
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let result: Result<Option<Value>, _> = client.call("ping", json!([])).await;
        assert_eq!(
            result.unwrap_err(),
            RpcError::Remote {
                code: 4001,
                message: "User rejected the request.".to_string()
            }
        );
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_unavailable() {
        let endpoint = Url::parse("http://127.0.0.1:9/rpc").unwrap();
        let client = JsonRpcClient::new(endpoint, Duration::from_millis(500)).unwrap();
        let result: Result<Option<Value>, _> = client.call("ping", json!([])).await;
        assert!(matches!(result, Err(RpcError::Unavailable(_))));
    }
}
