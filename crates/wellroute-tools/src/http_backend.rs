//! HTTP backend client for a function gateway.
//!
//! Endpoints, relative to `http.base_url`:
//! - `GET  /functions/{name}`: existence/permission check, replies `{"functionArn": ...}`
//! - `POST /functions/{name}/invocations`: one call, body is the invocation request
//!
//! Logical backend names (`petrophysics`, `knowledge`, ...) are resolved to deployed function
//! names per call from the `backends` section of the router config, so a missing env var is
//! reported as a configuration error on first use rather than at startup.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use wellroute_types::config::{BackendConfig, RouterConfig};
use wellroute_types::errors::{BackendError, RouterError};
use wellroute_types::model::{BackendIdentity, BackendReply, InvocationRequest};
use wellroute_types::traits::BackendClient;

/// Header carrying the per-call correlation id.
pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// [`BackendClient`] over HTTP.
pub struct HttpBackendClient {
    base_url: String,
    backends: BTreeMap<String, BackendConfig>,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FunctionDescription {
    #[serde(default)]
    function_arn: Option<String>,
}

impl HttpBackendClient {
    /// Build a client from the router config.
    ///
    /// Only the connect timeout is always set; the whole-request timeout applies only when
    /// `http.request_timeout_secs` is configured.
    pub fn new(config: &RouterConfig) -> Result<Self, RouterError> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.http.connect_timeout_secs));
        if let Some(secs) = config.http.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| RouterError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.http.base_url.trim_end_matches('/').to_string(),
            backends: config.backends.clone(),
            client,
        })
    }

    /// Deployed function name for a logical backend name.
    pub fn function_name(&self, backend_id: &str) -> Result<String, BackendError> {
        match self.backends.get(backend_id) {
            Some(backend) => backend.resolve(backend_id),
            None => Err(BackendError::NotConfigured {
                setting: format!("backends.{backend_id}"),
            }),
        }
    }

    fn function_url(&self, function: &str) -> String {
        format!("{}/functions/{function}", self.base_url)
    }

    fn permission_denied(function: &str, status: reqwest::StatusCode, body: &str) -> BackendError {
        let detail = if body.trim().is_empty() {
            format!("gateway answered {status}")
        } else {
            format!("gateway answered {status}: {}", body.trim())
        };
        BackendError::PermissionDenied {
            grant: format!("lambda:InvokeFunction on {function}"),
            detail,
        }
    }

    fn transport_error(e: reqwest::Error) -> BackendError {
        if e.is_timeout() {
            BackendError::Invocation(format!("request timed out: {e}"))
        } else if e.is_connect() {
            BackendError::Invocation(format!("failed to connect to backend gateway: {e}"))
        } else {
            BackendError::Invocation(format!("HTTP request failed: {e}"))
        }
    }
}

#[async_trait]
impl BackendClient for HttpBackendClient {
    async fn check_exists(&self, backend_id: &str) -> Result<BackendIdentity, BackendError> {
        let function = self.function_name(backend_id)?;
        let url = self.function_url(&function);
        tracing::debug!(backend_id = %backend_id, url = %url, "checking backend function");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(Self::transport_error)?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::Invocation(format!("failed to read response body: {e}")))?;

        match status.as_u16() {
            200..=299 => {
                let description: FunctionDescription =
                    serde_json::from_str(&body).unwrap_or(FunctionDescription { function_arn: None });
                Ok(BackendIdentity {
                    exists: true,
                    identity: description.function_arn,
                })
            }
            404 => Err(BackendError::NotFound {
                backend_id: function,
            }),
            401 | 403 => Err(Self::permission_denied(&function, status, &body)),
            _ => Err(BackendError::Invocation(format!(
                "unexpected status {status} while checking {function}"
            ))),
        }
    }

    async fn call(
        &self,
        backend_id: &str,
        request: &InvocationRequest,
    ) -> Result<BackendReply, BackendError> {
        let function = self.function_name(backend_id)?;
        let url = format!("{}/invocations", self.function_url(&function));

        let response = self
            .client
            .post(&url)
            .header(CORRELATION_HEADER, &request.correlation_id)
            .json(request)
            .send()
            .await
            .map_err(Self::transport_error)?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::Invocation(format!("failed to read response body: {e}")))?;

        if matches!(status.as_u16(), 401 | 403) {
            return Err(Self::permission_denied(&function, status, &body));
        }

        let payload = if body.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&body).unwrap_or(Value::String(body))
        };
        Ok(BackendReply {
            status_code: status.as_u16(),
            payload,
        })
    }
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::net::TcpListener;

    /// Start a test server and return its base URL.
    async fn start_test_server(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn test_config(base_url: &str) -> RouterConfig {
        let mut config = RouterConfig::default();
        config.http.base_url = format!("{base_url}/");
        config.http.connect_timeout_secs = 5;
        config.http.request_timeout_secs = Some(5);
        config.backends.insert(
            "petrophysics".to_string(),
            BackendConfig {
                function_name: Some("petro-calc".to_string()),
                function_name_env: None,
            },
        );
        config
    }

    fn request(operation: &str) -> InvocationRequest {
        InvocationRequest {
            correlation_id: "corr-1".to_string(),
            operation: operation.to_string(),
            parameters: json!({"well_name": "WELL-001"}),
        }
    }

    #[tokio::test]
    async fn test_check_exists_reads_function_arn() {
        let app = Router::new().route(
            "/functions/petro-calc",
            get(|| async {
                Json(json!({"functionArn": "arn:aws:lambda:us-east-1:123:function:petro-calc"}))
            }),
        );
        let base = start_test_server(app).await;
        let client = HttpBackendClient::new(&test_config(&base)).unwrap();

        let identity = client.check_exists("petrophysics").await.unwrap();
        assert!(identity.exists);
        assert_eq!(
            identity.identity.as_deref(),
            Some("arn:aws:lambda:us-east-1:123:function:petro-calc")
        );
    }

    #[tokio::test]
    async fn test_check_exists_classifies_not_found() {
        let app = Router::new();
        let base = start_test_server(app).await;
        let client = HttpBackendClient::new(&test_config(&base)).unwrap();

        let err = client.check_exists("petrophysics").await.unwrap_err();
        assert_eq!(
            err,
            BackendError::NotFound {
                backend_id: "petro-calc".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_check_exists_classifies_permission_denied() {
        let app = Router::new().route(
            "/functions/petro-calc",
            get(|| async { (StatusCode::FORBIDDEN, "AccessDeniedException") }),
        );
        let base = start_test_server(app).await;
        let client = HttpBackendClient::new(&test_config(&base)).unwrap();

        match client.check_exists("petrophysics").await.unwrap_err() {
            BackendError::PermissionDenied { grant, detail } => {
                assert_eq!(grant, "lambda:InvokeFunction on petro-calc");
                assert!(detail.contains("AccessDeniedException"));
            }
            other => panic!("expected PermissionDenied, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_server_error_on_check_is_invocation_error() {
        let app = Router::new().route(
            "/functions/petro-calc",
            get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        );
        let base = start_test_server(app).await;
        let client = HttpBackendClient::new(&test_config(&base)).unwrap();

        let err = client.check_exists("petrophysics").await.unwrap_err();
        assert!(matches!(err, BackendError::Invocation(_)));
    }

    #[tokio::test]
    async fn test_unknown_logical_name_is_not_configured() {
        let client = HttpBackendClient::new(&test_config("http://127.0.0.1:1")).unwrap();
        let err = client.check_exists("seismic").await.unwrap_err();
        assert_eq!(
            err,
            BackendError::NotConfigured {
                setting: "backends.seismic".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_call_posts_request_and_returns_reply() {
        let hits = Arc::new(AtomicU32::new(0));
        let hits_clone = hits.clone();
        let app = Router::new().route(
            "/functions/petro-calc/invocations",
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let hits = hits_clone.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    let correlation = headers
                        .get(CORRELATION_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    Json(json!({
                        "message": format!("ran {}", body["operation"].as_str().unwrap_or("")),
                        "correlation": correlation,
                        "well": body["parameters"]["well_name"],
                    }))
                }
            }),
        );
        let base = start_test_server(app).await;
        let client = HttpBackendClient::new(&test_config(&base)).unwrap();

        let reply = client
            .call("petrophysics", &request("calculate_porosity"))
            .await
            .unwrap();
        assert_eq!(reply.status_code, 200);
        assert_eq!(reply.payload["message"], "ran calculate_porosity");
        assert_eq!(reply.payload["correlation"], "corr-1");
        assert_eq!(reply.payload["well"], "WELL-001");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_call_keeps_non_json_body_as_string() {
        let app = Router::new().route(
            "/functions/petro-calc/invocations",
            post(|| async { (StatusCode::BAD_GATEWAY, "upstream exploded") }),
        );
        let base = start_test_server(app).await;
        let client = HttpBackendClient::new(&test_config(&base)).unwrap();

        let reply = client.call("petrophysics", &request("list_wells")).await.unwrap();
        assert_eq!(reply.status_code, 502);
        assert_eq!(reply.payload, Value::String("upstream exploded".to_string()));
    }

    #[tokio::test]
    async fn test_call_unreachable_gateway_is_invocation_error() {
        // Port 1 is never listening in test environments.
        let client = HttpBackendClient::new(&test_config("http://127.0.0.1:1")).unwrap();
        let err = client
            .call("petrophysics", &request("list_wells"))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Invocation(_)));
    }
}
