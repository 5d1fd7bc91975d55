//! Validated, cached, logged invocation of downstream compute backends.
//!
//! Per backend the proxy moves through a two-state machine:
//! - `UNVALIDATED` (no cache entry): the next call runs an existence/permission check first.
//!   A failed check returns a classified failure and leaves no entry behind.
//! - `VALIDATED` (cache entry present): calls go straight to the backend for the rest of the
//!   process lifetime.
//!
//! Concurrent first calls for the same backend may each run the check. Duplicate checks are
//! idempotent, so no single-flight guard is taken.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use wellroute_types::errors::RouterError;
use wellroute_types::model::{
    BackendReply, InvocationRequest, InvocationValidationState, NormalizedResult, ThoughtStep,
};
use wellroute_types::traits::BackendClient;

/// Retries are not attempted; the field is logged so dashboards keep a stable shape.
const RETRY_COUNT: u32 = 0;

/// Error kind reported when the backend answered but flagged its own result as failed.
pub const BACKEND_REPORTED_FAILURE: &str = "backend_reported_failure";

/// Wraps a [`BackendClient`] with cached pre-flight validation and structured call logs.
///
/// Constructed once at startup and shared by reference (`Arc`) with every agent that
/// reaches a backend. The validation cache lives inside the instance; there is no global state.
pub struct InvocationProxy {
    client: Arc<dyn BackendClient>,
    validations: RwLock<HashMap<String, InvocationValidationState>>,
}

impl InvocationProxy {
    pub fn new(client: Arc<dyn BackendClient>) -> Self {
        Self {
            client,
            validations: RwLock::new(HashMap::new()),
        }
    }

    /// Call `operation` on `backend_id` and normalize the outcome.
    ///
    /// Never returns an error: configuration, deployment, permission and call failures all
    /// come back as `success: false` with the remediation step in the message.
    pub async fn invoke(
        &self,
        backend_id: &str,
        operation: &str,
        parameters: Value,
    ) -> NormalizedResult {
        if let Err(err) = self.ensure_validated(backend_id).await {
            warn!(
                backend_id = %backend_id,
                operation = %operation,
                error_kind = err.kind(),
                error = %err,
                "backend validation failed, call not attempted"
            );
            return NormalizedResult::failure(err.user_message(), err.kind(), "");
        }

        self.call(backend_id, operation, parameters).await
    }

    /// Run the existence/permission check for `backend_id`, caching a success.
    ///
    /// Always consults the backend, even when an entry is already cached.
    pub async fn validate(
        &self,
        backend_id: &str,
    ) -> Result<InvocationValidationState, RouterError> {
        if backend_id.trim().is_empty() {
            return Err(RouterError::Configuration {
                setting: "backend_id".to_string(),
                detail: "no backend identifier was supplied".to_string(),
            });
        }

        debug!(backend_id = %backend_id, "validating backend");
        let identity = self
            .client
            .check_exists(backend_id)
            .await
            .map_err(|e| e.into_router_error(backend_id, ""))?;

        if !identity.exists {
            return Err(RouterError::BackendNotFound {
                backend_id: backend_id.to_string(),
                detail: "the backend reported that it does not exist".to_string(),
            });
        }

        let state = InvocationValidationState {
            validated: true,
            function_arn: identity.identity,
            validated_at_epoch_ms: Utc::now().timestamp_millis(),
        };
        self.validations
            .write()
            .await
            .insert(backend_id.to_string(), state.clone());

        info!(
            backend_id = %backend_id,
            function_arn = ?state.function_arn,
            "backend validated"
        );
        Ok(state)
    }

    /// Cached validation for `backend_id`, if it has been validated.
    pub async fn validation_state(&self, backend_id: &str) -> Option<InvocationValidationState> {
        self.validations.read().await.get(backend_id).cloned()
    }

    async fn ensure_validated(
        &self,
        backend_id: &str,
    ) -> Result<InvocationValidationState, RouterError> {
        if let Some(state) = self.validation_state(backend_id).await {
            info!(
                backend_id = %backend_id,
                validated_at_epoch_ms = state.validated_at_epoch_ms,
                "using cached validation"
            );
            return Ok(state);
        }
        self.validate(backend_id).await
    }

    async fn call(&self, backend_id: &str, operation: &str, parameters: Value) -> NormalizedResult {
        let request = InvocationRequest {
            correlation_id: Uuid::new_v4().to_string(),
            operation: operation.to_string(),
            parameters,
        };
        let payload_size = serde_json::to_vec(&request).map(|b| b.len()).unwrap_or(0);

        info!(
            correlation_id = %request.correlation_id,
            timestamp = %Utc::now().to_rfc3339(),
            payload_size,
            backend_id = %backend_id,
            operation = %operation,
            "invoking backend"
        );

        let started = Instant::now();
        let outcome = match self.client.call(backend_id, &request).await {
            Ok(reply) => normalize_reply(backend_id, reply, &request),
            Err(e) => Err(e.into_router_error(backend_id, &request.correlation_id)),
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(result) => {
                info!(
                    correlation_id = %request.correlation_id,
                    backend_id = %backend_id,
                    operation = %operation,
                    elapsed_ms,
                    success = result.success,
                    artifact_count = result.artifacts.len(),
                    thought_step_count = result.thought_steps.len(),
                    retry_count = RETRY_COUNT,
                    "backend call completed"
                );
                result
            }
            Err(err) => {
                error!(
                    correlation_id = %request.correlation_id,
                    backend_id = %backend_id,
                    operation = %operation,
                    elapsed_ms,
                    error_kind = err.kind(),
                    retry_count = RETRY_COUNT,
                    error = %err,
                    "backend call failed"
                );
                NormalizedResult::failure(err.user_message(), err.kind(), request.correlation_id)
            }
        }
    }
}

/// Turn a raw backend reply into a [`NormalizedResult`].
///
/// Payloads may arrive as JSON or as a JSON-encoded string. Recognized fields are
/// `success`, `message`, `artifacts` and `thoughtSteps`; the full payload is kept.
fn normalize_reply(
    backend_id: &str,
    reply: BackendReply,
    request: &InvocationRequest,
) -> Result<NormalizedResult, RouterError> {
    if !(200..300).contains(&reply.status_code) {
        return Err(RouterError::BackendInvocation {
            message: format!(
                "{backend_id} returned status {}: {}",
                reply.status_code,
                summarize(&reply.payload)
            ),
            correlation_id: request.correlation_id.clone(),
        });
    }

    let payload = match reply.payload {
        Value::String(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
        other => other,
    };

    let success = payload
        .get("success")
        .and_then(Value::as_bool)
        .unwrap_or(true);
    let message = payload
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string);

    if !success {
        let message = message.unwrap_or_else(|| format!("{} failed", request.operation));
        return Ok(NormalizedResult::failure(
            message,
            BACKEND_REPORTED_FAILURE,
            request.correlation_id.clone(),
        ));
    }

    let artifacts = payload
        .get("artifacts")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let thought_steps = payload
        .get("thoughtSteps")
        .cloned()
        .and_then(|steps| serde_json::from_value::<Vec<ThoughtStep>>(steps).ok())
        .unwrap_or_default();

    Ok(NormalizedResult {
        success: true,
        message: message.unwrap_or_else(|| format!("{} completed", request.operation)),
        artifacts,
        thought_steps,
        correlation_id: request.correlation_id.clone(),
        error_kind: None,
        payload,
    })
}

fn summarize(payload: &Value) -> String {
    let text = match payload {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if text.chars().count() > 200 {
        let head: String = text.chars().take(200).collect();
        format!("{head}...")
    } else {
        text
    }
}
