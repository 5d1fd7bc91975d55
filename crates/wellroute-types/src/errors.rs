/// Unified error type for the wellroute request router.
///
/// All crates use this error type for propagation across crate boundaries. Backend
/// clients report the narrower [`BackendError`], which converts into the matching variant.
///
/// Scope violations and classifier fallbacks are not errors and have no variant here:
/// the former is an approval request with `success: true`, the latter always resolves
/// to a default intent.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// Backend identifier missing or empty.
    #[error("backend is not configured: {detail}")]
    Configuration {
        /// Name of the setting that must be provided.
        setting: String,
        /// What was missing.
        detail: String,
    },

    /// Backend is not deployed under the configured identifier.
    #[error("backend '{backend_id}' was not found: {detail}")]
    BackendNotFound {
        /// Identifier that was looked up.
        backend_id: String,
        /// Backend-reported reason.
        detail: String,
    },

    /// Caller lacks a grant required to reach the backend.
    #[error("permission denied (requires {grant}): {detail}")]
    Permission {
        /// Exact grant that must be added.
        grant: String,
        /// Backend-reported reason.
        detail: String,
    },

    /// Backend passed validation but the call itself failed.
    #[error("backend invocation failed [{correlation_id}]: {message}")]
    BackendInvocation {
        /// Original failure message.
        message: String,
        /// Correlation id of the failed call.
        correlation_id: String,
    },

    /// Error from configuration loading or validation.
    #[error("config error: {0}")]
    Config(String),

    /// No handler is registered for the selected intent.
    #[error("no handler registered for intent '{0}'")]
    NoHandler(String),

    /// Serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Generic internal error for unexpected conditions.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RouterError {
    /// Stable snake_case label for logs and `NormalizedResult::error_kind`.
    pub fn kind(&self) -> &'static str {
        match self {
            RouterError::Configuration { .. } => "configuration_error",
            RouterError::BackendNotFound { .. } => "backend_not_found",
            RouterError::Permission { .. } => "permission_error",
            RouterError::BackendInvocation { .. } => "backend_invocation_error",
            RouterError::Config(_) => "config_error",
            RouterError::NoHandler(_) => "no_handler",
            RouterError::Serialization(_) => "serialization_error",
            RouterError::Internal(_) => "internal_error",
        }
    }

    /// Concrete next step for user-actionable failures.
    pub fn remediation(&self) -> Option<String> {
        match self {
            RouterError::Configuration { setting, .. } => Some(format!(
                "Set {setting} to the deployed backend function name and restart the router."
            )),
            RouterError::BackendNotFound { backend_id, .. } => Some(format!(
                "Deploy the backend stack so that '{backend_id}' exists, then retry the request."
            )),
            RouterError::Permission { grant, .. } => Some(format!(
                "Grant {grant} to the router's execution role, then retry the request."
            )),
            _ => None,
        }
    }

    /// Message suitable for an assistant reply: the error plus its remediation, if any.
    pub fn user_message(&self) -> String {
        match self.remediation() {
            Some(step) => format!("{self}. {step}"),
            None => self.to_string(),
        }
    }
}

/// Classified failure reported by a backend client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The backend identifier could not be resolved from configuration.
    #[error("{setting} is not set")]
    NotConfigured { setting: String },

    /// The backend does not exist.
    #[error("{backend_id} does not exist")]
    NotFound { backend_id: String },

    /// The caller is not allowed to reach the backend.
    #[error("access denied: {detail}")]
    PermissionDenied { grant: String, detail: String },

    /// Transport or backend failure during a call.
    #[error("{0}")]
    Invocation(String),
}

impl BackendError {
    /// Convert into the router-wide taxonomy, attaching the correlation id for call failures.
    pub fn into_router_error(self, backend_id: &str, correlation_id: &str) -> RouterError {
        match self {
            BackendError::NotConfigured { setting } => RouterError::Configuration {
                detail: format!("{setting} is not set"),
                setting,
            },
            BackendError::NotFound { backend_id: id } => RouterError::BackendNotFound {
                detail: format!("{id} does not exist"),
                backend_id: id,
            },
            BackendError::PermissionDenied { grant, detail } => {
                RouterError::Permission { grant, detail }
            }
            BackendError::Invocation(message) => RouterError::BackendInvocation {
                message: format!("{backend_id}: {message}"),
                correlation_id: correlation_id.to_string(),
            },
        }
    }
}

impl From<serde_json::Error> for RouterError {
    fn from(err: serde_json::Error) -> Self {
        RouterError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for RouterError {
    fn from(err: serde_yaml::Error) -> Self {
        RouterError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_error_names_grant_in_user_message() {
        let err = BackendError::PermissionDenied {
            grant: "lambda:InvokeFunction on petro-calc".to_string(),
            detail: "AccessDeniedException".to_string(),
        }
        .into_router_error("petro-calc", "");
        let msg = err.user_message();
        assert!(msg.contains("lambda:InvokeFunction on petro-calc"), "{msg}");
        assert_eq!(err.kind(), "permission_error");
    }

    #[test]
    fn test_not_configured_names_setting() {
        let err = BackendError::NotConfigured {
            setting: "PETROPHYSICS_CALCULATOR_FUNCTION_NAME".to_string(),
        }
        .into_router_error("", "");
        assert_eq!(err.kind(), "configuration_error");
        let msg = err.user_message();
        assert!(msg.contains("Set PETROPHYSICS_CALCULATOR_FUNCTION_NAME"), "{msg}");
    }

    #[test]
    fn test_invocation_error_carries_correlation_id() {
        let err = BackendError::Invocation("socket closed".to_string())
            .into_router_error("petro-calc", "corr-42");
        match &err {
            RouterError::BackendInvocation {
                message,
                correlation_id,
            } => {
                assert_eq!(correlation_id, "corr-42");
                assert!(message.contains("socket closed"));
            }
            other => panic!("expected BackendInvocation, got {other:?}"),
        }
        assert!(err.remediation().is_none());
    }

    #[test]
    fn test_not_found_remediation_mentions_deployment() {
        let err = BackendError::NotFound {
            backend_id: "viz-backend".to_string(),
        }
        .into_router_error("viz-backend", "");
        assert!(err.user_message().contains("Deploy the backend stack"));
    }
}
