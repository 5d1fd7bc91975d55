/// Trait contracts for the router's collaborators.
///
/// The core codes against these interfaces, never against concrete backends, so every
/// collaborator can be replaced by a stub in tests.
use async_trait::async_trait;

use crate::errors::{BackendError, RouterError};
use crate::model::*;

// ============================================================
// Agent handlers
// ============================================================

/// Everything a handler gets to see about the request it was dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerRequest {
    /// Intent the Router dispatched on (override or classified).
    pub intent: Intent,
    /// Original message text.
    pub message: String,
    /// Entity identifier extracted by the classifier, if any.
    pub extracted_entity: Option<String>,
    /// Calculation sub-method, if any.
    pub extracted_method: Option<String>,
    /// Every entity the request names (dataset ids in the message plus the extracted
    /// entity), deduplicated, in order of appearance.
    pub referenced_entities: Vec<String>,
}

impl HandlerRequest {
    /// A request with no extracted entity or method.
    pub fn new(intent: Intent, message: impl Into<String>) -> Self {
        Self {
            intent,
            message: message.into(),
            extracted_entity: None,
            extracted_method: None,
            referenced_entities: Vec::new(),
        }
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        let entity = entity.into();
        if !self.referenced_entities.contains(&entity) {
            self.referenced_entities.push(entity.clone());
        }
        self.extracted_entity = Some(entity);
        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.extracted_method = Some(method.into());
        self
    }
}

/// A specialized agent that processes one family of intents.
///
/// The Router treats every handler polymorphically through this trait. Handlers are
/// expected to turn their own backend failures into `success: false` responses; an `Err`
/// is reserved for conditions the handler cannot express as a reply.
#[async_trait]
pub trait AgentHandler: Send + Sync {
    /// Name reported as `agentUsed`.
    fn name(&self) -> &str;

    /// Handle one dispatched request.
    async fn handle(&self, request: HandlerRequest) -> Result<AgentResponse, RouterError>;
}

// ============================================================
// Backend client
// ============================================================

/// Transport to a downstream compute backend, consumed by the invocation proxy.
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Existence/permission check for a backend.
    async fn check_exists(&self, backend_id: &str) -> Result<BackendIdentity, BackendError>;

    /// Perform one call against a backend.
    async fn call(
        &self,
        backend_id: &str,
        request: &InvocationRequest,
    ) -> Result<BackendReply, BackendError>;
}

// ============================================================
// Collection store
// ============================================================

/// Read-only lookup of the collection a session is bound to.
#[async_trait]
pub trait CollectionStore: Send + Sync {
    /// The active collection for a session, if one is bound.
    async fn get_active_collection(
        &self,
        session_id: &str,
    ) -> Result<Option<ActiveCollection>, RouterError>;
}
