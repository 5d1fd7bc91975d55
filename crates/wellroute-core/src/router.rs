//! Top-level request router.
//!
//! One sequential flow per request:
//! 1. Explicit agent override, or the classifier (with an entity hint from history)
//! 2. Scope gate for well-data intents when the session is bound to a collection
//! 3. Exactly one handler, plus the map integration for natural-language answers
//! 4. One envelope out, whatever happened. `route` never returns an error.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use tracing::{error, info};

use wellroute_types::errors::RouterError;
use wellroute_types::model::{
    ActiveCollection, AgentResponse, ClassificationResult, ConversationTurn, Intent,
    RoutingPath, ScopeDecision, SessionContext, StepStatus, ThoughtStep, TurnRole,
};
use wellroute_types::traits::{AgentHandler, HandlerRequest};

use crate::agents::MapIntegration;
use crate::classifier::Classifier;
use crate::scope::ScopeGuard;

/// `agentUsed` of envelopes produced by the Router's error boundary.
pub const ROUTER_ERROR_AGENT: &str = "router_error";

/// `agentUsed` of approval requests.
pub const SCOPE_GUARD_AGENT: &str = "scope_guard";

pub struct Router {
    classifier: Classifier,
    scope_guard: ScopeGuard,
    handlers: HashMap<Intent, Arc<dyn AgentHandler>>,
    map: MapIntegration,
}

impl Router {
    pub fn new(classifier: Classifier, scope_guard: ScopeGuard) -> Self {
        Self {
            classifier,
            scope_guard,
            handlers: HashMap::new(),
            map: MapIntegration,
        }
    }

    /// Register the handler for `intent`, replacing any previous one.
    pub fn register(&mut self, intent: Intent, handler: Arc<dyn AgentHandler>) {
        info!(intent = %intent, agent = handler.name(), "registered agent handler");
        self.handlers.insert(intent, handler);
    }

    pub fn with_handler(mut self, intent: Intent, handler: Arc<dyn AgentHandler>) -> Self {
        self.register(intent, handler);
        self
    }

    pub fn has_handler(&self, intent: Intent) -> bool {
        self.handlers.contains_key(&intent)
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Route one message to exactly one handler and return its envelope.
    pub async fn route(
        &self,
        message: &str,
        history: &[ConversationTurn],
        context: Option<&SessionContext>,
    ) -> AgentResponse {
        let default_context = SessionContext::default();
        let context = context.unwrap_or(&default_context);
        let hint = self.history_hint(history);

        let (path, classification) = match context.override_intent() {
            Some(intent) => (
                RoutingPath::ExplicitOverride,
                self.classifier.overridden(intent, message, hint.as_deref()),
            ),
            None => (
                RoutingPath::Classifier,
                self.classifier.classify(message, hint.as_deref()),
            ),
        };

        info!(
            routed_by = ?path,
            intent = %classification.intent,
            confidence_score = classification.confidence_score,
            entity = ?classification.extracted_entity,
            method = ?classification.extracted_method,
            "routing request"
        );

        let mut steps = vec![detection_step(path, &classification)];
        let mut response = match self
            .dispatch(message, &classification, context, &mut steps)
            .await
        {
            Ok(response) => response,
            Err(err) => {
                error!(
                    intent = %classification.intent,
                    error_kind = err.kind(),
                    error = %err,
                    "request failed at the router boundary"
                );
                AgentResponse::failed(ROUTER_ERROR_AGENT, err.user_message())
            }
        };

        steps.append(&mut response.thought_steps);
        response.thought_steps = steps;
        response.routed_by = Some(path);
        response
    }

    async fn dispatch(
        &self,
        message: &str,
        classification: &ClassificationResult,
        context: &SessionContext,
        steps: &mut Vec<ThoughtStep>,
    ) -> Result<AgentResponse, RouterError> {
        let intent = classification.intent;
        let referenced = self.referenced_entities(message, classification);

        if intent.touches_well_data() {
            if let Some(collection) = &context.active_collection {
                let decision = self.scope_guard.check(&referenced, Some(collection));
                if !decision.allowed {
                    info!(
                        collection_id = %collection.id,
                        out_of_scope = decision.out_of_scope_entity_ids.len(),
                        "request needs scope approval"
                    );
                    return Ok(approval_response(collection, decision));
                }
                steps.push(ThoughtStep::new(
                    "scope_check",
                    "Collection scope",
                    format!("Request stays within collection \"{}\"", collection.name),
                    StepStatus::Complete,
                ));
            }
        }

        let handler = self
            .handlers
            .get(&intent)
            .cloned()
            .ok_or_else(|| RouterError::NoHandler(intent.to_string()))?;

        let request = HandlerRequest {
            intent,
            message: message.to_string(),
            extracted_entity: classification.extracted_entity.clone(),
            extracted_method: classification.extracted_method.clone(),
            referenced_entities: referenced,
        };

        // Run on its own task so a panicking handler becomes an error envelope.
        let agent = handler.name().to_string();
        let response = tokio::spawn(async move { handler.handle(request).await })
            .await
            .map_err(|e| RouterError::Internal(format!("handler '{agent}' did not complete: {e}")))??;

        if intent == Intent::NaturalLanguage {
            Ok(self.map.attach(response))
        } else {
            Ok(response)
        }
    }

    /// Entity from the most recent user turn that names one.
    fn history_hint(&self, history: &[ConversationTurn]) -> Option<String> {
        history
            .iter()
            .rev()
            .filter(|turn| turn.role == TurnRole::User)
            .find_map(|turn| self.classifier.entities().extract(&turn.content))
    }

    /// Dataset ids in the message plus the extracted entity, deduplicated.
    fn referenced_entities(
        &self,
        message: &str,
        classification: &ClassificationResult,
    ) -> Vec<String> {
        let mut ids = self.classifier.entities().dataset_ids(message);
        if let Some(entity) = &classification.extracted_entity {
            if !ids.iter().any(|id| id.eq_ignore_ascii_case(entity)) {
                ids.push(entity.clone());
            }
        }
        ids
    }
}

fn detection_step(path: RoutingPath, classification: &ClassificationResult) -> ThoughtStep {
    let summary = match path {
        RoutingPath::ExplicitOverride => format!(
            "Explicit agent selection '{}' used; classifier skipped",
            classification.intent
        ),
        RoutingPath::Classifier => format!(
            "Classified as '{}' (score {})",
            classification.intent, classification.confidence_score
        ),
    };
    let summary = match &classification.extracted_entity {
        Some(entity) => format!("{summary}, well {entity}"),
        None => summary,
    };
    ThoughtStep::new("intent_detection", "Intent detection", summary, StepStatus::Complete)
}

fn approval_response(collection: &ActiveCollection, decision: ScopeDecision) -> AgentResponse {
    let prompt = decision.approval_prompt.unwrap_or_default();
    let count = decision.out_of_scope_entity_ids.len();
    let mut response = AgentResponse::completed(SCOPE_GUARD_AGENT, prompt);
    response.artifacts.push(json!({
        "type": "scope_approval",
        "collectionId": collection.id,
        "collectionName": collection.name,
        "outOfScopeEntityIds": decision.out_of_scope_entity_ids,
    }));
    response.with_step(ThoughtStep::new(
        "scope_check",
        "Collection scope",
        format!(
            "{count} requested item(s) outside \"{}\"; waiting for approval",
            collection.name
        ),
        StepStatus::Skipped,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use wellroute_types::model::AgentOverride;

    /// Handler stub that records what it was given.
    struct RecordingHandler {
        name: &'static str,
        calls: AtomicU32,
        last: Mutex<Option<HandlerRequest>>,
    }

    impl RecordingHandler {
        fn new(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                calls: AtomicU32::new(0),
                last: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl AgentHandler for RecordingHandler {
        fn name(&self) -> &str {
            self.name
        }

        async fn handle(&self, request: HandlerRequest) -> Result<AgentResponse, RouterError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some(request);
            Ok(AgentResponse::completed(self.name, "handled"))
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl AgentHandler for FailingHandler {
        fn name(&self) -> &str {
            "failing"
        }

        async fn handle(&self, _: HandlerRequest) -> Result<AgentResponse, RouterError> {
            Err(RouterError::Internal("handler exploded".to_string()))
        }
    }

    struct PanickingHandler;

    #[async_trait]
    impl AgentHandler for PanickingHandler {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn handle(&self, _: HandlerRequest) -> Result<AgentResponse, RouterError> {
            panic!("unexpected state");
        }
    }

    fn router() -> Router {
        Router::new(Classifier::builtin().unwrap(), ScopeGuard::default())
    }

    fn override_context(intent: Intent) -> SessionContext {
        SessionContext {
            explicit_agent_override: Some(AgentOverride::Intent(intent)),
            active_collection: None,
        }
    }

    #[tokio::test]
    async fn test_override_bypasses_classifier() {
        let shale = RecordingHandler::new("shale");
        let viz = RecordingHandler::new("viz");
        let router = router()
            .with_handler(Intent::CalculateShale, shale.clone())
            .with_handler(Intent::Visualization, viz.clone());

        let response = router
            .route(
                "render WELL-001 in minecraft",
                &[],
                Some(&override_context(Intent::CalculateShale)),
            )
            .await;

        assert_eq!(response.agent_used, "shale");
        assert_eq!(response.routed_by, Some(RoutingPath::ExplicitOverride));
        assert_eq!(shale.calls.load(Ordering::SeqCst), 1);
        assert_eq!(viz.calls.load(Ordering::SeqCst), 0);
        assert_eq!(response.thought_steps[0].stage, "intent_detection");
        assert!(response.thought_steps[0].summary.contains("classifier skipped"));
    }

    #[tokio::test]
    async fn test_auto_override_uses_classifier() {
        let viz = RecordingHandler::new("viz");
        let router = router().with_handler(Intent::Visualization, viz.clone());
        let context = SessionContext {
            explicit_agent_override: Some(AgentOverride::Auto),
            active_collection: None,
        };

        let response = router
            .route("build WELL-001 in minecraft", &[], Some(&context))
            .await;
        assert_eq!(response.agent_used, "viz");
        assert_eq!(response.routed_by, Some(RoutingPath::Classifier));
    }

    #[tokio::test]
    async fn test_handler_error_becomes_router_error_envelope() {
        let router = router().with_handler(Intent::ListWells, Arc::new(FailingHandler));
        let response = router.route("list wells", &[], None).await;
        assert!(!response.success);
        assert_eq!(response.agent_used, ROUTER_ERROR_AGENT);
        assert!(response.artifacts.is_empty());
        assert!(response.message.contains("handler exploded"));
        assert_eq!(response.routed_by, Some(RoutingPath::Classifier));
    }

    #[tokio::test]
    async fn test_panicking_handler_never_escapes_route() {
        let router = router().with_handler(Intent::ListWells, Arc::new(PanickingHandler));
        let response = router.route("list wells", &[], None).await;
        assert!(!response.success);
        assert_eq!(response.agent_used, ROUTER_ERROR_AGENT);
        assert!(response.message.contains("panicking"));
    }

    #[tokio::test]
    async fn test_missing_handler_is_router_error() {
        let response = router().route("list wells", &[], None).await;
        assert!(!response.success);
        assert_eq!(response.agent_used, ROUTER_ERROR_AGENT);
        assert!(response.message.contains("list_wells"));
    }

    #[tokio::test]
    async fn test_history_supplies_entity_hint() {
        let porosity = RecordingHandler::new("porosity");
        let router = router().with_handler(Intent::CalculatePorosity, porosity.clone());
        let history = vec![
            ConversationTurn::user("tell me about WELL-005"),
            ConversationTurn {
                role: TurnRole::Assistant,
                content: "WELL-099 is unrelated".to_string(),
            },
        ];

        let response = router
            .route("now calculate porosity", &history, None)
            .await;
        assert!(response.success);
        let request = porosity.last.lock().unwrap().clone().unwrap();
        assert_eq!(request.extracted_entity.as_deref(), Some("WELL-005"));
        assert_eq!(request.extracted_method.as_deref(), Some("density"));
    }

    #[tokio::test]
    async fn test_referenced_entities_include_every_dataset_id() {
        let corr = RecordingHandler::new("corr");
        let router = router().with_handler(Intent::MultiWellCorrelation, corr.clone());
        router
            .route("compare WELL-001 and WELL-009", &[], None)
            .await;
        let request = corr.last.lock().unwrap().clone().unwrap();
        assert_eq!(
            request.referenced_entities,
            vec!["WELL-001".to_string(), "WELL-009".to_string()]
        );
    }
}
