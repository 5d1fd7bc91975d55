//! End-to-end routing scenarios: real classifier, scope guard, agents and proxy over a
//! stub backend client.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use wellroute_core::agents::register_standard_agents;
use wellroute_core::router::{ROUTER_ERROR_AGENT, SCOPE_GUARD_AGENT};
use wellroute_core::{Classifier, Router, ScopeGuard};
use wellroute_tools::InvocationProxy;
use wellroute_types::errors::BackendError;
use wellroute_types::model::{
    ActiveCollection, AgentOverride, BackendIdentity, BackendReply, ConversationTurn, Intent,
    InvocationRequest, RoutingPath, SessionContext,
};
use wellroute_types::traits::BackendClient;

/// Records every call; existence checks can be scripted to fail.
struct StubBackend {
    checks: AtomicU32,
    calls: AtomicU32,
    check_failures: Mutex<VecDeque<BackendError>>,
    log: Mutex<Vec<(String, InvocationRequest)>>,
    reply: Value,
}

impl StubBackend {
    fn new(reply: Value) -> Arc<Self> {
        Arc::new(Self {
            checks: AtomicU32::new(0),
            calls: AtomicU32::new(0),
            check_failures: Mutex::new(VecDeque::new()),
            log: Mutex::new(Vec::new()),
            reply,
        })
    }

    fn fail_next_check(&self, err: BackendError) {
        self.check_failures.lock().unwrap().push_back(err);
    }

    fn last_call(&self) -> (String, InvocationRequest) {
        self.log.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl BackendClient for StubBackend {
    async fn check_exists(&self, backend_id: &str) -> Result<BackendIdentity, BackendError> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.check_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(BackendIdentity {
            exists: true,
            identity: Some(format!("arn:test:function:{backend_id}")),
        })
    }

    async fn call(
        &self,
        backend_id: &str,
        request: &InvocationRequest,
    ) -> Result<BackendReply, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log
            .lock()
            .unwrap()
            .push((backend_id.to_string(), request.clone()));
        Ok(BackendReply {
            status_code: 200,
            payload: self.reply.clone(),
        })
    }
}

fn build_router(backend: &Arc<StubBackend>) -> Router {
    let proxy = Arc::new(InvocationProxy::new(backend.clone()));
    let mut router = Router::new(Classifier::builtin().unwrap(), ScopeGuard::default());
    register_standard_agents(&mut router, proxy).unwrap();
    router
}

fn ok_backend() -> Arc<StubBackend> {
    StubBackend::new(json!({
        "message": "done",
        "artifacts": [{"type": "result"}]
    }))
}

fn collection_context(members: &[&str]) -> SessionContext {
    SessionContext {
        explicit_agent_override: None,
        active_collection: Some(ActiveCollection {
            id: "col-ns".to_string(),
            name: "North Sea Pilot".to_string(),
            member_entity_ids: members.iter().map(|m| m.to_string()).collect::<BTreeSet<_>>(),
            member_display_names: BTreeMap::new(),
        }),
    }
}

#[tokio::test]
async fn test_porosity_request_end_to_end() {
    let backend = ok_backend();
    let router = build_router(&backend);

    let response = router
        .route("calculate porosity for WELL-001", &[], None)
        .await;

    assert!(response.success, "{}", response.message);
    assert_eq!(response.agent_used, "petrophysics_agent");
    assert_eq!(response.routed_by, Some(RoutingPath::Classifier));
    assert_eq!(response.artifacts, vec![json!({"type": "result"})]);

    let (backend_id, request) = backend.last_call();
    assert_eq!(backend_id, "petrophysics");
    assert_eq!(request.operation, "calculate_porosity");
    assert_eq!(request.parameters["well_name"], "WELL-001");
    assert_eq!(request.parameters["method"], "density");

    let stages: Vec<&str> = response
        .thought_steps
        .iter()
        .map(|s| s.stage.as_str())
        .collect();
    assert_eq!(stages, vec!["intent_detection", "backend_call"]);
}

#[tokio::test]
async fn test_list_wells_with_collection_is_allowed() {
    let backend = ok_backend();
    let router = build_router(&backend);
    let context = collection_context(&["WELL-001", "WELL-002", "WELL-003"]);

    let response = router.route("list wells", &[], Some(&context)).await;

    assert!(response.success);
    assert_eq!(response.agent_used, "petrophysics_agent");
    assert_eq!(backend.last_call().1.operation, "list_wells");
}

#[tokio::test]
async fn test_out_of_scope_well_needs_approval_without_backend_call() {
    let backend = ok_backend();
    let router = build_router(&backend);
    let context = collection_context(&["WELL-001", "WELL-002", "WELL-003"]);

    let response = router
        .route("calculate porosity for WELL-009", &[], Some(&context))
        .await;

    assert!(response.success);
    assert_eq!(response.agent_used, SCOPE_GUARD_AGENT);
    assert!(response.message.contains("North Sea Pilot"));
    assert!(response.message.contains("WELL-009"));
    assert_eq!(response.artifacts.len(), 1);
    assert_eq!(response.artifacts[0]["type"], "scope_approval");
    assert_eq!(response.artifacts[0]["outOfScopeEntityIds"], json!(["WELL-009"]));
    assert_eq!(backend.checks.load(Ordering::SeqCst), 0);
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_in_scope_well_proceeds_with_scope_step() {
    let backend = ok_backend();
    let router = build_router(&backend);
    let context = collection_context(&["WELL-001"]);

    let response = router
        .route("calculate porosity for well-001", &[], Some(&context))
        .await;

    assert!(response.success);
    assert_eq!(response.agent_used, "petrophysics_agent");
    assert_eq!(response.thought_steps[1].stage, "scope_check");
}

#[tokio::test]
async fn test_every_mentioned_well_is_scope_checked() {
    let backend = ok_backend();
    let router = build_router(&backend);
    let context = collection_context(&["WELL-001"]);

    let response = router
        .route("compare WELL-001 and WELL-009", &[], Some(&context))
        .await;

    assert_eq!(response.agent_used, SCOPE_GUARD_AGENT);
    assert_eq!(response.artifacts[0]["outOfScopeEntityIds"], json!(["WELL-009"]));
}

#[tokio::test]
async fn test_non_well_intents_are_not_scope_gated() {
    let backend = ok_backend();
    let router = build_router(&backend);
    let context = collection_context(&["WELL-001"]);

    let response = router
        .route("optimize the wind farm layout for site WELL-777", &[], Some(&context))
        .await;

    assert!(response.success);
    assert_eq!(response.agent_used, "renewable_energy_agent");
    assert_eq!(backend.last_call().0, "renewable");
}

#[tokio::test]
async fn test_permission_error_names_grant_and_is_retried() {
    let backend = ok_backend();
    backend.fail_next_check(BackendError::PermissionDenied {
        grant: "lambda:InvokeFunction on petro-calc".to_string(),
        detail: "AccessDeniedException".to_string(),
    });
    let router = build_router(&backend);

    let first = router.route("list wells", &[], None).await;
    assert!(!first.success);
    assert_eq!(first.agent_used, "petrophysics_agent");
    assert!(first.artifacts.is_empty());
    assert!(
        first.message.contains("lambda:InvokeFunction on petro-calc"),
        "{}",
        first.message
    );
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);

    let second = router.route("list wells", &[], None).await;
    assert!(second.success);
    assert_eq!(backend.checks.load(Ordering::SeqCst), 2);
    assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_validation_happens_once_per_backend() {
    let backend = ok_backend();
    let router = build_router(&backend);

    for message in [
        "calculate porosity for WELL-001",
        "shale volume for WELL-002",
        "list wells",
    ] {
        assert!(router.route(message, &[], None).await.success);
    }

    assert_eq!(backend.checks.load(Ordering::SeqCst), 1);
    assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_override_dispatches_against_message_content() {
    let backend = ok_backend();
    let router = build_router(&backend);
    let context = SessionContext {
        explicit_agent_override: Some(AgentOverride::Intent(Intent::Maintenance)),
        active_collection: None,
    };

    let response = router
        .route("calculate porosity for WELL-001", &[], Some(&context))
        .await;

    assert_eq!(response.agent_used, "maintenance_agent");
    assert_eq!(response.routed_by, Some(RoutingPath::ExplicitOverride));
    assert_eq!(backend.last_call().0, "maintenance");
}

#[tokio::test]
async fn test_well_log_in_minecraft_goes_to_visualization() {
    let backend = ok_backend();
    let router = build_router(&backend);

    let response = router
        .route("show the well log for WELL-001 in minecraft", &[], None)
        .await;

    assert_eq!(response.agent_used, "visualization_agent");
    let (backend_id, request) = backend.last_call();
    assert_eq!(backend_id, "visualization");
    assert_eq!(request.parameters["well_name"], "WELL-001");
}

#[tokio::test]
async fn test_general_question_gets_map_artifact() {
    let backend = StubBackend::new(json!({"message": "West Texas and southeastern New Mexico."}));
    let router = build_router(&backend);

    let response = router
        .route("Where is the Permian Basin?", &[], None)
        .await;

    assert!(response.success);
    assert_eq!(response.agent_used, "general_knowledge_agent");
    let map = response
        .artifacts
        .iter()
        .find(|a| a["type"] == "map")
        .expect("map artifact");
    assert_eq!(map["query"], "Permian Basin");
    assert_eq!(
        response.thought_steps.last().unwrap().stage,
        "map_integration"
    );
}

#[tokio::test]
async fn test_backend_supplied_geo_trigger_wins() {
    let backend = StubBackend::new(json!({
        "message": "Here it is.",
        "geoTrigger": {
            "query": "Eagle Ford Shale",
            "center": {"lat": 28.5, "lon": -98.5},
            "markers": []
        }
    }));
    let router = build_router(&backend);

    let response = router.route("where is eagle ford", &[], None).await;
    let map = response.artifacts.iter().find(|a| a["type"] == "map").unwrap();
    assert_eq!(map["query"], "Eagle Ford Shale");
    assert_eq!(map["center"]["lat"], 28.5);
}

#[tokio::test]
async fn test_calculation_without_well_asks_for_one() {
    let backend = ok_backend();
    let router = build_router(&backend);

    let response = router.route("calculate shale volume", &[], None).await;

    assert!(!response.success);
    assert_eq!(response.agent_used, "petrophysics_agent");
    assert!(response.message.contains("Which well"));
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_history_entity_is_scope_checked() {
    let backend = ok_backend();
    let router = build_router(&backend);
    let context = collection_context(&["WELL-001"]);
    let history = vec![ConversationTurn::user("tell me about WELL-050")];

    let response = router
        .route("calculate shale volume", &history, Some(&context))
        .await;

    assert_eq!(response.agent_used, SCOPE_GUARD_AGENT);
    assert_eq!(response.artifacts[0]["outOfScopeEntityIds"], json!(["WELL-050"]));
}

#[tokio::test]
async fn test_envelope_wire_shape() {
    let backend = ok_backend();
    let router = build_router(&backend);
    let response = router.route("list wells", &[], None).await;

    let value = serde_json::to_value(&response).unwrap();
    for key in ["success", "message", "artifacts", "thoughtSteps", "agentUsed", "routedBy"] {
        assert!(value.get(key).is_some(), "missing {key}");
    }
    assert_eq!(value["routedBy"], "classifier");
    assert_ne!(value["agentUsed"], ROUTER_ERROR_AGENT);
}
