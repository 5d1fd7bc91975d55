/// Shared data types used across all wellroute subsystems.
///
/// Every crate in the workspace speaks in these structures: the classifier produces
/// [`ClassificationResult`], the scope guard produces [`ScopeDecision`], the invocation
/// proxy produces [`NormalizedResult`], and everything ends up in an [`AgentResponse`].
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ============================================================
// Intent
// ============================================================

/// Closed set of intents a message can be classified into.
///
/// `Unknown` is an internal low-confidence marker only; the classifier never returns it
/// as a terminal result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    WellInfo,
    CalculatePorosity,
    CalculateShale,
    CalculateSaturation,
    DataQuality,
    FormationEvaluation,
    MultiWellCorrelation,
    ListWells,
    Maintenance,
    Renewable,
    Visualization,
    NaturalLanguage,
    CrossWellAnalytics,
    Unknown,
}

impl Intent {
    /// Every intent, in declaration order.
    pub const ALL: [Intent; 14] = [
        Intent::WellInfo,
        Intent::CalculatePorosity,
        Intent::CalculateShale,
        Intent::CalculateSaturation,
        Intent::DataQuality,
        Intent::FormationEvaluation,
        Intent::MultiWellCorrelation,
        Intent::ListWells,
        Intent::Maintenance,
        Intent::Renewable,
        Intent::Visualization,
        Intent::NaturalLanguage,
        Intent::CrossWellAnalytics,
        Intent::Unknown,
    ];

    /// Wire name of the intent (matches the serde representation).
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::WellInfo => "well_info",
            Intent::CalculatePorosity => "calculate_porosity",
            Intent::CalculateShale => "calculate_shale",
            Intent::CalculateSaturation => "calculate_saturation",
            Intent::DataQuality => "data_quality",
            Intent::FormationEvaluation => "formation_evaluation",
            Intent::MultiWellCorrelation => "multi_well_correlation",
            Intent::ListWells => "list_wells",
            Intent::Maintenance => "maintenance",
            Intent::Renewable => "renewable",
            Intent::Visualization => "visualization",
            Intent::NaturalLanguage => "natural_language",
            Intent::CrossWellAnalytics => "cross_well_analytics",
            Intent::Unknown => "unknown",
        }
    }

    /// Intents whose handlers read well data and are therefore subject to collection scope.
    pub fn touches_well_data(&self) -> bool {
        matches!(
            self,
            Intent::WellInfo
                | Intent::CalculatePorosity
                | Intent::CalculateShale
                | Intent::CalculateSaturation
                | Intent::DataQuality
                | Intent::FormationEvaluation
                | Intent::MultiWellCorrelation
                | Intent::CrossWellAnalytics
        )
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name any [`Intent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownIntentName(pub String);

impl fmt::Display for UnknownIntentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown intent '{}'", self.0)
    }
}

impl std::error::Error for UnknownIntentName {}

impl FromStr for Intent {
    type Err = UnknownIntentName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Intent::ALL
            .iter()
            .copied()
            .find(|intent| intent.as_str() == needle)
            .ok_or_else(|| UnknownIntentName(s.to_string()))
    }
}

// ============================================================
// Classification
// ============================================================

/// Outcome of classifying one message. Built once, never mutated after return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    /// Chosen intent.
    pub intent: Intent,
    /// Accumulated rule score. Not a probability and not bounded.
    pub confidence_score: i32,
    /// Entity identifier pulled from the message (e.g. a well name).
    pub extracted_entity: Option<String>,
    /// Sub-method for calculation intents (e.g. "density").
    pub extracted_method: Option<String>,
}

// ============================================================
// Session context
// ============================================================

/// Caller's explicit agent choice: either `"auto"` or a specific intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AgentOverride {
    /// Let the classifier decide.
    Auto,
    /// Dispatch straight to this intent's handler.
    Intent(Intent),
}

impl TryFrom<String> for AgentOverride {
    type Error = UnknownIntentName;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.trim().eq_ignore_ascii_case("auto") {
            return Ok(AgentOverride::Auto);
        }
        value.parse().map(AgentOverride::Intent)
    }
}

impl From<AgentOverride> for String {
    fn from(value: AgentOverride) -> Self {
        match value {
            AgentOverride::Auto => "auto".to_string(),
            AgentOverride::Intent(intent) => intent.as_str().to_string(),
        }
    }
}

/// A curated, named subset of entities a session is restricted to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveCollection {
    /// Collection identifier.
    pub id: String,
    /// Display name, used in approval prompts.
    pub name: String,
    /// Entity identifiers that belong to the collection.
    #[serde(default)]
    pub member_entity_ids: BTreeSet<String>,
    /// Display names of members keyed by entity id. Requests may name a member either way.
    #[serde(default)]
    pub member_display_names: BTreeMap<String, String>,
}

/// Per-request, read-only context supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    /// Explicit agent selection; `None` and `Some(Auto)` both mean "classify".
    #[serde(default)]
    pub explicit_agent_override: Option<AgentOverride>,
    /// Collection the session is bound to, if any.
    #[serde(default)]
    pub active_collection: Option<ActiveCollection>,
}

impl SessionContext {
    /// The overriding intent, if one is set and it is not `"auto"`.
    pub fn override_intent(&self) -> Option<Intent> {
        match self.explicit_agent_override {
            Some(AgentOverride::Intent(intent)) => Some(intent),
            Some(AgentOverride::Auto) | None => None,
        }
    }
}

/// Speaker of a prior conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One prior turn of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
}

impl ConversationTurn {
    /// Convenience constructor for a user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }
}

// ============================================================
// Scope
// ============================================================

/// Result of checking requested entities against an active collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeDecision {
    /// `true` when the request may proceed without approval.
    pub allowed: bool,
    /// Requested identifiers that fall outside the collection, in request order.
    pub out_of_scope_entity_ids: Vec<String>,
    /// Rendered approval request; present only when `allowed` is false.
    pub approval_prompt: Option<String>,
}

impl ScopeDecision {
    /// An unconditional ALLOW.
    pub fn allow() -> Self {
        Self {
            allowed: true,
            out_of_scope_entity_ids: Vec::new(),
            approval_prompt: None,
        }
    }
}

// ============================================================
// Backend invocation
// ============================================================

/// Cached outcome of a successful backend existence check.
///
/// Only ever created on success; failures leave no entry behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationValidationState {
    pub validated: bool,
    pub function_arn: Option<String>,
    pub validated_at_epoch_ms: i64,
}

/// What a backend reports about itself during the existence check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendIdentity {
    pub exists: bool,
    pub identity: Option<String>,
}

/// Request body sent to a backend for one operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationRequest {
    pub correlation_id: String,
    pub operation: String,
    pub parameters: serde_json::Value,
}

/// Raw backend reply before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendReply {
    pub status_code: u16,
    pub payload: serde_json::Value,
}

/// Single response shape the invocation proxy produces for success and failure alike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedResult {
    pub success: bool,
    pub message: String,
    pub artifacts: Vec<serde_json::Value>,
    pub thought_steps: Vec<ThoughtStep>,
    /// Correlation id of the call; empty when the call never got that far.
    pub correlation_id: String,
    /// Classification label of the failure, when there was one.
    pub error_kind: Option<String>,
    /// Full backend payload on success, `Null` otherwise.
    pub payload: serde_json::Value,
}

impl NormalizedResult {
    /// A failure result with no artifacts.
    pub fn failure(message: impl Into<String>, kind: &str, correlation_id: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            artifacts: Vec::new(),
            thought_steps: Vec::new(),
            correlation_id: correlation_id.into(),
            error_kind: Some(kind.to_string()),
            payload: serde_json::Value::Null,
        }
    }
}

// ============================================================
// Response envelope
// ============================================================

/// Status of one reasoning step shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Complete,
    Failed,
    Skipped,
}

/// One entry of the user-visible reasoning trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThoughtStep {
    pub stage: String,
    pub title: String,
    pub summary: String,
    pub status: StepStatus,
}

impl ThoughtStep {
    pub fn new(
        stage: impl Into<String>,
        title: impl Into<String>,
        summary: impl Into<String>,
        status: StepStatus,
    ) -> Self {
        Self {
            stage: stage.into(),
            title: title.into(),
            summary: summary.into(),
            status,
        }
    }
}

/// How the Router picked the handler for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingPath {
    /// Caller named the agent; the classifier was not consulted.
    ExplicitOverride,
    /// The classifier chose the intent.
    Classifier,
}

/// Geographic point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// Labelled point to render on a map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoMarker {
    pub label: String,
    pub lat: f64,
    pub lon: f64,
}

/// Signal from the general-knowledge handler that a map should be attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoTrigger {
    /// Place or area the user asked about.
    pub query: String,
    #[serde(default)]
    pub center: Option<GeoPoint>,
    #[serde(default)]
    pub markers: Vec<GeoMarker>,
}

/// Envelope every request resolves to, whatever path it took.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResponse {
    pub success: bool,
    pub message: String,
    pub artifacts: Vec<serde_json::Value>,
    pub thought_steps: Vec<ThoughtStep>,
    pub agent_used: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routed_by: Option<RoutingPath>,
    /// Consumed by the Router's map integration; never serialized.
    #[serde(skip)]
    pub geo_trigger: Option<GeoTrigger>,
}

impl AgentResponse {
    /// A successful response with no artifacts yet.
    pub fn completed(agent: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            artifacts: Vec::new(),
            thought_steps: Vec::new(),
            agent_used: agent.into(),
            routed_by: None,
            geo_trigger: None,
        }
    }

    /// A failed response with no artifacts.
    pub fn failed(agent: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::completed(agent, message)
        }
    }

    /// Build an envelope from a proxy result, keeping its success flag and message.
    pub fn from_normalized(agent: impl Into<String>, result: NormalizedResult) -> Self {
        Self {
            success: result.success,
            message: result.message,
            artifacts: result.artifacts,
            thought_steps: result.thought_steps,
            agent_used: agent.into(),
            routed_by: None,
            geo_trigger: None,
        }
    }

    pub fn with_step(mut self, step: ThoughtStep) -> Self {
        self.thought_steps.push(step);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_round_trips_through_wire_name() {
        for intent in Intent::ALL {
            assert_eq!(intent.as_str().parse::<Intent>().unwrap(), intent);
            let json = serde_json::to_string(&intent).unwrap();
            assert_eq!(json, format!("\"{}\"", intent.as_str()));
        }
    }

    #[test]
    fn test_intent_parse_rejects_unknown_names() {
        let err = "drill_baby_drill".parse::<Intent>().unwrap_err();
        assert!(err.to_string().contains("drill_baby_drill"));
    }

    #[test]
    fn test_agent_override_accepts_auto_and_intents() {
        let ctx: SessionContext =
            serde_json::from_str(r#"{"explicitAgentOverride":"auto"}"#).unwrap();
        assert_eq!(ctx.explicit_agent_override, Some(AgentOverride::Auto));
        assert_eq!(ctx.override_intent(), None);

        let ctx: SessionContext =
            serde_json::from_str(r#"{"explicitAgentOverride":"calculate_shale"}"#).unwrap();
        assert_eq!(ctx.override_intent(), Some(Intent::CalculateShale));
    }

    #[test]
    fn test_agent_override_rejects_garbage() {
        let result: Result<SessionContext, _> =
            serde_json::from_str(r#"{"explicitAgentOverride":"petro_wizard"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_response_envelope_serializes_camel_case_without_geo_trigger() {
        let mut response = AgentResponse::completed("petrophysics_agent", "done");
        response.geo_trigger = Some(GeoTrigger {
            query: "Permian Basin".to_string(),
            center: None,
            markers: vec![],
        });
        response.routed_by = Some(RoutingPath::Classifier);

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["agentUsed"], "petrophysics_agent");
        assert_eq!(value["routedBy"], "classifier");
        assert!(value.get("thoughtSteps").is_some());
        assert!(value.get("geoTrigger").is_none());
        assert!(value.get("geo_trigger").is_none());
    }

    #[test]
    fn test_failed_response_has_no_artifacts() {
        let response = AgentResponse::failed("router_error", "boom");
        assert!(!response.success);
        assert!(response.artifacts.is_empty());
    }
}
