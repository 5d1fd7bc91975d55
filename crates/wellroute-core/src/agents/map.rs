//! Map secondary integration for general-knowledge responses.

use serde_json::json;

use wellroute_types::model::{AgentResponse, StepStatus, ThoughtStep};

/// Turns a response's geo trigger into a `map` artifact.
#[derive(Debug, Clone, Copy, Default)]
pub struct MapIntegration;

impl MapIntegration {
    /// Consume the trigger, if any, appending the artifact and a `map_integration` step.
    /// `success` and `message` are left as the handler set them.
    pub fn attach(&self, mut response: AgentResponse) -> AgentResponse {
        let Some(trigger) = response.geo_trigger.take() else {
            return response;
        };

        tracing::debug!(query = %trigger.query, markers = trigger.markers.len(), "attaching map");
        response.artifacts.push(json!({
            "type": "map",
            "query": trigger.query,
            "center": trigger.center,
            "markers": trigger.markers,
        }));
        response.thought_steps.push(ThoughtStep::new(
            "map_integration",
            "Map",
            format!("Attached a map for \"{}\"", trigger.query),
            StepStatus::Complete,
        ));
        response
    }
}
