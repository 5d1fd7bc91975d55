//! General-knowledge agent. The only handler that can raise a geo trigger.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde_json::json;

use wellroute_tools::InvocationProxy;
use wellroute_types::config::backends;
use wellroute_types::errors::RouterError;
use wellroute_types::model::{AgentResponse, GeoTrigger};
use wellroute_types::traits::{AgentHandler, HandlerRequest};

use super::respond;

pub const AGENT_NAME: &str = "general_knowledge_agent";
const OPERATION: &str = "answer_question";

/// Answers open questions through the knowledge backend.
pub struct GeneralKnowledgeAgent {
    proxy: Arc<InvocationProxy>,
    backend: String,
    /// "map of X", "where is X", "location of X", "locate X"
    place: Regex,
    /// "... on a map"
    on_a_map: Regex,
}

impl GeneralKnowledgeAgent {
    pub fn new(proxy: Arc<InvocationProxy>) -> Result<Self, RouterError> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| RouterError::Config(format!("invalid geo pattern '{pattern}': {e}")))
        };
        Ok(Self {
            proxy,
            backend: backends::KNOWLEDGE.to_string(),
            place: compile(r"(?i)\b(?:map of|where is|location of|locate)\s+(?:the\s+)?([^?.!,]+)")?,
            on_a_map: compile(r"(?i)\bon\s+a\s+map\b")?,
        })
    }

    /// Place the user asked to see, if the message asks for one.
    pub fn geo_query(&self, message: &str) -> Option<String> {
        if let Some(place) = self
            .place
            .captures(message)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|p| !p.is_empty())
        {
            return Some(place);
        }
        self.on_a_map
            .is_match(message)
            .then(|| message.trim().to_string())
    }
}

#[async_trait]
impl AgentHandler for GeneralKnowledgeAgent {
    fn name(&self) -> &str {
        AGENT_NAME
    }

    async fn handle(&self, request: HandlerRequest) -> Result<AgentResponse, RouterError> {
        let result = self
            .proxy
            .invoke(
                &self.backend,
                OPERATION,
                json!({ "question": request.message }),
            )
            .await;

        // A trigger supplied by the backend wins over one inferred from the wording.
        let backend_trigger = result
            .payload
            .get("geoTrigger")
            .cloned()
            .and_then(|v| serde_json::from_value::<GeoTrigger>(v).ok());
        let succeeded = result.success;

        let mut response = respond(AGENT_NAME, &self.backend, OPERATION, result);
        if succeeded {
            response.geo_trigger = backend_trigger.or_else(|| {
                self.geo_query(&request.message).map(|query| GeoTrigger {
                    query,
                    center: None,
                    markers: Vec::new(),
                })
            });
        }
        Ok(response)
    }
}
