//! Pass-through agents for the maintenance, renewable and visualization backends.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use wellroute_tools::InvocationProxy;
use wellroute_types::config::backends;
use wellroute_types::errors::RouterError;
use wellroute_types::model::AgentResponse;
use wellroute_types::traits::{AgentHandler, HandlerRequest};

use super::respond;

/// Forwards the request text, and the well if one was named, to a single backend operation.
pub struct BackendAgent {
    name: &'static str,
    backend: String,
    operation: &'static str,
    proxy: Arc<InvocationProxy>,
}

impl BackendAgent {
    pub fn new(
        name: &'static str,
        backend: impl Into<String>,
        operation: &'static str,
        proxy: Arc<InvocationProxy>,
    ) -> Self {
        Self {
            name,
            backend: backend.into(),
            operation,
            proxy,
        }
    }

    pub fn maintenance(proxy: Arc<InvocationProxy>) -> Self {
        Self::new(
            "maintenance_agent",
            backends::MAINTENANCE,
            "analyze_maintenance",
            proxy,
        )
    }

    pub fn renewable(proxy: Arc<InvocationProxy>) -> Self {
        Self::new(
            "renewable_energy_agent",
            backends::RENEWABLE,
            "run_renewable_analysis",
            proxy,
        )
    }

    pub fn visualization(proxy: Arc<InvocationProxy>) -> Self {
        Self::new(
            "visualization_agent",
            backends::VISUALIZATION,
            "build_visualization",
            proxy,
        )
    }
}

#[async_trait]
impl AgentHandler for BackendAgent {
    fn name(&self) -> &str {
        self.name
    }

    async fn handle(&self, request: HandlerRequest) -> Result<AgentResponse, RouterError> {
        let mut parameters = json!({ "query": request.message });
        if let Some(well) = &request.extracted_entity {
            parameters["well_name"] = json!(well);
        }
        let result = self
            .proxy
            .invoke(&self.backend, self.operation, parameters)
            .await;
        Ok(respond(self.name, &self.backend, self.operation, result))
    }
}
