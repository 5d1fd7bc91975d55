//! Agent handlers.
//!
//! Every handler implements [`AgentHandler`] and reaches its backend through the shared
//! [`InvocationProxy`]; backend failures come back as `success: false` envelopes, never `Err`.

pub mod backend_agent;
pub mod general;
pub mod map;
pub mod petrophysics;

use std::sync::Arc;

use wellroute_tools::InvocationProxy;
use wellroute_types::errors::RouterError;
use wellroute_types::model::{AgentResponse, Intent, NormalizedResult, StepStatus, ThoughtStep};
use wellroute_types::traits::AgentHandler;

pub use backend_agent::BackendAgent;
pub use general::GeneralKnowledgeAgent;
pub use map::MapIntegration;
pub use petrophysics::PetrophysicsAgent;

use crate::router::Router;

/// Register the standard handler for every terminal intent.
pub fn register_standard_agents(
    router: &mut Router,
    proxy: Arc<InvocationProxy>,
) -> Result<(), RouterError> {
    let petrophysics: Arc<dyn AgentHandler> = Arc::new(PetrophysicsAgent::new(proxy.clone()));
    for intent in PetrophysicsAgent::INTENTS {
        router.register(intent, petrophysics.clone());
    }

    router.register(
        Intent::Maintenance,
        Arc::new(BackendAgent::maintenance(proxy.clone())),
    );
    router.register(
        Intent::Renewable,
        Arc::new(BackendAgent::renewable(proxy.clone())),
    );
    router.register(
        Intent::Visualization,
        Arc::new(BackendAgent::visualization(proxy.clone())),
    );
    router.register(
        Intent::NaturalLanguage,
        Arc::new(GeneralKnowledgeAgent::new(proxy)?),
    );
    Ok(())
}

/// Envelope for a finished backend call, with a `backend_call` step describing it.
pub(crate) fn respond(
    agent: &str,
    backend: &str,
    operation: &str,
    result: NormalizedResult,
) -> AgentResponse {
    let step = backend_step(backend, operation, &result);
    AgentResponse::from_normalized(agent, result).with_step(step)
}

fn backend_step(backend: &str, operation: &str, result: &NormalizedResult) -> ThoughtStep {
    let title = format!("Backend call: {operation}");
    if result.success {
        ThoughtStep::new(
            "backend_call",
            title,
            format!(
                "{operation} on {backend} completed (correlation {})",
                result.correlation_id
            ),
            StepStatus::Complete,
        )
    } else {
        let kind = result.error_kind.as_deref().unwrap_or("unknown_error");
        ThoughtStep::new(
            "backend_call",
            title,
            format!("{operation} on {backend} failed: {kind}"),
            StepStatus::Failed,
        )
    }
}
