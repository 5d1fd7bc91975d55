//! Petrophysics agent: well details, calculations, quality checks, evaluation workflows.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use wellroute_tools::InvocationProxy;
use wellroute_types::config::backends;
use wellroute_types::errors::RouterError;
use wellroute_types::model::{AgentResponse, Intent, StepStatus, ThoughtStep};
use wellroute_types::traits::{AgentHandler, HandlerRequest};

use super::respond;

pub const AGENT_NAME: &str = "petrophysics_agent";

/// Workflow names for the formation evaluation operation.
pub const FORMATION_EVALUATION_WORKFLOW: &str = "formation_evaluation";
pub const COMPLETION_ANALYSIS_WORKFLOW: &str = "completion_analysis";

/// One planned backend call.
#[derive(Debug, Clone, PartialEq)]
struct PlannedCall {
    operation: &'static str,
    parameters: Value,
}

/// Handles every well-data intent against the petrophysics backend.
pub struct PetrophysicsAgent {
    proxy: Arc<InvocationProxy>,
    backend: String,
}

impl PetrophysicsAgent {
    /// Intents this agent serves.
    pub const INTENTS: [Intent; 9] = [
        Intent::WellInfo,
        Intent::CalculatePorosity,
        Intent::CalculateShale,
        Intent::CalculateSaturation,
        Intent::DataQuality,
        Intent::FormationEvaluation,
        Intent::MultiWellCorrelation,
        Intent::ListWells,
        Intent::CrossWellAnalytics,
    ];

    pub fn new(proxy: Arc<InvocationProxy>) -> Self {
        Self {
            proxy,
            backend: backends::PETROPHYSICS.to_string(),
        }
    }

    /// Work out the backend call, or `Ok(None)` when the request names no well but needs one.
    fn plan(request: &HandlerRequest) -> Result<Option<PlannedCall>, RouterError> {
        let well = request.extracted_entity.as_deref();
        let method = request.extracted_method.as_deref();

        let call = match request.intent {
            Intent::ListWells => PlannedCall {
                operation: "list_wells",
                parameters: json!({}),
            },
            Intent::MultiWellCorrelation => PlannedCall {
                operation: "correlate_wells",
                parameters: json!({ "wells": request.referenced_entities }),
            },
            Intent::CrossWellAnalytics => PlannedCall {
                operation: "cross_well_analytics",
                parameters: json!({
                    "wells": request.referenced_entities,
                    "question": request.message,
                }),
            },
            intent => {
                let Some(well) = well else {
                    return Ok(None);
                };
                match intent {
                    Intent::WellInfo => PlannedCall {
                        operation: "get_well_info",
                        parameters: json!({ "well_name": well }),
                    },
                    Intent::CalculatePorosity => PlannedCall {
                        operation: "calculate_porosity",
                        parameters: json!({ "well_name": well, "method": method }),
                    },
                    Intent::CalculateShale => PlannedCall {
                        operation: "calculate_shale_volume",
                        parameters: json!({ "well_name": well, "method": method }),
                    },
                    Intent::CalculateSaturation => PlannedCall {
                        operation: "calculate_saturation",
                        parameters: json!({ "well_name": well, "method": method }),
                    },
                    Intent::DataQuality => PlannedCall {
                        operation: "assess_well_data_quality",
                        parameters: json!({ "well_name": well }),
                    },
                    // Completion analysis runs the formation evaluation workflow.
                    Intent::FormationEvaluation => PlannedCall {
                        operation: "formation_evaluation",
                        parameters: json!({
                            "well_name": well,
                            "workflow": workflow_for(&request.message),
                        }),
                    },
                    other => {
                        return Err(RouterError::Internal(format!(
                            "{AGENT_NAME} cannot handle intent '{other}'"
                        )))
                    }
                }
            }
        };
        Ok(Some(call))
    }
}

fn workflow_for(message: &str) -> &'static str {
    if message.to_lowercase().contains("completion") {
        COMPLETION_ANALYSIS_WORKFLOW
    } else {
        FORMATION_EVALUATION_WORKFLOW
    }
}

fn task_name(intent: Intent) -> &'static str {
    match intent {
        Intent::CalculatePorosity => "the porosity calculation",
        Intent::CalculateShale => "the shale volume calculation",
        Intent::CalculateSaturation => "the water saturation calculation",
        Intent::DataQuality => "the data quality assessment",
        Intent::FormationEvaluation => "the formation evaluation",
        _ => "this request",
    }
}

#[async_trait]
impl AgentHandler for PetrophysicsAgent {
    fn name(&self) -> &str {
        AGENT_NAME
    }

    async fn handle(&self, request: HandlerRequest) -> Result<AgentResponse, RouterError> {
        let Some(call) = Self::plan(&request)? else {
            info!(intent = %request.intent, "no well identified, backend not called");
            return Ok(AgentResponse::failed(
                AGENT_NAME,
                format!(
                    "Which well should I use for {}? Name one, for example \"calculate porosity for WELL-001\".",
                    task_name(request.intent)
                ),
            )
            .with_step(ThoughtStep::new(
                "well_resolution",
                "Well identification",
                "No well was named in the request or recent conversation.",
                StepStatus::Skipped,
            )));
        };

        let result = self
            .proxy
            .invoke(&self.backend, call.operation, call.parameters)
            .await;
        Ok(respond(AGENT_NAME, &self.backend, call.operation, result))
    }
}
