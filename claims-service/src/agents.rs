use std::sync::Arc;

use claims_flow::{Intent, PartialClaim, QueryPlan, RigAgent, StructuredAgent};
use rig::providers::openrouter;

use crate::{
    config::ServiceConfig,
    prompts::{EXTRACTION_PROMPT, INTENT_PROMPT, sql_prompt},
};

/// The three model-backed agents the orchestrator needs
pub struct Agents {
    pub intent: Arc<dyn StructuredAgent<Intent>>,
    pub extraction: Arc<dyn StructuredAgent<PartialClaim>>,
    pub query: Arc<dyn StructuredAgent<QueryPlan>>,
}

impl Agents {
    pub fn from_config(config: &ServiceConfig) -> Self {
        let client = openrouter::Client::new(&config.openrouter_api_key);
        Self {
            intent: Arc::new(RigAgent::<Intent>::openrouter(
                &client,
                &config.models.intent,
                INTENT_PROMPT,
            )),
            extraction: Arc::new(RigAgent::<PartialClaim>::openrouter(
                &client,
                &config.models.extraction,
                EXTRACTION_PROMPT,
            )),
            query: Arc::new(RigAgent::<QueryPlan>::openrouter(
                &client,
                &config.models.sql,
                &sql_prompt(),
            )),
        }
    }
}
