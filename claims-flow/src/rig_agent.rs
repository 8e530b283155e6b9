use std::marker::PhantomData;

use async_trait::async_trait;
use rig::{agent::Agent, client::CompletionClient, completion::Chat, providers::openrouter};
use tracing::debug;

use crate::agent::{AgentError, AgentOutput, AgentSchema, StructuredAgent};

/// Structured agent backed by an OpenRouter chat model.
///
/// The preamble is expected to instruct the model to answer with JSON of
/// schema `T`; the text reply is returned raw and normalized by the caller.
pub struct RigAgent<T> {
    agent: Agent<openrouter::CompletionModel>,
    _schema: PhantomData<fn() -> T>,
}

impl<T> RigAgent<T> {
    pub fn new(agent: Agent<openrouter::CompletionModel>) -> Self {
        Self {
            agent,
            _schema: PhantomData,
        }
    }

    pub fn openrouter(client: &openrouter::Client, model: &str, preamble: &str) -> Self {
        Self::new(client.agent(model).preamble(preamble).build())
    }
}

#[async_trait]
impl<T: AgentSchema> StructuredAgent<T> for RigAgent<T> {
    async fn run(&self, prompt: &str) -> Result<AgentOutput<T>, AgentError> {
        let reply = self
            .agent
            .chat(prompt, vec![])
            .await
            .map_err(|e| AgentError::Call(e.to_string()))?;
        debug!(schema = T::NAME, reply_length = reply.len(), "Model replied");
        Ok(AgentOutput::Raw(reply))
    }
}
