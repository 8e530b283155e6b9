pub mod agent;
pub mod conversation;
pub mod error;
pub mod models;
pub mod orchestrator;
#[cfg(feature = "rig")]
pub mod rig_agent;
pub mod runner;
pub mod sql_guard;
pub mod store;
pub mod submission;
pub mod synthesizer;
pub mod turn;

// Re-export commonly used types
pub use agent::{AgentError, AgentOutput, AgentSchema, StructuredAgent, run_structured};
pub use conversation::{Conversation, ConversationStorage, InMemoryConversationStorage};
pub use error::{FlowError, Result, TurnError};
pub use models::{
    Claim, ClaimCreate, FieldIssue, HttpValidationError, Intent, IntentAction, PartialClaim,
    QueryPlan, QueryRows, SqlQuery,
};
pub use orchestrator::{TurnOrchestrator, TurnOrchestratorBuilder};
#[cfg(feature = "rig")]
pub use rig_agent::RigAgent;
pub use runner::TurnRunner;
pub use sql_guard::{GuardError, QueryValidator, ValidatedQuery};
pub use store::{ClaimsStore, DbPool, QueryEngine, StoreError};
pub use submission::{ClaimSubmitter, HttpClaimSubmitter, SubmitError};
pub use synthesizer::ClaimSynthesizer;
pub use turn::{TurnArtifacts, TurnResult};
