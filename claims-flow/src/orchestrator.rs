use std::{any::Any, panic::AssertUnwindSafe, sync::Arc};

use futures::FutureExt;
use tracing::{error, info, warn};

use crate::{
    agent::{StructuredAgent, run_structured},
    conversation::Conversation,
    error::{FlowError, Result, TurnError},
    models::{Intent, IntentAction, PartialClaim, QueryPlan},
    sql_guard::QueryValidator,
    store::QueryEngine,
    submission::{ClaimSubmitter, SubmitError},
    synthesizer::ClaimSynthesizer,
    turn::{TurnDraft, TurnResult},
};

pub const CLARIFICATION_PROMPT: &str = "I'm not sure how to help with that. I can create test claims or retrieve existing ones. Could you please clarify your request?";

pub const RETRIEVAL_DETAILS_PROMPT: &str = "Okay, you want to find some claims. Can you be more specific? For example, tell me a claim ID, policy holder name, or status.";

/// Runs one user utterance through classification and the matching branch
pub struct TurnOrchestrator {
    intent_agent: Arc<dyn StructuredAgent<Intent>>,
    extraction_agent: Arc<dyn StructuredAgent<PartialClaim>>,
    query_agent: Arc<dyn StructuredAgent<QueryPlan>>,
    synthesizer: ClaimSynthesizer,
    submitter: Arc<dyn ClaimSubmitter>,
    validator: QueryValidator,
    engine: Arc<dyn QueryEngine>,
}

impl TurnOrchestrator {
    pub fn builder() -> TurnOrchestratorBuilder {
        TurnOrchestratorBuilder::default()
    }

    /// Processes a single turn. Every failure, including a panic inside a
    /// stage, is contained in the returned result.
    pub async fn process_turn(&self, user_text: &str) -> TurnResult {
        let mut draft = TurnDraft::begin(user_text);
        let outcome = AssertUnwindSafe(self.run_stages(&mut draft))
            .catch_unwind()
            .await;

        let (message, failure) = match outcome {
            Ok(Ok(message)) => (message, None),
            Ok(Err(err)) => (err.user_message(), Some(err)),
            Err(panic) => {
                let err = TurnError::Internal {
                    detail: panic_detail(panic.as_ref()),
                };
                (err.user_message(), Some(err))
            }
        };

        let action = draft.intent.as_ref().map(|i| i.action.as_str());
        match &failure {
            Some(err) if err.is_fault() => error!(
                action = ?action,
                error = %err,
                "Turn aborted by an internal fault"
            ),
            Some(err) => warn!(
                action = ?action,
                kind = err.kind(),
                error = %err,
                "Turn ended with a recoverable error"
            ),
            None => info!(action = ?action, "Turn completed"),
        }

        draft.finish(message, failure)
    }

    /// Processes a turn and appends the frozen result to `conversation`
    pub async fn process_turn_in(
        &self,
        conversation: &mut Conversation,
        user_text: &str,
    ) -> TurnResult {
        let turn = self.process_turn(user_text).await;
        conversation.record(turn.clone());
        turn
    }

    async fn run_stages(&self, draft: &mut TurnDraft) -> std::result::Result<String, TurnError> {
        let user_text = draft.user_text.clone();

        info!(stage = "intent", "Classifying intent");
        let intent = run_structured(self.intent_agent.as_ref(), &user_text)
            .await
            .map_err(|e| TurnError::Classification {
                detail: e.to_string(),
            })?;
        info!(
            action = intent.action.as_str(),
            query_details = ?intent.query_details,
            "Intent detected"
        );
        draft.intent = Some(intent.clone());

        match intent.action {
            IntentAction::Unknown => Ok(CLARIFICATION_PROMPT.to_string()),
            IntentAction::Create => self.create_claim(&user_text, draft).await,
            IntentAction::Retrieve => self.retrieve_claims(&intent, draft).await,
        }
    }

    async fn create_claim(
        &self,
        user_text: &str,
        draft: &mut TurnDraft,
    ) -> std::result::Result<String, TurnError> {
        info!(stage = "extraction", "Extracting claim details");
        let extracted = run_structured(self.extraction_agent.as_ref(), user_text)
            .await
            .map_err(|e| TurnError::Extraction {
                detail: e.to_string(),
            })?;
        info!(provided = ?extracted.provided_fields(), "Claim details extracted");
        draft.artifacts.extracted = Some(extracted.clone());

        let payload = self.synthesizer.synthesize(&extracted);
        draft.artifacts.payload = Some(payload.clone());

        info!(stage = "submission", policy_number = %payload.policy_number, "Submitting claim");
        let claim = self
            .submitter
            .submit(&payload)
            .await
            .map_err(|e| match e {
                SubmitError::Rejected(fields) => TurnError::FieldValidation { fields },
                other => TurnError::Submission {
                    detail: other.to_string(),
                },
            })?;
        info!(claim_id = %claim.id, "Claim created");

        let message = format!(
            "Test claim created successfully via API! Claim ID: `{}`.",
            claim.id
        );
        draft.artifacts.submitted = Some(claim);
        Ok(message)
    }

    async fn retrieve_claims(
        &self,
        intent: &Intent,
        draft: &mut TurnDraft,
    ) -> std::result::Result<String, TurnError> {
        let Some(details) = intent.query_filter() else {
            info!("Retrieval requested without details, asking for specifics");
            return Ok(RETRIEVAL_DETAILS_PROMPT.to_string());
        };

        info!(stage = "generation", details = %details, "Generating query");
        let plan = run_structured(self.query_agent.as_ref(), details)
            .await
            .map_err(|e| TurnError::Generation {
                detail: e.to_string(),
            })?;
        let query = match plan {
            QueryPlan::Invalid { error_message } => {
                return Err(TurnError::InvalidRequest {
                    message: error_message,
                });
            }
            QueryPlan::Query(query) => query,
        };
        draft.artifacts.sql = Some(query.sql.clone());
        draft.artifacts.explanation = query.explanation.clone();

        info!(stage = "validation", sql = %query.sql, "Validating generated query");
        let validated = self
            .validator
            .validate(&query.sql)
            .await
            .map_err(|e| TurnError::QueryValidation {
                sql: query.sql.clone(),
                reason: e.to_string(),
            })?;
        draft.artifacts.query_plan = Some(validated.plan().to_vec());

        info!(stage = "execution", "Executing query");
        let rows = self
            .engine
            .execute(&validated)
            .await
            .map_err(|e| TurnError::Execution {
                sql: validated.sql().to_string(),
                detail: e.to_string(),
            })?;
        let count = rows.len();
        let truncated = rows.truncated;
        info!(row_count = count, truncated, "Query executed");
        draft.artifacts.rows = Some(rows);

        let mut message =
            format!("Okay, I found {count} claim(s) matching your request. See the results below.");
        if truncated {
            message.push_str(" More claims matched; only the first ones are shown.");
        }
        if let Some(explanation) = &query.explanation {
            message.push_str(&format!("\n\nQuery Explanation: {explanation}"));
        }
        Ok(message)
    }
}

fn panic_detail(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "stage panicked".to_string()
    }
}

/// Builder for [`TurnOrchestrator`]
#[derive(Default)]
pub struct TurnOrchestratorBuilder {
    intent_agent: Option<Arc<dyn StructuredAgent<Intent>>>,
    extraction_agent: Option<Arc<dyn StructuredAgent<PartialClaim>>>,
    query_agent: Option<Arc<dyn StructuredAgent<QueryPlan>>>,
    synthesizer: Option<ClaimSynthesizer>,
    submitter: Option<Arc<dyn ClaimSubmitter>>,
    engine: Option<Arc<dyn QueryEngine>>,
}

impl TurnOrchestratorBuilder {
    pub fn intent_agent(mut self, agent: Arc<dyn StructuredAgent<Intent>>) -> Self {
        self.intent_agent = Some(agent);
        self
    }

    pub fn extraction_agent(mut self, agent: Arc<dyn StructuredAgent<PartialClaim>>) -> Self {
        self.extraction_agent = Some(agent);
        self
    }

    pub fn query_agent(mut self, agent: Arc<dyn StructuredAgent<QueryPlan>>) -> Self {
        self.query_agent = Some(agent);
        self
    }

    pub fn synthesizer(mut self, synthesizer: ClaimSynthesizer) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    pub fn submitter(mut self, submitter: Arc<dyn ClaimSubmitter>) -> Self {
        self.submitter = Some(submitter);
        self
    }

    /// Engine used both for planning (validation) and execution
    pub fn query_engine(mut self, engine: Arc<dyn QueryEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn build(self) -> Result<TurnOrchestrator> {
        let engine = self
            .engine
            .ok_or(FlowError::MissingComponent("query engine"))?;
        Ok(TurnOrchestrator {
            intent_agent: self
                .intent_agent
                .ok_or(FlowError::MissingComponent("intent agent"))?,
            extraction_agent: self
                .extraction_agent
                .ok_or(FlowError::MissingComponent("extraction agent"))?,
            query_agent: self
                .query_agent
                .ok_or(FlowError::MissingComponent("query agent"))?,
            synthesizer: self.synthesizer.unwrap_or_default(),
            submitter: self
                .submitter
                .ok_or(FlowError::MissingComponent("submitter"))?,
            validator: QueryValidator::new(engine.clone()),
            engine,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        agent::{AgentError, AgentOutput, AgentSchema},
        models::{Claim, ClaimCreate, FieldIssue, QueryRows, SqlQuery},
        sql_guard::ValidatedQuery,
        store::StoreError,
        synthesizer::offices_for,
    };
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    pub(crate) enum Script<T> {
        Output(AgentOutput<T>),
        Fail(&'static str),
        Panic,
    }

    pub(crate) struct ScriptedAgent<T> {
        script: Script<T>,
        pub calls: AtomicUsize,
    }

    impl<T> ScriptedAgent<T> {
        pub fn new(script: Script<T>) -> Arc<Self> {
            Arc::new(Self {
                script,
                calls: AtomicUsize::new(0),
            })
        }

        pub fn raw(raw: &str) -> Arc<Self> {
            Self::new(Script::Output(AgentOutput::Raw(raw.to_string())))
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl<T: AgentSchema + Clone + Sync> StructuredAgent<T> for ScriptedAgent<T> {
        async fn run(&self, _prompt: &str) -> std::result::Result<AgentOutput<T>, AgentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.script {
                Script::Output(output) => Ok(output.clone()),
                Script::Fail(reason) => Err(AgentError::Call(reason.to_string())),
                Script::Panic => panic!("agent exploded"),
            }
        }
    }

    pub(crate) enum SubmitScript {
        Accept(&'static str),
        Reject(Vec<FieldIssue>),
        Unreachable,
    }

    pub(crate) struct FakeSubmitter {
        script: SubmitScript,
        pub received: Mutex<Vec<ClaimCreate>>,
    }

    impl FakeSubmitter {
        pub fn new(script: SubmitScript) -> Arc<Self> {
            Arc::new(Self {
                script,
                received: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ClaimSubmitter for FakeSubmitter {
        async fn submit(&self, record: &ClaimCreate) -> std::result::Result<Claim, SubmitError> {
            self.received.lock().unwrap().push(record.clone());
            match &self.script {
                SubmitScript::Accept(id) => Ok(Claim {
                    id: id.to_string(),
                    record: record.clone(),
                }),
                SubmitScript::Reject(issues) => Err(SubmitError::Rejected(issues.clone())),
                SubmitScript::Unreachable => {
                    Err(SubmitError::Transport("connection refused".to_string()))
                }
            }
        }
    }

    pub(crate) struct CountingEngine {
        rows: std::result::Result<QueryRows, &'static str>,
        pub explains: AtomicUsize,
        pub executions: AtomicUsize,
    }

    impl CountingEngine {
        pub fn returning(rows: QueryRows) -> Arc<Self> {
            Arc::new(Self {
                rows: Ok(rows),
                explains: AtomicUsize::new(0),
                executions: AtomicUsize::new(0),
            })
        }

        pub fn failing(reason: &'static str) -> Arc<Self> {
            Arc::new(Self {
                rows: Err(reason),
                explains: AtomicUsize::new(0),
                executions: AtomicUsize::new(0),
            })
        }

        pub fn executions(&self) -> usize {
            self.executions.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl QueryEngine for CountingEngine {
        async fn explain(&self, _sql: &str) -> std::result::Result<Vec<String>, StoreError> {
            self.explains.fetch_add(1, Ordering::SeqCst);
            Ok(vec!["SCAN claims".to_string()])
        }

        async fn execute(&self, _query: &ValidatedQuery) -> std::result::Result<QueryRows, StoreError> {
            self.executions.fetch_add(1, Ordering::SeqCst);
            self.rows
                .clone()
                .map_err(|reason| StoreError::Decode {
                    column: "status".to_string(),
                    reason: reason.to_string(),
                })
        }
    }

    pub(crate) fn two_rows() -> QueryRows {
        let row = |id: &str| {
            json!({ "id": id, "status": "Approved" })
                .as_object()
                .cloned()
                .unwrap()
        };
        QueryRows {
            columns: vec!["id".to_string(), "status".to_string()],
            rows: vec![row("CLM-0000000001"), row("CLM-0000000002")],
            truncated: false,
        }
    }

    struct Harness {
        intent: Arc<ScriptedAgent<Intent>>,
        extraction: Arc<ScriptedAgent<PartialClaim>>,
        query: Arc<ScriptedAgent<QueryPlan>>,
        submitter: Arc<FakeSubmitter>,
        engine: Arc<CountingEngine>,
    }

    impl Harness {
        fn new(intent: Arc<ScriptedAgent<Intent>>) -> Self {
            Self {
                intent,
                extraction: ScriptedAgent::raw("{}"),
                query: ScriptedAgent::raw(r#"{"sql": "SELECT * FROM claims"}"#),
                submitter: FakeSubmitter::new(SubmitScript::Accept("CLM-4242424242")),
                engine: CountingEngine::returning(two_rows()),
            }
        }

        fn orchestrator(&self) -> TurnOrchestrator {
            TurnOrchestrator::builder()
                .intent_agent(self.intent.clone())
                .extraction_agent(self.extraction.clone())
                .query_agent(self.query.clone())
                .submitter(self.submitter.clone())
                .query_engine(self.engine.clone())
                .synthesizer(ClaimSynthesizer::seeded(17))
                .build()
                .unwrap()
        }
    }

    fn create_intent() -> Arc<ScriptedAgent<Intent>> {
        ScriptedAgent::raw(r#"{"action": "create", "query_details": null}"#)
    }

    fn retrieve_intent(details: &str) -> Arc<ScriptedAgent<Intent>> {
        ScriptedAgent::new(Script::Output(AgentOutput::Mapping(
            json!({ "action": "retrieve", "query_details": details }),
        )))
    }

    #[tokio::test]
    async fn test_create_with_no_fields_synthesizes_everything() {
        let harness = Harness::new(create_intent());
        let turn = harness.orchestrator().process_turn("I need to file a claim").await;

        assert!(turn.is_success(), "{:?}", turn.error);
        assert!(turn.message.contains("CLM-4242424242"));
        let payload = turn.artifacts.payload.as_ref().unwrap();
        assert!(!payload.policy_holder_name.is_empty());
        assert!(!payload.incident_description.is_empty());
        assert!(offices_for(&payload.company).unwrap().contains(&payload.claim_office.as_str()));
        assert_eq!(turn.artifacts.submitted.as_ref().unwrap().id, "CLM-4242424242");
        assert_eq!(harness.submitter.received.lock().unwrap().len(), 1);
        assert_eq!(harness.query.calls(), 0);
    }

    #[tokio::test]
    async fn test_create_discards_unknown_company() {
        let mut harness = Harness::new(create_intent());
        harness.extraction = ScriptedAgent::raw(
            r#"{"company": "Acme Insurance", "claim_office": "Nowhere Office", "point_of_impact": "front bumper"}"#,
        );
        let turn = harness.orchestrator().process_turn("Acme, Nowhere office, bumper").await;

        let extracted = turn.artifacts.extracted.as_ref().unwrap();
        assert_eq!(extracted.company.as_deref(), Some("Acme Insurance"));
        let payload = turn.artifacts.payload.as_ref().unwrap();
        assert_ne!(payload.company, "Acme Insurance");
        assert_ne!(payload.claim_office, "Nowhere Office");
        assert_eq!(payload.point_of_impact, "front bumper");
        assert!(offices_for(&payload.company).unwrap().contains(&payload.claim_office.as_str()));
    }

    #[tokio::test]
    async fn test_create_field_rejection_lists_fields() {
        let mut harness = Harness::new(create_intent());
        harness.submitter = FakeSubmitter::new(SubmitScript::Reject(vec![FieldIssue::body_field(
            "vehicle_year",
            "year out of range",
            "value_error",
        )]));
        let turn = harness.orchestrator().process_turn("my 1700 carriage broke").await;

        match turn.error.as_ref().unwrap() {
            TurnError::FieldValidation { fields } => assert_eq!(fields[0].field(), "vehicle_year"),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(turn.message.contains("vehicle_year"));
        assert!(turn.artifacts.payload.is_some());
        assert!(turn.artifacts.submitted.is_none());
    }

    #[tokio::test]
    async fn test_create_transport_failure() {
        let mut harness = Harness::new(create_intent());
        harness.submitter = FakeSubmitter::new(SubmitScript::Unreachable);
        let turn = harness.orchestrator().process_turn("hit a deer").await;

        assert!(matches!(turn.error, Some(TurnError::Submission { .. })));
        assert_eq!(
            turn.message,
            "Sorry, there was an error submitting the claim to the API."
        );
        assert!(turn.artifacts.payload.is_some());
    }

    #[tokio::test]
    async fn test_extraction_failure_stops_before_synthesis() {
        let mut harness = Harness::new(create_intent());
        harness.extraction = ScriptedAgent::raw("the user hit a tree");
        let turn = harness.orchestrator().process_turn("I hit a tree").await;

        assert!(matches!(turn.error, Some(TurnError::Extraction { .. })));
        assert!(turn.artifacts.payload.is_none());
        assert!(harness.submitter.received.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_intent_asks_for_clarification() {
        let harness = Harness::new(ScriptedAgent::new(Script::Output(AgentOutput::Typed(
            Intent::new(IntentAction::Unknown, None),
        ))));
        let turn = harness.orchestrator().process_turn("Thanks!").await;

        assert_eq!(turn.message, CLARIFICATION_PROMPT);
        assert!(turn.error.is_none());
        assert_eq!(harness.extraction.calls(), 0);
        assert_eq!(harness.query.calls(), 0);
    }

    #[tokio::test]
    async fn test_classification_failures_stop_the_turn() {
        for intent in [
            ScriptedAgent::new(Script::Fail("model unavailable")),
            ScriptedAgent::raw("create, probably"),
            ScriptedAgent::new(Script::Output(AgentOutput::Mapping(json!(["create"])))),
        ] {
            let harness = Harness::new(intent);
            let turn = harness.orchestrator().process_turn("hello").await;
            assert!(matches!(turn.error, Some(TurnError::Classification { .. })));
            assert!(turn.intent.is_none());
            assert!(!turn.message.is_empty());
            assert_eq!(harness.extraction.calls(), 0);
            assert_eq!(harness.query.calls(), 0);
        }
    }

    #[tokio::test]
    async fn test_retrieve_without_details_skips_generation() {
        for details in [json!(""), json!("   "), json!(null)] {
            let harness = Harness::new(ScriptedAgent::new(Script::Output(AgentOutput::Mapping(
                json!({ "action": "retrieve", "query_details": details }),
            ))));
            let turn = harness.orchestrator().process_turn("show me my claims").await;

            assert_eq!(turn.message, RETRIEVAL_DETAILS_PROMPT);
            assert!(turn.error.is_none());
            assert_eq!(harness.query.calls(), 0);
            assert_eq!(harness.engine.executions(), 0);
        }
    }

    #[tokio::test]
    async fn test_delete_statement_never_executes() {
        let mut harness = Harness::new(retrieve_intent("delete every claim"));
        harness.query = ScriptedAgent::raw(r#"{"sql": "DELETE FROM claims"}"#);
        let turn = harness.orchestrator().process_turn("delete every claim").await;

        match turn.error.as_ref().unwrap() {
            TurnError::QueryValidation { sql, .. } => assert_eq!(sql, "DELETE FROM claims"),
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(turn.artifacts.sql.as_deref(), Some("DELETE FROM claims"));
        assert_eq!(harness.engine.explains.load(Ordering::SeqCst), 0);
        assert_eq!(harness.engine.executions(), 0);
    }

    #[tokio::test]
    async fn test_stacked_statement_never_executes() {
        let mut harness = Harness::new(retrieve_intent("approved claims"));
        harness.query = ScriptedAgent::new(Script::Output(AgentOutput::Typed(QueryPlan::Query(
            SqlQuery {
                sql: "SELECT * FROM claims; DROP TABLE claims".to_string(),
                explanation: None,
            },
        ))));
        let turn = harness.orchestrator().process_turn("approved claims").await;

        assert!(matches!(turn.error, Some(TurnError::QueryValidation { .. })));
        assert!(turn.message.contains("failed validation"));
        assert_eq!(harness.engine.executions(), 0);
    }

    #[tokio::test]
    async fn test_invalid_request_is_surfaced_verbatim() {
        let mut harness = Harness::new(retrieve_intent("details about a claim"));
        harness.query = ScriptedAgent::raw(
            r#"{"error_message": "Please provide more specific details for the claim you want to retrieve."}"#,
        );
        let turn = harness.orchestrator().process_turn("details about a claim").await;

        assert_eq!(
            turn.error,
            Some(TurnError::InvalidRequest {
                message: "Please provide more specific details for the claim you want to retrieve."
                    .to_string()
            })
        );
        assert!(turn.artifacts.sql.is_none());
        assert_eq!(harness.engine.explains.load(Ordering::SeqCst), 0);
        assert_eq!(harness.engine.executions(), 0);
    }

    #[tokio::test]
    async fn test_generation_failure() {
        let mut harness = Harness::new(retrieve_intent("claims for John Doe"));
        harness.query = ScriptedAgent::raw(r#"{"sql": "SELECT 1", "error_message": "both"}"#);
        let turn = harness.orchestrator().process_turn("claims for John Doe").await;

        assert!(matches!(turn.error, Some(TurnError::Generation { .. })));
        assert_eq!(harness.engine.executions(), 0);
    }

    #[tokio::test]
    async fn test_retrieve_success_reports_rows_and_explanation() {
        let mut harness = Harness::new(retrieve_intent("approved claims"));
        harness.query = ScriptedAgent::raw(
            r#"{"sql": "SELECT * FROM claims WHERE status = 'Approved';", "explanation": "Selects approved claims."}"#,
        );
        let turn = harness.orchestrator().process_turn("list approved claims").await;

        assert!(turn.is_success(), "{:?}", turn.error);
        assert!(turn.message.starts_with("Okay, I found 2 claim(s)"));
        assert!(turn.message.ends_with("Query Explanation: Selects approved claims."));
        assert_eq!(turn.artifacts.rows.as_ref().unwrap().len(), 2);
        assert_eq!(turn.artifacts.query_plan.as_deref(), Some(&["SCAN claims".to_string()][..]));
        assert_eq!(harness.engine.executions(), 1);
    }

    #[tokio::test]
    async fn test_execution_failure_keeps_query() {
        let mut harness = Harness::new(retrieve_intent("approved claims"));
        harness.engine = CountingEngine::failing("malformed literal");
        let turn = harness.orchestrator().process_turn("approved claims").await;

        assert!(matches!(turn.error, Some(TurnError::Execution { .. })));
        assert!(turn.message.contains("failed to execute"));
        assert_eq!(turn.artifacts.sql.as_deref(), Some("SELECT * FROM claims"));
        assert!(turn.artifacts.rows.is_none());
    }

    #[tokio::test]
    async fn test_panicking_stage_is_contained() {
        let mut harness = Harness::new(create_intent());
        harness.extraction = ScriptedAgent::new(Script::Panic);
        let turn = harness.orchestrator().process_turn("I crashed").await;

        match turn.error.as_ref().unwrap() {
            TurnError::Internal { detail } => assert_eq!(detail, "agent exploded"),
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(
            turn.message,
            "Sorry, an unexpected error occurred while processing your request."
        );
        assert_eq!(turn.intent.as_ref().unwrap().action, IntentAction::Create);
    }

    #[test]
    fn test_builder_requires_components() {
        let err = TurnOrchestrator::builder().build().err().unwrap();
        assert!(matches!(err, FlowError::MissingComponent("query engine")));
    }
}
