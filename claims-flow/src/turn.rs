use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::TurnError,
    models::{Claim, ClaimCreate, Intent, PartialClaim, QueryRows},
};

/// Intermediate values produced by the stages a turn went through
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnArtifacts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted: Option<PartialClaim>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<ClaimCreate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted: Option<Claim>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_plan: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<QueryRows>,
}

/// Completed turn, as stored in the conversation log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnResult {
    pub turn_id: Uuid,
    pub user_text: String,
    pub intent: Option<Intent>,
    pub artifacts: TurnArtifacts,
    pub message: String,
    pub error: Option<TurnError>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl TurnResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// A turn in progress. Stages fill in artifacts; `finish` freezes it.
#[derive(Debug)]
pub(crate) struct TurnDraft {
    pub user_text: String,
    pub intent: Option<Intent>,
    pub artifacts: TurnArtifacts,
    started_at: DateTime<Utc>,
}

impl TurnDraft {
    pub fn begin(user_text: &str) -> Self {
        Self {
            user_text: user_text.to_string(),
            intent: None,
            artifacts: TurnArtifacts::default(),
            started_at: Utc::now(),
        }
    }

    pub fn finish(self, message: String, error: Option<TurnError>) -> TurnResult {
        TurnResult {
            turn_id: Uuid::new_v4(),
            user_text: self.user_text,
            intent: self.intent,
            artifacts: self.artifacts,
            message,
            error,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}
