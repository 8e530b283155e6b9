use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{Claim, ClaimCreate, FieldIssue, HttpValidationError};

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("claims API rejected {} field(s)", .0.len())]
    Rejected(Vec<FieldIssue>),

    #[error("claims API returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not reach claims API: {0}")]
    Transport(String),

    #[error("unexpected claims API response: {0}")]
    Decode(String),
}

/// Sends complete claims to the persistence service
#[async_trait]
pub trait ClaimSubmitter: Send + Sync {
    async fn submit(&self, record: &ClaimCreate) -> Result<Claim, SubmitError>;
}

/// `POST {base_url}/claims` over HTTP
#[derive(Clone)]
pub struct HttpClaimSubmitter {
    client: reqwest::Client,
    base_url: String,
}

impl HttpClaimSubmitter {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SubmitError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SubmitError::Transport(e.to_string()))?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    fn claims_url(&self) -> String {
        format!("{}/claims", self.base_url)
    }
}

#[async_trait]
impl ClaimSubmitter for HttpClaimSubmitter {
    async fn submit(&self, record: &ClaimCreate) -> Result<Claim, SubmitError> {
        let url = self.claims_url();
        info!(url = %url, policy_number = %record.policy_number, "Submitting claim");

        let response = self
            .client
            .post(&url)
            .json(record)
            .send()
            .await
            .map_err(|e| SubmitError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNPROCESSABLE_ENTITY {
            let body = response
                .text()
                .await
                .map_err(|e| SubmitError::Transport(e.to_string()))?;
            return match serde_json::from_str::<HttpValidationError>(&body) {
                Ok(validation) => {
                    let issues = validation.detail.unwrap_or_default();
                    warn!(fields = issues.len(), "Claims API rejected the payload");
                    Err(SubmitError::Rejected(issues))
                }
                Err(_) => Err(SubmitError::Status {
                    status: status.as_u16(),
                    body,
                }),
            };
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SubmitError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<Claim>()
            .await
            .map_err(|e| SubmitError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, http::StatusCode as AxumStatus, routing::post};
    use chrono::NaiveDate;
    use serde_json::{Value, json};

    fn record() -> ClaimCreate {
        ClaimCreate {
            policy_holder_name: "Noah Evans".to_string(),
            policy_number: "POL-555555".to_string(),
            vehicle_make: "Ford".to_string(),
            vehicle_model: "F-150".to_string(),
            vehicle_year: 2019,
            incident_date: NaiveDate::from_ymd_opt(2025, 3, 2)
                .and_then(|d| d.and_hms_opt(14, 0, 0))
                .unwrap(),
            incident_description: "Hit a pothole causing tire damage.".to_string(),
            adjuster_name: "Liam Jenkins".to_string(),
            status: "Submitted".to_string(),
            company: "Delta Insurance".to_string(),
            claim_office: "Dallas Office".to_string(),
            point_of_impact: "Windshield".to_string(),
        }
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/")
    }

    fn submitter(base_url: String) -> HttpClaimSubmitter {
        HttpClaimSubmitter::new(base_url, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_submit_success_returns_persisted_claim() {
        let router = Router::new().route(
            "/claims",
            post(|Json(mut body): Json<Value>| async move {
                body["id"] = json!("CLM-1234567890");
                Json(body)
            }),
        );
        let claim = submitter(serve(router).await).submit(&record()).await.unwrap();
        assert_eq!(claim.id, "CLM-1234567890");
        assert_eq!(claim.record, record());
    }

    #[tokio::test]
    async fn test_submit_field_rejection() {
        let router = Router::new().route(
            "/claims",
            post(|| async {
                (
                    AxumStatus::UNPROCESSABLE_ENTITY,
                    Json(json!({
                        "detail": [
                            { "loc": ["body", "vehicle_year"], "msg": "year out of range", "type": "value_error" }
                        ]
                    })),
                )
            }),
        );
        let err = submitter(serve(router).await).submit(&record()).await.unwrap_err();
        match err {
            SubmitError::Rejected(issues) => {
                assert_eq!(issues.len(), 1);
                assert_eq!(issues[0].field(), "vehicle_year");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_submit_other_status() {
        let router = Router::new().route(
            "/claims",
            post(|| async { (AxumStatus::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let err = submitter(serve(router).await).submit(&record()).await.unwrap_err();
        assert!(matches!(err, SubmitError::Status { status: 500, ref body } if body == "boom"));
    }

    #[tokio::test]
    async fn test_submit_unreachable_service() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let err = submitter(format!("http://{addr}"))
            .submit(&record())
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::Transport(_)));
    }
}
