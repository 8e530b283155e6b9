//! Thin persistence API over the claims table. The chat pipeline submits
//! synthesized claims here over HTTP.

use axum::{
    Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
    routing::get,
};
use chrono::NaiveDateTime;
use claims_flow::{
    Claim, ClaimCreate, FieldIssue, HttpValidationError, StoreError,
    models::{LocSegment, incident_date},
};
use serde_json::{Map, Value, json};
use tracing::{error, info, warn};

use crate::service::{ApiError, ApiResult, AppState, internal_error, not_found_error};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/claims", get(list_claims).post(create_claim))
        .route("/claims/{id}", get(read_claim))
}

fn validation_error(issues: Vec<FieldIssue>) -> ApiError {
    let body = HttpValidationError {
        detail: Some(issues),
    };
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(serde_json::to_value(body).unwrap_or_else(|_| json!({ "detail": [] }))),
    )
}

async fn create_claim(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Claim>), ApiError> {
    let Json(payload) = payload.map_err(|rejection| {
        warn!(error = %rejection, "Claim payload is not valid JSON");
        validation_error(vec![FieldIssue {
            loc: vec![LocSegment::Name("body".to_string())],
            msg: rejection.body_text(),
            kind: "json_invalid".to_string(),
        }])
    })?;

    let record = validate_claim(&payload).map_err(|issues| {
        warn!(
            fields = ?issues.iter().map(FieldIssue::field).collect::<Vec<_>>(),
            "Claim payload failed validation"
        );
        validation_error(issues)
    })?;

    match state.store.insert_claim(&record).await {
        Ok(claim) => {
            info!(claim_id = %claim.id, "Claim persisted");
            Ok((StatusCode::CREATED, Json(claim)))
        }
        Err(StoreError::DuplicatePolicyNumber(policy_number)) => {
            warn!(policy_number = %policy_number, "Duplicate policy number");
            Err((
                StatusCode::CONFLICT,
                Json(json!({
                    "error": "A claim with this policy number already exists",
                    "policy_number": policy_number
                })),
            ))
        }
        Err(e) => {
            error!(error = %e, "Failed to persist claim");
            Err(internal_error("Failed to persist claim", &e.to_string()))
        }
    }
}

async fn read_claim(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Claim> {
    match state.store.get_claim(&id).await {
        Ok(Some(claim)) => Ok(Json(claim)),
        Ok(None) => Err(not_found_error("Claim not found", &id)),
        Err(e) => {
            error!(claim_id = %id, error = %e, "Failed to load claim");
            Err(internal_error("Failed to load claim", &e.to_string()))
        }
    }
}

async fn list_claims(State(state): State<AppState>) -> ApiResult<Vec<Claim>> {
    state.store.list_claims().await.map(Json).map_err(|e| {
        error!(error = %e, "Failed to list claims");
        internal_error("Failed to list claims", &e.to_string())
    })
}

/// Checks every field of a claim payload and reports all problems at once
pub fn validate_claim(payload: &Value) -> Result<ClaimCreate, Vec<FieldIssue>> {
    let Some(fields) = payload.as_object() else {
        return Err(vec![FieldIssue {
            loc: vec![LocSegment::Name("body".to_string())],
            msg: "Input should be a valid dictionary".to_string(),
            kind: "model_attributes_type".to_string(),
        }]);
    };

    let mut issues = Vec::new();
    let mut text = |name: &str| required_text(fields, name, &mut issues);

    let policy_holder_name = text("policy_holder_name");
    let policy_number = text("policy_number");
    let vehicle_make = text("vehicle_make");
    let vehicle_model = text("vehicle_model");
    let incident_description = text("incident_description");
    let adjuster_name = text("adjuster_name");
    let status = text("status");
    let company = text("company");
    let claim_office = text("claim_office");
    let point_of_impact = text("point_of_impact");
    let vehicle_year = required_year(fields, &mut issues);
    let incident_date = required_datetime(fields, &mut issues);

    match (
        policy_holder_name,
        policy_number,
        vehicle_make,
        vehicle_model,
        vehicle_year,
        incident_date,
        incident_description,
        adjuster_name,
        status,
        company,
        claim_office,
        point_of_impact,
    ) {
        (
            Some(policy_holder_name),
            Some(policy_number),
            Some(vehicle_make),
            Some(vehicle_model),
            Some(vehicle_year),
            Some(incident_date),
            Some(incident_description),
            Some(adjuster_name),
            Some(status),
            Some(company),
            Some(claim_office),
            Some(point_of_impact),
        ) if issues.is_empty() => Ok(ClaimCreate {
            policy_holder_name,
            policy_number,
            vehicle_make,
            vehicle_model,
            vehicle_year,
            incident_date,
            incident_description,
            adjuster_name,
            status,
            company,
            claim_office,
            point_of_impact,
        }),
        _ => Err(issues),
    }
}

fn missing(name: &str) -> FieldIssue {
    FieldIssue::body_field(name, "Field required", "missing")
}

fn required_text(
    fields: &Map<String, Value>,
    name: &str,
    issues: &mut Vec<FieldIssue>,
) -> Option<String> {
    match fields.get(name) {
        None | Some(Value::Null) => {
            issues.push(missing(name));
            None
        }
        Some(Value::String(value)) => Some(value.clone()),
        Some(_) => {
            issues.push(FieldIssue::body_field(
                name,
                "Input should be a valid string",
                "string_type",
            ));
            None
        }
    }
}

fn required_year(fields: &Map<String, Value>, issues: &mut Vec<FieldIssue>) -> Option<i32> {
    const NAME: &str = "vehicle_year";
    let parsed = match fields.get(NAME) {
        None | Some(Value::Null) => {
            issues.push(missing(NAME));
            return None;
        }
        Some(Value::Number(number)) => number.as_i64().and_then(|n| i32::try_from(n).ok()),
        Some(Value::String(raw)) => raw.trim().parse::<i32>().ok(),
        Some(_) => None,
    };
    if parsed.is_none() {
        issues.push(FieldIssue::body_field(
            NAME,
            "Input should be a valid integer",
            "int_parsing",
        ));
    }
    parsed
}

fn required_datetime(
    fields: &Map<String, Value>,
    issues: &mut Vec<FieldIssue>,
) -> Option<NaiveDateTime> {
    const NAME: &str = "incident_date";
    let parsed = match fields.get(NAME) {
        None | Some(Value::Null) => {
            issues.push(missing(NAME));
            return None;
        }
        Some(Value::String(raw)) => incident_date::parse(raw),
        Some(_) => None,
    };
    if parsed.is_none() {
        issues.push(FieldIssue::body_field(
            NAME,
            "Input should be a valid datetime",
            "datetime_parsing",
        ));
    }
    parsed
}
