use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// What the user wants to do this turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentAction {
    Create,
    Retrieve,
    Unknown,
}

impl IntentAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentAction::Create => "create",
            IntentAction::Retrieve => "retrieve",
            IntentAction::Unknown => "unknown",
        }
    }
}

/// Classified intent of a single utterance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub action: IntentAction,
    #[serde(default)]
    pub query_details: Option<String>,
}

impl Intent {
    pub fn new(action: IntentAction, query_details: Option<String>) -> Self {
        Self {
            action,
            query_details,
        }
    }

    /// Retrieval filter with surrounding whitespace removed, `None` when blank
    pub fn query_filter(&self) -> Option<&str> {
        self.query_details
            .as_deref()
            .map(str::trim)
            .filter(|details| !details.is_empty())
    }
}

/// Claim fields the user actually mentioned. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialClaim {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_holder_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_make: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_year: Option<i32>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "incident_date::deserialize_option"
    )]
    pub incident_date: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incident_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjuster_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_office: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point_of_impact: Option<String>,
}

impl PartialClaim {
    /// Names of the fields that carry a usable value
    pub fn provided_fields(&self) -> Vec<&'static str> {
        let text = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.trim().is_empty());
        let mut fields = Vec::new();
        if text(&self.policy_holder_name) {
            fields.push("policy_holder_name");
        }
        if text(&self.policy_number) {
            fields.push("policy_number");
        }
        if text(&self.vehicle_make) {
            fields.push("vehicle_make");
        }
        if text(&self.vehicle_model) {
            fields.push("vehicle_model");
        }
        if self.vehicle_year.is_some_and(|year| year != 0) {
            fields.push("vehicle_year");
        }
        if self.incident_date.is_some() {
            fields.push("incident_date");
        }
        if text(&self.incident_description) {
            fields.push("incident_description");
        }
        if text(&self.adjuster_name) {
            fields.push("adjuster_name");
        }
        if text(&self.status) {
            fields.push("status");
        }
        if text(&self.company) {
            fields.push("company");
        }
        if text(&self.claim_office) {
            fields.push("claim_office");
        }
        if text(&self.point_of_impact) {
            fields.push("point_of_impact");
        }
        fields
    }
}

/// A fully populated claim, ready to be sent to the claims API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimCreate {
    pub policy_holder_name: String,
    pub policy_number: String,
    pub vehicle_make: String,
    pub vehicle_model: String,
    pub vehicle_year: i32,
    #[serde(deserialize_with = "incident_date::deserialize")]
    pub incident_date: NaiveDateTime,
    pub incident_description: String,
    pub adjuster_name: String,
    pub status: String,
    pub company: String,
    pub claim_office: String,
    pub point_of_impact: String,
}

/// A claim as persisted by the claims API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub id: String,
    #[serde(flatten)]
    pub record: ClaimCreate,
}

/// A generated read-only query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlQuery {
    pub sql: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Output of the query generation agent: a query, or a refusal. Never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "QueryPlanWire", into = "QueryPlanWire")]
pub enum QueryPlan {
    Query(SqlQuery),
    Invalid { error_message: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct QueryPlanWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sql: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
}

impl TryFrom<QueryPlanWire> for QueryPlan {
    type Error = String;

    fn try_from(wire: QueryPlanWire) -> Result<Self, Self::Error> {
        let non_blank = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        match (non_blank(wire.sql), non_blank(wire.error_message)) {
            (Some(sql), None) => Ok(QueryPlan::Query(SqlQuery {
                sql,
                explanation: non_blank(wire.explanation),
            })),
            (None, Some(error_message)) => Ok(QueryPlan::Invalid { error_message }),
            (Some(_), Some(_)) => {
                Err("query plan carries both `sql` and `error_message`".to_string())
            }
            (None, None) => Err("query plan carries neither `sql` nor `error_message`".to_string()),
        }
    }
}

impl From<QueryPlan> for QueryPlanWire {
    fn from(plan: QueryPlan) -> Self {
        match plan {
            QueryPlan::Query(query) => QueryPlanWire {
                sql: Some(query.sql),
                explanation: query.explanation,
                error_message: None,
            },
            QueryPlan::Invalid { error_message } => QueryPlanWire {
                error_message: Some(error_message),
                ..Default::default()
            },
        }
    }
}

/// One segment of a validation error location, e.g. `["body", "vehicle_year"]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocSegment {
    Index(i64),
    Name(String),
}

/// A single field rejected by the claims API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    pub loc: Vec<LocSegment>,
    pub msg: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl FieldIssue {
    pub fn body_field(field: &str, msg: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            loc: vec![
                LocSegment::Name("body".to_string()),
                LocSegment::Name(field.to_string()),
            ],
            msg: msg.into(),
            kind: kind.into(),
        }
    }

    /// Field name the issue points at, without the leading `body` segment
    pub fn field(&self) -> String {
        let path: Vec<String> = self
            .loc
            .iter()
            .filter(|segment| !matches!(segment, LocSegment::Name(name) if name == "body"))
            .map(|segment| match segment {
                LocSegment::Name(name) => name.clone(),
                LocSegment::Index(index) => index.to_string(),
            })
            .collect();
        if path.is_empty() {
            "body".to_string()
        } else {
            path.join(".")
        }
    }
}

/// Error body returned by the claims API with status 422
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpValidationError {
    #[serde(default)]
    pub detail: Option<Vec<FieldIssue>>,
}

/// One result row, keyed by column name
pub type Row = Map<String, Value>;

/// Bounded result set of an executed query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub truncated: bool,
}

impl QueryRows {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Lenient incident date parsing: RFC 3339, naive date-times and bare dates
pub mod incident_date {
    use chrono::{DateTime, NaiveDate, NaiveDateTime};
    use serde::{Deserialize, Deserializer, de::Error};

    const NAIVE_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];

    pub fn parse(raw: &str) -> Option<NaiveDateTime> {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.naive_utc());
        }
        for format in NAIVE_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
                return Some(dt);
            }
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("unrecognized date `{raw}`")))
    }

    pub fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(raw) if raw.trim().is_empty() => Ok(None),
            Some(raw) => parse(&raw)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("unrecognized date `{raw}`"))),
        }
    }
}
