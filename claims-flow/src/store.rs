use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use serde_json::Value;
use sqlx::{
    Column, Row, TypeInfo, ValueRef,
    sqlite::{SqlitePoolOptions, SqliteRow},
};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    models::{Claim, ClaimCreate, QueryRows, Row as ResultRow},
    sql_guard::ValidatedQuery,
};

pub type DbPool = sqlx::SqlitePool;

pub const DEFAULT_ROW_LIMIT: usize = 500;
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(15);

pub const CLAIMS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS claims (
    id TEXT PRIMARY KEY NOT NULL,
    policy_holder_name TEXT NOT NULL,
    policy_number TEXT NOT NULL UNIQUE,
    vehicle_make TEXT NOT NULL,
    vehicle_model TEXT NOT NULL,
    vehicle_year INTEGER NOT NULL,
    incident_date DATETIME NOT NULL,
    incident_description TEXT NOT NULL,
    adjuster_name TEXT NOT NULL,
    status TEXT NOT NULL,
    company TEXT NOT NULL,
    claim_office TEXT NOT NULL,
    point_of_impact TEXT NOT NULL
)
"#;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("query timed out after {0:?}")]
    Timeout(Duration),

    #[error("policy number {0} already has a claim")]
    DuplicatePolicyNumber(String),

    #[error("could not decode column `{column}`: {reason}")]
    Decode { column: String, reason: String },
}

pub async fn connect(database_url: &str) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(database_url, 5, 30).await
}

pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA busy_timeout = 5000")
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await
}

/// Read side of the claims relation used by the retrieval branch
#[async_trait]
pub trait QueryEngine: Send + Sync {
    /// Planner output for `sql`, one line per plan step
    async fn explain(&self, sql: &str) -> Result<Vec<String>, StoreError>;

    async fn execute(&self, query: &ValidatedQuery) -> Result<QueryRows, StoreError>;
}

/// SQLite-backed claims relation
#[derive(Clone)]
pub struct ClaimsStore {
    pool: DbPool,
    row_limit: usize,
    query_timeout: Duration,
}

impl ClaimsStore {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            row_limit: DEFAULT_ROW_LIMIT,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    pub fn with_row_limit(mut self, row_limit: usize) -> Self {
        self.row_limit = row_limit.max(1);
        self
    }

    pub fn with_query_timeout(mut self, query_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(CLAIMS_SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    /// Persists a claim under a freshly generated identifier
    pub async fn insert_claim(&self, record: &ClaimCreate) -> Result<Claim, StoreError> {
        let id = generate_claim_id();
        let result = sqlx::query(
            "INSERT INTO claims (id, policy_holder_name, policy_number, vehicle_make, vehicle_model, \
             vehicle_year, incident_date, incident_description, adjuster_name, status, company, \
             claim_office, point_of_impact) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&record.policy_holder_name)
        .bind(&record.policy_number)
        .bind(&record.vehicle_make)
        .bind(&record.vehicle_model)
        .bind(record.vehicle_year)
        .bind(record.incident_date)
        .bind(&record.incident_description)
        .bind(&record.adjuster_name)
        .bind(&record.status)
        .bind(&record.company)
        .bind(&record.claim_office)
        .bind(&record.point_of_impact)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                info!(claim_id = %id, policy_number = %record.policy_number, "Claim stored");
                Ok(Claim {
                    id,
                    record: record.clone(),
                })
            }
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(
                StoreError::DuplicatePolicyNumber(record.policy_number.clone()),
            ),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_claim(&self, id: &str) -> Result<Option<Claim>, StoreError> {
        let row = sqlx::query("SELECT * FROM claims WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_claim).transpose()
    }

    pub async fn list_claims(&self) -> Result<Vec<Claim>, StoreError> {
        let rows = sqlx::query("SELECT * FROM claims ORDER BY incident_date DESC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_claim).collect()
    }

    async fn fetch_bounded(&self, sql: &str) -> Result<QueryRows, StoreError> {
        let mut stream = sqlx::query(sql).fetch(&self.pool);
        let mut result = QueryRows::default();
        while let Some(row) = stream.try_next().await? {
            if result.rows.len() == self.row_limit {
                result.truncated = true;
                break;
            }
            if result.columns.is_empty() {
                result.columns = row.columns().iter().map(|c| c.name().to_string()).collect();
            }
            result.rows.push(row_to_json(&row)?);
        }
        Ok(result)
    }
}

#[async_trait]
impl QueryEngine for ClaimsStore {
    async fn explain(&self, sql: &str) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query(&format!("EXPLAIN QUERY PLAN {sql}"))
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("detail")
                    .map_err(|e| decode_error("detail", e))
            })
            .collect()
    }

    async fn execute(&self, query: &ValidatedQuery) -> Result<QueryRows, StoreError> {
        debug!(sql = %query.sql(), row_limit = self.row_limit, "Executing validated query");
        tokio::time::timeout(self.query_timeout, self.fetch_bounded(query.sql()))
            .await
            .map_err(|_| StoreError::Timeout(self.query_timeout))?
    }
}

/// `CLM-` followed by the first ten digits of a random 128-bit value
pub fn generate_claim_id() -> String {
    let digits = Uuid::new_v4().as_u128().to_string();
    format!("CLM-{}", &digits[..10.min(digits.len())])
}

fn decode_error(column: &str, e: sqlx::Error) -> StoreError {
    StoreError::Decode {
        column: column.to_string(),
        reason: e.to_string(),
    }
}

fn row_to_claim(row: &SqliteRow) -> Result<Claim, StoreError> {
    fn get<'r, T>(row: &'r SqliteRow, column: &str) -> Result<T, StoreError>
    where
        T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
    {
        row.try_get(column).map_err(|e| decode_error(column, e))
    }

    Ok(Claim {
        id: get(row, "id")?,
        record: ClaimCreate {
            policy_holder_name: get(row, "policy_holder_name")?,
            policy_number: get(row, "policy_number")?,
            vehicle_make: get(row, "vehicle_make")?,
            vehicle_model: get(row, "vehicle_model")?,
            vehicle_year: get(row, "vehicle_year")?,
            incident_date: get(row, "incident_date")?,
            incident_description: get(row, "incident_description")?,
            adjuster_name: get(row, "adjuster_name")?,
            status: get(row, "status")?,
            company: get(row, "company")?,
            claim_office: get(row, "claim_office")?,
            point_of_impact: get(row, "point_of_impact")?,
        },
    })
}

/// Converts a dynamically typed row into a JSON object keyed by column name
fn row_to_json(row: &SqliteRow) -> Result<ResultRow, StoreError> {
    let mut object = ResultRow::new();
    for column in row.columns() {
        let index = column.ordinal();
        let name = column.name();
        let raw = row.try_get_raw(index).map_err(|e| decode_error(name, e))?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            let type_name = raw.type_info().name().to_ascii_uppercase();
            match type_name.as_str() {
                "INTEGER" | "INT" | "BIGINT" | "BOOLEAN" => row
                    .try_get_unchecked::<i64, _>(index)
                    .map(Value::from)
                    .map_err(|e| decode_error(name, e))?,
                "REAL" | "NUMERIC" => row
                    .try_get_unchecked::<f64, _>(index)
                    .map(Value::from)
                    .map_err(|e| decode_error(name, e))?,
                "BLOB" => {
                    let bytes = row
                        .try_get_unchecked::<Vec<u8>, _>(index)
                        .map_err(|e| decode_error(name, e))?;
                    Value::String(format!("<{} bytes>", bytes.len()))
                }
                _ => row
                    .try_get_unchecked::<String, _>(index)
                    .map(Value::String)
                    .map_err(|e| decode_error(name, e))?,
            }
        };
        object.insert(name.to_string(), value);
    }
    Ok(object)
}
