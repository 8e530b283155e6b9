//! Safety gate for generated SQL.
//!
//! A statement may run only if it is a single `SELECT` that reads from the
//! `claims` relation and nothing else. The statement is parsed with the SQLite
//! dialect and its syntax tree is walked before anything reaches the engine;
//! the engine's planner is consulted afterwards. What executes is the parsed
//! statement rendered back to text, never the raw generator output.
//! Only a [`ValidatedQuery`] can be handed to [`QueryEngine::execute`].

use std::{ops::ControlFlow, sync::Arc};

use sqlparser::{
    ast::{Expr, ObjectName, Query, SetExpr, Statement, TableFactor, Visit, Visitor},
    dialect::SQLiteDialect,
    parser::Parser,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::store::{QueryEngine, StoreError};

pub const CLAIMS_RELATION: &str = "claims";

/// Scalar functions that reach outside the database
const FORBIDDEN_FUNCTIONS: &[&str] = &[
    "load_extension",
    "readfile",
    "writefile",
    "edit",
    "fts3_tokenizer",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    #[error("the query is empty")]
    Empty,

    #[error("the query could not be parsed: {0}")]
    Syntax(String),

    #[error("only a single statement is allowed")]
    MultipleStatements,

    #[error("only SELECT statements are allowed, found `{0}`")]
    NotSelect(String),

    #[error("function `{0}` is not allowed in a read-only query")]
    ForbiddenFunction(String),

    #[error("only the `claims` table may be queried, found `{0}`")]
    ForeignRelation(String),

    #[error("table-valued function `{0}` is not allowed")]
    TableFunction(String),

    #[error("the query does not read from the `claims` table")]
    MissingRelation,

    #[error("the query planner rejected the statement: {0}")]
    Planner(String),
}

/// Walks a parsed statement and stops at the first thing a read-only
/// claims query may not contain.
#[derive(Default)]
struct RelationGuard {
    saw_claims: bool,
}

impl Visitor for RelationGuard {
    type Break = GuardError;

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<GuardError> {
        if query.with.is_some() {
            return ControlFlow::Break(GuardError::NotSelect("WITH".to_string()));
        }
        match check_body(&query.body) {
            Ok(()) => ControlFlow::Continue(()),
            Err(e) => ControlFlow::Break(e),
        }
    }

    fn pre_visit_table_factor(&mut self, factor: &TableFactor) -> ControlFlow<GuardError> {
        match factor {
            TableFactor::Table {
                name,
                args: Some(_),
                ..
            } => ControlFlow::Break(GuardError::TableFunction(name.to_string())),
            TableFactor::Table { .. }
            | TableFactor::Derived { .. }
            | TableFactor::NestedJoin { .. } => ControlFlow::Continue(()),
            other => ControlFlow::Break(GuardError::TableFunction(other.to_string())),
        }
    }

    fn pre_visit_relation(&mut self, relation: &ObjectName) -> ControlFlow<GuardError> {
        if !is_claims(relation) {
            return ControlFlow::Break(GuardError::ForeignRelation(relation.to_string()));
        }
        self.saw_claims = true;
        ControlFlow::Continue(())
    }

    fn pre_visit_expr(&mut self, expr: &Expr) -> ControlFlow<GuardError> {
        let Expr::Function(function) = expr else {
            return ControlFlow::Continue(());
        };
        let name = function
            .name
            .0
            .last()
            .map(|ident| ident.value.to_ascii_lowercase())
            .unwrap_or_default();
        if FORBIDDEN_FUNCTIONS.contains(&name.as_str()) {
            return ControlFlow::Break(GuardError::ForbiddenFunction(name));
        }
        ControlFlow::Continue(())
    }
}

/// Set operations are allowed as long as every branch is a plain SELECT.
/// Nested queries are checked when the visitor reaches them.
fn check_body(body: &SetExpr) -> Result<(), GuardError> {
    match body {
        SetExpr::Select(select) if select.into.is_some() => {
            Err(GuardError::NotSelect("SELECT INTO".to_string()))
        }
        SetExpr::Select(_) | SetExpr::Query(_) => Ok(()),
        SetExpr::SetOperation { left, right, .. } => {
            check_body(left)?;
            check_body(right)
        }
        other => Err(GuardError::NotSelect(leading_keyword(&other.to_string()))),
    }
}

/// `claims` or `main.claims`, compared the way SQLite compares identifiers
fn is_claims(name: &ObjectName) -> bool {
    match name.0.as_slice() {
        [table] => table.value.eq_ignore_ascii_case(CLAIMS_RELATION),
        [schema, table] => {
            schema.value.eq_ignore_ascii_case("main")
                && table.value.eq_ignore_ascii_case(CLAIMS_RELATION)
        }
        _ => false,
    }
}

fn leading_keyword(rendered: &str) -> String {
    rendered
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase()
}

/// Checks `sql` structurally and returns the statement as it will be executed.
pub fn inspect(sql: &str) -> Result<String, GuardError> {
    if sql.trim().trim_matches(';').trim().is_empty() {
        return Err(GuardError::Empty);
    }

    let mut statements = Parser::parse_sql(&SQLiteDialect {}, sql)
        .map_err(|e| GuardError::Syntax(e.to_string()))?;
    let statement = match statements.len() {
        0 => return Err(GuardError::Empty),
        1 => statements.remove(0),
        _ => return Err(GuardError::MultipleStatements),
    };
    if !matches!(statement, Statement::Query(_)) {
        return Err(GuardError::NotSelect(leading_keyword(&statement.to_string())));
    }

    let mut guard = RelationGuard::default();
    if let ControlFlow::Break(e) = statement.visit(&mut guard) {
        return Err(e);
    }
    if !guard.saw_claims {
        return Err(GuardError::MissingRelation);
    }
    Ok(statement.to_string())
}

/// A statement that passed both the structural guard and the planner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedQuery {
    sql: String,
    plan: Vec<String>,
}

impl ValidatedQuery {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn plan(&self) -> &[String] {
        &self.plan
    }
}

/// Structural guard followed by the engine's planner
#[derive(Clone)]
pub struct QueryValidator {
    engine: Arc<dyn QueryEngine>,
}

impl QueryValidator {
    pub fn new(engine: Arc<dyn QueryEngine>) -> Self {
        Self { engine }
    }

    pub async fn validate(&self, sql: &str) -> Result<ValidatedQuery, GuardError> {
        let statement = inspect(sql).inspect_err(|e| {
            warn!(error = %e, sql = %sql, "Generated query rejected by structural guard");
        })?;

        let plan = self
            .engine
            .explain(&statement)
            .await
            .map_err(|e| match e {
                StoreError::Database(db) => GuardError::Planner(db.to_string()),
                other => GuardError::Planner(other.to_string()),
            })?;
        debug!(steps = plan.len(), "Query plan accepted");

        Ok(ValidatedQuery {
            sql: statement,
            plan,
        })
    }
}
