//! Stored-procedure invocation contract.
//!
//! Callers name a procedure, pass typed named parameters and declare the
//! result shape they expect. Rows come back as JSON objects with snake_case
//! keys. Adapters raise [`DatabaseError::BusinessRule`] for rule violations.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use serde_json::{Map, Value};

use super::manager::DatabaseError;

pub type Row = Map<String, Value>;

/// A typed procedure argument; `None` binds SQL NULL.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    BigInt(Option<i64>),
    Int(Option<i32>),
    Text(Option<String>),
    Date(Option<NaiveDate>),
    Time(Option<NaiveTime>),
}

impl SqlValue {
    pub fn pg_type(&self) -> &'static str {
        match self {
            SqlValue::BigInt(_) => "bigint",
            SqlValue::Int(_) => "integer",
            SqlValue::Text(_) => "text",
            SqlValue::Date(_) => "date",
            SqlValue::Time(_) => "time",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcedureParams {
    params: Vec<(&'static str, SqlValue)>,
}

impl ProcedureParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bigint(self, name: &'static str, value: impl Into<Option<i64>>) -> Self {
        self.push(name, SqlValue::BigInt(value.into()))
    }

    pub fn int(self, name: &'static str, value: impl Into<Option<i32>>) -> Self {
        self.push(name, SqlValue::Int(value.into()))
    }

    pub fn text(self, name: &'static str, value: impl Into<Option<String>>) -> Self {
        self.push(name, SqlValue::Text(value.into()))
    }

    pub fn date(self, name: &'static str, value: impl Into<Option<NaiveDate>>) -> Self {
        self.push(name, SqlValue::Date(value.into()))
    }

    pub fn time(self, name: &'static str, value: impl Into<Option<NaiveTime>>) -> Self {
        self.push(name, SqlValue::Time(value.into()))
    }

    fn push(mut self, name: &'static str, value: SqlValue) -> Self {
        self.params.retain(|(n, _)| *n != name);
        self.params.push((name, value));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &(&'static str, SqlValue)> {
        self.params.iter()
    }

    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.params.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    pub fn get_bigint(&self, name: &str) -> Result<Option<i64>, DatabaseError> {
        match self.get(name) {
            Some(SqlValue::BigInt(v)) => Ok(*v),
            _ => Err(DatabaseError::MissingParameter(name.to_string())),
        }
    }

    pub fn get_int(&self, name: &str) -> Result<Option<i32>, DatabaseError> {
        match self.get(name) {
            Some(SqlValue::Int(v)) => Ok(*v),
            _ => Err(DatabaseError::MissingParameter(name.to_string())),
        }
    }

    pub fn get_text(&self, name: &str) -> Result<Option<String>, DatabaseError> {
        match self.get(name) {
            Some(SqlValue::Text(v)) => Ok(v.clone()),
            _ => Err(DatabaseError::MissingParameter(name.to_string())),
        }
    }

    pub fn get_date(&self, name: &str) -> Result<Option<NaiveDate>, DatabaseError> {
        match self.get(name) {
            Some(SqlValue::Date(v)) => Ok(*v),
            _ => Err(DatabaseError::MissingParameter(name.to_string())),
        }
    }

    pub fn get_time(&self, name: &str) -> Result<Option<NaiveTime>, DatabaseError> {
        match self.get(name) {
            Some(SqlValue::Time(v)) => Ok(*v),
            _ => Err(DatabaseError::MissingParameter(name.to_string())),
        }
    }
}

/// Result shape the caller expects from a procedure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedReturn {
    /// Exactly one row
    Single,
    /// Zero or more rows
    Multi,
    /// Several named result sets
    Sets(&'static [&'static str]),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProcedureOutput {
    Single(Row),
    Multi(Vec<Row>),
    Sets(HashMap<String, Vec<Row>>),
}

impl ProcedureOutput {
    pub fn into_single(self, procedure: &str) -> Result<Row, DatabaseError> {
        match self {
            ProcedureOutput::Single(row) => Ok(row),
            other => Err(other.shape_error(procedure, "single row")),
        }
    }

    pub fn into_multi(self, procedure: &str) -> Result<Vec<Row>, DatabaseError> {
        match self {
            ProcedureOutput::Multi(rows) => Ok(rows),
            other => Err(other.shape_error(procedure, "row list")),
        }
    }

    pub fn into_sets(self, procedure: &str) -> Result<HashMap<String, Vec<Row>>, DatabaseError> {
        match self {
            ProcedureOutput::Sets(sets) => Ok(sets),
            other => Err(other.shape_error(procedure, "named result sets")),
        }
    }

    fn shape_error(&self, procedure: &str, wanted: &str) -> DatabaseError {
        let got = match self {
            ProcedureOutput::Single(_) => "single row",
            ProcedureOutput::Multi(_) => "row list",
            ProcedureOutput::Sets(_) => "named result sets",
        };
        DatabaseError::UnexpectedShape {
            procedure: procedure.to_string(),
            detail: format!("expected {}, got {}", wanted, got),
        }
    }
}

/// Runs named stored procedures against some backing store.
#[async_trait]
pub trait ProcedureExecutor: Send + Sync {
    async fn execute(
        &self,
        procedure: &str,
        params: ProcedureParams,
        expected: ExpectedReturn,
    ) -> Result<ProcedureOutput, DatabaseError>;

    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}
