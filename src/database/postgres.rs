use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgArguments, query::Query, Postgres, Row as _};
use tracing::debug;

use super::manager::{DatabaseError, DatabaseManager};
use super::procedure::{
    ExpectedReturn, ProcedureExecutor, ProcedureOutput, ProcedureParams, Row, SqlValue,
};

/// Calls procedures in one Postgres schema through named-notation function calls.
///
/// Single and multi-row procedures are read through `row_to_json`. Named-set
/// procedures must return `(result_set text, row_data jsonb)` rows.
#[derive(Debug, Clone)]
pub struct PgProcedureExecutor {
    db: DatabaseManager,
    schema: String,
}

impl PgProcedureExecutor {
    pub fn new(db: DatabaseManager, schema: impl Into<String>) -> Self {
        Self {
            db,
            schema: schema.into(),
        }
    }

    /// Builds `SELECT ... FROM "schema"."proc"(p_a => $1::bigint, ...)`
    fn call_sql(
        schema: &str,
        procedure: &str,
        params: &ProcedureParams,
        expected: ExpectedReturn,
    ) -> Result<String, DatabaseError> {
        let args = params
            .iter()
            .enumerate()
            .map(|(i, (name, value))| {
                if !DatabaseManager::is_valid_identifier(name) {
                    return Err(DatabaseError::InvalidIdentifier(name.to_string()));
                }
                Ok(format!("{} => ${}::{}", name, i + 1, value.pg_type()))
            })
            .collect::<Result<Vec<_>, _>>()?
            .join(", ");

        let target = format!(
            "{}.{}({})",
            DatabaseManager::quote_identifier(schema)?,
            DatabaseManager::quote_identifier(procedure)?,
            args
        );

        Ok(match expected {
            ExpectedReturn::Sets(_) => format!("SELECT result_set, row_data FROM {}", target),
            _ => format!("SELECT row_to_json(r)::jsonb AS row_data FROM {} AS r", target),
        })
    }

    fn bind_all<'q>(
        mut query: Query<'q, Postgres, PgArguments>,
        params: &ProcedureParams,
    ) -> Query<'q, Postgres, PgArguments> {
        for (_, value) in params.iter() {
            query = match value.clone() {
                SqlValue::BigInt(v) => query.bind(v),
                SqlValue::Int(v) => query.bind(v),
                SqlValue::Text(v) => query.bind(v),
                SqlValue::Date(v) => query.bind(v),
                SqlValue::Time(v) => query.bind(v),
            };
        }
        query
    }

    fn json_row(procedure: &str, value: Value) -> Result<Row, DatabaseError> {
        match value {
            Value::Object(map) => Ok(map),
            other => Err(DatabaseError::UnexpectedShape {
                procedure: procedure.to_string(),
                detail: format!("row is not an object: {}", other),
            }),
        }
    }
}

#[async_trait]
impl ProcedureExecutor for PgProcedureExecutor {
    async fn execute(
        &self,
        procedure: &str,
        params: ProcedureParams,
        expected: ExpectedReturn,
    ) -> Result<ProcedureOutput, DatabaseError> {
        let sql = Self::call_sql(&self.schema, procedure, &params, expected)?;
        debug!("Executing {}.{}: {}", self.schema, procedure, sql);

        let rows = Self::bind_all(sqlx::query(&sql), &params)
            .fetch_all(self.db.pool())
            .await?;

        match expected {
            ExpectedReturn::Single => {
                if rows.len() != 1 {
                    return Err(DatabaseError::UnexpectedShape {
                        procedure: procedure.to_string(),
                        detail: format!("expected 1 row, got {}", rows.len()),
                    });
                }
                let value: Value = rows[0].try_get("row_data")?;
                Ok(ProcedureOutput::Single(Self::json_row(procedure, value)?))
            }
            ExpectedReturn::Multi => {
                let mut out = Vec::with_capacity(rows.len());
                for row in &rows {
                    let value: Value = row.try_get("row_data")?;
                    out.push(Self::json_row(procedure, value)?);
                }
                Ok(ProcedureOutput::Multi(out))
            }
            ExpectedReturn::Sets(names) => {
                let mut sets: HashMap<String, Vec<Row>> = names
                    .iter()
                    .map(|name| (name.to_string(), Vec::new()))
                    .collect();
                for row in &rows {
                    let set: String = row.try_get("result_set")?;
                    let value: Value = row.try_get("row_data")?;
                    sets.entry(set)
                        .or_default()
                        .push(Self::json_row(procedure, value)?);
                }
                Ok(ProcedureOutput::Sets(sets))
            }
        }
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        self.db.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_named_notation_call() {
        let params = ProcedureParams::new()
            .bigint("p_id_account", 1)
            .bigint("p_id_user", 2)
            .text("p_title", "Write report".to_string())
            .date("p_due_date", None);

        let sql = PgProcedureExecutor::call_sql(
            "functional",
            "sp_task_create",
            &params,
            ExpectedReturn::Single,
        )
        .unwrap();

        assert_eq!(
            sql,
            "SELECT row_to_json(r)::jsonb AS row_data FROM \"functional\".\"sp_task_create\"(\
             p_id_account => $1::bigint, p_id_user => $2::bigint, p_title => $3::text, \
             p_due_date => $4::date) AS r"
        );
    }

    #[test]
    fn builds_named_set_call() {
        let params = ProcedureParams::new().bigint("p_id_task", 9);
        let sql = PgProcedureExecutor::call_sql(
            "functional",
            "sp_task_get",
            &params,
            ExpectedReturn::Sets(&["task"]),
        )
        .unwrap();
        assert_eq!(
            sql,
            "SELECT result_set, row_data FROM \"functional\".\"sp_task_get\"(p_id_task => $1::bigint)"
        );
    }

    #[test]
    fn rejects_unsafe_names() {
        let params = ProcedureParams::new();
        assert!(PgProcedureExecutor::call_sql(
            "functional; drop",
            "sp_task_list",
            &params,
            ExpectedReturn::Multi
        )
        .is_err());
    }
}
