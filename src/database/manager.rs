use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;
use tracing::info;

use crate::config::DatabaseConfig;

/// SQLSTATE raised by stored procedures for business-rule violations
pub const BUSINESS_RULE_SQLSTATE: &str = "51000";

/// Errors from the persistence layer
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid SQL identifier: {0}")]
    InvalidIdentifier(String),

    /// Distinguished rule violation reported by a procedure; safe to show callers.
    #[error("{message}")]
    BusinessRule { message: String },

    #[error("Unknown procedure: {0}")]
    UnknownProcedure(String),

    #[error("Missing or mistyped parameter '{0}'")]
    MissingParameter(String),

    #[error("Unexpected result from {procedure}: {detail}")]
    UnexpectedShape { procedure: String, detail: String },

    #[error(transparent)]
    Sqlx(sqlx::Error),
}

impl DatabaseError {
    pub fn business_rule(message: impl Into<String>) -> Self {
        DatabaseError::BusinessRule {
            message: message.into(),
        }
    }

    pub fn is_business_rule(&self) -> bool {
        matches!(self, DatabaseError::BusinessRule { .. })
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.code().as_deref() == Some(BUSINESS_RULE_SQLSTATE) {
                return DatabaseError::business_rule(db_err.message());
            }
        }
        DatabaseError::Sqlx(err)
    }
}

/// Owns the Postgres connection pool
#[derive(Debug, Clone)]
pub struct DatabaseManager {
    pool: PgPool,
}

impl DatabaseManager {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let url = config
            .url
            .as_deref()
            .ok_or(DatabaseError::ConfigMissing("DATABASE_URL"))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(url)
            .await?;

        info!(
            "Created database pool (max_connections={})",
            config.max_connections
        );
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Lowercase ASCII letters, digits and underscores, not starting with a digit.
    pub fn is_valid_identifier(name: &str) -> bool {
        let mut chars = name.chars();
        match chars.next() {
            Some(c) if c.is_ascii_lowercase() || c == '_' => {}
            _ => return false,
        }
        chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    }

    /// Quote SQL identifier to prevent injection
    pub fn quote_identifier(name: &str) -> Result<String, DatabaseError> {
        if !Self::is_valid_identifier(name) {
            return Err(DatabaseError::InvalidIdentifier(name.to_string()));
        }
        Ok(format!("\"{}\"", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_identifiers() {
        assert!(DatabaseManager::is_valid_identifier("functional"));
        assert!(DatabaseManager::is_valid_identifier("sp_task_create"));
        assert!(DatabaseManager::is_valid_identifier("_p1"));
        assert!(!DatabaseManager::is_valid_identifier(""));
        assert!(!DatabaseManager::is_valid_identifier("1abc"));
        assert!(!DatabaseManager::is_valid_identifier("Task"));
        assert!(!DatabaseManager::is_valid_identifier("sp; DROP TABLE task"));
    }

    #[test]
    fn quotes_valid_identifiers_only() {
        assert_eq!(
            DatabaseManager::quote_identifier("functional").unwrap(),
            "\"functional\""
        );
        assert!(matches!(
            DatabaseManager::quote_identifier("a\"b"),
            Err(DatabaseError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn business_rule_is_distinguished() {
        assert!(DatabaseError::business_rule("Task not found").is_business_rule());
        assert!(!DatabaseError::UnknownProcedure("x".into()).is_business_rule());
        assert_eq!(
            DatabaseError::business_rule("Task not found").to_string(),
            "Task not found"
        );
    }
}
