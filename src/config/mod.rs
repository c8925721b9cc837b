use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Memory,
    Postgres,
}

impl FromStr for DatabaseBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(DatabaseBackend::Memory),
            "postgres" | "postgresql" => Ok(DatabaseBackend::Postgres),
            other => Err(format!("unknown database backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: Option<String>,
    pub procedure_schema: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enable_request_logging: bool,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialMode {
    /// Every request acts as the configured static account and user
    Static,
    /// Account and user come from a bearer JWT
    Jwt,
}

impl FromStr for CredentialMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "static" => Ok(CredentialMode::Static),
            "jwt" => Ok(CredentialMode::Jwt),
            other => Err(format!("unknown credential mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    pub credential_mode: CredentialMode,
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub static_account: i64,
    pub static_user: i64,
    /// `SECURABLE:ACTION` grants given to every caller
    pub default_grants: Vec<String>,
}

const ALL_TASK_GRANTS: [&str; 4] = ["TASK:CREATE", "TASK:READ", "TASK:UPDATE", "TASK:DELETE"];

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("TASK_API_HOST") {
            self.server.host = v;
        }
        if let Some(port) = env::var("TASK_API_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|v| v.parse().ok())
        {
            self.server.port = port;
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_BACKEND") {
            self.database.backend = v.parse().unwrap_or(self.database.backend);
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_PROCEDURE_SCHEMA") {
            self.database.procedure_schema = v;
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // API overrides
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = split_list(&v);
        }
        if let Ok(v) = env::var("SECURITY_CREDENTIAL_MODE") {
            self.security.credential_mode = v.parse().unwrap_or(self.security.credential_mode);
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_STATIC_ACCOUNT") {
            self.security.static_account = v.parse().unwrap_or(self.security.static_account);
        }
        if let Ok(v) = env::var("SECURITY_STATIC_USER") {
            self.security.static_user = v.parse().unwrap_or(self.security.static_user);
        }
        if let Ok(v) = env::var("SECURITY_DEFAULT_GRANTS") {
            self.security.default_grants = split_list(&v);
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            database: DatabaseConfig {
                backend: DatabaseBackend::Memory,
                url: None,
                procedure_schema: "functional".to_string(),
                max_connections: 10,
                connection_timeout: 30,
            },
            api: ApiConfig {
                enable_request_logging: true,
                max_request_size_bytes: 1024 * 1024, // 1MB
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec![
                    "http://localhost:3000".to_string(),
                    "http://localhost:5173".to_string(),
                ],
                credential_mode: CredentialMode::Static,
                jwt_secret: String::new(),
                jwt_expiry_hours: 24 * 7, // 1 week
                static_account: 1,
                static_user: 1,
                default_grants: ALL_TASK_GRANTS.iter().map(|g| g.to_string()).collect(),
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            database: DatabaseConfig {
                backend: DatabaseBackend::Postgres,
                url: None,
                procedure_schema: "functional".to_string(),
                max_connections: 20,
                connection_timeout: 10,
            },
            api: ApiConfig {
                enable_request_logging: true,
                max_request_size_bytes: 512 * 1024,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
                credential_mode: CredentialMode::Jwt,
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                static_account: 1,
                static_user: 1,
                default_grants: ALL_TASK_GRANTS.iter().map(|g| g.to_string()).collect(),
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            database: DatabaseConfig {
                backend: DatabaseBackend::Postgres,
                url: None,
                procedure_schema: "functional".to_string(),
                max_connections: 50,
                connection_timeout: 5,
            },
            api: ApiConfig {
                enable_request_logging: false,
                max_request_size_bytes: 256 * 1024,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://app.example.com".to_string()],
                credential_mode: CredentialMode::Jwt,
                jwt_secret: String::new(),
                jwt_expiry_hours: 4,
                static_account: 1,
                static_user: 1,
                default_grants: ALL_TASK_GRANTS.iter().map(|g| g.to_string()).collect(),
            },
        }
    }
}

fn split_list(v: &str) -> Vec<String> {
    v.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_runs_in_memory_with_static_credentials() {
        let config = AppConfig::development();
        assert_eq!(config.database.backend, DatabaseBackend::Memory);
        assert_eq!(config.database.procedure_schema, "functional");
        assert_eq!(config.security.credential_mode, CredentialMode::Static);
        assert_eq!(config.security.default_grants.len(), 4);
    }

    #[test]
    fn production_requires_tokens_and_postgres() {
        let config = AppConfig::production();
        assert_eq!(config.database.backend, DatabaseBackend::Postgres);
        assert_eq!(config.security.credential_mode, CredentialMode::Jwt);
        assert!(!config.api.enable_request_logging);
    }

    #[test]
    fn parses_backend_and_mode_names() {
        assert_eq!("Postgres".parse::<DatabaseBackend>(), Ok(DatabaseBackend::Postgres));
        assert!("sqlite".parse::<DatabaseBackend>().is_err());
        assert_eq!(" jwt ".parse::<CredentialMode>(), Ok(CredentialMode::Jwt));
    }

    #[test]
    fn splits_comma_lists() {
        assert_eq!(
            split_list("TASK:READ, TASK:CREATE,,"),
            vec!["TASK:READ".to_string(), "TASK:CREATE".to_string()]
        );
    }
}
