use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{HeaderValue, Method},
    routing::get,
    Router,
};
use serde_json::{json, Value};
use thiserror::Error;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::api::{ApiResponse, ApiResult};
use crate::config::{AppConfig, CredentialMode, DatabaseBackend};
use crate::crud::{
    Credential, CredentialResolver, CrudContext, GrantPermissionChecker, JwtCredentialResolver,
    PermissionParseError, StaticCredentialResolver,
};
use crate::database::{
    DatabaseError, DatabaseManager, MemoryProcedureExecutor, PgProcedureExecutor, ProcedureExecutor,
};
use crate::error::ApiError;
use crate::handlers;
use crate::services::task::TaskService;

/// Prefix every resource route is nested under
pub const API_PREFIX: &str = "/api/v1/internal";

/// Categories available to the static account on the memory backend
const MEMORY_SEED_CATEGORIES: std::ops::RangeInclusive<i64> = 1..=5;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Grants(#[from] PermissionParseError),
    #[error("JWT_SECRET must be set when credential mode is jwt")]
    MissingJwtSecret,
}

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub crud: CrudContext,
    pub tasks: TaskService,
}

impl AppState {
    pub fn new(crud: CrudContext, tasks: TaskService) -> Self {
        Self { crud, tasks }
    }

    /// Wires resolver, grant checker and procedure backend from configuration.
    pub async fn from_config(config: &AppConfig) -> Result<Self, StartupError> {
        let security = &config.security;

        let resolver: Arc<dyn CredentialResolver> = match security.credential_mode {
            CredentialMode::Static => Arc::new(StaticCredentialResolver::new(Credential::new(
                security.static_account,
                security.static_user,
            ))),
            CredentialMode::Jwt => {
                if security.jwt_secret.is_empty() {
                    return Err(StartupError::MissingJwtSecret);
                }
                Arc::new(JwtCredentialResolver::new(security.jwt_secret.clone()))
            }
        };
        let checker = Arc::new(GrantPermissionChecker::from_grants(&security.default_grants)?);

        let executor: Arc<dyn ProcedureExecutor> = match config.database.backend {
            DatabaseBackend::Memory => {
                info!("Using in-memory procedure backend");
                let executor = MEMORY_SEED_CATEGORIES.fold(MemoryProcedureExecutor::new(), |exec, id| {
                    exec.with_category(security.static_account, id)
                });
                Arc::new(executor)
            }
            DatabaseBackend::Postgres => {
                let db = DatabaseManager::connect(&config.database).await?;
                Arc::new(PgProcedureExecutor::new(db, config.database.procedure_schema.clone()))
            }
        };

        Ok(Self::new(
            CrudContext::new(resolver, checker),
            TaskService::new(executor),
        ))
    }
}

/// Full router with global middleware
pub fn app(state: AppState, config: &AppConfig) -> Router {
    let mut router = Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        // Resources
        .nest(API_PREFIX, handlers::task::routes())
        .method_not_allowed_fallback(method_not_allowed)
        .fallback(not_found)
        .with_state(state)
        // Oversized bodies surface as extractor rejections, rendered as envelopes
        .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes));

    if config.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }
    if config.security.enable_cors {
        router = router.layer(cors_layer(&config.security.cors_origins));
    }
    router
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any)
}

async fn root() -> ApiResponse<Value> {
    ApiResponse::success(json!({
        "name": "Task API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/health",
            "task": format!("{}/task[/:id]", API_PREFIX),
        }
    }))
}

async fn health(State(state): State<AppState>) -> ApiResult<Value> {
    match state.tasks.health_check().await {
        Ok(()) => Ok(ApiResponse::success(json!({
            "status": "ok",
            "database": "ok"
        }))),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            Err(ApiError::service_unavailable("Database unavailable"))
        }
    }
}

async fn not_found() -> ApiError {
    ApiError::not_found("Route not found")
}

async fn method_not_allowed() -> ApiError {
    ApiError::method_not_allowed("Method not allowed on this route")
}
