#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use task_api::app::{app, AppState};
use task_api::config::AppConfig;
use task_api::crud::{
    Credential, CredentialResolver, CrudContext, GrantPermissionChecker, StaticCredentialResolver,
};
use task_api::database::{
    DatabaseError, ExpectedReturn, MemoryProcedureExecutor, ProcedureExecutor, ProcedureOutput,
    ProcedureParams,
};
use task_api::services::task::TaskService;

pub const ALL_GRANTS: [&str; 4] = ["TASK:CREATE", "TASK:READ", "TASK:UPDATE", "TASK:DELETE"];

/// Memory backend that counts every procedure call
pub struct CountingExecutor {
    inner: MemoryProcedureExecutor,
    calls: AtomicUsize,
}

impl CountingExecutor {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcedureExecutor for CountingExecutor {
    async fn execute(
        &self,
        procedure: &str,
        params: ProcedureParams,
        expected: ExpectedReturn,
    ) -> Result<ProcedureOutput, DatabaseError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.execute(procedure, params, expected).await
    }
}

pub struct TestApp {
    router: Router,
    pub executor: Arc<CountingExecutor>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestApp {
    /// Static credential (1, 1) with every task grant
    pub fn new() -> Self {
        Self::with(
            Arc::new(StaticCredentialResolver::new(Credential::new(1, 1))),
            &ALL_GRANTS,
        )
    }

    pub fn with(resolver: Arc<dyn CredentialResolver>, grants: &[&str]) -> Self {
        let executor = Arc::new(CountingExecutor {
            inner: MemoryProcedureExecutor::new().with_category(1, 1),
            calls: AtomicUsize::new(0),
        });
        let checker = Arc::new(GrantPermissionChecker::from_grants(grants).expect("valid grants"));
        let state = AppState::new(
            CrudContext::new(resolver, checker),
            TaskService::new(executor.clone()),
        );

        let mut config = AppConfig::development();
        config.api.enable_request_logging = false;

        Self {
            router: app(state, &config),
            executor,
        }
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        body: Option<&Value>,
        token: Option<&str>,
    ) -> Result<TestResponse> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))?,
            None => builder.body(Body::empty())?,
        };
        self.dispatch(request).await
    }

    pub async fn dispatch(&self, request: Request<Body>) -> Result<TestResponse> {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .context("router failed")?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .with_context(|| format!("non-JSON body: {}", String::from_utf8_lossy(&bytes)))?
        };

        Ok(TestResponse { status, body })
    }

    /// Sends a raw, possibly malformed, JSON body
    pub async fn send_raw(&self, method: Method, uri: &str, body: &str) -> Result<TestResponse> {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))?;
        self.dispatch(request).await
    }

    pub async fn get(&self, uri: &str) -> Result<TestResponse> {
        self.send(Method::GET, uri, None, None).await
    }

    pub async fn post(&self, uri: &str, body: &Value) -> Result<TestResponse> {
        self.send(Method::POST, uri, Some(body), None).await
    }

    pub async fn put(&self, uri: &str, body: &Value) -> Result<TestResponse> {
        self.send(Method::PUT, uri, Some(body), None).await
    }

    pub async fn delete(&self, uri: &str) -> Result<TestResponse> {
        self.send(Method::DELETE, uri, None, None).await
    }

    /// Creates a task and returns its id
    pub async fn create_task(&self, body: &Value) -> Result<i64> {
        let res = self.post("/api/v1/internal/task", body).await?;
        anyhow::ensure!(res.status == StatusCode::CREATED, "create failed: {}", res.body);
        res.body["data"]["idTask"]
            .as_i64()
            .context("missing idTask")
    }
}

/// Every envelope has a parseable timestamp and exactly one of data/error.
pub fn assert_envelope(body: &Value) {
    let timestamp = body["timestamp"].as_str().expect("timestamp string");
    assert!(
        chrono::DateTime::parse_from_rfc3339(timestamp).is_ok(),
        "unparseable timestamp: {}",
        timestamp
    );
    let success = body["success"].as_bool().expect("success flag");
    assert_eq!(body.get("data").is_some(), success, "data presence: {}", body);
    assert_eq!(body.get("error").is_some(), !success, "error presence: {}", body);
}
