//! Generic CRUD request pipeline.
//!
//! Every resource endpoint runs its input through a [`CrudController`] before
//! any business logic sees it. The steps are fixed and run in this order:
//!
//! 1. resolve the caller [`Credential`] (failure is a [`PipelineFault`])
//! 2. check the declared [`PermissionRequirement`]s (denial is a [`Rejection::Forbidden`])
//! 3. validate params and body against the operation's [`Schema`]s
//!    (violation is a [`Rejection::Invalid`])
//!
//! The outcome is a value, never a panic or a fault, for anything the caller
//! can correct.

pub mod credential;
pub mod outcome;
pub mod permission;
pub mod request;

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::schema::{Schema, ValidationError};

pub use credential::{
    Credential, CredentialError, CredentialResolver, JwtCredentialResolver,
    StaticCredentialResolver,
};
pub use outcome::{PipelineFault, Rejection, Validated, ValidationOutcome};
pub use permission::{
    Action, GrantPermissionChecker, PermissionChecker, PermissionDenied, PermissionError,
    PermissionParseError, PermissionRequirement,
};
pub use request::CrudRequest;

/// The pluggable collaborators shared by every controller
#[derive(Clone)]
pub struct CrudContext {
    resolver: Arc<dyn CredentialResolver>,
    checker: Arc<dyn PermissionChecker>,
}

impl CrudContext {
    pub fn new(resolver: Arc<dyn CredentialResolver>, checker: Arc<dyn PermissionChecker>) -> Self {
        Self { resolver, checker }
    }
}

/// One pipeline invocation with its declared permission requirements.
pub struct CrudController {
    context: CrudContext,
    permissions: Vec<PermissionRequirement>,
}

impl CrudController {
    pub fn new(context: CrudContext, permissions: Vec<PermissionRequirement>) -> Self {
        Self {
            context,
            permissions,
        }
    }

    pub async fn create<B>(
        &self,
        request: &CrudRequest,
        body_schema: &Schema,
    ) -> Result<ValidationOutcome<(), B>, PipelineFault>
    where
        B: DeserializeOwned,
    {
        self.run(request, || {
            let body = body_schema.parse(&request.body()?)?;
            Ok(((), body))
        })
        .await
    }

    /// Without a params schema the params are `P::default()`.
    pub async fn read<P>(
        &self,
        request: &CrudRequest,
        params_schema: Option<&Schema>,
    ) -> Result<ValidationOutcome<P, ()>, PipelineFault>
    where
        P: DeserializeOwned + Default,
    {
        self.run(request, || {
            let params = match params_schema {
                Some(schema) => schema.parse(&request.params())?,
                None => P::default(),
            };
            Ok((params, ()))
        })
        .await
    }

    pub async fn update<P, B>(
        &self,
        request: &CrudRequest,
        params_schema: &Schema,
        body_schema: &Schema,
    ) -> Result<ValidationOutcome<P, B>, PipelineFault>
    where
        P: DeserializeOwned,
        B: DeserializeOwned,
    {
        self.run(request, || {
            let params = params_schema.parse(&request.params())?;
            let body = body_schema.parse(&request.body()?)?;
            Ok((params, body))
        })
        .await
    }

    pub async fn delete<P>(
        &self,
        request: &CrudRequest,
        params_schema: &Schema,
    ) -> Result<ValidationOutcome<P, ()>, PipelineFault>
    where
        P: DeserializeOwned,
    {
        self.run(request, || {
            let params = params_schema.parse(&request.params())?;
            Ok((params, ()))
        })
        .await
    }

    async fn run<P, B>(
        &self,
        request: &CrudRequest,
        validate: impl FnOnce() -> Result<(P, B), ValidationError>,
    ) -> Result<ValidationOutcome<P, B>, PipelineFault> {
        let credential = self
            .context
            .resolver
            .resolve(request.headers())
            .await
            .map_err(|e| {
                tracing::warn!("Credential resolution failed: {}", e);
                PipelineFault::from(e)
            })?;

        match self.context.checker.check(&credential, &self.permissions).await {
            Ok(()) => {}
            Err(PermissionError::Denied(denied)) => {
                tracing::warn!(
                    "Permission denied for account {} user {}: {}",
                    credential.id_account,
                    credential.id_user,
                    denied
                );
                return Ok(ValidationOutcome::Rejected(Rejection::Forbidden(denied)));
            }
            Err(PermissionError::Backend(msg)) => return Err(PipelineFault::Permission(msg)),
        }

        match validate() {
            Ok((params, body)) => Ok(ValidationOutcome::Validated(Validated {
                credential,
                params,
                body,
            })),
            Err(error) => {
                tracing::debug!("Request rejected by schema: {:?}", error.field_errors);
                Ok(ValidationOutcome::Rejected(Rejection::Invalid(error)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Field;
    use async_trait::async_trait;
    use axum::http::HeaderMap;
    use serde::Deserialize;
    use serde_json::json;

    struct FailingResolver;

    #[async_trait]
    impl CredentialResolver for FailingResolver {
        async fn resolve(&self, _headers: &HeaderMap) -> Result<Credential, CredentialError> {
            Err(CredentialError::MissingToken)
        }
    }

    struct BrokenChecker;

    #[async_trait]
    impl PermissionChecker for BrokenChecker {
        async fn check(
            &self,
            _credential: &Credential,
            _requirements: &[PermissionRequirement],
        ) -> Result<(), PermissionError> {
            Err(PermissionError::Backend("grant store offline".into()))
        }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Body {
        title: String,
    }

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Params {
        id: Option<i64>,
    }

    fn body_schema() -> Schema {
        Schema::object().field("title", Field::string().min_len(3))
    }

    fn params_schema() -> Schema {
        Schema::object().field("id", Field::integer().positive().coerce())
    }

    fn context(grants: &[&str]) -> CrudContext {
        CrudContext::new(
            Arc::new(StaticCredentialResolver::new(Credential::new(1, 1))),
            Arc::new(GrantPermissionChecker::from_grants(grants).unwrap()),
        )
    }

    fn controller(grants: &[&str], action: Action) -> CrudController {
        CrudController::new(context(grants), vec![PermissionRequirement::new("TASK", action)])
    }

    #[tokio::test]
    async fn create_validates_body() {
        let request = CrudRequest::new().with_json_body(&json!({ "title": "Buy milk" }));
        let validated = controller(&["TASK:CREATE"], Action::Create)
            .create::<Body>(&request, &body_schema())
            .await
            .unwrap()
            .into_result()
            .unwrap();

        assert_eq!(validated.credential, Credential::new(1, 1));
        assert_eq!(validated.body, Body { title: "Buy milk".into() });
    }

    #[tokio::test]
    async fn schema_violation_is_rejected_not_faulted() {
        let request = CrudRequest::new().with_json_body(&json!({ "title": "ab" }));
        let outcome = controller(&["TASK:CREATE"], Action::Create)
            .create::<Body>(&request, &body_schema())
            .await
            .unwrap();

        match outcome {
            ValidationOutcome::Rejected(Rejection::Invalid(err)) => {
                assert!(err.field_errors.contains_key("title"))
            }
            other => panic!("expected schema rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn permission_is_checked_before_validation() {
        // invalid body and missing grant: the grant decides
        let request = CrudRequest::new().with_json_body(&json!({ "title": "ab" }));
        let outcome = controller(&["TASK:READ"], Action::Create)
            .create::<Body>(&request, &body_schema())
            .await
            .unwrap();

        match outcome {
            ValidationOutcome::Rejected(Rejection::Forbidden(denied)) => {
                assert_eq!(denied.requirement.to_string(), "TASK:CREATE")
            }
            other => panic!("expected forbidden, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn credential_failure_is_a_fault() {
        let context = CrudContext::new(
            Arc::new(FailingResolver),
            Arc::new(GrantPermissionChecker::from_grants(&["TASK:READ"]).unwrap()),
        );
        let result = CrudController::new(context, vec![PermissionRequirement::new("TASK", Action::Read)])
            .read::<Params>(&CrudRequest::new(), None)
            .await;

        assert!(matches!(result, Err(PipelineFault::Credential(_))));
    }

    #[tokio::test]
    async fn checker_failure_is_a_fault() {
        let context = CrudContext::new(
            Arc::new(StaticCredentialResolver::new(Credential::new(1, 1))),
            Arc::new(BrokenChecker),
        );
        let result = CrudController::new(context, vec![PermissionRequirement::new("TASK", Action::Read)])
            .read::<Params>(&CrudRequest::new(), None)
            .await;

        assert!(matches!(result, Err(PipelineFault::Permission(_))));
    }

    #[tokio::test]
    async fn bearer_token_scope_reaches_validated_input() {
        use crate::auth::{generate_jwt, Claims};
        use axum::http::{header, HeaderValue};

        let token = generate_jwt(&Claims::new(3, 9, 1).unwrap(), "secret").unwrap();
        let request = CrudRequest::new().with_header(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        let context = CrudContext::new(
            Arc::new(JwtCredentialResolver::new("secret")),
            Arc::new(GrantPermissionChecker::from_grants(&["TASK:READ"]).unwrap()),
        );

        let validated = CrudController::new(context, vec![PermissionRequirement::new("TASK", Action::Read)])
            .read::<Params>(&request, None)
            .await
            .unwrap()
            .into_result()
            .unwrap();
        assert_eq!(validated.credential, Credential::new(3, 9));
    }

    #[tokio::test]
    async fn read_without_schema_uses_default_params() {
        let validated = controller(&["TASK:READ"], Action::Read)
            .read::<Params>(&CrudRequest::new().with_path_param("id", "5"), None)
            .await
            .unwrap()
            .into_result()
            .unwrap();
        assert_eq!(validated.params, Params::default());
    }

    #[tokio::test]
    async fn update_coerces_path_id_and_validates_body() {
        let request = CrudRequest::new()
            .with_path_param("id", "12")
            .with_json_body(&json!({ "title": "Renamed" }));
        let validated = controller(&["TASK:UPDATE"], Action::Update)
            .update::<Params, Body>(&request, &params_schema(), &body_schema())
            .await
            .unwrap()
            .into_result()
            .unwrap();

        assert_eq!(validated.params.id, Some(12));
        assert_eq!(validated.body.title, "Renamed");
    }

    #[tokio::test]
    async fn delete_rejects_non_numeric_id() {
        let request = CrudRequest::new().with_path_param("id", "abc");
        let outcome = controller(&["TASK:DELETE"], Action::Delete)
            .delete::<Params>(&request, &params_schema())
            .await
            .unwrap();
        assert!(!outcome.is_validated());
    }
}
