use thiserror::Error;

use super::credential::{Credential, CredentialError};
use super::permission::PermissionDenied;
use crate::schema::ValidationError;

/// Input that passed credential, permission and schema checks.
#[derive(Debug, Clone)]
pub struct Validated<P, B> {
    pub credential: Credential,
    pub params: P,
    pub body: B,
}

/// Expected, caller-correctable refusal. Carries no credential.
#[derive(Debug, Clone, Error)]
pub enum Rejection {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Forbidden(#[from] PermissionDenied),
}

#[derive(Debug)]
pub enum ValidationOutcome<P, B> {
    Validated(Validated<P, B>),
    Rejected(Rejection),
}

impl<P, B> ValidationOutcome<P, B> {
    pub fn into_result(self) -> Result<Validated<P, B>, Rejection> {
        match self {
            ValidationOutcome::Validated(v) => Ok(v),
            ValidationOutcome::Rejected(r) => Err(r),
        }
    }

    pub fn is_validated(&self) -> bool {
        matches!(self, ValidationOutcome::Validated(_))
    }
}

/// Failure that ends the request outright, outside the validation outcome
#[derive(Debug, Error)]
pub enum PipelineFault {
    #[error("Credential resolution failed: {0}")]
    Credential(#[from] CredentialError),
    #[error("Permission check failed: {0}")]
    Permission(String),
}
