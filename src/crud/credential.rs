use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::{decode_jwt, JwtError};

/// Resolved caller identity. Both scopes are positive ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Credential {
    pub id_account: i64,
    pub id_user: i64,
}

impl Credential {
    pub fn new(id_account: i64, id_user: i64) -> Self {
        Self { id_account, id_user }
    }
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Missing Authorization header")]
    MissingToken,
    #[error("Authorization header must use Bearer token format")]
    InvalidScheme,
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error("Credential scope must be positive")]
    InvalidScope,
}

/// Produces the caller identity for a request.
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    async fn resolve(&self, headers: &HeaderMap) -> Result<Credential, CredentialError>;
}

/// Always resolves to one fixed identity, whatever the request carries.
#[derive(Debug, Clone)]
pub struct StaticCredentialResolver {
    credential: Credential,
}

impl StaticCredentialResolver {
    pub fn new(credential: Credential) -> Self {
        Self { credential }
    }
}

#[async_trait]
impl CredentialResolver for StaticCredentialResolver {
    async fn resolve(&self, _headers: &HeaderMap) -> Result<Credential, CredentialError> {
        Ok(self.credential)
    }
}

/// Resolves the identity from an `Authorization: Bearer <jwt>` header.
#[derive(Clone)]
pub struct JwtCredentialResolver {
    secret: String,
}

impl JwtCredentialResolver {
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into() }
    }
}

#[async_trait]
impl CredentialResolver for JwtCredentialResolver {
    async fn resolve(&self, headers: &HeaderMap) -> Result<Credential, CredentialError> {
        let token = bearer_token(headers)?;
        let claims = decode_jwt(token, &self.secret)?;

        if claims.id_account <= 0 || claims.id_user <= 0 {
            return Err(CredentialError::InvalidScope);
        }

        Ok(Credential::new(claims.id_account, claims.id_user))
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, CredentialError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(CredentialError::MissingToken)?
        .to_str()
        .map_err(|_| CredentialError::InvalidScheme)?;

    match value.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        Some(_) => Err(CredentialError::MissingToken),
        None => Err(CredentialError::InvalidScheme),
    }
}
