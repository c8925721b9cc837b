use std::collections::HashMap;

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Query, RawPathParams, Request},
    http::{HeaderMap, HeaderName, HeaderValue},
};
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::schema::ValidationError;

/// Everything the pipeline reads from an inbound request.
///
/// Path params and query-string params are both exposed as string values in
/// one params object; a path param wins over a query param with the same name.
#[derive(Debug, Clone, Default)]
pub struct CrudRequest {
    headers: HeaderMap,
    path: Map<String, Value>,
    query: Map<String, Value>,
    body: Bytes,
}

impl CrudRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_path_param(mut self, name: &str, value: &str) -> Self {
        self.path.insert(name.to_string(), Value::String(value.to_string()));
        self
    }

    pub fn with_query_param(mut self, name: &str, value: &str) -> Self {
        self.query.insert(name.to_string(), Value::String(value.to_string()));
        self
    }

    pub fn with_json_body(mut self, body: &Value) -> Self {
        self.body = Bytes::from(body.to_string());
        self
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn params(&self) -> Value {
        let mut params = self.query.clone();
        for (key, value) in &self.path {
            params.insert(key.clone(), value.clone());
        }
        Value::Object(params)
    }

    /// Body as JSON; an empty body reads as `{}`
    pub fn body(&self) -> Result<Value, ValidationError> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Object(Map::new()));
        }
        serde_json::from_slice(&self.body)
            .map_err(|e| ValidationError::new(format!("Malformed JSON body: {}", e)))
    }
}

#[async_trait]
impl<S> FromRequest<S> for CrudRequest
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let (mut parts, body) = req.into_parts();

        // Routes without captures have no path params to extract
        let path = Option::<RawPathParams>::from_request_parts(&mut parts, state)
            .await
            .ok()
            .flatten()
            .map(|params| {
                params
                    .iter()
                    .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
                    .collect::<Map<String, Value>>()
            })
            .unwrap_or_default();

        let Query(query) = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
            .map_err(|e| ApiError::bad_request(format!("Malformed query string: {}", e)))?;
        let query = query
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect::<Map<String, Value>>();

        let headers = parts.headers.clone();

        let body = Bytes::from_request(Request::from_parts(parts, body), state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;

        Ok(Self {
            headers,
            path,
            query,
            body,
        })
    }
}
