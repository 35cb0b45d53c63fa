//! Request and response shapes that flow through the API layer.

use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use super::RequestError;

/// A single outbound call, created per request and dropped once it resolves
/// (after at most one replay).
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// When false, a 401 is handed straight back without a refresh attempt.
    pub requires_auth: bool,
    /// Send over the cookie-bearing channel (refresh cookie).
    pub include_credentials: bool,
}

impl PendingRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            requires_auth: true,
            include_credentials: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Attach a JSON body
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Serialize `body` and attach it as JSON
    pub fn with_body<B: Serialize>(self, body: &B) -> Result<Self, RequestError> {
        let value = serde_json::to_value(body)
            .map_err(|e| RequestError::InvalidRequest(format!("unencodable body: {}", e)))?;
        Ok(self.json(value))
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_credentials(mut self) -> Self {
        self.include_credentials = true;
        self
    }

    pub fn without_reauth(mut self) -> Self {
        self.requires_auth = false;
        self
    }
}

/// Normalized successful response.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    /// Decode a raw 2xx body. Empty bodies become `Value::Null`.
    pub fn decode(status: u16, raw: &[u8]) -> Result<Self, RequestError> {
        let body = if raw.iter().all(u8::is_ascii_whitespace) {
            Value::Null
        } else {
            serde_json::from_slice(raw)
                .map_err(|e| RequestError::Decode(format!("malformed JSON body: {}", e)))?
        };
        Ok(Self { status, body })
    }

    /// Deserialize the body into a typed value
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, RequestError> {
        serde_json::from_value(self.body.clone())
            .map_err(|e| RequestError::Decode(format!("unexpected response shape: {}", e)))
    }

    /// Non-empty string field at the top level of the body
    pub fn string_field(&self, name: &str) -> Option<&str> {
        self.body
            .get(name)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}
