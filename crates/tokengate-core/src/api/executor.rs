//! Single-shot request execution with the in-memory bearer credential.

use std::sync::Arc;

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::Url;
use tracing::debug;

use super::request::{ApiResponse, PendingRequest};
use super::transport::{OutboundRequest, Transport};
use super::RequestError;
use crate::auth::TokenMemory;

/// Issues exactly one call per `execute`. Retry policy lives in
/// [`ReauthInterceptor`](super::ReauthInterceptor).
///
/// Clone is cheap - the transport and token memory are shared.
#[derive(Clone)]
pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    base_url: Url,
    tokens: Arc<TokenMemory>,
}

impl RequestExecutor {
    pub fn new(transport: Arc<dyn Transport>, base_url: Url, tokens: Arc<TokenMemory>) -> Self {
        Self {
            transport,
            base_url,
            tokens,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn execute(&self, request: &PendingRequest) -> Result<ApiResponse, RequestError> {
        let outbound = OutboundRequest {
            method: request.method.clone(),
            url: self.resolve(&request.path)?,
            headers: self.auth_headers()?,
            query: request.query.clone(),
            body: request.body.clone(),
            include_credentials: request.include_credentials,
        };

        let raw = match self.transport.send(outbound).await {
            Ok(raw) => raw,
            Err(e) => {
                debug!(method = %request.method, path = %request.path, error = %e, "Request failed");
                return Err(e);
            }
        };
        debug!(method = %request.method, path = %request.path, status = raw.status, "Request completed");

        if !(200..300).contains(&raw.status) {
            let body = String::from_utf8_lossy(&raw.body).into_owned();
            return Err(RequestError::from_status(raw.status, body));
        }
        ApiResponse::decode(raw.status, &raw.body)
    }

    /// Paths are always relative to the base URL, with or without a leading `/`.
    fn resolve(&self, path: &str) -> Result<Url, RequestError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| RequestError::InvalidRequest(format!("bad path {:?}: {}", path, e)))
    }

    /// Bearer header when a credential is held, otherwise an explicitly empty
    /// `Authorization` value (never omitted).
    fn auth_headers(&self) -> Result<HeaderMap, RequestError> {
        let mut headers = HeaderMap::new();
        match self.tokens.get() {
            Some(credential) => {
                let value = HeaderValue::from_str(&format!("Bearer {}", credential.expose()))
                    .map_err(|_| {
                        RequestError::InvalidRequest("credential is not a valid header value".into())
                    })?;
                headers.insert(header::AUTHORIZATION, value);
                headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
            }
            None => {
                headers.insert(header::AUTHORIZATION, HeaderValue::from_static(""));
            }
        }
        Ok(headers)
    }
}
