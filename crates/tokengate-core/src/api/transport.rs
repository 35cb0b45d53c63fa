//! Wire-level transport behind the request executor.
//!
//! [`Transport`] is object-safe so the executor can hold `Arc<dyn Transport>`
//! and tests can swap in a scripted fake. [`HttpTransport`] is the reqwest
//! implementation used everywhere else.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, Url};
use serde_json::Value;
use tracing::debug;

use super::RequestError;

/// A fully resolved request, ready to put on the wire.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub include_credentials: bool,
}

/// Whatever came back, before status classification or body decoding.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

pub trait Transport: Send + Sync {
    /// Send one request. Only transport failures are errors here; any HTTP
    /// status is a successful `RawResponse`.
    fn send(
        &self,
        request: OutboundRequest,
    ) -> Pin<Box<dyn Future<Output = Result<RawResponse, RequestError>> + Send + '_>>;
}

/// reqwest-backed transport.
///
/// Holds two clients. The credentialed one carries a cookie jar, which is
/// where the server's HttpOnly refresh cookie lives; the plain one never
/// sends or stores cookies. Clone is cheap - both clients are Arc internally.
#[derive(Clone)]
pub struct HttpTransport {
    plain: Client,
    credentialed: Client,
    jar: Arc<Jar>,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, RequestError> {
        let jar = Arc::new(Jar::default());
        let plain = Client::builder().timeout(timeout).build()?;
        let credentialed = Client::builder()
            .timeout(timeout)
            .cookie_provider(Arc::clone(&jar))
            .build()?;

        Ok(Self {
            plain,
            credentialed,
            jar,
        })
    }

    /// The cookie jar backing the credentialed channel
    pub fn cookie_jar(&self) -> Arc<Jar> {
        Arc::clone(&self.jar)
    }

    fn client_for(&self, include_credentials: bool) -> &Client {
        if include_credentials {
            &self.credentialed
        } else {
            &self.plain
        }
    }
}

impl Transport for HttpTransport {
    fn send(
        &self,
        request: OutboundRequest,
    ) -> Pin<Box<dyn Future<Output = Result<RawResponse, RequestError>> + Send + '_>> {
        Box::pin(async move {
            let mut builder = self
                .client_for(request.include_credentials)
                .request(request.method.clone(), request.url.clone())
                .headers(request.headers);

            if !request.query.is_empty() {
                builder = builder.query(&request.query);
            }
            if let Some(ref body) = request.body {
                builder = builder.json(body);
            }

            let response = builder.send().await?;
            let status = response.status().as_u16();
            let body = response.bytes().await?.to_vec();
            debug!(
                method = %request.method,
                url = %request.url,
                status,
                bytes = body.len(),
                "Response received"
            );

            Ok(RawResponse { status, body })
        })
    }
}
