//! Scripted in-memory transport for exercising the request stack.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, Url};
use serde_json::Value;

use super::transport::{OutboundRequest, RawResponse, Transport};
use super::RequestError;
use crate::auth::{MemorySessionStorage, SessionStore};
use crate::context::AuthContext;

pub const TEST_BASE_URL: &str = "http://api.test/api/";

pub fn test_base() -> Url {
    Url::parse(TEST_BASE_URL).expect("static test URL parses")
}

/// Fresh context over in-memory storage.
pub fn test_context() -> (AuthContext, MemorySessionStorage) {
    let storage = MemorySessionStorage::new();
    let session = SessionStore::open(Box::new(storage.clone()));
    (AuthContext::new(session), storage)
}

#[derive(Debug, Clone)]
pub enum Scripted {
    Respond(u16, Value),
    Raw(u16, &'static str),
    Fail(RequestError),
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub authorization: Option<String>,
    pub include_credentials: bool,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

#[derive(Default)]
struct Script {
    routes: HashMap<(Method, String), VecDeque<Scripted>>,
    delays: HashMap<String, Duration>,
    calls: Vec<RecordedCall>,
}

/// Replies from per-route queues. The last queued reply for a route repeats;
/// unscripted routes answer 404.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, method: Method, path: &str, reply: Scripted) -> &Self {
        self.script
            .lock()
            .routes
            .entry((method, path.to_string()))
            .or_default()
            .push_back(reply);
        self
    }

    /// Hold replies on `path` for `delay` before answering
    pub fn delay(&self, path: &str, delay: Duration) -> &Self {
        self.script.lock().delays.insert(path.to_string(), delay);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.script.lock().calls.clone()
    }

    pub fn calls_to(&self, path: &str) -> Vec<RecordedCall> {
        self.calls().into_iter().filter(|c| c.path == path).collect()
    }

    fn next_reply(&self, method: &Method, path: &str) -> (Scripted, Option<Duration>) {
        let mut script = self.script.lock();
        let delay = script.delays.get(path).copied();
        let reply = match script.routes.get_mut(&(method.clone(), path.to_string())) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        let reply = reply.unwrap_or(Scripted::Respond(404, Value::Null));
        (reply, delay)
    }
}

impl Transport for ScriptedTransport {
    fn send(
        &self,
        request: OutboundRequest,
    ) -> Pin<Box<dyn Future<Output = Result<RawResponse, RequestError>> + Send + '_>> {
        Box::pin(async move {
            let path = request
                .url
                .path()
                .trim_start_matches(test_base().path())
                .to_string();
            let authorization = request
                .headers
                .get(AUTHORIZATION)
                .map(|v| v.to_str().unwrap_or_default().to_string());

            self.script.lock().calls.push(RecordedCall {
                method: request.method.clone(),
                path: path.clone(),
                authorization,
                include_credentials: request.include_credentials,
                query: request.query.clone(),
                body: request.body.clone(),
            });

            let (reply, delay) = self.next_reply(&request.method, &path);
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            match reply {
                Scripted::Respond(status, body) => Ok(RawResponse {
                    status,
                    body: if body.is_null() {
                        Vec::new()
                    } else {
                        serde_json::to_vec(&body).expect("test body encodes")
                    },
                }),
                Scripted::Raw(status, body) => Ok(RawResponse {
                    status,
                    body: body.as_bytes().to_vec(),
                }),
                Scripted::Fail(err) => Err(err),
            }
        })
    }
}
