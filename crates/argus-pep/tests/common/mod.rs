//! Shared fixtures for integration tests: a scripted PDP and request helpers.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use argus_pep::{
    Attributes, Authorizer, Environment, HttpDoer, HttpRequest, HttpResponse, PepConfig, PepError,
    PepResult, Request, StaticTokenProvider, Subject,
};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use http::{HeaderValue, StatusCode};
use parking_lot::Mutex;
use serde_json::{json, Value};

pub const GET: &str = "cloud-object-storage.object.get";
pub const COPY: &str = "cloud-object-storage.object.copy";
pub const UNSUPPORTED: &str = "cloud-object-storage.object.unsupported";

#[derive(Debug, Clone)]
enum Step {
    Respond(HttpResponse),
    TransportError,
}

/// A PDP that replays scripted responses in order, then repeats the
/// fallback response.
#[derive(Debug, Default)]
pub struct MockPdp {
    script: Mutex<VecDeque<Step>>,
    fallback: Mutex<Option<Step>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockPdp {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a response.
    pub fn respond(&self, status: u16, body: impl Into<String>) {
        self.script
            .lock()
            .push_back(Step::Respond(response(status, body.into())));
    }

    /// Queue a response carrying one extra header.
    pub fn respond_with_header(&self, status: u16, body: impl Into<String>, name: &'static str, value: &'static str) {
        let mut response = response(status, body.into());
        response.headers.insert(name, HeaderValue::from_static(value));
        self.script.lock().push_back(Step::Respond(response));
    }

    /// Queue a connection failure.
    pub fn fail_transport(&self) {
        self.script.lock().push_back(Step::TransportError);
    }

    /// Response used once the script is exhausted.
    pub fn always(&self, status: u16, body: impl Into<String>) {
        *self.fallback.lock() = Some(Step::Respond(response(status, body.into())));
    }

    /// Number of calls received.
    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    /// JSON bodies of all calls received.
    pub fn bodies(&self) -> Vec<Value> {
        self.requests
            .lock()
            .iter()
            .map(|r| serde_json::from_slice(r.body.as_deref().unwrap_or(b"null")).unwrap())
            .collect()
    }

    /// URLs of all calls received.
    pub fn urls(&self) -> Vec<String> {
        self.requests.lock().iter().map(|r| r.url.clone()).collect()
    }
}

fn response(status: u16, body: String) -> HttpResponse {
    HttpResponse::new(StatusCode::from_u16(status).unwrap(), body)
}

#[async_trait]
impl HttpDoer for MockPdp {
    async fn execute(&self, request: HttpRequest) -> PepResult<HttpResponse> {
        self.requests.lock().push(request);
        let step = self
            .script
            .lock()
            .pop_front()
            .or_else(|| self.fallback.lock().clone());
        match step {
            Some(Step::Respond(response)) => Ok(response),
            Some(Step::TransportError) => Err(PepError::transport("connection refused")),
            None => Err(PepError::transport("mock PDP has no scripted response")),
        }
    }
}

/// A valid configuration for tests.
pub fn config() -> PepConfig {
    PepConfig::new(Environment::Staging, "test-api-key")
}

/// Build an authorizer that talks to `pdp`.
pub fn authorizer(pdp: &Arc<MockPdp>, config: PepConfig) -> Authorizer {
    Authorizer::builder(config)
        .with_http_doer(Arc::clone(pdp) as Arc<dyn HttpDoer>)
        .with_token_provider(Arc::new(StaticTokenProvider::new("service-token")))
        .build()
        .unwrap()
}

pub fn cos_resource() -> Attributes {
    Attributes::new()
        .with("serviceName", "cloud-object-storage")
        .with("accountId", "12345")
}

pub fn request(action: &str) -> Request {
    Request::new(Subject::iam_id("IBMid-1"), action, cos_resource())
}

/// Single-authz body with one permit.
pub fn permit(obligation: Option<Value>, pattern: Option<Value>) -> String {
    let mut decision = json!({"permitted": true});
    if let Some(obligation) = obligation {
        decision["obligation"] = obligation;
    }
    single(vec![json!({"status": "200", "authorizationDecision": decision})], pattern)
}

/// Single-authz body with one deny.
pub fn deny(reason: Option<&str>) -> String {
    let mut decision = json!({"permitted": false});
    if let Some(reason) = reason {
        decision["reason"] = json!(reason);
    }
    single(vec![json!({"status": "200", "authorizationDecision": decision})], None)
}

/// Single-authz body with the given entries.
pub fn single(entries: Vec<Value>, pattern: Option<Value>) -> String {
    let mut body = json!({"responses": entries});
    if let Some(pattern) = pattern {
        body["cacheKeyPattern"] = pattern;
    }
    body.to_string()
}

/// A compact JWT with the given claims and a dummy signature.
pub fn jwt(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{body}.signature")
}
