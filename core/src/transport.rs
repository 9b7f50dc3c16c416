//! Executes `HttpRequest` values.
//!
//! # Design
//! `Transport` is the only seam where bytes leave the process. `UreqTransport`
//! is the production implementation; `ScriptedTransport` replays canned
//! responses and records what was sent, so hosts can test page controllers
//! without a server.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Executes one HTTP round-trip. Non-2xx statuses are responses, not errors;
/// only failures to obtain a response are `Err`.
pub trait Transport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Blocking transport backed by a `ureq` agent.
///
/// Status-as-error is disabled so 4xx/5xx come back as data and the client
/// interprets them.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

impl Transport for UreqTransport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let url = request.url.as_str();
        let headers = &request.headers;
        let sent = match (request.method, request.body.as_deref()) {
            (HttpMethod::Get, _) => with_headers(self.agent.get(url), headers).call(),
            (HttpMethod::Delete, _) => with_headers(self.agent.delete(url), headers).call(),
            (HttpMethod::Post, Some(body)) => {
                with_headers(self.agent.post(url), headers).send(body.as_bytes())
            }
            (HttpMethod::Post, None) => with_headers(self.agent.post(url), headers).send_empty(),
            (HttpMethod::Patch, Some(body)) => {
                with_headers(self.agent.patch(url), headers).send(body.as_bytes())
            }
            (HttpMethod::Patch, None) => with_headers(self.agent.patch(url), headers).send_empty(),
        };
        let mut response = sent.map_err(|e| Error::Network(e.to_string()))?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or_default().to_string()))
            .collect();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(HttpResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}

#[derive(Debug, Default)]
struct Script {
    responses: VecDeque<std::result::Result<HttpResponse, String>>,
    sent: Vec<HttpRequest>,
}

/// Replays queued responses in order and records every request.
///
/// Clones share the same script, so a test can keep one handle while the
/// client owns another.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    script: Rc<RefCell<Script>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, response: HttpResponse) -> &Self {
        self.script.borrow_mut().responses.push_back(Ok(response));
        self
    }

    pub fn push_json(&self, status: u16, body: &str) -> &Self {
        self.push(HttpResponse::json(status, body))
    }

    /// Queue a transport failure (no response at all).
    pub fn push_failure(&self, message: &str) -> &Self {
        self.script
            .borrow_mut()
            .responses
            .push_back(Err(message.to_string()));
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.script.borrow().sent.clone()
    }

    pub fn last_request(&self) -> Option<HttpRequest> {
        self.script.borrow().sent.last().cloned()
    }

    /// Responses queued but not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.borrow().responses.len()
    }
}

impl Transport for ScriptedTransport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut script = self.script.borrow_mut();
        let label = format!("{} {}", request.method, request.url);
        script.sent.push(request);
        match script.responses.pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(Error::Network(message)),
            None => Err(Error::Network(format!("no scripted response for {label}"))),
        }
    }
}
