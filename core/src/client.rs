//! The single chokepoint for outbound API calls.
//!
//! # Design
//! `ApiClient` holds the base URL, a shared transport and, optionally, a
//! [`Credentials`] source. A call is split the same way the request/response
//! data is: `build` resolves an [`ApiRequest`] into an `HttpRequest` (URL,
//! default headers, bearer), and `parse_response` turns an `HttpResponse` into
//! a typed value or an `Error::Api`. `send` is just build, execute, parse.
//!
//! Every call is at-most-once. The only status the client reacts to is 401 on
//! a request whose bearer came from the credentials source, which is told to
//! invalidate; the error still reaches the caller.

use std::rc::Rc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::transport::Transport;

const CONTENT_TYPE: &str = "Content-Type";
const AUTHORIZATION: &str = "Authorization";

/// Supplies the bearer token for outgoing requests and hears about 401s.
pub trait Credentials {
    fn bearer_token(&self) -> Option<String>;

    /// Called when a request carrying this source's token got a 401.
    fn on_unauthorized(&self);
}

/// A request relative to the client's base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: HttpMethod,
    path: String,
    headers: Vec<(String, String)>,
    body: Option<String>,
    bearer: Option<String>,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            body: None,
            bearer: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    /// Serialize `payload` as the JSON body.
    pub fn json<T: Serialize + ?Sized>(mut self, payload: &T) -> Result<Self> {
        let body =
            serde_json::to_string(payload).map_err(|e| Error::Serialization(e.to_string()))?;
        self.body = Some(body);
        Ok(self)
    }

    /// Add a caller header. `Content-Type` and an attached `Authorization`
    /// cannot be replaced this way.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Use this token instead of the client's credentials source.
    pub fn bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }
}

/// Authenticated JSON client over a [`Transport`].
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    transport: Rc<dyn Transport>,
    credentials: Option<Rc<dyn Credentials>>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("credentials", &self.credentials.is_some())
            .finish()
    }
}

impl ApiClient {
    pub fn new(base_url: &str, transport: Rc<dyn Transport>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            transport,
            credentials: None,
        }
    }

    /// A copy of this client that authenticates through `credentials`.
    pub fn with_credentials(&self, credentials: Rc<dyn Credentials>) -> Self {
        Self {
            base_url: self.base_url.clone(),
            transport: Rc::clone(&self.transport),
            credentials: Some(credentials),
        }
    }

    /// Resolve `request` against the base URL with the given bearer token.
    ///
    /// Defaults come first (`Content-Type`, then `Authorization` when a token
    /// is present); caller headers are appended unless they name a default
    /// that is already set.
    pub fn build(&self, request: &ApiRequest, bearer: Option<&str>) -> HttpRequest {
        let mut headers = vec![(CONTENT_TYPE.to_string(), "application/json".to_string())];
        if let Some(token) = bearer {
            headers.push((AUTHORIZATION.to_string(), format!("Bearer {token}")));
        }
        for (name, value) in &request.headers {
            let shadowed = name.eq_ignore_ascii_case(CONTENT_TYPE)
                || (bearer.is_some() && name.eq_ignore_ascii_case(AUTHORIZATION));
            if shadowed {
                debug!(header = %name, "dropping caller header that would replace a default");
                continue;
            }
            headers.push((name.clone(), value.clone()));
        }

        let path = if request.path.starts_with('/') {
            request.path.clone()
        } else {
            format!("/{}", request.path)
        };

        HttpRequest {
            method: request.method,
            url: format!("{}{}", self.base_url, path),
            headers,
            body: request.body.clone(),
        }
    }

    /// Execute `request` and parse a 2xx body as `T`.
    pub fn send<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let from_credentials = request.bearer.is_none();
        let bearer = match &request.bearer {
            Some(token) => Some(token.clone()),
            None => self.credentials.as_ref().and_then(|c| c.bearer_token()),
        };
        let http = self.build(&request, bearer.as_deref());
        debug!(method = %http.method, url = %http.url, authenticated = bearer.is_some(), "api request");

        let response = self.transport.execute(http)?;
        debug!(status = response.status, path = %request.path, "api response");

        if response.status == 401 && bearer.is_some() && from_credentials {
            if let Some(credentials) = &self.credentials {
                warn!(path = %request.path, "request rejected with 401, invalidating session");
                credentials.on_unauthorized();
            }
        }
        parse_response(response)
    }
}

/// Map a response to `T` on 2xx, or to `Error::Api` otherwise.
///
/// An empty 2xx body parses as JSON `null`, so `()` and `Option<T>` targets
/// accept 204 responses.
pub fn parse_response<T: DeserializeOwned>(response: HttpResponse) -> Result<T> {
    if !response.is_success() {
        return Err(Error::Api {
            status: response.status,
            status_text: response.status_text,
            body: response.body,
        });
    }
    let body = if response.body.trim().is_empty() {
        "null"
    } else {
        response.body.as_str()
    };
    serde_json::from_str(body).map_err(|e| Error::Deserialization(e.to_string()))
}
