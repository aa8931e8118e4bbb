//! HTTP transport types and the pluggable transport seam.
//!
//! # Design
//! Requests and responses are plain data. `Client` builds an `HttpRequest`,
//! hands it to a `Transport`, and parses the returned `HttpResponse`. The
//! transport is the only piece that touches the network, so hosts can swap in
//! their own HTTP stack (or a stub in tests) without the client noticing.
//!
//! A `Transport` must return non-2xx responses as data rather than errors;
//! status interpretation belongs to the client. Only failures that produced
//! no response at all (DNS, TLS, timeout) surface as `MailchimpError::Transport`.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{MailchimpError, Result};

/// Fixed timeout applied to every request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Whether the parameters travel as a JSON body.
    pub fn sends_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = MailchimpError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            _ => Err(MailchimpError::UnhandledMethod(s.to_string())),
        }
    }
}

/// An HTTP request described as plain data.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub timeout: Duration,
}

impl HttpRequest {
    /// First header value matching `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// Executes one HTTP round trip.
pub trait Transport: Send + Sync {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

#[cfg(feature = "ureq")]
pub use self::ureq_transport::UreqTransport;

#[cfg(feature = "ureq")]
mod ureq_transport {
    use super::*;

    /// Blocking transport backed by `ureq`.
    ///
    /// Redirects are not followed, and 3xx/4xx/5xx responses are returned as
    /// data so the client can translate them into typed errors.
    #[derive(Clone)]
    pub struct UreqTransport {
        agent: ureq::Agent,
    }

    impl fmt::Debug for UreqTransport {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("UreqTransport").finish_non_exhaustive()
        }
    }

    impl UreqTransport {
        pub fn new() -> Self {
            let agent = ureq::Agent::config_builder()
                .http_status_as_error(false)
                .max_redirects(0)
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

    impl Transport for UreqTransport {
        fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
            let timeout = Some(request.timeout);

            let result = match request.method {
                HttpMethod::Get => {
                    let mut builder = self.agent.get(request.url.as_str());
                    for (name, value) in &request.headers {
                        builder = builder.header(name.as_str(), value.as_str());
                    }
                    builder.config().timeout_global(timeout).build().call()
                }
                HttpMethod::Delete => {
                    let mut builder = self.agent.delete(request.url.as_str());
                    for (name, value) in &request.headers {
                        builder = builder.header(name.as_str(), value.as_str());
                    }
                    builder.config().timeout_global(timeout).build().call()
                }
                HttpMethod::Post | HttpMethod::Patch => {
                    let mut builder = if request.method == HttpMethod::Post {
                        self.agent.post(request.url.as_str())
                    } else {
                        self.agent.patch(request.url.as_str())
                    };
                    for (name, value) in &request.headers {
                        builder = builder.header(name.as_str(), value.as_str());
                    }
                    let builder = builder.config().timeout_global(timeout).build();
                    match &request.body {
                        Some(body) => builder.send(body.as_bytes()),
                        None => builder.send_empty(),
                    }
                }
            };

            let mut response = result.map_err(|e| MailchimpError::Transport(e.to_string()))?;

            let status = response.status().as_u16();
            let headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|v| (name.as_str().to_string(), v.to_string()))
                })
                .collect();
            let body = response
                .body_mut()
                .read_to_string()
                .map_err(|e| MailchimpError::Transport(e.to_string()))?;

            Ok(HttpResponse {
                status,
                headers,
                body,
            })
        }
    }
}
