//! The authenticated gateway to the Mailchimp Marketing API.
//!
//! # Design
//! `Client` holds only its `Config` and a shared `Transport`; it carries no
//! mutable state between calls and is cheap to clone. Factories and resources
//! each keep their own clone, so every call in the audience → member → tag
//! graph goes through the same credentials.
//!
//! `call` is split into a pure `build_request` and a pure `parse_response`
//! around the transport round trip, which keeps status translation testable
//! without a network.

use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::audience::AudienceFactory;
use crate::config::Config;
use crate::error::{FieldError, MailchimpError, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport, DEFAULT_TIMEOUT};
use crate::member::MemberFactory;

/// Basic-auth username the API expects; the password is the API key.
const AUTH_USERNAME: &str = "apikey";

/// Synchronous client for the Mailchimp Marketing API.
#[derive(Clone)]
pub struct Client {
    config: Config,
    transport: Arc<dyn Transport>,
}

impl Client {
    pub fn new(config: Config, transport: impl Transport + 'static) -> Self {
        Self {
            config,
            transport: Arc::new(transport),
        }
    }

    /// Build a client that talks HTTP through `ureq`.
    #[cfg(feature = "ureq")]
    pub fn from_config(config: Config) -> Self {
        Self::new(config, crate::http::UreqTransport::new())
    }

    /// Build a client from `MAILCHIMP_*` environment variables.
    #[cfg(feature = "ureq")]
    pub fn from_env() -> Self {
        Self::from_config(Config::from_env())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn api_url(&self) -> &str {
        &self.config.api_url
    }

    pub fn data_center(&self) -> &str {
        &self.config.data_center
    }

    pub fn api_key(&self) -> &str {
        &self.config.api_key
    }

    pub fn api_version(&self) -> &str {
        &self.config.api_version
    }

    pub fn base_url(&self) -> String {
        self.config.base_url()
    }

    // -- entry points into the resource graph --

    pub fn audiences(&self) -> AudienceFactory {
        AudienceFactory::new(self.clone())
    }

    /// Fetch an audience and return a member factory bound to it.
    pub fn members(&self, audience_id: &str) -> Result<MemberFactory> {
        Ok(self.audiences().get_by_id(audience_id)?.members())
    }

    // -- raw calls --

    /// Perform one API call and return the decoded body, or `None` when the
    /// response has no body (e.g. 204 after a delete).
    pub fn call(
        &self,
        method: HttpMethod,
        endpoint: &str,
        parameters: Option<&Value>,
    ) -> Result<Option<Value>> {
        debug!(%method, endpoint, "Calling Mailchimp API");

        let request = self.build_request(method, endpoint, parameters)?;
        let response = self.transport.execute(&request)?;

        debug!(%method, endpoint, status = response.status, "Mailchimp API responded");

        self.parse_response(response).inspect_err(|e| {
            warn!(%method, endpoint, status = ?e.status(), error = %e, "Mailchimp API call failed");
        })
    }

    pub fn get(&self, endpoint: &str) -> Result<Option<Value>> {
        self.call(HttpMethod::Get, endpoint, None)
    }

    pub fn post<P: Serialize + ?Sized>(&self, endpoint: &str, parameters: &P) -> Result<Option<Value>> {
        let parameters = to_json(parameters)?;
        self.call(HttpMethod::Post, endpoint, Some(&parameters))
    }

    pub fn patch<P: Serialize + ?Sized>(&self, endpoint: &str, parameters: &P) -> Result<Option<Value>> {
        let parameters = to_json(parameters)?;
        self.call(HttpMethod::Patch, endpoint, Some(&parameters))
    }

    pub fn delete(&self, endpoint: &str) -> Result<Option<Value>> {
        self.call(HttpMethod::Delete, endpoint, None)
    }

    /// Build the request for one call without executing it.
    ///
    /// POST and PATCH always carry a JSON body (an empty object when no
    /// parameters are given); GET and DELETE never do.
    pub fn build_request(
        &self,
        method: HttpMethod,
        endpoint: &str,
        parameters: Option<&Value>,
    ) -> Result<HttpRequest> {
        let mut headers = vec![
            ("authorization".to_string(), self.authorization()),
            ("accept".to_string(), "application/json".to_string()),
        ];

        let body = if method.sends_body() {
            let empty = Value::Object(Default::default());
            let body = serde_json::to_string(parameters.unwrap_or(&empty))
                .map_err(|e| MailchimpError::Serialization(e.to_string()))?;
            headers.push(("content-type".to_string(), "application/json".to_string()));
            Some(body)
        } else {
            None
        };

        Ok(HttpRequest {
            method,
            url: self.url_for(endpoint),
            headers,
            body,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Translate a response into its JSON body or a typed error.
    ///
    /// 2xx is success; 401 is `Unauthorized`; anything else is `Api`.
    pub fn parse_response(&self, response: HttpResponse) -> Result<Option<Value>> {
        if (200..300).contains(&response.status) {
            if response.body.trim().is_empty() {
                return Ok(None);
            }
            return serde_json::from_str(&response.body)
                .map(Some)
                .map_err(|e| MailchimpError::Deserialization(e.to_string()));
        }

        let problem = Problem::from_response(&response);
        if response.status == 401 {
            return Err(MailchimpError::Unauthorized {
                detail: problem.detail,
            });
        }
        Err(MailchimpError::Api {
            status: response.status,
            detail: problem.detail,
            errors: problem.errors,
        })
    }

    fn url_for(&self, endpoint: &str) -> String {
        let base = self.base_url();
        format!(
            "{}/{}",
            base.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    fn authorization(&self) -> String {
        let credentials = format!("{AUTH_USERNAME}:{}", self.config.api_key);
        format!("Basic {}", BASE64.encode(credentials))
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Problem-detail body the API returns alongside error statuses.
///
/// Read field by field so one mistyped member (a `null` detail, say) does not
/// discard the rest of the body.
#[derive(Debug)]
struct Problem {
    detail: String,
    errors: Vec<FieldError>,
}

impl Problem {
    fn from_response(response: &HttpResponse) -> Self {
        let body = response.body.trim();
        let value: Value = serde_json::from_str(body).unwrap_or(Value::Null);
        let text = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let detail = text("detail")
            .or_else(|| text("title"))
            .or_else(|| (!body.is_empty()).then(|| body.to_string()))
            .unwrap_or_else(|| format!("HTTP {}", response.status));

        let errors = value
            .get("errors")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(field_error).collect())
            .unwrap_or_default();

        Problem { detail, errors }
    }
}

fn field_error(item: &Value) -> FieldError {
    let text = |key: &str| {
        item.get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    FieldError {
        field: text("field"),
        message: text("message"),
    }
}

fn to_json<P: Serialize + ?Sized>(parameters: &P) -> Result<Value> {
    serde_json::to_value(parameters).map_err(|e| MailchimpError::Serialization(e.to_string()))
}

/// Decode a response body that must be present.
pub(crate) fn decode<T: DeserializeOwned>(body: Option<Value>) -> Result<T> {
    let body = body.ok_or_else(|| {
        MailchimpError::Deserialization("expected a response body, got none".to_string())
    })?;
    serde_json::from_value(body).map_err(|e| MailchimpError::Deserialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubTransport;
    use serde_json::json;

    fn client(transport: &StubTransport) -> Client {
        Client::new(Config::new("us6", "secret-us6"), transport.clone())
    }

    #[test]
    fn client_uses_defaults() {
        let client = Client::new(Config::default(), StubTransport::default());
        assert_eq!(client.api_url(), crate::config::DEFAULT_API_URL);
        assert_eq!(client.data_center(), "");
        assert_eq!(client.api_key(), "");
        assert_eq!(client.api_version(), "3.0");
    }

    #[test]
    fn client_exposes_configured_values() {
        let client = Client::new(Config::new("us19", "key-us19"), StubTransport::default());
        assert_eq!(client.data_center(), "us19");
        assert_eq!(client.api_key(), "key-us19");
        assert_eq!(client.base_url(), "https://us19.api.mailchimp.com/3.0/");
    }

    #[test]
    fn client_exposes_overridden_url_and_version() {
        let config = Config::new("us19", "key-us19")
            .with_api_url("https://proxy.test/{data_center}/{api_version}/")
            .with_api_version("3.1");
        let client = Client::new(config, StubTransport::default());
        assert_eq!(client.api_url(), "https://proxy.test/{data_center}/{api_version}/");
        assert_eq!(client.api_version(), "3.1");
        assert_eq!(client.base_url(), "https://proxy.test/us19/3.1/");

        let req = client.build_request(HttpMethod::Get, "lists", None).unwrap();
        assert_eq!(req.url, "https://proxy.test/us19/3.1/lists");
    }

    #[test]
    fn build_get_request_has_no_body() {
        let transport = StubTransport::default();
        let req = client(&transport)
            .build_request(HttpMethod::Get, "lists", None)
            .unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "https://us6.api.mailchimp.com/3.0/lists");
        assert!(req.body.is_none());
        assert!(req.header("content-type").is_none());
        assert_eq!(req.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn build_request_uses_apikey_basic_auth() {
        let transport = StubTransport::default();
        let req = client(&transport)
            .build_request(HttpMethod::Delete, "lists/abc", None)
            .unwrap();
        // base64("apikey:secret-us6")
        assert_eq!(
            req.header("authorization"),
            Some("Basic YXBpa2V5OnNlY3JldC11czY=")
        );
    }

    #[test]
    fn build_post_request_serializes_parameters() {
        let transport = StubTransport::default();
        let params = json!({"name": "Newsletter"});
        let req = client(&transport)
            .build_request(HttpMethod::Post, "lists", Some(&params))
            .unwrap();
        assert_eq!(req.header("content-type"), Some("application/json"));
        let body: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, params);
    }

    #[test]
    fn build_patch_without_parameters_sends_empty_object() {
        let transport = StubTransport::default();
        let req = client(&transport)
            .build_request(HttpMethod::Patch, "lists/abc", None)
            .unwrap();
        assert_eq!(req.body.as_deref(), Some("{}"));
    }

    #[test]
    fn leading_slash_on_endpoint_is_tolerated() {
        let transport = StubTransport::default();
        let req = client(&transport)
            .build_request(HttpMethod::Get, "/lists", None)
            .unwrap();
        assert_eq!(req.url, "https://us6.api.mailchimp.com/3.0/lists");
    }

    #[test]
    fn call_returns_parsed_body() {
        let transport = StubTransport::default().respond(200, r#"{"lists":[]}"#);
        let body = client(&transport).get("lists").unwrap();
        assert_eq!(body, Some(json!({"lists": []})));
        assert_eq!(transport.requests().len(), 1);
    }

    #[test]
    fn call_returns_none_for_empty_body() {
        let transport = StubTransport::default().respond(204, "");
        let body = client(&transport).delete("lists/abc").unwrap();
        assert!(body.is_none());
    }

    #[test]
    fn created_status_is_success() {
        let transport = StubTransport::default().respond(201, r#"{"id":"abc"}"#);
        let body = client(&transport).post("lists", &json!({})).unwrap();
        assert_eq!(body, Some(json!({"id": "abc"})));
    }

    #[test]
    fn status_401_is_unauthorized_with_detail() {
        let transport = StubTransport::default().respond(
            401,
            r#"{"title":"API Key Invalid","status":401,"detail":"Your API key may be invalid, or you've attempted to access the wrong datacenter."}"#,
        );
        let err = client(&transport).get("lists").unwrap_err();
        match err {
            MailchimpError::Unauthorized { detail } => {
                assert!(detail.starts_with("Your API key may be invalid"));
            }
            other => panic!("expected Unauthorized, got {other:?}"),
        }
    }

    #[test]
    fn error_status_is_api_error_with_field_errors() {
        let transport = StubTransport::default().respond(
            400,
            r#"{"title":"Invalid Resource","status":400,"detail":"The resource submitted could not be validated.","errors":[{"field":"name","message":"This value should not be blank."}]}"#,
        );
        let err = client(&transport).post("lists", &json!({})).unwrap_err();
        match &err {
            MailchimpError::Api {
                status,
                detail,
                errors,
            } => {
                assert_eq!(*status, 400);
                assert_eq!(detail, "The resource submitted could not be validated.");
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].field, "name");
            }
            other => panic!("expected Api, got {other:?}"),
        }
    }

    #[test]
    fn error_without_field_errors_has_empty_list() {
        let transport = StubTransport::default().respond(
            404,
            r#"{"title":"Resource Not Found","status":404,"detail":"The requested resource could not be found."}"#,
        );
        let err = client(&transport).get("lists/missing").unwrap_err();
        assert!(err.is_not_found());
        assert!(err.errors().is_empty());
    }

    #[test]
    fn mistyped_problem_members_keep_the_rest() {
        let transport = StubTransport::default().respond(
            400,
            r#"{"title":"Invalid Resource","detail":null,"errors":[{"field":null,"message":"Blank email."},{"field":"status","message":"Unknown status."}]}"#,
        );
        let err = client(&transport).post("lists/a1/members", &json!({})).unwrap_err();
        match &err {
            MailchimpError::Api { detail, errors, .. } => {
                assert_eq!(detail, "Invalid Resource");
                assert_eq!(errors.len(), 2);
                assert_eq!(errors[0].field, "");
                assert_eq!(errors[0].message, "Blank email.");
                assert_eq!(errors[1].field, "status");
            }
            other => panic!("expected Api, got {other:?}"),
        }
    }

    #[test]
    fn redirect_status_is_an_error() {
        let transport = StubTransport::default().respond(301, "");
        let err = client(&transport).get("lists").unwrap_err();
        match err {
            MailchimpError::Api { status, detail, .. } => {
                assert_eq!(status, 301);
                assert_eq!(detail, "HTTP 301");
            }
            other => panic!("expected Api, got {other:?}"),
        }
    }

    #[test]
    fn non_json_error_body_becomes_detail() {
        let transport = StubTransport::default().respond(502, "Bad Gateway");
        let err = client(&transport).get("lists").unwrap_err();
        assert!(matches!(err, MailchimpError::Api { status: 502, ref detail, .. } if detail == "Bad Gateway"));
    }

    #[test]
    fn malformed_success_body_is_deserialization_error() {
        let transport = StubTransport::default().respond(200, "not json");
        let err = client(&transport).get("lists").unwrap_err();
        assert!(matches!(err, MailchimpError::Deserialization(_)));
    }

    #[test]
    fn transport_failure_propagates() {
        let transport = StubTransport::default();
        let err = client(&transport).get("lists").unwrap_err();
        assert!(matches!(err, MailchimpError::Transport(_)));
    }

    #[test]
    fn debug_does_not_leak_api_key() {
        let transport = StubTransport::default();
        let rendered = format!("{:?}", client(&transport));
        assert!(!rendered.contains("secret-us6"));
    }
}
