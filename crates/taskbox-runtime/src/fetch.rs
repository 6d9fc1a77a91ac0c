//! HTTP access for task bodies.
//!
//! Tasks never hold an HTTP client. They call `Capabilities::fetch`, which
//! goes through the runtime's [`HttpTransport`]. Production uses
//! [`ReqwestTransport`]; tests script responses with [`StaticTransport`].

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::Value;
use taskbox_core::{Failure, FailureOrigin, TaskError};
use tracing::debug;
use url::Url;

use crate::config::RuntimeConfig;
use crate::error::TransportError;

/// Request options for `fetch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    /// HTTP method name, case-insensitive.
    pub method: String,
    /// Request headers.
    pub headers: Vec<(String, String)>,
    /// Query parameters appended to the URL, form-encoded.
    pub query: Vec<(String, String)>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            method: "GET".to_string(),
            headers: Vec::new(),
            query: Vec::new(),
        }
    }
}

impl FetchOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post() -> Self {
        Self::default().with_method("POST")
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }
}

/// Response handed back to the task.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResponse {
    pub status: u16,
    /// Header names are lowercase.
    pub headers: HashMap<String, String>,
    /// Parsed JSON for JSON responses, a string otherwise, `null` when empty.
    pub body: Value,
}

/// A request as seen by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    /// Full URL including the encoded query.
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

/// A raw response from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// Header names are lowercase.
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// JSON response with the matching content type.
    pub fn json(status: u16, body: &Value) -> Self {
        Self::new(status, body.to_string()).with_header("content-type", "application/json")
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }
}

/// Sends HTTP requests on behalf of tasks.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Transport backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(config: &RuntimeConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = parse_method(&request.method)?;

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|val| (k.as_str().to_string(), val.to_string()))
            })
            .collect();
        let body = response.text().await?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn parse_method(method: &str) -> Result<Method, TransportError> {
    Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| TransportError::InvalidMethod(method.to_string()))
}

/// Scripted transport: answers by URL prefix and records every request.
///
/// Routes are matched in insertion order. A request with no matching route
/// fails with [`TransportError::Unavailable`].
#[derive(Debug, Default)]
pub struct StaticTransport {
    routes: Vec<(String, Route)>,
    requests: Mutex<Vec<HttpRequest>>,
}

#[derive(Debug, Clone)]
enum Route {
    Respond(HttpResponse),
    Fail(String),
}

impl StaticTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer requests whose URL starts with `prefix`.
    pub fn respond(mut self, prefix: impl Into<String>, response: HttpResponse) -> Self {
        self.routes.push((prefix.into(), Route::Respond(response)));
        self
    }

    /// Answer with a JSON body.
    pub fn json(self, prefix: impl Into<String>, status: u16, body: Value) -> Self {
        self.respond(prefix, HttpResponse::json(status, &body))
    }

    /// Fail requests whose URL starts with `prefix` at the transport level.
    pub fn fail(mut self, prefix: impl Into<String>, reason: impl Into<String>) -> Self {
        self.routes.push((prefix.into(), Route::Fail(reason.into())));
        self
    }

    /// Requests seen so far.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl HttpTransport for StaticTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = request.url.clone();
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        let route = self
            .routes
            .iter()
            .find(|(prefix, _)| url.starts_with(prefix.as_str()))
            .map(|(_, route)| route.clone());

        match route {
            Some(Route::Respond(response)) => Ok(response),
            Some(Route::Fail(reason)) => Err(TransportError::Unavailable(reason)),
            None => Err(TransportError::Unavailable(url)),
        }
    }
}

/// Encode pairs as an `application/x-www-form-urlencoded` body.
pub fn form_body<K, V>(pairs: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs.iter().map(|(k, v)| (k.as_ref(), v.as_ref())))
        .finish()
}

/// Perform one fetch through `transport` and shape the response for a task.
pub(crate) async fn fetch(
    transport: &dyn HttpTransport,
    url: &str,
    options: FetchOptions,
    body: Option<String>,
) -> Result<FetchResponse, Failure> {
    let full_url = build_url(url, &options.query)
        .map_err(|e| Failure::from_error(FailureOrigin::Fetch, e))?;

    debug!(method = %options.method, url = %full_url, "fetch");

    let response = transport
        .send(HttpRequest {
            method: options.method,
            url: full_url.clone(),
            headers: options.headers,
            body,
        })
        .await
        .map_err(|e| Failure::from_error(FailureOrigin::Fetch, e))?;

    let status = response.status;
    debug!(status, url = %full_url, "fetch completed");

    if !(200..300).contains(&status) {
        // Error pages often lie about their content type; keep the raw text.
        let body = parse_body(&response).unwrap_or_else(|_| Value::String(response.body.clone()));
        return Err(TaskError::network_status(
            format!("HTTP {status} from {full_url}"),
            status,
            body,
        )
        .into());
    }

    let body = parse_body(&response)?;
    Ok(FetchResponse {
        status,
        headers: response.headers,
        body,
    })
}

fn build_url(url: &str, query: &[(String, String)]) -> Result<String, TransportError> {
    let mut parsed = Url::parse(url).map_err(|e| TransportError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    if !query.is_empty() {
        parsed.query_pairs_mut().extend_pairs(query);
    }
    Ok(parsed.into())
}

fn parse_body(response: &HttpResponse) -> Result<Value, Failure> {
    if response.body.is_empty() {
        return Ok(Value::Null);
    }

    let is_json = response
        .headers
        .get("content-type")
        .is_some_and(|ct| ct.contains("json"));
    if !is_json {
        return Ok(Value::String(response.body.clone()));
    }

    serde_json::from_str(&response.body).map_err(|e| {
        Failure::from(
            TaskError::data("Response declared JSON but the body could not be parsed")
                .with_cause(e.to_string()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use taskbox_core::ErrorKind;

    #[tokio::test]
    async fn test_json_body_is_parsed() {
        let transport = StaticTransport::new().json("https://api.test/", 200, json!({"id": 7}));
        let response = fetch(&transport, "https://api.test/objects/7", FetchOptions::get(), None)
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, json!({"id": 7}));
    }

    #[tokio::test]
    async fn test_text_and_empty_bodies() {
        let transport = StaticTransport::new()
            .respond("https://api.test/text", HttpResponse::new(200, "hello"))
            .respond("https://api.test/empty", HttpResponse::new(204, ""));

        let text = fetch(&transport, "https://api.test/text", FetchOptions::get(), None)
            .await
            .unwrap();
        assert_eq!(text.body, json!("hello"));

        let empty = fetch(&transport, "https://api.test/empty", FetchOptions::get(), None)
            .await
            .unwrap();
        assert_eq!(empty.body, Value::Null);
    }

    #[tokio::test]
    async fn test_non_2xx_is_tagged_network_error() {
        let transport = StaticTransport::new().json(
            "https://api.test/",
            401,
            json!({"message": "Invalid API key"}),
        );
        let failure = fetch(&transport, "https://api.test/x", FetchOptions::get(), None)
            .await
            .unwrap_err();

        match failure.as_tagged() {
            Some(TaskError::Network { status, body, .. }) => {
                assert_eq!(*status, Some(401));
                assert_eq!(body.as_ref(), Some(&json!({"message": "Invalid API key"})));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_2xx_with_unparseable_json_keeps_status() {
        let transport = StaticTransport::new().respond(
            "https://api.test/",
            HttpResponse::new(502, "<html>Bad Gateway</html>")
                .with_header("content-type", "application/json"),
        );
        let failure = fetch(&transport, "https://api.test/x", FetchOptions::get(), None)
            .await
            .unwrap_err();

        match failure.as_tagged() {
            Some(TaskError::Network { status, body, .. }) => {
                assert_eq!(*status, Some(502));
                assert_eq!(body.as_ref(), Some(&json!("<html>Bad Gateway</html>")));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_transport_failure_is_untyped_fetch_failure() {
        let transport = StaticTransport::new().fail("https://down.test/", "connection refused");
        let failure = fetch(&transport, "https://down.test/", FetchOptions::get(), None)
            .await
            .unwrap_err();
        assert!(matches!(
            failure,
            Failure::Untyped {
                origin: FailureOrigin::Fetch,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_invalid_url_is_fetch_failure() {
        let transport = StaticTransport::new();
        let failure = fetch(&transport, "not a url", FetchOptions::get(), None)
            .await
            .unwrap_err();
        assert!(matches!(
            failure,
            Failure::Untyped {
                origin: FailureOrigin::Fetch,
                ..
            }
        ));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_bad_json_is_data_error() {
        let transport = StaticTransport::new().respond(
            "https://api.test/",
            HttpResponse::new(200, "{oops").with_header("Content-Type", "application/json"),
        );
        let failure = fetch(&transport, "https://api.test/", FetchOptions::get(), None)
            .await
            .unwrap_err();
        assert_eq!(failure.as_tagged().map(TaskError::kind), Some(ErrorKind::Data));
    }

    #[tokio::test]
    async fn test_query_and_request_recording() {
        let transport = StaticTransport::new().json("https://api.test/weather", 200, json!({}));
        let options = FetchOptions::get()
            .query("q", "New York")
            .query("units", "metric")
            .header("Accept", "application/json");
        fetch(&transport, "https://api.test/weather", options, None)
            .await
            .unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].url,
            "https://api.test/weather?q=New+York&units=metric"
        );
        assert_eq!(requests[0].method, "GET");
    }

    #[test]
    fn test_form_body_encoding() {
        let body = form_body(&[
            ("grant_type", "client_credentials"),
            ("scope", "https://api.security.microsoft.com/.default"),
        ]);
        assert_eq!(
            body,
            "grant_type=client_credentials&scope=https%3A%2F%2Fapi.security.microsoft.com%2F.default"
        );
    }

    #[test]
    fn test_parse_method() {
        assert_eq!(parse_method("post").unwrap(), Method::POST);
        assert!(parse_method("NOT A METHOD").is_err());
    }
}
