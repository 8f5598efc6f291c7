//! HTTP transport seam used by every adapter, refresher and notifier
//!
//! Adapters build [`HttpRequest`] values and hand them to an
//! [`HttpTransport`]. Production uses [`ReqwestTransport`]; tests script
//! remote behavior with [`mock::MockTransport`].

pub mod mock;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;

use crate::config::HttpConfig;
use crate::error::{ConfigError, PlatformError, Result, SkedcastError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartFile {
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Form(Vec<(String, String)>),
    Bytes { content_type: String, data: Vec<u8> },
    Multipart {
        fields: Vec<(String, String)>,
        file: Option<MultipartFile>,
    },
}

/// A transport-independent HTTP request
#[derive(Clone)]
pub struct HttpRequest {
    pub method: Method,
    /// URL without query string
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::Put, url)
    }

    pub fn bearer(self, token: &str) -> Self {
        self.header("Authorization", format!("Bearer {}", token))
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn form<K: Into<String>, V: Into<String>>(
        mut self,
        fields: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        self.body = RequestBody::Form(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    pub fn bytes(mut self, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        self.body = RequestBody::Bytes {
            content_type: content_type.into(),
            data,
        };
        self
    }

    pub fn multipart(mut self, fields: Vec<(String, String)>, file: Option<MultipartFile>) -> Self {
        self.body = RequestBody::Multipart { fields, file };
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Value of a form or multipart text field
    pub fn form_value(&self, name: &str) -> Option<&str> {
        let fields = match &self.body {
            RequestBody::Form(fields) => fields,
            RequestBody::Multipart { fields, .. } => fields,
            _ => return None,
        };
        fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn json_body(&self) -> Option<&serde_json::Value> {
        match &self.body {
            RequestBody::Json(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: Vec<(&str, &str)> = self
            .headers
            .iter()
            .map(|(k, v)| {
                if k.eq_ignore_ascii_case("authorization") {
                    (k.as_str(), "[redacted]")
                } else {
                    (k.as_str(), v.as_str())
                }
            })
            .collect();

        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("query", &self.query)
            .field("headers", &headers)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// Header names are lowercase
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> std::result::Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Fail with the raw body unless the status is 2xx
    pub fn ensure_success(self, context: &str) -> std::result::Result<Self, PlatformError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(self.into_api_error(context))
        }
    }

    pub fn into_api_error(self, context: &str) -> PlatformError {
        PlatformError::Api {
            context: context.to_string(),
            status: self.status,
            body: self.text(),
        }
    }

    /// Read a string identifier field; numeric ids are stringified
    pub fn id_field(&self, field: &str, context: &str) -> std::result::Result<String, PlatformError> {
        let value: serde_json::Value = self.json().map_err(|e| {
            PlatformError::Posting(format!("{}: unparseable response ({}): {}", context, e, self.text()))
        })?;

        match value.get(field) {
            Some(serde_json::Value::String(s)) if !s.is_empty() => Ok(s.clone()),
            Some(serde_json::Value::Number(n)) => Ok(n.to_string()),
            _ => Err(PlatformError::Posting(format!(
                "{}: response has no '{}': {}",
                context,
                field,
                self.text()
            ))),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
    pub timeout: bool,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timeout: false,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timeout: true,
        }
    }
}

impl From<TransportError> for PlatformError {
    fn from(err: TransportError) -> Self {
        if err.timeout {
            PlatformError::Timeout(err.message)
        } else {
            PlatformError::Network(err.message)
        }
    }
}

impl From<TransportError> for SkedcastError {
    fn from(err: TransportError) -> Self {
        SkedcastError::Platform(err.into())
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> std::result::Result<HttpResponse, TransportError>;
}

/// `reqwest`-backed transport
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                field: "http".to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self { client })
    }

    fn build(
        &self,
        request: HttpRequest,
    ) -> std::result::Result<reqwest::RequestBuilder, TransportError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
        };

        let mut builder = self.client.request(method, &request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Form(fields) => builder.form(&fields),
            RequestBody::Bytes { content_type, data } => builder
                .header("Content-Type", content_type)
                .body(data),
            RequestBody::Multipart { fields, file } => {
                let mut form = reqwest::multipart::Form::new();
                for (name, value) in fields {
                    form = form.text(name, value);
                }
                if let Some(file) = file {
                    let part = reqwest::multipart::Part::bytes(file.data)
                        .file_name(file.file_name)
                        .mime_str(&file.content_type)
                        .map_err(|e| TransportError::new(format!("invalid content type: {}", e)))?;
                    form = form.part(file.field, part);
                }
                builder.multipart(form)
            }
        };

        Ok(builder)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
        let description = format!("{} {}", request.method.as_str(), request.url);
        let builder = self.build(request)?;

        let response = builder.send().await.map_err(|e| classify(&description, e))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| classify(&description, e))?
            .to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn classify(description: &str, err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::timeout(format!("{} timed out: {}", description, err))
    } else {
        TransportError::new(format!("{} failed: {}", description, err))
    }
}
