use async_trait::async_trait;
use kb_core::{messages, ApiRequest, Error, Method, RawResponse, RequestBody, ResponseOrigin, Result, Transport, UploadForm};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::HttpConfig;

/// Talks to the real backend.
pub struct HttpTransport {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("client", &"<reqwest::Client>")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HttpTransport {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let parsed = Url::parse(&config.base_url)
            .map_err(|e| Error::Config(format!("Invalid API base URL '{}': {}", config.base_url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "API base URL must be http or https, got '{}'",
                config.base_url
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: config.timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn send(&self, request: ApiRequest) -> Result<RawResponse> {
        let url = self.url_for(&request.path);
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, &url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(&body),
            RequestBody::Multipart(form) => builder.multipart(to_multipart(form)?),
        };

        let response = builder.send().await.map_err(|e| transport_error(&url, e))?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| transport_error(&url, e))?;
        debug!("⬅️ {} {} -> {}", request.method, request.path, status);

        Ok(RawResponse {
            status,
            body: parse_body(&text),
            origin: ResponseOrigin::Network,
        })
    }
}

fn to_multipart(form: UploadForm) -> Result<Form> {
    let mut part = Part::bytes(form.bytes).file_name(form.file_name);
    if let Some(content_type) = &form.content_type {
        part = part.mime_str(content_type)?;
    }
    let mut multipart = Form::new().part("file", part);
    for (name, value) in form.fields {
        multipart = multipart.text(name, value);
    }
    Ok(multipart)
}

fn transport_error(url: &str, e: reqwest::Error) -> Error {
    if e.is_timeout() {
        warn!("⏱️ Request to {} timed out", url);
        Error::Timeout
    } else if e.is_connect() || e.is_request() || e.is_body() || e.is_decode() {
        warn!("🔌 Request to {} failed: {}", url, e);
        Error::Network(messages::NETWORK.to_string())
    } else {
        Error::Http(e)
    }
}

/// JSON when it parses, the raw text otherwise, null when empty.
fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_body_variants() {
        assert_eq!(parse_body(""), Value::Null);
        assert_eq!(parse_body("  \n"), Value::Null);
        assert_eq!(parse_body(r#"{"a":1}"#), json!({"a": 1}));
        assert_eq!(parse_body("Bad Gateway"), json!("Bad Gateway"));
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let transport = HttpTransport::new(&HttpConfig {
            base_url: "http://localhost:5001/api/".to_string(),
            timeout: Duration::from_secs(1),
        })
        .unwrap();
        assert_eq!(transport.url_for("/documents"), "http://localhost:5001/api/documents");
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        let result = HttpTransport::new(&HttpConfig {
            base_url: "ftp://example.com/api".to_string(),
            timeout: Duration::from_secs(1),
        });
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_a_network_error() {
        // Port 9 (discard) on localhost is closed in any sane test environment.
        let transport = HttpTransport::new(&HttpConfig {
            base_url: "http://127.0.0.1:9/api".to_string(),
            timeout: Duration::from_secs(2),
        })
        .unwrap();
        let err = transport
            .send(ApiRequest::new(Method::Get, "/documents"))
            .await
            .unwrap_err();
        assert!(err.is_retryable(), "unexpected error: {:?}", err);
    }
}
