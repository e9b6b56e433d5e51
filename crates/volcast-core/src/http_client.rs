use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Query parameters whose values never appear in logs or error messages.
const SECRET_PARAMS: &[&str] = &["apikey"];

/// GET request envelope used by price feed transport calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: BTreeMap<String, String>,
    pub timeout_ms: u64,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            query: Vec::new(),
            headers: BTreeMap::new(),
            timeout_ms: 10_000,
        }
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Full URL with percent-encoded query parameters.
    pub fn full_url(&self) -> String {
        self.render(false)
    }

    /// URL safe to log: secret parameter values are masked.
    pub fn redacted_url(&self) -> String {
        self.render(true)
    }

    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn render(&self, redact: bool) -> String {
        if self.query.is_empty() {
            return self.url.clone();
        }

        let query = self
            .query
            .iter()
            .map(|(name, value)| {
                let value = if redact && SECRET_PARAMS.contains(&name.as_str()) {
                    String::from("***")
                } else {
                    urlencoding::encode(value).into_owned()
                };
                format!("{}={value}", urlencoding::encode(name))
            })
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{query}", self.url)
    }
}

/// HTTP response envelope returned by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn ok_json(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Transport-level HTTP error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    message: String,
}

impl HttpError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for HttpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HttpError {}

/// Transport seam for price feeds; lets tests serve canned bodies.
pub trait HttpClient: Send + Sync {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>>;
}

/// Production HTTP client backed by reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Arc<reqwest::Client>,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self {
            client: Arc::new(
                reqwest::Client::builder()
                    .user_agent(concat!("volcast/", env!("CARGO_PKG_VERSION")))
                    .build()
                    .unwrap_or_else(|_| reqwest::Client::new()),
            ),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient for ReqwestHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        Box::pin(async move {
            let mut builder = self
                .client
                .get(&request.url)
                .query(&request.query)
                .timeout(std::time::Duration::from_millis(request.timeout_ms));
            for (name, value) in &request.headers {
                builder = builder.header(name, value);
            }

            // reqwest errors embed the URL, which carries the API key.
            let response = builder.send().await.map_err(|error| {
                let error = error.without_url();
                if error.is_timeout() {
                    HttpError::new(format!("request timeout: {error}"))
                } else if error.is_connect() {
                    HttpError::new(format!("connection failed: {error}"))
                } else {
                    HttpError::new(format!("request failed: {error}"))
                }
            })?;

            let status = response.status().as_u16();
            let body = response.text().await.map_err(|error| {
                HttpError::new(format!(
                    "failed to read response body: {}",
                    error.without_url()
                ))
            })?;

            Ok(HttpResponse { status, body })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_parameters_are_percent_encoded() {
        let request = HttpRequest::get("https://example.test/query")
            .with_query("function", "TIME_SERIES_DAILY_ADJUSTED")
            .with_query("symbol", "BRK.B & co");

        assert_eq!(
            request.full_url(),
            "https://example.test/query?function=TIME_SERIES_DAILY_ADJUSTED&symbol=BRK.B%20%26%20co"
        );
    }

    #[test]
    fn redacted_url_masks_api_key() {
        let request = HttpRequest::get("https://example.test/query")
            .with_query("symbol", "IBM")
            .with_query("apikey", "secret-123");

        assert_eq!(request.query_value("apikey"), Some("secret-123"));
        let redacted = request.redacted_url();
        assert!(!redacted.contains("secret-123"));
        assert!(redacted.ends_with("apikey=***"));
    }

    #[test]
    fn header_names_are_lowercased() {
        let request = HttpRequest::get("https://example.test").with_header("X-Trace", "1");
        assert_eq!(request.headers.get("x-trace").map(String::as_str), Some("1"));
    }
}
