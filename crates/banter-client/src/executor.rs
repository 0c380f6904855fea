//! Single-request execution with uniform failure normalization.
//!
//! The executor owns every protocol-level decision for one HTTP call: URL
//! and query-string construction, JSON vs. multipart body selection, and
//! response classification. Whatever goes wrong, the caller gets a failure
//! envelope back, never an `Err` and never a panic; a raw streaming
//! response is the one outcome handed back unparsed.

use reqwest::header::{HeaderValue, CACHE_CONTROL, CONTENT_TYPE};
use reqwest::multipart::Form;
use reqwest::redirect::Policy;
use reqwest::Url;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use banter_protocol::{HttpMethod, ResponseEnvelope};

use crate::config::ClientConfig;

/// Parameters for one endpoint invocation.
///
/// At most one of `body`/`form` is meaningful per call; `query` is always
/// serialized to a query string regardless of HTTP method.
#[derive(Default)]
pub struct RequestParams {
    /// Key/value pairs appended to the URL as a query string.
    pub query: Option<Map<String, Value>>,
    /// JSON body for body-bearing methods.
    pub body: Option<Value>,
    /// Multipart form; when set it wins over `body` and the content type
    /// is left to the transport so it can set the multipart boundary.
    pub form: Option<Form>,
}

impl RequestParams {
    pub fn with_query(mut self, query: Map<String, Value>) -> Self {
        self.query = Some(query);
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_form(mut self, form: Form) -> Self {
        self.form = Some(form);
        self
    }

    /// Which body encoding this call will use.
    pub fn encoding(&self, method: HttpMethod) -> BodyEncoding {
        if self.form.is_some() {
            BodyEncoding::Multipart
        } else if method.has_body() && self.body.is_some() {
            BodyEncoding::Json
        } else {
            BodyEncoding::Empty
        }
    }
}

impl std::fmt::Debug for RequestParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestParams")
            .field("query", &self.query)
            .field("body", &self.body)
            .field("form", &self.form.is_some())
            .finish()
    }
}

/// Body encoding chosen for a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyEncoding {
    /// Multipart form data; transport sets the boundary content type.
    Multipart,
    /// JSON-encoded body with `Content-Type: application/json`.
    Json,
    /// No body.
    Empty,
}

/// Result of one executed call.
#[derive(Debug)]
pub enum CallOutcome {
    /// Parsed (or synthesized) response envelope.
    Envelope(ResponseEnvelope<Value>),
    /// Raw streaming response; decoding is the caller's responsibility.
    Stream(reqwest::Response),
}

impl CallOutcome {
    /// Convenience for tests and non-streaming callers.
    pub fn into_envelope(self) -> Option<ResponseEnvelope<Value>> {
        match self {
            CallOutcome::Envelope(env) => Some(env),
            CallOutcome::Stream(_) => None,
        }
    }
}

/// Build the shared HTTP client with the fixed request policy: no referer,
/// bounded redirect following, and no response caching.
pub fn http_client(config: &ClientConfig) -> Result<reqwest::Client, reqwest::Error> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));

    reqwest::Client::builder()
        .default_headers(headers)
        .referer(false)
        .redirect(Policy::limited(10))
        .connect_timeout(config.connect_timeout)
        .build()
}

/// Execute one HTTP call against `origin` + `path`.
///
/// Never returns an error: transport failures, malformed bodies, and
/// server-reported errors all come back as a failure envelope.
pub async fn execute(
    http: &reqwest::Client,
    origin: &str,
    path: &str,
    method: HttpMethod,
    params: RequestParams,
) -> CallOutcome {
    match try_execute(http, origin, path, method, params).await {
        Ok(outcome) => outcome,
        Err(message) => {
            warn!("request to {}{} failed: {}", origin, path, message);
            CallOutcome::Envelope(ResponseEnvelope::failure(message))
        }
    }
}

async fn try_execute(
    http: &reqwest::Client,
    origin: &str,
    path: &str,
    method: HttpMethod,
    params: RequestParams,
) -> Result<CallOutcome, String> {
    let url = build_url(origin, path, params.query.as_ref())?;
    debug!("{} {}", method, url);

    let mut request = http.request(to_reqwest_method(method), url);
    request = match params.encoding(method) {
        // `form` checked Some by encoding()
        BodyEncoding::Multipart => request.multipart(params.form.unwrap_or_else(Form::new)),
        BodyEncoding::Json => {
            let body = params.body.unwrap_or(Value::Null);
            request
                .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                .body(body.to_string())
        }
        BodyEncoding::Empty => request,
    };

    let response = request.send().await.map_err(|e| e.to_string())?;

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();

    if is_stream_content_type(&content_type) {
        return Ok(CallOutcome::Stream(response));
    }

    let text = response.text().await.map_err(|e| e.to_string())?;
    Ok(CallOutcome::Envelope(interpret_body(&text)))
}

/// Construct the target URL, appending the query string independent of the
/// HTTP method. String values go in verbatim; everything else uses its JSON
/// rendering.
fn build_url(origin: &str, path: &str, query: Option<&Map<String, Value>>) -> Result<Url, String> {
    let mut url = Url::parse(&format!("{origin}{path}"))
        .map_err(|e| format!("invalid URL {origin}{path}: {e}"))?;

    if let Some(query) = query {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in query {
            match value {
                Value::String(s) => pairs.append_pair(key, s),
                other => pairs.append_pair(key, &other.to_string()),
            };
        }
    }

    Ok(url)
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Head => reqwest::Method::HEAD,
    }
}

/// Whether a declared content type marks a streaming body.
fn is_stream_content_type(content_type: &str) -> bool {
    content_type.starts_with("text/event-stream")
        || content_type.starts_with("application/octet-stream")
}

/// Normalize a non-streaming response body into an envelope.
fn interpret_body(text: &str) -> ResponseEnvelope<Value> {
    if text.trim().is_empty() {
        return ResponseEnvelope::failure("empty response body");
    }

    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => return ResponseEnvelope::failure(format!("malformed JSON response: {e}")),
    };

    // An explicit error marker wins over whatever else the body says.
    if let Some(error) = value.get("error") {
        let message = error
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return ResponseEnvelope::failure(message);
    }

    match serde_json::from_value::<ResponseEnvelope<Value>>(value) {
        Ok(envelope) => envelope,
        Err(e) => ResponseEnvelope::failure(format!("unexpected response shape: {e}")),
    }
}
