//! Service and endpoint descriptors returned by the discovery call.

use serde::{Deserialize, Serialize};

/// One service advertised by the inference server.
///
/// Descriptors are created once from a discovery response and never mutated
/// afterwards; the client registry owns them for the life of the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    /// Service name, e.g. `textInference`.
    pub name: String,
    /// TCP port the service listens on.
    pub port: u16,
    /// Endpoints exposed by this service.
    pub endpoints: Vec<EndpointDescriptor>,
}

/// One callable HTTP endpoint within a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    /// Endpoint name, unique within its owning service.
    pub name: String,
    /// URL path, e.g. `/v1/inference`.
    #[serde(rename = "urlPath")]
    pub url_path: String,
    /// HTTP method for the call.
    pub method: HttpMethod,
}

/// HTTP methods the discovery protocol can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
}

impl HttpMethod {
    /// Uppercase wire form of the method.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Head => "HEAD",
        }
    }

    /// Whether a request with this method carries a body.
    pub fn has_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
