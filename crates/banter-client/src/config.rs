//! Client configuration.

use std::time::Duration;

/// Configuration for connecting to the local inference server.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Host the inference services run on (default: localhost)
    pub host: String,
    /// Port of the discovery/controller service
    pub port: u16,
    /// Connect timeout for non-streaming calls
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8000,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl ClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let host = std::env::var("BANTER_HOST").unwrap_or(defaults.host);

        let port = std::env::var("BANTER_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.port);

        let connect_timeout = std::env::var("BANTER_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.connect_timeout);

        Self {
            host,
            port,
            connect_timeout,
        }
    }

    /// Origin of the discovery service, e.g. `http://localhost:8000`.
    pub fn discovery_origin(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Origin for a service advertised on `port`.
    pub fn service_origin(&self, port: u16) -> String {
        format!("http://{}:{}", self.host, port)
    }

    /// Create a builder for configuration.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }
}

/// Builder for client configuration.
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}
