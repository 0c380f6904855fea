//! Client registry built from discovery descriptors.
//!
//! Instead of synthesizing string-keyed callables at runtime, the registry
//! is an explicit data structure: service name → endpoint name → route.
//! Duplicate endpoint names within a service are rejected at build time
//! rather than silently overwritten.

use indexmap::IndexMap;
use tracing::debug;

use banter_protocol::{HttpMethod, ServiceDescriptor};

use crate::error::RegistryError;
use crate::executor::{execute, CallOutcome, RequestParams};

/// Everything needed to invoke one endpoint: the values the original
/// dynamic dispatch captured per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Scheme + host + port, e.g. `http://localhost:8008`.
    pub origin: String,
    /// URL path, e.g. `/v1/inference`.
    pub path: String,
    pub method: HttpMethod,
}

/// Registry of invocable routes, one per `(service, endpoint)` pair.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    http: reqwest::Client,
    routes: IndexMap<String, IndexMap<String, Route>>,
}

impl ClientRegistry {
    /// Build a registry from discovery descriptors.
    ///
    /// Pure given its input: no I/O happens here. Fails on a duplicate
    /// endpoint name within one service.
    pub fn build(
        http: reqwest::Client,
        host: &str,
        descriptors: &[ServiceDescriptor],
    ) -> Result<Self, RegistryError> {
        let mut routes: IndexMap<String, IndexMap<String, Route>> = IndexMap::new();

        for service in descriptors {
            let origin = format!("http://{}:{}", host, service.port);
            let endpoints = routes.entry(service.name.clone()).or_default();

            for endpoint in &service.endpoints {
                let route = Route {
                    origin: origin.clone(),
                    path: endpoint.url_path.clone(),
                    method: endpoint.method,
                };
                if endpoints.insert(endpoint.name.clone(), route).is_some() {
                    return Err(RegistryError::DuplicateEndpoint {
                        service: service.name.clone(),
                        endpoint: endpoint.name.clone(),
                    });
                }
            }
        }

        debug!(
            "built client registry: {} service(s), {} route(s)",
            routes.len(),
            routes.values().map(IndexMap::len).sum::<usize>()
        );
        Ok(Self { http, routes })
    }

    /// Look up a route without invoking it.
    pub fn get(&self, service: &str, endpoint: &str) -> Option<&Route> {
        self.routes.get(service)?.get(endpoint)
    }

    /// Iterate services and their endpoint names in discovery order.
    pub fn services(&self) -> impl Iterator<Item = (&str, &IndexMap<String, Route>)> {
        self.routes.iter().map(|(name, eps)| (name.as_str(), eps))
    }

    /// Invoke one endpoint with the given parameters.
    ///
    /// Unknown names are the only `Err` here; everything that can go wrong
    /// during the call itself comes back inside the [`CallOutcome`].
    pub async fn invoke(
        &self,
        service: &str,
        endpoint: &str,
        params: RequestParams,
    ) -> Result<CallOutcome, RegistryError> {
        let route = self
            .get(service, endpoint)
            .ok_or_else(|| RegistryError::UnknownRoute {
                service: service.to_string(),
                endpoint: endpoint.to_string(),
            })?;

        Ok(execute(&self.http, &route.origin, &route.path, route.method, params).await)
    }
}
