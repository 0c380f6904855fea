//! Endpoint discovery.

use tracing::{debug, warn};

use banter_protocol::{ResponseEnvelope, ServiceDescriptor};

/// Fixed path of the discovery call on the controller service.
pub const DISCOVERY_PATH: &str = "/v1/services";

/// Fetch the list of advertised services from the discovery endpoint.
///
/// Issues one GET against `origin` + [`DISCOVERY_PATH`]. Any transport
/// failure, malformed JSON, or `success:false` envelope yields `None`
/// with no partial results and no retries; the caller decides whether to
/// retry the whole connection flow. The result is not cached here.
pub async fn fetch_descriptors(
    http: &reqwest::Client,
    origin: &str,
) -> Option<Vec<ServiceDescriptor>> {
    let url = format!("{origin}{DISCOVERY_PATH}");
    debug!("fetching service descriptors from {}", url);

    let response = match http.get(&url).send().await {
        Ok(response) => response,
        Err(e) if e.is_connect() => {
            warn!("inference server not running at {}: {}", origin, e);
            return None;
        }
        Err(e) => {
            warn!("discovery request failed: {}", e);
            return None;
        }
    };

    let envelope: ResponseEnvelope<Vec<ServiceDescriptor>> = match response.json().await {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("malformed discovery response: {}", e);
            return None;
        }
    };

    if !envelope.success {
        warn!("discovery refused: {}", envelope.message);
        return None;
    }

    let services = envelope.data.unwrap_or_default();
    debug!("discovered {} service(s)", services.len());
    Some(services)
}
