use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{info, warn};

use crate::utils::parse_headers_with_escapes;

/// Configuration for building the HTTP client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub timeout: Duration,
    pub skip_tls_verify: bool,
    pub custom_headers: Option<String>,
}

/// Result of building the client, includes parsed headers for logging.
pub struct ClientBuildResult {
    pub client: reqwest::Client,
    pub parsed_headers: HeaderMap,
}

/// Builds the reqwest client shared by all workers.
///
/// The request timeout is the per-operation timeout; the engine itself never
/// cancels an in-flight operation.
pub fn build_client(
    config: &ClientConfig,
) -> Result<ClientBuildResult, Box<dyn std::error::Error + Send + Sync>> {
    let mut client_builder = reqwest::Client::builder().timeout(config.timeout);

    let parsed_headers = configure_custom_headers(config.custom_headers.as_deref())?;
    if !parsed_headers.is_empty() {
        client_builder = client_builder.default_headers(parsed_headers.clone());
        info!(count = parsed_headers.len(), "Configured custom default headers");
    }

    if config.skip_tls_verify {
        warn!("Skipping TLS certificate verification");
        client_builder = client_builder
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true);
    }

    Ok(ClientBuildResult {
        client: client_builder.build()?,
        parsed_headers,
    })
}

/// Parses `Name:value` pairs into a header map.
pub fn configure_custom_headers(
    headers_str: Option<&str>,
) -> Result<HeaderMap, Box<dyn std::error::Error + Send + Sync>> {
    let mut headers = HeaderMap::new();
    let Some(headers_str) = headers_str else {
        return Ok(headers);
    };

    for header in parse_headers_with_escapes(headers_str) {
        let (name, value) = header
            .split_once(':')
            .ok_or_else(|| format!("Invalid header '{}': expected 'Name:value'", header.trim()))?;

        let name = HeaderName::from_bytes(name.trim().as_bytes())
            .map_err(|e| format!("Invalid header name '{}': {}", name.trim(), e))?;
        let value = HeaderValue::from_str(value.trim())
            .map_err(|e| format!("Invalid header value for '{}': {}", name, e))?;
        headers.insert(name, value);
    }

    Ok(headers)
}
