//! HTTP transport used by the network module.
//!
//! A transport reports the HTTP status code of an attempt, or `0` when no
//! response was received at all. Retry decisions are made by the caller.

use crate::network::{NetworkSettings, Request};
use std::fmt;

/// Status reported when the request produced no response.
pub const NO_RESPONSE: u16 = 0;

/// Sends a request and reports the response status.
pub trait Transport: Send + 'static {
    fn post(&self, request: &Request) -> u16;
}

impl<F> Transport for F
where
    F: Fn(&Request) -> u16 + Send + 'static,
{
    fn post(&self, request: &Request) -> u16 {
        self(request)
    }
}

/// Network error types.
#[derive(Debug)]
pub enum NetworkError {
    /// Client or runtime could not be created
    Config(String),
    /// Network/HTTP error
    Network(String),
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::Config(msg) => write!(f, "Network config error: {msg}"),
            NetworkError::Network(msg) => write!(f, "Network error: {msg}"),
        }
    }
}

impl std::error::Error for NetworkError {}

/// Blocking HTTP transport backed by `reqwest` on a private runtime.
#[cfg(feature = "http")]
pub struct HttpTransport {
    url: String,
    client: reqwest::Client,
    runtime: tokio::runtime::Runtime,
}

#[cfg(feature = "http")]
impl HttpTransport {
    pub fn new(settings: &NetworkSettings) -> Result<Self, NetworkError> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| NetworkError::Config(format!("Failed to create HTTP client: {e}")))?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| NetworkError::Config(format!("Failed to create runtime: {e}")))?;

        Ok(Self {
            url: settings.url.clone(),
            client,
            runtime,
        })
    }

    async fn send(&self, request: &Request) -> Result<u16, NetworkError> {
        let mut builder = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header("Cache-Control", "no-cache, no-store");
        for (key, value) in request.headers() {
            builder = builder.header(key.as_str(), value.as_str());
        }

        let response = builder
            .body(request.body().to_string())
            .send()
            .await
            .map_err(|e| NetworkError::Network(e.to_string()))?;

        Ok(response.status().as_u16())
    }
}

#[cfg(feature = "http")]
impl Transport for HttpTransport {
    fn post(&self, request: &Request) -> u16 {
        match self.runtime.block_on(self.send(request)) {
            Ok(status) => status,
            Err(e) => {
                tracing::debug!(error = %e, url = %self.url, "request produced no response");
                NO_RESPONSE
            }
        }
    }
}

/// Transport for builds without an HTTP client. Every request is accepted and dropped.
pub struct DiscardTransport;

impl Transport for DiscardTransport {
    fn post(&self, request: &Request) -> u16 {
        tracing::warn!(
            bytes = request.body().len(),
            "HTTP support not compiled in, dropping payload"
        );
        204
    }
}

/// The transport selected by enabled features.
pub fn default_transport(settings: &NetworkSettings) -> Result<Box<dyn Transport>, NetworkError> {
    #[cfg(feature = "http")]
    {
        Ok(Box::new(HttpTransport::new(settings)?))
    }

    #[cfg(not(feature = "http"))]
    {
        let _ = settings;
        Ok(Box::new(DiscardTransport))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_transport() {
        let transport = |request: &Request| -> u16 { if request.body().is_empty() { 400 } else { 200 } };
        let settings = NetworkSettings::default();
        assert_eq!(transport.post(&Request::json("{}", &settings)), 200);
        assert_eq!(transport.post(&Request::json("", &settings)), 400);
    }

    #[cfg(feature = "http")]
    #[test]
    fn test_unreachable_host_reports_no_response() {
        let settings = NetworkSettings::builder()
            .url("http://127.0.0.1:1/v1/record")
            .request_timeout(std::time::Duration::from_secs(2))
            .build();
        let transport = HttpTransport::new(&settings).unwrap();
        assert_eq!(
            transport.post(&Request::json("{}", &settings)),
            NO_RESPONSE
        );
    }
}
