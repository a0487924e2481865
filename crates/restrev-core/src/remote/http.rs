//! reqwest-backed gateway

use reqwest::Method;
use serde_json::Value as JsonValue;

use super::request::{ApiRequest, Endpoints, HttpMethod};
use super::RemoteGateway;
use crate::config::ClientConfig;
use crate::error::{Error, NetworkError, Result};
use crate::util::error_excerpt;

/// HTTP client for the restaurant backend.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    endpoints: Endpoints,
    client: reqwest::Client,
}

impl HttpGateway {
    /// Builds a gateway from the client configuration.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|error| Error::Config(format!("Failed to construct HTTP client: {error}")))?;
        Ok(Self {
            endpoints: Endpoints::new(config.api_base_url.as_str()),
            client,
        })
    }

    /// Returns the base URL this gateway was configured with.
    pub fn base_url(&self) -> &str {
        self.endpoints.base_url()
    }
}

const fn method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
    }
}

impl RemoteGateway for HttpGateway {
    fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    async fn execute(&self, request: &ApiRequest) -> std::result::Result<JsonValue, NetworkError> {
        let mut builder = self.client.request(method(request.method), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.to_string());
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::debug!("{} {} failed with HTTP {status}", request.method, request.url);
            return Err(NetworkError::Status {
                status: status.as_u16(),
                message: error_excerpt(&body),
            });
        }
        if body.trim().is_empty() {
            return Ok(JsonValue::Null);
        }
        serde_json::from_str(&body).map_err(|error| NetworkError::Decode(error.to_string()))
    }
}
