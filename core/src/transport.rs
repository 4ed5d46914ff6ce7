//! Executes `HttpRequest` values against the network.
//!
//! The store is generic over `Transport` so tests can substitute a scripted
//! fake; `ReqwestTransport` is the production implementation.

use std::future::Future;

use tracing::debug;

use crate::error::{CatalogError, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

pub trait Transport: Send + Sync {
    /// Performs the round-trip. Non-2xx statuses are returned as data;
    /// only failures to obtain a response are errors.
    fn execute(&self, request: HttpRequest) -> impl Future<Output = Result<HttpResponse>> + Send;
}

#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };
        debug!(method = request.method.as_str(), path = %request.path, "sending request");

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let network_failure = |e: reqwest::Error| {
            debug!(path = %request.path, error = %e, "request failed before a response");
            CatalogError::RequestFailed {
                status: None,
                path: request.path.clone(),
            }
        };
        let response = builder.send().await.map_err(network_failure)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response.text().await.map_err(network_failure)?;

        Ok(HttpResponse {
            status,
            path: request.path.clone(),
            headers,
            body,
        })
    }
}
