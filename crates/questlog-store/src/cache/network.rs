//! Network seam used by the cache worker for every non-cached fetch.

use async_trait::async_trait;

use crate::error::{CacheError, Result};

use super::types::{Request, Response};

#[async_trait]
pub trait Network: Send + Sync {
    /// Perform `request`. Transport failures are errors; HTTP error
    /// statuses are ordinary responses.
    async fn fetch(&self, request: &Request) -> Result<Response, CacheError>;
}

#[cfg(feature = "rest")]
pub use http::HttpNetwork;

#[cfg(feature = "rest")]
mod http {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use super::*;

    /// `Network` over `reqwest`.
    pub struct HttpNetwork {
        client: reqwest::Client,
    }

    impl HttpNetwork {
        pub fn new(timeout: Duration) -> Result<Self, CacheError> {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| CacheError::Client(e.to_string()))?;
            Ok(Self { client })
        }
    }

    #[async_trait]
    impl Network for HttpNetwork {
        async fn fetch(&self, request: &Request) -> Result<Response, CacheError> {
            let network_err = |e: reqwest::Error| CacheError::Network {
                url: request.url.to_string(),
                message: e.to_string(),
            };

            let method = reqwest::Method::from_bytes(request.method.as_bytes()).map_err(|e| {
                CacheError::Network {
                    url: request.url.to_string(),
                    message: e.to_string(),
                }
            })?;
            let mut builder = self.client.request(method, request.url.clone());
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }

            let response = builder.send().await.map_err(network_err)?;
            let status = response.status().as_u16();
            let mut headers = BTreeMap::new();
            for (name, value) in response.headers() {
                if let Ok(v) = value.to_str() {
                    headers.insert(name.as_str().to_string(), v.to_string());
                }
            }
            let body = response.bytes().await.map_err(network_err)?.to_vec();
            Ok(Response {
                status,
                headers,
                body,
            })
        }
    }
}
