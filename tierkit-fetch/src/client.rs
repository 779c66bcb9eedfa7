//! HTTP client over a configured domain

use crate::classify::classify_body;
use crate::path::{FetchSpec, HttpMethod};
use crate::{Fetcher, Resource, ResourceFetcher};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header, Client, Url};
use tierkit_core::{DomainInfo, FetchError, RawResponse, TierResult};

/// Issues one request per call against a single scheme/host/port.
///
/// There is no retry and no backoff. The HTTP status is not inspected: any
/// body that arrives is classified, and a transport failure is reported as
/// `BadResponse`.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    domain: DomainInfo,
}

impl ApiClient {
    /// Create a client for `domain`.
    pub fn new(domain: DomainInfo) -> TierResult<Self> {
        Self::with_client(Client::new(), domain)
    }

    /// Create a client reusing an existing reqwest client.
    pub fn with_client(client: Client, domain: DomainInfo) -> TierResult<Self> {
        domain.validate()?;
        Ok(Self { client, domain })
    }

    pub fn domain(&self) -> &DomainInfo {
        &self.domain
    }

    /// Build the request URL for `spec`.
    ///
    /// `GET` parameters become query items; `POST` ignores them.
    pub fn build_url(&self, spec: &FetchSpec) -> Result<Url, FetchError> {
        if !spec.path.is_empty() && !spec.path.starts_with('/') {
            return Err(FetchError::InvalidUrl {
                reason: format!("path {:?} must start with '/'", spec.path),
            });
        }

        let base = match self.domain.port {
            Some(port) => format!("{}://{}:{}", self.domain.scheme, self.domain.host, port),
            None => format!("{}://{}", self.domain.scheme, self.domain.host),
        };
        let mut url = Url::parse(&base).map_err(|e| FetchError::InvalidUrl {
            reason: format!("{}: {}", base, e),
        })?;

        if url.cannot_be_a_base() || url.path() != "/" || url.query().is_some() {
            return Err(FetchError::InvalidUrl {
                reason: format!("{} is not a bare scheme/host/port", base),
            });
        }

        url.set_path(&spec.path);

        if let (HttpMethod::Get, Some(parameters)) = (&spec.method, &spec.parameters) {
            if !parameters.is_empty() {
                url.query_pairs_mut().extend_pairs(
                    parameters
                        .iter()
                        .map(|(name, value)| (name.as_str(), value.as_str())),
                );
            }
        }

        Ok(url)
    }

    /// Execute `spec` and classify the response body.
    pub async fn send(&self, spec: &FetchSpec) -> Result<RawResponse, FetchError> {
        let url = self.build_url(spec)?;

        let mut builder = match &spec.method {
            HttpMethod::Get => self.client.get(url.clone()),
            HttpMethod::Post { body } => {
                let builder = self.client.post(url.clone());
                match body {
                    Some(body) => builder.body(body.clone()),
                    None => builder,
                }
            }
        };

        builder = builder.timeout(self.domain.timeout);
        if let Some(cache_control) = self.domain.cache_policy.cache_control() {
            builder = builder.header(header::CACHE_CONTROL, cache_control);
        }

        let body = match builder.send().await {
            Ok(response) => {
                tracing::debug!(
                    method = spec.method.as_str(),
                    %url,
                    status = response.status().as_u16(),
                    "Response received"
                );
                match response.bytes().await {
                    Ok(body) => Some(body),
                    Err(e) => {
                        tracing::debug!(%url, error = %e, "Failed to read response body");
                        None
                    }
                }
            }
            Err(e) => {
                tracing::debug!(method = spec.method.as_str(), %url, error = %e, "HTTP request failed");
                None
            }
        };

        classify_body(body)
    }

    /// Download an absolute URL, returning the bytes and the final URL after redirects.
    pub async fn download(&self, url: &str) -> Result<Resource, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            reason: format!("{}: {}", url, e),
        })?;

        let response = self
            .client
            .get(parsed)
            .timeout(self.domain.timeout)
            .send()
            .await
            .map_err(|e| FetchError::BadResponse {
                reason: format!("HTTP request failed: {}", e),
            })?;

        let final_url = response.url().to_string();
        let data: Bytes = response.bytes().await.map_err(|e| FetchError::BadResponse {
            reason: format!("Failed to read response body: {}", e),
        })?;

        tracing::debug!(url, %final_url, bytes = data.len(), "Resource downloaded");
        Ok(Resource {
            data,
            url: final_url,
        })
    }
}

#[async_trait]
impl Fetcher for ApiClient {
    async fn request(&self, spec: &FetchSpec) -> Result<RawResponse, FetchError> {
        self.send(spec).await
    }
}

#[async_trait]
impl ResourceFetcher for ApiClient {
    async fn fetch_resource(&self, url: &str) -> Result<Resource, FetchError> {
        self.download(url).await
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("domain", &self.domain)
            .finish()
    }
}
