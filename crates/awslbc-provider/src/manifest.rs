//! Loading ConfigFile manifests

use std::time::Duration;

use tracing::{debug, info};

use awslbc_common::retry::{retry_with_backoff_if, RetryConfig};
use awslbc_infra::crds::ManifestSource;
use awslbc_resource::ProviderError;

/// Timeout for a single manifest download
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Downloads remote manifests
#[derive(Debug, Clone)]
pub struct ManifestFetcher {
    http: reqwest::Client,
    retry: RetryConfig,
}

#[derive(Debug, thiserror::Error)]
enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
}

impl FetchError {
    /// Server errors and transport failures are worth another attempt
    fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => {
                status.is_server_error() || *status == reqwest::StatusCode::TOO_MANY_REQUESTS
            }
        }
    }
}

impl ManifestFetcher {
    /// Fetcher with the HTTP retry policy
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_retry(RetryConfig::http())
    }

    /// Fetcher with a custom retry policy
    pub fn with_retry(retry: RetryConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::backend(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { http, retry })
    }

    /// Text of the manifest, downloading it if it is remote
    pub async fn load(&self, source: &ManifestSource) -> Result<String, ProviderError> {
        match source {
            ManifestSource::Yaml { content } => Ok(content.clone()),
            ManifestSource::File { url } => self.fetch(url).await,
        }
    }

    async fn fetch(&self, url: &str) -> Result<String, ProviderError> {
        info!(url = %url, "fetching manifest");
        let body = retry_with_backoff_if(&self.retry, "fetch-manifest", FetchError::is_retryable, || {
            let http = self.http.clone();
            async move {
                let response = http.get(url).send().await.map_err(|source| {
                    FetchError::Transport {
                        url: url.to_string(),
                        source,
                    }
                })?;
                let status = response.status();
                if !status.is_success() {
                    return Err(FetchError::Status {
                        url: url.to_string(),
                        status,
                    });
                }
                response.text().await.map_err(|source| FetchError::Transport {
                    url: url.to_string(),
                    source,
                })
            }
        })
        .await
        .map_err(ProviderError::backend)?;

        debug!(url = %url, bytes = body.len(), "fetched manifest");
        Ok(body)
    }
}
