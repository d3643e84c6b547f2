//! Registry client
//!
//! [`RegistryClient`] owns the shared HTTP client and turns an image reference
//! into a [`RepositorySession`]: the registry is probed once, authorization is
//! negotiated once, and the session then lists tags and resolves digests.

use crate::common::traits::{RepositoryApi, RepositoryConnector};
use crate::config::{DEFAULT_PAGE_SIZE, HttpConfig};
use crate::error::{RegistryError, Result};
use crate::image::reference::ImageReference;
use crate::registry::auth::{AuthNegotiator, Authorization};
use crate::registry::credentials::{CredentialsProvider, StaticCredentialsProvider};
use crate::registry::operations::{ManifestOperations, TagOperations};
use crate::registry::schema::{RegistryEndpoint, SchemaProbe};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use tracing::{debug, info};

pub struct RegistryClientBuilder {
    http: HttpConfig,
    page_size: usize,
    credentials: Option<Arc<dyn CredentialsProvider>>,
}

impl RegistryClientBuilder {
    pub fn new() -> Self {
        Self {
            http: HttpConfig::default(),
            page_size: DEFAULT_PAGE_SIZE,
            credentials: None,
        }
    }

    pub fn with_http_config(mut self, http: HttpConfig) -> Self {
        self.http = http;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_credentials(mut self, provider: Arc<dyn CredentialsProvider>) -> Self {
        self.credentials = Some(provider);
        self
    }

    pub fn build(self) -> Result<RegistryClient> {
        self.http.validate()?;
        if self.page_size == 0 {
            return Err(RegistryError::Validation(
                "page_size must be greater than 0".to_string(),
            ));
        }

        let mut builder = Client::builder()
            .connect_timeout(self.http.connect_timeout())
            .timeout(self.http.response_timeout())
            .user_agent(self.http.user_agent.clone());
        if self.http.skip_tls {
            builder = builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true);
        }
        let client = builder
            .build()
            .map_err(|e| RegistryError::Validation(format!("Failed to build HTTP client: {}", e)))?;

        let credentials = self
            .credentials
            .unwrap_or_else(|| Arc::new(StaticCredentialsProvider::default()));

        Ok(RegistryClient {
            probe: SchemaProbe::new(client.clone()),
            negotiator: AuthNegotiator::new(client.clone()),
            client,
            credentials,
            page_size: self.page_size,
        })
    }
}

impl Default for RegistryClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct RegistryClient {
    client: Client,
    probe: SchemaProbe,
    negotiator: AuthNegotiator,
    credentials: Arc<dyn CredentialsProvider>,
    page_size: usize,
}

impl RegistryClient {
    pub fn builder() -> RegistryClientBuilder {
        RegistryClientBuilder::new()
    }

    /// Probe the registry behind `reference` and authorize pull access to its repository.
    pub async fn connect(&self, reference: &ImageReference) -> Result<RepositorySession> {
        let endpoint = self.probe.probe(reference.registry()).await?;
        let credentials = self.credentials.credentials_for(reference.registry()).await?;

        let authorization = self
            .negotiator
            .authorize(
                endpoint.challenge.as_ref(),
                credentials.as_ref(),
                reference.repository(),
            )
            .await?;

        info!(
            "Connected to {} over {} ({} access)",
            endpoint.host,
            endpoint.scheme,
            authorization.scheme_name()
        );

        let base_url = endpoint.base_url();
        Ok(RepositorySession {
            registry: reference.registry().to_string(),
            repository: reference.repository().to_string(),
            tags: TagOperations::new(self.client.clone(), base_url.clone(), self.page_size),
            manifests: ManifestOperations::new(self.client.clone(), base_url, reference.registry()),
            endpoint,
            authorization,
        })
    }
}

#[async_trait]
impl RepositoryConnector for RegistryClient {
    type Session = RepositorySession;

    async fn connect(&self, reference: &ImageReference) -> Result<RepositorySession> {
        RegistryClient::connect(self, reference).await
    }
}

/// An authorized view of one repository on a probed registry
#[derive(Debug, Clone)]
pub struct RepositorySession {
    registry: String,
    repository: String,
    endpoint: RegistryEndpoint,
    authorization: Authorization,
    tags: TagOperations,
    manifests: ManifestOperations,
}

impl RepositorySession {
    pub fn endpoint(&self) -> &RegistryEndpoint {
        &self.endpoint
    }

    pub fn authorization(&self) -> &Authorization {
        &self.authorization
    }
}

#[async_trait]
impl RepositoryApi for RepositorySession {
    fn registry(&self) -> &str {
        &self.registry
    }

    fn repository(&self) -> &str {
        &self.repository
    }

    async fn list_tags(&self) -> Result<Vec<String>> {
        self.tags.list_tags(&self.repository, &self.authorization).await
    }

    async fn get_digest(&self, tag: &str) -> Result<String> {
        debug!("Getting digest for {}:{}", self.repository, tag);
        self.manifests
            .get_digest(&self.repository, tag, &self.authorization)
            .await
    }
}
