//! Manifest digest lookup for registry client
//!
//! Implements `HEAD /v2/{name}/manifests/{reference}` and reads the digest the
//! registry reports in `Docker-Content-Digest`. Digests are never computed locally.

use crate::error::handlers::{HttpErrorHandler, NetworkErrorHandler};
use crate::error::{RegistryError, Result};
use crate::registry::auth::Authorization;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::trace;

pub const MEDIA_TYPE_MANIFEST_V2: &str = "application/vnd.docker.distribution.manifest.v2+json";
pub const DOCKER_CONTENT_DIGEST: &str = "Docker-Content-Digest";

/// A tag and the digest its manifest resolved to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DigestRecord {
    pub tag: String,
    pub digest: String,
}

#[derive(Debug, Clone)]
pub struct ManifestOperations {
    client: Client,
    base_url: String,
    /// `registry/` prefix used when naming images in errors
    image_prefix: String,
}

impl ManifestOperations {
    pub fn new(client: Client, base_url: String, registry: &str) -> Self {
        Self {
            client,
            base_url,
            image_prefix: format!("{}/", registry),
        }
    }

    pub async fn get_digest(&self, repository: &str, tag: &str, authorization: &Authorization) -> Result<String> {
        let url = format!("{}/{}/manifests/{}", self.base_url, repository, tag);
        let image = format!("{}{}:{}", self.image_prefix, repository, tag);

        let request = authorization.apply(self.client.head(&url).header(ACCEPT, MEDIA_TYPE_MANIFEST_V2));
        let response = request
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, &url))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(HttpErrorHandler::handle_manifest_error(status, &url, &image));
        }

        let digest = response
            .headers()
            .get(DOCKER_CONTENT_DIGEST)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .ok_or_else(|| {
                RegistryError::registry(
                    url.as_str(),
                    Some(status.as_u16()),
                    "Docker-Content-Digest header was not set in the response",
                )
            })?;

        trace!("{} -> {}", image, digest);
        Ok(digest.to_string())
    }
}
