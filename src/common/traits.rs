//! Common traits and interfaces
//!
//! The resolver and updater only talk to a registry through these traits, so
//! they can run against a live registry session or an in-memory fake.

use crate::error::Result;
use crate::image::reference::ImageReference;
use async_trait::async_trait;

/// Read-only registry capability for one repository
#[async_trait]
pub trait RepositoryApi: Send + Sync {
    /// Registry host the repository lives on, as configured
    fn registry(&self) -> &str;

    /// Repository path without the registry host
    fn repository(&self) -> &str;

    /// Every tag of the repository, in the order the registry returned them
    async fn list_tags(&self) -> Result<Vec<String>>;

    /// Manifest digest the registry reports for `tag`
    async fn get_digest(&self, tag: &str) -> Result<String>;
}

/// Opens a [`RepositoryApi`] for an image reference
#[async_trait]
pub trait RepositoryConnector: Send + Sync {
    type Session: RepositoryApi;

    async fn connect(&self, reference: &ImageReference) -> Result<Self::Session>;
}
