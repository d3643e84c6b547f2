//! Docker Tag Pinner Library
//!
//! This file serves as the library root for the docker-tag-pinner crate,
//! organizing and exposing the modules that resolve which immutable tag a
//! floating tag (such as `latest`) currently points at.

pub mod cli;
pub mod common;
pub mod config;
pub mod error;
pub mod image;
pub mod logging;
pub mod registry;
pub mod resolver;

pub use common::{RepositoryApi, RepositoryConnector};
pub use config::AppConfig;
pub use error::{RegistryError, Result};
pub use image::ImageReference;
pub use logging::Logger;
pub use registry::{Credentials, RegistryClient, RegistryClientBuilder};
pub use resolver::{LatestVersionResolver, StaticTagResolution};
