//! Docker image reference handling
//!
//! Parses `[registry/]repository[:tag][@digest]` strings into [`ImageReference`]
//! and knows which registry hosts are aliases of Docker Hub.

pub mod reference;

pub use reference::{DEFAULT_REGISTRY, ImageReference, api_host, is_docker_hub};
