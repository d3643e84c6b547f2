//! Registry module for Docker registry interactions
//!
//! This module provides scheme detection, authentication and the read-only
//! client logic for the Docker Registry HTTP API v2: tag listing and manifest
//! digest lookup.

pub mod auth;
pub mod client;
pub mod credentials;
pub mod operations;
pub mod schema;

pub use auth::{AuthNegotiator, Authorization};
pub use client::{RegistryClient, RegistryClientBuilder, RepositorySession};
pub use credentials::{
    ChainedCredentialsProvider, Credentials, CredentialsProvider, EnvCredentialsProvider,
    StaticCredentialsProvider,
};
pub use operations::{DigestRecord, TagPage};
pub use schema::{AuthChallenge, RegistryEndpoint, Scheme, SchemaProbe};
