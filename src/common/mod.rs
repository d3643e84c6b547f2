//! Common module - shared traits and interfaces

pub mod traits;

pub use traits::{RepositoryApi, RepositoryConnector};
