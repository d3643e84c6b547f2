//! Registry operations module
//!
//! One type per registry endpoint family, each bound to a probed base URL.

pub mod manifest_operations;
pub mod tag_operations;

pub use manifest_operations::{DigestRecord, ManifestOperations};
pub use tag_operations::{TagOperations, TagPage, parse_next_link};
