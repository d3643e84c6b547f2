//! Error types and handlers for registry operations

pub mod handlers;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Error, Debug)]
pub enum RegistryError {
    /// Transport, DNS or TLS failure once the scheme fallback is exhausted
    #[error("Registry unreachable at {endpoint}: {reason}")]
    RegistryUnreachable { endpoint: String, reason: String },

    /// Credentials rejected by a token endpoint or a protected call
    #[error("Unauthorized access: {endpoint}")]
    Unauthorized { endpoint: String },

    /// Manifest lookup returned 404
    #[error("Image not found in registry: {image}")]
    ImageNotFound { image: String },

    /// Any other non-2xx status, or a 2xx response missing a mandated header or field
    #[error("Registry error at {endpoint}{}: {message}", status.map(|s| format!(" (status {})", s)).unwrap_or_default())]
    Registry {
        endpoint: String,
        status: Option<u16>,
        message: String,
    },

    #[error("Invalid image reference: {0}")]
    InvalidReference(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The static tag and the floating tag no longer share a digest
    #[error("Static image digest does not match latest image digest for {image}: expected {expected}, got {actual}")]
    IncorrectDigest {
        image: String,
        expected: String,
        actual: String,
    },

    /// A fatal failure during tag resolution, with the step that failed
    #[error("Failed to {operation} for {repository}:{tag}: {source}")]
    Resolution {
        repository: String,
        tag: String,
        operation: &'static str,
        #[source]
        source: Box<RegistryError>,
    },
}

impl RegistryError {
    pub fn registry(endpoint: impl Into<String>, status: Option<u16>, message: impl Into<String>) -> Self {
        RegistryError::Registry {
            endpoint: endpoint.into(),
            status,
            message: message.into(),
        }
    }

    /// Wrap with the repository, tag and operation that were being resolved
    pub fn during(self, operation: &'static str, repository: &str, tag: &str) -> Self {
        RegistryError::Resolution {
            repository: repository.to_string(),
            tag: tag.to_string(),
            operation,
            source: Box::new(self),
        }
    }

    /// The innermost error, looking through resolution context
    pub fn root(&self) -> &RegistryError {
        match self {
            RegistryError::Resolution { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), RegistryError::ImageNotFound { .. })
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self.root(), RegistryError::Unauthorized { .. })
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self.root() {
            RegistryError::Registry { status, .. } => *status,
            RegistryError::Unauthorized { .. } => Some(401),
            RegistryError::ImageNotFound { .. } => Some(404),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        RegistryError::Parse(err.to_string())
    }
}

impl From<reqwest::Error> for RegistryError {
    fn from(err: reqwest::Error) -> Self {
        handlers::NetworkErrorHandler::handle_network_error(&err, "registry request")
    }
}

impl From<url::ParseError> for RegistryError {
    fn from(err: url::ParseError) -> Self {
        RegistryError::Validation(err.to_string())
    }
}

impl From<regex::Error> for RegistryError {
    fn from(err: regex::Error) -> Self {
        RegistryError::Validation(format!("Invalid pattern: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_context_keeps_root_cause() {
        let err = RegistryError::ImageNotFound {
            image: "registry.example.com/app/foo:latest".to_string(),
        }
        .during("get digest", "app/foo", "latest");

        assert!(err.is_not_found());
        assert_eq!(err.status(), Some(404));
        let message = err.to_string();
        assert!(message.contains("app/foo:latest"));
        assert!(message.contains("get digest"));
    }

    #[test]
    fn registry_error_display_includes_status() {
        let err = RegistryError::registry("https://r.example.com/v2/a/tags/list", Some(500), "Error getting tags");
        assert_eq!(
            err.to_string(),
            "Registry error at https://r.example.com/v2/a/tags/list (status 500): Error getting tags"
        );

        let err = RegistryError::registry("https://r.example.com/token", None, "missing token");
        assert_eq!(err.to_string(), "Registry error at https://r.example.com/token: missing token");
    }
}
