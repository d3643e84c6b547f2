//! Standardized mapping of HTTP statuses and transport failures to registry errors

use crate::error::RegistryError;
use reqwest::StatusCode;
use std::error::Error as StdError;

/// Standard error handler for HTTP responses
pub struct HttpErrorHandler;

impl HttpErrorHandler {
    /// Map a token endpoint status to an error
    pub fn handle_auth_error(status: StatusCode, endpoint: &str) -> RegistryError {
        match status.as_u16() {
            401 => RegistryError::Unauthorized {
                endpoint: endpoint.to_string(),
            },
            _ => RegistryError::registry(
                endpoint,
                Some(status.as_u16()),
                "Error making token request",
            ),
        }
    }

    /// Map a tag list status to an error
    pub fn handle_tags_error(status: StatusCode, endpoint: &str) -> RegistryError {
        match status.as_u16() {
            401 => RegistryError::Unauthorized {
                endpoint: endpoint.to_string(),
            },
            429 => RegistryError::registry(endpoint, Some(429), "Rate limited while getting tags"),
            _ => RegistryError::registry(endpoint, Some(status.as_u16()), "Error getting tags"),
        }
    }

    /// Map a manifest status to an error; `image` names the reference being looked up
    pub fn handle_manifest_error(status: StatusCode, endpoint: &str, image: &str) -> RegistryError {
        match status.as_u16() {
            404 => RegistryError::ImageNotFound {
                image: image.to_string(),
            },
            401 => RegistryError::Unauthorized {
                endpoint: endpoint.to_string(),
            },
            429 => RegistryError::registry(endpoint, Some(429), format!("Rate limited while getting digest of {}", image)),
            code => RegistryError::registry(
                endpoint,
                Some(code),
                format!("Error getting digest of {}", image),
            ),
        }
    }
}

/// Network error categorization and handling
pub struct NetworkErrorHandler;

impl NetworkErrorHandler {
    /// Categorize a transport failure with the endpoint it happened on
    pub fn handle_network_error(error: &reqwest::Error, endpoint: &str) -> RegistryError {
        let endpoint = error
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| endpoint.to_string());

        let reason = if error.is_timeout() {
            format!("timeout: {}", Self::describe(error))
        } else if Self::is_tls_error(error) {
            format!("TLS negotiation failed: {}", Self::describe(error))
        } else if error.is_connect() {
            format!("connection error: {}", Self::describe(error))
        } else {
            Self::describe(error)
        };

        RegistryError::RegistryUnreachable { endpoint, reason }
    }

    /// Whether the failure happened while negotiating TLS rather than connecting or transferring
    pub fn is_tls_error(error: &reqwest::Error) -> bool {
        if error.is_timeout() {
            return false;
        }
        // The top-level message embeds the URL, so only the causes are inspected
        let mut current = error.source();
        while let Some(err) = current {
            let message = err.to_string().to_lowercase();
            if TLS_MARKERS.iter().any(|marker| message.contains(marker)) {
                return true;
            }
            current = err.source();
        }
        false
    }

    /// Flatten the source chain into one line
    fn describe(error: &reqwest::Error) -> String {
        let mut parts = vec![error.to_string()];
        let mut current = error.source();
        while let Some(err) = current {
            let text = err.to_string();
            if !parts.iter().any(|p| p.contains(&text)) {
                parts.push(text);
            }
            current = err.source();
        }
        parts.join(": ")
    }
}

const TLS_MARKERS: &[&str] = &[
    "tls",
    "ssl",
    "certificate",
    "handshake",
    "wrong version number",
    "corrupt message",
    "invalidcontenttype",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_statuses_map_to_taxonomy() {
        let endpoint = "https://r.example.com/v2/app/manifests/1.0";
        assert!(matches!(
            HttpErrorHandler::handle_manifest_error(StatusCode::NOT_FOUND, endpoint, "app:1.0"),
            RegistryError::ImageNotFound { .. }
        ));
        assert!(matches!(
            HttpErrorHandler::handle_manifest_error(StatusCode::UNAUTHORIZED, endpoint, "app:1.0"),
            RegistryError::Unauthorized { .. }
        ));
        let err = HttpErrorHandler::handle_manifest_error(StatusCode::BAD_GATEWAY, endpoint, "app:1.0");
        assert_eq!(err.status(), Some(502));
    }

    #[test]
    fn token_statuses_map_to_taxonomy() {
        let endpoint = "https://auth.example.com/token";
        assert!(HttpErrorHandler::handle_auth_error(StatusCode::UNAUTHORIZED, endpoint).is_unauthorized());
        assert_eq!(
            HttpErrorHandler::handle_auth_error(StatusCode::FORBIDDEN, endpoint).status(),
            Some(403)
        );
    }
}
