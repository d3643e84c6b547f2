//! Authentication module for Docker registry access
//!
//! Turns a probe challenge plus optional credentials into the `Authorization`
//! header used by every later call. Without a challenge the credentials are sent
//! directly; with one, a pull-scoped bearer token is fetched from the challenge's
//! realm following <https://distribution.github.io/distribution/spec/auth/token/>.

use crate::error::handlers::{HttpErrorHandler, NetworkErrorHandler};
use crate::error::{RegistryError, Result};
use crate::registry::credentials::Credentials;
use crate::registry::schema::AuthChallenge;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use std::fmt;
use tracing::debug;
use url::Url;

/// Value of the `Authorization` header sent on registry calls
#[derive(Clone, PartialEq, Eq)]
pub enum Authorization {
    Anonymous,
    /// Base64 `username:password`, or a pre-encoded auth string
    Basic(String),
    Bearer(String),
}

impl Authorization {
    pub fn header_value(&self) -> Option<String> {
        match self {
            Authorization::Anonymous => None,
            Authorization::Basic(encoded) => Some(format!("Basic {}", encoded)),
            Authorization::Bearer(token) => Some(format!("Bearer {}", token)),
        }
    }

    /// Attach the header to a request, if there is one
    pub fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self.header_value() {
            Some(value) => request.header(AUTHORIZATION, value),
            None => request,
        }
    }

    pub fn scheme_name(&self) -> &'static str {
        match self {
            Authorization::Anonymous => "anonymous",
            Authorization::Basic(_) => "basic",
            Authorization::Bearer(_) => "bearer",
        }
    }
}

impl fmt::Debug for Authorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Authorization::Anonymous => write!(f, "Anonymous"),
            Authorization::Basic(_) => write!(f, "Basic(<redacted>)"),
            Authorization::Bearer(_) => write!(f, "Bearer(<redacted>)"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
    expires_in: Option<u64>,
    // Tokens are not cached, so the issue time is unused
    #[allow(dead_code)]
    issued_at: Option<String>,
}

impl TokenResponse {
    fn into_token(self) -> Option<String> {
        self.token
            .filter(|t| !t.is_empty())
            .or(self.access_token.filter(|t| !t.is_empty()))
    }
}

#[derive(Debug, Clone)]
pub struct AuthNegotiator {
    client: Client,
}

impl AuthNegotiator {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Produce the authorization for pulling `repository`.
    pub async fn authorize(
        &self,
        challenge: Option<&AuthChallenge>,
        credentials: Option<&Credentials>,
        repository: &str,
    ) -> Result<Authorization> {
        match challenge {
            None => {
                let authorization = credentials
                    .map(Credentials::authorization)
                    .unwrap_or(Authorization::Anonymous);
                debug!(
                    "No auth challenge for {}, using {} authorization",
                    repository,
                    authorization.scheme_name()
                );
                Ok(authorization)
            }
            Some(challenge) => {
                let token = self.get_token(challenge, credentials, repository).await?;
                Ok(Authorization::Bearer(token))
            }
        }
    }

    async fn get_token(
        &self,
        challenge: &AuthChallenge,
        credentials: Option<&Credentials>,
        repository: &str,
    ) -> Result<String> {
        let url = token_url(challenge, repository)?;
        debug!("Requesting token from: {}", url);

        let mut request = self.client.get(url.clone());
        if let Some(credentials) = credentials {
            request = credentials.authorization().apply(request);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, url.as_str()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(HttpErrorHandler::handle_auth_error(status, url.as_str()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, url.as_str()))?;
        let token_response: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            RegistryError::registry(url.as_str(), Some(200), format!("Failed to parse token response: {}", e))
        })?;

        if let Some(expires_in) = token_response.expires_in {
            debug!("Token expires in {} seconds", expires_in);
        }

        token_response.into_token().ok_or_else(|| {
            RegistryError::registry(url.as_str(), Some(200), "Token response has no token field")
        })
    }
}

/// `{realm}?service={service}&scope=repository:{repository}:pull`
pub fn token_url(challenge: &AuthChallenge, repository: &str) -> Result<Url> {
    let mut url = Url::parse(&challenge.token_endpoint)?;
    url.query_pairs_mut()
        .append_pair("service", &challenge.service)
        .append_pair("scope", &format!("repository:{}:pull", repository));
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_values() {
        assert_eq!(Authorization::Anonymous.header_value(), None);
        assert_eq!(
            Authorization::Basic("abc".into()).header_value().as_deref(),
            Some("Basic abc")
        );
        assert_eq!(
            Authorization::Bearer("tok".into()).header_value().as_deref(),
            Some("Bearer tok")
        );
        assert_eq!(format!("{:?}", Authorization::Bearer("tok".into())), "Bearer(<redacted>)");
    }

    #[test]
    fn token_url_appends_service_and_scope() {
        let challenge = AuthChallenge {
            token_endpoint: "https://auth.docker.io/token".to_string(),
            service: "registry.docker.io".to_string(),
        };
        let url = token_url(&challenge, "cafapi/opensuse-jre17").unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("service".to_string(), "registry.docker.io".to_string()),
                ("scope".to_string(), "repository:cafapi/opensuse-jre17:pull".to_string()),
            ]
        );
    }

    #[test]
    fn token_url_rejects_relative_realm() {
        let challenge = AuthChallenge {
            token_endpoint: "/token".to_string(),
            service: "svc".to_string(),
        };
        assert!(matches!(token_url(&challenge, "app"), Err(RegistryError::Validation(_))));
    }

    #[test]
    fn token_field_falls_back_to_access_token() {
        let parsed: TokenResponse = serde_json::from_str(r#"{"access_token":"abc","expires_in":300}"#).unwrap();
        assert_eq!(parsed.into_token().as_deref(), Some("abc"));

        let parsed: TokenResponse = serde_json::from_str(r#"{"token":"t1","access_token":"t2"}"#).unwrap();
        assert_eq!(parsed.into_token().as_deref(), Some("t1"));

        let parsed: TokenResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(parsed.into_token().is_none());
    }
}
