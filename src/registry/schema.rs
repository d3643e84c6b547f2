//! Transport scheme detection and auth challenge extraction
//!
//! A registry is probed with `GET /v2/`. HTTPS is tried first; only a TLS
//! negotiation failure falls back to plain HTTP. A 401 answer carries the
//! `WWW-Authenticate` challenge that tells us where to fetch bearer tokens.

use crate::error::handlers::NetworkErrorHandler;
use crate::error::{RegistryError, Result};
use crate::image::reference::api_host;
use regex::Regex;
use reqwest::header::WWW_AUTHENTICATE;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;
use tracing::debug;

static CHALLENGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"Bearer realm="([^"]*)",\s*service="([^"]*)""#).expect("challenge pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Https,
    Http,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Https => "https",
            Scheme::Http => "http",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where to obtain a bearer token, from a `WWW-Authenticate` header
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthChallenge {
    pub token_endpoint: String,
    pub service: String,
}

/// Parse `Bearer realm="<url>",service="<name>"`; anything else yields no challenge.
pub fn parse_www_authenticate(header: &str) -> Option<AuthChallenge> {
    CHALLENGE_RE.captures(header).map(|caps| AuthChallenge {
        token_endpoint: caps[1].to_string(),
        service: caps[2].to_string(),
    })
}

/// Result of probing a registry host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryEndpoint {
    pub scheme: Scheme,
    pub host: String,
    pub challenge: Option<AuthChallenge>,
}

impl RegistryEndpoint {
    /// `{scheme}://{host}/v2`
    pub fn base_url(&self) -> String {
        format!("{}://{}/v2", self.scheme, self.host)
    }
}

#[derive(Debug, Clone)]
pub struct SchemaProbe {
    client: Client,
}

impl SchemaProbe {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Detect the scheme a registry answers on and its auth challenge, if any.
    pub async fn probe(&self, registry: &str) -> Result<RegistryEndpoint> {
        let host = api_host(registry).to_string();

        let https_url = format!("{}://{}/v2/", Scheme::Https, host);
        debug!("Probing registry at {}", https_url);

        match self.client.get(&https_url).send().await {
            Ok(response) => {
                let challenge = challenge_from(&response);
                debug!(
                    "Registry {} answered {} over https (challenge: {})",
                    host,
                    response.status(),
                    challenge.is_some()
                );
                Ok(RegistryEndpoint {
                    scheme: Scheme::Https,
                    host,
                    challenge,
                })
            }
            Err(e) if NetworkErrorHandler::is_tls_error(&e) => {
                debug!("TLS negotiation with {} failed, retrying over http: {}", host, e);
                self.probe_http(host).await
            }
            Err(e) => Err(NetworkErrorHandler::handle_network_error(&e, &https_url)),
        }
    }

    async fn probe_http(&self, host: String) -> Result<RegistryEndpoint> {
        let http_url = format!("{}://{}/v2/", Scheme::Http, host);
        let response = self
            .client
            .get(&http_url)
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, &http_url))?;

        match response.status() {
            StatusCode::OK => Ok(RegistryEndpoint {
                scheme: Scheme::Http,
                host,
                challenge: None,
            }),
            StatusCode::UNAUTHORIZED => Ok(RegistryEndpoint {
                scheme: Scheme::Http,
                challenge: challenge_from(&response),
                host,
            }),
            status => Err(RegistryError::RegistryUnreachable {
                endpoint: http_url,
                reason: format!("unexpected status {} over http", status.as_u16()),
            }),
        }
    }
}

fn challenge_from(response: &reqwest::Response) -> Option<AuthChallenge> {
    if response.status() != StatusCode::UNAUTHORIZED {
        return None;
    }
    response
        .headers()
        .get(WWW_AUTHENTICATE)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_www_authenticate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_docker_hub_challenge() {
        let header = r#"Bearer realm="https://auth.docker.io/token",service="registry.docker.io""#;
        let challenge = parse_www_authenticate(header).unwrap();
        assert_eq!(challenge.token_endpoint, "https://auth.docker.io/token");
        assert_eq!(challenge.service, "registry.docker.io");
    }

    #[test]
    fn parses_challenge_with_trailing_scope_and_spacing() {
        let header = r#"Bearer realm="https://ghcr.io/token", service="ghcr.io",scope="repository:o/r:pull""#;
        let challenge = parse_www_authenticate(header).unwrap();
        assert_eq!(challenge.token_endpoint, "https://ghcr.io/token");
        assert_eq!(challenge.service, "ghcr.io");
    }

    #[test]
    fn non_bearer_or_malformed_yields_no_challenge() {
        assert!(parse_www_authenticate(r#"Basic realm="Registry""#).is_none());
        assert!(parse_www_authenticate(r#"Bearer realm="https://auth.example.com/token""#).is_none());
        assert!(parse_www_authenticate("").is_none());
    }

    #[test]
    fn base_url_uses_scheme_and_host() {
        let endpoint = RegistryEndpoint {
            scheme: Scheme::Http,
            host: "localhost:5000".to_string(),
            challenge: None,
        };
        assert_eq!(endpoint.base_url(), "http://localhost:5000/v2");
    }
}
