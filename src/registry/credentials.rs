//! Registry credentials and the providers that supply them
//!
//! The resolver only ever sees a resolved [`Credentials`] value. Where those come
//! from (flags, environment, anything else) sits behind [`CredentialsProvider`].

use crate::error::Result;
use crate::image::reference::is_docker_hub;
use crate::registry::auth::Authorization;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub const ENV_USERNAME: &str = "TAG_PINNER_USERNAME";
pub const ENV_PASSWORD: &str = "TAG_PINNER_PASSWORD";
pub const ENV_IDENTITY_TOKEN: &str = "TAG_PINNER_IDENTITY_TOKEN";
pub const ENV_AUTH: &str = "TAG_PINNER_AUTH";

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
    pub identity_token: Option<String>,
    /// Already base64-encoded `username:password`
    pub auth: Option<String>,
}

impl Credentials {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
            ..Default::default()
        }
    }

    pub fn identity_token(token: impl Into<String>) -> Self {
        Self {
            identity_token: Some(token.into()),
            ..Default::default()
        }
    }

    pub fn pre_encoded(auth: impl Into<String>) -> Self {
        Self {
            auth: Some(auth.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        [&self.username, &self.password, &self.identity_token, &self.auth]
            .iter()
            .all(|v| v.as_deref().is_none_or(str::is_empty))
    }

    /// Authorization derived from these credentials alone.
    ///
    /// Identity token (bearer) wins over a pre-encoded auth string, which wins over
    /// username/password; an absent half of the pair is sent as an empty string.
    pub fn authorization(&self) -> Authorization {
        if let Some(token) = non_empty(&self.identity_token) {
            return Authorization::Bearer(token.to_string());
        }
        if let Some(auth) = non_empty(&self.auth) {
            return Authorization::Basic(auth.to_string());
        }
        if self.username.is_some() || self.password.is_some() {
            let pair = format!(
                "{}:{}",
                self.username.as_deref().unwrap_or(""),
                self.password.as_deref().unwrap_or("")
            );
            return Authorization::Basic(STANDARD.encode(pair.as_bytes()));
        }
        Authorization::Anonymous
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("identity_token", &redact(&self.identity_token))
            .field("auth", &redact(&self.auth))
            .finish()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Supplies credentials for a registry host, or `None` for anonymous access
#[async_trait]
pub trait CredentialsProvider: Send + Sync {
    async fn credentials_for(&self, registry: &str) -> Result<Option<Credentials>>;
}

/// Fixed credentials, optionally keyed by registry host
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialsProvider {
    default: Option<Credentials>,
    per_registry: HashMap<String, Credentials>,
}

impl StaticCredentialsProvider {
    pub fn new(default: Option<Credentials>) -> Self {
        Self {
            default: default.filter(|c| !c.is_empty()),
            per_registry: HashMap::new(),
        }
    }

    pub fn with_registry(mut self, registry: &str, credentials: Credentials) -> Self {
        self.per_registry.insert(registry_key(registry), credentials);
        self
    }
}

#[async_trait]
impl CredentialsProvider for StaticCredentialsProvider {
    async fn credentials_for(&self, registry: &str) -> Result<Option<Credentials>> {
        Ok(self
            .per_registry
            .get(&registry_key(registry))
            .or(self.default.as_ref())
            .cloned())
    }
}

/// Credentials from `TAG_PINNER_*` environment variables
#[derive(Debug, Clone, Default)]
pub struct EnvCredentialsProvider;

impl EnvCredentialsProvider {
    fn read<F>(lookup: F) -> Option<Credentials>
    where
        F: Fn(&str) -> Option<String>,
    {
        let credentials = Credentials {
            username: lookup(ENV_USERNAME),
            password: lookup(ENV_PASSWORD),
            identity_token: lookup(ENV_IDENTITY_TOKEN),
            auth: lookup(ENV_AUTH),
        };
        (!credentials.is_empty()).then_some(credentials)
    }
}

#[async_trait]
impl CredentialsProvider for EnvCredentialsProvider {
    async fn credentials_for(&self, _registry: &str) -> Result<Option<Credentials>> {
        Ok(Self::read(|key| std::env::var(key).ok()))
    }
}

/// Asks each provider in order and returns the first credentials found
#[derive(Clone, Default)]
pub struct ChainedCredentialsProvider {
    providers: Vec<Arc<dyn CredentialsProvider>>,
}

impl ChainedCredentialsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: Arc<dyn CredentialsProvider>) -> Self {
        self.providers.push(provider);
        self
    }
}

#[async_trait]
impl CredentialsProvider for ChainedCredentialsProvider {
    async fn credentials_for(&self, registry: &str) -> Result<Option<Credentials>> {
        for provider in &self.providers {
            if let Some(credentials) = provider.credentials_for(registry).await? {
                return Ok(Some(credentials));
            }
        }
        tracing::debug!("Credentials not found for {}", registry);
        Ok(None)
    }
}

// All Docker Hub aliases share one credential entry
fn registry_key(registry: &str) -> String {
    if is_docker_hub(registry) {
        "docker.io".to_string()
    } else {
        registry.trim_end_matches('/').to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorization_priority() {
        let all = Credentials {
            username: Some("user".into()),
            password: Some("pass".into()),
            identity_token: Some("idtoken".into()),
            auth: Some("cHJlOmVuYw==".into()),
        };
        assert_eq!(all.authorization(), Authorization::Bearer("idtoken".into()));

        let pre = Credentials {
            identity_token: None,
            ..all.clone()
        };
        assert_eq!(pre.authorization(), Authorization::Basic("cHJlOmVuYw==".into()));

        let pair = Credentials::basic("user", "pass");
        assert_eq!(pair.authorization(), Authorization::Basic("dXNlcjpwYXNz".into()));

        let user_only = Credentials {
            username: Some("user".into()),
            ..Default::default()
        };
        assert_eq!(user_only.authorization(), Authorization::Basic(STANDARD.encode("user:")));

        assert_eq!(Credentials::default().authorization(), Authorization::Anonymous);
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let text = format!("{:?}", Credentials::basic("user", "s3cret"));
        assert!(text.contains("user"));
        assert!(!text.contains("s3cret"));
    }

    #[test]
    fn env_provider_ignores_blank_values() {
        assert!(EnvCredentialsProvider::read(|_| None).is_none());
        assert!(EnvCredentialsProvider::read(|_| Some(String::new())).is_none());

        let creds = EnvCredentialsProvider::read(|k| (k == ENV_IDENTITY_TOKEN).then(|| "tok".to_string()));
        assert_eq!(creds, Some(Credentials::identity_token("tok")));
    }

    #[tokio::test]
    async fn static_provider_prefers_registry_specific_entry() {
        let provider = StaticCredentialsProvider::new(Some(Credentials::basic("default", "pw")))
            .with_registry("index.docker.io", Credentials::basic("hub", "pw"))
            .with_registry("Registry.Example.com/", Credentials::basic("corp", "pw"));

        let hub = provider.credentials_for("docker.io").await.unwrap().unwrap();
        assert_eq!(hub.username.as_deref(), Some("hub"));
        let corp = provider.credentials_for("registry.example.com").await.unwrap().unwrap();
        assert_eq!(corp.username.as_deref(), Some("corp"));
        let other = provider.credentials_for("ghcr.io").await.unwrap().unwrap();
        assert_eq!(other.username.as_deref(), Some("default"));
    }

    #[tokio::test]
    async fn chained_provider_returns_first_match() {
        let chain = ChainedCredentialsProvider::new()
            .with(Arc::new(StaticCredentialsProvider::new(None)))
            .with(Arc::new(StaticCredentialsProvider::new(Some(Credentials::pre_encoded("abc")))));

        let creds = chain.credentials_for("ghcr.io").await.unwrap();
        assert_eq!(creds, Some(Credentials::pre_encoded("abc")));

        let empty = ChainedCredentialsProvider::new();
        assert!(empty.credentials_for("ghcr.io").await.unwrap().is_none());
    }
}
