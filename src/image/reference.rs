//! Image reference parsing
//!
//! Splits `[host[:port]/]path[:tag][@digest]` into its parts. A first path segment
//! is treated as a registry host only when it contains a `.` or a `:`, or is
//! `localhost`; otherwise the image lives on Docker Hub.

use crate::config::DEFAULT_FLOATING_TAG;
use crate::error::{RegistryError, Result};
use std::fmt;

pub const DEFAULT_REGISTRY: &str = "docker.io";
pub const DOCKER_HUB_API_HOST: &str = "registry-1.docker.io";

const DOCKER_HUB_ALIASES: &[&str] = &[
    "docker.io",
    "index.docker.io",
    "registry.hub.docker.com",
    DOCKER_HUB_API_HOST,
];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
    registry: String,
    repository: String,
    tag: Option<String>,
    digest: Option<String>,
}

impl ImageReference {
    /// Parse a reference that must carry a tag; a missing tag means `latest`.
    pub fn parse(reference: &str) -> Result<Self> {
        Self::parse_inner(reference, false)
    }

    /// Parse a reference that may be pinned by digest alone (`repo@sha256:...`).
    pub fn parse_allow_digest_only(reference: &str) -> Result<Self> {
        Self::parse_inner(reference, true)
    }

    /// Build from a repository (optionally host-qualified), a tag and an optional digest.
    pub fn from_parts(repository: &str, tag: &str, digest: Option<&str>) -> Result<Self> {
        if tag.trim().is_empty() {
            return Err(RegistryError::InvalidReference(format!(
                "Tag not specified for image {}",
                repository
            )));
        }
        let (registry, repository) = split_registry(repository.trim())?;
        Ok(Self {
            registry,
            repository,
            tag: Some(tag.trim().to_string()),
            digest: digest.map(str::trim).filter(|d| !d.is_empty()).map(str::to_string),
        })
    }

    fn parse_inner(reference: &str, allow_digest_only: bool) -> Result<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(RegistryError::InvalidReference("empty reference".to_string()));
        }

        let (name, digest) = match reference.rsplit_once('@') {
            Some((name, digest)) if !digest.is_empty() => (name, Some(digest.to_string())),
            Some(_) => {
                return Err(RegistryError::InvalidReference(format!(
                    "empty digest in {}",
                    reference
                )));
            }
            None => (reference, None),
        };

        // A ':' after the last '/' separates the tag; earlier ones belong to a host port
        let last_slash = name.rfind('/').map(|i| i + 1).unwrap_or(0);
        let (name, tag) = match name[last_slash..].rfind(':') {
            Some(idx) => {
                let split = last_slash + idx;
                let tag = &name[split + 1..];
                if tag.is_empty() {
                    return Err(RegistryError::InvalidReference(format!(
                        "empty tag in {}",
                        reference
                    )));
                }
                (&name[..split], Some(tag.to_string()))
            }
            None => (name, None),
        };

        let tag = match (tag, &digest) {
            (Some(tag), _) => Some(tag),
            (None, None) => Some(DEFAULT_FLOATING_TAG.to_string()),
            (None, Some(_)) if allow_digest_only => None,
            (None, Some(_)) => {
                return Err(RegistryError::InvalidReference(format!(
                    "Tag not specified for image {}",
                    reference
                )));
            }
        };

        let (registry, repository) = split_registry(name)?;

        Ok(Self {
            registry,
            repository,
            tag,
            digest,
        })
    }

    pub fn registry(&self) -> &str {
        &self.registry
    }

    /// Repository path without the registry host, e.g. `library/nginx`
    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    /// Host that serves the registry API; Docker Hub aliases map to its API host
    pub fn api_host(&self) -> &str {
        api_host(&self.registry)
    }

    pub fn is_docker_hub(&self) -> bool {
        is_docker_hub(&self.registry)
    }

    /// `registry/repository`
    pub fn full_name_without_tag(&self) -> String {
        format!("{}/{}", self.registry, self.repository)
    }

    /// `registry/repository:tag`, falling back to the digest when there is no tag
    pub fn full_name_with_tag(&self) -> String {
        match (&self.tag, &self.digest) {
            (Some(tag), _) => format!("{}:{}", self.full_name_without_tag(), tag),
            (None, Some(digest)) => format!("{}@{}", self.full_name_without_tag(), digest),
            (None, None) => self.full_name_without_tag(),
        }
    }

    /// Same repository with another tag and no digest
    pub fn with_tag(&self, tag: &str) -> Self {
        Self {
            registry: self.registry.clone(),
            repository: self.repository.clone(),
            tag: Some(tag.to_string()),
            digest: None,
        }
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.registry, self.repository)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{}", tag)?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for ImageReference {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

pub fn is_docker_hub(registry: &str) -> bool {
    let registry = registry.trim_end_matches('/');
    DOCKER_HUB_ALIASES
        .iter()
        .any(|alias| alias.eq_ignore_ascii_case(registry))
}

/// Registry API host for a registry name, without a trailing slash
pub fn api_host(registry: &str) -> &str {
    if is_docker_hub(registry) {
        DOCKER_HUB_API_HOST
    } else {
        registry.trim_end_matches('/')
    }
}

fn split_registry(name: &str) -> Result<(String, String)> {
    let (registry, repository) = match name.split_once('/') {
        Some((first, rest)) if is_host_segment(first) => (first.to_string(), rest.to_string()),
        Some(_) => (DEFAULT_REGISTRY.to_string(), name.to_string()),
        None => (DEFAULT_REGISTRY.to_string(), name.to_string()),
    };

    if repository.is_empty() {
        return Err(RegistryError::InvalidReference(format!(
            "Repository not specified for image: {}",
            name
        )));
    }
    if repository.split('/').any(str::is_empty) || repository.chars().any(char::is_whitespace) {
        return Err(RegistryError::InvalidReference(format!(
            "Invalid repository path: {}",
            repository
        )));
    }

    let repository = if is_docker_hub(&registry) && !repository.contains('/') {
        format!("library/{}", repository)
    } else {
        repository
    };

    Ok((registry, repository))
}

fn is_host_segment(segment: &str) -> bool {
    segment.contains('.') || segment.contains(':') || segment == "localhost"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let r = ImageReference::parse("nginx").unwrap();
        assert_eq!(r.registry(), "docker.io");
        assert_eq!(r.repository(), "library/nginx");
        assert_eq!(r.tag(), Some("latest"));
        assert_eq!(r.api_host(), "registry-1.docker.io");
    }

    #[test]
    fn test_parse_with_namespace_and_tag() {
        let r = ImageReference::parse("cafapi/opensuse-jre17:1.2.3").unwrap();
        assert_eq!(r.registry(), "docker.io");
        assert_eq!(r.repository(), "cafapi/opensuse-jre17");
        assert_eq!(r.tag(), Some("1.2.3"));
    }

    #[test]
    fn test_parse_custom_registry_with_port() {
        let r = ImageReference::parse("localhost:5000/app/foo:v1").unwrap();
        assert_eq!(r.registry(), "localhost:5000");
        assert_eq!(r.repository(), "app/foo");
        assert_eq!(r.tag(), Some("v1"));
        assert_eq!(r.api_host(), "localhost:5000");

        let r = ImageReference::parse("localhost/app").unwrap();
        assert_eq!(r.registry(), "localhost");
        assert_eq!(r.repository(), "app");
    }

    #[test]
    fn test_parse_port_without_tag() {
        let r = ImageReference::parse("registry.example.com:8443/team/app").unwrap();
        assert_eq!(r.registry(), "registry.example.com:8443");
        assert_eq!(r.repository(), "team/app");
        assert_eq!(r.tag(), Some("latest"));
    }

    #[test]
    fn test_parse_digest() {
        let digest = "sha256:0123456789abcdef";
        let r = ImageReference::parse(&format!("ghcr.io/owner/repo:1.0@{}", digest)).unwrap();
        assert_eq!(r.tag(), Some("1.0"));
        assert_eq!(r.digest(), Some(digest));

        assert!(ImageReference::parse(&format!("ghcr.io/owner/repo@{}", digest)).is_err());

        let r = ImageReference::parse_allow_digest_only(&format!("ghcr.io/owner/repo@{}", digest)).unwrap();
        assert_eq!(r.tag(), None);
        assert_eq!(r.full_name_with_tag(), format!("ghcr.io/owner/repo@{}", digest));
    }

    #[test]
    fn test_docker_hub_aliases() {
        for host in ["docker.io", "index.docker.io", "registry.hub.docker.com"] {
            let r = ImageReference::parse(&format!("{}/library/busybox:1", host)).unwrap();
            assert!(r.is_docker_hub());
            assert_eq!(r.api_host(), DOCKER_HUB_API_HOST);
        }
        assert_eq!(api_host("registry.example.com/"), "registry.example.com");
    }

    #[test]
    fn test_from_parts() {
        let r = ImageReference::from_parts("registry.example.com/app/foo", "1.0", Some("")).unwrap();
        assert_eq!(r.registry(), "registry.example.com");
        assert_eq!(r.repository(), "app/foo");
        assert_eq!(r.digest(), None);
        assert_eq!(r.full_name_with_tag(), "registry.example.com/app/foo:1.0");

        assert!(ImageReference::from_parts("registry.example.com/app/foo", " ", None).is_err());
        assert!(ImageReference::from_parts("registry.example.com/", "1.0", None).is_err());
    }

    #[test]
    fn test_invalid_references() {
        assert!(ImageReference::parse("").is_err());
        assert!(ImageReference::parse("app:").is_err());
        assert!(ImageReference::parse("registry.example.com//app").is_err());
        assert!(ImageReference::parse("app@").is_err());
    }

    #[test]
    fn test_display_round_trip() {
        let r = ImageReference::parse("ghcr.io/owner/repo:2.0").unwrap();
        assert_eq!(r.to_string(), "ghcr.io/owner/repo:2.0");
        assert_eq!(r.with_tag("2.0.1").to_string(), "ghcr.io/owner/repo:2.0.1");
    }
}
