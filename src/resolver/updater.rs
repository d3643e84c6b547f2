//! Pinning configured images to their latest releases
//!
//! For each configured image the floating tag is resolved to a static tag. The
//! configuration is then updated to that tag and the floating digest, or only
//! its digest is refreshed when the tag is already current.

use crate::common::traits::{RepositoryApi, RepositoryConnector};
use crate::config::DEFAULT_FLOATING_TAG;
use crate::error::{RegistryError, Result};
use crate::image::reference::ImageReference;
use crate::resolver::ignore::{IgnoreRule, IgnoreRules};
use crate::resolver::LatestVersionResolver;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

const SNAPSHOT_SUFFIX: &str = "-SNAPSHOT";

/// One image as configured by the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageConfiguration {
    /// Repository, optionally prefixed with its registry host
    pub repository: String,
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    /// Floating tag to follow instead of `latest`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_tag: Option<String>,
}

/// Images file: the images to keep pinned plus the tags never to pin to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagesFile {
    #[serde(default)]
    pub images: Vec<ImageConfiguration>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignore_versions: Vec<IgnoreRule>,
}

impl ImagesFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let file: ImagesFile = serde_json::from_str(content)?;
        for image in &file.images {
            if image.repository.trim().is_empty() {
                return Err(RegistryError::Validation(
                    "image repository cannot be empty".to_string(),
                ));
            }
        }
        Ok(file)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut content = serde_json::to_string_pretty(self)?;
        content.push('\n');
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Write the new tags and digests of `plan` into the images it was planned from.
    ///
    /// Updates are paired with images by position, so one repository may be
    /// listed several times with different floating tags.
    pub fn apply(&mut self, plan: &UpdatePlan) -> usize {
        let mut applied = 0;
        for (image, update) in self.images.iter_mut().zip(&plan.updates) {
            if image.repository != update.repository() {
                debug!("Plan entry for {} does not match image {}", update.repository(), image.repository);
                continue;
            }
            match update {
                ImageUpdate::TagUpdated { tag, digest, .. } => {
                    image.tag = tag.clone();
                    image.digest = Some(digest.clone());
                    applied += 1;
                }
                ImageUpdate::DigestUpdated { digest, .. } => {
                    image.digest = Some(digest.clone());
                    applied += 1;
                }
                ImageUpdate::Skipped { .. } | ImageUpdate::UpToDate { .. } => {}
            }
        }
        applied
    }
}

/// What should happen to one configured image
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ImageUpdate {
    /// Dynamic tags (`latest`, snapshots) are never pinned
    #[serde(rename_all = "camelCase")]
    Skipped { repository: String, tag: String },
    #[serde(rename_all = "camelCase")]
    UpToDate {
        repository: String,
        tag: String,
        digest: String,
    },
    #[serde(rename_all = "camelCase")]
    DigestUpdated {
        repository: String,
        tag: String,
        previous_digest: Option<String>,
        digest: String,
    },
    #[serde(rename_all = "camelCase")]
    TagUpdated {
        repository: String,
        previous_tag: String,
        tag: String,
        digest: String,
    },
}

impl ImageUpdate {
    pub fn repository(&self) -> &str {
        match self {
            ImageUpdate::Skipped { repository, .. }
            | ImageUpdate::UpToDate { repository, .. }
            | ImageUpdate::DigestUpdated { repository, .. }
            | ImageUpdate::TagUpdated { repository, .. } => repository,
        }
    }

    pub fn is_change(&self) -> bool {
        matches!(self, ImageUpdate::DigestUpdated { .. } | ImageUpdate::TagUpdated { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdatePlan {
    pub updates: Vec<ImageUpdate>,
}

impl UpdatePlan {
    pub fn changes(&self) -> impl Iterator<Item = &ImageUpdate> {
        self.updates.iter().filter(|u| u.is_change())
    }

    pub fn has_changes(&self) -> bool {
        self.changes().next().is_some()
    }
}

pub struct ReleaseUpdater<C> {
    connector: C,
    resolver: LatestVersionResolver,
    ignore_rules: IgnoreRules,
}

impl<C> ReleaseUpdater<C>
where
    C: RepositoryConnector,
{
    pub fn new(connector: C, resolver: LatestVersionResolver, ignore_rules: IgnoreRules) -> Self {
        Self {
            connector,
            resolver,
            ignore_rules,
        }
    }

    /// Build the plan for every image, stopping at the first failure.
    pub async fn plan(&self, images: &[ImageConfiguration]) -> Result<UpdatePlan> {
        let mut plan = UpdatePlan::default();
        for image in images {
            plan.updates.push(self.update_image(image).await?);
        }
        Ok(plan)
    }

    pub async fn update_image(&self, image: &ImageConfiguration) -> Result<ImageUpdate> {
        let tag = image.tag.trim();
        if tag == DEFAULT_FLOATING_TAG || tag.ends_with(SNAPSHOT_SUFFIX) {
            debug!("Skipping dynamic tag {}:{}", image.repository, tag);
            return Ok(ImageUpdate::Skipped {
                repository: image.repository.clone(),
                tag: tag.to_string(),
            });
        }

        let floating_tag = image
            .latest_tag
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(self.resolver.config().floating_tag.as_str());

        let reference = ImageReference::from_parts(&image.repository, tag, image.digest.as_deref())?;
        let session = self.connector.connect(&reference).await?;

        let resolution = self
            .resolver
            .resolve_static_tag(&session, floating_tag, tag, &self.ignore_rules)
            .await?;

        if resolution.static_tag != tag {
            info!(
                "{} moves from {} to {}",
                reference.full_name_without_tag(),
                tag,
                resolution.static_tag
            );
            return Ok(ImageUpdate::TagUpdated {
                repository: image.repository.clone(),
                previous_tag: tag.to_string(),
                tag: resolution.static_tag,
                digest: resolution.floating_digest,
            });
        }

        info!("Already references the latest image: {}", reference.full_name_with_tag());
        let static_digest = session
            .get_digest(tag)
            .await
            .map_err(|e| e.during("get digest", reference.repository(), tag))?;

        if static_digest != resolution.floating_digest {
            return Err(RegistryError::IncorrectDigest {
                image: reference.full_name_with_tag(),
                expected: resolution.floating_digest,
                actual: static_digest,
            });
        }

        match reference.digest() {
            Some(current) if current == static_digest => {
                debug!("Image config updates not required: {}", reference.full_name_with_tag());
                Ok(ImageUpdate::UpToDate {
                    repository: image.repository.clone(),
                    tag: tag.to_string(),
                    digest: static_digest,
                })
            }
            previous => Ok(ImageUpdate::DigestUpdated {
                repository: image.repository.clone(),
                tag: tag.to_string(),
                previous_digest: previous.map(str::to_string),
                digest: static_digest,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn images_file_parses_and_validates() {
        let file = ImagesFile::from_json(
            r#"{
                "images": [
                    {"repository": "cafapi/opensuse-jre17", "tag": "1.2.3", "digest": "sha256:aa"},
                    {"repository": "registry.example.com/app/foo", "tag": "latest", "latestTag": "stable"}
                ],
                "ignoreVersions": [{"version": ".*-rc\\d+", "type": "regex"}]
            }"#,
        )
        .unwrap();
        assert_eq!(file.images.len(), 2);
        assert_eq!(file.images[1].latest_tag.as_deref(), Some("stable"));
        assert_eq!(file.ignore_versions.len(), 1);

        assert!(ImagesFile::from_json(r#"{"images": [{"repository": " ", "tag": "1"}]}"#).is_err());
        assert!(ImagesFile::from_json("not json").is_err());
    }

    #[test]
    fn apply_writes_tag_and_digest_changes() {
        let mut file = ImagesFile {
            images: vec![
                ImageConfiguration {
                    repository: "app/foo".to_string(),
                    tag: "1.0".to_string(),
                    digest: None,
                    latest_tag: None,
                },
                ImageConfiguration {
                    repository: "app/bar".to_string(),
                    tag: "2.0".to_string(),
                    digest: Some("sha256:old".to_string()),
                    latest_tag: None,
                },
            ],
            ignore_versions: Vec::new(),
        };
        let plan = UpdatePlan {
            updates: vec![
                ImageUpdate::TagUpdated {
                    repository: "app/foo".to_string(),
                    previous_tag: "1.0".to_string(),
                    tag: "1.1".to_string(),
                    digest: "sha256:new".to_string(),
                },
                ImageUpdate::UpToDate {
                    repository: "app/bar".to_string(),
                    tag: "2.0".to_string(),
                    digest: "sha256:old".to_string(),
                },
            ],
        };

        assert!(plan.has_changes());
        assert_eq!(file.apply(&plan), 1);
        assert_eq!(file.images[0].tag, "1.1");
        assert_eq!(file.images[0].digest.as_deref(), Some("sha256:new"));
        assert_eq!(file.images[1].digest.as_deref(), Some("sha256:old"));
    }

    #[test]
    fn apply_keeps_repeated_repositories_apart() {
        let mut file = ImagesFile {
            images: vec![
                ImageConfiguration {
                    repository: "app/foo".to_string(),
                    tag: "1.0".to_string(),
                    digest: None,
                    latest_tag: None,
                },
                ImageConfiguration {
                    repository: "app/foo".to_string(),
                    tag: "0.9-lts".to_string(),
                    digest: None,
                    latest_tag: Some("lts".to_string()),
                },
            ],
            ignore_versions: Vec::new(),
        };
        let plan = UpdatePlan {
            updates: vec![
                ImageUpdate::TagUpdated {
                    repository: "app/foo".to_string(),
                    previous_tag: "1.0".to_string(),
                    tag: "1.1".to_string(),
                    digest: "sha256:a".to_string(),
                },
                ImageUpdate::TagUpdated {
                    repository: "app/foo".to_string(),
                    previous_tag: "0.9-lts".to_string(),
                    tag: "0.9.5-lts".to_string(),
                    digest: "sha256:b".to_string(),
                },
            ],
        };

        assert_eq!(file.apply(&plan), 2);
        assert_eq!(file.images[0].tag, "1.1");
        assert_eq!(file.images[0].digest.as_deref(), Some("sha256:a"));
        assert_eq!(file.images[1].tag, "0.9.5-lts");
        assert_eq!(file.images[1].digest.as_deref(), Some("sha256:b"));
        assert_eq!(file.images[1].latest_tag.as_deref(), Some("lts"));
    }

    #[test]
    fn update_serializes_with_status() {
        let update = ImageUpdate::DigestUpdated {
            repository: "app/foo".to_string(),
            tag: "1.0".to_string(),
            previous_digest: None,
            digest: "sha256:aa".to_string(),
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["status"], "digestUpdated");
        assert_eq!(json["previousDigest"], serde_json::Value::Null);
    }
}
