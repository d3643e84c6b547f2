//! Static tag resolution
//!
//! Finds the immutable tag that currently points at the same manifest as a
//! floating tag. Every relevant tag is digested (bounded concurrency, results in
//! list order) and the longest tag sharing the floating tag's digest wins.

pub mod ignore;
pub mod updater;

use crate::common::traits::RepositoryApi;
use crate::config::ResolverConfig;
use crate::error::Result;
use crate::registry::operations::DigestRecord;
use futures::stream::{self, StreamExt};
use ignore::IgnoreRules;
use serde::Serialize;
use std::pin::pin;
use tracing::{debug, info};

pub use ignore::{IgnoreRule, MatchType};
pub use updater::{ImageConfiguration, ImageUpdate, ImagesFile, ReleaseUpdater, UpdatePlan};

const PROGRESS_INTERVAL: usize = 100;

/// Outcome of resolving a floating tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticTagResolution {
    pub repository: String,
    pub floating_tag: String,
    pub floating_digest: String,
    pub static_tag: String,
    /// Whether `static_tag` differs from the tag that was configured
    pub changed: bool,
    /// Tags sharing the floating digest, shortest first
    pub candidates: Vec<DigestRecord>,
    pub ignored: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct LatestVersionResolver {
    config: ResolverConfig,
}

impl LatestVersionResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve which tag of `api`'s repository is the same image as `floating_tag`.
    ///
    /// `current_tag` is returned unchanged when nothing better is found. Only a
    /// candidate whose manifest has disappeared is skipped; any other failure aborts.
    pub async fn resolve_static_tag<A>(
        &self,
        api: &A,
        floating_tag: &str,
        current_tag: &str,
        ignore_rules: &IgnoreRules,
    ) -> Result<StaticTagResolution>
    where
        A: RepositoryApi + ?Sized,
    {
        let repository = api.repository().to_string();

        let floating_digest = api
            .get_digest(floating_tag)
            .await
            .map_err(|e| e.during("get digest", &repository, floating_tag))?;
        debug!("Got digest for {}:{} -- {}", repository, floating_tag, floating_digest);

        info!("Getting latest static tag for {}:{}...", repository, floating_tag);
        let all_tags = api
            .list_tags()
            .await
            .map_err(|e| e.during("list tags", &repository, floating_tag))?;

        let mut resolution = StaticTagResolution {
            repository: repository.clone(),
            floating_tag: floating_tag.to_string(),
            floating_digest,
            static_tag: current_tag.to_string(),
            changed: false,
            candidates: Vec::new(),
            ignored: Vec::new(),
        };

        if all_tags.is_empty() {
            debug!("No tags listed for {}, keeping {}", repository, current_tag);
            return Ok(resolution);
        }

        let (relevant, ignored) = ignore_rules.partition(all_tags, floating_tag, api.registry(), &repository);
        debug!(
            "{} relevant and {} ignored tags for {}",
            relevant.len(),
            ignored.len(),
            repository
        );
        resolution.ignored = ignored;

        let mut candidates = self
            .matching_tags(api, &repository, &relevant, &resolution.floating_digest)
            .await?;
        candidates.sort_by_key(|record| record.tag.len());

        let tags: Vec<&str> = candidates.iter().map(|c| c.tag.as_str()).collect();
        let static_tag = select_static_tag(&tags, floating_tag, current_tag).to_string();
        debug!("Static tag for {}:{} : {}", repository, floating_tag, static_tag);

        resolution.changed = static_tag != current_tag;
        resolution.static_tag = static_tag;
        resolution.candidates = candidates;
        Ok(resolution)
    }

    /// Digest every tag and keep those whose digest equals `target`, in list order.
    async fn matching_tags<A>(
        &self,
        api: &A,
        repository: &str,
        tags: &[String],
        target: &str,
    ) -> Result<Vec<DigestRecord>>
    where
        A: RepositoryApi + ?Sized,
    {
        let total = tags.len();
        let mut lookups = pin!(
            stream::iter(tags)
                .map(move |tag| async move { (tag, api.get_digest(tag).await) })
                .buffered(self.config.max_concurrent_lookups.max(1))
        );

        let mut matches = Vec::new();
        let mut processed = 0usize;

        while let Some((tag, result)) = lookups.next().await {
            match result {
                Ok(digest) => {
                    debug!("Match digest of tag {} : {} against {}", tag, digest, target);
                    if digest == target {
                        matches.push(DigestRecord {
                            tag: tag.clone(),
                            digest,
                        });
                    }
                }
                Err(e) if e.is_not_found() => {
                    debug!("Cannot find image digest for {}:{}: {}", repository, tag, e);
                }
                Err(e) => return Err(e.during("get digest", repository, tag)),
            }

            processed += 1;
            if processed % PROGRESS_INTERVAL == 0 || processed == total {
                info!("Processed {} of {} tags", processed, total);
            }
        }

        Ok(matches)
    }
}

/// Pick the static tag from candidates sorted shortest first.
///
/// No candidate keeps `current_tag`; a single candidate wins outright; otherwise
/// the longest wins unless it is the floating tag itself, in which case the
/// next longest does.
pub fn select_static_tag<'a>(candidates: &[&'a str], floating_tag: &str, current_tag: &'a str) -> &'a str {
    match candidates {
        [] => current_tag,
        [only] => *only,
        [.., second, longest] if longest.eq_ignore_ascii_case(floating_tag) => *second,
        [.., longest] => *longest,
    }
}
