//! Runner for the command-line workflows

use crate::cli::args::{Args, Command, OutputFormat};
use crate::common::traits::RepositoryApi;
use crate::config::AppConfig;
use crate::error::Result;
use crate::image::reference::ImageReference;
use crate::logging::Logger;
use crate::registry::credentials::{
    ChainedCredentialsProvider, EnvCredentialsProvider, StaticCredentialsProvider,
};
use crate::registry::{RegistryClient, RegistryClientBuilder};
use crate::resolver::ignore::{IgnoreRule, IgnoreRules};
use crate::resolver::{
    ImageUpdate, ImagesFile, LatestVersionResolver, ReleaseUpdater, StaticTagResolution, UpdatePlan,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

pub struct Runner {
    args: Args,
    config: AppConfig,
    output: Logger,
}

impl Runner {
    pub fn new(args: Args) -> Result<Self> {
        args.validate()?;
        let config = args.app_config()?;

        // Structured output must be the only thing on stdout
        let output = match args.output {
            OutputFormat::Json => Logger::new_quiet(),
            OutputFormat::Text => Logger::new(args.verbose),
        };

        Ok(Self {
            args,
            config,
            output,
        })
    }

    pub async fn run(&self) -> Result<()> {
        let client = self.create_registry_client()?;

        match &self.args.command {
            Command::Resolve {
                image,
                latest_tag,
                ignore,
                ignore_regex,
            } => {
                self.resolve(&client, image, latest_tag.as_deref(), ignore, ignore_regex)
                    .await?
            }
            Command::Tags { image } => self.list_tags(&client, image).await?,
            Command::Digest { image } => self.digest(&client, image).await?,
            Command::Update { config, write } => self.update(client, config, *write).await?,
        }

        self.output.success(&format!(
            "Completed in {}",
            self.output.format_duration(self.output.elapsed())
        ));
        Ok(())
    }

    fn create_registry_client(&self) -> Result<RegistryClient> {
        let credentials = ChainedCredentialsProvider::new()
            .with(Arc::new(StaticCredentialsProvider::new(self.args.credentials())))
            .with(Arc::new(EnvCredentialsProvider));

        RegistryClientBuilder::new()
            .with_http_config(self.config.http.clone())
            .with_page_size(self.config.resolver.page_size)
            .with_credentials(Arc::new(credentials))
            .build()
    }

    async fn resolve(
        &self,
        client: &RegistryClient,
        image: &str,
        latest_tag: Option<&str>,
        ignore: &[String],
        ignore_regex: &[String],
    ) -> Result<()> {
        let reference = ImageReference::parse(image)?;
        let floating_tag = latest_tag.unwrap_or(self.config.resolver.floating_tag.as_str());
        let current_tag = reference.tag().unwrap_or(floating_tag);

        let rules: Vec<IgnoreRule> = ignore
            .iter()
            .map(IgnoreRule::exact)
            .chain(ignore_regex.iter().map(IgnoreRule::regex))
            .collect();
        let rules = IgnoreRules::compile(&rules)?;

        self.output.section("Resolve static tag");
        self.output.info(&format!(
            "Resolving {}:{}",
            reference.full_name_without_tag(),
            floating_tag
        ));

        let session = client.connect(&reference).await?;
        self.output.detail(&format!("Registry API: {}", session.endpoint().base_url()));
        let resolver = LatestVersionResolver::new(self.config.resolver.clone());
        let resolution = resolver
            .resolve_static_tag(&session, floating_tag, current_tag, &rules)
            .await?;

        match self.args.output {
            OutputFormat::Json => print_json(&resolution),
            OutputFormat::Text => {
                self.print_resolution(&reference, &resolution);
                Ok(())
            }
        }
    }

    fn print_resolution(&self, reference: &ImageReference, resolution: &StaticTagResolution) {
        let candidates: Vec<String> = resolution.candidates.iter().map(|c| c.tag.clone()).collect();
        self.output.detail(&format!("Ignored tags: {}", resolution.ignored.join(", ")));
        self.output.list("Tags sharing the floating digest", &candidates);
        self.output.summary_kv(
            "Resolution",
            &[
                ("Image", reference.full_name_without_tag()),
                ("Floating tag", resolution.floating_tag.clone()),
                ("Digest", resolution.floating_digest.clone()),
                ("Static tag", resolution.static_tag.clone()),
                ("Changed", resolution.changed.to_string()),
            ],
        );
        if self.output.quiet {
            return;
        }
        println!(
            "{}:{}@{}",
            reference.full_name_without_tag(),
            resolution.static_tag,
            resolution.floating_digest
        );
    }

    async fn list_tags(&self, client: &RegistryClient, image: &str) -> Result<()> {
        let reference = ImageReference::parse(image)?;
        let session = client.connect(&reference).await?;
        self.output.detail(&format!("Registry API: {}", session.endpoint().base_url()));
        let tags = session.list_tags().await?;

        match self.args.output {
            OutputFormat::Json => print_json(&tags),
            OutputFormat::Text => {
                self.output.section(&format!("Tags of {}", reference.full_name_without_tag()));
                for tag in &tags {
                    println!("{}", tag);
                }
                self.output.info(&format!("{} tags", tags.len()));
                Ok(())
            }
        }
    }

    async fn digest(&self, client: &RegistryClient, image: &str) -> Result<()> {
        let reference = ImageReference::parse(image)?;
        let tag = reference.tag().unwrap_or(self.config.resolver.floating_tag.as_str());
        let session = client.connect(&reference).await?;
        let digest = session
            .get_digest(tag)
            .await
            .map_err(|e| e.during("get digest", reference.repository(), tag))?;

        match self.args.output {
            OutputFormat::Json => print_json(&serde_json::json!({
                "image": reference.full_name_with_tag(),
                "digest": digest,
            })),
            OutputFormat::Text => {
                if !self.output.quiet {
                    println!("{}", digest);
                }
                Ok(())
            }
        }
    }

    async fn update(&self, client: RegistryClient, path: &Path, write: bool) -> Result<()> {
        let mut images_file = ImagesFile::load(path)?;
        let rules = IgnoreRules::compile(&images_file.ignore_versions)?;

        self.output.section("Use latest releases");
        self.output.info(&format!(
            "{} images, {} ignore rules from {}",
            images_file.images.len(),
            rules.len(),
            path.display()
        ));

        let updater = ReleaseUpdater::new(
            client,
            LatestVersionResolver::new(self.config.resolver.clone()),
            rules,
        );
        let plan = updater.plan(&images_file.images).await?;

        match self.args.output {
            OutputFormat::Json => print_json(&plan)?,
            OutputFormat::Text => self.print_plan(&plan),
        }

        if write && plan.has_changes() {
            let applied = images_file.apply(&plan);
            images_file.save(path)?;
            self.output.success(&format!("Updated {} images in {}", applied, path.display()));
        } else if !plan.has_changes() {
            self.output.info("Image configuration updates not required");
        }
        Ok(())
    }

    fn print_plan(&self, plan: &UpdatePlan) {
        for update in &plan.updates {
            match update {
                ImageUpdate::Skipped { repository, tag } => {
                    self.output.detail(&format!("{}:{} skipped (dynamic tag)", repository, tag))
                }
                ImageUpdate::UpToDate { repository, tag, .. } => {
                    self.output.info(&format!("{}:{} is up to date", repository, tag))
                }
                ImageUpdate::DigestUpdated {
                    repository,
                    tag,
                    digest,
                    ..
                } => self
                    .output
                    .warning(&format!("{}:{} digest changes to {}", repository, tag, digest)),
                ImageUpdate::TagUpdated {
                    repository,
                    previous_tag,
                    tag,
                    digest,
                } => self.output.warning(&format!(
                    "{}:{} moves to {}@{}",
                    repository, previous_tag, tag, digest
                )),
            }
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
