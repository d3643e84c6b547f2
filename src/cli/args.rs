//! Command-line argument parsing

use crate::config::AppConfig;
use crate::error::{RegistryError, Result};
use crate::registry::credentials::Credentials;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "docker-tag-pinner")]
#[command(about = "Pin floating Docker image tags to the static release tag they currently point at")]
#[command(version, author)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Registry username
    #[arg(long, short = 'u', global = true, help = "Username for registry authentication")]
    pub username: Option<String>,

    /// Registry password
    #[arg(long, short = 'p', global = true, help = "Password for registry authentication")]
    pub password: Option<String>,

    /// Identity token, sent as a bearer credential
    #[arg(long = "identity-token", global = true, help = "Identity token for registry authentication")]
    pub identity_token: Option<String>,

    /// Number of concurrent manifest lookups
    #[arg(long, short = 'j', global = true, help = "Number of concurrent digest lookups")]
    pub concurrency: Option<usize>,

    /// Response timeout in seconds
    #[arg(long, short = 't', global = true, help = "Timeout for registry responses in seconds")]
    pub timeout: Option<u64>,

    /// Connect timeout in seconds
    #[arg(long = "connect-timeout", global = true, help = "Timeout for establishing connections in seconds")]
    pub connect_timeout: Option<u64>,

    /// Skip TLS verification
    #[arg(long = "skip-tls", short = 'k', global = true, help = "Skip TLS certificate verification")]
    pub skip_tls: bool,

    /// Verbose output
    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Output format for results
    #[arg(long, short = 'o', global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve the static tag a floating tag currently points at
    Resolve {
        /// Image reference, e.g. registry.example.com/app/foo:1.0
        image: String,
        /// Floating tag to follow
        #[arg(long = "latest-tag", short = 'l')]
        latest_tag: Option<String>,
        /// Tag to ignore (repeatable)
        #[arg(long = "ignore")]
        ignore: Vec<String>,
        /// Regex of tags to ignore (repeatable)
        #[arg(long = "ignore-regex")]
        ignore_regex: Vec<String>,
    },
    /// List every tag of a repository
    Tags {
        /// Image reference; the tag is ignored
        image: String,
    },
    /// Print the manifest digest of an image
    Digest {
        /// Image reference with tag
        image: String,
    },
    /// Plan updates for every image in an images file
    Update {
        /// Images file (JSON)
        #[arg(long, short = 'c')]
        config: PathBuf,
        /// Write the new tags and digests back into the images file
        #[arg(long)]
        write: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

impl Args {
    pub fn parse_args() -> Self {
        Args::parse()
    }

    /// Credentials given on the command line, if any
    pub fn credentials(&self) -> Option<Credentials> {
        let credentials = Credentials {
            username: self.username.clone(),
            password: self.password.clone(),
            identity_token: self.identity_token.clone(),
            auth: None,
        };
        (!credentials.is_empty()).then_some(credentials)
    }

    /// Environment configuration with command-line overrides applied
    pub fn app_config(&self) -> Result<AppConfig> {
        let mut config = AppConfig::from_env();
        if let Some(concurrency) = self.concurrency {
            config.resolver.max_concurrent_lookups = concurrency;
        }
        if let Some(timeout) = self.timeout {
            config.http.response_timeout = timeout;
        }
        if let Some(connect_timeout) = self.connect_timeout {
            config.http.connect_timeout = connect_timeout;
        }
        if self.skip_tls {
            config.http.skip_tls = true;
        }
        config.validate()?;
        Ok(config)
    }

    /// Validate arguments
    pub fn validate(&self) -> Result<()> {
        if self.password.is_some() && self.username.is_none() {
            return Err(RegistryError::Validation(
                "--password requires --username".to_string(),
            ));
        }
        if let Command::Update { config, .. } = &self.command {
            if !config.exists() {
                return Err(RegistryError::Validation(format!(
                    "Images file does not exist: {}",
                    config.display()
                )));
            }
        }
        Ok(())
    }
}
