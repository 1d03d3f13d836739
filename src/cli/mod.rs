// CLI interface
pub mod commands;

use crate::config::Config;
use crate::credentials::{self, matcher::CacheMatcher};
use crate::error::Result;
use crate::exec::AwsCliRunner;
use crate::mapping::MappingStore;
use crate::profiles::{AwsConfigProfiles, ProfileRepository};
use crate::session::SessionMonitor;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "ssomon")]
#[command(about = "Track and renew AWS SSO and IAM role credential sessions", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose/debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show remaining credential lifetime for a profile
    Status {
        /// Profile name from ~/.aws/config
        profile: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Monitor a profile's session, streaming countdown and warnings until interrupted
    Watch {
        /// Profile name from ~/.aws/config
        profile: String,
    },

    /// Run the logout/login/verify renewal sequence for a profile
    Renew {
        /// Profile name from ~/.aws/config
        profile: String,
    },

    /// Show which cache file matches a profile and how it was found
    Resolve {
        /// Profile name from ~/.aws/config
        profile: String,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

/// Wired-up core services shared by the commands. Explicitly constructed
/// here and passed down; nothing hangs off a global.
pub struct Services {
    pub profiles: Arc<dyn ProfileRepository>,
    pub mapping: Arc<MappingStore>,
    pub cache_dir: PathBuf,
    pub monitor: SessionMonitor,
}

impl Services {
    pub fn from_config(config: &Config) -> Result<Self> {
        let cache_dir = match &config.aws.cache_dir {
            Some(dir) => dir.clone(),
            None => credentials::default_cache_dir()?,
        };

        let profiles: Arc<dyn ProfileRepository> = match &config.aws.config_file {
            Some(path) => Arc::new(AwsConfigProfiles::with_path(path.clone())),
            None => Arc::new(AwsConfigProfiles::new()?),
        };

        let mapping_path = match &config.mapping_file {
            Some(path) => path.clone(),
            None => Config::mapping_file_path()?,
        };
        let mapping = MappingStore::load(mapping_path);
        let runner = Arc::new(AwsCliRunner::new(Duration::from_secs(
            config.monitor.process_timeout,
        )));

        let matcher = CacheMatcher::new(
            cache_dir.clone(),
            Arc::clone(&mapping),
            Arc::clone(&profiles),
        );
        let monitor = SessionMonitor::new(matcher, Arc::clone(&profiles), runner, Arc::clone(&mapping))
            .with_revalidate_interval(Duration::from_secs(config.monitor.revalidate_interval));

        Ok(Self {
            profiles,
            mapping,
            cache_dir,
            monitor,
        })
    }

    /// A matcher for one-shot lookups outside the monitor.
    pub fn matcher(&self) -> CacheMatcher {
        CacheMatcher::new(
            self.cache_dir.clone(),
            Arc::clone(&self.mapping),
            Arc::clone(&self.profiles),
        )
    }
}

pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Completions { shell } => {
            commands::completions::execute(shell);
            Ok(())
        }
        command => {
            let config = Config::load()?;
            let services = Services::from_config(&config)?;
            match command {
                Commands::Status { profile, format } => {
                    commands::status::execute(&services, &profile, &format).await
                }
                Commands::Watch { profile } => commands::watch::execute(&services, &profile).await,
                Commands::Renew { profile } => commands::renew::execute(&services, &profile).await,
                Commands::Resolve { profile } => {
                    commands::resolve::execute(&services, &profile).await
                }
                Commands::Completions { .. } => unreachable!("handled above"),
            }
        }
    }
}
