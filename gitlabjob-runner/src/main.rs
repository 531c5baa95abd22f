//! GitLab manual-job runner
//!
//! Plays pending manual jobs once their upstream release tag exists.
//!
//! Architecture:
//! - Configuration: flags, environment and an env file, merged once here
//! - Services: metadata resolution, pipeline deduplication, admission
//!   control and notification delivery
//! - Orchestrator: the per-project run, strictly sequential
//! - Commands: `run`, `check`, `dedup` and `cancel`
//!
//! Each invocation visits the configured project (or every project of the
//! configured group), prunes duplicate pending pipelines, gates every
//! manual job on its required tag and reports the outcome of each one.

mod commands;
mod config;
mod orchestrator;
mod service;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::{Commands, handle_command};
use crate::config::{Config, Settings};

#[derive(Parser, Debug)]
#[command(name = "gitlabjob")]
#[command(about = "Plays GitLab manual jobs once their release tag exists", long_about = None)]
struct Cli {
    /// Env file with KEY=VALUE settings
    #[arg(long, env = "ENV_FILE", default_value = ".env")]
    env_file: PathBuf,

    /// GitLab base URL
    #[arg(long, env = "BASE_URL")]
    base_url: Option<String>,

    /// GitLab private token
    #[arg(long, env = "PRIVATE_TOKEN", hide_env_values = true)]
    private_token: Option<String>,

    /// Project to visit when no group is given
    #[arg(long, env = "PROJECT_ID")]
    project_id: Option<String>,

    /// Visit every project of this group
    #[arg(long, env = "GROUP_ID")]
    group_id: Option<String>,

    /// Pipeline variable holding the required release tag
    #[arg(long, env = "PRODUCTION_TAG_KEY")]
    production_tag_key: Option<String>,

    /// Operator recipient(s), comma separated
    #[arg(long, env = "SMTP_TO")]
    smtp_to: Option<String>,

    /// Notification sender
    #[arg(long, env = "SMTP_FROM")]
    smtp_from: Option<String>,

    /// SMTP relay, host[:port]
    #[arg(long, env = "SMTP_SERVER")]
    smtp_server: Option<String>,

    #[arg(long, env = "SMTP_USER")]
    smtp_user: Option<String>,

    #[arg(long, env = "SMTP_PASS", hide_env_values = true)]
    smtp_pass: Option<String>,

    /// Notification subject prefix
    #[arg(long, env = "SMTP_SUBJECT")]
    smtp_subject: Option<String>,

    /// Deduplication pass ceiling
    #[arg(long, env = "DEDUP_MAX_PASSES")]
    dedup_max_passes: Option<String>,

    /// Seconds between deduplication passes
    #[arg(long, env = "DEDUP_COOLDOWN")]
    dedup_cooldown: Option<String>,

    /// Seconds to wait after each played job
    #[arg(long, env = "DISPATCH_SETTLE")]
    dispatch_settle: Option<String>,

    /// Request timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT")]
    request_timeout: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl Cli {
    /// Flag and environment values, keyed like the env file
    fn settings(&self) -> Settings {
        let mut settings = Settings::new();
        let values = [
            ("BASE_URL", &self.base_url),
            ("PRIVATE_TOKEN", &self.private_token),
            ("PROJECT_ID", &self.project_id),
            ("GROUP_ID", &self.group_id),
            ("PRODUCTION_TAG_KEY", &self.production_tag_key),
            ("SMTP_TO", &self.smtp_to),
            ("SMTP_FROM", &self.smtp_from),
            ("SMTP_SERVER", &self.smtp_server),
            ("SMTP_USER", &self.smtp_user),
            ("SMTP_PASS", &self.smtp_pass),
            ("SMTP_SUBJECT", &self.smtp_subject),
            ("DEDUP_MAX_PASSES", &self.dedup_max_passes),
            ("DEDUP_COOLDOWN", &self.dedup_cooldown),
            ("DISPATCH_SETTLE", &self.dispatch_settle),
            ("REQUEST_TIMEOUT", &self.request_timeout),
        ];
        for (key, value) in values {
            if let Some(value) = value {
                settings.set(key, value.clone());
            }
        }
        settings
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gitlabjob=info,gitlabjob_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {:#}", e);
            return Err(e);
        }
    };
    info!(
        "Loaded configuration: base_url={}, project={}, group={}",
        config.base_url,
        config.project_id.as_deref().unwrap_or("-"),
        config
            .group_id
            .map(|g| g.to_string())
            .unwrap_or_else(|| "-".to_string())
    );

    let command = cli.command.unwrap_or(Commands::Run);
    if let Err(e) = handle_command(command, &config).await {
        error!("{:#}", e);
        return Err(e);
    }

    Ok(())
}

/// Env file first, then environment and flags on top
fn load_config(cli: &Cli) -> Result<Config> {
    let settings = Settings::load_env_file(&cli.env_file)?.overlay(cli.settings());
    let config = Config::from_settings(&settings)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_to_run() {
        let cli = Cli::try_parse_from(["gitlabjob", "--env-file", "/nonexistent/.env"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cancel_takes_job_id() {
        let cli = Cli::try_parse_from(["gitlabjob", "cancel", "42"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Cancel {
                job_id: "42".to_string()
            })
        );
    }

    #[test]
    fn test_flags_win_over_env_file() {
        let cli = Cli::try_parse_from([
            "gitlabjob",
            "--base-url",
            "https://flag.example.com",
            "--private-token",
            "glpat-flag",
            "--project-id",
            "5",
        ])
        .unwrap();

        let file =
            Settings::from_env_reader("BASE_URL=https://file.example.com\nGROUP_ID=10\n".as_bytes())
                .unwrap();
        let settings = file.overlay(cli.settings());
        let config = Config::from_settings(&settings).unwrap();

        assert_eq!(config.base_url, "https://flag.example.com");
        assert_eq!(config.private_token, "glpat-flag");
        assert_eq!(config.group_id.map(|g| g.get()), Some(10));
    }
}
