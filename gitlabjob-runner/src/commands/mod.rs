//! Commands module
//!
//! Defines the CLI subcommands and their handlers.

mod cancel;
mod report;
mod run;

use anyhow::Result;
use clap::Subcommand;
use gitlabjob_client::{GitlabClient, HttpGateway};
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::orchestrator::Mode;
use crate::service::{LogNotifier, Notifier, SmtpNotifier};

/// Top-level CLI commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Deduplicate pipelines, then gate and play every manual job (default)
    Run,
    /// Show which manual jobs would be played, without changing anything
    Check,
    /// Only prune duplicate pending pipelines
    Dedup,
    /// Cancel one job of the configured project
    Cancel {
        /// Numeric job id
        job_id: String,
    },
}

/// Handle a CLI command
///
/// # Arguments
/// * `command` - The command to execute
/// * `config` - The validated configuration
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Run => run::handle_run(config, Mode::Execute).await,
        Commands::Check => run::handle_run(config, Mode::DryRun).await,
        Commands::Dedup => run::handle_run(config, Mode::DedupOnly).await,
        Commands::Cancel { job_id } => cancel::handle_cancel(config, &job_id).await,
    }
}

fn build_client(config: &Config) -> Result<GitlabClient> {
    let gateway = match config.request_timeout {
        Some(timeout) => HttpGateway::with_timeout(
            config.base_url.clone(),
            config.private_token.clone(),
            timeout,
        )?,
        None => HttpGateway::new(config.base_url.clone(), config.private_token.clone()),
    };
    info!("GitLab API at {}", gateway.base_url());
    Ok(GitlabClient::new(Arc::new(gateway)))
}

fn build_notifier(config: &Config) -> Result<Arc<dyn Notifier>> {
    match &config.smtp {
        Some(smtp) => {
            info!("Notifications via SMTP relay {}", smtp.server);
            Ok(Arc::new(SmtpNotifier::new(smtp, &config.notify_from)?))
        }
        None => {
            info!("No SMTP relay configured, notifications are logged only");
            Ok(Arc::new(LogNotifier))
        }
    }
}
