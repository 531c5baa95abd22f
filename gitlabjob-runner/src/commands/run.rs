//! Run, check and dedup handlers

use anyhow::Result;
use tracing::{error, info};

use super::report::print_run_report;
use super::{build_client, build_notifier};
use crate::config::Config;
use crate::orchestrator::{Mode, RunOrchestrator};

/// Walks every configured project in the given mode and prints the result
pub async fn handle_run(config: &Config, mode: Mode) -> Result<()> {
    let client = build_client(config)?;
    let notifier = build_notifier(config)?;
    let orchestrator = RunOrchestrator::new(client, config, notifier).with_mode(mode);

    let targets = orchestrator.targets(config).await?;
    info!("Starting {:?} run over {} project(s)", mode, targets.len());

    let report = match orchestrator.run(targets).await {
        Ok(report) => report,
        Err(e) => {
            error!("Run aborted: {}", e);
            return Err(e.into());
        }
    };

    print_run_report(&report, mode);
    Ok(())
}
