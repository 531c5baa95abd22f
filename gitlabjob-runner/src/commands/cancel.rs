//! Cancel handler

use anyhow::{Context, Result};
use colored::*;
use gitlabjob_core::{JobId, ProjectId};

use super::build_client;
use crate::config::Config;

/// Cancels `raw_job` in the configured project
pub async fn handle_cancel(config: &Config, raw_job: &str) -> Result<()> {
    let project: ProjectId = config
        .project_id
        .as_deref()
        .unwrap_or_default()
        .parse()
        .context("cancel needs a valid PROJECT_ID")?;
    let job: JobId = raw_job
        .parse()
        .with_context(|| format!("invalid job id '{}'", raw_job))?;

    let client = build_client(config)?;
    let record = client.cancel_job(project, job).await?;

    println!(
        "{} job {} in project {}: {}",
        "Cancelled".green().bold(),
        record.id,
        project,
        record.status.yellow()
    );
    Ok(())
}
