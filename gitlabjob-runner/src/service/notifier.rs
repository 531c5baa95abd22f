//! Notifications
//!
//! Messages for the operator (and for whoever triggered a job) are composed
//! here and delivered through a [`Notifier`]. Delivery failures are the
//! caller's to log; they never abort a run.

use anyhow::Result;
use async_trait::async_trait;
use gitlabjob_core::ProjectId;
use gitlabjob_core::domain::pipeline::DedupReport;
use gitlabjob_core::domain::report::JobReport;
use tracing::info;

use crate::config::{Config, split_recipients};

/// A message ready for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
    /// Optional HTML rendering of `body`
    pub html: Option<String>,
}

/// Delivers notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<()>;
}

/// Writes notifications to the log
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        info!(
            recipients = %notification.recipients.join(","),
            subject = %notification.subject,
            "{}",
            notification.body.trim_end()
        );
        Ok(())
    }
}

/// Builds the notifications a run emits
#[derive(Debug, Clone)]
pub struct Composer {
    operator: Vec<String>,
    subject_prefix: String,
}

impl Composer {
    pub fn new(operator: Vec<String>, subject_prefix: impl Into<String>) -> Self {
        Self {
            operator,
            subject_prefix: subject_prefix.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.operator_recipients(), config.subject_prefix.clone())
    }

    /// Per-job status, for the operator and the job's trigger address
    pub fn job(&self, report: &JobReport) -> Notification {
        let mut recipients = self.operator.clone();
        for address in split_recipients(report.notify_email().unwrap_or_default()) {
            if !recipients.contains(&address) {
                recipients.push(address);
            }
        }

        Notification {
            recipients,
            subject: format!("{} Status do job {}", self.subject_prefix, report.job_id),
            body: report.body(),
            html: Some(report.html_body()),
        }
    }

    /// Pipelines deleted (or left behind) by the deduplicator
    pub fn dedup(
        &self,
        project: ProjectId,
        project_name: Option<&str>,
        report: &DedupReport,
    ) -> Notification {
        let headline = if report.is_clean() {
            "Pipelines removed from"
        } else {
            "Pipeline cleanup incomplete in"
        };

        Notification {
            recipients: self.operator.clone(),
            subject: format!(
                "{} {} {}",
                self.subject_prefix,
                headline,
                display_project(project, project_name)
            ),
            body: report.summary(),
            html: None,
        }
    }

    /// A project the run could not finish
    pub fn project_failure(&self, project: &str, reason: &str) -> Notification {
        Notification {
            recipients: self.operator.clone(),
            subject: format!("{} Project {} skipped", self.subject_prefix, project),
            body: format!("project: {}\nerror: {}\n", project, reason),
            html: None,
        }
    }
}

fn display_project(project: ProjectId, name: Option<&str>) -> String {
    match name {
        Some(name) => format!("{} ({})", name, project),
        None => project.to_string(),
    }
}
