//! Run reports
//!
//! Immutable per-job and per-project results. Each record is built once and
//! handed to the notifier as-is.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::domain::ids::{JobId, ProjectId};
use crate::domain::job::{MetadataOutcome, escape_html};
use crate::domain::pipeline::DedupReport;

/// What happened to a discovered job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    /// The job was played; `status` is the HTTP status of the play request
    Dispatched { status: u16 },
    /// The job passed the admission check but was not played (dry run)
    Admitted,
    /// The admission check refused the job
    Ineligible { reason: String },
    /// Metadata could not be resolved, so no admission check ran
    NotEvaluated { reason: String },
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Dispatched { status: 200 } => write!(f, "OK"),
            Decision::Dispatched { status } => write!(f, "{}", status),
            Decision::Admitted => write!(f, "eligible, not played"),
            Decision::Ineligible { reason } => write!(f, "not run: {}", reason),
            Decision::NotEvaluated { reason } => write!(f, "not evaluated: {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobReport {
    pub job_id: JobId,
    pub metadata: MetadataOutcome,
    pub decision: Decision,
}

impl JobReport {
    /// Address declared by the pipeline that triggered the job, if any
    pub fn notify_email(&self) -> Option<&str> {
        self.metadata
            .metadata()
            .and_then(|m| m.notify_email.as_deref())
    }

    /// Plain-text body for the per-job notification
    pub fn body(&self) -> String {
        format!("{}inicio: {}\n", self.metadata, self.decision)
    }

    /// HTML alternative of [`body`](Self::body)
    pub fn html_body(&self) -> String {
        let details = match &self.metadata {
            MetadataOutcome::Resolved(metadata) => metadata.to_html(),
            MetadataOutcome::LookupFailure {
                description,
                status,
            } => format!(
                "<p>error: <b>{}</b><br>status: <b>{}</b></p>\n",
                escape_html(description),
                status
            ),
        };

        format!(
            "<div style=\"text-align: left;\">\n<h2>Job {}</h2>\n{}<p>inicio: <b>{}</b></p>\n</div>\n",
            self.job_id,
            details,
            escape_html(&self.decision.to_string())
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectReport {
    pub project_id: ProjectId,
    pub dedup: Option<DedupReport>,
    pub jobs: Vec<JobReport>,
    /// Set when the project was abandoned part-way through
    pub failure: Option<String>,
}

impl ProjectReport {
    pub fn new(project_id: ProjectId) -> Self {
        Self {
            project_id,
            dedup: None,
            jobs: Vec::new(),
            failure: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub projects: Vec<ProjectReport>,
    /// Project ids that could not be parsed, with the reason
    pub rejected: Vec<(String, String)>,
}

impl RunReport {
    pub fn start() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            projects: Vec::new(),
            rejected: Vec::new(),
        }
    }

    pub fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }

    /// HTTP status of every dispatched job, keyed by job id
    pub fn outcomes(&self) -> BTreeMap<JobId, u16> {
        self.projects
            .iter()
            .flat_map(|p| p.jobs.iter())
            .filter_map(|j| match j.decision {
                Decision::Dispatched { status } => Some((j.job_id, status)),
                _ => None,
            })
            .collect()
    }
}
