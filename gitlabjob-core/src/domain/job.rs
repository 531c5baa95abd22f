//! Job metadata
//!
//! Routing metadata smuggled into pipelines as trigger variables, plus the
//! descriptive fields needed to report on a job.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::ids::{JobId, PipelineId};
use crate::dto::pipeline::PipelineVariable;

/// Rendered in place of a branch or tag that was not declared
pub const NOT_INFORMED: &str = "não informada";

/// Pipeline variable carrying the notification address
pub const VAR_TRIGGER_EMAIL: &str = "trigger_email";
/// Default pipeline variable carrying the release tag required upstream
pub const VAR_PROD_TAG: &str = "PROD_TAG";
/// Pipeline variable carrying the source branch
pub const VAR_REF_SOURCE: &str = "ref_source";
/// Pipeline variable carrying the upstream project id
pub const VAR_SOURCE_ID: &str = "source_id";

/// The four well-known trigger variables of a pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerVariables {
    pub notify_email: Option<String>,
    pub required_tag: Option<String>,
    pub source_branch: Option<String>,
    pub source_project_id: Option<String>,
}

impl TriggerVariables {
    /// Scans variables in list order; the last non-empty occurrence of a key wins
    ///
    /// `tag_key` names the variable holding the required release tag
    /// (usually [`VAR_PROD_TAG`]).
    pub fn from_variables(variables: &[PipelineVariable], tag_key: &str) -> Self {
        let mut vars = Self::default();

        for var in variables {
            let value = var.value.trim();
            if value.is_empty() || value == NOT_INFORMED {
                continue;
            }

            let slot = match var.key.as_str() {
                key if key == tag_key => &mut vars.required_tag,
                VAR_TRIGGER_EMAIL => &mut vars.notify_email,
                VAR_REF_SOURCE => &mut vars.source_branch,
                VAR_SOURCE_ID => &mut vars.source_project_id,
                _ => continue,
            };
            *slot = Some(value.to_string());
        }

        vars
    }
}

/// Flat metadata record assembled for one job
///
/// Recomputed on every query; it has no identity of its own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMetadata {
    pub job_id: Option<JobId>,
    pub job_url: Option<String>,
    pub project_name: Option<String>,
    pub pipeline_id: Option<PipelineId>,
    pub source_project_id: Option<String>,
    pub notify_email: Option<String>,
    pub source_branch: Option<String>,
    pub required_tag: Option<String>,
}

impl JobMetadata {
    /// Metadata holding only a project's display name
    pub fn for_project(project_name: Option<String>) -> Self {
        Self {
            project_name,
            ..Self::default()
        }
    }

    pub fn apply_variables(mut self, vars: TriggerVariables) -> Self {
        self.notify_email = vars.notify_email;
        self.required_tag = vars.required_tag;
        self.source_branch = vars.source_branch;
        self.source_project_id = vars.source_project_id;
        self
    }

    /// Label/value pairs as shown to an operator
    pub fn lines(&self) -> Vec<(&'static str, String)> {
        let or_empty = |v: &Option<String>| v.clone().unwrap_or_default();
        vec![
            (
                "job_id",
                self.job_id.map(|id| id.to_string()).unwrap_or_default(),
            ),
            ("job_url", or_empty(&self.job_url)),
            ("project", or_empty(&self.project_name)),
            (
                "pipeline_id",
                self.pipeline_id.map(|id| id.to_string()).unwrap_or_default(),
            ),
            ("source_id", or_empty(&self.source_project_id)),
            ("trigger_email", or_empty(&self.notify_email)),
            (
                "branch",
                self.source_branch
                    .clone()
                    .unwrap_or_else(|| NOT_INFORMED.to_string()),
            ),
            (
                "tag",
                self.required_tag
                    .clone()
                    .unwrap_or_else(|| NOT_INFORMED.to_string()),
            ),
        ]
    }
}

impl JobMetadata {
    /// HTML table of [`lines`](Self::lines), values escaped
    pub fn to_html(&self) -> String {
        let mut html = String::from("<table style=\"border:0px;\">\n");
        for (label, value) in self.lines() {
            let value = escape_html(&value);
            let cell = if label == "job_url" && !value.is_empty() {
                format!("<a href=\"{0}\">{0}</a>", value)
            } else {
                value
            };
            html.push_str(&format!(
                "<tr><td>{}:</td><td><b>{}</b></td></tr>\n",
                label, cell
            ));
        }
        html.push_str("</table>\n");
        html
    }
}

pub(crate) fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

impl fmt::Display for JobMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (label, value) in self.lines() {
            writeln!(f, "{}: {}", label, value)?;
        }
        Ok(())
    }
}

/// Result of resolving metadata for a job
///
/// A lookup failure is a normal value, not an error: callers must check for
/// it before trusting any metadata field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetadataOutcome {
    Resolved(JobMetadata),
    LookupFailure { description: String, status: u16 },
}

impl MetadataOutcome {
    pub fn lookup_failure(description: impl Into<String>, status: u16) -> Self {
        MetadataOutcome::LookupFailure {
            description: description.into(),
            status,
        }
    }

    pub fn metadata(&self) -> Option<&JobMetadata> {
        match self {
            MetadataOutcome::Resolved(metadata) => Some(metadata),
            MetadataOutcome::LookupFailure { .. } => None,
        }
    }
}

impl fmt::Display for MetadataOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataOutcome::Resolved(metadata) => write!(f, "{}", metadata),
            MetadataOutcome::LookupFailure {
                description,
                status,
            } => {
                writeln!(f, "error: {}", description)?;
                writeln!(f, "status: {}", status)
            }
        }
    }
}
