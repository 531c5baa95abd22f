//! Admission controller
//!
//! A manual job may run only when the release tag its pipeline asks for
//! already exists in the upstream source project.

use gitlabjob_client::{ClientError, GitlabClient};
use gitlabjob_core::ProjectId;
use gitlabjob_core::domain::job::JobMetadata;
use std::fmt;
use tracing::debug;

/// Outcome of the admission check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    Ineligible(String),
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Eligibility::Eligible)
    }
}

impl fmt::Display for Eligibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Eligibility::Eligible => write!(f, "eligible"),
            Eligibility::Ineligible(reason) => write!(f, "{}", reason),
        }
    }
}

pub struct AdmissionController {
    client: GitlabClient,
}

impl AdmissionController {
    pub fn new(client: GitlabClient) -> Self {
        Self { client }
    }

    /// Checks the job's required tag against the source project's tags
    ///
    /// The only side effect is the tag lookup itself. Errors are returned
    /// only when that lookup fails.
    pub async fn is_eligible(&self, metadata: &JobMetadata) -> Result<Eligibility, ClientError> {
        let Some(source) = metadata
            .source_project_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        else {
            return Ok(Eligibility::Ineligible(
                "source project id not obtained".to_string(),
            ));
        };

        let Ok(source_id) = source.parse::<ProjectId>() else {
            return Ok(Eligibility::Ineligible(format!(
                "invalid source project id `{}`",
                source
            )));
        };

        let Some(tag) = metadata.required_tag.as_deref() else {
            return Ok(Eligibility::Ineligible(
                "release tag not informed".to_string(),
            ));
        };

        let tags = self.client.list_tags(source_id, Some(tag)).await?;
        debug!(
            "Source project {}: {} tag(s) match search '{}'",
            source_id,
            tags.len(),
            tag
        );

        if tags.iter().any(|t| t == tag) {
            Ok(Eligibility::Eligible)
        } else {
            Ok(Eligibility::Ineligible(format!(
                "tag `{}` not found in source project `{}`",
                tag, source
            )))
        }
    }
}
