//! Metadata resolver
//!
//! Assembles a job's metadata record from three lookups: the job itself,
//! its pipeline's variables, and the owning project. A lookup the service
//! answers with something unusable yields a `LookupFailure` record rather
//! than an error; only transport failures propagate.

use gitlabjob_client::{ClientError, GitlabClient};
use gitlabjob_core::domain::job::{JobMetadata, MetadataOutcome, TriggerVariables, VAR_PROD_TAG};
use gitlabjob_core::{JobId, ProjectId};
use tracing::{debug, warn};

const JOB_LOOKUP: &str = "could not fetch job information";
const PIPELINE_LOOKUP: &str = "could not fetch pipeline information";
const PROJECT_LOOKUP: &str = "could not fetch project information";

pub struct MetadataResolver {
    client: GitlabClient,
    tag_key: String,
}

impl MetadataResolver {
    pub fn new(client: GitlabClient) -> Self {
        Self {
            client,
            tag_key: VAR_PROD_TAG.to_string(),
        }
    }

    /// Reads the required release tag from `tag_key` instead of `PROD_TAG`
    pub fn with_tag_key(mut self, tag_key: impl Into<String>) -> Self {
        self.tag_key = tag_key.into();
        self
    }

    /// Resolves metadata for a job, or only the project name when `job` is `None`
    pub async fn resolve(
        &self,
        project: ProjectId,
        job: Option<JobId>,
    ) -> Result<MetadataOutcome, ClientError> {
        let mut metadata = JobMetadata::default();

        if let Some(job_id) = job {
            let record = match self.client.get_job(project, job_id).await {
                Ok(record) => record,
                Err(e) => return recover(e, JOB_LOOKUP),
            };

            let variables = match self
                .client
                .get_pipeline_variables(project, record.pipeline.id)
                .await
            {
                Ok(variables) => variables,
                Err(e) => return recover(e, PIPELINE_LOOKUP),
            };
            debug!(
                "Job {} pipeline {} carries {} variable(s)",
                job_id,
                record.pipeline.id,
                variables.len()
            );

            metadata = JobMetadata {
                job_id: Some(record.id),
                job_url: record.web_url,
                pipeline_id: Some(record.pipeline.id),
                ..metadata
            }
            .apply_variables(TriggerVariables::from_variables(&variables, &self.tag_key));
        }

        let project_record = match self.client.get_project(project).await {
            Ok(record) => record,
            Err(e) => return recover(e, PROJECT_LOOKUP),
        };
        metadata.project_name = project_record.name;

        Ok(MetadataOutcome::Resolved(metadata))
    }

    /// Display name of a project, if it can be resolved
    pub async fn project_name(&self, project: ProjectId) -> Result<Option<String>, ClientError> {
        Ok(self
            .resolve(project, None)
            .await?
            .metadata()
            .and_then(|m| m.project_name.clone()))
    }
}

fn recover(err: ClientError, description: &str) -> Result<MetadataOutcome, ClientError> {
    if err.is_transport() {
        return Err(err);
    }

    warn!("{}: {}", description, err);
    Ok(MetadataOutcome::lookup_failure(
        description,
        err.status().unwrap_or_default(),
    ))
}
