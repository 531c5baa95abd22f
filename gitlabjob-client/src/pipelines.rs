//! Pipeline-related API endpoints

use gitlabjob_core::domain::filter::JobFilter;
use gitlabjob_core::dto::pipeline::PipelineVariable;
use gitlabjob_core::{PipelineId, ProjectId};
use serde_json::Value;

use crate::error::Result;
use crate::{GitlabClient, ids_of};
use crate::gateway::ApiRequest;

impl GitlabClient {
    // =============================================================================
    // Pipeline Management
    // =============================================================================

    /// List the ids of a project's pipelines, oldest first
    ///
    /// Single page only. A status filter is pushed to the server as
    /// `status=` and applied again to the returned records.
    pub async fn list_pipelines(
        &self,
        project: ProjectId,
        filter: &JobFilter,
    ) -> Result<Vec<PipelineId>> {
        let mut path = format!("/projects/{}/pipelines?order_by=id&sort=asc", project);
        if let Some(status) = filter.server_scope() {
            path.push_str(&format!("&status={}", status));
        }

        let records: Vec<Value> = self.get_json(&path).await?;

        Ok(ids_of(filter.apply(&records), "pipeline"))
    }

    /// Get the trigger variables of a pipeline, in the order GitLab lists them
    pub async fn get_pipeline_variables(
        &self,
        project: ProjectId,
        pipeline: PipelineId,
    ) -> Result<Vec<PipelineVariable>> {
        self.get_json(&format!(
            "/projects/{}/pipelines/{}/variables",
            project, pipeline
        ))
        .await
    }

    /// Delete a pipeline
    ///
    /// # Returns
    /// The HTTP status code GitLab answered with (204 on success)
    pub async fn delete_pipeline(&self, project: ProjectId, pipeline: PipelineId) -> Result<u16> {
        let path = format!("/projects/{}/pipelines/{}", project, pipeline);
        let response = self.send(ApiRequest::delete(path)).await?;

        Ok(response.status)
    }
}
