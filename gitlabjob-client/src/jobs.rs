//! Job-related API endpoints

use gitlabjob_core::domain::filter::JobFilter;
use gitlabjob_core::dto::job::JobRecord;
use gitlabjob_core::{JobId, ProjectId};
use tracing::debug;

use crate::error::Result;
use crate::gateway::ApiRequest;
use crate::{GitlabClient, PAGE_SIZE, ids_of};

impl GitlabClient {
    // =============================================================================
    // Job Discovery
    // =============================================================================

    /// List the ids of a project's jobs, oldest first
    ///
    /// Every page is fetched before the filter runs, because the filter is
    /// applied to the merged listing. A status filter is also pushed to the
    /// server as `scope=`.
    ///
    /// # Arguments
    /// * `project` - The project to enumerate
    /// * `filter` - Predicate applied to each job record
    pub async fn list_jobs(&self, project: ProjectId, filter: &JobFilter) -> Result<Vec<JobId>> {
        let mut path = format!(
            "/projects/{}/jobs?pagination=keyset&per_page={}&order_by=id&sort=asc",
            project, PAGE_SIZE
        );
        if let Some(scope) = filter.server_scope() {
            path.push_str(&format!("&scope={}", scope));
        }

        let records = self.get_all_pages(&path).await?;
        let total = records.len();
        let ids: Vec<JobId> = ids_of(filter.apply(&records), "job");

        debug!(
            "Project {}: {} job(s) listed, {} kept by filter",
            project,
            total,
            ids.len()
        );
        Ok(ids)
    }

    /// Get a job by ID
    pub async fn get_job(&self, project: ProjectId, job: JobId) -> Result<JobRecord> {
        self.get_json(&format!("/projects/{}/jobs/{}", project, job))
            .await
    }

    // =============================================================================
    // Job Transitions
    // =============================================================================

    /// Trigger a manual job
    ///
    /// # Returns
    /// The HTTP status code GitLab answered with; only a transport failure
    /// is an error.
    pub async fn play_job(&self, project: ProjectId, job: JobId) -> Result<u16> {
        let path = format!("/projects/{}/jobs/{}/play", project, job);
        let response = self.send(ApiRequest::post(path)).await?;

        Ok(response.status)
    }

    /// Cancel a job
    ///
    /// # Returns
    /// The job record after cancellation
    pub async fn cancel_job(&self, project: ProjectId, job: JobId) -> Result<JobRecord> {
        let path = format!("/projects/{}/jobs/{}/cancel", project, job);
        let response = self.send(ApiRequest::post(path)).await?;

        Self::handle_response(&response)
    }
}
