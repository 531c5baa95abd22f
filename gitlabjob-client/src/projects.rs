//! Project and group endpoints

use gitlabjob_core::dto::project::ProjectRecord;
use gitlabjob_core::{GroupId, ProjectId};

use crate::error::Result;
use crate::{GitlabClient, PAGE_SIZE, raw_id};

impl GitlabClient {
    /// Get a project's descriptive record
    pub async fn get_project(&self, project: ProjectId) -> Result<ProjectRecord> {
        self.get_json(&format!("/projects/{}", project)).await
    }

    /// List the projects of a group, oldest first, across every page
    ///
    /// Ids are returned as raw text (empty when the record has none) so the
    /// caller decides what to do with unusable entries before touching the
    /// network for them.
    pub async fn list_projects_in_group(&self, group: GroupId) -> Result<Vec<String>> {
        let path = format!(
            "/groups/{}/projects?pagination=keyset&per_page={}&order_by=id&sort=asc",
            group, PAGE_SIZE
        );

        let records = self.get_all_pages(&path).await?;
        Ok(records.iter().map(raw_id).collect())
    }
}
