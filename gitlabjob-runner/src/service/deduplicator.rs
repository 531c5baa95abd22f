//! Pipeline deduplicator
//!
//! Prunes a project's pending (manual) pipelines down to the most recent
//! one. The listing is refetched after every pass because new pipelines
//! may appear while old ones are being deleted, so the loop is bounded by
//! a pass ceiling instead of by its input.

use gitlabjob_client::{ClientError, GitlabClient};
use gitlabjob_core::ProjectId;
use gitlabjob_core::domain::filter::JobFilter;
use gitlabjob_core::domain::pipeline::{DedupReport, Deletion};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Delete-then-refetch passes before giving up
pub const DEFAULT_MAX_PASSES: u32 = 5;

/// Wait for the service to reflect deletions before refetching
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(5);

pub struct Deduplicator {
    client: GitlabClient,
    max_passes: u32,
    cooldown: Duration,
}

impl Deduplicator {
    pub fn new(client: GitlabClient) -> Self {
        Self {
            client,
            max_passes: DEFAULT_MAX_PASSES,
            cooldown: DEFAULT_COOLDOWN,
        }
    }

    pub fn with_limits(mut self, max_passes: u32, cooldown: Duration) -> Self {
        self.max_passes = max_passes;
        self.cooldown = cooldown;
        self
    }

    /// Deletes every pending pipeline but the newest, until one is left
    ///
    /// Stops after `max_passes` passes with `converged == false` when the
    /// listing still holds more than one pipeline.
    pub async fn deduplicate(&self, project: ProjectId) -> Result<DedupReport, ClientError> {
        let filter = JobFilter::manual();
        let mut report = DedupReport::default();
        let mut pipelines = self.client.list_pipelines(project, &filter).await?;

        while pipelines.len() > 1 {
            if report.passes >= self.max_passes {
                warn!(
                    "Project {}: {} pending pipelines left after {} pass(es), giving up",
                    project,
                    pipelines.len(),
                    report.passes
                );
                report.remaining = pipelines;
                return Ok(report);
            }
            report.passes += 1;

            // Ascending ids: the last entry is the newest and survives.
            let stale = &pipelines[..pipelines.len() - 1];
            info!(
                "Project {}: pass {}, deleting {} stale pipeline(s)",
                project,
                report.passes,
                stale.len()
            );

            for &pipeline_id in stale {
                let status = self.client.delete_pipeline(project, pipeline_id).await?;
                if !(200..300).contains(&status) {
                    warn!(
                        "Project {}: deleting pipeline {} answered {}",
                        project, pipeline_id, status
                    );
                }
                report.deleted.push(Deletion {
                    pipeline_id,
                    status,
                });
            }

            debug!("Cooling down for {:?}", self.cooldown);
            tokio::time::sleep(self.cooldown).await;

            pipelines = self.client.list_pipelines(project, &filter).await?;
        }

        report.converged = true;
        report.remaining = pipelines;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitlabjob_client::mock::MockGateway;
    use gitlabjob_client::{ApiResponse, Method};
    use gitlabjob_core::PipelineId;
    use serde_json::json;
    use std::sync::Arc;

    const MANUAL_PIPELINES: &str = "/projects/5/pipelines?order_by=id&sort=asc&status=manual";

    fn deduplicator(mock: &Arc<MockGateway>) -> Deduplicator {
        Deduplicator::new(GitlabClient::new(mock.clone())).with_limits(5, Duration::ZERO)
    }

    fn pipelines(ids: &[u64]) -> serde_json::Value {
        json!(
            ids.iter()
                .map(|id| json!({"id": id, "status": "manual"}))
                .collect::<Vec<_>>()
        )
    }

    fn accept_deletes(mock: &MockGateway, ids: &[u64]) {
        for id in ids {
            mock.on(
                Method::DELETE,
                &format!("/projects/5/pipelines/{}", id),
                ApiResponse::new(204, ""),
            );
        }
    }

    #[tokio::test]
    async fn test_single_pass_keeps_newest() {
        let mock = Arc::new(MockGateway::new());
        mock.on_get(MANUAL_PIPELINES, pipelines(&[10, 11, 12]));
        mock.on_get(MANUAL_PIPELINES, pipelines(&[12]));
        accept_deletes(&mock, &[10, 11]);

        let report = deduplicator(&mock).deduplicate(ProjectId(5)).await.unwrap();

        assert!(report.converged);
        assert_eq!(report.passes, 1);
        assert_eq!(report.deleted_ids(), vec![PipelineId(10), PipelineId(11)]);
        assert_eq!(report.remaining, vec![PipelineId(12)]);
        assert_eq!(
            mock.call_count(Method::DELETE, "/projects/5/pipelines/12"),
            0
        );
    }

    #[tokio::test]
    async fn test_nothing_to_do() {
        let mock = Arc::new(MockGateway::new());
        mock.on_get(MANUAL_PIPELINES, pipelines(&[12]));

        let report = deduplicator(&mock).deduplicate(ProjectId(5)).await.unwrap();

        assert!(report.converged);
        assert_eq!(report.passes, 0);
        assert!(!report.is_notable());
        assert!(mock.paths(Method::DELETE).is_empty());
    }

    #[tokio::test]
    async fn test_stops_at_pass_ceiling() {
        let mock = Arc::new(MockGateway::new());
        // Every refetch shows two pipelines: the loop can never converge.
        mock.on_get(MANUAL_PIPELINES, pipelines(&[20, 21]));
        accept_deletes(&mock, &[20]);

        let report = deduplicator(&mock).deduplicate(ProjectId(5)).await.unwrap();

        assert!(!report.converged);
        assert_eq!(report.passes, 5);
        assert_eq!(report.deleted.len(), 5);
        assert_eq!(report.remaining, vec![PipelineId(20), PipelineId(21)]);
        assert_eq!(mock.call_count(Method::GET, MANUAL_PIPELINES), 6);
    }

    #[tokio::test]
    async fn test_custom_ceiling() {
        let mock = Arc::new(MockGateway::new());
        mock.on_get(MANUAL_PIPELINES, pipelines(&[20, 21]));
        accept_deletes(&mock, &[20]);

        let report = Deduplicator::new(GitlabClient::new(mock.clone()))
            .with_limits(2, Duration::ZERO)
            .deduplicate(ProjectId(5))
            .await
            .unwrap();

        assert_eq!(report.passes, 2);
        assert!(!report.converged);
    }

    #[tokio::test]
    async fn test_failed_delete_is_still_recorded() {
        let mock = Arc::new(MockGateway::new());
        mock.on_get(MANUAL_PIPELINES, pipelines(&[10, 11]));
        mock.on_get(MANUAL_PIPELINES, pipelines(&[11]));
        mock.on(
            Method::DELETE,
            "/projects/5/pipelines/10",
            ApiResponse::new(403, r#"{"message":"403 Forbidden"}"#),
        );

        let report = deduplicator(&mock).deduplicate(ProjectId(5)).await.unwrap();

        assert_eq!(
            report.deleted,
            vec![Deletion {
                pipeline_id: PipelineId(10),
                status: 403
            }]
        );
    }
}
