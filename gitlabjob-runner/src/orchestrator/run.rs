//! Run orchestrator
//!
//! `Start → Deduplicating → Discovering → PerJob(Gating → Dispatching →
//! Reporting) → Done`, once per project. Execution is strictly sequential.

use gitlabjob_client::{ClientError, GitlabClient};
use gitlabjob_core::domain::filter::JobFilter;
use gitlabjob_core::domain::job::MetadataOutcome;
use gitlabjob_core::domain::report::{Decision, JobReport, ProjectReport, RunReport};
use gitlabjob_core::{IdError, JobId, ProjectId};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::service::{
    AdmissionController, Composer, Deduplicator, Eligibility, MetadataResolver, Notification,
    Notifier,
};

/// Whether a run may change anything on the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Delete duplicate pipelines, play admitted jobs, notify
    Execute,
    /// Gate jobs only: no deletions, no dispatch, no notifications
    DryRun,
    /// Prune duplicate pipelines and stop before discovery
    DedupOnly,
}

pub struct RunOrchestrator {
    client: GitlabClient,
    resolver: MetadataResolver,
    deduplicator: Deduplicator,
    admission: AdmissionController,
    notifier: Arc<dyn Notifier>,
    composer: Composer,
    dispatch_settle: Duration,
    mode: Mode,
}

impl RunOrchestrator {
    pub fn new(client: GitlabClient, config: &Config, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            resolver: MetadataResolver::new(client.clone())
                .with_tag_key(config.production_tag_key.clone()),
            deduplicator: Deduplicator::new(client.clone())
                .with_limits(config.dedup_max_passes, config.dedup_cooldown),
            admission: AdmissionController::new(client.clone()),
            client,
            notifier,
            composer: Composer::from_config(config),
            dispatch_settle: config.dispatch_settle,
            mode: Mode::Execute,
        }
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Raw project ids to visit: every project of the group, or the single
    /// configured project
    pub async fn targets(&self, config: &Config) -> Result<Vec<String>, ClientError> {
        match config.group_id {
            Some(group) => {
                let projects = self.client.list_projects_in_group(group).await?;
                info!("Group {}: {} project(s)", group, projects.len());
                Ok(projects)
            }
            None => Ok(vec![config.project_id.clone().unwrap_or_default()]),
        }
    }

    /// Visits every target in order
    ///
    /// Empty ids are skipped silently and unparseable ids are reported and
    /// skipped; neither touches the network. Only a transport failure
    /// aborts the run.
    pub async fn run(&self, targets: Vec<String>) -> Result<RunReport, ClientError> {
        let mut report = RunReport::start();

        for raw in targets {
            let project = match raw.parse::<ProjectId>() {
                Ok(project) => project,
                Err(IdError::Empty) => {
                    debug!("Skipping empty project id");
                    continue;
                }
                Err(e) => {
                    warn!("Skipping project '{}': {}", raw, e);
                    self.notify(self.composer.project_failure(&raw, &e.to_string()))
                        .await;
                    report.rejected.push((raw, e.to_string()));
                    continue;
                }
            };

            report.projects.push(self.run_project(project).await?);
        }

        Ok(report.finish())
    }

    pub async fn run_project(&self, project: ProjectId) -> Result<ProjectReport, ClientError> {
        info!("===== Project {}", project);
        let mut report = ProjectReport::new(project);

        if self.mode != Mode::DryRun {
            match self.deduplicator.deduplicate(project).await {
                Ok(dedup) => {
                    if dedup.is_notable() {
                        let name = self.resolver.project_name(project).await?;
                        self.notify(self.composer.dedup(project, name.as_deref(), &dedup))
                            .await;
                    }
                    report.dedup = Some(dedup);
                }
                Err(e) if e.is_transport() => return Err(e),
                Err(e) => {
                    return Ok(self
                        .abandon(report, format!("pipeline deduplication failed: {}", e))
                        .await);
                }
            }
        }

        if self.mode == Mode::DedupOnly {
            return Ok(report);
        }

        let jobs = match self.discover(project).await {
            Ok(jobs) => jobs,
            Err(e) if e.is_transport() => return Err(e),
            Err(e) => {
                return Ok(self
                    .abandon(report, format!("job discovery failed: {}", e))
                    .await);
            }
        };
        info!("Project {}: {} manual job(s)", project, jobs.len());

        for job in jobs {
            let job_report = self.process_job(project, job).await?;
            info!("Job {}: {}", job, job_report.decision);

            if self.mode == Mode::Execute {
                self.notify(self.composer.job(&job_report)).await;
            }
            report.jobs.push(job_report);
        }

        Ok(report)
    }

    /// Manual jobs of a project, each id once, ascending
    async fn discover(&self, project: ProjectId) -> Result<Vec<JobId>, ClientError> {
        let ids = self.client.list_jobs(project, &JobFilter::manual()).await?;
        let unique: BTreeSet<JobId> = ids.into_iter().collect();
        Ok(unique.into_iter().collect())
    }

    async fn process_job(&self, project: ProjectId, job: JobId) -> Result<JobReport, ClientError> {
        let metadata = self.resolver.resolve(project, Some(job)).await?;

        let decision = match &metadata {
            MetadataOutcome::LookupFailure {
                description,
                status,
            } => Decision::NotEvaluated {
                reason: format!("{} (status {})", description, status),
            },
            MetadataOutcome::Resolved(resolved) => {
                match self.admission.is_eligible(resolved).await {
                    Ok(Eligibility::Eligible) => self.dispatch(project, job).await?,
                    Ok(Eligibility::Ineligible(reason)) => Decision::Ineligible { reason },
                    Err(e) if e.is_transport() => return Err(e),
                    Err(e) => Decision::NotEvaluated {
                        reason: format!("tag lookup failed: {}", e),
                    },
                }
            }
        };

        Ok(JobReport {
            job_id: job,
            metadata,
            decision,
        })
    }

    async fn dispatch(&self, project: ProjectId, job: JobId) -> Result<Decision, ClientError> {
        if self.mode == Mode::DryRun {
            return Ok(Decision::Admitted);
        }

        info!("Playing job {}", job);
        let status = self.client.play_job(project, job).await?;
        if status != 200 {
            warn!("Job {}: play answered {}", job, status);
        }

        tokio::time::sleep(self.dispatch_settle).await;
        Ok(Decision::Dispatched { status })
    }

    async fn abandon(&self, mut report: ProjectReport, reason: String) -> ProjectReport {
        error!("Project {}: {}", report.project_id, reason);
        if self.mode != Mode::DryRun {
            self.notify(
                self.composer
                    .project_failure(&report.project_id.to_string(), &reason),
            )
            .await;
        }
        report.failure = Some(reason);
        report
    }

    async fn notify(&self, notification: Notification) {
        if let Err(e) = self.notifier.notify(&notification).await {
            warn!("Failed to send '{}': {:#}", notification.subject, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::notifier::testing::RecordingNotifier;
    use gitlabjob_client::mock::MockGateway;
    use gitlabjob_client::{ApiResponse, Method};
    use gitlabjob_core::GroupId;
    use serde_json::json;

    const MANUAL_JOBS: &str =
        "/projects/5/jobs?pagination=keyset&per_page=100&order_by=id&sort=asc&scope=manual";
    const MANUAL_PIPELINES: &str = "/projects/5/pipelines?order_by=id&sort=asc&status=manual";

    fn config() -> Config {
        let mut config = Config::new(
            "https://gitlab.example.com".to_string(),
            "glpat-123".to_string(),
        );
        config.project_id = Some("5".to_string());
        config.notify_to = Some("ops@example.com".to_string());
        config.dedup_cooldown = Duration::ZERO;
        config.dispatch_settle = Duration::ZERO;
        config
    }

    fn orchestrator(mock: &Arc<MockGateway>) -> (Arc<RecordingNotifier>, RunOrchestrator) {
        let notifier = Arc::new(RecordingNotifier::default());
        let orchestrator =
            RunOrchestrator::new(GitlabClient::new(mock.clone()), &config(), notifier.clone());
        (notifier, orchestrator)
    }

    /// Project 5 with one pending pipeline and manual job 42, whose pipeline
    /// asks for `tag` from source project 77
    fn route_project(mock: &MockGateway, tag: &str) {
        mock.on_get(MANUAL_JOBS, json!([{"id": 42, "status": "manual"}]));
        route_job(mock, tag);
    }

    /// Everything but the job listing
    fn route_job(mock: &MockGateway, tag: &str) {
        mock.on_get(MANUAL_PIPELINES, json!([{"id": 9, "status": "manual"}]));
        mock.on_get(
            "/projects/5/jobs/42",
            json!({"id": 42, "status": "manual", "web_url": "https://gitlab/j/42", "pipeline": {"id": 9}}),
        );
        mock.on_get(
            "/projects/5/pipelines/9/variables",
            json!([
                {"key": "source_id", "value": "77"},
                {"key": "PROD_TAG", "value": tag},
                {"key": "trigger_email", "value": "dev@example.com"}
            ]),
        );
        mock.on_get("/projects/5", json!({"id": 5, "name": "deployer"}));
        mock.on_get(
            &format!("/projects/77/repository/tags?order_by=updated&per_page=100&search={}", tag),
            json!([{"name": "v1.0"}, {"name": "PROD-1.0"}]),
        );
        mock.on(
            Method::POST,
            "/projects/5/jobs/42/play",
            ApiResponse::json_body(200, &json!({"id": 42, "status": "pending"})),
        );
    }

    #[tokio::test]
    async fn test_eligible_job_is_played() {
        let mock = Arc::new(MockGateway::new());
        route_project(&mock, "PROD-1.0");
        let (notifier, orchestrator) = orchestrator(&mock);

        let report = orchestrator.run(vec!["5".to_string()]).await.unwrap();

        assert_eq!(report.outcomes().get(&JobId(42)), Some(&200));
        assert_eq!(mock.call_count(Method::POST, "/projects/5/jobs/42/play"), 1);

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].recipients,
            vec!["ops@example.com".to_string(), "dev@example.com".to_string()]
        );
        assert!(sent[0].body.contains("inicio: OK"));
    }

    #[tokio::test]
    async fn test_ineligible_job_is_reported_not_played() {
        let mock = Arc::new(MockGateway::new());
        route_project(&mock, "PROD-2.0");
        let (notifier, orchestrator) = orchestrator(&mock);

        let report = orchestrator.run(vec!["5".to_string()]).await.unwrap();

        assert!(report.outcomes().is_empty());
        assert_eq!(mock.call_count(Method::POST, "/projects/5/jobs/42/play"), 0);
        assert_eq!(
            report.projects[0].jobs[0].decision,
            Decision::Ineligible {
                reason: "tag `PROD-2.0` not found in source project `77`".to_string()
            }
        );
        assert!(notifier.sent()[0].body.contains("not run: tag `PROD-2.0`"));
    }

    #[tokio::test]
    async fn test_jobs_are_processed_once_in_order() {
        let mock = Arc::new(MockGateway::new());
        route_job(&mock, "PROD-1.0");
        // Job 42 shows up on both pages; 41 is only on page 2
        mock.on_get_paged(MANUAL_JOBS, json!([{"id": 42, "status": "manual"}]), 2);
        mock.on_get(
            &format!("{}&page=2", MANUAL_JOBS),
            json!([{"id": 42, "status": "manual"}, {"id": 41, "status": "manual"}]),
        );
        let (_, orchestrator) = orchestrator(&mock);

        let project = orchestrator.run_project(ProjectId(5)).await.unwrap();

        let ids: Vec<JobId> = project.jobs.iter().map(|j| j.job_id).collect();
        assert_eq!(ids, vec![JobId(41), JobId(42)]);
        // Job 41 is unknown to the mock: reported, not fatal
        assert!(matches!(
            project.jobs[0].decision,
            Decision::NotEvaluated { .. }
        ));
    }

    #[tokio::test]
    async fn test_lookup_failure_is_reported() {
        let mock = Arc::new(MockGateway::new());
        mock.on_get(MANUAL_PIPELINES, json!([]));
        mock.on_get(MANUAL_JOBS, json!([{"id": 42, "status": "manual"}]));
        let (notifier, orchestrator) = orchestrator(&mock);

        let report = orchestrator.run(vec!["5".to_string()]).await.unwrap();

        assert_eq!(
            report.projects[0].jobs[0].decision,
            Decision::NotEvaluated {
                reason: "could not fetch job information (status 404)".to_string()
            }
        );
        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].body.contains("error: could not fetch job information"));
    }

    #[tokio::test]
    async fn test_dedup_deletions_are_notified() {
        let mock = Arc::new(MockGateway::new());
        mock.on_get(
            MANUAL_PIPELINES,
            json!([{"id": 10, "status": "manual"}, {"id": 11, "status": "manual"}]),
        );
        mock.on_get(MANUAL_PIPELINES, json!([{"id": 11, "status": "manual"}]));
        mock.on(
            Method::DELETE,
            "/projects/5/pipelines/10",
            ApiResponse::new(204, ""),
        );
        mock.on_get(MANUAL_JOBS, json!([]));
        mock.on_get("/projects/5", json!({"id": 5, "name": "deployer"}));
        let (notifier, orchestrator) = orchestrator(&mock);

        let report = orchestrator.run(vec!["5".to_string()]).await.unwrap();

        let dedup = report.projects[0].dedup.as_ref().unwrap();
        assert_eq!(dedup.deleted.len(), 1);

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "[GitlabJob] Pipelines removed from deployer (5)");
        assert!(sent[0].body.contains("pipeline 10 deleted (status 204)"));
    }

    #[tokio::test]
    async fn test_empty_and_invalid_ids_are_skipped() {
        let mock = Arc::new(MockGateway::new());
        route_project(&mock, "PROD-1.0");
        let (notifier, orchestrator) = orchestrator(&mock);

        let report = orchestrator
            .run(vec![
                String::new(),
                "group/project".to_string(),
                "5".to_string(),
            ])
            .await
            .unwrap();

        assert_eq!(report.projects.len(), 1);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].0, "group/project");
        // No request mentions anything but project 5 and its source project
        assert!(
            mock.calls()
                .iter()
                .all(|c| c.path.starts_with("/projects/5") || c.path.starts_with("/projects/77"))
        );
        assert_eq!(notifier.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_api_failure_skips_project_only() {
        let mock = Arc::new(MockGateway::new());
        route_project(&mock, "PROD-1.0");
        // Project 6 has no routes: pipeline listing answers 404
        let (notifier, orchestrator) = orchestrator(&mock);

        let report = orchestrator
            .run(vec!["6".to_string(), "5".to_string()])
            .await
            .unwrap();

        assert_eq!(report.projects.len(), 2);
        assert!(report.projects[0].failure.is_some());
        assert_eq!(report.outcomes().get(&JobId(42)), Some(&200));
        assert!(notifier.sent()[0].subject.contains("Project 6 skipped"));
    }

    #[tokio::test]
    async fn test_transport_failure_aborts_run() {
        let mock = Arc::new(MockGateway::new());
        route_job(&mock, "PROD-1.0");
        mock.fail(Method::GET, MANUAL_JOBS, "connection refused");
        let (_, orchestrator) = orchestrator(&mock);

        let err = orchestrator.run(vec!["5".to_string()]).await.unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_dry_run_changes_nothing() {
        let mock = Arc::new(MockGateway::new());
        route_project(&mock, "PROD-1.0");
        let (notifier, orchestrator) = orchestrator(&mock);
        let orchestrator = orchestrator.with_mode(Mode::DryRun);

        let report = orchestrator.run(vec!["5".to_string()]).await.unwrap();

        assert_eq!(report.projects[0].jobs[0].decision, Decision::Admitted);
        assert!(report.projects[0].dedup.is_none());
        assert!(mock.paths(Method::POST).is_empty());
        assert!(mock.paths(Method::DELETE).is_empty());
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_dedup_only_stops_before_discovery() {
        let mock = Arc::new(MockGateway::new());
        route_project(&mock, "PROD-1.0");
        let (_, orchestrator) = orchestrator(&mock);
        let orchestrator = orchestrator.with_mode(Mode::DedupOnly);

        let project = orchestrator.run_project(ProjectId(5)).await.unwrap();

        assert!(project.dedup.unwrap().converged);
        assert!(project.jobs.is_empty());
        assert_eq!(mock.call_count(Method::GET, MANUAL_JOBS), 0);
    }

    #[tokio::test]
    async fn test_targets_from_group() {
        let mock = Arc::new(MockGateway::new());
        mock.on_get(
            "/groups/10/projects?pagination=keyset&per_page=100&order_by=id&sort=asc",
            json!([{"id": 5}, {"id": null}]),
        );
        let (_, orchestrator) = orchestrator(&mock);

        let mut config = config();
        config.group_id = Some(GroupId(10));
        let targets = orchestrator.targets(&config).await.unwrap();
        assert_eq!(targets, vec!["5".to_string(), String::new()]);

        config.group_id = None;
        let targets = orchestrator.targets(&config).await.unwrap();
        assert_eq!(targets, vec!["5".to_string()]);
    }
}
