//! GitlabJob HTTP Client
//!
//! A small, typed client for the parts of the GitLab REST API the runner
//! needs: job and pipeline listings, pipeline variables, project lookups,
//! tags, and the job/pipeline state transitions.
//!
//! All traffic goes through a [`Gateway`], so the same client runs against
//! GitLab ([`HttpGateway`]) or against canned responses in tests.
//!
//! # Example
//!
//! ```no_run
//! use gitlabjob_client::GitlabClient;
//! use gitlabjob_core::ProjectId;
//! use gitlabjob_core::domain::filter::JobFilter;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = GitlabClient::http("https://gitlab.example.com", "glpat-token");
//!
//!     let jobs = client.list_jobs(ProjectId(306), &JobFilter::manual()).await?;
//!     println!("{} manual job(s)", jobs.len());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod gateway;
mod jobs;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
mod pipelines;
mod projects;
mod tags;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use gateway::{ApiRequest, ApiResponse, Gateway, HttpGateway};
pub use reqwest::Method;

use gitlabjob_core::IdError;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

/// Jobs and group projects are listed 100 at a time
pub const PAGE_SIZE: u32 = 100;

/// Client for the GitLab REST API
///
/// Endpoints are grouped by resource:
/// - Jobs: list (paged), get, play, cancel
/// - Pipelines: list, variables, delete
/// - Projects: get, list group projects (paged)
/// - Tags: list
#[derive(Clone)]
pub struct GitlabClient {
    gateway: Arc<dyn Gateway>,
}

impl GitlabClient {
    /// Create a client on top of any gateway
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self { gateway }
    }

    /// Create a client talking HTTP to a GitLab instance
    ///
    /// # Example
    /// ```
    /// use gitlabjob_client::GitlabClient;
    ///
    /// let client = GitlabClient::http("https://gitlab.example.com", "glpat-token");
    /// ```
    pub fn http(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self::new(Arc::new(HttpGateway::new(base_url, token)))
    }

    pub fn gateway(&self) -> &Arc<dyn Gateway> {
        &self.gateway
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    async fn send(&self, req: ApiRequest) -> Result<ApiResponse> {
        self.gateway.request(req).await
    }

    /// Check the status code and deserialize the body
    fn handle_response<T: DeserializeOwned>(response: &ApiResponse) -> Result<T> {
        if !response.is_success() {
            return Err(ClientError::api_error(
                response.status,
                response.body.clone(),
            ));
        }

        response.json()
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(ApiRequest::get(path)).await?;
        Self::handle_response(&response)
    }

    /// Fetch every page of a listing, in page order
    ///
    /// Page 1 is the initial response; pages 2..N are requested with
    /// `&page=N` appended, N being the total announced by page 1.
    async fn get_all_pages(&self, path: &str) -> Result<Vec<Value>> {
        let first = self.send(ApiRequest::get(path)).await?;
        let mut records: Vec<Value> = Self::handle_response(&first)?;
        let total_pages = first.total_pages();

        for page in 2..=total_pages {
            debug!("Fetching page {}/{} of {}", page, total_pages, path);
            let response = self
                .send(ApiRequest::get(format!("{}&page={}", path, page)))
                .await?;
            let page_records: Vec<Value> = Self::handle_response(&response)?;
            records.extend(page_records);
        }

        Ok(records)
    }
}

/// Reads a record's `id` as raw text, empty when missing or null
pub(crate) fn raw_id(record: &Value) -> String {
    match record.get("id") {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    }
}

/// Parses the `id` of every record, numeric or textual
///
/// Records whose id does not parse are logged and skipped.
pub(crate) fn ids_of<T>(records: Vec<&Value>, kind: &str) -> Vec<T>
where
    T: FromStr<Err = IdError>,
{
    records
        .into_iter()
        .filter_map(|record| match raw_id(record).parse::<T>() {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("Skipping {} record with unusable id ({}): {}", kind, e, record);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockGateway;
    use serde_json::json;

    #[tokio::test]
    async fn test_pages_are_merged_in_order() {
        let mock = Arc::new(MockGateway::new());
        mock.on_get_paged("/things?x=1", json!([{"id": 1}, {"id": 2}]), 3);
        mock.on_get("/things?x=1&page=2", json!([{"id": 3}]));
        mock.on_get("/things?x=1&page=3", json!([{"id": 4}, {"id": 5}]));

        let client = GitlabClient::new(mock.clone());
        let records = client.get_all_pages("/things?x=1").await.unwrap();

        let ids: Vec<String> = records.iter().map(raw_id).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);
        assert_eq!(mock.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_missing_page_header_means_single_page() {
        let mock = Arc::new(MockGateway::new());
        mock.on_get("/things?x=1", json!([{"id": 1}]));

        let client = GitlabClient::new(mock.clone());
        let records = client.get_all_pages("/things?x=1").await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(mock.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_error_status_becomes_api_error() {
        let mock = Arc::new(MockGateway::new());
        let client = GitlabClient::new(mock);

        let err = client.get_json::<Value>("/unknown").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_raw_id() {
        assert_eq!(raw_id(&json!({"id": 12})), "12");
        assert_eq!(raw_id(&json!({"id": "34"})), "34");
        assert_eq!(raw_id(&json!({"id": null})), "");
        assert_eq!(raw_id(&json!({})), "");
    }
}
