//! Repository tag endpoints

use gitlabjob_core::ProjectId;
use gitlabjob_core::dto::tag::TagRecord;
use reqwest::Url;
use serde_json::Value;

use crate::error::{ClientError, Result};
use crate::{GitlabClient, PAGE_SIZE};

impl GitlabClient {
    /// List a project's tag names, most recently updated first, across every page
    ///
    /// The search is a substring match on GitLab's side, so a broad term can
    /// span several pages.
    ///
    /// # Arguments
    /// * `project` - The project owning the tags
    /// * `search` - Optional server-side search term
    pub async fn list_tags(&self, project: ProjectId, search: Option<&str>) -> Result<Vec<String>> {
        let mut path = format!(
            "/projects/{}/repository/tags?order_by=updated&per_page={}",
            project, PAGE_SIZE
        );
        if let Some(term) = search.filter(|t| !t.is_empty()) {
            path.push('&');
            path.push_str(&search_query(term));
        }

        let records = self.get_all_pages(&path).await?;
        let tags: Vec<TagRecord> = serde_json::from_value(Value::Array(records))
            .map_err(|e| ClientError::parse_error(200, e.to_string()))?;
        Ok(tags.into_iter().map(|t| t.name).collect())
    }
}

/// `search=<term>`, form-encoded
fn search_query(term: &str) -> String {
    Url::parse_with_params("http://localhost/", &[("search", term)])
        .ok()
        .and_then(|url| url.query().map(str::to_string))
        .unwrap_or_else(|| format!("search={}", term))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockGateway;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_list_tags() {
        let mock = Arc::new(MockGateway::new());
        mock.on_get(
            "/projects/77/repository/tags?order_by=updated&per_page=100",
            json!([{"name": "PROD-1.0"}, {"name": "v1.0"}]),
        );

        let client = GitlabClient::new(mock);
        let tags = client.list_tags(ProjectId(77), None).await.unwrap();

        assert_eq!(tags, vec!["PROD-1.0".to_string(), "v1.0".to_string()]);
    }

    #[tokio::test]
    async fn test_list_tags_with_search() {
        let mock = Arc::new(MockGateway::new());
        mock.on_get(
            "/projects/77/repository/tags?order_by=updated&per_page=100&search=PROD-1.0",
            json!([{"name": "PROD-1.0"}]),
        );

        let client = GitlabClient::new(mock);
        let tags = client
            .list_tags(ProjectId(77), Some("PROD-1.0"))
            .await
            .unwrap();

        assert_eq!(tags, vec!["PROD-1.0".to_string()]);
    }

    #[tokio::test]
    async fn test_list_tags_reads_every_page() {
        const SEARCH: &str = "/projects/77/repository/tags?order_by=updated&per_page=100&search=PROD-1.0";
        let newer: Vec<_> = (1..=100)
            .map(|n| json!({"name": format!("PROD-1.0.{}", n)}))
            .collect();

        let mock = Arc::new(MockGateway::new());
        mock.on_get_paged(SEARCH, json!(newer), 2);
        mock.on_get(&format!("{}&page=2", SEARCH), json!([{"name": "PROD-1.0"}]));

        let client = GitlabClient::new(mock.clone());
        let tags = client
            .list_tags(ProjectId(77), Some("PROD-1.0"))
            .await
            .unwrap();

        assert_eq!(tags.len(), 101);
        assert_eq!(tags.last().map(String::as_str), Some("PROD-1.0"));
        assert_eq!(mock.calls().len(), 2);
    }

    #[test]
    fn test_search_term_is_encoded() {
        assert_eq!(search_query("v1.0"), "search=v1.0");
        assert_eq!(search_query("^PROD 1"), "search=%5EPROD+1");
    }
}
