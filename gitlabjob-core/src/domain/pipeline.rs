//! Pipeline deduplication records

use serde::{Deserialize, Serialize};

use crate::domain::ids::PipelineId;

/// A pipeline deletion and the HTTP status the service answered with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deletion {
    pub pipeline_id: PipelineId,
    pub status: u16,
}

impl Deletion {
    /// Whether the service accepted the deletion
    pub fn succeeded(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// What one deduplication run did to a project's pending pipelines
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupReport {
    pub deleted: Vec<Deletion>,
    /// Number of delete-then-refetch passes performed
    pub passes: u32,
    /// False when the pass ceiling was hit with more than one pipeline left
    pub converged: bool,
    /// Pending pipelines observed after the last refetch
    pub remaining: Vec<PipelineId>,
}

impl DedupReport {
    /// Pipelines the service actually removed
    pub fn deleted_ids(&self) -> Vec<PipelineId> {
        self.deleted
            .iter()
            .filter(|d| d.succeeded())
            .map(|d| d.pipeline_id)
            .collect()
    }

    /// Deletions the service refused
    pub fn failed(&self) -> Vec<&Deletion> {
        self.deleted.iter().filter(|d| !d.succeeded()).collect()
    }

    /// Converged with every deletion accepted
    pub fn is_clean(&self) -> bool {
        self.converged && self.failed().is_empty()
    }

    /// Whether the operator should hear about this run
    pub fn is_notable(&self) -> bool {
        !self.deleted.is_empty() || !self.converged
    }

    pub fn summary(&self) -> String {
        let mut out = String::new();
        for deletion in &self.deleted {
            let outcome = if deletion.succeeded() {
                "deleted"
            } else {
                "NOT deleted"
            };
            out.push_str(&format!(
                "pipeline {} {} (status {})\n",
                deletion.pipeline_id, outcome, deletion.status
            ));
        }
        if !self.converged {
            let remaining: Vec<String> = self.remaining.iter().map(|p| p.to_string()).collect();
            out.push_str(&format!(
                "did not converge after {} pass(es); pending pipelines: {}\n",
                self.passes,
                remaining.join(", ")
            ));
        }
        out
    }
}
