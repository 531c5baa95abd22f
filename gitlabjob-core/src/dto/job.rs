use serde::{Deserialize, Serialize};

use crate::domain::ids::{JobId, PipelineId};

/// `GET /projects/:id/jobs/:job_id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub web_url: Option<String>,
    pub pipeline: PipelineRef,
}

/// Pipeline summary embedded in a job record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRef {
    pub id: PipelineId,
}
