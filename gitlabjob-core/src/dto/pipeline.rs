use serde::{Deserialize, Serialize};

use crate::domain::ids::PipelineId;

/// Entry of `GET /projects/:id/pipelines`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRecord {
    pub id: PipelineId,
    #[serde(default)]
    pub status: Option<String>,
}

/// Entry of `GET /projects/:id/pipelines/:pipeline_id/variables`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineVariable {
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub variable_type: Option<String>,
}
