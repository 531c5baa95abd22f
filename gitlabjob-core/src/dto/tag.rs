use serde::{Deserialize, Serialize};

/// Entry of `GET /projects/:id/repository/tags`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRecord {
    pub name: String,
}
