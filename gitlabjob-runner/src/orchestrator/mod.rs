//! Run orchestration
//!
//! Walks the configured projects one at a time: prune duplicate pipelines,
//! discover manual jobs, gate each one, dispatch the admitted ones and
//! report every outcome.

mod run;

pub use run::{Mode, RunOrchestrator};
