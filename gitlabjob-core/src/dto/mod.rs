//! GitLab REST records
//!
//! Only the fields the runner reads are modelled; everything else in the
//! payload is ignored.

pub mod job;
pub mod pipeline;
pub mod project;
pub mod tag;
