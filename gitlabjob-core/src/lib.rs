//! GitlabJob Core
//!
//! Core types shared by the GitlabJob client and runner.
//!
//! This crate contains:
//! - Domain types: identifiers, job filters, job metadata and run reports
//! - DTOs: the GitLab REST records the client decodes

pub mod domain;
pub mod dto;

pub use domain::ids::{GroupId, IdError, JobId, PipelineId, ProjectId};
