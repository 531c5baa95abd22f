//! Identifier types
//!
//! Every remote entity is addressed by a numeric id. Ids coming from
//! configuration or from loosely typed listings are parsed once, here, and
//! carried as newtypes afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Failure to turn raw text into an identifier
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    /// The input was empty (or only whitespace)
    #[error("empty identifier")]
    Empty,

    /// The input is not a numeric id
    #[error("invalid identifier: '{0}'")]
    InvalidIdentifier(String),
}

fn parse_numeric(raw: &str) -> Result<u64, IdError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(IdError::Empty);
    }

    trimmed
        .parse::<u64>()
        .map_err(|_| IdError::InvalidIdentifier(trimmed.to_string()))
}

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_numeric(s).map($name)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                $name(value)
            }
        }
    };
}

numeric_id!(
    /// A GitLab project
    ProjectId
);
numeric_id!(
    /// A GitLab group, used to enumerate projects
    GroupId
);
numeric_id!(
    /// A single CI job
    JobId
);
numeric_id!(
    /// A CI pipeline
    PipelineId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_numeric_id() {
        assert_eq!("306".parse::<ProjectId>(), Ok(ProjectId(306)));
        assert_eq!(" 42 ".parse::<JobId>(), Ok(JobId(42)));
    }

    #[test]
    fn test_parse_empty_id() {
        assert_eq!("".parse::<ProjectId>(), Err(IdError::Empty));
        assert_eq!("   ".parse::<GroupId>(), Err(IdError::Empty));
    }

    #[test]
    fn test_parse_invalid_id() {
        assert_eq!(
            "group/project".parse::<ProjectId>(),
            Err(IdError::InvalidIdentifier("group/project".to_string()))
        );
        assert!("-1".parse::<PipelineId>().is_err());
    }

    #[test]
    fn test_id_serde_is_transparent() {
        let id: JobId = serde_json::from_str("7").unwrap();
        assert_eq!(id, JobId(7));
        assert_eq!(serde_json::to_string(&PipelineId(12)).unwrap(), "12");
    }
}
