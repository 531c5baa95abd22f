//! Job filter
//!
//! A single key/value equality predicate applied to listing records.

use serde_json::Value;

/// Key GitLab understands as a server-side scope
pub const STATUS_KEY: &str = "status";

/// Predicate applied to the merged records of a listing
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum JobFilter {
    /// Keep every record
    #[default]
    None,
    /// Keep records whose `status` equals the value
    StatusEquals(String),
    /// Keep records whose top-level `key` equals the value
    FieldEquals(String, String),
}

impl JobFilter {
    /// Shorthand for the filter the runner uses to find pending jobs
    pub fn manual() -> Self {
        JobFilter::StatusEquals("manual".to_string())
    }

    /// Value that can be pushed to the server as a status scope, if any
    pub fn server_scope(&self) -> Option<&str> {
        match self {
            JobFilter::None => None,
            JobFilter::StatusEquals(value) => Some(value),
            JobFilter::FieldEquals(key, value) if key == STATUS_KEY => Some(value),
            JobFilter::FieldEquals(..) => None,
        }
    }

    /// Evaluates the predicate against a JSON record
    ///
    /// Strings compare by content, numbers and booleans by their textual
    /// rendering. A missing or null field never matches.
    pub fn matches(&self, record: &Value) -> bool {
        let (key, expected) = match self {
            JobFilter::None => return true,
            JobFilter::StatusEquals(value) => (STATUS_KEY, value.as_str()),
            JobFilter::FieldEquals(key, value) => (key.as_str(), value.as_str()),
        };

        match record.get(key) {
            Some(Value::String(actual)) => actual == expected,
            Some(Value::Number(actual)) => actual.to_string() == expected,
            Some(Value::Bool(actual)) => actual.to_string() == expected,
            _ => false,
        }
    }

    /// Keeps the records that match, preserving order
    pub fn apply<'a>(&self, records: &'a [Value]) -> Vec<&'a Value> {
        records.iter().filter(|r| self.matches(r)).collect()
    }
}
