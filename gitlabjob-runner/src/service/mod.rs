//! Service layer
//!
//! Services hold the run's business logic on top of the GitLab client:
//! metadata resolution, pipeline deduplication, admission control, and
//! notification delivery.

pub mod admission;
pub mod deduplicator;
pub mod metadata;
pub mod notifier;
pub mod smtp;

pub use admission::{AdmissionController, Eligibility};
pub use deduplicator::Deduplicator;
pub use metadata::MetadataResolver;
pub use notifier::{Composer, LogNotifier, Notification, Notifier};
pub use smtp::SmtpNotifier;
