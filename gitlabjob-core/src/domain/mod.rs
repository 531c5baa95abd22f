pub mod filter;
pub mod ids;
pub mod job;
pub mod pipeline;
pub mod report;
