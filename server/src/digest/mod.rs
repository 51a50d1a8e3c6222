//! Daily digest pipeline: partition unsummarized emails into batches,
//! summarize each batch, categorize the day's emails by topic, merge batch
//! summaries into one digest, persist it once per calendar day, and email it
//! to the configured recipient.

pub mod batch;
pub mod categorize;
pub mod distribution;
pub mod merge;
pub mod orchestrator;
pub mod stores;

pub use distribution::DigestDistributor;
pub use orchestrator::{DigestOrchestrator, DigestSettings};
