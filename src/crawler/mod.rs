//! Crawl orchestration
//!
//! The controller drives the paginated traversal; the ingestor handles one
//! listing at a time; the run context carries the counters that decide when
//! a run has gone bad enough to abort.

mod context;
mod controller;
mod ingest;

pub use context::RunContext;
pub use controller::Crawler;
pub use ingest::{listing_id, should_ingest, IngestOutcome, Ingestor};
