// src/pipeline/mod.rs

//! Release pipeline.
//!
//! - `novelty`: decide whether a scraped chapter is new
//! - `ingest`: admit new chapters into the release store
//! - `fanout`: deliver notifications for admitted releases
//! - `orchestrator`: run the above on a fixed interval

pub mod fanout;
pub mod ingest;
pub mod novelty;
pub mod orchestrator;

pub use fanout::{DeliveryOutcome, FanOut, NotifyOutcome, notify_pending};
pub use ingest::{IngestOutcome, Ingested, Ingestor};
pub use novelty::is_newer;
pub use orchestrator::{CycleReport, LoopState, Orchestrator, shutdown_signal};
