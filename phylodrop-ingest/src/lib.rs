//! # Phylodrop Ingest
//!
//! Converts files dropped onto the viewer into the typed in-memory
//! dataset and tree model the visualization state loader consumes:
//!
//! - Filename classification of dropped files
//! - Newick parsing and tree annotation
//! - Dataset/sidecar/narrative reconciliation, tolerant of per-file
//!   failure
//! - Orchestration into a single ingestion result

pub mod classify;
pub mod dataset;
pub mod diagnostics;
pub mod error;
pub mod newick;
pub mod services;
pub mod sources;

pub use error::IngestError;
pub use services::orchestrator::{IngestPipeline, Ingestion, InitialView};
pub use sources::DroppedFile;
