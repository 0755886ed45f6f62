//! Error types for phylodrop-ingest
//!
//! Only two conditions abort an ingestion run; everything recoverable is
//! collected as a [`Diagnostic`](crate::diagnostics::Diagnostic) on the
//! result instead of propagating as an error.

use thiserror::Error;

use crate::diagnostics::Diagnostic;
use crate::newick::NewickError;

/// Fatal ingestion failure: the only errors surfaced to the user as a
/// failure notification. Both carry the diagnostics gathered before the
/// run died, so the caller can still explain what happened per file.
#[derive(Debug, Error)]
pub enum IngestError {
    /// None of the dropped files produced a dataset
    #[error("none of the dropped files produced a dataset")]
    NoDatasets { diagnostics: Vec<Diagnostic> },

    /// The narrative's opening slide references only missing datasets,
    /// leaving no usable starting view
    #[error("the narrative's opening slide references no available dataset (wanted {wanted:?})")]
    NoStartingDataset {
        wanted: Vec<String>,
        diagnostics: Vec<Diagnostic>,
    },
}

impl IngestError {
    /// Diagnostics gathered before the run failed.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            IngestError::NoDatasets { diagnostics }
            | IngestError::NoStartingDataset { diagnostics, .. } => diagnostics,
        }
    }
}

impl From<NewickError> for phylodrop_common::Error {
    fn from(err: NewickError) -> Self {
        phylodrop_common::Error::InvalidInput(err.to_string())
    }
}
