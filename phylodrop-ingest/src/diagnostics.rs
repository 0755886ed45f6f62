//! Non-fatal ingestion findings
//!
//! Anything recoverable during ingestion is collected as a value rather
//! than propagated as an error: per-file failures, unmet references,
//! ignored files. A run logs one consolidated summary at the end;
//! findings marked user-facing additionally warrant a warning in the UI.

use std::fmt;

use serde::Serialize;
use uuid::Uuid;

/// One non-fatal finding from an ingestion run.
///
/// Serializes with a `type` tag so a UI can render findings directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum Diagnostic {
    /// A file whose read or parse failed; it was excluded without
    /// aborting its siblings
    FileDropped { name: String, reason: String },

    /// A sidecar with no matching main dataset
    SidecarWithoutDataset { name: String, expected_key: String },

    /// A later file deriving a dataset key that is already taken
    DuplicateDataset { name: String, key: String },

    /// A later sidecar for a slot that is already populated
    DuplicateSidecar { name: String, key: String },

    /// A narrative file beyond the first; only the first is used
    ExtraNarrative { name: String },

    /// A narrative slide referencing a dataset that was not dropped
    MissingNarrativeDataset { key: String },

    /// A slide whose dataset URL resolved to no key; the slide was
    /// skipped
    SlideWithoutDataset { position: usize, url: String },

    /// A dataset dropped because no narrative slide references it
    UnreferencedDataset { key: String },

    /// A file accepted by a later visualization step, not by ingestion
    DeferredFile { name: String },

    /// A file matching no classification rule
    UnrecognizedFile { name: String },

    /// More datasets dropped than the default view shows
    ExtraDatasets { shown: usize, provided: usize },
}

impl Diagnostic {
    /// Whether this finding warrants a user-facing warning in addition
    /// to the log entry.
    pub fn user_facing(&self) -> bool {
        matches!(
            self,
            Diagnostic::FileDropped { .. }
                | Diagnostic::SidecarWithoutDataset { .. }
                | Diagnostic::MissingNarrativeDataset { .. }
                | Diagnostic::DeferredFile { .. }
        )
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::FileDropped { name, reason } => {
                write!(f, "{name}: {reason}; the file was skipped")
            }
            Diagnostic::SidecarWithoutDataset { name, expected_key } => {
                write!(f, "{name}: no dataset with key {expected_key:?} to attach to")
            }
            Diagnostic::DuplicateDataset { name, key } => {
                write!(f, "{name}: dataset key {key:?} already taken by an earlier file")
            }
            Diagnostic::DuplicateSidecar { name, key } => {
                write!(f, "{name}: dataset {key:?} already has this sidecar")
            }
            Diagnostic::ExtraNarrative { name } => {
                write!(f, "{name}: only the first narrative file is used")
            }
            Diagnostic::MissingNarrativeDataset { key } => {
                write!(f, "narrative references dataset {key:?}, which was not dropped")
            }
            Diagnostic::SlideWithoutDataset { position, url } => {
                write!(f, "slide {position}: dataset URL {url:?} resolves to no key")
            }
            Diagnostic::UnreferencedDataset { key } => {
                write!(f, "dataset {key:?} is not referenced by the narrative")
            }
            Diagnostic::DeferredFile { name } => {
                write!(
                    f,
                    "{name}: drop this file onto the visualization once a dataset is showing"
                )
            }
            Diagnostic::UnrecognizedFile { name } => {
                write!(f, "{name}: unrecognized file type")
            }
            Diagnostic::ExtraDatasets { shown, provided } => {
                write!(f, "{provided} datasets dropped, showing the first {shown}")
            }
        }
    }
}

/// Log all findings of a run as one consolidated summary.
pub fn log_summary(session_id: Uuid, diagnostics: &[Diagnostic]) {
    if diagnostics.is_empty() {
        return;
    }
    let summary = diagnostics
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    let warnings = diagnostics.iter().filter(|d| d.user_facing()).count();
    tracing::warn!(
        session_id = %session_id,
        count = diagnostics.len(),
        user_facing = warnings,
        "Ingestion findings: {summary}"
    );
}
