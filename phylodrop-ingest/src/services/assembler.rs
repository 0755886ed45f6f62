//! Dataset assembly from classified files
//!
//! Phase order is load-bearing: every main/Newick read is joined and its
//! dataset inserted before sidecar matching begins, because sidecar
//! resolution looks up existing keys. Sidecar payload reads are spawned
//! and left pending for the consumer to await. A file that fails to
//! read or parse is dropped with a diagnostic; its siblings continue.

use chrono::Utc;
use futures::future::join_all;
use serde_json::Value;
use uuid::Uuid;

use phylodrop_common::model::DatasetDoc;

use crate::classify::{ClassifiedFile, FileClass};
use crate::dataset::{shared_json, Dataset, DatasetSet, SharedJson, SidecarError};
use crate::diagnostics::Diagnostic;
use crate::newick::dataset_from_newick;
use crate::sources::Decompressor;

/// The narrative file selected during assembly, read but not yet parsed.
#[derive(Debug, Clone)]
pub struct NarrativeText {
    pub name: String,
    pub text: String,
}

/// Everything assembly produced for one run.
pub struct Assembly {
    pub datasets: DatasetSet,
    pub narrative: Option<NarrativeText>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Run the assembly phases over one batch of classified files.
pub async fn assemble(
    files: Vec<ClassifiedFile>,
    decompressor: Option<Decompressor>,
    session_id: Uuid,
) -> Assembly {
    let mut mains = Vec::new();
    let mut sidecars = Vec::new();
    let mut narratives = Vec::new();
    let mut deferred = Vec::new();
    let mut unrecognized = Vec::new();

    for file in files {
        match file.class {
            FileClass::Main | FileClass::Newick => mains.push(file),
            FileClass::Sidecar(_) => sidecars.push(file),
            FileClass::Narrative => narratives.push(file),
            FileClass::ForeignCollaborator => deferred.push(file),
            FileClass::Unclassified => unrecognized.push(file),
        }
    }

    let mut datasets = DatasetSet::new();
    let mut diagnostics = Vec::new();

    // Phase 1: read and parse every main/Newick file concurrently, then
    // join before touching sidecars. join_all keeps drop order, so
    // insertion order does not depend on read completion order.
    tracing::info!(
        session_id = %session_id,
        files = mains.len(),
        "Phase 1: reading dataset files"
    );
    let reads = mains.into_iter().map(|file| {
        let decompressor = decompressor.clone();
        async move {
            let outcome = build_dataset(&file, decompressor.as_ref()).await;
            (file, outcome)
        }
    });
    for (file, outcome) in join_all(reads).await {
        match outcome {
            Ok(ds) => {
                tracing::debug!(
                    session_id = %session_id,
                    file = %file.file.name(),
                    key = %ds.key,
                    "Dataset ready"
                );
                if let Err(rejected) = datasets.insert(ds) {
                    tracing::warn!(
                        session_id = %session_id,
                        file = %file.file.name(),
                        key = %rejected.key,
                        "Dataset key already taken"
                    );
                    diagnostics.push(Diagnostic::DuplicateDataset {
                        name: file.file.name().to_string(),
                        key: rejected.key,
                    });
                }
            }
            Err(reason) => {
                tracing::error!(
                    session_id = %session_id,
                    file = %file.file.name(),
                    %reason,
                    "Skipping dataset file"
                );
                diagnostics.push(Diagnostic::FileDropped {
                    name: file.file.name().to_string(),
                    reason,
                });
            }
        }
    }

    // Phase 2: match sidecars against the now-complete key map. Matched
    // payloads load on their own tasks; nothing here awaits them.
    tracing::info!(
        session_id = %session_id,
        files = sidecars.len(),
        "Phase 2: matching sidecars"
    );
    for file in sidecars {
        let FileClass::Sidecar(kind) = file.class else { continue };
        let Some(key) = file.dataset_key.clone() else { continue };
        let name = file.file.name().to_string();
        match datasets.get_mut(&key) {
            Some(dataset) => {
                let pending = spawn_sidecar_read(file, decompressor.clone());
                if !dataset.sidecars.insert(kind, pending) {
                    diagnostics.push(Diagnostic::DuplicateSidecar { name, key });
                }
            }
            None => {
                tracing::warn!(
                    session_id = %session_id,
                    file = %name,
                    expected_key = %key,
                    "Sidecar without dataset"
                );
                diagnostics.push(Diagnostic::SidecarWithoutDataset {
                    name,
                    expected_key: key,
                });
            }
        }
    }

    // Phase 3: only the first narrative file is read.
    let mut narrative = None;
    let mut saw_narrative = false;
    for file in narratives {
        if saw_narrative {
            diagnostics.push(Diagnostic::ExtraNarrative {
                name: file.file.name().to_string(),
            });
            continue;
        }
        saw_narrative = true;
        let name = file.file.name().to_string();
        match read_payload(&file, decompressor.as_ref()).await {
            Ok(text) => {
                tracing::info!(session_id = %session_id, file = %name, "Phase 3: narrative found");
                narrative = Some(NarrativeText { name, text });
            }
            Err(reason) => {
                tracing::error!(
                    session_id = %session_id,
                    file = %name,
                    %reason,
                    "Skipping narrative file"
                );
                diagnostics.push(Diagnostic::FileDropped { name, reason });
            }
        }
    }

    // Phases 4 and 5: files we recognize but do not consume, and files
    // we do not recognize at all.
    for file in deferred {
        tracing::warn!(
            session_id = %session_id,
            file = %file.file.name(),
            "File belongs to a later visualization step"
        );
        diagnostics.push(Diagnostic::DeferredFile {
            name: file.file.name().to_string(),
        });
    }
    for file in unrecognized {
        diagnostics.push(Diagnostic::UnrecognizedFile {
            name: file.file.name().to_string(),
        });
    }

    Assembly { datasets, narrative, diagnostics }
}

/// Read a classified file to text, applying the external decompression
/// transform when the name was flagged. The error is the reason for a
/// per-file diagnostic, never a run failure.
pub(crate) async fn read_payload(
    file: &ClassifiedFile,
    decompressor: Option<&Decompressor>,
) -> Result<String, String> {
    let bytes = file
        .file
        .bytes()
        .await
        .map_err(|err| format!("read failed: {err}"))?;
    let bytes = if file.needs_decompression {
        match decompressor {
            Some(inflate) => inflate(bytes).map_err(|err| format!("decompression failed: {err}"))?,
            None => {
                return Err("compressed file, but no decompression transform is configured"
                    .to_string())
            }
        }
    } else {
        bytes
    };
    String::from_utf8(bytes).map_err(|_| "content is not valid UTF-8".to_string())
}

async fn build_dataset(
    file: &ClassifiedFile,
    decompressor: Option<&Decompressor>,
) -> Result<Dataset, String> {
    let key = file
        .dataset_key
        .clone()
        .ok_or_else(|| "no dataset key derived".to_string())?;
    let text = read_payload(file, decompressor).await?;
    let doc = match file.class {
        FileClass::Newick => dataset_from_newick(file.file.name(), &text, Utc::now())
            .map_err(|err| err.to_string())?,
        _ => serde_json::from_str::<DatasetDoc>(&text)
            .map_err(|err| format!("not a dataset document: {err}"))?,
    };
    Ok(Dataset::new(key, file.file.name().to_string(), doc))
}

/// Spawn the deferred read/parse of a matched sidecar.
fn spawn_sidecar_read(file: ClassifiedFile, decompressor: Option<Decompressor>) -> SharedJson {
    let name = file.file.name().to_string();
    let task_name = name.clone();
    shared_json(name, async move {
        let text = read_payload(&file, decompressor.as_ref())
            .await
            .map_err(|reason| SidecarError { name: task_name.clone(), reason })?;
        serde_json::from_str::<Value>(&text).map_err(|err| SidecarError {
            name: task_name,
            reason: format!("invalid JSON: {err}"),
        })
    })
}
