//! Ingestion orchestration
//!
//! Sequences classification → dataset assembly → narrative linking into
//! one ingestion result and selects the initial view for the downstream
//! state loader. Fatal failure is reported as an error, never as a
//! silent partial success showing nothing.

use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use phylodrop_common::model::{DatasetDoc, NarrativeSlide, SlideDatasets};

use crate::classify::{classify_all, default_foreign_predicate};
use crate::dataset::{DatasetSet, SidecarSet};
use crate::diagnostics::{self, Diagnostic};
use crate::error::IngestError;
use crate::services::assembler::{assemble, Assembly};
use crate::services::narrative::{
    link_narrative, resolve_dataset_url, resolve_slides, HeadingSlideExtractor, SlideExtractor,
};
use crate::sources::{Decompressor, DroppedFile};

/// How many datasets the default (non-narrative) view shows.
const DEFAULT_VIEW_DATASETS: usize = 2;

/// Names of the displayed tree(s), for the consumer's state handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNames {
    pub main: String,
    pub second: Option<String>,
}

/// The initial view handed to the state-loading collaborator: primary
/// tree/meta document, optional side-by-side second tree, and the
/// primary dataset's pending sidecar payloads.
#[derive(Debug, Clone)]
pub struct InitialView {
    pub main: DatasetDoc,
    pub second_tree: Option<Value>,
    pub sidecars: SidecarSet,
    pub tree_names: TreeNames,
}

/// Result of one ingestion run. Read-only once handed over; only the
/// sidecar futures still resolve in the background.
#[derive(Debug)]
pub struct Ingestion {
    pub datasets: DatasetSet,
    pub narrative: Option<Vec<NarrativeSlide>>,
    pub diagnostics: Vec<Diagnostic>,
    pub view: InitialView,
}

/// The ingestion pipeline with its delegated seams. Construct once and
/// reuse for any number of drops; runs never share state.
#[derive(Clone)]
pub struct IngestPipeline {
    foreign_predicate: Arc<dyn Fn(&str) -> bool + Send + Sync>,
    slide_extractor: Arc<dyn SlideExtractor>,
    url_resolver: Arc<dyn Fn(&str) -> Option<SlideDatasets> + Send + Sync>,
    decompressor: Option<Decompressor>,
}

impl Default for IngestPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestPipeline {
    pub fn new() -> Self {
        Self {
            foreign_predicate: Arc::new(default_foreign_predicate),
            slide_extractor: Arc::new(HeadingSlideExtractor),
            url_resolver: Arc::new(resolve_dataset_url),
            decompressor: None,
        }
    }

    /// Inject the external decompression transform for content flagged
    /// during classification. Without one, compressed files fail
    /// per-file.
    pub fn with_decompressor(mut self, decompressor: Decompressor) -> Self {
        self.decompressor = Some(decompressor);
        self
    }

    /// Replace the predicate for files a later visualization step
    /// accepts.
    pub fn with_foreign_predicate(
        mut self,
        predicate: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.foreign_predicate = Arc::new(predicate);
        self
    }

    /// Replace the narrative slide extractor.
    pub fn with_slide_extractor(mut self, extractor: impl SlideExtractor + 'static) -> Self {
        self.slide_extractor = Arc::new(extractor);
        self
    }

    /// Replace the dataset URL → key resolver.
    pub fn with_url_resolver(
        mut self,
        resolver: impl Fn(&str) -> Option<SlideDatasets> + Send + Sync + 'static,
    ) -> Self {
        self.url_resolver = Arc::new(resolver);
        self
    }

    /// Ingest one batch of dropped files.
    ///
    /// Per-file failures never abort the run; the two fatal conditions
    /// are an empty dataset set and a narrative whose opening slide has
    /// no available dataset.
    pub async fn ingest(&self, files: Vec<DroppedFile>) -> Result<Ingestion, IngestError> {
        let session_id = Uuid::new_v4();
        tracing::info!(
            session_id = %session_id,
            files = files.len(),
            "Starting ingestion"
        );

        let classified = classify_all(files, &*self.foreign_predicate);
        let Assembly {
            mut datasets,
            narrative,
            mut diagnostics,
        } = assemble(classified, self.decompressor.clone(), session_id).await;

        if datasets.is_empty() {
            diagnostics::log_summary(session_id, &diagnostics);
            tracing::error!(session_id = %session_id, "No dataset could be built");
            return Err(IngestError::NoDatasets { diagnostics });
        }

        let mut slides = None;
        if let Some(text) = narrative {
            match self.slide_extractor.extract(&text.text) {
                Ok(raw) => {
                    let (resolved, slide_diags) = resolve_slides(raw, &*self.url_resolver);
                    diagnostics.extend(slide_diags);
                    if resolved.is_empty() {
                        diagnostics.push(Diagnostic::FileDropped {
                            name: text.name,
                            reason: "no usable slides".to_string(),
                        });
                    } else {
                        match link_narrative(&resolved, &mut datasets) {
                            Ok(link_diags) => {
                                diagnostics.extend(link_diags);
                                slides = Some(resolved);
                            }
                            Err(failure) => {
                                diagnostics::log_summary(session_id, &diagnostics);
                                tracing::error!(
                                    session_id = %session_id,
                                    wanted = ?failure.wanted,
                                    "Narrative has no starting dataset"
                                );
                                return Err(IngestError::NoStartingDataset {
                                    wanted: failure.wanted,
                                    diagnostics,
                                });
                            }
                        }
                    }
                }
                Err(reason) => {
                    tracing::warn!(
                        session_id = %session_id,
                        file = %text.name,
                        %reason,
                        "Narrative not usable"
                    );
                    diagnostics.push(Diagnostic::FileDropped { name: text.name, reason });
                }
            }
        }

        let view = match select_view(&datasets, slides.as_deref(), &mut diagnostics) {
            Some(view) => view,
            None => {
                diagnostics::log_summary(session_id, &diagnostics);
                return Err(IngestError::NoDatasets { diagnostics });
            }
        };

        diagnostics::log_summary(session_id, &diagnostics);
        tracing::info!(
            session_id = %session_id,
            datasets = datasets.len(),
            narrative = slides.is_some(),
            main = %view.tree_names.main,
            "Ingestion complete"
        );
        Ok(Ingestion {
            datasets,
            narrative: slides,
            diagnostics,
            view,
        })
    }
}

/// Pick what the first render shows. With a narrative, the opening
/// slide's dataset(s); otherwise the first two datasets in drop order.
fn select_view(
    datasets: &DatasetSet,
    slides: Option<&[NarrativeSlide]>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<InitialView> {
    let (main, second) = match slides.and_then(|slides| slides.first()) {
        Some(first) => {
            let refs = &first.datasets;
            let main = refs.keys().find_map(|key| datasets.get(key))?;
            let second = refs
                .second
                .as_deref()
                .and_then(|key| datasets.get(key))
                .filter(|dataset| dataset.key != main.key);
            (main, second)
        }
        None => {
            let mut ordered = datasets.iter();
            let main = ordered.next()?;
            let second = ordered.next();
            if datasets.len() > DEFAULT_VIEW_DATASETS {
                diagnostics.push(Diagnostic::ExtraDatasets {
                    shown: DEFAULT_VIEW_DATASETS,
                    provided: datasets.len(),
                });
            }
            (main, second)
        }
    };
    Some(InitialView {
        main: main.doc.clone(),
        second_tree: second.map(|dataset| dataset.doc.tree.clone()),
        sidecars: main.sidecars.clone(),
        tree_names: TreeNames {
            main: main.key.clone(),
            second: second.map(|dataset| dataset.key.clone()),
        },
    })
}
