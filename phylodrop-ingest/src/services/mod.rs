//! Ingestion services
//!
//! The assembler, narrative linker and orchestrator that turn classified
//! dropped files into one ingestion result.

pub mod assembler;
pub mod narrative;
pub mod orchestrator;

pub use assembler::{assemble, Assembly, NarrativeText};
pub use narrative::{
    resolve_dataset_url, HeadingSlideExtractor, NoStartingDataset, RawSlide, SlideExtractor,
};
pub use orchestrator::{IngestPipeline, Ingestion, InitialView, TreeNames};
