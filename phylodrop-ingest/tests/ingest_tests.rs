//! End-to-end ingestion tests
//!
//! Drive the whole pipeline over in-memory (and some on-disk) dropped
//! files: classification, concurrent reads, sidecar association,
//! narrative linking, and view selection.

use std::sync::Arc;

use phylodrop_ingest::classify::SidecarKind;
use phylodrop_ingest::diagnostics::Diagnostic;
use phylodrop_ingest::sources::Decompressor;
use phylodrop_ingest::{DroppedFile, IngestError, IngestPipeline};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

fn mem(name: &str, content: &str) -> DroppedFile {
    DroppedFile::from_memory(name, content)
}

fn dataset_json(title: &str) -> String {
    format!(
        r#"{{"version": "2.0", "meta": {{"title": "{title}", "panels": ["tree"]}}, "tree": {{"name": "root"}}}}"#
    )
}

#[tokio::test]
async fn main_and_sidecar_associate_by_key() {
    init_tracing();
    let pipeline = IngestPipeline::new();
    let ingestion = pipeline
        .ingest(vec![
            mem("zika_colombia.json", &dataset_json("Zika in Colombia")),
            mem("zika_colombia_tip-frequencies.json", r#"{"pivots": [2015.0]}"#),
        ])
        .await
        .unwrap();

    assert_eq!(ingestion.datasets.len(), 1);
    let dataset = ingestion.datasets.get("zika/colombia").unwrap();
    assert_eq!(dataset.key, "zika/colombia");

    // The sidecar read was deferred; it resolves for us now.
    let pending = dataset
        .sidecars
        .get(SidecarKind::TipFrequencies)
        .unwrap()
        .clone();
    let payload = pending.await.unwrap();
    assert_eq!(payload["pivots"][0], 2015.0);

    // The view carries the same pending slots.
    assert!(ingestion
        .view
        .sidecars
        .get(SidecarKind::TipFrequencies)
        .is_some());
    assert_eq!(ingestion.view.tree_names.main, "zika/colombia");
    assert!(ingestion.diagnostics.is_empty());
}

#[tokio::test]
async fn sidecar_alone_is_fatal_but_names_the_expected_key() {
    init_tracing();
    let err = IngestPipeline::new()
        .ingest(vec![mem(
            "zika_colombia_tip-frequencies.json",
            r#"{"pivots": []}"#,
        )])
        .await
        .unwrap_err();

    let IngestError::NoDatasets { diagnostics } = err else {
        panic!("expected NoDatasets");
    };
    assert!(diagnostics.contains(&Diagnostic::SidecarWithoutDataset {
        name: "zika_colombia_tip-frequencies.json".to_string(),
        expected_key: "zika/colombia".to_string(),
    }));
}

#[tokio::test]
async fn narrative_filters_datasets_to_referenced_keys() {
    init_tracing();
    let narrative = "\
---
title: Tour
dataset: https://example.org/ncov/global
---

# [Still global](https://example.org/ncov/global?c=region)

More detail.
";
    let ingestion = IngestPipeline::new()
        .ingest(vec![
            mem("ncov_global.json", &dataset_json("Global nCoV")),
            mem("flu_seasonal.json", &dataset_json("Seasonal flu")),
            mem("tour.md", narrative),
        ])
        .await
        .unwrap();

    assert_eq!(
        ingestion.datasets.keys().collect::<Vec<_>>(),
        vec!["ncov/global"]
    );
    assert!(ingestion.diagnostics.contains(&Diagnostic::UnreferencedDataset {
        key: "flu/seasonal".to_string()
    }));

    let slides = ingestion.narrative.unwrap();
    assert_eq!(slides.len(), 2);
    assert_eq!(slides[0].datasets.main, "ncov/global");
    assert_eq!(ingestion.view.tree_names.main, "ncov/global");
}

#[tokio::test]
async fn missing_narrative_reference_is_a_diagnostic_not_an_error() {
    init_tracing();
    let narrative = "\
---
dataset: /ncov/global
---

# [The missing one](https://example.org/zika/colombia)

Referenced but never dropped.
";
    let ingestion = IngestPipeline::new()
        .ingest(vec![
            mem("ncov_global.json", &dataset_json("Global nCoV")),
            mem("tour.md", narrative),
        ])
        .await
        .unwrap();

    assert!(ingestion.diagnostics.contains(&Diagnostic::MissingNarrativeDataset {
        key: "zika/colombia".to_string()
    }));
    assert_eq!(ingestion.datasets.len(), 1);
}

#[tokio::test]
async fn narrative_opening_slide_without_datasets_is_fatal() {
    init_tracing();
    let narrative = "\
---
dataset: /zika/colombia
---
";
    let err = IngestPipeline::new()
        .ingest(vec![
            mem("ncov_global.json", &dataset_json("Global nCoV")),
            mem("tour.md", narrative),
        ])
        .await
        .unwrap_err();

    let IngestError::NoStartingDataset { wanted, .. } = err else {
        panic!("expected NoStartingDataset");
    };
    assert_eq!(wanted, vec!["zika/colombia".to_string()]);
}

#[tokio::test]
async fn unrelated_file_alone_is_fatal() {
    init_tracing();
    let err = IngestPipeline::new()
        .ingest(vec![mem("metadata.csv", "strain,country\n")])
        .await
        .unwrap_err();

    let IngestError::NoDatasets { diagnostics } = err else {
        panic!("expected NoDatasets");
    };
    assert!(diagnostics.contains(&Diagnostic::DeferredFile {
        name: "metadata.csv".to_string()
    }));
}

#[tokio::test]
async fn newick_drop_builds_a_renderable_dataset() {
    init_tracing();
    let ingestion = IngestPipeline::new()
        .ingest(vec![mem("example.nwk", "((A:1,B:2)ab:1,C:3);")])
        .await
        .unwrap();

    let dataset = ingestion.datasets.get("example.nwk").unwrap();
    assert_eq!(dataset.doc.meta.title.as_deref(), Some("example.nwk"));
    assert_eq!(dataset.doc.meta.panels, vec!["tree".to_string()]);
    assert_eq!(dataset.doc.tree["name"], "NODE10000");
    assert_eq!(dataset.doc.tree["children"][0]["name"], "ab");
    assert_eq!(
        dataset.doc.tree["children"][0]["children"][0]["node_attrs"]["div"],
        2.0
    );
}

#[tokio::test]
async fn default_view_takes_the_first_two_in_drop_order() {
    init_tracing();
    let ingestion = IngestPipeline::new()
        .ingest(vec![
            mem("zika_colombia.json", &dataset_json("Zika")),
            mem("ncov_global.json", &dataset_json("nCoV")),
            mem("flu_seasonal.json", &dataset_json("Flu")),
        ])
        .await
        .unwrap();

    assert_eq!(ingestion.view.tree_names.main, "zika/colombia");
    assert_eq!(
        ingestion.view.tree_names.second.as_deref(),
        Some("ncov/global")
    );
    assert!(ingestion.view.second_tree.is_some());
    assert!(ingestion.diagnostics.contains(&Diagnostic::ExtraDatasets {
        shown: 2,
        provided: 3
    }));
}

#[tokio::test]
async fn failing_file_does_not_abort_its_siblings() {
    init_tracing();
    let ingestion = IngestPipeline::new()
        .ingest(vec![
            mem("broken.json", "this is not JSON"),
            mem("ncov_global.json", &dataset_json("nCoV")),
        ])
        .await
        .unwrap();

    assert_eq!(ingestion.datasets.len(), 1);
    assert!(ingestion.datasets.get("ncov/global").is_some());
    assert!(ingestion
        .diagnostics
        .iter()
        .any(|d| matches!(d, Diagnostic::FileDropped { name, .. } if name == "broken.json")));
}

#[tokio::test]
async fn compressed_file_without_transform_fails_per_file() {
    init_tracing();
    let err = IngestPipeline::new()
        .ingest(vec![mem("ncov_global.json.gz", "(binary)")])
        .await
        .unwrap_err();

    let IngestError::NoDatasets { diagnostics } = err else {
        panic!("expected NoDatasets");
    };
    assert!(diagnostics
        .iter()
        .any(|d| matches!(d, Diagnostic::FileDropped { name, .. } if name == "ncov_global.json.gz")));
}

#[tokio::test]
async fn compressed_file_runs_through_the_injected_transform() {
    init_tracing();
    // Stand-in for the external stream transform: strip a marker byte.
    let inflate: Decompressor = Arc::new(|bytes: Vec<u8>| Ok(bytes[1..].to_vec()));

    let content = format!("X{}", dataset_json("Compressed nCoV"));
    let ingestion = IngestPipeline::new()
        .with_decompressor(inflate)
        .ingest(vec![mem("ncov_global.json.gz", &content)])
        .await
        .unwrap();

    let dataset = ingestion.datasets.get("ncov/global").unwrap();
    assert_eq!(dataset.doc.meta.title.as_deref(), Some("Compressed nCoV"));
}

#[tokio::test]
async fn two_tree_opening_slide_selects_a_second_tree() {
    init_tracing();
    let narrative = "\
---
dataset: /flu/h3n2:flu/h1n1
---
";
    let ingestion = IngestPipeline::new()
        .ingest(vec![
            mem("flu_h3n2.json", &dataset_json("H3N2")),
            mem("flu_h1n1.json", &dataset_json("H1N1")),
            mem("tour.md", narrative),
        ])
        .await
        .unwrap();

    assert_eq!(ingestion.view.tree_names.main, "flu/h3n2");
    assert_eq!(ingestion.view.tree_names.second.as_deref(), Some("flu/h1n1"));
    assert!(ingestion.view.second_tree.is_some());
}

#[tokio::test]
async fn disk_backed_files_ingest_like_memory_ones() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let main_path = dir.path().join("zika_colombia.json");
    let sidecar_path = dir.path().join("zika_colombia_measurements.json");
    std::fs::write(&main_path, dataset_json("Zika")).unwrap();
    std::fs::write(&sidecar_path, r#"{"collections": []}"#).unwrap();

    let ingestion = IngestPipeline::new()
        .ingest(vec![
            DroppedFile::from_disk("zika_colombia.json", &main_path),
            DroppedFile::from_disk("zika_colombia_measurements.json", &sidecar_path),
        ])
        .await
        .unwrap();

    let dataset = ingestion.datasets.get("zika/colombia").unwrap();
    let payload = dataset
        .sidecars
        .get(SidecarKind::Measurements)
        .unwrap()
        .clone()
        .await
        .unwrap();
    assert!(payload["collections"].is_array());
}

#[tokio::test]
async fn later_duplicate_key_is_dropped_with_a_diagnostic() {
    init_tracing();
    let ingestion = IngestPipeline::new()
        .ingest(vec![
            mem("ncov_global.json", &dataset_json("First")),
            mem("NCOV_GLOBAL.JSON", &dataset_json("Second")),
        ])
        .await
        .unwrap();

    assert_eq!(ingestion.datasets.len(), 1);
    let dataset = ingestion.datasets.get("ncov/global").unwrap();
    assert_eq!(dataset.doc.meta.title.as_deref(), Some("First"));
    assert!(ingestion.diagnostics.contains(&Diagnostic::DuplicateDataset {
        name: "NCOV_GLOBAL.JSON".to_string(),
        key: "ncov/global".to_string(),
    }));
}

#[tokio::test]
async fn second_narrative_file_is_ignored_with_a_diagnostic() {
    init_tracing();
    let narrative = "\
---
dataset: /ncov/global
---
";
    let ingestion = IngestPipeline::new()
        .ingest(vec![
            mem("ncov_global.json", &dataset_json("nCoV")),
            mem("tour.md", narrative),
            mem("second_tour.md", narrative),
        ])
        .await
        .unwrap();

    assert!(ingestion.narrative.is_some());
    assert!(ingestion.diagnostics.contains(&Diagnostic::ExtraNarrative {
        name: "second_tour.md".to_string()
    }));
}

#[tokio::test]
async fn unusable_narrative_falls_back_to_the_default_view() {
    init_tracing();
    let ingestion = IngestPipeline::new()
        .ingest(vec![
            mem("ncov_global.json", &dataset_json("nCoV")),
            mem("notes.md", "no frontmatter here, just prose"),
        ])
        .await
        .unwrap();

    assert!(ingestion.narrative.is_none());
    assert_eq!(ingestion.view.tree_names.main, "ncov/global");
    assert!(ingestion
        .diagnostics
        .iter()
        .any(|d| matches!(d, Diagnostic::FileDropped { name, .. } if name == "notes.md")));
}
