//! Filename classification of dropped files
//!
//! Classification uses the filename only, case-insensitively, never the
//! content. A trailing compression suffix is stripped first; an ordered
//! rule table then maps the remaining name to a [`FileClass`], first
//! match wins. The derived dataset key is shared between main files,
//! sidecar association and narrative linking, so the `_` → `/`
//! replacement is load-bearing.

use crate::sources::DroppedFile;

/// Sidecar payload kinds associated with a main dataset by filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SidecarKind {
    TipFrequencies,
    Measurements,
    RootSequence,
}

impl SidecarKind {
    pub const ALL: [SidecarKind; 3] = [
        SidecarKind::TipFrequencies,
        SidecarKind::Measurements,
        SidecarKind::RootSequence,
    ];

    /// Filename suffix (before the JSON extension) marking this kind.
    pub fn file_suffix(self) -> &'static str {
        match self {
            SidecarKind::TipFrequencies => "_tip-frequencies",
            SidecarKind::Measurements => "_measurements",
            SidecarKind::RootSequence => "_root-sequence",
        }
    }

    /// Property name the viewer expects for this payload.
    pub fn property_name(self) -> &'static str {
        match self {
            SidecarKind::TipFrequencies => "tipFrequencies",
            SidecarKind::Measurements => "measurements",
            SidecarKind::RootSequence => "rootSequence",
        }
    }
}

/// What a dropped file turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileClass {
    /// A main dataset document (v2 JSON)
    Main,
    /// An auxiliary payload for a main dataset
    Sidecar(SidecarKind),
    /// A Newick tree to synthesize a dataset from
    Newick,
    /// A narrative document
    Narrative,
    /// Accepted by a later visualization step, not by ingestion
    ForeignCollaborator,
    /// Nothing we recognize
    Unclassified,
}

/// A dropped file with its classification and derived dataset key.
#[derive(Debug, Clone)]
pub struct ClassifiedFile {
    pub file: DroppedFile,
    pub class: FileClass,
    /// Canonical dataset key (lowercase) for Main/Newick/Sidecar files
    pub dataset_key: Option<String>,
    /// Whether the content must run through the external decompression
    /// transform before parsing
    pub needs_decompression: bool,
}

/// One classification rule over the compression-stripped, lowercased
/// filename. Returns the class and derived key on match.
type Rule = fn(&str) -> Option<(FileClass, Option<String>)>;

/// Ordered rule table; the first matching rule wins. The delegated
/// foreign-collaborator predicate slots in after these, before the
/// unclassified fallback.
const RULES: &[Rule] = &[rule_dataset_json, rule_narrative, rule_newick];

/// Classify one dropped file by name.
///
/// `foreign` is the delegated predicate for files a later visualization
/// step accepts; it sees the compression-stripped, lowercased name.
pub fn classify(file: DroppedFile, foreign: &dyn Fn(&str) -> bool) -> ClassifiedFile {
    let lower = file.name().to_lowercase();
    let (name, needs_decompression) = strip_compression(&lower);

    for rule in RULES {
        if let Some((class, dataset_key)) = rule(name) {
            return ClassifiedFile { file, class, dataset_key, needs_decompression };
        }
    }

    let class = if foreign(name) {
        FileClass::ForeignCollaborator
    } else {
        FileClass::Unclassified
    };
    ClassifiedFile { file, class, dataset_key: None, needs_decompression }
}

/// Classify a batch, preserving drop order.
pub fn classify_all(
    files: Vec<DroppedFile>,
    foreign: &dyn Fn(&str) -> bool,
) -> Vec<ClassifiedFile> {
    files.into_iter().map(|f| classify(f, foreign)).collect()
}

/// Default foreign-collaborator predicate: per-node metadata tables the
/// viewer itself ingests once a dataset is on screen.
pub fn default_foreign_predicate(name: &str) -> bool {
    name.ends_with(".csv") || name.ends_with(".tsv")
}

fn strip_compression(name: &str) -> (&str, bool) {
    for suffix in [".gz", ".gzip"] {
        if let Some(stripped) = name.strip_suffix(suffix) {
            return (stripped, true);
        }
    }
    (name, false)
}

/// JSON-like files: a sidecar when the basename carries a sidecar
/// suffix, otherwise a main dataset. Key = basename, `_` → `/`.
fn rule_dataset_json(name: &str) -> Option<(FileClass, Option<String>)> {
    let base = name
        .strip_suffix(".json")
        .or_else(|| name.strip_suffix(".auspicejson"))?;

    for kind in SidecarKind::ALL {
        if let Some(main) = base.strip_suffix(kind.file_suffix()) {
            return Some((FileClass::Sidecar(kind), Some(dataset_key(main))));
        }
    }
    Some((FileClass::Main, Some(dataset_key(base))))
}

fn rule_narrative(name: &str) -> Option<(FileClass, Option<String>)> {
    name.ends_with(".md").then_some((FileClass::Narrative, None))
}

/// Newick trees keep the whole (compression-stripped) filename as key.
fn rule_newick(name: &str) -> Option<(FileClass, Option<String>)> {
    let is_newick = [".new", ".nwk", ".newick"]
        .iter()
        .any(|ext| name.ends_with(ext));
    is_newick.then(|| (FileClass::Newick, Some(name.to_string())))
}

fn dataset_key(base: &str) -> String {
    base.replace('_', "/")
}
