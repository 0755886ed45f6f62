//! Viewer-facing data model
//!
//! Typed envelope over the v2 dataset documents the downstream
//! visualization consumes, plus the tree structure built from Newick
//! input and the narrative slide model. Unknown document fields
//! round-trip untouched through `serde(flatten)`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Per-node attributes of a phylogenetic tree node.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeAttrs {
    /// Cumulative branch length (divergence) from the root to this node
    pub div: f64,
}

/// One node of a phylogenetic tree.
///
/// After annotation every node carries a non-empty name that is unique
/// within its tree, `node_attrs.div` is cumulative from the root, and
/// child divergence is never below the parent's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub name: String,
    pub node_attrs: NodeAttrs,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Whether this node is a leaf (has no children).
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(TreeNode::node_count).sum::<usize>()
    }

    /// Depth-first pre-order visit of this subtree.
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a TreeNode)) {
        f(self);
        for child in &self.children {
            child.visit(f);
        }
    }
}

/// `meta` block of a dataset document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub panels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A v2 dataset document: the primary tree/meta payload handed to the
/// state loader.
///
/// Dropped JSON datasets keep their tree untyped (`Value`); datasets
/// built from Newick input place a serialized [`TreeNode`] here. A
/// document without a `tree` member does not deserialize.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub meta: DatasetMeta,
    pub tree: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Dataset reference(s) of one narrative slide: the main view and an
/// optional side-by-side second tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideDatasets {
    pub main: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second: Option<String>,
}

impl SlideDatasets {
    /// The one or two referenced dataset keys.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.main.as_str()).chain(self.second.as_deref())
    }
}

/// One step of a narrative document. Slide 0 is the initial view.
///
/// The body is raw markdown, passed through verbatim for the viewer to
/// render; this model only cares about the referenced datasets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeSlide {
    pub position: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub datasets: SlideDatasets,
    pub body: String,
}
