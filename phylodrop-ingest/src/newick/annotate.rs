//! Tree annotation
//!
//! Turns a raw parsed node graph into the viewer's tree: every node gets
//! a non-empty unique name, divergences become cumulative from the root,
//! and topology-only input falls back to depth-based divergence so it
//! still renders.
//!
//! Annotation consumes the [`RawNode`] graph. There is no way to feed a
//! [`TreeNode`] back through here, so names are assigned and cumulative
//! lengths applied exactly once per parse.

use std::collections::HashSet;

use phylodrop_common::model::{NodeAttrs, TreeNode};

use crate::newick::parser::RawNode;

/// Generated node names count up from `NODE10000`.
const GENERATED_NAME_SEED: u32 = 10_000;

/// Per-run naming state: generated-name counter and seen-name set.
/// Created fresh for every annotation, so independent parses never
/// influence each other's names.
struct AnnotationContext {
    next_generated: u32,
    seen: HashSet<String>,
}

impl AnnotationContext {
    fn new() -> Self {
        Self {
            next_generated: GENERATED_NAME_SEED,
            seen: HashSet::new(),
        }
    }

    /// Final unique name for a node: the provided label, or a generated
    /// `NODE<seq>`, suffixed `_2`, `_3`, … on collision with an earlier
    /// name.
    fn assign(&mut self, label: Option<String>) -> String {
        let mut name = match label {
            Some(label) if !label.is_empty() => label,
            _ => {
                let generated = format!("NODE{}", self.next_generated);
                self.next_generated += 1;
                generated
            }
        };
        if self.seen.contains(&name) {
            let mut i = 2;
            while self.seen.contains(&format!("{name}_{i}")) {
                i += 1;
            }
            name = format!("{name}_{i}");
        }
        self.seen.insert(name.clone());
        name
    }
}

/// Annotate a freshly parsed tree.
pub fn annotate(raw: RawNode) -> TreeNode {
    let mut ctx = AnnotationContext::new();
    let mut tree = name_nodes(raw, &mut ctx);

    let mut any_real_length = false;
    accumulate(&mut tree, 0.0, &mut any_real_length);
    if !any_real_length {
        apply_depths(&mut tree, 0);
    }
    tree
}

/// Pre-order: default missing lengths to 0 and assign unique names.
fn name_nodes(raw: RawNode, ctx: &mut AnnotationContext) -> TreeNode {
    let name = ctx.assign(raw.label);
    let div = raw.length.unwrap_or(0.0);
    TreeNode {
        name,
        node_attrs: NodeAttrs { div },
        children: raw
            .children
            .into_iter()
            .map(|child| name_nodes(child, ctx))
            .collect(),
    }
}

/// Divergence becomes cumulative: own raw length plus the parent's
/// already-cumulative value. Records whether any raw length was nonzero.
fn accumulate(node: &mut TreeNode, so_far: f64, any_real_length: &mut bool) {
    if node.node_attrs.div != 0.0 {
        *any_real_length = true;
    }
    node.node_attrs.div += so_far;
    let parent_div = node.node_attrs.div;
    for child in &mut node.children {
        accumulate(child, parent_div, any_real_length);
    }
}

/// Degenerate fallback for topology-only input: divergence = node depth.
fn apply_depths(node: &mut TreeNode, depth: u32) {
    node.node_attrs.div = f64::from(depth);
    for child in &mut node.children {
        apply_depths(child, depth + 1);
    }
}
