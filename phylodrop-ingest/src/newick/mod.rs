//! Newick input handling
//!
//! Tokenizer/parser, tree annotation, and synthesis of a complete
//! dataset document from a dropped Newick file.

pub mod annotate;
pub mod parser;

pub use annotate::annotate;
pub use parser::{parse, NewickError, RawNode};

use chrono::{DateTime, Utc};
use phylodrop_common::model::{DatasetDoc, DatasetMeta};

/// Build a complete dataset document from Newick text.
///
/// The document mirrors what a prepared v2 dataset would carry: a title
/// from the dropped filename, a tree panel, and a generated description
/// recording the file name and drop date.
pub fn dataset_from_newick(
    file_name: &str,
    text: &str,
    dropped_at: DateTime<Utc>,
) -> phylodrop_common::Result<DatasetDoc> {
    let tree = annotate(parse(text)?);
    Ok(DatasetDoc {
        version: Some("2.0".to_string()),
        meta: DatasetMeta {
            title: Some(file_name.to_string()),
            panels: vec!["tree".to_string()],
            description: Some(make_description(file_name, dropped_at)),
            extra: Default::default(),
        },
        tree: serde_json::to_value(tree)?,
        extra: Default::default(),
    })
}

fn make_description(file_name: &str, dropped_at: DateTime<Utc>) -> String {
    format!(
        "Dataset generated from the Newick file \"{}\" dropped on {}.",
        file_name,
        dropped_at.format("%a %b %d %Y"),
    )
}
