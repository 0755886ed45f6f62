//! Narrative slide extraction and dataset linking
//!
//! A narrative document drives which datasets survive ingestion: the
//! dataset set is filtered to the keys its slides reference. Slide
//! extraction and URL resolution are delegated seams; the defaults read
//! only document structure, and markdown prose is passed through
//! untouched for the viewer to render.

use std::collections::HashSet;

use thiserror::Error;

use phylodrop_common::model::{NarrativeSlide, SlideDatasets};

use crate::dataset::DatasetSet;
use crate::diagnostics::Diagnostic;

/// Raw slide as extracted from a narrative document, before URL → key
/// resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSlide {
    pub title: Option<String>,
    pub dataset_url: String,
    pub body: String,
}

/// Extracts the slide structure from a narrative document.
pub trait SlideExtractor: Send + Sync {
    fn extract(&self, text: &str) -> Result<Vec<RawSlide>, String>;
}

/// Default extractor: a leading `---`-fenced frontmatter block supplies
/// the opening slide (`title:`, `dataset:`, `abstract:`); every
/// `# [title](url)` heading afterwards opens one slide whose body runs
/// until the next heading.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadingSlideExtractor;

impl SlideExtractor for HeadingSlideExtractor {
    fn extract(&self, text: &str) -> Result<Vec<RawSlide>, String> {
        let mut lines = text.lines();

        // Opening fence, skipping leading blank lines.
        let mut opened = false;
        for line in lines.by_ref() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            opened = trimmed == "---";
            break;
        }
        if !opened {
            return Err("document has no frontmatter block".to_string());
        }

        let mut title = None;
        let mut dataset = None;
        let mut abstract_text = None;
        let mut closed = false;
        for line in lines.by_ref() {
            let trimmed = line.trim();
            if trimmed == "---" {
                closed = true;
                break;
            }
            if let Some((key, value)) = trimmed.split_once(':') {
                let value = value.trim().trim_matches('"').to_string();
                match key.trim() {
                    "title" => title = Some(value),
                    "dataset" => dataset = Some(value),
                    "abstract" => abstract_text = Some(value),
                    _ => {}
                }
            }
        }
        if !closed {
            return Err("unterminated frontmatter block".to_string());
        }
        let dataset_url = dataset.ok_or_else(|| "frontmatter names no dataset".to_string())?;

        let mut slides = vec![RawSlide {
            title,
            dataset_url,
            body: abstract_text.unwrap_or_default(),
        }];

        let mut current: Option<RawSlide> = None;
        for line in lines {
            if let Some((heading, url)) = parse_heading(line) {
                if let Some(slide) = current.take() {
                    slides.push(trimmed_body(slide));
                }
                current = Some(RawSlide {
                    title: Some(heading),
                    dataset_url: url,
                    body: String::new(),
                });
            } else if let Some(slide) = current.as_mut() {
                slide.body.push_str(line);
                slide.body.push('\n');
            }
        }
        if let Some(slide) = current.take() {
            slides.push(trimmed_body(slide));
        }
        Ok(slides)
    }
}

/// `# [title](url)`: a level-1 heading whose entire content is a link.
fn parse_heading(line: &str) -> Option<(String, String)> {
    let rest = line.trim().strip_prefix("# [")?;
    let (title, rest) = rest.split_once("](")?;
    let url = rest.strip_suffix(')')?;
    Some((title.to_string(), url.to_string()))
}

fn trimmed_body(mut slide: RawSlide) -> RawSlide {
    slide.body = slide.body.trim().to_string();
    slide
}

/// Default URL → key resolution: strip scheme, host, query and fragment,
/// trim slashes, lowercase; a `main:second` path yields two keys.
pub fn resolve_dataset_url(url: &str) -> Option<SlideDatasets> {
    let mut rest = url.trim();
    if let Some(scheme) = rest.find("://") {
        rest = &rest[scheme + 3..];
        rest = match rest.find('/') {
            Some(slash) => &rest[slash..],
            None => "",
        };
    }
    let end = rest.find(['?', '#']).unwrap_or(rest.len());
    let path = rest[..end].trim_matches('/').to_lowercase();
    if path.is_empty() {
        return None;
    }
    match path.split_once(':') {
        Some((main, second)) => {
            let main = main.trim_matches('/');
            let second = second.trim_matches('/');
            if main.is_empty() {
                return None;
            }
            Some(SlideDatasets {
                main: main.to_string(),
                second: (!second.is_empty()).then(|| second.to_string()),
            })
        }
        None => Some(SlideDatasets { main: path, second: None }),
    }
}

/// Resolve raw slides into the ordered slide sequence. Slides whose URL
/// yields no key are skipped with a diagnostic; the remaining slides are
/// numbered densely from 0.
pub fn resolve_slides(
    raw: Vec<RawSlide>,
    resolver: &(dyn Fn(&str) -> Option<SlideDatasets> + Send + Sync),
) -> (Vec<NarrativeSlide>, Vec<Diagnostic>) {
    let mut slides = Vec::new();
    let mut diagnostics = Vec::new();
    for (index, slide) in raw.into_iter().enumerate() {
        match resolver(&slide.dataset_url) {
            Some(datasets) => slides.push(NarrativeSlide {
                position: slides.len(),
                title: slide.title,
                datasets,
                body: slide.body,
            }),
            None => diagnostics.push(Diagnostic::SlideWithoutDataset {
                position: index,
                url: slide.dataset_url,
            }),
        }
    }
    (slides, diagnostics)
}

/// Hard failure: no dataset for the opening slide.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("opening slide references no available dataset: {wanted:?}")]
pub struct NoStartingDataset {
    pub wanted: Vec<String>,
}

/// Filter `datasets` down to the keys the slides reference.
///
/// Referenced-but-absent keys and unreferenced datasets become
/// diagnostics; rendering proceeds and the consumer surfaces errors on
/// actual access. The one hard failure is an opening slide with every
/// dataset absent: there is no usable starting view.
pub fn link_narrative(
    slides: &[NarrativeSlide],
    datasets: &mut DatasetSet,
) -> Result<Vec<Diagnostic>, NoStartingDataset> {
    let Some(first) = slides.first() else {
        return Ok(Vec::new());
    };
    if !first.datasets.keys().any(|key| datasets.contains_key(key)) {
        return Err(NoStartingDataset {
            wanted: first.datasets.keys().map(str::to_lowercase).collect(),
        });
    }

    // All distinct referenced keys, in first-reference order.
    let mut referenced = Vec::new();
    let mut seen = HashSet::new();
    for slide in slides {
        for key in slide.datasets.keys() {
            let key = key.to_lowercase();
            if !key.is_empty() && seen.insert(key.clone()) {
                referenced.push(key);
            }
        }
    }

    let mut diagnostics = Vec::new();
    for key in datasets.retain_keys(&seen) {
        diagnostics.push(Diagnostic::UnreferencedDataset { key });
    }
    for key in referenced {
        if !datasets.contains_key(&key) {
            diagnostics.push(Diagnostic::MissingNarrativeDataset { key });
        }
    }
    Ok(diagnostics)
}
