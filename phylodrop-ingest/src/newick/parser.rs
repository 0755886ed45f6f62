//! Newick tokenizer and parser
//!
//! Parses the grammar subset `( ) , : ;` with unquoted labels and
//! floating-point branch lengths into a raw node graph. Quoted labels
//! are rejected outright: quoting can embed structural characters this
//! parser cannot disambiguate.

use thiserror::Error;

/// Parse failure for a Newick document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NewickError {
    /// Single or double quotes anywhere in the input
    #[error("quoted labels are not supported in Newick input")]
    QuotedLabel,

    /// The text after a `:` did not parse as a non-negative finite float
    #[error("invalid branch length {0:?}")]
    BranchLength(String),

    /// A `)` with no open clade to close
    #[error("unexpected ')' with no open clade")]
    UnbalancedClose,

    /// A `,` outside any clade
    #[error("unexpected ',' outside any clade")]
    UnexpectedSibling,

    /// Input ended with clades still open
    #[error("{0} unclosed '(' at end of input")]
    UnclosedClades(usize),
}

/// Raw parsed node, before annotation.
///
/// Labels and lengths are optional here; the annotator fills every gap.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawNode {
    pub label: Option<String>,
    pub length: Option<f64>,
    pub children: Vec<RawNode>,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open,
    Close,
    Comma,
    Colon,
    Semicolon,
    Text(String),
}

/// Split on the structural characters, trimming whitespace around text
/// runs but otherwise preserving label text verbatim.
fn tokenize(text: &str) -> Result<Vec<Token>, NewickError> {
    if text.contains('"') || text.contains('\'') {
        return Err(NewickError::QuotedLabel);
    }

    let mut tokens = Vec::new();
    let mut run = String::new();
    let mut flush = |run: &mut String, tokens: &mut Vec<Token>| {
        let trimmed = run.trim();
        if !trimmed.is_empty() {
            tokens.push(Token::Text(trimmed.to_string()));
        }
        run.clear();
    };

    for ch in text.chars() {
        let structural = match ch {
            '(' => Some(Token::Open),
            ')' => Some(Token::Close),
            ',' => Some(Token::Comma),
            ':' => Some(Token::Colon),
            ';' => Some(Token::Semicolon),
            _ => None,
        };
        match structural {
            Some(token) => {
                flush(&mut run, &mut tokens);
                tokens.push(token);
            }
            None => run.push(ch),
        }
    }
    flush(&mut run, &mut tokens);
    Ok(tokens)
}

/// Parse a Newick string into a raw node graph.
///
/// Maintains an ancestor stack: `(` starts a child and descends, `,`
/// closes the current sibling, `)` pops back to the parent (which may
/// then receive a name and/or `:` length). A text token is a name or a
/// branch length depending on the structural token before it; with no
/// preceding token it is ignored. Parsing stops at the first `;` (or at
/// EOF); any input after it is ignored.
pub fn parse(text: &str) -> Result<RawNode, NewickError> {
    let tokens = tokenize(text)?;

    let mut ancestors: Vec<RawNode> = Vec::new();
    let mut current = RawNode::default();
    let mut prev: Option<&Token> = None;

    for token in &tokens {
        match token {
            Token::Open => {
                // Descend into the first child; it attaches to the
                // parent on the matching `,` or `)`.
                ancestors.push(std::mem::take(&mut current));
            }
            Token::Comma => {
                let parent = ancestors
                    .last_mut()
                    .ok_or(NewickError::UnexpectedSibling)?;
                parent.children.push(std::mem::take(&mut current));
            }
            Token::Close => {
                let mut parent = ancestors.pop().ok_or(NewickError::UnbalancedClose)?;
                parent.children.push(std::mem::take(&mut current));
                current = parent;
            }
            Token::Colon => {}
            Token::Semicolon => break,
            Token::Text(text) => match prev {
                Some(Token::Open) | Some(Token::Close) | Some(Token::Comma) => {
                    current.label = Some(text.clone());
                }
                Some(Token::Colon) => {
                    current.length = Some(parse_branch_length(text)?);
                }
                _ => {}
            },
        }
        prev = Some(token);
    }

    if !ancestors.is_empty() {
        return Err(NewickError::UnclosedClades(ancestors.len()));
    }
    Ok(current)
}

fn parse_branch_length(text: &str) -> Result<f64, NewickError> {
    let value: f64 = text
        .parse()
        .map_err(|_| NewickError::BranchLength(text.to_string()))?;
    if !value.is_finite() || value < 0.0 {
        return Err(NewickError::BranchLength(text.to_string()));
    }
    Ok(value)
}
