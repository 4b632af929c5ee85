//! Legacy bracket-link citations: `[title](TYPE:artifactId)`.
//!
//! Text is split into plain segments and citations. Each line carrying a valid
//! marker closes the current plain segment (with the marker rewritten to
//! `《title》`) and is followed by the citation it named.

use std::sync::LazyLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use crate::reference::{Reference, ReferenceType};

static MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(.+?)\]\(([^:]+):(.+?)\)").expect("static pattern"));
static ANY_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(.+?)\]\(.+?\)").expect("static pattern"));

/// One piece of cited text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TextPart {
    PlainText { text: String },
    Citation { citation: Reference },
}

impl TextPart {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::PlainText { text: text.into() }
    }

    pub fn citation(citation: Reference) -> Self {
        Self::Citation { citation }
    }
}

/// The first valid marker on a line. Only the first marker is considered.
fn line_citation(line: &str) -> Option<Reference> {
    let caps = MARKER.captures(line)?;
    let title = caps.get(1)?.as_str();
    let kind = caps.get(2)?.as_str().to_lowercase();
    let artifact_id = caps.get(3)?.as_str();
    let reference_type = ReferenceType::parse(&kind)?;
    Some(Reference::new(reference_type, artifact_id, title))
}

fn rewrite_links(line: &str) -> String {
    ANY_LINK.replace_all(line, "《${1}》").into_owned()
}

/// Emit the buffered lines as one plain segment, unless that leaves it empty.
fn flush(lines: &mut Vec<String>, parts: &mut Vec<TextPart>, after_citation: bool, trailer: &str) {
    let mut segment = lines.join("\n");
    lines.clear();
    if after_citation {
        segment = segment.trim_start_matches(['\n', '\r']).to_string();
    }
    if !segment.is_empty() {
        segment.push_str(trailer);
        parts.push(TextPart::plain(segment));
    }
}

/// Split `text` into plain-text segments and citations.
pub fn parse_text_parts(text: &str) -> Vec<TextPart> {
    let mut parts = Vec::new();
    let mut buffered: Vec<String> = Vec::new();
    let mut after_citation = false;

    for line in text.split('\n') {
        match line_citation(line) {
            Some(citation) => {
                buffered.push(rewrite_links(line));
                flush(&mut buffered, &mut parts, after_citation, " ");
                parts.push(TextPart::citation(citation));
                after_citation = true;
            }
            None => buffered.push(line.to_string()),
        }
    }
    if !buffered.is_empty() {
        flush(&mut buffered, &mut parts, after_citation, "");
    }
    parts
}

/// Only the citations of `text`, in order.
pub fn parse_citations(text: &str) -> Vec<Reference> {
    parse_text_parts(text)
        .into_iter()
        .filter_map(|part| match part {
            TextPart::Citation { citation } => Some(citation),
            TextPart::PlainText { .. } => None,
        })
        .collect()
}
