//! Tag-based references in assistant text.
//!
//! The model cites artifacts like this:
//!
//! ```text
//! <references>
//!   <reference><type>course</type><artifactId>14-dp</artifactId><title>DP Basics</title></reference>
//! </references>
//! ```
//!
//! [`parse_references`] pulls out every well-formed `<reference>` span and
//! [`clean_references`] strips the wrapper from text meant for display.

use std::sync::LazyLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

static REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<reference>(.*?)</reference>").expect("static pattern"));
static TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<type>([^<]+)</type>").expect("static pattern"));
static ARTIFACT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<artifactId>([^<]+)</artifactId>").expect("static pattern"));
static TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<title>([^<]+)</title>").expect("static pattern"));
static WRAPPER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<references>.*?</references>").expect("static pattern"));

const OPEN_WRAPPER: &str = "<references>";
const CLOSE_WRAPPER: &str = "</references>";

/// What kind of artifact a reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    Course,
    MindMap,
    SolutionCode,
}

impl ReferenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Course => "course",
            Self::MindMap => "mind_map",
            Self::SolutionCode => "solution_code",
        }
    }

    /// Exact match against the wire names.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "course" => Some(Self::Course),
            "mind_map" => Some(Self::MindMap),
            "solution_code" => Some(Self::SolutionCode),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReferenceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A citation of an artifact found in assistant text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(rename = "type")]
    pub reference_type: ReferenceType,
    pub artifact_id: String,
    pub title: String,
}

impl Reference {
    pub fn new(
        reference_type: ReferenceType,
        artifact_id: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            reference_type,
            artifact_id: artifact_id.into(),
            title: title.into(),
        }
    }
}

fn capture(re: &Regex, haystack: &str) -> Option<String> {
    re.captures(haystack)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Every well-formed reference in `text`, in order of appearance.
///
/// Spans missing a field, or with an unknown type, are skipped.
pub fn parse_references(text: &str) -> Vec<Reference> {
    REFERENCE
        .captures_iter(text)
        .filter_map(|span| {
            let inner = span.get(1)?.as_str();
            let reference_type = ReferenceType::parse(&capture(&TYPE, inner)?)?;
            let artifact_id = capture(&ARTIFACT_ID, inner)?;
            let title = capture(&TITLE, inner)?;
            Some(Reference {
                reference_type,
                artifact_id,
                title,
            })
        })
        .collect()
}

/// Remove `<references>` wrappers from text meant for display.
///
/// Complete wrappers are removed when a closing tag is present. An opening tag
/// with no closing tag anywhere cuts the text at the opening tag, which hides a
/// wrapper that is still streaming.
pub fn clean_references(text: &str) -> String {
    let mut cleaned = text.to_string();
    if cleaned.contains(OPEN_WRAPPER) && cleaned.contains(CLOSE_WRAPPER) {
        cleaned = WRAPPER.replace_all(&cleaned, "").into_owned();
    }
    if !cleaned.contains(CLOSE_WRAPPER)
        && let Some(start) = cleaned.find(OPEN_WRAPPER)
    {
        cleaned.truncate(start);
    }
    cleaned
}
