//! Extraction of the titled section array from a model answer.
//!
//! Models often wrap the JSON in prose or Markdown fences, so the answer is
//! scanned for balanced `[...]`/`{...}` spans (string-aware) and the first
//! span that parses as a section list wins. Both a bare array and an
//! `{"analysis": [...]}` object are accepted.

use serde::{Deserialize, Serialize};

use crate::error::ReportError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSection {
    pub title: String,
    pub content: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SectionDocument {
    List(Vec<ReportSection>),
    Wrapped { analysis: Vec<ReportSection> },
}

impl SectionDocument {
    fn into_sections(self) -> Vec<ReportSection> {
        match self {
            SectionDocument::List(sections) | SectionDocument::Wrapped { analysis: sections } => {
                sections
            }
        }
    }
}

/// Parses the stored report text into its ordered sections.
///
/// # Errors
///
/// Returns [`ReportError::MalformedReportJson`] if no balanced span parses
/// as a non-empty list of `{title, content}` objects.
pub fn parse_sections(raw: &str) -> Result<Vec<ReportSection>, ReportError> {
    let mut saw_empty = false;
    for span in balanced_spans(raw) {
        let Ok(document) = serde_json::from_str::<SectionDocument>(span) else {
            continue;
        };
        let sections = document.into_sections();
        if sections.is_empty() {
            saw_empty = true;
            continue;
        }
        return Ok(sections);
    }

    Err(ReportError::MalformedReportJson(if saw_empty {
        "section array is empty".to_owned()
    } else {
        "no JSON section array found in report text".to_owned()
    }))
}

/// Every balanced bracket span in `raw`, ordered by start position.
fn balanced_spans(raw: &str) -> impl Iterator<Item = &str> {
    raw.char_indices()
        .filter(|&(_, c)| c == '[' || c == '{')
        .filter_map(move |(start, _)| {
            matching_close(&raw[start..]).map(|len| &raw[start..start + len])
        })
}

/// Byte length of the balanced span at the start of `s`, if it closes.
fn matching_close(s: &str) -> Option<usize> {
    let mut expected: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' => expected.push(']'),
            '{' => expected.push('}'),
            ']' | '}' => {
                if expected.pop() != Some(c) {
                    return None;
                }
                if expected.is_empty() {
                    return Some(i + c.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}
