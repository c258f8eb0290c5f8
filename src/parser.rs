//! Line-oriented reader/writer for Android `<string name="KEY">VALUE</string>` resources.
//!
//! The grammar is deliberately narrow: one tag per line, no nesting, no
//! multi-line values and no unescaping. Anything that is not a `<string>`
//! line (XML prolog, `<resources>`, comments, code fences) is ignored.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

const TAG_MARKER: &str = "<string name=\"";
const VALUE_START: &str = "\">";
const CLOSE_TAG: &str = "</string>";

/// A single `name -> text` pair read from a resource file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringEntry {
    pub key: String,
    pub value: String,
}

impl StringEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A `<string name="` line that could not be split into key and value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed <string> tag on line {line}: {reason}")]
pub struct ParseError {
    /// 1-based line number in the submitted text
    pub line: usize,
    pub reason: String,
}

/// Parse every `<string>` line of `raw`.
///
/// Fails on the first malformed tag and returns nothing in that case.
/// A repeated key keeps its first position and takes the last value.
pub fn parse(raw: &str) -> Result<Vec<StringEntry>, ParseError> {
    let mut entries = Vec::new();
    let mut positions = HashMap::new();

    for (index, line) in raw.lines().enumerate() {
        if !line.contains(TAG_MARKER) {
            continue;
        }

        let entry = parse_line(line).map_err(|reason| ParseError {
            line: index + 1,
            reason: reason.to_string(),
        })?;
        push_entry(&mut entries, &mut positions, entry);
    }

    Ok(entries)
}

/// Same grammar as [`parse`], but malformed tag lines are dropped instead of failing.
///
/// Used for model output, where a truncated reply should still yield the
/// lines that did come back intact.
pub fn parse_lenient(raw: &str) -> Vec<StringEntry> {
    let mut entries = Vec::new();
    let mut positions = HashMap::new();

    for line in raw.lines().filter(|line| line.contains(TAG_MARKER)) {
        if let Ok(entry) = parse_line(line) {
            push_entry(&mut entries, &mut positions, entry);
        }
    }

    entries
}

/// Serialize a single pair in the tag format.
pub fn render_line(key: &str, value: &str) -> String {
    format!("<string name=\"{}\">{}</string>", key, value)
}

/// Serialize entries one per line, in the given order.
pub fn render(entries: &[StringEntry]) -> String {
    entries
        .iter()
        .map(|e| render_line(&e.key, &e.value))
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_line(line: &str) -> Result<StringEntry, &'static str> {
    // The key sits between the first two double quotes of the line
    let key_start = line
        .find('"')
        .map(|i| i + 1)
        .ok_or("missing opening quote for name attribute")?;
    let key_len = line[key_start..]
        .find('"')
        .ok_or("unterminated name attribute")?;
    let key_end = key_start + key_len;

    let value_start = line[key_end..]
        .find(VALUE_START)
        .map(|i| key_end + i + VALUE_START.len())
        .ok_or("missing '\">' after name attribute")?;
    let value_len = line[value_start..]
        .find(CLOSE_TAG)
        .ok_or("missing closing </string>")?;

    Ok(StringEntry::new(
        &line[key_start..key_end],
        line[value_start..value_start + value_len].trim(),
    ))
}

fn push_entry(
    entries: &mut Vec<StringEntry>,
    positions: &mut HashMap<String, usize>,
    entry: StringEntry,
) {
    match positions.get(&entry.key) {
        Some(&index) => entries[index].value = entry.value,
        None => {
            positions.insert(entry.key.clone(), entries.len());
            entries.push(entry);
        }
    }
}
