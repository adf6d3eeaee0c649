//! Placeholder substitution over text that is split into segments.
//!
//! Word processors break a paragraph into runs whenever formatting, spell
//! checking or revision tracking changes, so a token such as `{{id}}` can
//! arrive as `{{`, `i`, `d}}`. Substitution therefore works on the joined
//! text while remembering which segment every byte came from:
//!
//! - characters outside any token stay in their original segment;
//! - a replacement value is written into the segment that held the first
//!   character of its token;
//! - the remaining characters of the token are dropped from their segments.
//!
//! Segment boundaries (and with them run formatting) survive everywhere
//! except inside the replaced token.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static UNRESOLVED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{[^{}]+\}|\{\{[^{}]+\}\}").expect("placeholder pattern is valid")
});

/// Which token forms are recognized for a mapping key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstitutionOptions {
    /// Also replace the bare key text itself, not only `${key}` / `{{key}}`.
    #[serde(default)]
    pub bare_keys: bool,
}

/// Every token form of `name` that should be replaced.
pub fn placeholder_tokens(name: &str, options: SubstitutionOptions) -> Vec<String> {
    let mut tokens = vec![format!("${{{name}}}"), format!("{{{{{name}}}}}")];
    if options.bare_keys {
        tokens.push(name.to_string());
    }
    tokens
}

/// Result of substituting one group of segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    /// New text for each input segment, same length and order as the input.
    pub segments: Vec<String>,
    /// Mapping keys that were replaced at least once.
    pub replaced: BTreeSet<String>,
}

struct Token<'a> {
    text: String,
    name: &'a str,
    value: &'a str,
}

struct Hit<'a> {
    start: usize,
    end: usize,
    name: &'a str,
    value: &'a str,
}

fn build_tokens(mapping: &BTreeMap<String, String>, options: SubstitutionOptions) -> Vec<Token<'_>> {
    let mut tokens: Vec<Token<'_>> = mapping
        .iter()
        .filter(|(name, _)| !name.is_empty())
        .flat_map(|(name, value)| {
            placeholder_tokens(name, options)
                .into_iter()
                .map(move |text| Token {
                    text,
                    name: name.as_str(),
                    value: value.as_str(),
                })
        })
        .collect();
    // Longest first so `{{id}}` wins over a bare `id` at the same position.
    tokens.sort_by(|a, b| b.text.len().cmp(&a.text.len()));
    tokens
}

/// Leftmost-longest, non-overlapping token occurrences in `text`.
fn find_hits<'a>(text: &str, tokens: &[Token<'a>]) -> Vec<Hit<'a>> {
    let mut hits = Vec::new();
    let mut pos = 0;
    while pos < text.len() {
        let rest = &text[pos..];
        if let Some(token) = tokens.iter().find(|t| rest.starts_with(t.text.as_str())) {
            hits.push(Hit {
                start: pos,
                end: pos + token.text.len(),
                name: token.name,
                value: token.value,
            });
            pos += token.text.len();
        } else {
            pos += rest.chars().next().map_or(1, char::len_utf8);
        }
    }
    hits
}

/// Substitute mapping values into text that is split across `segments`.
///
/// Returns `None` when no token occurs in the joined text, so callers can
/// leave the underlying document untouched.
pub fn substitute_segments<S: AsRef<str>>(
    segments: &[S],
    mapping: &BTreeMap<String, String>,
    options: SubstitutionOptions,
) -> Option<Substitution> {
    if segments.is_empty() || mapping.is_empty() {
        return None;
    }

    let mut joined = String::new();
    let mut owners: Vec<usize> = Vec::new();
    for (index, segment) in segments.iter().enumerate() {
        let segment = segment.as_ref();
        joined.push_str(segment);
        owners.extend(std::iter::repeat_n(index, segment.len()));
    }

    let tokens = build_tokens(mapping, options);
    let hits = find_hits(&joined, &tokens);
    if hits.is_empty() {
        return None;
    }

    let mut out: Vec<String> = vec![String::new(); segments.len()];
    let mut replaced = BTreeSet::new();
    let mut hits = hits.into_iter().peekable();
    let mut pos = 0;

    while pos < joined.len() {
        if let Some(hit) = hits.next_if(|h| h.start == pos) {
            out[owners[hit.start]].push_str(hit.value);
            replaced.insert(hit.name.to_string());
            pos = hit.end;
            continue;
        }
        let Some(ch) = joined[pos..].chars().next() else {
            break;
        };
        out[owners[pos]].push(ch);
        pos += ch.len_utf8();
    }

    Some(Substitution {
        segments: out,
        replaced,
    })
}

/// Substitute within a single string. Returns the input unchanged when no
/// token occurs.
pub fn substitute_text(
    text: &str,
    mapping: &BTreeMap<String, String>,
    options: SubstitutionOptions,
) -> (String, BTreeSet<String>) {
    match substitute_segments(&[text], mapping, options) {
        Some(mut sub) => (sub.segments.remove(0), sub.replaced),
        None => (text.to_string(), BTreeSet::new()),
    }
}

/// `${...}` and `{{...}}` tokens still present in `text`.
pub fn unresolved_tokens(text: &str) -> Vec<String> {
    UNRESOLVED_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}
