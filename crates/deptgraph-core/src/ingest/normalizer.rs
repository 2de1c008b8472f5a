use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::schema::{NodeType, SchemaRegistry};
use crate::{Error, Result};

const TITLES: &[&str] = &["dr", "prof", "professor", "mr", "mrs", "ms", "shri", "smt"];

/// Identity key for exact matching: two mentions with equal keys are the
/// same entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NormalizedKey {
    pub node_type: NodeType,
    pub simplified_name: String,
}

impl std::fmt::Display for NormalizedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.node_type, self.simplified_name)
    }
}

/// A mention after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedMention {
    pub key: NormalizedKey,
    /// Titles stripped and whitespace collapsed, original casing kept.
    pub display_name: String,
    pub raw: String,
}

pub struct Normalizer<'a> {
    schema: &'a SchemaRegistry,
}

impl<'a> Normalizer<'a> {
    #[must_use]
    pub fn new(schema: &'a SchemaRegistry) -> Self {
        Self { schema }
    }

    pub fn normalize(&self, mention: &str, type_hint: &str) -> Result<NormalizedMention> {
        let node_type = self
            .schema
            .node_type(type_hint)
            .map_err(|_| Error::InvalidTypeHint(type_hint.to_string()))?;

        let display_name = display_name(mention);
        let simplified_name = simplify(&display_name);
        if simplified_name.is_empty() {
            return Err(Error::UnresolvedEntity(format!(
                "mention {mention:?} is empty after normalization"
            )));
        }

        Ok(NormalizedMention {
            key: NormalizedKey {
                node_type,
                simplified_name,
            },
            display_name,
            raw: mention.trim().to_string(),
        })
    }
}

/// Strips leading titles (repeatedly, so "Prof. Dr. X" becomes "X") and
/// collapses whitespace.
#[must_use]
pub fn display_name(mention: &str) -> String {
    let mut tokens: Vec<&str> = mention.split_whitespace().collect();
    let mut start = 0;

    while let Some(&token) = tokens.get(start) {
        match strip_title(token) {
            Some("") => start += 1,
            Some(rest) => tokens[start] = rest,
            None => break,
        }
    }

    tokens[start..].join(" ")
}

/// `"Dr."` -> `Some("")`, `"Dr.Sharma"` -> `Some("Sharma")`, `"Drishti"` -> `None`.
fn strip_title(token: &str) -> Option<&str> {
    let is_title = |word: &str| TITLES.iter().any(|t| word.eq_ignore_ascii_case(t));

    let word = token.strip_suffix('.').unwrap_or(token);
    if is_title(word) {
        return Some("");
    }

    token
        .split_once('.')
        .filter(|(head, _)| is_title(*head))
        .map(|(_, rest)| rest)
}

/// Lower-case, diacritic-free, punctuation-free form with single spaces.
#[must_use]
pub fn simplify(name: &str) -> String {
    let folded: String = name
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    collapse_whitespace(&folded)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
