use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A scraped page, or one chunk of it, ready for extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub id: String,
    pub text: String,
}

impl SourceDocument {
    #[must_use]
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// Splits `text` into trimmed pieces of at most `max_chars` characters,
/// breaking at the last newline in the window, else the last whitespace,
/// else mid-word.
#[must_use]
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<&str> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut rest = text.trim();

    while !rest.is_empty() {
        let Some((limit, _)) = rest.char_indices().nth(max_chars) else {
            chunks.push(rest);
            break;
        };

        let window = &rest[..limit];
        let cut = window
            .rfind('\n')
            .or_else(|| window.rfind(char::is_whitespace))
            .filter(|&i| i > 0)
            .unwrap_or(limit);

        let chunk = rest[..cut].trim_end();
        if !chunk.is_empty() {
            chunks.push(chunk);
        }
        rest = rest[cut..].trim_start();
    }

    chunks
}

/// Chunk documents for `document`. A single chunk keeps the document id;
/// several are numbered `<id>#1`, `<id>#2`, ...
pub fn chunk_document(document: &SourceDocument, max_chars: usize) -> Result<Vec<SourceDocument>> {
    let chunks = chunk_text(&document.text, max_chars);

    match chunks.as_slice() {
        [] => Err(Error::UnrecoverableInput {
            document_id: document.id.clone(),
            reason: "document has no text".to_string(),
        }),
        [only] => Ok(vec![SourceDocument::new(document.id.clone(), *only)]),
        many => Ok(many
            .iter()
            .enumerate()
            .map(|(i, chunk)| SourceDocument::new(format!("{}#{}", document.id, i + 1), *chunk))
            .collect()),
    }
}
