//! Domain types shared by the segmenter, the vector index and the retrieval
//! service.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub type DocId = String;

/// Per-entry metadata, kept as a JSON object so callers can attach
/// arbitrary structured fields (policy type, effective date, ...).
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Plain text produced by an extractor, with a stable identity.
///
/// - `id`: document identity (file stem or external id)
/// - `source`: original path, when the document came from disk
/// - `text`: UTF-8 payload; never mutated after extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub source: Option<PathBuf>,
    pub text: String,
}

impl Document {
    pub fn new(id: impl Into<DocId>, text: impl Into<String>) -> Self {
        Self { id: id.into(), source: None, text: text.into() }
    }

    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// A bounded slice of a document's text.
///
/// Offsets count characters (Unicode scalar values), not bytes, and describe
/// the half-open span `[start_offset, end_offset)` the text was cut from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub text: String,
    pub ordinal: usize,
    pub start_offset: usize,
    pub end_offset: usize,
}

impl Segment {
    pub fn len(&self) -> usize {
        self.end_offset - self.start_offset
    }

    pub fn is_empty(&self) -> bool {
        self.start_offset == self.end_offset
    }
}

/// One ranked hit from the vector index.
///
/// `score` is cosine similarity in `[-1, 1]`; higher is always better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub content: String,
    pub score: f32,
    pub metadata: Metadata,
}
