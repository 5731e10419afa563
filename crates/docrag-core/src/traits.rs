use std::path::Path;

use crate::error::Result;
use crate::types::{Metadata, SearchResult};

/// Text → fixed-length vector capability.
///
/// Implementations must be deterministic for a given `embedder_id` and input,
/// and every returned vector must have exactly `dim()` components.
pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `hash:xxh64:d384`).
    fn embedder_id(&self) -> &str;
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| crate::error::Error::Embedding("provider returned no vector".into()))
    }
}

/// Append-only nearest-neighbour store.
///
/// Backends keep vectors, texts and metadata positionally aligned; `add` is
/// all-or-nothing and `search` never fails on an empty index.
pub trait VectorIndex: Send + Sync {
    fn dim(&self) -> usize;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn add(&mut self, vectors: Vec<Vec<f32>>, texts: Vec<String>, metadata: Option<Vec<Metadata>>) -> Result<()>;
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>>;
    fn persist(&self, location: &Path) -> Result<()>;
    fn load(location: &Path) -> Result<Self>
    where
        Self: Sized;
}

/// Bytes in a declared format → plain UTF-8 text.
pub trait TextExtractor: Send + Sync {
    fn supports(&self, declared_format: &str) -> bool;
    fn extract(&self, bytes: &[u8], declared_format: &str) -> Result<String>;
}
