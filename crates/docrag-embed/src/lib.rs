//! Embedding providers.
//!
//! Real model inference is an injected capability; this crate ships the
//! deterministic [`HashEmbedder`] and the [`CachedEmbedder`] wrapper that any
//! provider can sit behind.

use std::sync::Arc;

use tracing::info;

use docrag_core::error::{Error, Result};
use docrag_core::traits::Embedder;

pub mod cache;
pub mod hashing;

pub use cache::CachedEmbedder;
pub use hashing::HashEmbedder;

/// Check a provider's output: one vector per input, each of length `dim`.
pub fn validate_embeddings(vectors: &[Vec<f32>], expected: usize, dim: usize) -> Result<()> {
    if vectors.len() != expected {
        return Err(Error::Embedding(format!(
            "provider returned {} vectors for {} inputs",
            vectors.len(),
            expected
        )));
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
        return Err(Error::Embedding(format!(
            "provider returned a vector of length {} (expected {})",
            bad.len(),
            dim
        )));
    }
    Ok(())
}

/// Build the process-wide embedder: a [`HashEmbedder`] of `dim`, cached when
/// `cache_capacity > 0`.
pub fn default_embedder(dim: usize, cache_capacity: usize) -> Result<Arc<dyn Embedder>> {
    let base = HashEmbedder::new(dim)?;
    info!(embedder = base.embedder_id(), cache_capacity, "embedder ready");
    if cache_capacity == 0 {
        return Ok(Arc::new(base));
    }
    Ok(Arc::new(CachedEmbedder::new(base, cache_capacity)))
}
