//! Content-addressed embedding cache.
//!
//! Vectors are keyed by the blake3 hash of the input text. The cache is
//! scoped to a single wrapped provider, so the provider id is implied. Only
//! misses reach the inner embedder; eviction is first-in, first-out once
//! `capacity` entries are held.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use tracing::debug;

use docrag_core::error::Result;
use docrag_core::traits::Embedder;

use crate::validate_embeddings;

fn content_hash(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

#[derive(Default)]
struct Entries {
    vectors: HashMap<String, Vec<f32>>,
    order: VecDeque<String>,
}

pub struct CachedEmbedder<E> {
    inner: E,
    capacity: usize,
    entries: Mutex<Entries>,
}

impl<E: Embedder> CachedEmbedder<E> {
    pub fn new(inner: E, capacity: usize) -> Self {
        Self { inner, capacity, entries: Mutex::new(Entries::default()) }
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    /// Number of cached vectors.
    pub fn cached(&self) -> usize {
        self.entries.lock().vectors.len()
    }

    fn insert(&self, hash: String, vector: Vec<f32>) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock();
        if entries.vectors.contains_key(&hash) {
            return;
        }
        while entries.order.len() >= self.capacity {
            match entries.order.pop_front() {
                Some(oldest) => {
                    entries.vectors.remove(&oldest);
                }
                None => break,
            }
        }
        entries.order.push_back(hash.clone());
        entries.vectors.insert(hash, vector);
    }
}

impl<E: Embedder> Embedder for CachedEmbedder<E> {
    fn embedder_id(&self) -> &str {
        self.inner.embedder_id()
    }

    fn dim(&self) -> usize {
        self.inner.dim()
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let hashes: Vec<String> = texts.iter().map(|t| content_hash(t)).collect();
        let mut out: Vec<Option<Vec<f32>>> = vec![None; texts.len()];

        // Unique misses in first-seen order; duplicates in one batch embed once.
        let mut miss_texts = Vec::new();
        let mut miss_hashes: Vec<&str> = Vec::new();
        let mut miss_slot: HashMap<&str, usize> = HashMap::new();
        {
            let entries = self.entries.lock();
            for (i, h) in hashes.iter().enumerate() {
                if let Some(v) = entries.vectors.get(h) {
                    out[i] = Some(v.clone());
                } else if !miss_slot.contains_key(h.as_str()) {
                    miss_slot.insert(h.as_str(), miss_texts.len());
                    miss_hashes.push(h.as_str());
                    miss_texts.push(texts[i].clone());
                }
            }
        }
        debug!(batch = texts.len(), misses = miss_texts.len(), "embedding cache lookup");

        if !miss_texts.is_empty() {
            let fresh = self.inner.embed_batch(&miss_texts)?;
            validate_embeddings(&fresh, miss_texts.len(), self.inner.dim())?;
            for (i, h) in hashes.iter().enumerate() {
                if out[i].is_none() {
                    if let Some(&slot) = miss_slot.get(h.as_str()) {
                        out[i] = Some(fresh[slot].clone());
                    }
                }
            }
            for (h, vector) in miss_hashes.into_iter().zip(fresh) {
                self.insert(h.to_string(), vector);
            }
        }

        Ok(out.into_iter().flatten().collect())
    }
}
