//! Ingest documents into a vector index and answer similarity queries.
//!
//! The service owns the index behind a read/write lock. Segmentation and
//! embedding run outside the lock; only the final append takes the write
//! side, so readers never observe a partially ingested document.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use rayon::prelude::*;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use docrag_core::error::{Error, Result};
use docrag_core::query::StructuredQuery;
use docrag_core::segmenter::Segmenter;
use docrag_core::traits::{Embedder, VectorIndex};
use docrag_core::types::{Document, Metadata, SearchResult, Segment};
use docrag_embed::validate_embeddings;
use docrag_vector::FlatIndex;

/// Snapshot of what the service currently holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStatus {
    pub entries: usize,
    pub dimension: usize,
    pub embedder_id: String,
}

/// Segments ready to be appended, with vectors and metadata aligned.
#[derive(Default)]
struct Prepared {
    vectors: Vec<Vec<f32>>,
    texts: Vec<String>,
    metadata: Vec<Metadata>,
}

impl Prepared {
    fn len(&self) -> usize {
        self.texts.len()
    }

    fn extend(&mut self, other: Prepared) {
        self.vectors.extend(other.vectors);
        self.texts.extend(other.texts);
        self.metadata.extend(other.metadata);
    }
}

pub struct RetrievalService<VI: VectorIndex = FlatIndex> {
    index: RwLock<VI>,
    embedder: Arc<dyn Embedder>,
    segmenter: Segmenter,
}

impl<VI: VectorIndex> RetrievalService<VI> {
    /// Fails with `DimensionMismatch` when the embedder and the index
    /// disagree on vector length.
    pub fn new(index: VI, embedder: Arc<dyn Embedder>, segmenter: Segmenter) -> Result<Self> {
        if embedder.dim() != index.dim() {
            return Err(Error::DimensionMismatch { expected: index.dim(), actual: embedder.dim() });
        }
        Ok(Self { index: RwLock::new(index), embedder, segmenter })
    }

    /// Load a persisted index from `location` and serve it with `embedder`.
    pub fn open(location: &Path, embedder: Arc<dyn Embedder>, segmenter: Segmenter) -> Result<Self> {
        let index = VI::load(location)?;
        Self::new(index, embedder, segmenter)
    }

    pub fn segmenter(&self) -> &Segmenter {
        &self.segmenter
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Segment `text`, embed every segment and append them in one step.
    /// Returns the number of entries added; empty text adds nothing.
    pub fn ingest(&self, text: &str, base_metadata: &Metadata) -> Result<usize> {
        let prepared = self.prepare(text, None, base_metadata)?;
        self.commit(prepared)
    }

    /// Like [`ingest`](Self::ingest), also recording `doc_id` and `source`.
    pub fn ingest_document(&self, doc: &Document, base_metadata: &Metadata) -> Result<usize> {
        let prepared = self.prepare(&doc.text, Some(doc), base_metadata)?;
        self.commit(prepared)
    }

    /// Prepare documents in parallel, then append all of them together.
    /// A failure in any document means nothing is added.
    pub fn ingest_many(&self, docs: &[Document], base_metadata: &Metadata) -> Result<usize> {
        let batches = docs
            .par_iter()
            .map(|doc| self.prepare(&doc.text, Some(doc), base_metadata))
            .collect::<Result<Vec<_>>>()?;
        let mut all = Prepared::default();
        for batch in batches {
            all.extend(batch);
        }
        self.commit(all)
    }

    pub fn retrieve(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        let vector = self.embedder.embed(query).map_err(as_embedding_error)?;
        let results = self.index.read().search(&vector, k)?;
        debug!(k, hits = results.len(), "retrieved");
        Ok(results)
    }

    pub fn retrieve_structured(&self, query: &StructuredQuery, k: usize) -> Result<Vec<SearchResult>> {
        self.retrieve(&query.to_search_text(), k)
    }

    pub fn status(&self) -> IndexStatus {
        let index = self.index.read();
        IndexStatus { entries: index.len(), dimension: index.dim(), embedder_id: self.embedder.embedder_id().to_string() }
    }

    pub fn persist(&self, location: &Path) -> Result<()> {
        self.index.read().persist(location)
    }

    pub fn into_index(self) -> VI {
        self.index.into_inner()
    }

    fn prepare(&self, text: &str, doc: Option<&Document>, base: &Metadata) -> Result<Prepared> {
        let segments = self.segmenter.segment(text);
        if segments.is_empty() {
            return Ok(Prepared::default());
        }
        let texts: Vec<String> = segments.iter().map(|s| s.text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).map_err(as_embedding_error)?;
        validate_embeddings(&vectors, texts.len(), self.embedder.dim())?;

        let total = segments.len();
        let metadata = segments.iter().map(|s| segment_metadata(base, doc, s, total)).collect();
        Ok(Prepared { vectors, texts, metadata })
    }

    fn commit(&self, prepared: Prepared) -> Result<usize> {
        let added = prepared.len();
        if added == 0 {
            return Ok(0);
        }
        let mut index = self.index.write();
        index.add(prepared.vectors, prepared.texts, Some(prepared.metadata))?;
        info!(added, total = index.len(), "ingested segments");
        Ok(added)
    }
}

impl RetrievalService<FlatIndex> {
    /// Ids of every document with at least one entry in the index.
    pub fn document_ids(&self) -> HashSet<String> {
        let index = self.index.read();
        (0..index.len())
            .filter_map(|i| index.metadata(i)?.get("doc_id")?.as_str().map(str::to_string))
            .collect()
    }
}

fn as_embedding_error(e: Error) -> Error {
    match e {
        Error::Embedding(_) => e,
        other => Error::Embedding(other.to_string()),
    }
}

fn segment_metadata(base: &Metadata, doc: Option<&Document>, segment: &Segment, total: usize) -> Metadata {
    let mut meta = base.clone();
    if let Some(doc) = doc {
        meta.insert("doc_id".into(), Value::from(doc.id.clone()));
        if let Some(source) = &doc.source {
            meta.insert("source".into(), Value::from(source.display().to_string()));
        }
    }
    meta.insert("chunk_index".into(), Value::from(segment.ordinal));
    meta.insert("total_chunks".into(), Value::from(total));
    meta.insert("start_offset".into(), Value::from(segment.start_offset));
    meta.insert("end_offset".into(), Value::from(segment.end_offset));
    meta
}
