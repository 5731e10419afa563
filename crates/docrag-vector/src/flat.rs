use std::cmp::Ordering;
use std::fmt;
use std::path::Path;

use tracing::{debug, info};

use docrag_core::error::{Error, Result};
use docrag_core::traits::VectorIndex;
use docrag_core::types::{Metadata, SearchResult};

use crate::snapshot;

/// Exact (brute-force) nearest-neighbour index over unit-normalized vectors.
///
/// Vectors live in one row-major buffer; `texts` and `metadata` are parallel
/// stores indexed by insertion position. Entries are never removed or
/// reordered.
#[derive(Clone)]
pub struct FlatIndex {
    dim: usize,
    vectors: Vec<f32>,
    texts: Vec<String>,
    metadata: Vec<Metadata>,
}

impl fmt::Debug for FlatIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlatIndex").field("dim", &self.dim).field("len", &self.texts.len()).finish()
    }
}

/// Scale `v` to unit L2 norm in place. A zero vector is left unchanged.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Half the squared Euclidean distance. For unit vectors this equals
/// `1 - cos(a, b)`, so `1 - distance` is the cosine similarity.
fn normalized_distance(a: &[f32], b: &[f32]) -> f32 {
    0.5 * a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f32>()
}

/// Distance reported when either side has no direction: cosine 0, score 0.
const ORTHOGONAL: f32 = 1.0;

fn is_zero(v: &[f32]) -> bool {
    v.iter().all(|x| *x == 0.0)
}

fn by_distance_then_position(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    a.1.total_cmp(&b.1).then(a.0.cmp(&b.0))
}

impl FlatIndex {
    pub fn new(dim: usize) -> Result<Self> {
        if dim == 0 {
            return Err(Error::InvalidConfig("index dimension must be positive".into()));
        }
        Ok(Self { dim, vectors: Vec::new(), texts: Vec::new(), metadata: Vec::new() })
    }

    /// Stored (normalized) vector at insertion position `i`.
    pub fn vector(&self, i: usize) -> Option<&[f32]> {
        self.vectors.chunks_exact(self.dim).nth(i)
    }

    pub fn text(&self, i: usize) -> Option<&str> {
        self.texts.get(i).map(String::as_str)
    }

    pub fn metadata(&self, i: usize) -> Option<&Metadata> {
        self.metadata.get(i)
    }

    fn check_vector(&self, v: &[f32]) -> Result<()> {
        if v.len() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: v.len() });
        }
        if v.iter().any(|x| !x.is_finite()) {
            return Err(Error::InvalidInput("vector contains non-finite components".into()));
        }
        Ok(())
    }
}

impl VectorIndex for FlatIndex {
    fn dim(&self) -> usize {
        self.dim
    }

    fn len(&self) -> usize {
        self.texts.len()
    }

    fn add(&mut self, vectors: Vec<Vec<f32>>, texts: Vec<String>, metadata: Option<Vec<Metadata>>) -> Result<()> {
        // Validate the whole batch before touching any store.
        if texts.len() != vectors.len() {
            return Err(Error::InvalidInput(format!("{} vectors but {} texts", vectors.len(), texts.len())));
        }
        if let Some(m) = &metadata {
            if m.len() != vectors.len() {
                return Err(Error::InvalidInput(format!("{} vectors but {} metadata entries", vectors.len(), m.len())));
            }
        }
        for v in &vectors {
            self.check_vector(v)?;
        }
        if vectors.is_empty() {
            return Ok(());
        }

        let added = vectors.len();
        self.vectors.reserve(added * self.dim);
        for mut v in vectors {
            l2_normalize(&mut v);
            self.vectors.extend_from_slice(&v);
        }
        self.texts.extend(texts);
        match metadata {
            Some(m) => self.metadata.extend(m),
            None => self.metadata.extend(std::iter::repeat_with(Metadata::new).take(added)),
        }
        debug!(added, total = self.texts.len(), "appended vectors");
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        self.check_vector(query)?;
        if k == 0 || self.texts.is_empty() {
            return Ok(Vec::new());
        }
        let mut q = query.to_vec();
        l2_normalize(&mut q);
        let query_is_zero = is_zero(&q);

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .chunks_exact(self.dim)
            .enumerate()
            .map(|(i, v)| {
                let distance = if query_is_zero || is_zero(v) { ORTHOGONAL } else { normalized_distance(&q, v) };
                (i, distance)
            })
            .collect();
        if k < scored.len() {
            scored.select_nth_unstable_by(k, by_distance_then_position);
            scored.truncate(k);
        }
        scored.sort_by(by_distance_then_position);

        Ok(scored
            .into_iter()
            .map(|(i, distance)| SearchResult {
                content: self.texts[i].clone(),
                score: 1.0 - distance,
                metadata: self.metadata[i].clone(),
            })
            .collect())
    }

    fn persist(&self, location: &Path) -> Result<()> {
        let path = snapshot::write(location, self.dim, &self.vectors, &self.texts, &self.metadata)?;
        info!(path = %path.display(), entries = self.texts.len(), dim = self.dim, "persisted index snapshot");
        Ok(())
    }

    fn load(location: &Path) -> Result<Self> {
        let snap = snapshot::read(location)?;
        info!(location = %location.display(), entries = snap.texts.len(), dim = snap.dimension, saved_at_ms = snap.saved_at_ms, "loaded index snapshot");
        Ok(Self { dim: snap.dimension, vectors: snap.vectors, texts: snap.texts, metadata: snap.metadata })
    }
}
