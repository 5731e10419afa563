use std::sync::atomic::{AtomicUsize, Ordering};

use docrag_core::error::{Error, Result};
use docrag_core::traits::Embedder;
use docrag_embed::{default_embedder, validate_embeddings, CachedEmbedder, HashEmbedder};

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[test]
fn hash_embedder_shapes_and_determinism() {
    let embedder = HashEmbedder::new(256).expect("embedder");
    let texts = vec!["hello world".to_string(), "Hello, WORLD!".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 256, "embedding dim is 256");

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    // Case and punctuation do not change the token set.
    for (a, b) in v1.iter().zip(v2.iter()) {
        assert!((a - b).abs() <= 1e-6);
    }
    assert_eq!(embedder.embedder_id(), "hash:xxh64:d256");
}

#[test]
fn shared_vocabulary_scores_higher() {
    let embedder = HashEmbedder::new(512).expect("embedder");
    let query = embedder.embed("knee surgery coverage").expect("q");
    let related = embedder.embed("coverage for knee surgery after waiting period").expect("r");
    let unrelated = embedder.embed("maternity benefits exclusions").expect("u");
    assert!(cosine(&query, &related) > cosine(&query, &unrelated));
}

#[test]
fn zero_dimension_is_rejected() {
    assert!(matches!(HashEmbedder::new(0), Err(Error::InvalidConfig(_))));
}

struct Counting {
    inner: HashEmbedder,
    calls: AtomicUsize,
    texts: AtomicUsize,
}

impl Embedder for Counting {
    fn embedder_id(&self) -> &str {
        self.inner.embedder_id()
    }
    fn dim(&self) -> usize {
        self.inner.dim()
    }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.fetch_add(texts.len(), Ordering::SeqCst);
        self.inner.embed_batch(texts)
    }
}

#[test]
fn cache_only_embeds_misses() {
    let counting = Counting { inner: HashEmbedder::new(64).expect("embedder"), calls: AtomicUsize::new(0), texts: AtomicUsize::new(0) };
    let cached = CachedEmbedder::new(counting, 100);

    let first = cached.embed_batch(&["a b".to_string(), "c d".to_string(), "a b".to_string()]).expect("first");
    assert_eq!(first.len(), 3);
    assert_eq!(first[0], first[2]);
    assert_eq!(cached.inner().texts.load(Ordering::SeqCst), 2, "duplicate input embedded once");

    let second = cached.embed_batch(&["c d".to_string(), "e f".to_string()]).expect("second");
    assert_eq!(second[0], first[1]);
    assert_eq!(cached.inner().texts.load(Ordering::SeqCst), 3);

    let _ = cached.embed_batch(&["a b".to_string()]).expect("third");
    assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 2, "full hit skips the provider");
    assert_eq!(cached.cached(), 3);
}

#[test]
fn cache_evicts_oldest_beyond_capacity() {
    let cached = CachedEmbedder::new(HashEmbedder::new(16).expect("embedder"), 2);
    for t in ["one", "two", "three"] {
        cached.embed(t).expect("embed");
    }
    assert_eq!(cached.cached(), 2);
}

struct Broken;

impl Embedder for Broken {
    fn embedder_id(&self) -> &str {
        "broken"
    }
    fn dim(&self) -> usize {
        4
    }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![0.0; 3]).collect())
    }
}

#[test]
fn cache_rejects_wrong_provider_output() {
    let cached = CachedEmbedder::new(Broken, 10);
    assert!(matches!(cached.embed_batch(&["x".to_string()]), Err(Error::Embedding(_))));
    assert_eq!(cached.cached(), 0, "invalid vectors are never cached");
}

#[test]
fn validate_embeddings_checks_count_and_dim() {
    assert!(validate_embeddings(&[vec![0.0; 3]], 1, 3).is_ok());
    assert!(matches!(validate_embeddings(&[vec![0.0; 3]], 2, 3), Err(Error::Embedding(_))));
    assert!(matches!(validate_embeddings(&[vec![0.0; 2]], 1, 3), Err(Error::Embedding(_))));
}

#[test]
fn default_embedder_reports_dimension() {
    let embedder = default_embedder(128, 16).expect("default");
    assert_eq!(embedder.dim(), 128);
    assert_eq!(embedder.embed("policy").expect("embed").len(), 128);
}
