use std::fs;

use serde_json::json;
use tempfile::TempDir;

use docrag_core::error::Error;
use docrag_core::traits::VectorIndex;
use docrag_core::types::Metadata;
use docrag_vector::{snapshot, FlatIndex, FORMAT_VERSION, SNAPSHOT_FILE};

fn meta(pairs: &[(&str, serde_json::Value)]) -> Metadata {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

fn populated(n: usize, dim: usize) -> FlatIndex {
    let mut index = FlatIndex::new(dim).expect("index");
    let vectors: Vec<Vec<f32>> = (0..n)
        .map(|i| (0..dim).map(|j| ((i * 31 + j * 17) % 11) as f32 - 5.0).collect())
        .collect();
    let texts = (0..n).map(|i| format!("segment {i}")).collect();
    let metadata = (0..n).map(|i| meta(&[("chunk_index", json!(i)), ("doc_id", json!("policy"))])).collect();
    index.add(vectors, texts, Some(metadata)).expect("add");
    index
}

#[test]
fn orthogonal_vectors_rank_by_cosine() {
    let mut index = FlatIndex::new(2).expect("index");
    index
        .add(vec![vec![1.0, 0.0], vec![0.0, 1.0]], vec!["A".into(), "B".into()], None)
        .expect("add");

    let results = index.search(&[1.0, 0.0], 5).expect("search");
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].content, "A");
    assert_eq!(results[0].score, 1.0);
    assert_eq!(results[1].content, "B");
    assert_eq!(results[1].score, 0.0);
    assert!(results[0].metadata.is_empty(), "metadata defaults to empty maps");
}

#[test]
fn vectors_are_normalized_on_insert_and_query() {
    let mut index = FlatIndex::new(2).expect("index");
    index.add(vec![vec![3.0, 4.0]], vec!["x".into()], None).expect("add");
    let stored = index.vector(0).expect("stored");
    assert!((stored[0] - 0.6).abs() < 1e-6 && (stored[1] - 0.8).abs() < 1e-6);

    let results = index.search(&[30.0, 40.0], 1).expect("search");
    assert!((results[0].score - 1.0).abs() < 1e-6);

    let opposite = index.search(&[-3.0, -4.0], 1).expect("search");
    assert!((opposite[0].score + 1.0).abs() < 1e-6);
}

#[test]
fn search_returns_min_k_n_with_non_increasing_scores() {
    let index = populated(25, 8);
    let query = [0.3, -1.0, 2.0, 0.0, 0.5, 0.5, -0.25, 1.0];
    for k in [0usize, 1, 5, 25, 40] {
        let results = index.search(&query, k).expect("search");
        assert_eq!(results.len(), k.min(25));
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }
}

#[test]
fn ties_keep_insertion_order() {
    let mut index = FlatIndex::new(3).expect("index");
    let same = vec![0.0, 1.0, 0.0];
    index
        .add(
            vec![same.clone(), vec![1.0, 0.0, 0.0], same.clone(), same],
            vec!["first".into(), "other".into(), "second".into(), "third".into()],
            None,
        )
        .expect("add");
    let results = index.search(&[0.0, 2.0, 0.0], 3).expect("search");
    let order: Vec<&str> = results.iter().map(|r| r.content.as_str()).collect();
    assert_eq!(order, vec!["first", "second", "third"]);
}

#[test]
fn empty_index_search_is_empty() {
    let index = FlatIndex::new(4).expect("index");
    assert!(index.is_empty());
    assert!(index.search(&[1.0, 2.0, 3.0, 4.0], 5).expect("search").is_empty());
}

#[test]
fn dimension_mismatch_on_add_is_all_or_nothing() {
    let mut index = populated(3, 4);
    let err = index
        .add(
            vec![vec![1.0, 0.0, 0.0, 0.0], vec![1.0, 0.0, 0.0]],
            vec!["ok".into(), "short".into()],
            None,
        )
        .expect_err("mismatch");
    assert!(matches!(err, Error::DimensionMismatch { expected: 4, actual: 3 }));
    assert_eq!(index.len(), 3, "no partial append");
    assert_eq!(index.text(3), None);
}

#[test]
fn dimension_mismatch_on_search() {
    let index = populated(3, 4);
    assert!(matches!(index.search(&[1.0, 0.0], 2), Err(Error::DimensionMismatch { expected: 4, actual: 2 })));
}

#[test]
fn misaligned_batches_are_rejected() {
    let mut index = FlatIndex::new(2).expect("index");
    assert!(matches!(index.add(vec![vec![1.0, 0.0]], vec![], None), Err(Error::InvalidInput(_))));
    assert!(matches!(
        index.add(vec![vec![1.0, 0.0]], vec!["a".into()], Some(vec![])),
        Err(Error::InvalidInput(_))
    ));
    assert!(matches!(index.add(vec![vec![f32::NAN, 0.0]], vec!["a".into()], None), Err(Error::InvalidInput(_))));
    assert!(index.is_empty());
    index.add(vec![], vec![], None).expect("empty batch is a no-op");
    assert!(index.is_empty());
}

#[test]
fn zero_dimension_is_invalid() {
    assert!(matches!(FlatIndex::new(0), Err(Error::InvalidConfig(_))));
}

#[test]
fn persist_load_round_trip_is_observably_identical() {
    let index = populated(40, 6);
    let tmp = TempDir::new().expect("tmp");
    let location = tmp.path().join("snapshots");
    index.persist(&location).expect("persist");
    assert!(location.join(SNAPSHOT_FILE).is_file());

    let loaded = FlatIndex::load(&location).expect("load");
    assert_eq!(loaded.dim(), 6);
    assert_eq!(loaded.len(), 40);
    let queries = [
        [1.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        [0.5, -2.0, 1.0, 3.0, 0.0, 1.0],
        [-1.0, -1.0, -1.0, 1.0, 1.0, 1.0],
    ];
    for q in &queries {
        assert_eq!(index.search(q, 10).expect("orig"), loaded.search(q, 10).expect("loaded"));
    }
    assert_eq!(loaded.metadata(7).and_then(|m| m.get("chunk_index")), Some(&json!(7)));
}

#[test]
fn empty_index_round_trips() {
    let tmp = TempDir::new().expect("tmp");
    FlatIndex::new(3).expect("index").persist(tmp.path()).expect("persist");
    let loaded = FlatIndex::load(tmp.path()).expect("load");
    assert_eq!((loaded.dim(), loaded.len()), (3, 0));
}

#[test]
fn persist_overwrites_previous_snapshot() {
    let tmp = TempDir::new().expect("tmp");
    populated(2, 3).persist(tmp.path()).expect("first");
    populated(5, 3).persist(tmp.path()).expect("second");
    assert_eq!(FlatIndex::load(tmp.path()).expect("load").len(), 5);
    let leftovers = fs::read_dir(tmp.path()).expect("read_dir").count();
    assert_eq!(leftovers, 1, "staging files are renamed away");
}

#[test]
fn unknown_format_version_is_rejected() {
    let tmp = TempDir::new().expect("tmp");
    populated(2, 3).persist(tmp.path()).expect("persist");
    let path = snapshot::snapshot_path(tmp.path());
    let mut bytes = fs::read(&path).expect("read");
    bytes[4..8].copy_from_slice(&(FORMAT_VERSION + 1).to_le_bytes());
    fs::write(&path, bytes).expect("write");

    let err = FlatIndex::load(tmp.path()).expect_err("version mismatch");
    assert!(matches!(err, Error::Deserialization(_)));
    assert!(err.to_string().contains("version"));
}

#[test]
fn corrupt_snapshots_are_rejected() {
    let tmp = TempDir::new().expect("tmp");
    fs::write(snapshot::snapshot_path(tmp.path()), b"not a snapshot at all").expect("write");
    assert!(matches!(FlatIndex::load(tmp.path()), Err(Error::Deserialization(_))));

    populated(4, 3).persist(tmp.path()).expect("persist");
    let path = snapshot::snapshot_path(tmp.path());
    let bytes = fs::read(&path).expect("read");
    fs::write(&path, &bytes[..bytes.len() / 2]).expect("truncate");
    assert!(matches!(FlatIndex::load(tmp.path()), Err(Error::Deserialization(_))));
}

#[test]
fn missing_snapshot_surfaces_io_error() {
    let tmp = TempDir::new().expect("tmp");
    assert!(matches!(FlatIndex::load(&tmp.path().join("nope")), Err(Error::Io(_))));
}

#[test]
fn zero_vectors_score_as_orthogonal() {
    let mut index = FlatIndex::new(3).expect("index");
    index
        .add(vec![vec![0.3, 1.0, 0.0], vec![0.0, 0.0, 0.0]], vec!["related".into(), "blank".into()], None)
        .expect("add");

    let results = index.search(&[1.0, 0.0, 0.0], 2).expect("search");
    assert_eq!(results[0].content, "related");
    assert!(results[0].score > 0.28 && results[0].score < 0.29);
    assert_eq!(results[1].content, "blank");
    assert_eq!(results[1].score, 0.0);

    let blank_query = index.search(&[0.0, 0.0, 0.0], 2).expect("search");
    assert!(blank_query.iter().all(|r| r.score == 0.0));
    let order: Vec<&str> = blank_query.iter().map(|r| r.content.as_str()).collect();
    assert_eq!(order, vec!["related", "blank"], "ties fall back to insertion order");
}
