//! docrag-vector
//!
//! Exact flat vector index with a versioned binary snapshot. Other backends
//! plug in through `docrag_core::traits::VectorIndex`.

pub mod flat;
pub mod snapshot;

pub use flat::{l2_normalize, FlatIndex};
pub use snapshot::{FORMAT_VERSION, SNAPSHOT_FILE};
