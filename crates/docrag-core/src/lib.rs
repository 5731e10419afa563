#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod config;
pub mod error;
pub mod extract;
pub mod query;
pub mod segmenter;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use query::{DurationUnit, Gender, PolicyDuration, StructuredQuery};
pub use segmenter::{segment, Segmenter, SegmenterConfig};
pub use types::{DocId, Document, Metadata, SearchResult, Segment};
