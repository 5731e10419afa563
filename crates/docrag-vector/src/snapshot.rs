//! Versioned on-disk snapshot of a flat index.
//!
//! Layout of `<location>/index.snapshot` (bincode, fixed-width little endian):
//!
//! - header: magic `b"DRIX"`, `format_version: u32`
//! - body: `dimension: u64`, `vector_count: u64`, `vectors: [f32]` (row-major,
//!   already unit-normalized), `texts: [String]`, `metadata: [String]` (one
//!   JSON object per entry), `saved_at_ms: i64`
//!
//! The header is decoded on its own first so an unknown version is rejected
//! before any attempt to read the body.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use docrag_core::error::{Error, Result};
use docrag_core::types::Metadata;

pub const SNAPSHOT_FILE: &str = "index.snapshot";
pub const FORMAT_VERSION: u32 = 1;
const MAGIC: [u8; 4] = *b"DRIX";

#[derive(Serialize, Deserialize)]
struct Header {
    magic: [u8; 4],
    format_version: u32,
}

#[derive(Serialize)]
struct BodyRef<'a> {
    dimension: u64,
    vector_count: u64,
    vectors: &'a [f32],
    texts: &'a [String],
    metadata: Vec<String>,
    saved_at_ms: i64,
}

#[derive(Deserialize)]
struct Body {
    dimension: u64,
    vector_count: u64,
    vectors: Vec<f32>,
    texts: Vec<String>,
    metadata: Vec<String>,
    saved_at_ms: i64,
}

/// Decoded snapshot contents.
pub struct Snapshot {
    pub dimension: usize,
    pub vectors: Vec<f32>,
    pub texts: Vec<String>,
    pub metadata: Vec<Metadata>,
    pub saved_at_ms: i64,
}

pub fn snapshot_path(location: &Path) -> PathBuf {
    location.join(SNAPSHOT_FILE)
}

fn encode_err(e: bincode::Error) -> Error {
    Error::Io(std::io::Error::other(e.to_string()))
}

fn decode_err(e: bincode::Error) -> Error {
    Error::Deserialization(e.to_string())
}

/// Write a snapshot atomically: the artifact is staged in a temporary file
/// inside `location` and renamed over the previous one.
pub fn write(location: &Path, dimension: usize, vectors: &[f32], texts: &[String], metadata: &[Metadata]) -> Result<PathBuf> {
    fs::create_dir_all(location)?;
    let metadata = metadata
        .iter()
        .map(serde_json::to_string)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::InvalidInput(format!("metadata is not serializable: {e}")))?;
    let header = Header { magic: MAGIC, format_version: FORMAT_VERSION };
    let body = BodyRef {
        dimension: dimension as u64,
        vector_count: texts.len() as u64,
        vectors,
        texts,
        metadata,
        saved_at_ms: chrono::Utc::now().timestamp_millis(),
    };

    let mut staged = tempfile::NamedTempFile::new_in(location)?;
    {
        let mut writer = BufWriter::new(staged.as_file_mut());
        bincode::serialize_into(&mut writer, &header).map_err(encode_err)?;
        bincode::serialize_into(&mut writer, &body).map_err(encode_err)?;
        writer.flush()?;
    }
    staged.as_file().sync_all()?;
    let path = snapshot_path(location);
    staged.persist(&path).map_err(|e| Error::Io(e.error))?;
    Ok(path)
}

pub fn read(location: &Path) -> Result<Snapshot> {
    let file = File::open(snapshot_path(location))?;
    let mut reader = BufReader::new(file);

    let header: Header = bincode::deserialize_from(&mut reader).map_err(decode_err)?;
    if header.magic != MAGIC {
        return Err(Error::Deserialization("not a docrag index snapshot".into()));
    }
    if header.format_version != FORMAT_VERSION {
        return Err(Error::Deserialization(format!(
            "unsupported snapshot format version {} (expected {})",
            header.format_version, FORMAT_VERSION
        )));
    }

    let body: Body = bincode::deserialize_from(&mut reader).map_err(decode_err)?;
    let dimension = usize::try_from(body.dimension).map_err(|_| Error::Deserialization("dimension overflows usize".into()))?;
    let count = usize::try_from(body.vector_count).map_err(|_| Error::Deserialization("vector count overflows usize".into()))?;
    if dimension == 0 {
        return Err(Error::Deserialization("snapshot dimension is zero".into()));
    }
    if dimension.checked_mul(count) != Some(body.vectors.len()) {
        return Err(Error::Deserialization(format!(
            "expected {} x {} vector components, found {}",
            count,
            dimension,
            body.vectors.len()
        )));
    }
    if body.texts.len() != count || body.metadata.len() != count {
        return Err(Error::Deserialization(format!(
            "parallel stores disagree: {} vectors, {} texts, {} metadata",
            count,
            body.texts.len(),
            body.metadata.len()
        )));
    }
    let metadata = body
        .metadata
        .iter()
        .map(|s| serde_json::from_str::<Metadata>(s))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::Deserialization(format!("bad metadata entry: {e}")))?;

    Ok(Snapshot { dimension, vectors: body.vectors, texts: body.texts, metadata, saved_at_ms: body.saved_at_ms })
}
