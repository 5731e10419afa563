//! Plain-text extraction and directory loading.
//!
//! Binary formats (PDF, DOCX, e-mail) are handled by external extractors;
//! this module only accepts text-like formats and rejects the rest with
//! `UnsupportedFormat`.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::traits::TextExtractor;
use crate::types::Document;

const TEXT_FORMATS: &[&str] = &["txt", "text", "md"];

#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

impl PlainTextExtractor {
    pub fn new() -> Self {
        Self
    }
}

fn normalize_format(declared_format: &str) -> String {
    declared_format.trim().trim_start_matches('.').to_ascii_lowercase()
}

impl TextExtractor for PlainTextExtractor {
    fn supports(&self, declared_format: &str) -> bool {
        TEXT_FORMATS.contains(&normalize_format(declared_format).as_str())
    }

    fn extract(&self, bytes: &[u8], declared_format: &str) -> Result<String> {
        if !self.supports(declared_format) {
            return Err(Error::UnsupportedFormat(declared_format.to_string()));
        }
        Ok(match std::str::from_utf8(bytes) {
            Ok(s) => s.to_string(),
            Err(_) => String::from_utf8_lossy(bytes).into_owned(),
        })
    }
}

/// Read every supported file under `root` (sorted by path) into documents.
///
/// The document id is the file stem; `limit` caps the number of files read.
pub fn load_documents(root: &Path, extractor: &dyn TextExtractor, limit: Option<usize>) -> Result<Vec<Document>> {
    let mut files = list_files(root, extractor);
    if let Some(limit) = limit {
        files.truncate(limit);
    }
    let mut documents = Vec::with_capacity(files.len());
    for path in files {
        let format = path.extension().and_then(|s| s.to_str()).unwrap_or_default();
        let bytes = fs::read(&path)?;
        let text = extractor.extract(&bytes, format)?;
        let id = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        debug!(path = %path.display(), chars = text.chars().count(), "loaded document");
        documents.push(Document::new(id, text).with_source(path));
    }
    info!(root = %root.display(), documents = documents.len(), "loaded documents");
    Ok(documents)
}

fn list_files(root: &Path, extractor: &dyn TextExtractor) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().and_then(|s| s.to_str()).is_some_and(|ext| extractor.supports(ext)))
        .collect();
    files.sort();
    files
}
