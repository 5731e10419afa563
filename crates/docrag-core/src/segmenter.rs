//! Boundary-aware text segmentation.
//!
//! Splits a document into overlapping segments of roughly `chunk_size`
//! characters, preferring to cut after a paragraph break, then after a
//! sentence terminator, and only then at a hard character offset.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::Segment;

/// How far (in characters) around the candidate end a boundary is searched.
pub const BOUNDARY_WINDOW: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmenterConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self { chunk_size: 1000, chunk_overlap: 200 }
    }
}

impl SegmenterConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size, chunk_overlap }
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size <= self.chunk_overlap {
            return Err(Error::InvalidConfig(format!(
                "chunk_size ({}) must be greater than chunk_overlap ({})",
                self.chunk_size, self.chunk_overlap
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Segmenter {
    config: SegmenterConfig,
}

impl Segmenter {
    pub fn new(config: SegmenterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> SegmenterConfig {
        self.config
    }

    /// Split `text` into ordered segments. Empty text yields no segments.
    pub fn segment(&self, text: &str) -> Vec<Segment> {
        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();
        if total == 0 {
            return Vec::new();
        }
        let SegmenterConfig { chunk_size, chunk_overlap } = self.config;
        if total <= chunk_size {
            return vec![Segment { text: text.to_string(), ordinal: 0, start_offset: 0, end_offset: total }];
        }

        let mut segments = Vec::new();
        let mut start = 0usize;
        loop {
            let candidate_end = start + chunk_size;
            if candidate_end >= total {
                segments.push(make_segment(&chars, segments.len(), start, total));
                break;
            }
            let end = find_break_point(&chars, start, candidate_end);
            segments.push(make_segment(&chars, segments.len(), start, end));

            // Without this guard a break point at or before start + overlap
            // would never move the cursor forward.
            let next = end.saturating_sub(chunk_overlap);
            start = if next > start { next } else { end };
        }
        debug!(chars = total, segments = segments.len(), "segmented text");
        segments
    }
}

/// Convenience wrapper validating the configuration on every call.
pub fn segment(text: &str, chunk_size: usize, chunk_overlap: usize) -> Result<Vec<Segment>> {
    Ok(Segmenter::new(SegmenterConfig::new(chunk_size, chunk_overlap))?.segment(text))
}

fn make_segment(chars: &[char], ordinal: usize, start: usize, end: usize) -> Segment {
    Segment { text: chars[start..end].iter().collect(), ordinal, start_offset: start, end_offset: end }
}

fn is_sentence_end(chars: &[char], i: usize) -> bool {
    matches!(chars[i], '.' | '!' | '?') && chars.get(i + 1).map_or(true, |c| c.is_whitespace())
}

/// Pick the cut position for a segment starting at `start` whose nominal end
/// is `pos` (`start < pos < chars.len()`). The result is always `> start`.
fn find_break_point(chars: &[char], start: usize, pos: usize) -> usize {
    let total = chars.len();
    let low = pos.saturating_sub(BOUNDARY_WINDOW).max(start);
    let high = (pos + BOUNDARY_WINDOW).min(total);

    // Paragraph break: both newlines must sit inside the window.
    let mut i = low;
    while i + 1 < high {
        if chars[i] == '\n' && chars[i + 1] == '\n' && i.abs_diff(pos) < BOUNDARY_WINDOW {
            return i + 2;
        }
        i += 1;
    }

    if let Some(i) = (pos..high).find(|&i| is_sentence_end(chars, i)) {
        return i + 1;
    }

    let floor = (pos.saturating_sub(BOUNDARY_WINDOW) + 1).max(start);
    if let Some(i) = (floor..=pos).rev().find(|&i| is_sentence_end(chars, i)) {
        return i + 1;
    }

    pos
}
