//! Selection anchoring
//!
//! Converts a selection made inside rendered verse text into character
//! offsets against the verse's plain text. Rendered text may already be
//! split into many highlight spans; measurement only counts text characters,
//! so offsets stay valid positions in the plain text however fragmented the
//! rendering is.
//!
//! Measurement sits behind [`TextMeasure`] so the same resolution works over
//! the synthetic run model ([`RenderedVerse`]) or rendered markup
//! ([`crate::html::MarkupRoot`]).

mod runs;

use serde::{Deserialize, Serialize};

use crate::error::OffsetError;

pub use runs::{HighlightMark, RenderedVerse, RunBoundary, TextRun};

/// A root container whose text length up to a boundary can be measured
pub trait TextMeasure {
    /// A position inside the root
    type Boundary: PartialEq;

    /// Number of plain-text characters between the start of the root and
    /// `boundary`, ignoring all markup
    ///
    /// Fails with [`OffsetError::DetachedContainer`] when the boundary does
    /// not lie inside the root.
    fn measure_text_length(&self, boundary: &Self::Boundary) -> Result<usize, OffsetError>;
}

/// A selection range inside a root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection<B> {
    pub start: B,
    pub end: B,
}

impl<B: PartialEq> Selection<B> {
    pub fn new(start: B, end: B) -> Self {
        Self { start, end }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }
}

/// Resolved selection offsets, end exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetRange {
    pub start: usize,
    pub end: usize,
}

impl OffsetRange {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The selected text, if the range lies within `text`
    pub fn slice<'t>(&self, text: &'t str) -> Option<&'t str> {
        let mut indices = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()));
        let start = indices.nth(self.start)?;
        let end = match self.len() {
            0 => start,
            len => indices.nth(len - 1)?,
        };
        Some(&text[start..end])
    }
}

/// Resolve a selection inside `root` to offsets in `plain_text`
///
/// The root's visible text must equal `plain_text`; when it does not the
/// offsets are meaningless, and ranges running past the plain text are
/// rejected as [`OffsetError::InvalidRange`].
pub fn resolve_offsets<M: TextMeasure>(
    plain_text: &str,
    root: Option<&M>,
    selection: &Selection<M::Boundary>,
) -> Result<OffsetRange, OffsetError> {
    if selection.is_collapsed() {
        return Err(OffsetError::EmptySelection);
    }
    let root = root.ok_or(OffsetError::DetachedContainer)?;

    let start = root.measure_text_length(&selection.start)?;
    let end = root.measure_text_length(&selection.end)?;
    if end <= start {
        return Err(OffsetError::InvalidRange);
    }

    let text_len = plain_text.chars().count();
    if end > text_len {
        tracing::warn!(
            "Selection [{}, {}) runs past verse text of {} chars",
            start,
            end,
            text_len
        );
        return Err(OffsetError::InvalidRange);
    }

    tracing::debug!("Resolved selection to [{}, {})", start, end);
    Ok(OffsetRange { start, end })
}
