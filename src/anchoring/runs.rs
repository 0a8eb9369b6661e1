//! Run model of a rendered verse
//!
//! A rendered verse is a flat sequence of text runs, each optionally wrapped
//! in a highlight. A boundary is a run index plus a character offset inside
//! that run, the way a selection endpoint points into one text node.

use crate::error::OffsetError;
use crate::highlights::RenderPlan;

use super::TextMeasure;

/// The highlight wrapping a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightMark {
    pub id: String,
    pub color: String,
}

/// One contiguous piece of rendered text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun {
    pub text: String,
    pub highlight: Option<HighlightMark>,
}

impl TextRun {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            highlight: None,
        }
    }

    pub fn highlighted(text: impl Into<String>, id: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            highlight: Some(HighlightMark {
                id: id.into(),
                color: color.into(),
            }),
        }
    }

    fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// A position inside a [`RenderedVerse`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunBoundary {
    pub run: usize,
    /// Characters into the run
    pub offset: usize,
}

impl RunBoundary {
    pub fn new(run: usize, offset: usize) -> Self {
        Self { run, offset }
    }
}

/// A verse as it appears on screen
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedVerse {
    runs: Vec<TextRun>,
}

impl RenderedVerse {
    /// A verse rendered as a single unhighlighted run
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            runs: vec![TextRun::plain(text)],
        }
    }

    pub fn from_runs(runs: Vec<TextRun>) -> Self {
        Self { runs }
    }

    /// Render a plan into runs, one per segment
    pub fn from_plan(plan: &RenderPlan<'_>) -> Self {
        let runs = plan
            .segments()
            .map(|segment| match segment.highlight {
                Some(h) => TextRun::highlighted(segment.text, h.id.as_str(), h.color.as_str()),
                None => TextRun::plain(segment.text),
            })
            .collect();
        Self { runs }
    }

    pub fn runs(&self) -> &[TextRun] {
        &self.runs
    }

    /// Visible text, all runs concatenated
    pub fn text_content(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }

    /// The boundary sitting `char_offset` characters into the verse
    ///
    /// Positions on the seam between two runs resolve to the start of the
    /// later run.
    pub fn boundary_at(&self, char_offset: usize) -> Option<RunBoundary> {
        let mut remaining = char_offset;
        for (index, run) in self.runs.iter().enumerate() {
            let len = run.char_len();
            if remaining < len {
                return Some(RunBoundary::new(index, remaining));
            }
            remaining -= len;
        }
        (remaining == 0).then(|| RunBoundary::new(self.runs.len(), 0))
    }
}

impl TextMeasure for RenderedVerse {
    type Boundary = RunBoundary;

    fn measure_text_length(&self, boundary: &RunBoundary) -> Result<usize, OffsetError> {
        if boundary.run == self.runs.len() && boundary.offset == 0 {
            return Ok(self.runs.iter().map(TextRun::char_len).sum());
        }
        let run = self.runs.get(boundary.run).ok_or(OffsetError::DetachedContainer)?;
        if boundary.offset > run.char_len() {
            return Err(OffsetError::DetachedContainer);
        }

        let before: usize = self.runs[..boundary.run].iter().map(TextRun::char_len).sum();
        Ok(before + boundary.offset)
    }
}
