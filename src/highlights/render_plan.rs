//! Render plans for highlighted verse text
//!
//! A plan splits a verse's plain text into plain and highlighted segments.
//! Highlights come straight from the service, so they may be unsorted or
//! overlapping; the plan sorts them and lets earlier-sorted highlights keep
//! the characters they claim.

use std::iter::FusedIterator;

use crate::annotations::Highlight;

/// Shown instead of verse text that is missing or malformed
pub const PLACEHOLDER_TEXT: &str = "[verse text unavailable]";

/// One piece of rendered verse text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSegment<'a> {
    pub text: &'a str,
    /// The highlight covering this segment, if any
    pub highlight: Option<&'a Highlight>,
    /// Set only on the placeholder segment
    pub placeholder: bool,
}

impl<'a> RenderSegment<'a> {
    fn plain(text: &'a str) -> Self {
        Self {
            text,
            highlight: None,
            placeholder: false,
        }
    }

    fn highlighted(text: &'a str, highlight: &'a Highlight) -> Self {
        Self {
            text,
            highlight: Some(highlight),
            placeholder: false,
        }
    }

    fn placeholder() -> Self {
        Self {
            text: PLACEHOLDER_TEXT,
            highlight: None,
            placeholder: true,
        }
    }

    pub fn color(&self) -> Option<&'a str> {
        self.highlight.map(|h| h.color.as_str())
    }

    pub fn is_highlighted(&self) -> bool {
        self.highlight.is_some()
    }
}

/// Sorted highlights over a verse, ready to be walked into segments
#[derive(Debug, Clone)]
pub struct RenderPlan<'a> {
    /// `None` renders the placeholder
    text: Option<&'a str>,
    highlights: Vec<&'a Highlight>,
    /// Byte index of every char, plus the text length
    boundaries: Vec<usize>,
}

/// Build the render plan of a verse
///
/// Missing or empty text degrades to a single placeholder segment. Offsets
/// past the end of the text are clamped; highlights left empty are dropped.
pub fn build_render_plan<'a, I>(plain_text: Option<&'a str>, highlights: I) -> RenderPlan<'a>
where
    I: IntoIterator<Item = &'a Highlight>,
{
    let text = plain_text.filter(|t| !t.is_empty());
    let boundaries: Vec<usize> = match text {
        Some(t) => t
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(t.len()))
            .collect(),
        None => Vec::new(),
    };
    let char_len = boundaries.len().saturating_sub(1);

    let mut sorted: Vec<&Highlight> = highlights
        .into_iter()
        .filter(|h| {
            let visible = h.start_offset < h.end_offset && h.start_offset < char_len;
            if !visible {
                tracing::debug!(
                    "Skipping highlight {} [{}, {}) on text of {} chars",
                    h.id,
                    h.start_offset,
                    h.end_offset,
                    char_len
                );
            }
            visible
        })
        .collect();
    sorted.sort_by(|a, b| Highlight::render_order(a, b));

    RenderPlan {
        text,
        highlights: sorted,
        boundaries,
    }
}

/// Build a render plan from a raw JSON verse text value
///
/// Anything but a string renders the placeholder.
pub fn build_render_plan_from_json<'a, I>(text: &'a serde_json::Value, highlights: I) -> RenderPlan<'a>
where
    I: IntoIterator<Item = &'a Highlight>,
{
    if !text.is_string() {
        tracing::warn!("Verse text is not a string: {}", text);
    }
    build_render_plan(text.as_str(), highlights)
}

impl<'a> RenderPlan<'a> {
    /// Walk the plan from the start
    pub fn segments(&self) -> Segments<'_, 'a> {
        Segments {
            plan: self,
            next_highlight: 0,
            last_index: 0,
            pending: None,
            done: false,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.text.is_none()
    }

    /// The verse text, `None` when the placeholder is shown
    pub fn text(&self) -> Option<&'a str> {
        self.text
    }

    /// Length of the verse text in characters
    pub fn char_len(&self) -> usize {
        self.boundaries.len().saturating_sub(1)
    }

    /// Highlights that contribute to the plan, in render order
    pub fn highlights(&self) -> &[&'a Highlight] {
        &self.highlights
    }

    /// Concatenated segment text
    pub fn to_text(&self) -> String {
        self.segments().map(|s| s.text).collect()
    }

    fn slice(&self, start: usize, end: usize) -> &'a str {
        match self.text {
            Some(text) => &text[self.boundaries[start]..self.boundaries[end]],
            None => "",
        }
    }
}

impl<'p, 'a> IntoIterator for &'p RenderPlan<'a> {
    type Item = RenderSegment<'a>;
    type IntoIter = Segments<'p, 'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments()
    }
}

/// Lazy walk over a render plan
#[derive(Debug, Clone)]
pub struct Segments<'p, 'a> {
    plan: &'p RenderPlan<'a>,
    next_highlight: usize,
    /// First character not yet emitted
    last_index: usize,
    pending: Option<RenderSegment<'a>>,
    done: bool,
}

impl<'p, 'a> Iterator for Segments<'p, 'a> {
    type Item = RenderSegment<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(segment) = self.pending.take() {
            return Some(segment);
        }
        if self.done {
            return None;
        }
        if self.plan.is_placeholder() {
            self.done = true;
            return Some(RenderSegment::placeholder());
        }

        let len = self.plan.char_len();
        while let Some(highlight) = self.plan.highlights.get(self.next_highlight).copied() {
            self.next_highlight += 1;

            let start = highlight.start_offset.max(self.last_index);
            let end = highlight.end_offset.min(len);
            if start >= end {
                continue;
            }

            let gap_start = self.last_index;
            self.last_index = end;
            let segment = RenderSegment::highlighted(self.plan.slice(start, end), highlight);
            if start > gap_start {
                self.pending = Some(segment);
                return Some(RenderSegment::plain(self.plan.slice(gap_start, start)));
            }
            return Some(segment);
        }

        self.done = true;
        if self.last_index < len {
            let start = self.last_index;
            self.last_index = len;
            return Some(RenderSegment::plain(self.plan.slice(start, len)));
        }
        None
    }
}

impl FusedIterator for Segments<'_, '_> {}
