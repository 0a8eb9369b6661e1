//! Selection measurement over rendered verse markup
//!
//! A boundary in markup is a byte position in the HTML string. Only text
//! counts towards a measurement: tags are skipped and entities count as the
//! single character they decode to.

use lol_html::{doc_text, rewrite_str, RewriteStrSettings};

use crate::anchoring::TextMeasure;
use crate::error::OffsetError;

/// Rendered HTML of one verse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupRoot {
    html: String,
}

/// Errors while reading markup
#[derive(Debug, thiserror::Error)]
pub enum MarkupError {
    #[error("HTML rewrite failed: {0}")]
    RewriteError(String),
}

impl MarkupRoot {
    pub fn new(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    /// Visible text of the whole root
    pub fn text_content(&self) -> Result<String, MarkupError> {
        visible_text(&self.html)
    }

    /// Whether `position` can be a selection endpoint
    ///
    /// Positions inside a tag or an entity reference, or off a char
    /// boundary, are not part of the text.
    pub fn is_text_position(&self, position: usize) -> bool {
        position <= self.html.len()
            && self.html.is_char_boundary(position)
            && !inside_tag(&self.html[..position])
            && !inside_entity(&self.html, position)
    }
}

impl TextMeasure for MarkupRoot {
    type Boundary = usize;

    fn measure_text_length(&self, boundary: &usize) -> Result<usize, OffsetError> {
        if !self.is_text_position(*boundary) {
            return Err(OffsetError::DetachedContainer);
        }
        let text = visible_text(&self.html[..*boundary]).map_err(|e| {
            tracing::warn!("Failed to read verse markup: {}", e);
            OffsetError::DetachedContainer
        })?;
        Ok(text.chars().count())
    }
}

/// Text content of an HTML fragment with entities decoded
fn visible_text(html: &str) -> Result<String, MarkupError> {
    let mut raw = String::new();
    rewrite_str(
        html,
        RewriteStrSettings {
            document_content_handlers: vec![doc_text!(|t| {
                raw.push_str(t.as_str());
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|e| MarkupError::RewriteError(e.to_string()))?;

    Ok(html_escape::decode_html_entities(&raw).into_owned())
}

fn inside_tag(prefix: &str) -> bool {
    let mut in_tag = false;
    let mut quote: Option<char> = None;
    for c in prefix.chars() {
        match (in_tag, quote, c) {
            (false, _, '<') => in_tag = true,
            (true, None, '"' | '\'') => quote = Some(c),
            (true, Some(q), _) if c == q => quote = None,
            (true, None, '>') => in_tag = false,
            _ => {}
        }
    }
    in_tag
}

fn inside_entity(html: &str, position: usize) -> bool {
    let prefix = &html[..position];
    let Some(amp) = prefix.rfind('&') else {
        return false;
    };
    let is_name = |c: char| c.is_ascii_alphanumeric() || c == '#';
    if !prefix[amp + 1..].chars().all(is_name) {
        return false;
    }
    let rest = &html[position..];
    let name_len = rest.chars().take_while(|c| is_name(*c)).count();
    rest[name_len..].starts_with(';') && (name_len > 0 || amp + 1 < position)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchoring::{resolve_offsets, OffsetRange, Selection};
    use crate::annotations::{Highlight, VerseRef};
    use crate::highlights::build_render_plan;
    use crate::html::{render_plan_html, HighlightMarkup};

    const JOHN_3_16: &str = "For God so loved the world";

    fn rendered(text: &str, highlights: &[Highlight]) -> MarkupRoot {
        let plan = build_render_plan(Some(text), highlights);
        MarkupRoot::new(render_plan_html(&plan, &HighlightMarkup::default()))
    }

    #[test]
    fn test_text_content_matches_plain_text() {
        let verse = VerseRef::new("John", 3, 16);
        let root = rendered(JOHN_3_16, &[Highlight::new("h1", &verse, 4, 7, "yellow")]);
        assert_eq!(root.text_content().unwrap(), JOHN_3_16);
    }

    #[test]
    fn test_selection_inside_highlight_mark() {
        let verse = VerseRef::new("John", 3, 16);
        let root = rendered(JOHN_3_16, &[Highlight::new("h1", &verse, 0, 7, "yellow")]);

        // "God" sits inside the mark element
        let start = root.html().find("God").unwrap();
        let end = root.html().find(" loved").unwrap();
        let range = resolve_offsets(JOHN_3_16, Some(&root), &Selection::new(start, end)).unwrap();

        assert_eq!(range, OffsetRange { start: 4, end: 10 });
        assert_eq!(range.slice(JOHN_3_16), Some("God so"));
    }

    #[test]
    fn test_entities_count_as_one_char() {
        let text = "Faith & works <together>";
        let root = rendered(text, &[]);
        assert!(root.html().contains("&amp;"));

        let end = root.html().find("works").unwrap();
        assert_eq!(root.measure_text_length(&end), Ok(8));
        assert_eq!(root.measure_text_length(&root.html().len()), Ok(text.chars().count()));
    }

    #[test]
    fn test_positions_outside_text() {
        let verse = VerseRef::new("John", 3, 16);
        let root = rendered(JOHN_3_16, &[Highlight::new("h1", &verse, 4, 7, "yellow")]);
        let html = root.html().to_string();

        // Inside the opening tag
        let in_tag = html.find("class").unwrap();
        assert_eq!(root.measure_text_length(&in_tag), Err(OffsetError::DetachedContainer));
        // Past the end
        assert_eq!(
            root.measure_text_length(&(html.len() + 1)),
            Err(OffsetError::DetachedContainer)
        );

        let escaped = MarkupRoot::new("a &amp; b");
        assert!(!escaped.is_text_position(4));
        assert!(escaped.is_text_position(2));
        assert!(escaped.is_text_position(7));
    }

    #[test]
    fn test_multibyte_position_off_char_boundary() {
        let root = MarkupRoot::new("λόγος");
        assert_eq!(root.measure_text_length(&1), Err(OffsetError::DetachedContainer));
        assert_eq!(root.measure_text_length(&2), Ok(1));
    }
}
