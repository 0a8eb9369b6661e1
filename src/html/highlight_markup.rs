//! Highlight markup for render plans

use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::annotations::Owner;
use crate::highlights::{RenderPlan, RenderSegment};

/// Configuration for highlight markup
#[derive(Debug, Clone)]
pub struct HighlightMarkup {
    /// CSS class prefix for highlights
    pub class_prefix: String,
    /// Data attribute for highlight ID
    pub id_attribute: String,
    /// Whether to include inline background colors
    pub include_inline_styles: bool,
}

impl Default for HighlightMarkup {
    fn default() -> Self {
        Self {
            class_prefix: "verse-highlight".to_string(),
            id_attribute: "data-highlight-id".to_string(),
            include_inline_styles: true,
        }
    }
}

/// Render a plan as HTML
///
/// Highlighted segments become `<mark>` elements; everything else is
/// escaped text. The visible text of the output equals the plan's text.
pub fn render_plan_html(plan: &RenderPlan<'_>, config: &HighlightMarkup) -> String {
    let mut html = String::new();
    for segment in plan {
        push_segment(&mut html, &segment, config);
    }
    html
}

fn push_segment(html: &mut String, segment: &RenderSegment<'_>, config: &HighlightMarkup) {
    if segment.placeholder {
        html.push_str(&format!(
            "<span class=\"{}-placeholder\">{}</span>",
            config.class_prefix,
            encode_text(segment.text)
        ));
        return;
    }

    let Some(highlight) = segment.highlight else {
        html.push_str(&encode_text(segment.text));
        return;
    };

    let class = match &highlight.owner {
        Owner::Me => config.class_prefix.clone(),
        Owner::Friend { .. } => format!("{} {}-friend", config.class_prefix, config.class_prefix),
    };
    let style = if config.include_inline_styles {
        format!(
            " style=\"background-color: {};\"",
            encode_double_quoted_attribute(&highlight.color)
        )
    } else {
        String::new()
    };

    html.push_str(&format!(
        "<mark class=\"{}\" {}=\"{}\"{}>{}</mark>",
        class,
        config.id_attribute,
        encode_double_quoted_attribute(&highlight.id),
        style,
        encode_text(segment.text)
    ));
}
