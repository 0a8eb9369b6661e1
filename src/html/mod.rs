//! HTML processing module
//!
//! Provides HTML output for rendered verses including:
//! - Highlight markup for a render plan
//! - Selection measurement over rendered markup
//!
//! Uses lol_html for streaming text extraction.

mod highlight_markup;
mod markup_root;

pub use highlight_markup::{render_plan_html, HighlightMarkup};
pub use markup_root::{MarkupError, MarkupRoot};
