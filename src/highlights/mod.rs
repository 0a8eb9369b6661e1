//! Highlight rendering
//!
//! Turns the highlight set of a verse into an ordered sequence of plain and
//! highlighted segments. Overlaps are resolved by render order (start offset,
//! end offset, id): characters already claimed by an earlier highlight are
//! never re-covered, regardless of who owns either highlight.

mod render_plan;

pub use render_plan::{
    build_render_plan, build_render_plan_from_json, RenderPlan, RenderSegment, Segments,
    PLACEHOLDER_TEXT,
};
