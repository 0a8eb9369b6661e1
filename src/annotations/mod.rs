//! Annotation module
//!
//! Notes (quick, study, chapter), highlights and bookmarks attached to Bible
//! verses, plus the session store that caches them.
//!
//! # Store rules
//!
//! - At most one own quick note and one own study note per verse, and one own
//!   chapter note per chapter
//! - Blank content on save deletes the note
//! - Highlights for a verse are always replaced as a complete set

mod store;
mod types;

pub use store::{AnnotationStore, SharedStore};
pub use types::{
    Annotation, Bookmark, ChapterKey, Highlight, Note, NoteKind, Owner, UserRef, VerseRef,
};
