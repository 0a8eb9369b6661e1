//! Transport to the note/highlight service

use async_trait::async_trait;

use super::types::{NewBookmark, NoteEcho, NotesPage, SaveHighlightRequest, SaveNoteRequest};
use crate::annotations::{Bookmark, Highlight, Note, NoteKind};
use crate::error::Result;

/// Note/highlight service operations
#[async_trait]
pub trait AnnotationApi: Send + Sync {
    /// Verse-level notes of a chapter, own and friends'
    async fn fetch_chapter_notes(&self, book: &str, chapter: u32) -> Result<Vec<Note>>;

    /// The current user's chapter note, `None` when there is none
    async fn fetch_chapter_note(&self, book: &str, chapter: u32) -> Result<Option<Note>>;

    /// All visible highlights of a chapter
    async fn fetch_chapter_highlights(&self, book: &str, chapter: u32) -> Result<Vec<Highlight>>;

    async fn fetch_verse_notes(&self, book: &str, chapter: u32, verse: u32) -> Result<Vec<Note>>;

    async fn fetch_all_notes(&self, page: u32, limit: u32) -> Result<NotesPage>;

    /// Save a note; `None` when the service echoes no note (a delete)
    async fn save_note(&self, kind: NoteKind, request: &SaveNoteRequest) -> Result<Option<NoteEcho>>;

    /// Save a highlight, returning every highlight now on the verse
    async fn save_highlight(&self, request: &SaveHighlightRequest) -> Result<Vec<Highlight>>;

    async fn list_bookmarks(&self) -> Result<Vec<Bookmark>>;

    async fn add_bookmark(&self, bookmark: &NewBookmark) -> Result<Bookmark>;

    async fn delete_bookmark(&self, id: &str) -> Result<()>;
}
