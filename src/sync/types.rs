//! Sync data types
//!
//! Defines the request and response bodies of the note/highlight service
//! and the observable state of the sync client:
//! - Save requests for notes, highlights and bookmarks
//! - Paginated note listings
//! - Per-operation progress and session expiry

use serde::{Deserialize, Serialize};

use crate::annotations::{Note, VerseRef};

/// Body of `POST /notes/{kind}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveNoteRequest {
    pub book: String,
    pub chapter: u32,
    /// Absent for chapter notes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verse: Option<u32>,
    pub content: String,
}

impl SaveNoteRequest {
    /// Build a request with trimmed content
    pub fn new(book: &str, chapter: u32, verse: Option<u32>, content: &str) -> Self {
        Self {
            book: book.to_string(),
            chapter,
            verse,
            content: content.trim().to_string(),
        }
    }
}

/// What the service echoes after a note save
///
/// The service may answer with anything from a full note to just
/// `{id, content}`; fields it leaves out fall back to the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteEcho {
    pub id: Option<String>,
    pub content: Option<String>,
}

impl NoteEcho {
    /// Content now stored for the note saved with `request`
    pub fn content_or<'a>(&'a self, request: &'a SaveNoteRequest) -> &'a str {
        self.content.as_deref().unwrap_or(&request.content)
    }
}

/// Body of `POST /highlights`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveHighlightRequest {
    pub book: String,
    pub chapter: u32,
    pub verse: u32,
    pub start_offset: usize,
    pub end_offset: usize,
    pub color: String,
}

impl SaveHighlightRequest {
    pub fn new(verse: &VerseRef, start_offset: usize, end_offset: usize, color: &str) -> Self {
        Self {
            book: verse.book.clone(),
            chapter: verse.chapter,
            verse: verse.verse,
            start_offset,
            end_offset,
            color: color.to_string(),
        }
    }

    pub fn verse_ref(&self) -> VerseRef {
        VerseRef::new(&self.book, self.chapter, self.verse)
    }

    /// Reason the request would be rejected, if any
    pub fn validate(&self) -> Result<(), String> {
        if self.start_offset >= self.end_offset {
            return Err(format!(
                "Highlight range [{}, {}) is empty",
                self.start_offset, self.end_offset
            ));
        }
        if self.color.trim().is_empty() {
            return Err("Highlight color is required".to_string());
        }
        Ok(())
    }
}

/// Body of `POST /bookmarks/`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBookmark {
    pub book: String,
    pub chapter: u32,
    pub verse: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_preview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl NewBookmark {
    pub fn new(verse: &VerseRef) -> Self {
        Self {
            book: verse.book.clone(),
            chapter: verse.chapter,
            verse: verse.verse,
            text_preview: None,
            notes: None,
        }
    }

    pub fn with_preview(mut self, text: &str) -> Self {
        self.text_preview = Some(text.to_string());
        self
    }
}

/// Response of `GET /notes`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotesPage {
    #[serde(default)]
    pub notes: Vec<Note>,
    #[serde(default)]
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub pages: u32,
}

/// Operations whose progress the client tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    FetchChapter,
    FetchChapterNotes,
    FetchChapterNote,
    FetchChapterHighlights,
    FetchVerseNotes,
    FetchAllNotes,
    SaveQuickNote,
    SaveStudyNote,
    SaveChapterNote,
    SaveHighlight,
    FetchBookmarks,
    AddBookmark,
    RemoveBookmark,
}

/// Progress of one operation kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OperationState {
    #[default]
    Idle,
    Pending,
    Success,
    Failed(String),
}

impl OperationState {
    pub fn is_pending(&self) -> bool {
        matches!(self, OperationState::Pending)
    }
}

/// Authentication state as seen by the client
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Active,
    /// The service answered 401; the session must be renewed
    Expired,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_note_request_trims_and_omits_verse() {
        let request = SaveNoteRequest::new("John", 3, None, "  Love first  ");
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({ "book": "John", "chapter": 3, "content": "Love first" })
        );
    }

    #[test]
    fn test_echo_falls_back_to_request_content() {
        let request = SaveNoteRequest::new("John", 3, Some(16), " Born again ");
        let partial = NoteEcho {
            id: Some("5".to_string()),
            content: None,
        };
        assert_eq!(partial.content_or(&request), "Born again");

        let cleared = NoteEcho {
            id: None,
            content: Some(String::new()),
        };
        assert_eq!(cleared.content_or(&request), "");
    }

    #[test]
    fn test_highlight_request_validation() {
        let verse = VerseRef::new("John", 3, 16);
        assert!(SaveHighlightRequest::new(&verse, 5, 9, "#FFFF00").validate().is_ok());
        assert!(SaveHighlightRequest::new(&verse, 9, 9, "#FFFF00").validate().is_err());
        assert!(SaveHighlightRequest::new(&verse, 5, 9, " ").validate().is_err());
    }

    #[test]
    fn test_notes_page_parsing() {
        let page: NotesPage = serde_json::from_value(json!({
            "notes": [{
                "id": 4,
                "book": "Romans",
                "chapter": "8",
                "verse": "28",
                "note_type": "study",
                "content": "All things",
                "user": { "is_self": true }
            }],
            "pagination": { "total": 21, "page": 2, "limit": 20, "pages": 2 }
        }))
        .unwrap();

        assert_eq!(page.notes.len(), 1);
        assert_eq!(page.notes[0].id.as_deref(), Some("4"));
        assert_eq!(page.notes[0].verse, Some(28));
        assert_eq!(page.pagination.pages, 2);
    }
}
