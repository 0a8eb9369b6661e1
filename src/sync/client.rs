//! Annotation sync client
//!
//! Runs round trips to the note/highlight service and reconciles the shared
//! store with what the service returns. Nothing is written to the store
//! before the service confirms it, so a failed call leaves the store as it
//! was.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use super::api::AnnotationApi;
use super::http::HttpAnnotationApi;
use super::types::{
    NewBookmark, NotesPage, OperationKind, OperationState, SaveHighlightRequest, SaveNoteRequest,
    SessionState,
};
use crate::annotations::{Annotation, Bookmark, Highlight, Note, NoteKind, SharedStore, VerseRef};
use crate::config::ClientConfig;
use crate::error::{Result, SyncError};

pub struct AnnotationSyncClient {
    api: Arc<dyn AnnotationApi>,
    store: SharedStore,
    states: Mutex<HashMap<OperationKind, OperationState>>,
    session: watch::Sender<SessionState>,
    default_color: String,
}

impl AnnotationSyncClient {
    pub fn new(api: Arc<dyn AnnotationApi>, store: SharedStore, default_color: &str) -> Self {
        let (session, _) = watch::channel(SessionState::Active);
        Self {
            api,
            store,
            states: Mutex::new(HashMap::new()),
            session,
            default_color: default_color.to_string(),
        }
    }

    /// Client over HTTP for the configured service
    pub fn from_config(config: &ClientConfig, store: SharedStore) -> Result<Self> {
        let api = HttpAnnotationApi::new(&config.api)?;
        Ok(Self::new(Arc::new(api), store, &config.highlight_color))
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Progress of the latest call of a kind
    pub fn operation_state(&self, kind: OperationKind) -> OperationState {
        self.states.lock().get(&kind).cloned().unwrap_or_default()
    }

    /// Session state updates; flips to `Expired` on any 401
    pub fn session_events(&self) -> watch::Receiver<SessionState> {
        self.session.subscribe()
    }

    fn set_state(&self, kind: OperationKind, state: OperationState) {
        self.states.lock().insert(kind, state);
    }

    /// Run one operation, recording its progress
    async fn track<T, F>(&self, kind: OperationKind, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.set_state(kind, OperationState::Pending);
        let result = operation.await;
        match &result {
            Ok(_) => self.set_state(kind, OperationState::Success),
            Err(err) => {
                tracing::warn!("{:?} failed: {}", kind, err);
                if err.is_auth() {
                    self.session.send_replace(SessionState::Expired);
                }
                self.set_state(kind, OperationState::Failed(err.to_string()));
            }
        }
        result
    }

    // ============================================
    // Fetching
    // ============================================

    /// Load everything visible in a chapter, replacing what the store holds
    ///
    /// Returns the number of annotations loaded.
    pub async fn fetch_chapter(&self, book: &str, chapter: u32) -> Result<usize> {
        self.track(OperationKind::FetchChapter, async {
            let (notes, chapter_note, highlights) = futures::try_join!(
                self.api.fetch_chapter_notes(book, chapter),
                self.api.fetch_chapter_note(book, chapter),
                self.api.fetch_chapter_highlights(book, chapter),
            )?;

            let annotations: Vec<Annotation> = notes
                .into_iter()
                .chain(chapter_note)
                .map(Annotation::Note)
                .chain(highlights.into_iter().map(Annotation::Highlight))
                .collect();
            let count = annotations.len();

            self.store.write().load_chapter(book, chapter, annotations);
            Ok(count)
        })
        .await
    }

    /// Refresh the verse-level notes of a chapter
    pub async fn fetch_chapter_notes(&self, book: &str, chapter: u32) -> Result<Vec<Note>> {
        self.track(OperationKind::FetchChapterNotes, async {
            let notes = self.api.fetch_chapter_notes(book, chapter).await?;
            self.store.write().replace_chapter_notes(book, chapter, notes.clone());
            Ok(notes)
        })
        .await
    }

    /// Refresh the highlights of a chapter
    pub async fn fetch_chapter_highlights(&self, book: &str, chapter: u32) -> Result<Vec<Highlight>> {
        self.track(OperationKind::FetchChapterHighlights, async {
            let highlights = self.api.fetch_chapter_highlights(book, chapter).await?;
            self.store
                .write()
                .replace_chapter_highlights(book, chapter, highlights.clone());
            Ok(highlights)
        })
        .await
    }

    /// Refresh the current user's chapter note
    pub async fn fetch_chapter_note(&self, book: &str, chapter: u32) -> Result<Option<Note>> {
        self.track(OperationKind::FetchChapterNote, async {
            let note = self.api.fetch_chapter_note(book, chapter).await?;
            let (content, id) = match &note {
                Some(note) => (note.content.as_str(), note.id.as_deref()),
                None => ("", None),
            };
            self.store
                .write()
                .upsert_own_note(book, chapter, None, NoteKind::Chapter, content, id);
            Ok(note)
        })
        .await
    }

    /// Refresh the notes of one verse
    pub async fn fetch_verse_notes(&self, verse: &VerseRef) -> Result<Vec<Note>> {
        self.track(OperationKind::FetchVerseNotes, async {
            let notes = self
                .api
                .fetch_verse_notes(&verse.book, verse.chapter, verse.verse)
                .await?;
            self.store
                .write()
                .replace_verse_notes(&verse.book, verse.chapter, verse.verse, notes.clone());
            Ok(notes)
        })
        .await
    }

    /// One page of all the user's notes; the store is not touched
    pub async fn fetch_all_notes(&self, page: u32, limit: u32) -> Result<NotesPage> {
        self.track(OperationKind::FetchAllNotes, self.api.fetch_all_notes(page.max(1), limit.max(1)))
            .await
    }

    // ============================================
    // Saving
    // ============================================

    pub async fn save_quick_note(&self, verse: &VerseRef, content: &str) -> Result<Option<Note>> {
        self.save_note(
            OperationKind::SaveQuickNote,
            NoteKind::Quick,
            &verse.book,
            verse.chapter,
            Some(verse.verse),
            content,
        )
        .await
    }

    pub async fn save_study_note(&self, verse: &VerseRef, content: &str) -> Result<Option<Note>> {
        self.save_note(
            OperationKind::SaveStudyNote,
            NoteKind::Study,
            &verse.book,
            verse.chapter,
            Some(verse.verse),
            content,
        )
        .await
    }

    pub async fn save_chapter_note(&self, book: &str, chapter: u32, content: &str) -> Result<Option<Note>> {
        self.save_note(
            OperationKind::SaveChapterNote,
            NoteKind::Chapter,
            book,
            chapter,
            None,
            content,
        )
        .await
    }

    /// Save a note and apply the service's echo
    ///
    /// The stored note keeps the request's location and kind; the echo
    /// supplies id and content. Blank content or a null echo deletes the
    /// note. Returns the note now stored, if any.
    async fn save_note(
        &self,
        operation: OperationKind,
        kind: NoteKind,
        book: &str,
        chapter: u32,
        verse: Option<u32>,
        content: &str,
    ) -> Result<Option<Note>> {
        let request = SaveNoteRequest::new(book, chapter, verse, content);
        self.track(operation, async {
            let echo = self.api.save_note(kind, &request).await?;
            let (content, id) = match &echo {
                Some(echo) => (echo.content_or(&request), echo.id.as_deref()),
                None => ("", None),
            };

            let mut store = self.store.write();
            let stored = store
                .upsert_own_note(book, chapter, verse, kind, content, id)
                .cloned();
            Ok(stored)
        })
        .await
    }

    /// Save a highlight and install the verse's new highlight set
    ///
    /// `color` falls back to the configured default.
    pub async fn save_highlight(
        &self,
        verse: &VerseRef,
        start_offset: usize,
        end_offset: usize,
        color: Option<&str>,
    ) -> Result<Vec<Highlight>> {
        let color = color.unwrap_or(&self.default_color);
        let request = SaveHighlightRequest::new(verse, start_offset, end_offset, color);
        self.track(OperationKind::SaveHighlight, async {
            request.validate().map_err(SyncError::invalid)?;

            let returned = self.api.save_highlight(&request).await?;
            let total = returned.len();
            let highlights: Vec<Highlight> = returned
                .into_iter()
                .filter(|h| h.verse_ref() == *verse)
                .collect();
            if highlights.len() < total {
                tracing::warn!(
                    "Ignored {} highlights outside {} in save response",
                    total - highlights.len(),
                    verse
                );
            }

            self.store.write().replace_verse_highlights(
                &verse.book,
                verse.chapter,
                verse.verse,
                highlights.clone(),
            );
            Ok(highlights)
        })
        .await
    }

    // ============================================
    // Bookmarks
    // ============================================

    pub async fn fetch_bookmarks(&self) -> Result<Vec<Bookmark>> {
        self.track(OperationKind::FetchBookmarks, async {
            let bookmarks = self.api.list_bookmarks().await?;
            self.store.write().load_bookmarks(bookmarks.clone());
            Ok(bookmarks)
        })
        .await
    }

    pub async fn add_bookmark(&self, verse: &VerseRef, text_preview: Option<&str>) -> Result<Bookmark> {
        let mut request = NewBookmark::new(verse);
        if let Some(text) = text_preview {
            request = request.with_preview(text);
        }
        self.track(OperationKind::AddBookmark, async {
            let bookmark = self.api.add_bookmark(&request).await?;
            self.store.write().insert_bookmark(bookmark.clone());
            Ok(bookmark)
        })
        .await
    }

    /// Remove the bookmark on a verse
    pub async fn remove_bookmark(&self, verse: &VerseRef) -> Result<()> {
        self.track(OperationKind::RemoveBookmark, async {
            let id = self
                .store
                .read()
                .bookmark_for(verse)
                .map(|b| b.id.clone())
                .ok_or_else(|| SyncError::invalid(format!("{} is not bookmarked", verse)))?;

            self.api.delete_bookmark(&id).await?;
            self.store.write().remove_bookmark(&id);
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchoring::{resolve_offsets, RenderedVerse, Selection};
    use crate::annotations::Owner;
    use crate::highlights::build_render_plan;
    use crate::sync::NoteEcho;
    use async_trait::async_trait;

    /// In-memory stand-in for the service
    #[derive(Default)]
    struct MockApi {
        notes: Vec<Note>,
        chapter_note: Option<Note>,
        highlights: Mutex<Vec<Highlight>>,
        bookmarks: Mutex<Vec<Bookmark>>,
        saved_notes: Mutex<Vec<(NoteKind, SaveNoteRequest)>>,
        /// Echo only the note id after a save
        id_only_echo: bool,
        fail_with: Option<SyncError>,
    }

    impl MockApi {
        fn failing(err: SyncError) -> Self {
            Self {
                fail_with: Some(err),
                ..Default::default()
            }
        }

        fn check(&self) -> Result<()> {
            match &self.fail_with {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl AnnotationApi for MockApi {
        async fn fetch_chapter_notes(&self, _book: &str, _chapter: u32) -> Result<Vec<Note>> {
            self.check()?;
            Ok(self.notes.clone())
        }

        async fn fetch_chapter_note(&self, _book: &str, _chapter: u32) -> Result<Option<Note>> {
            self.check()?;
            Ok(self.chapter_note.clone())
        }

        async fn fetch_chapter_highlights(&self, book: &str, chapter: u32) -> Result<Vec<Highlight>> {
            self.check()?;
            Ok(self
                .highlights
                .lock()
                .iter()
                .filter(|h| h.book == book && h.chapter == chapter)
                .cloned()
                .collect())
        }

        async fn fetch_verse_notes(&self, _book: &str, _chapter: u32, verse: u32) -> Result<Vec<Note>> {
            self.check()?;
            Ok(self.notes.iter().filter(|n| n.verse == Some(verse)).cloned().collect())
        }

        async fn fetch_all_notes(&self, page: u32, limit: u32) -> Result<NotesPage> {
            self.check()?;
            Ok(NotesPage {
                notes: self.notes.clone(),
                pagination: crate::sync::Pagination {
                    total: self.notes.len() as u64,
                    page,
                    limit,
                    pages: 1,
                },
            })
        }

        async fn save_note(&self, kind: NoteKind, request: &SaveNoteRequest) -> Result<Option<NoteEcho>> {
            self.check()?;
            self.saved_notes.lock().push((kind, request.clone()));
            if request.content.is_empty() {
                return Ok(None);
            }
            Ok(Some(NoteEcho {
                id: Some(format!("srv-{}", kind.as_str())),
                content: (!self.id_only_echo).then(|| request.content.clone()),
            }))
        }

        async fn save_highlight(&self, request: &SaveHighlightRequest) -> Result<Vec<Highlight>> {
            self.check()?;
            let verse = request.verse_ref();
            let mut highlights = self.highlights.lock();
            let id = format!("h{}", highlights.len() + 1);
            highlights.push(Highlight::new(
                &id,
                &verse,
                request.start_offset,
                request.end_offset,
                &request.color,
            ));
            Ok(highlights.iter().filter(|h| h.verse_ref() == verse).cloned().collect())
        }

        async fn list_bookmarks(&self) -> Result<Vec<Bookmark>> {
            self.check()?;
            Ok(self.bookmarks.lock().clone())
        }

        async fn add_bookmark(&self, bookmark: &NewBookmark) -> Result<Bookmark> {
            self.check()?;
            let mut bookmarks = self.bookmarks.lock();
            let created = Bookmark {
                id: format!("b{}", bookmarks.len() + 1),
                book: bookmark.book.clone(),
                chapter: bookmark.chapter,
                verse: bookmark.verse,
                text_preview: bookmark.text_preview.clone(),
                notes: bookmark.notes.clone(),
                created_at: None,
            };
            bookmarks.push(created.clone());
            Ok(created)
        }

        async fn delete_bookmark(&self, id: &str) -> Result<()> {
            self.check()?;
            self.bookmarks.lock().retain(|b| b.id != id);
            Ok(())
        }
    }

    const JOHN_3_16: &str = "For God so loved the world";

    fn client(api: MockApi) -> AnnotationSyncClient {
        AnnotationSyncClient::new(Arc::new(api), SharedStore::create(), "#FFFF00")
    }

    fn john(verse: u32) -> VerseRef {
        VerseRef::new("John", 3, verse)
    }

    #[tokio::test]
    async fn test_highlight_save_installs_server_set() {
        let api = MockApi {
            highlights: Mutex::new(vec![Highlight::new("h1", &john(16), 0, 3, "#00FF00")]),
            ..Default::default()
        };
        let client = client(api);

        client.fetch_chapter("John", 3).await.unwrap();
        let existing = client.store().highlights("John", 3, 16);
        assert_eq!(existing.len(), 1);

        // Select [5, 9) on the verse as currently rendered
        let rendered = RenderedVerse::from_plan(&build_render_plan(Some(JOHN_3_16), &existing));
        assert_eq!(rendered.runs().len(), 2);
        let selection = Selection::new(
            rendered.boundary_at(5).unwrap(),
            rendered.boundary_at(9).unwrap(),
        );
        let range = resolve_offsets(JOHN_3_16, Some(&rendered), &selection).unwrap();
        assert_eq!(range.slice(JOHN_3_16), Some("od s"));

        let saved = client
            .save_highlight(&john(16), range.start, range.end, Some("#FFFF00"))
            .await
            .unwrap();
        assert_eq!(saved.len(), 2);

        let cached = client.store().highlights("John", 3, 16);
        let offsets: Vec<_> = cached.iter().map(|h| (h.start_offset, h.end_offset)).collect();
        assert_eq!(offsets, vec![(0, 3), (5, 9)]);
        assert_eq!(cached[1].color, "#FFFF00");

        let plan = build_render_plan(Some(JOHN_3_16), &cached);
        assert_eq!(plan.to_text(), JOHN_3_16);
        assert_eq!(
            client.operation_state(OperationKind::SaveHighlight),
            OperationState::Success
        );
    }

    #[tokio::test]
    async fn test_whitespace_study_note_deletes() {
        let existing = Note::own("Genesis", 1, Some(1), NoteKind::Study, "In the beginning").with_id("s1");
        let api = MockApi {
            notes: vec![existing],
            ..Default::default()
        };
        let client = client(api);
        client.fetch_chapter("Genesis", 1).await.unwrap();
        assert!(client
            .store()
            .read()
            .own_note("Genesis", 1, Some(1), NoteKind::Study)
            .is_some());

        let stored = client
            .save_study_note(&VerseRef::new("Genesis", 1, 1), "  ")
            .await
            .unwrap();

        assert!(stored.is_none());
        assert!(client
            .store()
            .read()
            .own_note("Genesis", 1, Some(1), NoteKind::Study)
            .is_none());
    }

    #[tokio::test]
    async fn test_quick_note_applies_server_echo() {
        let api = Arc::new(MockApi::default());
        let client = AnnotationSyncClient::new(api.clone(), SharedStore::create(), "#FFFF00");

        let stored = client
            .save_quick_note(&john(16), "  Love came first \n")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(stored.id.as_deref(), Some("srv-quick"));
        assert_eq!(stored.content, "Love came first");
        assert_eq!(api.saved_notes.lock()[0].1.content, "Love came first");
        assert_eq!(client.store().get("John", 3, 16).len(), 1);
    }

    #[tokio::test]
    async fn test_id_only_echo_keeps_saved_note() {
        let api = MockApi {
            id_only_echo: true,
            ..Default::default()
        };
        let client = client(api);

        let stored = client
            .save_study_note(&john(16), "Born again")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.id.as_deref(), Some("srv-study"));
        assert_eq!(stored.content, "Born again");
        assert_eq!(stored.verse, Some(16));
        assert!(client
            .store()
            .read()
            .own_note("John", 3, Some(16), NoteKind::Study)
            .is_some());
    }

    #[tokio::test]
    async fn test_chapter_note_round_trip() {
        let client = client(MockApi::default());

        client.save_chapter_note("John", 3, "New birth").await.unwrap();
        let store = client.store().read();
        let note = store.own_note("John", 3, None, NoteKind::Chapter).unwrap();
        assert_eq!(note.content, "New birth");
        assert_eq!(note.verse, None);
    }

    #[tokio::test]
    async fn test_failure_leaves_store_untouched() {
        let client = client(MockApi::failing(SyncError::Server {
            status: 500,
            message: "boom".into(),
        }));
        client.store().write().load_chapter(
            "John",
            3,
            vec![Highlight::new("h1", &john(16), 0, 3, "red").into()],
        );

        let err = client.save_highlight(&john(16), 5, 9, None).await.unwrap_err();
        assert!(matches!(err, SyncError::Server { status: 500, .. }));
        assert_eq!(client.store().highlights("John", 3, 16).len(), 1);
        assert!(matches!(
            client.operation_state(OperationKind::SaveHighlight),
            OperationState::Failed(_)
        ));

        assert!(client.fetch_chapter("John", 3).await.is_err());
        assert_eq!(client.store().get("John", 3, 16).len(), 1);
    }

    #[tokio::test]
    async fn test_unauthorized_expires_session() {
        let client = client(MockApi::failing(SyncError::Auth));
        let events = client.session_events();
        assert_eq!(*events.borrow(), SessionState::Active);

        let err = client.save_quick_note(&john(16), "note").await.unwrap_err();
        assert!(err.is_auth());
        assert_eq!(*events.borrow(), SessionState::Expired);
    }

    #[tokio::test]
    async fn test_invalid_highlight_rejected_locally() {
        let client = client(MockApi::default());
        let err = client.save_highlight(&john(16), 9, 5, None).await.unwrap_err();
        assert!(matches!(err, SyncError::Validation { status: None, .. }));
        assert!(client.store().highlights("John", 3, 16).is_empty());
    }

    #[tokio::test]
    async fn test_default_color_used() {
        let client = client(MockApi::default());
        let saved = client.save_highlight(&john(16), 0, 3, None).await.unwrap();
        assert_eq!(saved[0].color, "#FFFF00");
    }

    #[tokio::test]
    async fn test_fetches_replace_one_family() {
        let friend_note = Note::own("John", 3, Some(16), NoteKind::Quick, "Amen").with_owner(Owner::Friend {
            username: "ruth".into(),
        });
        let api = MockApi {
            notes: vec![friend_note],
            highlights: Mutex::new(vec![Highlight::new("h1", &john(16), 0, 3, "red")]),
            ..Default::default()
        };
        let client = client(api);

        client.fetch_chapter_highlights("John", 3).await.unwrap();
        client.fetch_chapter_notes("John", 3).await.unwrap();

        let store = client.store().read();
        assert_eq!(store.highlights("John", 3, 16).count(), 1);
        assert_eq!(store.friend_notes("John", 3, 16, NoteKind::Quick).len(), 1);
    }

    #[tokio::test]
    async fn test_bookmark_lifecycle() {
        let client = client(MockApi::default());
        let verse = john(16);

        let err = client.remove_bookmark(&verse).await.unwrap_err();
        assert!(matches!(err, SyncError::Validation { status: None, .. }));

        client.add_bookmark(&verse, Some(JOHN_3_16)).await.unwrap();
        assert!(client.store().read().is_bookmarked(&verse));

        client.remove_bookmark(&verse).await.unwrap();
        assert!(!client.store().read().is_bookmarked(&verse));
        assert!(client.fetch_bookmarks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_operation_state_starts_idle() {
        let client = client(MockApi::default());
        assert_eq!(
            client.operation_state(OperationKind::FetchChapter),
            OperationState::Idle
        );
        client.fetch_all_notes(0, 20).await.unwrap();
        assert_eq!(
            client.operation_state(OperationKind::FetchAllNotes),
            OperationState::Success
        );
    }
}
