//! In-memory annotation store
//!
//! Holds the notes and highlights of every chapter loaded during a reading
//! session, keyed by (book, chapter) and then by verse. Entries reflect what
//! the service last returned; nothing is written before a request succeeds.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::types::{Annotation, Bookmark, ChapterKey, Highlight, Note, NoteKind, VerseRef};

/// Annotations of one chapter
#[derive(Debug, Default, Clone)]
struct ChapterEntry {
    /// Set by a chapter load; patched-only entries stay unloaded
    loaded: bool,
    verses: BTreeMap<u32, Vec<Annotation>>,
    /// Chapter-level notes (no verse)
    chapter_notes: Vec<Note>,
}

impl ChapterEntry {
    fn insert(&mut self, annotation: Annotation) {
        match annotation {
            Annotation::Note(note) if note.verse.is_none() => {
                insert_note(&mut self.chapter_notes, note);
            }
            Annotation::Note(note) => {
                let verse = note.verse.unwrap_or_default();
                let list = self.verses.entry(verse).or_default();
                if note.owner.is_self() {
                    list.retain(|a| !is_own_note(a, note.kind));
                }
                list.push(Annotation::Note(note));
            }
            Annotation::Highlight(highlight) => {
                self.verses
                    .entry(highlight.verse)
                    .or_default()
                    .push(Annotation::Highlight(highlight));
            }
        }
    }

    /// Notes first in arrival order, then highlights in render order
    fn normalize(&mut self) {
        self.verses.retain(|_, list| !list.is_empty());
        for list in self.verses.values_mut() {
            sort_verse(list);
        }
    }

    fn remove_verse_notes(&mut self) {
        for list in self.verses.values_mut() {
            list.retain(Annotation::is_highlight);
        }
        self.verses.retain(|_, list| !list.is_empty());
    }

    fn remove_highlights(&mut self) {
        for list in self.verses.values_mut() {
            list.retain(|a| !a.is_highlight());
        }
        self.verses.retain(|_, list| !list.is_empty());
    }
}

fn is_own_note(annotation: &Annotation, kind: NoteKind) -> bool {
    matches!(annotation, Annotation::Note(n) if n.owner.is_self() && n.kind == kind)
}

/// Insert a chapter-level note, keeping at most one per own kind
fn insert_note(notes: &mut Vec<Note>, note: Note) {
    if note.owner.is_self() {
        notes.retain(|n| !(n.owner.is_self() && n.kind == note.kind));
    }
    notes.push(note);
}

fn apply_content(note: &mut Note, content: &str, server_id: Option<&str>) {
    note.content = content.to_string();
    if let Some(id) = server_id {
        note.id = Some(id.to_string());
    }
}

fn sort_verse(list: &mut [Annotation]) {
    list.sort_by(|a, b| match (a, b) {
        (Annotation::Highlight(x), Annotation::Highlight(y)) => Highlight::render_order(x, y),
        (Annotation::Note(_), Annotation::Highlight(_)) => std::cmp::Ordering::Less,
        (Annotation::Highlight(_), Annotation::Note(_)) => std::cmp::Ordering::Greater,
        (Annotation::Note(_), Annotation::Note(_)) => std::cmp::Ordering::Equal,
    });
}

/// Session-scoped annotation cache
#[derive(Debug, Default, Clone)]
pub struct AnnotationStore {
    chapters: HashMap<ChapterKey, ChapterEntry>,
    bookmarks: Vec<Bookmark>,
}

impl AnnotationStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace everything known about a chapter
    ///
    /// Annotations belonging to another chapter are dropped.
    pub fn load_chapter(&mut self, book: &str, chapter: u32, annotations: Vec<Annotation>) {
        let key = ChapterKey::new(book, chapter);
        let mut entry = ChapterEntry {
            loaded: true,
            ..Default::default()
        };

        let mut skipped = 0usize;
        for annotation in annotations {
            if annotation.book() != book || annotation.chapter() != chapter {
                skipped += 1;
                continue;
            }
            entry.insert(annotation);
        }
        entry.normalize();

        if skipped > 0 {
            tracing::warn!("Dropped {} annotations outside {}", skipped, key);
        }
        tracing::debug!(
            "Loaded {} ({} verses, {} chapter notes)",
            key,
            entry.verses.len(),
            entry.chapter_notes.len()
        );

        self.chapters.insert(key, entry);
    }

    /// Annotations of one verse, empty when nothing is cached
    pub fn get(&self, book: &str, chapter: u32, verse: u32) -> &[Annotation] {
        self.chapters
            .get(&ChapterKey::new(book, chapter))
            .and_then(|entry| entry.verses.get(&verse))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Chapter-level notes, empty when nothing is cached
    pub fn chapter_notes(&self, book: &str, chapter: u32) -> &[Note] {
        self.chapters
            .get(&ChapterKey::new(book, chapter))
            .map(|entry| entry.chapter_notes.as_slice())
            .unwrap_or(&[])
    }

    /// Notes of one verse
    pub fn notes(&self, book: &str, chapter: u32, verse: u32) -> impl Iterator<Item = &Note> {
        self.get(book, chapter, verse).iter().filter_map(Annotation::as_note)
    }

    /// Highlights of one verse, in render order
    pub fn highlights(&self, book: &str, chapter: u32, verse: u32) -> impl Iterator<Item = &Highlight> {
        self.get(book, chapter, verse)
            .iter()
            .filter_map(Annotation::as_highlight)
    }

    /// The current user's note of a kind; `verse` is ignored for chapter notes
    pub fn own_note(&self, book: &str, chapter: u32, verse: Option<u32>, kind: NoteKind) -> Option<&Note> {
        let is_own = |n: &&Note| n.owner.is_self() && n.kind == kind;
        match (kind, verse) {
            (NoteKind::Chapter, _) => self.chapter_notes(book, chapter).iter().find(is_own),
            (_, Some(verse)) => self.notes(book, chapter, verse).find(is_own),
            (_, None) => None,
        }
    }

    /// Friends' notes of a kind on one verse
    pub fn friend_notes(&self, book: &str, chapter: u32, verse: u32, kind: NoteKind) -> Vec<&Note> {
        self.notes(book, chapter, verse)
            .filter(|n| !n.owner.is_self() && n.kind == kind)
            .collect()
    }

    /// Verses of a chapter carrying any annotation, ascending
    pub fn annotated_verses(&self, book: &str, chapter: u32) -> Vec<u32> {
        self.chapters
            .get(&ChapterKey::new(book, chapter))
            .map(|entry| entry.verses.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Whether a chapter has been loaded from the service
    pub fn is_loaded(&self, book: &str, chapter: u32) -> bool {
        self.chapters
            .get(&ChapterKey::new(book, chapter))
            .is_some_and(|entry| entry.loaded)
    }

    /// Create, replace or remove the current user's note of a kind
    ///
    /// Blank content removes the note. The same rule applies to quick, study
    /// and chapter notes; chapter notes ignore `verse`. Returns the stored
    /// note, if any remains.
    pub fn upsert_own_note(
        &mut self,
        book: &str,
        chapter: u32,
        verse: Option<u32>,
        kind: NoteKind,
        content: &str,
        server_id: Option<&str>,
    ) -> Option<&Note> {
        let key = ChapterKey::new(book, chapter);
        let blank = content.trim().is_empty();

        if !kind.is_verse_level() {
            let entry = self.chapters.entry(key).or_default();
            let slot = &mut entry.chapter_notes;
            let existing = slot.iter().position(|n| n.owner.is_self() && n.kind == kind);
            if blank {
                if let Some(index) = existing {
                    slot.remove(index);
                    tracing::debug!("Removed own chapter note on {} {}", book, chapter);
                }
                return None;
            }
            let index = match existing {
                Some(index) => {
                    apply_content(&mut slot[index], content, server_id);
                    index
                }
                None => {
                    let mut note = Note::own(book, chapter, None, kind, content);
                    note.id = server_id.map(str::to_string);
                    slot.push(note);
                    slot.len() - 1
                }
            };
            tracing::debug!("Stored own chapter note on {} {}", book, chapter);
            return slot.get(index);
        }

        let Some(verse) = verse else {
            tracing::warn!(
                "Ignoring {} note without a verse in {} {}",
                kind.as_str(),
                book,
                chapter
            );
            return None;
        };

        let entry = self.chapters.entry(key).or_default();
        if blank {
            if let Some(list) = entry.verses.get_mut(&verse) {
                list.retain(|a| !is_own_note(a, kind));
                if list.is_empty() {
                    entry.verses.remove(&verse);
                }
            }
            tracing::debug!("Removed own {} note on {} {}:{}", kind.as_str(), book, chapter, verse);
            return None;
        }

        let list = entry.verses.entry(verse).or_default();
        match list.iter().position(|a| is_own_note(a, kind)) {
            Some(index) => {
                if let Annotation::Note(note) = &mut list[index] {
                    apply_content(note, content, server_id);
                }
            }
            None => {
                let mut note = Note::own(book, chapter, Some(verse), kind, content);
                note.id = server_id.map(str::to_string);
                list.push(Annotation::Note(note));
                sort_verse(list);
            }
        }
        tracing::debug!("Stored own {} note on {} {}:{}", kind.as_str(), book, chapter, verse);

        list.iter()
            .filter_map(Annotation::as_note)
            .find(|n| n.owner.is_self() && n.kind == kind)
    }

    /// Install the service's complete highlight set for one verse
    ///
    /// Every previous highlight on the verse is dropped, whoever owns it.
    pub fn replace_verse_highlights(
        &mut self,
        book: &str,
        chapter: u32,
        verse: u32,
        highlights: Vec<Highlight>,
    ) {
        let key = ChapterKey::new(book, chapter);
        let entry = self.chapters.entry(key.clone()).or_default();
        let list = entry.verses.entry(verse).or_default();

        list.retain(|a| !a.is_highlight());
        let count = highlights.len();
        list.extend(highlights.into_iter().map(Annotation::Highlight));
        sort_verse(list);

        if list.is_empty() {
            entry.verses.remove(&verse);
        }
        tracing::debug!("Replaced highlights on {}:{} ({} now)", key, verse, count);
    }

    /// Replace the verse-level notes of a chapter, keeping its highlights
    pub fn replace_chapter_notes(&mut self, book: &str, chapter: u32, notes: Vec<Note>) {
        let key = ChapterKey::new(book, chapter);
        let entry = self.chapters.entry(key).or_default();
        entry.remove_verse_notes();
        for note in notes {
            if note.book == book && note.chapter == chapter && note.verse.is_some() {
                entry.insert(Annotation::Note(note));
            }
        }
        entry.normalize();
    }

    /// Replace all highlights of a chapter, keeping its notes
    pub fn replace_chapter_highlights(&mut self, book: &str, chapter: u32, highlights: Vec<Highlight>) {
        let key = ChapterKey::new(book, chapter);
        let entry = self.chapters.entry(key).or_default();
        entry.remove_highlights();
        for highlight in highlights {
            if highlight.book == book && highlight.chapter == chapter {
                entry.insert(Annotation::Highlight(highlight));
            }
        }
        entry.normalize();
    }

    /// Replace the notes of one verse, keeping its highlights
    pub fn replace_verse_notes(&mut self, book: &str, chapter: u32, verse: u32, notes: Vec<Note>) {
        let entry = self.chapters.entry(ChapterKey::new(book, chapter)).or_default();
        if let Some(list) = entry.verses.get_mut(&verse) {
            list.retain(Annotation::is_highlight);
        }
        for note in notes {
            if note.verse == Some(verse) {
                entry.insert(Annotation::Note(note));
            }
        }
        entry.normalize();
    }

    /// Number of cached chapters
    pub fn chapter_count(&self) -> usize {
        self.chapters.len()
    }

    /// Discard everything, ending the session
    pub fn dispose(&mut self) {
        tracing::debug!("Disposing annotation store ({} chapters)", self.chapters.len());
        self.chapters.clear();
        self.bookmarks.clear();
    }

    // ============================================
    // Bookmarks
    // ============================================

    pub fn load_bookmarks(&mut self, bookmarks: Vec<Bookmark>) {
        self.bookmarks = bookmarks;
    }

    /// Add a bookmark, replacing any other on the same verse
    pub fn insert_bookmark(&mut self, bookmark: Bookmark) {
        let verse = bookmark.verse_ref();
        self.bookmarks.retain(|b| b.verse_ref() != verse);
        self.bookmarks.push(bookmark);
    }

    pub fn remove_bookmark(&mut self, id: &str) -> bool {
        let before = self.bookmarks.len();
        self.bookmarks.retain(|b| b.id != id);
        self.bookmarks.len() != before
    }

    pub fn bookmark_for(&self, verse: &VerseRef) -> Option<&Bookmark> {
        self.bookmarks.iter().find(|b| b.verse_ref() == *verse)
    }

    pub fn is_bookmarked(&self, verse: &VerseRef) -> bool {
        self.bookmark_for(verse).is_some()
    }

    pub fn bookmarks(&self) -> &[Bookmark] {
        &self.bookmarks
    }
}

/// Shared handle to one session's store
///
/// Locks are held only for the duration of a synchronous call.
#[derive(Debug, Clone, Default)]
pub struct SharedStore {
    inner: Arc<RwLock<AnnotationStore>>,
}

impl SharedStore {
    /// Create a store for a new reading session
    pub fn create() -> Self {
        Self::default()
    }

    pub fn read(&self) -> RwLockReadGuard<'_, AnnotationStore> {
        self.inner.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, AnnotationStore> {
        self.inner.write()
    }

    /// Owned copy of one verse's annotations
    pub fn get(&self, book: &str, chapter: u32, verse: u32) -> Vec<Annotation> {
        self.read().get(book, chapter, verse).to_vec()
    }

    /// Owned copy of one verse's highlights, in render order
    pub fn highlights(&self, book: &str, chapter: u32, verse: u32) -> Vec<Highlight> {
        self.read().highlights(book, chapter, verse).cloned().collect()
    }

    pub fn dispose(&self) {
        self.write().dispose();
    }
}
