//! Annotation types as exchanged with the note/highlight service
//!
//! Notes and highlights are keyed by book, chapter and verse. The service is
//! loose about number encoding (the web client posts chapter and verse as
//! strings), so every numeric field accepts either form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A single verse location
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VerseRef {
    pub book: String,
    pub chapter: u32,
    pub verse: u32,
}

impl VerseRef {
    pub fn new(book: &str, chapter: u32, verse: u32) -> Self {
        Self {
            book: book.to_string(),
            chapter,
            verse,
        }
    }

    pub fn chapter_key(&self) -> ChapterKey {
        ChapterKey::new(&self.book, self.chapter)
    }
}

impl fmt::Display for VerseRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}:{}", self.book, self.chapter, self.verse)
    }
}

/// Key of one cached chapter
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChapterKey {
    pub book: String,
    pub chapter: u32,
}

impl ChapterKey {
    pub fn new(book: &str, chapter: u32) -> Self {
        Self {
            book: book.to_string(),
            chapter,
        }
    }
}

impl fmt::Display for ChapterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.book, self.chapter)
    }
}

/// Kinds of notes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteKind {
    /// Short inline note on a verse
    Quick,
    /// Longer note shown in the study panel
    Study,
    /// Note on a whole chapter (no verse)
    Chapter,
}

impl NoteKind {
    /// Path segment of the save endpoint
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteKind::Quick => "quick",
            NoteKind::Study => "study",
            NoteKind::Chapter => "chapter",
        }
    }

    pub fn is_verse_level(&self) -> bool {
        !matches!(self, NoteKind::Chapter)
    }
}

/// Who an annotation belongs to
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "UserRef", into = "UserRef")]
pub enum Owner {
    /// The signed-in user
    #[default]
    Me,
    /// A friend whose annotations are visible to the user
    Friend { username: String },
}

impl Owner {
    pub fn is_self(&self) -> bool {
        matches!(self, Owner::Me)
    }

    pub fn username(&self) -> Option<&str> {
        match self {
            Owner::Me => None,
            Owner::Friend { username } => Some(username),
        }
    }
}

/// Wire form of the owner marker: `{ "is_self": bool, "username": str }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRef {
    #[serde(default = "default_is_self")]
    pub is_self: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

fn default_is_self() -> bool {
    true
}

impl From<UserRef> for Owner {
    fn from(user: UserRef) -> Self {
        if user.is_self {
            Owner::Me
        } else {
            Owner::Friend {
                username: user.username.unwrap_or_default(),
            }
        }
    }
}

impl UserRef {
    /// Owner of a record carrying either a nested `user` object or flat
    /// `is_self`/`username` fields; the nested object wins
    fn resolve(user: Option<UserRef>, is_self: Option<bool>, username: Option<String>) -> Owner {
        user.unwrap_or(UserRef {
            is_self: is_self.unwrap_or(true),
            username,
        })
        .into()
    }
}

impl From<Owner> for UserRef {
    fn from(owner: Owner) -> Self {
        match owner {
            Owner::Me => UserRef {
                is_self: true,
                username: None,
            },
            Owner::Friend { username } => UserRef {
                is_self: false,
                username: Some(username),
            },
        }
    }
}

/// A quick, study or chapter note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "NoteRecord")]
pub struct Note {
    /// Server-assigned identifier
    pub id: Option<String>,
    pub book: String,
    pub chapter: u32,
    /// `None` for chapter notes
    pub verse: Option<u32>,
    #[serde(rename = "note_type")]
    pub kind: NoteKind,
    pub content: String,
    #[serde(rename = "user")]
    pub owner: Owner,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Note {
    /// Build a note owned by the current user
    pub fn own(book: &str, chapter: u32, verse: Option<u32>, kind: NoteKind, content: &str) -> Self {
        Self {
            id: None,
            book: book.to_string(),
            chapter,
            verse,
            kind,
            content: content.to_string(),
            owner: Owner::Me,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn with_owner(mut self, owner: Owner) -> Self {
        self.owner = owner;
        self
    }

    /// Whether the note carries no content (a delete signal on save)
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// A colored span over a verse's plain text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "HighlightRecord")]
pub struct Highlight {
    pub id: String,
    pub book: String,
    pub chapter: u32,
    pub verse: u32,
    /// Inclusive start, in characters of the plain verse text
    pub start_offset: usize,
    /// Exclusive end, in characters of the plain verse text
    pub end_offset: usize,
    pub color: String,
    #[serde(rename = "user")]
    pub owner: Owner,
}

impl Highlight {
    pub fn new(id: &str, verse: &VerseRef, start: usize, end: usize, color: &str) -> Self {
        Self {
            id: id.to_string(),
            book: verse.book.clone(),
            chapter: verse.chapter,
            verse: verse.verse,
            start_offset: start,
            end_offset: end,
            color: color.to_string(),
            owner: Owner::Me,
        }
    }

    pub fn with_owner(mut self, owner: Owner) -> Self {
        self.owner = owner;
        self
    }

    pub fn verse_ref(&self) -> VerseRef {
        VerseRef::new(&self.book, self.chapter, self.verse)
    }

    pub fn len(&self) -> usize {
        self.end_offset.saturating_sub(self.start_offset)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Render order: start offset, then end offset, then id
    pub fn render_order(a: &Highlight, b: &Highlight) -> Ordering {
        a.start_offset
            .cmp(&b.start_offset)
            .then(a.end_offset.cmp(&b.end_offset))
            .then_with(|| a.id.cmp(&b.id))
    }
}

/// A note as the service sends it
#[derive(Deserialize)]
struct NoteRecord {
    #[serde(default, deserialize_with = "lenient::opt_id")]
    id: Option<String>,
    book: String,
    #[serde(deserialize_with = "lenient::number")]
    chapter: u32,
    #[serde(default, deserialize_with = "lenient::opt_number")]
    verse: Option<u32>,
    note_type: NoteKind,
    #[serde(default)]
    content: String,
    #[serde(default)]
    user: Option<UserRef>,
    #[serde(default)]
    is_self: Option<bool>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

impl From<NoteRecord> for Note {
    fn from(record: NoteRecord) -> Self {
        Self {
            id: record.id,
            book: record.book,
            chapter: record.chapter,
            verse: record.verse,
            kind: record.note_type,
            content: record.content,
            owner: UserRef::resolve(record.user, record.is_self, record.username),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// A highlight as the service sends it
#[derive(Deserialize)]
struct HighlightRecord {
    #[serde(deserialize_with = "lenient::id")]
    id: String,
    book: String,
    #[serde(deserialize_with = "lenient::number")]
    chapter: u32,
    #[serde(deserialize_with = "lenient::number")]
    verse: u32,
    #[serde(deserialize_with = "lenient::number")]
    start_offset: usize,
    #[serde(deserialize_with = "lenient::number")]
    end_offset: usize,
    color: String,
    #[serde(default)]
    user: Option<UserRef>,
    #[serde(default)]
    is_self: Option<bool>,
    #[serde(default)]
    username: Option<String>,
}

impl From<HighlightRecord> for Highlight {
    fn from(record: HighlightRecord) -> Self {
        Self {
            id: record.id,
            book: record.book,
            chapter: record.chapter,
            verse: record.verse,
            start_offset: record.start_offset,
            end_offset: record.end_offset,
            color: record.color,
            owner: UserRef::resolve(record.user, record.is_self, record.username),
        }
    }
}

/// Anything attached to a verse or chapter
#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    Note(Note),
    Highlight(Highlight),
}

impl Annotation {
    pub fn book(&self) -> &str {
        match self {
            Annotation::Note(n) => &n.book,
            Annotation::Highlight(h) => &h.book,
        }
    }

    pub fn chapter(&self) -> u32 {
        match self {
            Annotation::Note(n) => n.chapter,
            Annotation::Highlight(h) => h.chapter,
        }
    }

    /// Verse number, `None` for chapter notes
    pub fn verse(&self) -> Option<u32> {
        match self {
            Annotation::Note(n) => n.verse,
            Annotation::Highlight(h) => Some(h.verse),
        }
    }

    pub fn owner(&self) -> &Owner {
        match self {
            Annotation::Note(n) => &n.owner,
            Annotation::Highlight(h) => &h.owner,
        }
    }

    pub fn as_note(&self) -> Option<&Note> {
        match self {
            Annotation::Note(n) => Some(n),
            Annotation::Highlight(_) => None,
        }
    }

    pub fn as_highlight(&self) -> Option<&Highlight> {
        match self {
            Annotation::Highlight(h) => Some(h),
            Annotation::Note(_) => None,
        }
    }

    pub fn is_highlight(&self) -> bool {
        matches!(self, Annotation::Highlight(_))
    }
}

impl From<Note> for Annotation {
    fn from(note: Note) -> Self {
        Annotation::Note(note)
    }
}

impl From<Highlight> for Annotation {
    fn from(highlight: Highlight) -> Self {
        Annotation::Highlight(highlight)
    }
}

/// A bookmarked verse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    #[serde(deserialize_with = "lenient::id")]
    pub id: String,
    pub book: String,
    #[serde(deserialize_with = "lenient::number")]
    pub chapter: u32,
    #[serde(deserialize_with = "lenient::number")]
    pub verse: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_preview: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Bookmark {
    pub fn verse_ref(&self) -> VerseRef {
        VerseRef::new(&self.book, self.chapter, self.verse)
    }
}

/// Deserializers accepting numbers or numeric strings
mod lenient {
    use serde::de::{Deserializer, Error};
    use serde::Deserialize;
    use std::str::FromStr;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u64),
        Signed(i64),
        Float(f64),
        Text(String),
    }

    impl Raw {
        fn into_number<T: TryFrom<u64> + FromStr>(self) -> Option<T> {
            match self {
                Raw::Int(n) => T::try_from(n).ok(),
                Raw::Signed(_) => None,
                Raw::Float(f) if f >= 0.0 && f.fract() == 0.0 => T::try_from(f as u64).ok(),
                Raw::Float(_) => None,
                Raw::Text(s) => s.trim().parse().ok(),
            }
        }

        fn into_id(self) -> String {
            match self {
                Raw::Int(n) => n.to_string(),
                Raw::Signed(n) => n.to_string(),
                Raw::Float(f) => f.to_string(),
                Raw::Text(s) => s,
            }
        }
    }

    pub fn number<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: TryFrom<u64> + FromStr,
    {
        Raw::deserialize(deserializer)?
            .into_number()
            .ok_or_else(|| D::Error::custom("expected a non-negative integer"))
    }

    pub fn opt_number<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: TryFrom<u64> + FromStr,
    {
        match Option::<Raw>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Raw::Text(s)) if s.trim().is_empty() => Ok(None),
            Some(raw) => raw
                .into_number()
                .map(Some)
                .ok_or_else(|| D::Error::custom("expected a non-negative integer")),
        }
    }

    pub fn id<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Raw::deserialize(deserializer)?.into_id())
    }

    pub fn opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<Raw>::deserialize(deserializer)?.map(Raw::into_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_note_from_service_json() {
        let note: Note = serde_json::from_value(json!({
            "id": 42,
            "book": "John",
            "chapter": "3",
            "verse": "16",
            "note_type": "study",
            "content": "For God so loved",
            "user": { "is_self": false, "username": "anna" },
            "created_at": "2024-03-01T10:00:00Z"
        }))
        .unwrap();

        assert_eq!(note.id.as_deref(), Some("42"));
        assert_eq!(note.chapter, 3);
        assert_eq!(note.verse, Some(16));
        assert_eq!(note.kind, NoteKind::Study);
        assert_eq!(note.owner.username(), Some("anna"));
        assert!(note.created_at.is_some());
    }

    #[test]
    fn test_chapter_note_without_verse() {
        let note: Note = serde_json::from_value(json!({
            "id": "n1",
            "book": "Genesis",
            "chapter": 1,
            "verse": null,
            "note_type": "chapter",
            "content": "Creation",
            "user": { "is_self": true, "username": "me" }
        }))
        .unwrap();

        assert_eq!(note.verse, None);
        assert!(note.owner.is_self());
        assert!(!note.kind.is_verse_level());
    }

    #[test]
    fn test_highlight_defaults_to_own() {
        let highlight: Highlight = serde_json::from_value(json!({
            "id": "h1",
            "book": "John",
            "chapter": 3,
            "verse": 16,
            "start_offset": "0",
            "end_offset": 3,
            "color": "#FFFF00"
        }))
        .unwrap();

        assert_eq!(highlight.owner, Owner::Me);
        assert_eq!(highlight.len(), 3);
        assert_eq!(highlight.verse_ref().to_string(), "John 3:16");
    }

    #[test]
    fn test_highlight_with_flat_owner_fields() {
        let highlight: Highlight = serde_json::from_value(json!({
            "id": "h2", "book": "John", "chapter": 3, "verse": 16,
            "start_offset": 5, "end_offset": 9, "color": "#FF0000",
            "is_self": false, "username": "anna"
        }))
        .unwrap();
        assert_eq!(
            highlight.owner,
            Owner::Friend {
                username: "anna".to_string()
            }
        );

        // A nested user object takes precedence over flat fields
        let highlight: Highlight = serde_json::from_value(json!({
            "id": "h3", "book": "John", "chapter": 3, "verse": 16,
            "start_offset": 0, "end_offset": 3, "color": "#FF0000",
            "is_self": false, "user": { "is_self": true }
        }))
        .unwrap();
        assert!(highlight.owner.is_self());
    }

    #[test]
    fn test_null_user_treated_as_missing() {
        let highlight: Highlight = serde_json::from_value(json!({
            "id": "h1", "book": "John", "chapter": 3, "verse": 16,
            "start_offset": 0, "end_offset": 3, "color": "#FFFF00",
            "user": null
        }))
        .unwrap();
        assert_eq!(highlight.owner, Owner::Me);

        let note: Note = serde_json::from_value(json!({
            "id": 7, "book": "Ruth", "chapter": 1, "verse": 16,
            "note_type": "quick", "content": "whither thou goest",
            "user": null, "is_self": false, "username": "boaz"
        }))
        .unwrap();
        assert_eq!(note.owner.username(), Some("boaz"));
    }

    #[test]
    fn test_negative_offset_rejected() {
        let parsed = serde_json::from_value::<Highlight>(json!({
            "id": "h1", "book": "John", "chapter": 3, "verse": 16,
            "start_offset": -2, "end_offset": 3, "color": "#FFFF00"
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_render_order_tie_breaks() {
        let verse = VerseRef::new("John", 3, 16);
        let a = Highlight::new("b", &verse, 0, 5, "red");
        let b = Highlight::new("a", &verse, 0, 5, "blue");
        let c = Highlight::new("c", &verse, 0, 3, "green");

        let mut all = vec![a, b, c];
        all.sort_by(Highlight::render_order);
        let ids: Vec<_> = all.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_owner_serializes_as_user_object() {
        let note = Note::own("Ruth", 1, Some(16), NoteKind::Quick, "whither thou goest")
            .with_owner(Owner::Friend {
                username: "boaz".to_string(),
            });
        let json = serde_json::to_value(&note).unwrap();
        assert_eq!(json["user"]["is_self"], json!(false));
        assert_eq!(json["note_type"], json!("quick"));
    }
}
