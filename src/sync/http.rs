//! HTTP transport over reqwest

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::api::AnnotationApi;
use super::types::{NewBookmark, NoteEcho, NotesPage, SaveHighlightRequest, SaveNoteRequest};
use crate::annotations::{Bookmark, Highlight, Note, NoteKind};
use crate::config::ApiConfig;
use crate::error::{Result, SyncError};

/// Note/highlight service client
#[derive(Debug, Clone)]
pub struct HttpAnnotationApi {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpAnnotationApi {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.authorized(self.client.get(self.url(path)))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.authorized(self.client.post(self.url(path)))
    }

    /// Send a request, turning non-success statuses into errors
    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let response = builder.send().await?;
        let status = response.status();
        tracing::debug!("{} {}", status.as_u16(), response.url().path());

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(SyncError::from_status(status.as_u16(), error_message(status, &body)))
    }

    async fn send_json(&self, builder: RequestBuilder) -> Result<Value> {
        let response = self.send(builder).await?;
        let value = response.json::<Value>().await?;
        Ok(value)
    }
}

#[async_trait]
impl AnnotationApi for HttpAnnotationApi {
    async fn fetch_chapter_notes(&self, book: &str, chapter: u32) -> Result<Vec<Note>> {
        let path = format!("/notes/chapter/{}/{}/notes", segment(book), chapter);
        let value = self.send_json(self.get(&path)).await?;
        Ok(decode_list(value, "chapter notes"))
    }

    async fn fetch_chapter_note(&self, book: &str, chapter: u32) -> Result<Option<Note>> {
        let path = format!("/notes/chapter/{}/{}", segment(book), chapter);
        let value = match self.send_json(self.get(&path)).await {
            Ok(value) => value,
            Err(SyncError::Validation {
                status: Some(404), ..
            }) => return Ok(None),
            Err(err) => return Err(err),
        };
        Ok(decode_note(value, NoteKind::Chapter))
    }

    async fn fetch_chapter_highlights(&self, book: &str, chapter: u32) -> Result<Vec<Highlight>> {
        let path = format!("/highlights/chapter/{}/{}", segment(book), chapter);
        let value = self.send_json(self.get(&path)).await?;
        Ok(decode_list(value, "chapter highlights"))
    }

    async fn fetch_verse_notes(&self, book: &str, chapter: u32, verse: u32) -> Result<Vec<Note>> {
        let path = format!("/notes/verse/{}/{}/{}", segment(book), chapter, verse);
        let value = self.send_json(self.get(&path)).await?;
        Ok(decode_list(value, "verse notes"))
    }

    async fn fetch_all_notes(&self, page: u32, limit: u32) -> Result<NotesPage> {
        let builder = self
            .get("/notes")
            .query(&[("page", page), ("limit", limit)]);
        let value = self.send_json(builder).await?;
        serde_json::from_value(value).map_err(|e| SyncError::Server {
            status: 200,
            message: format!("Malformed notes page: {}", e),
        })
    }

    async fn save_note(&self, kind: NoteKind, request: &SaveNoteRequest) -> Result<Option<NoteEcho>> {
        let path = format!("/notes/{}", kind.as_str());
        tracing::debug!(
            "Saving {} note on {} {} ({} chars)",
            kind.as_str(),
            request.book,
            request.chapter,
            request.content.chars().count()
        );
        let value = self.send_json(self.post(&path).json(request)).await?;
        Ok(decode_echo(value))
    }

    async fn save_highlight(&self, request: &SaveHighlightRequest) -> Result<Vec<Highlight>> {
        tracing::debug!(
            "Saving highlight [{}, {}) on {}",
            request.start_offset,
            request.end_offset,
            request.verse_ref()
        );
        let value = self.send_json(self.post("/highlights").json(request)).await?;
        Ok(decode_list(value, "verse highlights"))
    }

    async fn list_bookmarks(&self) -> Result<Vec<Bookmark>> {
        let value = self.send_json(self.get("/bookmarks/")).await?;
        Ok(decode_list(value, "bookmarks"))
    }

    async fn add_bookmark(&self, bookmark: &NewBookmark) -> Result<Bookmark> {
        let value = self.send_json(self.post("/bookmarks/").json(bookmark)).await?;
        serde_json::from_value(value).map_err(|e| SyncError::Server {
            status: 200,
            message: format!("Malformed bookmark: {}", e),
        })
    }

    async fn delete_bookmark(&self, id: &str) -> Result<()> {
        let path = format!("/bookmarks/{}", segment(id));
        let builder = self.authorized(self.client.delete(self.url(&path)));
        self.send(builder).await?;
        Ok(())
    }
}

/// Percent-encode one path segment
fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Message of an error response: its `message` or `error` field, else the status
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["message", "error"]
                .iter()
                .find_map(|key| v.get(*key).and_then(Value::as_str).map(str::to_string))
        })
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| format!("HTTP error! status: {}", status.as_u16()))
}

/// Decode a list payload, degrading to empty when it is not an array
///
/// Elements that fail to decode are skipped.
fn decode_list<T: DeserializeOwned>(value: Value, what: &str) -> Vec<T> {
    let items = match value {
        Value::Array(items) => items,
        other => {
            tracing::warn!("Expected an array of {}, got {}", what, other);
            return Vec::new();
        }
    };

    let total = items.len();
    let decoded: Vec<T> = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                tracing::warn!("Skipping malformed entry in {}: {}", what, e);
                None
            }
        })
        .collect();

    if decoded.len() < total {
        tracing::debug!("Decoded {} of {} {}", decoded.len(), total, what);
    }
    decoded
}

/// Decode a single note, wrapped in `{note}` or bare
///
/// A note without `note_type` is taken to be of `kind`.
fn decode_note(value: Value, kind: NoteKind) -> Option<Note> {
    let mut note = match value {
        Value::Object(mut map) if map.contains_key("note") => {
            let inner = map.remove("note").unwrap_or(Value::Null);
            return decode_note(inner, kind);
        }
        Value::Object(map) if map.is_empty() => return None,
        Value::Object(map) => map,
        Value::Null => return None,
        other => {
            tracing::warn!("Expected a note object, got {}", other);
            return None;
        }
    };

    note.entry("note_type")
        .or_insert_with(|| Value::String(kind.as_str().to_string()));
    match serde_json::from_value(Value::Object(note)) {
        Ok(note) => Some(note),
        Err(e) => {
            tracing::warn!("Malformed {} note: {}", kind.as_str(), e);
            None
        }
    }
}

/// Decode a note-save echo, wrapped in `{note}` or bare
///
/// Only an explicit `null` means no note. Any other shape is a confirmed
/// save whose missing fields come from the request.
fn decode_echo(value: Value) -> Option<NoteEcho> {
    match value {
        Value::Object(mut map) if map.contains_key("note") => {
            decode_echo(map.remove("note").unwrap_or(Value::Null))
        }
        Value::Null => None,
        Value::Object(map) => Some(NoteEcho {
            id: map.get("id").and_then(id_string),
            content: map.get("content").and_then(Value::as_str).map(str::to_string),
        }),
        other => {
            tracing::warn!("Unexpected note echo {}, keeping the saved content", other);
            Some(NoteEcho::default())
        }
    }
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
