//! Sync module
//!
//! Round trips to the note/highlight service:
//! - `AnnotationApi` transport trait and its reqwest implementation
//! - `AnnotationSyncClient`, which writes confirmed results into the store
//! - Request/response types and per-operation state

mod api;
mod client;
mod http;
mod types;

pub use api::AnnotationApi;
pub use client::AnnotationSyncClient;
pub use http::HttpAnnotationApi;
pub use types::{
    NewBookmark, NoteEcho, NotesPage, OperationKind, OperationState, Pagination, SaveHighlightRequest,
    SaveNoteRequest, SessionState,
};
