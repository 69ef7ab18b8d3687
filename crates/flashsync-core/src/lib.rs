//! flashsync-core - Core library for flashsync
//!
//! Finds flashcard notes embedded in Markdown documents and keeps them in sync
//! with an AnkiConnect-compatible flashcard store. The CLI is a thin layer
//! over [`sync::SyncEngine`].

pub mod cloze;
pub mod config;
pub mod error;
pub mod media;
pub mod models;
pub mod mutate;
pub mod parser;
pub mod render;
pub mod span;
pub mod state;
pub mod store;
pub mod sync;
pub mod util;
pub mod vault;

pub use error::{Error, Result};
pub use models::{Note, NoteId};
