//! Data models for flashsync

mod media;
mod note;
mod settings;

pub use media::{merge_media, MediaRef, MediaSource};
pub use note::{Note, NoteId, NoteOptions};
pub use settings::{CategoryChanges, Defaults, Settings, SyntaxConfig};
