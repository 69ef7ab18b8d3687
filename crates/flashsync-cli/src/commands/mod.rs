pub mod common;
pub mod completions;
pub mod config;
pub mod parse;
pub mod regenerate;
pub mod settings;
pub mod sync;
