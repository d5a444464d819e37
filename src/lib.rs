// Public module exports for the binary and integration tests
pub mod access;
pub mod actions;
pub mod app;
pub mod chat;
pub mod cli;
pub mod client;
pub mod config;
pub mod document;
pub mod enrichment;
pub mod error;
pub mod language;
pub mod logging;
pub mod markdown;
pub mod pagination;
pub mod typewriter;

pub use app::App;
pub use error::{ScholarError, ScholarResult};
