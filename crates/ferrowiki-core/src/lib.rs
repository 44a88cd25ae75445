//! FerroWiki Core Library
//!
//! The content engine behind a file-backed wiki: pages are Markdown files
//! with `key: value` front-matter stored under a content root, and the
//! filesystem is the source of truth. HTTP routing, templates and the
//! BasicAuth transport live in the frontends; this crate exposes the page
//! abstraction, the Markdown/Wikilink processor, the repository operations
//! and the credential gate they call into.

pub mod auth;
pub mod config;
pub mod error;
pub mod page;
pub mod processor;
pub mod vfs;
pub mod wiki;

pub use auth::AuthGate;
pub use config::WikiConfig;
pub use error::WikiError;
pub use page::{Metadata, Page};
pub use processor::{clean_id, render, resolve_wikilinks, Rendered};
pub use wiki::{SearchField, Wiki};
