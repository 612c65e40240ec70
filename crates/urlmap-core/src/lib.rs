//! # urlmap-core
//!
//! Core types for the urlmap engine. This crate has no knowledge of URL
//! patterns themselves; it provides the error taxonomy, settings, logging
//! integration, and shared utility types the engine crate builds on.
//!
//! ## Modules
//!
//! - [`error`] - Error types, result alias, and structured no-match payloads
//! - [`settings`] - Engine settings and global configuration
//! - [`logging`] - Tracing-based logging integration
//! - [`utils`] - Utility types (`MultiValueDict`, text helpers)

pub mod error;
pub mod logging;
pub mod settings;
pub mod utils;

// Re-export the most commonly used types at the crate root.
pub use error::{NoReverseMatch, Resolver404, UrlmapError, UrlmapResult};
pub use settings::{Settings, SETTINGS};
