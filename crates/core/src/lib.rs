//! Shared domain types for the uridex indexing store.
//!
//! This crate holds the pieces every backend agrees on: FMID formatting and
//! validation, URI pattern matching, configuration types, and the validation
//! error type. Storage backends live in `uridex-index`.

pub mod config;
pub mod error;
pub mod fmid;
pub mod pattern;

pub use config::{
    AllocatorConfig, BackendConfig, CacheConfig, IndexingConfig, DEFAULT_RESERVED_BAND,
};
pub use error::{CoreError, CoreResult};
pub use fmid::{format_fmid, parse_fmid};
pub use pattern::{normalize_uri, UriPattern};
