//! Durable FMID <-> URI indexing for a multi-tenant mail store.
//!
//! Every folder and message carries a 64-bit FMID; this crate maps FMIDs to
//! backend storage URIs per username, with soft/permanent deletion,
//! wildcard URI lookup, and monotonic FMID allocation above a reserved
//! band. Two backends implement the [`IndexingStore`] contract: an embedded
//! per-user KV file ([`KvStore`]) and a shared MySQL database
//! ([`MysqlStore`]), the latter optionally wrapped in a look-aside cache
//! ([`CachedStore`]). [`IndexingRegistry`] shares one context per username
//! across the process.

pub mod cache;
pub mod error;
pub mod kv;
pub mod mysql;
pub mod registry;
pub mod store;

pub use cache::{CachedStore, MokaUriCache, UriCache};
pub use error::{IndexError, IndexResult};
pub use kv::KvStore;
pub use mysql::MysqlStore;
pub use registry::{IndexingLease, IndexingRegistry};
pub use store::{from_config, DeleteMode, FmidEntry, IndexingStore, UriEntry};
