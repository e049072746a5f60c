//! photodex indexes image collections and their AI-generated sidecar
//! metadata (descriptions, keywords, people, objects, scenes, EXIF) into
//! an embedded SQLite database and answers multi-criteria searches over
//! it.
//!
//! Typical flow: [`freshness::get_ready_database`] returns a ready
//! [`db::Database`] handle (rebuilding via [`indexer::Indexer`] when the
//! stored fingerprint is stale), then [`query::compile`] turns a
//! [`query::QuerySpec`] into SQL and [`query::execute`] hydrates results.

pub mod config;
pub mod db;
pub mod error;
pub mod freshness;
pub mod indexer;
pub mod logging;
pub mod query;
pub mod sidecar;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::Config;
pub use db::Database;
pub use error::{Error, ErrorKind, Result};
pub use freshness::{get_ready_database, RebuildReason};
pub use indexer::{Indexer, RebuildReport};
pub use query::{compile, execute, QuerySpec, SearchResult};
pub use sidecar::SidecarReader;
