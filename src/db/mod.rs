//! Database module: models and schema for persistent storage.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows
//! - `patch.rs`: insert / partial-update payloads
//! - `schema.rs`: SQL DDL for initializing the database (SQLite-first)
//! - `sqlite.rs`: pool setup plus document, chunk and metadata-cache queries
//! - `assets.rs`, `work_orders.rs`, `dependencies.rs`, `conversations.rs`:
//!   per-entity queries on [`GmaoStorage`]

pub mod assets;
pub mod conversations;
pub mod dependencies;
pub mod models;
pub mod patch;
pub mod schema;
pub mod sqlite;
mod work_orders;

pub use assets::AssetWithAliases;
pub use dependencies::SuggestionCreate;
pub use models::{
    DbAsset, DbChunk, DbComponent, DbDependencySuggestion, DbDocument, DbMaintenancePlan,
    DbMessage, DbSparePart, DbWorkOrder, ExtractionCounts,
};
pub use schema::SQLITE_INIT;
pub use sqlite::{GmaoStorage, SqlitePool};
