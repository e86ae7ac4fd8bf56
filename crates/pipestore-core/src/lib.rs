//! PipeStore Core: a single text file as a table
//!
//! A delimiter-separated file (`|` by default) whose first line names the
//! columns and whose remaining lines are rows. An offset index and a bounded
//! LRU cache keep reads from re-scanning the file.
//!
//! # Architecture
//!
//! - **Read path**: cache, else seek to the row's indexed offset and read one line
//! - **Write path**: queued to a writer pool, executed one at a time under an
//!   exclusive lock, awaited synchronously by the caller
//! - **Schema changes**: full rewrite to a temp file, then atomic rename
//!
//! ```no_run
//! use pipestore_core::{Config, RowStore};
//!
//! # fn main() -> pipestore_core::StoreResult<()> {
//! let store = RowStore::open("people.psv", Config::default())?;
//! let name = store.get(1, "name")?;
//! store.set(1, "score", "42")?;
//! let score = store.get_where("name", &name, "score")?;
//! store.shutdown();
//! # let _ = score;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod durability;
pub mod error;
pub mod executor;
pub mod format;
pub mod index;
pub mod rewrite;
pub mod schema;
pub mod stats;
pub mod store;
pub mod table;

// Re-export key types for convenience
pub use cache::RowCache;
pub use config::Config;
pub use error::{StoreError, StoreResult};
pub use executor::MutationExecutor;
pub use format::{RowCodec, DEFAULT_DELIMITER, NULL_SENTINEL};
pub use index::OffsetIndex;
pub use rewrite::RewriteReport;
pub use schema::Schema;
pub use stats::{StatsSnapshot, StoreStats};
pub use store::RowStore;
pub use table::Table;
