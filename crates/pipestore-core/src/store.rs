//! RowStore: the public face of PipeStore.
//!
//! Wraps a [`Table`] and a [`MutationExecutor`]:
//!
//! **Read path**: called directly on the caller's thread under the table's
//! shared lock
//! **Write path**: queued to the executor, run under the exclusive lock,
//! awaited synchronously by the caller

use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::error::StoreResult;
use crate::executor::MutationExecutor;
use crate::stats::StatsSnapshot;
use crate::table::Table;

/// A delimiter-separated text file used as a table.
///
/// All methods take `&self`; share the store across threads with `Arc`.
/// Reads may run concurrently with each other; writes are serialized.
pub struct RowStore {
    table: Arc<Table>,
    executor: MutationExecutor,
}

impl RowStore {
    /// Open an existing table file.
    ///
    /// Reads the header, indexes every row and starts the writer pool.
    pub fn open<P: AsRef<Path>>(path: P, config: Config) -> StoreResult<Self> {
        let table = Table::open(path, config)?;
        Self::with_table(table)
    }

    /// Create a new table file holding only a header, then open it.
    pub fn create<P, S>(path: P, columns: impl IntoIterator<Item = S>, config: Config) -> StoreResult<Self>
    where
        P: AsRef<Path>,
        S: Into<String>,
    {
        let table = Table::create(path, columns, config)?;
        Self::with_table(table)
    }

    fn with_table(table: Table) -> StoreResult<Self> {
        let config = table.config();
        let executor = MutationExecutor::start(config.worker_threads, config.shutdown_grace)?;
        Ok(Self { table: Arc::new(table), executor })
    }

    /// Value of `column` in row `id` (1-based).
    ///
    /// Returns the null sentinel when the row predates the column.
    pub fn get(&self, id: usize, column: &str) -> StoreResult<String> {
        self.table.get(id, column)
    }

    /// `target_column` of the first row (lowest id) whose `search_column`
    /// equals `search_value`; `None` when no row matches.
    pub fn get_where(&self, search_column: &str, search_value: &str, target_column: &str) -> StoreResult<Option<String>> {
        self.table.get_where(search_column, search_value, target_column)
    }

    /// Every field of row `id`, aligned to [`RowStore::columns`].
    pub fn row(&self, id: usize) -> StoreResult<Vec<String>> {
        self.table.row(id)
    }

    /// Raw text of the row at zero-based `row_number`.
    pub fn read_row(&self, row_number: usize) -> StoreResult<String> {
        self.table.read_row(row_number)
    }

    /// Set `column` of row `id` to `value`.
    pub fn set(&self, id: usize, column: &str, value: &str) -> StoreResult<()> {
        let table = Arc::clone(&self.table);
        let column = column.to_string();
        let value = value.to_string();
        self.executor.submit("set", move || table.set(id, &column, &value))
    }

    /// Set `target_column` to `target_value` in every row whose
    /// `search_column` equals `search_value`. Returns how many rows changed.
    pub fn set_where(
        &self,
        search_column: &str,
        search_value: &str,
        target_column: &str,
        target_value: &str,
    ) -> StoreResult<usize> {
        let table = Arc::clone(&self.table);
        let search_column = search_column.to_string();
        let search_value = search_value.to_string();
        let target_column = target_column.to_string();
        let target_value = target_value.to_string();
        self.executor.submit("set_where", move || {
            table.set_where(&search_column, &search_value, &target_column, &target_value)
        })
    }

    /// Append a column, rewriting the file. Returns false if it already existed.
    pub fn add_column(&self, name: &str) -> StoreResult<bool> {
        let table = Arc::clone(&self.table);
        let name = name.to_string();
        self.executor.submit("add_column", move || table.add_column(&name))
    }

    /// Remove a column, rewriting the file. The last column cannot be removed.
    pub fn remove_column(&self, name: &str) -> StoreResult<()> {
        let table = Arc::clone(&self.table);
        let name = name.to_string();
        self.executor.submit("remove_column", move || table.remove_column(&name))
    }

    /// Stop accepting mutations and drain the queue within the configured
    /// grace period. Reads keep working afterwards.
    pub fn shutdown(&self) -> bool {
        self.executor.shutdown()
    }

    /// Whether mutations are still accepted.
    pub fn is_accepting_writes(&self) -> bool {
        self.executor.is_accepting()
    }

    /// Current column names in header order.
    pub fn columns(&self) -> Vec<String> {
        self.table.columns()
    }

    /// Number of data rows.
    pub fn row_count(&self) -> usize {
        self.table.row_count()
    }

    /// Table file path.
    pub fn path(&self) -> &Path {
        self.table.path()
    }

    /// Configuration the store was opened with.
    pub fn config(&self) -> &Config {
        self.table.config()
    }

    /// Rows currently held by the read cache.
    pub fn cached_rows(&self) -> usize {
        self.table.cached_rows()
    }

    /// Snapshot of the activity counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.table.stats().snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use tempfile::TempDir;

    fn test_store(contents: &str) -> (RowStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("people.psv");
        std::fs::write(&path, contents).unwrap();
        let store = RowStore::open(&path, Config::default()).unwrap();
        (store, dir)
    }

    #[test]
    fn test_open_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = RowStore::open(dir.path().join("missing.psv"), Config::default()).err().unwrap();
        assert!(matches!(err, StoreError::Io { .. }));
    }

    #[test]
    fn test_set_get() {
        let (store, _dir) = test_store("id|name\n1|alice\n2|bob\n");
        store.set(2, "name", "robert").unwrap();
        assert_eq!(store.get(2, "name").unwrap(), "robert");
        assert_eq!(store.get(1, "name").unwrap(), "alice");
        assert_eq!(store.stats().rows_updated, 1);
    }

    #[test]
    fn test_mutation_errors_reach_caller() {
        let (store, _dir) = test_store("id|name\n1|alice\n");
        assert!(matches!(store.set(5, "name", "x"), Err(StoreError::RowNotFound { id: 5 })));
        assert!(matches!(store.set(1, "age", "3"), Err(StoreError::ColumnNotFound { .. })));
        assert!(matches!(store.remove_column("age"), Err(StoreError::ColumnNotFound { .. })));
    }

    #[test]
    fn test_set_where_and_get_where() {
        let (store, _dir) = test_store("name|score\nx|1\ny|2\nz|3\n");
        assert_eq!(store.set_where("name", "y", "score", "20").unwrap(), 1);
        assert_eq!(store.get_where("name", "y", "score").unwrap(), Some("20".to_string()));
    }

    #[test]
    fn test_schema_changes() {
        let (store, _dir) = test_store("a|b\n1|2\n");
        assert!(store.add_column("c").unwrap());
        assert_eq!(store.get(1, "c").unwrap(), "null");
        store.remove_column("a").unwrap();
        assert_eq!(store.columns(), vec!["b", "c"]);
        assert_eq!(store.get(1, "b").unwrap(), "2");
        assert_eq!(store.row(1).unwrap(), vec!["2", "null"]);
    }

    #[test]
    fn test_shutdown_refuses_writes_keeps_reads() {
        let (store, _dir) = test_store("a\n1\n");
        assert!(store.shutdown());
        assert!(!store.is_accepting_writes());
        assert!(matches!(store.set(1, "a", "2"), Err(StoreError::ShutDown)));
        assert!(matches!(store.add_column("b"), Err(StoreError::ShutDown)));
        assert_eq!(store.get(1, "a").unwrap(), "1");
    }

    #[test]
    fn test_create_then_use() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fresh.psv");
        let store = RowStore::create(&path, ["k", "v"], Config::minimal()).unwrap();
        assert_eq!(store.row_count(), 0);
        assert!(matches!(store.get(1, "k"), Err(StoreError::RowNotFound { .. })));
        assert!(store.add_column("extra").unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "k|v|extra\n");
    }
}
