//! Table: shared state behind a [`crate::RowStore`].
//!
//! Holds the schema and offset index under one reader/writer lock and the
//! row cache under a mutex.
//!
//! **Read path**: shared lock, cache first, then seek + read one line
//! **Write path**: exclusive lock for the whole read-modify-write, including
//! the index and cache fix-ups, so readers never see a half-applied update
//!
//! Mutating methods are meant to run on the mutation executor's workers; they
//! take the exclusive lock themselves and are safe to call from any thread.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use parking_lot::{Mutex, RwLock};

use crate::cache::RowCache;
use crate::config::Config;
use crate::durability::sync_file;
use crate::error::{StoreError, StoreResult};
use crate::format::{decode_line, strip_line_ending, RowCodec, LINE_TERMINATOR};
use crate::index::OffsetIndex;
use crate::rewrite::{rewrite_file, temp_path_for, RewriteReport};
use crate::schema::Schema;
use crate::stats::StoreStats;

/// Schema and offsets; always replaced or adjusted together.
#[derive(Debug)]
struct TableState {
    schema: Schema,
    index: OffsetIndex,
}

/// A delimiter-separated table file with its in-memory index and cache.
pub struct Table {
    path: PathBuf,
    codec: RowCodec,
    config: Config,
    state: RwLock<TableState>,
    cache: Mutex<RowCache>,
    stats: StoreStats,
}

/// Map a 1-based row id to a 0-based row number.
fn row_number(id: usize) -> StoreResult<usize> {
    id.checked_sub(1).ok_or(StoreError::RowNotFound { id })
}

impl Table {
    /// Load the header and index every row of an existing table file.
    pub fn open<P: AsRef<Path>>(path: P, config: Config) -> StoreResult<Self> {
        config.validate()?;
        let path = path.as_ref().to_path_buf();
        let codec = RowCodec::new(config.delimiter, config.null_sentinel.clone());

        let scan = OffsetIndex::scan(&path)?;
        let schema = Schema::parse(&scan.header, &codec)?;

        info!(
            "Opened table {} ({} columns, {} rows, {} bytes)",
            path.display(),
            schema.len(),
            scan.index.len(),
            scan.file_len
        );

        Ok(Self {
            cache: Mutex::new(RowCache::new(config.cache_capacity)),
            state: RwLock::new(TableState { schema, index: scan.index }),
            stats: StoreStats::new(),
            path,
            codec,
            config,
        })
    }

    /// Write a header-only table file at `path` and open it.
    /// Fails if the file already exists.
    pub fn create<P, S>(path: P, columns: impl IntoIterator<Item = S>, config: Config) -> StoreResult<Self>
    where
        P: AsRef<Path>,
        S: Into<String>,
    {
        config.validate()?;
        let path = path.as_ref();
        let codec = RowCodec::new(config.delimiter, config.null_sentinel.clone());
        let schema = Schema::new(columns, &codec)?;
        if schema.is_empty() {
            return Err(StoreError::InvalidValue {
                value: String::new(),
                reason: "a table needs at least one column".into(),
            });
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| StoreError::io(path, e, "Failed to create table file"))?;
        let mut header = schema.encode(&codec).into_bytes();
        header.push(LINE_TERMINATOR);
        file.write_all(&header)
            .map_err(|e| StoreError::io(path, e, "Failed to write header"))?;
        sync_file(&file, path)?;
        drop(file);

        Self::open(path, config)
    }

    /// Table file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Configuration the table was opened with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Live activity counters.
    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }

    /// Current column names in header order.
    pub fn columns(&self) -> Vec<String> {
        self.state.read().schema.columns().to_vec()
    }

    /// Number of data rows.
    pub fn row_count(&self) -> usize {
        self.state.read().index.len()
    }

    /// Rows currently held by the read cache.
    pub fn cached_rows(&self) -> usize {
        self.cache.lock().len()
    }

    // ------------------------------------------------------------------
    // Read path
    // ------------------------------------------------------------------

    /// Raw text of row `row` (0-based).
    pub fn read_row(&self, row: usize) -> StoreResult<String> {
        let state = self.state.read();
        self.read_row_locked(&state, row)
    }

    /// Value of `column` in row `id` (1-based); the sentinel for short rows.
    pub fn get(&self, id: usize, column: &str) -> StoreResult<String> {
        let state = self.state.read();
        let index = state.schema.index_of(column)?;
        let text = self.read_row_locked(&state, row_number(id)?)?;
        Ok(self.codec.field(&text, index).to_string())
    }

    /// `target_column` of the lowest-numbered row whose `search_column`
    /// equals `search_value` exactly.
    pub fn get_where(
        &self,
        search_column: &str,
        search_value: &str,
        target_column: &str,
    ) -> StoreResult<Option<String>> {
        let state = self.state.read();
        let search = state.schema.index_of(search_column)?;
        let target = state.schema.index_of(target_column)?;

        for row in state.index.rows() {
            let text = self.read_row_locked(&state, row)?;
            if self.codec.raw_field(&text, search) == Some(search_value) {
                return Ok(Some(self.codec.field(&text, target).to_string()));
            }
        }
        Ok(None)
    }

    /// Every field of row `id`, aligned to the schema.
    pub fn row(&self, id: usize) -> StoreResult<Vec<String>> {
        let state = self.state.read();
        let text = self.read_row_locked(&state, row_number(id)?)?;
        let width = state.schema.len();
        let mut fields = self.codec.fields_padded(&text, width);
        fields.truncate(width);
        Ok(fields)
    }

    fn read_row_locked(&self, state: &TableState, row: usize) -> StoreResult<String> {
        if let Some(text) = self.cache.lock().get(row).map(str::to_string) {
            self.stats.record_hit();
            return Ok(text);
        }
        self.stats.record_miss();

        let offset = state.index.offset_of(row)?;
        let text = self.read_line_at(offset)?;
        self.cache.lock().put(row, text.clone());
        Ok(text)
    }

    fn read_line_at(&self, offset: u64) -> StoreResult<String> {
        let path = self.path.as_path();
        let mut file = File::open(path).map_err(|e| StoreError::io(path, e, "Failed to open table file"))?;
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| StoreError::io(path, e, "Failed to seek to row"))?;

        let mut buf = Vec::new();
        let n = BufReader::new(file)
            .read_until(LINE_TERMINATOR, &mut buf)
            .map_err(|e| StoreError::io(path, e, "Failed to read row"))?;
        if n == 0 {
            return Err(StoreError::Io {
                path: Some(self.path.clone()),
                kind: std::io::ErrorKind::UnexpectedEof,
                message: format!("No row at offset {}", offset),
            });
        }
        strip_line_ending(&mut buf);
        decode_line(buf).map_err(|e| StoreError::io(path, e, "Failed to decode row"))
    }

    // ------------------------------------------------------------------
    // Write path
    // ------------------------------------------------------------------

    /// Replace `column` of row `id` with `value`.
    pub fn set(&self, id: usize, column: &str, value: &str) -> StoreResult<()> {
        self.codec.check_field(value)?;
        let mut state = self.state.write();
        let index = state.schema.index_of(column)?;
        let row = row_number(id)?;

        let text = self.read_row_locked(&state, row)?;
        let new_text = self.replace_field(&text, index, value);
        self.update_row(&mut state, row, &new_text)
    }

    /// Set `target_column` to `target_value` in every row whose
    /// `search_column` equals `search_value`. Returns the number of rows
    /// updated.
    pub fn set_where(
        &self,
        search_column: &str,
        search_value: &str,
        target_column: &str,
        target_value: &str,
    ) -> StoreResult<usize> {
        self.codec.check_field(target_value)?;
        let mut state = self.state.write();
        let search = state.schema.index_of(search_column)?;
        let target = state.schema.index_of(target_column)?;

        let mut updated = 0;
        for row in state.index.rows() {
            let text = self.read_row_locked(&state, row)?;
            if self.codec.raw_field(&text, search) != Some(search_value) {
                continue;
            }
            let new_text = self.replace_field(&text, target, target_value);
            self.update_row(&mut state, row, &new_text)?;
            updated += 1;
        }
        Ok(updated)
    }

    /// Append `column` to the schema and rewrite the file.
    /// Returns false without touching the file if the column already exists.
    pub fn add_column(&self, column: &str) -> StoreResult<bool> {
        let mut state = self.state.write();
        if state.schema.contains(column) {
            return Ok(false);
        }
        let schema = state.schema.with_column(column, &self.codec)?;
        self.rewrite(&mut state, schema)?;
        Ok(true)
    }

    /// Drop `column` from the schema and rewrite the file.
    /// The last remaining column cannot be dropped.
    pub fn remove_column(&self, column: &str) -> StoreResult<()> {
        let mut state = self.state.write();
        let schema = state.schema.without_column(column)?;
        self.rewrite(&mut state, schema)
    }

    fn replace_field(&self, text: &str, index: usize, value: &str) -> String {
        let mut fields = self.codec.fields_padded(text, index + 1);
        fields[index] = value.to_string();
        self.codec.join(&fields)
    }

    /// Tail-shift update: overwrite row `row` with `new_text`, moving every
    /// following byte to sit right after it.
    ///
    /// The file is modified in place with no staging copy. If a write fails
    /// midway the file keeps whatever the last completed write left; the
    /// index and cache are only touched after the file is fully written.
    fn update_row(&self, state: &mut TableState, row: usize, new_text: &str) -> StoreResult<()> {
        let path = self.path.as_path();
        let offset = state.index.offset_of(row)?;

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| StoreError::io(path, e, "Failed to open table for update"))?;
        let io_err = |e| StoreError::io(path, e, "Failed to update row");

        // Length of the old line including its terminator
        file.seek(SeekFrom::Start(offset)).map_err(io_err)?;
        let mut old_line = Vec::new();
        let old_len = BufReader::new(&file)
            .read_until(LINE_TERMINATOR, &mut old_line)
            .map_err(io_err)? as u64;
        let next_offset = offset + old_len;

        let mut tail = Vec::new();
        file.seek(SeekFrom::Start(next_offset)).map_err(io_err)?;
        file.read_to_end(&mut tail).map_err(io_err)?;

        let mut out = Vec::with_capacity(new_text.len() + 1 + tail.len());
        out.extend_from_slice(new_text.as_bytes());
        out.push(LINE_TERMINATOR);
        let new_len = out.len() as u64;
        out.extend_from_slice(&tail);

        file.seek(SeekFrom::Start(offset)).map_err(io_err)?;
        file.write_all(&out).map_err(io_err)?;
        file.set_len(offset + out.len() as u64).map_err(io_err)?;
        if self.config.sync_writes {
            sync_file(&file, path)?;
        }

        let delta = new_len as i64 - old_len as i64;
        state.index.shift_after(row, delta);
        self.cache.lock().put(row, new_text.to_string());
        self.stats.record_update();

        debug!("Updated row {} of {} (delta {} bytes)", row + 1, path.display(), delta);
        Ok(())
    }

    /// Swap in a file laid out for `schema`. On error the file is untouched
    /// and so is `state`; on success both describe the new file.
    fn rewrite(&self, state: &mut TableState, schema: Schema) -> StoreResult<()> {
        let temp = temp_path_for(&self.path, &self.config.temp_suffix);
        let RewriteReport { rows, index, original_bytes, rewritten_bytes } =
            rewrite_file(&self.path, &temp, &schema, &self.codec)?;

        state.index = index;
        state.schema = schema;
        self.cache.lock().clear();
        self.stats.record_rewrite();

        info!(
            "Rewrote {} for schema [{}]: {} rows, {} -> {} bytes",
            self.path.display(),
            state.schema.columns().join(", "),
            rows,
            original_bytes,
            rewritten_bytes
        );
        Ok(())
    }
}
