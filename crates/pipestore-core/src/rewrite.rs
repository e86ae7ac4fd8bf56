//! Rewrite-and-swap for schema changes
//!
//! A schema change alters every line of the table, so the whole file is
//! regenerated into a temp file next to it and then renamed over the original:
//! 1. Read the old header from the file itself
//! 2. Stream every old row, remapping fields by column name
//! 3. durable_sync the temp file
//! 4. Rename temp file over the original (atomic on POSIX)
//! 5. durable_sync the parent directory
//!
//! Row offsets of the new file are recorded while it is written, so once the
//! rename lands nothing else can fail and leave the caller holding the old
//! layout. A failed directory sync after the rename is logged, not returned:
//! the new file is already in place and the caller must adopt it.
//!
//! The scan never consults the offset index or the row cache, so stale
//! in-memory state cannot leak into the new file. If the process dies before
//! step 4 the original is intact and only an orphaned temp file remains.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use hashbrown::HashMap;
use log::warn;

use crate::durability::{sync_file, sync_parent_dir};
use crate::error::{StoreError, StoreResult};
use crate::format::{decode_line, strip_line_ending, RowCodec, LINE_TERMINATOR};
use crate::index::OffsetIndex;
use crate::schema::Schema;

/// Outcome of one rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteReport {
    /// Data rows carried over (header excluded)
    pub rows: usize,
    /// Row offsets of the rewritten file
    pub index: OffsetIndex,
    /// File size before the rewrite
    pub original_bytes: u64,
    /// File size after the rewrite
    pub rewritten_bytes: u64,
}

/// `<path><suffix>`, e.g. `people.psv.tmp`.
pub fn temp_path_for(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Regenerate `path` under `schema` and atomically swap it into place.
///
/// Each new column takes the old row's value for the column of the same
/// name; columns the old header lacks, and fields missing from short rows,
/// become the sentinel.
pub fn rewrite_file(
    path: &Path,
    temp_path: &Path,
    schema: &Schema,
    codec: &RowCodec,
) -> StoreResult<RewriteReport> {
    let original_bytes = fs::metadata(path)
        .map_err(|e| StoreError::io(path, e, "Failed to stat table for rewrite"))?
        .len();

    let (index, rewritten_bytes) = match write_remapped(path, temp_path, schema, codec) {
        Ok(written) => written,
        Err(e) => {
            let _ = fs::remove_file(temp_path);
            return Err(e);
        }
    };

    if let Err(e) = fs::rename(temp_path, path) {
        let _ = fs::remove_file(temp_path);
        return Err(StoreError::io(path, e, "Failed to replace table with rewritten file"));
    }
    settle_swap(path);

    Ok(RewriteReport { rows: index.len(), index, original_bytes, rewritten_bytes })
}

/// Make a completed rename durable. The swap has already happened, so a
/// failure only weakens crash safety and is reported through the log.
fn settle_swap(path: &Path) {
    if let Err(e) = sync_parent_dir(path) {
        warn!("Rewrote {} but could not sync its directory: {}", path.display(), e);
    }
}

/// Stream the remapped table into `temp_path`; returns the new row offsets
/// and the bytes written.
fn write_remapped(
    path: &Path,
    temp_path: &Path,
    schema: &Schema,
    codec: &RowCodec,
) -> StoreResult<(OffsetIndex, u64)> {
    let source = File::open(path).map_err(|e| StoreError::io(path, e, "Failed to open table for rewrite"))?;
    let mut reader = BufReader::new(source);
    let mut buf = Vec::new();

    let n = reader
        .read_until(LINE_TERMINATOR, &mut buf)
        .map_err(|e| StoreError::io(path, e, "Failed to read header"))?;
    if n == 0 {
        return Err(StoreError::EmptyFile { path: path.to_path_buf() });
    }
    strip_line_ending(&mut buf);
    let old_header = decode_line(std::mem::take(&mut buf))
        .map_err(|e| StoreError::io(path, e, "Failed to decode header"))?;

    // New column position -> old column position
    let mut old_positions: HashMap<&str, usize> = HashMap::new();
    for (i, column) in codec.split(&old_header).into_iter().enumerate() {
        old_positions.entry(column).or_insert(i);
    }
    let plan: Vec<Option<usize>> = schema
        .columns()
        .iter()
        .map(|c| old_positions.get(c.as_str()).copied())
        .collect();

    let temp = File::create(temp_path)
        .map_err(|e| StoreError::io(temp_path, e, "Failed to create rewrite temp file"))?;
    let mut writer = BufWriter::new(temp);
    let write_err = |e| StoreError::io(temp_path, e, "Failed to write rewrite temp file");

    let header = schema.encode(codec);
    writer.write_all(header.as_bytes()).map_err(write_err)?;
    writer.write_all(&[LINE_TERMINATOR]).map_err(write_err)?;

    let mut index = OffsetIndex::new();
    let mut written = header.len() as u64 + 1;
    loop {
        buf.clear();
        let n = reader
            .read_until(LINE_TERMINATOR, &mut buf)
            .map_err(|e| StoreError::io(path, e, "Failed to read row during rewrite"))?;
        if n == 0 {
            break;
        }
        strip_line_ending(&mut buf);
        let line = decode_line(std::mem::take(&mut buf))
            .map_err(|e| StoreError::io(path, e, "Failed to decode row during rewrite"))?;

        let old_fields = codec.split(&line);
        let new_fields: Vec<&str> = plan
            .iter()
            .map(|slot| slot.and_then(|i| old_fields.get(i).copied()).unwrap_or(codec.sentinel()))
            .collect();

        let new_line = codec.join(&new_fields);
        writer.write_all(new_line.as_bytes()).map_err(write_err)?;
        writer.write_all(&[LINE_TERMINATOR]).map_err(write_err)?;
        index.push(written);
        written += new_line.len() as u64 + 1;
    }

    let temp = writer
        .into_inner()
        .map_err(|e| StoreError::io(temp_path, e.into_error(), "Failed to flush rewrite temp file"))?;
    sync_file(&temp, temp_path)?;
    let bytes = temp
        .metadata()
        .map_err(|e| StoreError::io(temp_path, e, "Failed to stat rewrite temp file"))?
        .len();

    debug_assert_eq!(bytes, written);

    Ok((index, bytes))
}
