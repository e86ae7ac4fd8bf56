//! Offset index: row number → byte offset of the row's first byte.
//!
//! Rows are numbered densely from 0 in file order, so the index is a plain
//! vector. It is built by one sequential scan and then kept in step with the
//! file by the writer: a tail-shift update moves every later row by the same
//! byte delta, which `shift_after` applies.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{StoreError, StoreResult};
use crate::format::{decode_line, strip_line_ending};

/// Dense row-number → file-offset mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetIndex {
    offsets: Vec<u64>,
}

/// Header line and row offsets produced by one scan of a table file.
#[derive(Debug)]
pub struct ScanResult {
    pub header: String,
    pub index: OffsetIndex,
    pub file_len: u64,
}

impl OffsetIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the header and record where every following line starts.
    ///
    /// A final line without a terminator still counts as a row; a terminator
    /// at end of file does not produce an empty row.
    pub fn scan(path: &Path) -> StoreResult<ScanResult> {
        let file = File::open(path).map_err(|e| StoreError::io(path, e, "Failed to open table file"))?;
        let mut reader = BufReader::new(file);
        let mut buf = Vec::new();

        let header_len = reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| StoreError::io(path, e, "Failed to read header"))?;
        if header_len == 0 {
            return Err(StoreError::EmptyFile { path: path.to_path_buf() });
        }
        strip_line_ending(&mut buf);
        let header = decode_line(std::mem::take(&mut buf))
            .map_err(|e| StoreError::io(path, e, "Failed to decode header"))?;

        let mut offsets = Vec::new();
        let mut offset = header_len as u64;
        loop {
            buf.clear();
            let n = reader
                .read_until(b'\n', &mut buf)
                .map_err(|e| StoreError::io(path, e, "Failed to scan rows"))?;
            if n == 0 {
                break;
            }
            offsets.push(offset);
            offset += n as u64;
        }

        Ok(ScanResult { header, index: Self { offsets }, file_len: offset })
    }

    /// Append the offset of the next row; offsets must be pushed in file order.
    pub fn push(&mut self, offset: u64) {
        debug_assert!(self.offsets.last().map_or(true, |&last| last < offset));
        self.offsets.push(offset);
    }

    /// Offset of `row`, if indexed.
    pub fn get(&self, row: usize) -> Option<u64> {
        self.offsets.get(row).copied()
    }

    /// Offset of `row`, or `RowNotFound`.
    pub fn offset_of(&self, row: usize) -> StoreResult<u64> {
        self.get(row).ok_or(StoreError::RowNotFound { id: row + 1 })
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Row numbers in ascending order.
    pub fn rows(&self) -> std::ops::Range<usize> {
        0..self.offsets.len()
    }

    /// Move every row after `row` by `delta` bytes.
    pub fn shift_after(&mut self, row: usize, delta: i64) {
        if delta == 0 {
            return;
        }
        for offset in self.offsets.iter_mut().skip(row + 1) {
            *offset = offset.wrapping_add_signed(delta);
        }
    }
}
