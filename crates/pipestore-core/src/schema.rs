//! Table schema: the ordered list of column names stored in the header line.

use hashbrown::HashSet;

use crate::error::{StoreError, StoreResult};
use crate::format::RowCodec;

/// Ordered, duplicate-free column names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<String>,
}

impl Schema {
    /// Build a schema, rejecting duplicate or unstorable names.
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>, codec: &RowCodec) -> StoreResult<Self> {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        {
            let mut seen = HashSet::with_capacity(columns.len());
            for column in &columns {
                codec.check_field(column)?;
                if !seen.insert(column.as_str()) {
                    return Err(StoreError::DuplicateColumn { column: column.clone() });
                }
            }
        }
        Ok(Self { columns })
    }

    /// Parse a header line.
    pub fn parse(header: &str, codec: &RowCodec) -> StoreResult<Self> {
        Self::new(codec.split(header), codec)
    }

    /// Serialize as a header line (without terminator).
    pub fn encode(&self, codec: &RowCodec) -> String {
        codec.join(&self.columns)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Position of `column` in every row.
    pub fn index_of(&self, column: &str) -> StoreResult<usize> {
        self.columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| StoreError::column_not_found(column))
    }

    /// Copy of this schema with `column` appended.
    pub fn with_column(&self, column: &str, codec: &RowCodec) -> StoreResult<Self> {
        codec.check_field(column)?;
        if self.contains(column) {
            return Err(StoreError::DuplicateColumn { column: column.to_string() });
        }
        let mut columns = self.columns.clone();
        columns.push(column.to_string());
        Ok(Self { columns })
    }

    /// Copy of this schema with `column` removed.
    ///
    /// The last column cannot be removed: an empty header line reads back as
    /// one unnamed column.
    pub fn without_column(&self, column: &str) -> StoreResult<Self> {
        let index = self.index_of(column)?;
        if self.columns.len() == 1 {
            return Err(StoreError::InvalidValue {
                value: column.to_string(),
                reason: "a table needs at least one column".into(),
            });
        }
        let mut columns = self.columns.clone();
        columns.remove(index);
        Ok(Self { columns })
    }
}
