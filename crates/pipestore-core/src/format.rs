//! Line format for PipeStore table files
//!
//! A table file is plain text:
//!
//! ```text
//! id|name|score        <- header: column names joined by the delimiter
//! 1|alice|90           <- one row per line, fields aligned to the header
//! 2|bob|75
//! ```
//!
//! There is no quoting or escaping. A value containing the delimiter or a
//! line terminator would shift every following field, so the codec refuses
//! to serialize such values instead of writing them.

use crate::error::{StoreError, StoreResult};

/// Default field delimiter
pub const DEFAULT_DELIMITER: char = '|';

/// Placeholder returned for a field missing from a short row
pub const NULL_SENTINEL: &str = "null";

/// Line terminator written after every header and row
pub const LINE_TERMINATOR: u8 = b'\n';

/// Splits and joins delimiter-separated lines.
#[derive(Debug, Clone)]
pub struct RowCodec {
    delimiter: char,
    sentinel: String,
}

impl RowCodec {
    pub fn new(delimiter: char, sentinel: impl Into<String>) -> Self {
        Self { delimiter, sentinel: sentinel.into() }
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    pub fn sentinel(&self) -> &str {
        &self.sentinel
    }

    /// Split a line into its fields. Empty fields are kept, including
    /// trailing ones, so `"a||"` has three fields.
    pub fn split<'a>(&self, line: &'a str) -> Vec<&'a str> {
        line.split(self.delimiter).collect()
    }

    /// Field at `index` if the line has that many fields.
    pub fn raw_field<'a>(&self, line: &'a str, index: usize) -> Option<&'a str> {
        line.split(self.delimiter).nth(index)
    }

    /// Field at `index`, or the sentinel if the line is too short.
    pub fn field<'a>(&'a self, line: &'a str, index: usize) -> &'a str {
        self.raw_field(line, index).unwrap_or(self.sentinel.as_str())
    }

    /// Join fields into a line (without terminator).
    pub fn join<S: AsRef<str>>(&self, fields: &[S]) -> String {
        let mut line = String::new();
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                line.push(self.delimiter);
            }
            line.push_str(field.as_ref());
        }
        line
    }

    /// Fields of `line` padded with the sentinel up to `width`.
    pub fn fields_padded(&self, line: &str, width: usize) -> Vec<String> {
        let mut fields: Vec<String> = self.split(line).into_iter().map(str::to_string).collect();
        while fields.len() < width {
            fields.push(self.sentinel.clone());
        }
        fields
    }

    /// Reject text that cannot be stored as a single field.
    pub fn check_field(&self, value: &str) -> StoreResult<()> {
        let reason = if value.contains(self.delimiter) {
            format!("contains the delimiter {:?}", self.delimiter)
        } else if value.contains(['\n', '\r']) {
            "contains a line terminator".to_string()
        } else {
            return Ok(());
        };
        Err(StoreError::InvalidValue { value: value.to_string(), reason })
    }
}

impl Default for RowCodec {
    fn default() -> Self {
        Self::new(DEFAULT_DELIMITER, NULL_SENTINEL)
    }
}

/// Strip a trailing `\n` or `\r\n` from a raw line buffer.
pub fn strip_line_ending(buf: &mut Vec<u8>) {
    if buf.last() == Some(&LINE_TERMINATOR) {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
}

/// Decode a raw line (terminator already stripped) as UTF-8.
pub fn decode_line(buf: Vec<u8>) -> std::io::Result<String> {
    String::from_utf8(buf).map_err(|e| {
        std::io::Error::new(std::io::ErrorKind::InvalidData, format!("row is not valid UTF-8: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_keeps_empty_fields() {
        let codec = RowCodec::default();
        assert_eq!(codec.split("a||c|"), vec!["a", "", "c", ""]);
        assert_eq!(codec.split(""), vec![""]);
    }

    #[test]
    fn test_field_falls_back_to_sentinel() {
        let codec = RowCodec::default();
        assert_eq!(codec.field("1|2", 1), "2");
        assert_eq!(codec.field("1|2", 2), "null");
        assert_eq!(codec.raw_field("1|2", 2), None);
    }

    #[test]
    fn test_join() {
        let codec = RowCodec::default();
        assert_eq!(codec.join(&["x", "", "z"]), "x||z");
        assert_eq!(codec.join::<&str>(&[]), "");
    }

    #[test]
    fn test_custom_delimiter_and_sentinel() {
        let codec = RowCodec::new(',', "NA");
        assert_eq!(codec.split("a,b"), vec!["a", "b"]);
        assert_eq!(codec.field("a", 3), "NA");
        assert_eq!(codec.fields_padded("a", 3), vec!["a", "NA", "NA"]);
    }

    #[test]
    fn test_check_field() {
        let codec = RowCodec::default();
        assert!(codec.check_field("plain value").is_ok());
        assert!(codec.check_field("").is_ok());
        assert!(matches!(codec.check_field("a|b"), Err(StoreError::InvalidValue { .. })));
        assert!(codec.check_field("line\nbreak").is_err());
        assert!(codec.check_field("cr\r").is_err());
    }

    #[test]
    fn test_strip_line_ending() {
        let mut buf = b"1|2\r\n".to_vec();
        strip_line_ending(&mut buf);
        assert_eq!(buf, b"1|2");

        let mut buf = b"no terminator".to_vec();
        strip_line_ending(&mut buf);
        assert_eq!(buf, b"no terminator");
    }

    #[test]
    fn test_decode_line_rejects_invalid_utf8() {
        let err = decode_line(vec![0xff, 0xfe]).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }
}
