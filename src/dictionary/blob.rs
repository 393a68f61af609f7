//! Zero-copy key-to-values dictionary over a text blob.

use indexmap::IndexMap;

use crate::textutil::str_from_bytes_truncating;

/// Column order of a two-column dictionary file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnOrder {
    /// The first whitespace run splits the key from the value; the value
    /// runs to end-of-line minus trailing whitespace and may contain
    /// interior whitespace.
    KeyThenValue,
    /// The last non-blank token on the line is the key; everything before
    /// the final whitespace run is the value.
    ValueThenKey,
}

/// The kind of a recoverable or fatal problem found while parsing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseIssueKind {
    /// A NUL byte was found anywhere but the very last position. Fatal.
    NullCharacterInText,
    /// A line did not yield two columns. The line is skipped.
    MissingSecondColumn,
}

/// A parse issue with its 1-based line number.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParseIssue {
    pub kind: ParseIssueKind,
    pub line: usize,
}

/// At most this many [`ParseIssueKind::MissingSecondColumn`] issues are
/// retained per parse.
pub const MAX_ISSUES: usize = 100;

fn is_crlf(c: u8) -> bool {
    c == b'\n' || c == b'\r'
}

fn is_blank(c: u8) -> bool {
    c == b' ' || c == b'\t'
}

fn advance_to_non_whitespace(block: &[u8], mut pos: usize) -> usize {
    while pos < block.len() && is_blank(block[pos]) {
        pos += 1;
    }
    pos
}

fn advance_to_crlf(block: &[u8], mut pos: usize) -> usize {
    while pos < block.len() && !is_crlf(block[pos]) {
        pos += 1;
    }
    pos
}

fn advance_to_content(block: &[u8], mut pos: usize, line: &mut usize) -> usize {
    while pos < block.len() {
        let c = block[pos];
        if c == b'\n' {
            *line += 1;
        }
        if !is_blank(c) && !is_crlf(c) {
            break;
        }
        pos += 1;
    }
    pos
}

fn advance_to_non_content(block: &[u8], mut pos: usize) -> usize {
    while pos < block.len() && !is_blank(block[pos]) && !is_crlf(block[pos]) {
        pos += 1;
    }
    pos
}

/// A dictionary of zero-copy slices into a caller-owned blob.
///
/// Both keys and values borrow from the blob, so the dictionary cannot
/// outlive it; `clear` drops every slice reference at once. Values for a
/// key preserve their order of appearance in the blob, as does key
/// iteration.
#[derive(Default)]
pub struct ByteBlockDictionary<'a> {
    map: IndexMap<&'a str, Vec<&'a str>>,
    issues: Vec<ParseIssue>,
}

impl<'a> ByteBlockDictionary<'a> {
    pub fn new() -> ByteBlockDictionary<'a> {
        Default::default()
    }

    /// Drops all parsed entries and recorded issues.
    pub fn clear(&mut self) {
        self.map.clear();
        self.issues.clear();
    }

    /// Parses `block` and replaces the dictionary's contents. Returns false
    /// on an empty blob or when a stray NUL byte aborts the parse; a NUL as
    /// the very last byte is tolerated for the benefit of C-style buffers.
    pub fn parse(&mut self, block: &'a [u8], order: ColumnOrder) -> bool {
        if block.is_empty() {
            return false;
        }

        self.clear();

        let block = match block.last() {
            Some(0) => &block[..block.len() - 1],
            _ => block,
        };

        if let Some(nul_at) = block.iter().position(|&c| c == 0) {
            let line = 1 + block[..nul_at].iter().filter(|&&c| c == b'\n').count();
            self.issues.push(ParseIssue {
                kind: ParseIssueKind::NullCharacterInText,
                line,
            });
            return false;
        }

        match order {
            ColumnOrder::KeyThenValue => self.parse_key_then_value(block),
            ColumnOrder::ValueThenKey => self.parse_value_then_key(block),
        }
        true
    }

    fn record_missing_column(&mut self, line: usize) {
        if self.issues.len() < MAX_ISSUES {
            self.issues.push(ParseIssue {
                kind: ParseIssueKind::MissingSecondColumn,
                line,
            });
        }
    }

    fn parse_key_then_value(&mut self, block: &'a [u8]) {
        let mut line = 1usize;
        let mut pos = 0usize;

        while pos < block.len() {
            pos = advance_to_content(block, pos, &mut line);
            if pos == block.len() {
                break;
            }

            if block[pos] == b'#' {
                pos = advance_to_crlf(block, pos);
                continue;
            }

            let key_start = pos;
            pos = advance_to_non_content(block, pos);
            let key_end = pos;

            pos = advance_to_non_whitespace(block, pos);
            if pos == block.len() || is_crlf(block[pos]) {
                self.record_missing_column(line);
                continue;
            }

            let value_start = pos;
            pos = advance_to_crlf(block, pos);
            let mut value_end = pos;

            // Strip trailing whitespace; value_start is a content character
            // so the value cannot become empty.
            while value_end > value_start && is_blank(block[value_end - 1]) {
                value_end -= 1;
            }

            let key = str_from_bytes_truncating(&block[key_start..key_end]);
            let value = str_from_bytes_truncating(&block[value_start..value_end]);
            self.map.entry(key).or_default().push(value);
        }
    }

    fn parse_value_then_key(&mut self, block: &'a [u8]) {
        let mut line = 1usize;
        let mut pos = 0usize;

        while pos < block.len() {
            pos = advance_to_content(block, pos, &mut line);
            if pos == block.len() {
                break;
            }

            if block[pos] == b'#' {
                pos = advance_to_crlf(block, pos);
                continue;
            }

            let value_start = pos;
            pos = advance_to_non_content(block, pos);
            let mut value_end = pos;

            pos = advance_to_non_whitespace(block, pos);
            if pos == block.len() || is_crlf(block[pos]) {
                self.record_missing_column(line);
                continue;
            }

            let mut key_start = pos;
            pos = advance_to_non_content(block, pos);
            let mut key_end = pos;

            // Keep consuming tokens; the final one is the key and the rest
            // extend the value, interior whitespace included.
            while pos < block.len() {
                if is_blank(block[pos]) {
                    pos = advance_to_non_whitespace(block, pos);
                }
                if pos == block.len() || is_crlf(block[pos]) {
                    break;
                }

                value_end = key_end;
                key_start = pos;
                pos = advance_to_non_content(block, pos);
                key_end = pos;
            }

            let key = str_from_bytes_truncating(&block[key_start..key_end]);
            let value = str_from_bytes_truncating(&block[value_start..value_end]);
            self.map.entry(key).or_default().push(value);
        }
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Returns the values recorded for `key` in blob order.
    pub fn get_values(&self, key: &str) -> &[&'a str] {
        self.map.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// Iterates over all keys in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &[&'a str])> {
        self.map.iter().map(|(k, v)| (*k, v.as_slice()))
    }

    pub fn issues(&self) -> &[ParseIssue] {
        &self.issues
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_then_value_splits_on_first_whitespace_run() {
        let mut dict = ByteBlockDictionary::new();
        assert!(dict.parse(b"k1 v1\nk2\tv2 with spaces  \n", ColumnOrder::KeyThenValue));
        assert_eq!(["v1"], dict.get_values("k1"));
        assert_eq!(["v2 with spaces"], dict.get_values("k2"));
        assert!(dict.issues().is_empty());
    }

    #[test]
    fn value_then_key_takes_the_last_token_as_key() {
        let mut dict = ByteBlockDictionary::new();
        assert!(dict.parse(b"v1 k1\nvalue with spaces k2\n", ColumnOrder::ValueThenKey));
        assert_eq!(["v1"], dict.get_values("k1"));
        assert_eq!(["value with spaces"], dict.get_values("k2"));
    }

    #[test]
    fn repeated_keys_preserve_insertion_order() {
        let mut dict = ByteBlockDictionary::new();
        assert!(dict.parse(b"k a\nk b\nk c\n", ColumnOrder::KeyThenValue));
        assert_eq!(["a", "b", "c"], dict.get_values("k"));
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let mut dict = ByteBlockDictionary::new();
        assert!(dict.parse(
            b"# header\n\n  # indented comment\nk v\n",
            ColumnOrder::KeyThenValue
        ));
        assert_eq!(1, dict.len());
        assert_eq!(["v"], dict.get_values("k"));
    }

    #[test]
    fn supports_cr_lf_and_crlf_line_endings() {
        let mut dict = ByteBlockDictionary::new();
        assert!(dict.parse(b"k1 v1\r\nk2 v2\rk3 v3\n", ColumnOrder::KeyThenValue));
        assert_eq!(["v1"], dict.get_values("k1"));
        assert_eq!(["v2"], dict.get_values("k2"));
        assert_eq!(["v3"], dict.get_values("k3"));
    }

    #[test]
    fn missing_second_column_records_the_line_and_skips_it() {
        let mut dict = ByteBlockDictionary::new();
        assert!(dict.parse(b"k1 v1\nlonely\nk2 v2\n", ColumnOrder::KeyThenValue));
        assert_eq!(["v1"], dict.get_values("k1"));
        assert_eq!(["v2"], dict.get_values("k2"));
        assert!(!dict.has_key("lonely"));
        assert_eq!(
            &[ParseIssue {
                kind: ParseIssueKind::MissingSecondColumn,
                line: 2
            }],
            dict.issues()
        );
    }

    #[test]
    fn interior_nul_aborts_the_parse() {
        let mut dict = ByteBlockDictionary::new();
        assert!(!dict.parse(b"k1 v1\nk\0 v\n", ColumnOrder::KeyThenValue));
        assert_eq!(
            &[ParseIssue {
                kind: ParseIssueKind::NullCharacterInText,
                line: 2
            }],
            dict.issues()
        );
        assert!(dict.is_empty());
    }

    #[test]
    fn trailing_nul_is_tolerated() {
        let mut dict = ByteBlockDictionary::new();
        assert!(dict.parse(b"k v\n\0", ColumnOrder::KeyThenValue));
        assert_eq!(["v"], dict.get_values("k"));
    }

    #[test]
    fn empty_input_is_rejected() {
        let mut dict = ByteBlockDictionary::new();
        assert!(!dict.parse(b"", ColumnOrder::KeyThenValue));
    }

    #[test]
    fn clear_drops_entries_and_issues() {
        let mut dict = ByteBlockDictionary::new();
        assert!(dict.parse(b"k v\nbad\n", ColumnOrder::KeyThenValue));
        dict.clear();
        assert!(dict.is_empty());
        assert!(dict.issues().is_empty());
    }
}
