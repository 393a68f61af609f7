//! Memory-mapped, binary-searchable phrase database.

use std::fs::File;
use std::io;
use std::path::Path;

use memmap2::Mmap;
use thiserror::Error;

/// The pragma line that must start every sorted database file.
///
/// Everything after this line is sorted by byte order on the full line,
/// which is what makes the whole key space binary-searchable without
/// parsing.
pub const SORTED_PRAGMA_HEADER: &str = "# format org.openvanilla.mcbopomofo.sorted\n";

/// A read-only byte buffer backing a [`SortedPhraseDb`].
///
/// Production databases are memory-mapped files; tests and tooling can use
/// owned byte vectors instead.
#[derive(Debug)]
pub enum Blob {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Blob {
    /// Maps the file at `path` read-only.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Blob> {
        let file = File::open(path)?;
        // Safety: the map is read-only and the file is a data file owned by
        // the input method; concurrent truncation is not part of the
        // supported deployment.
        let map = unsafe { Mmap::map(&file)? };
        Ok(Blob::Mapped(map))
    }
}

impl AsRef<[u8]> for Blob {
    fn as_ref(&self) -> &[u8] {
        match self {
            Blob::Mapped(map) => map.as_ref(),
            Blob::Owned(bytes) => bytes.as_slice(),
        }
    }
}

impl From<Vec<u8>> for Blob {
    fn from(bytes: Vec<u8>) -> Blob {
        Blob::Owned(bytes)
    }
}

impl From<&str> for Blob {
    fn from(text: &str) -> Blob {
        Blob::Owned(text.as_bytes().to_vec())
    }
}

/// The error type returned from constructing a [`SortedPhraseDb`].
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PhraseDbError {
    #[error("phrase data is empty")]
    EmptyBuffer,
    #[error("phrase data does not start with the sorted-format pragma")]
    MissingPragma,
}

/// A phrase database backed by a contiguous, byte-sorted text buffer.
///
/// Rows have the shape `key SP value SP score`. The database never parses
/// rows up front; every query runs a binary search directly over the bytes
/// and returns slices borrowed from the backing buffer. Dropping the
/// database releases the mapping together with every derived view, which
/// the borrow checker enforces at compile time.
#[derive(Debug)]
pub struct SortedPhraseDb {
    blob: Blob,
    start: usize,
}

impl SortedPhraseDb {
    /// Creates a database over `blob`, optionally validating and skipping
    /// the sorted-format pragma header.
    pub fn new(blob: Blob, validate_pragma: bool) -> Result<SortedPhraseDb, PhraseDbError> {
        let bytes = blob.as_ref();
        if bytes.is_empty() {
            return Err(PhraseDbError::EmptyBuffer);
        }

        let mut start = 0;
        if validate_pragma {
            if !bytes.starts_with(SORTED_PRAGMA_HEADER.as_bytes()) {
                return Err(PhraseDbError::MissingPragma);
            }
            start = SORTED_PRAGMA_HEADER.len();
        }

        Ok(SortedPhraseDb { blob, start })
    }

    fn data(&self) -> &[u8] {
        &self.blob.as_ref()[self.start..]
    }

    /// Returns all consecutive rows whose first `key.len()` bytes equal
    /// `key`, in file order. Rows are slices into the backing buffer and
    /// exclude the trailing newline.
    pub fn find_rows(&self, key: &[u8]) -> Vec<&[u8]> {
        let data = self.data();
        let mut rows = Vec::new();

        let Some(mut ptr) = self.find_first_matching_line(key) else {
            return rows;
        };

        while ptr + key.len() <= data.len() && &data[ptr..ptr + key.len()] == key {
            let mut eol = ptr;
            while eol < data.len() && data[eol] != b'\n' {
                eol += 1;
            }
            rows.push(&data[ptr..eol]);
            if eol == data.len() {
                break;
            }
            ptr = eol + 1;
        }

        rows
    }

    /// Binary-searches for the first line that begins with `key` and
    /// returns its byte offset. At each probe the search backs up to the
    /// preceding line start, and on an equal match it also inspects the
    /// previous line: only when the previous line is strictly less than the
    /// key is the current line the first occurrence.
    pub fn find_first_matching_line(&self, key: &[u8]) -> Option<usize> {
        let data = self.data();
        if key.is_empty() {
            return Some(0);
        }

        let mut top = 0usize;
        let mut bottom = data.len();

        while top < bottom {
            let mid = top + (bottom - top) / 2;
            let mut ptr = mid;

            if ptr != 0 {
                ptr -= 1;
            }
            while ptr != 0 && data[ptr] != b'\n' {
                ptr -= 1;
            }

            let mut prev = None;
            if data[ptr] == b'\n' {
                prev = Some(ptr);
                ptr += 1;
            }

            // ptr is now at the start of the line covering the probe.
            if ptr + key.len() > data.len() {
                break;
            }

            let current_cmp = data[ptr..ptr + key.len()].cmp(key);

            match current_cmp {
                std::cmp::Ordering::Greater => {
                    let Some(new_bottom) = mid.checked_sub(1) else {
                        break;
                    };
                    bottom = new_bottom;
                    continue;
                }
                std::cmp::Ordering::Less => {
                    top = mid + 1;
                    continue;
                }
                std::cmp::Ordering::Equal => {}
            }

            let Some(mut prev) = prev else {
                return Some(ptr);
            };

            // Back up once more so prev points at the previous line start.
            if prev != 0 {
                prev -= 1;
            }
            while prev != 0 && data[prev] != b'\n' {
                prev -= 1;
            }
            if data[prev] == b'\n' {
                prev += 1;
            }

            let prev_end = (prev + key.len()).min(data.len());
            if data[prev..prev_end].cmp(key) == std::cmp::Ordering::Less {
                return Some(ptr);
            }

            // The previous line also matches, so ptr is not the first.
            let Some(new_bottom) = mid.checked_sub(1) else {
                break;
            };
            bottom = new_bottom;
        }

        None
    }

    /// Linearly scans the whole database for rows whose value column starts
    /// with `value`. O(n); intended for infrequent reverse lookups.
    pub fn reverse_find_rows(&self, value: &[u8]) -> Vec<&[u8]> {
        let data = self.data();
        let mut rows = Vec::new();

        let mut record_begin = 0usize;
        while record_begin < data.len() {
            let mut ptr = record_begin;

            // Skip over the key column and the separating space run.
            while ptr < data.len() && data[ptr] != b' ' {
                ptr += 1;
            }
            while ptr < data.len() && data[ptr] == b' ' {
                ptr += 1;
            }

            let mut record_end = ptr;
            while record_end < data.len() && data[record_end] != b'\n' {
                record_end += 1;
            }

            if ptr + value.len() <= data.len() && &data[ptr..ptr + value.len()] == value {
                rows.push(&data[record_begin..record_end]);
            }

            record_begin = record_end;
            while record_begin < data.len() && data[record_begin] == b'\n' {
                record_begin += 1;
            }
        }

        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SORTED_DATA: &str = "# format org.openvanilla.mcbopomofo.sorted\n\
        a 1 -1\n\
        b 2 -2\n\
        b 3 -3\n\
        b 4 -4\n\
        c 5 -5\n";

    fn db() -> SortedPhraseDb {
        SortedPhraseDb::new(Blob::from(SORTED_DATA), true).unwrap()
    }

    #[test]
    fn construction_requires_pragma_when_validating() {
        let err = SortedPhraseDb::new(Blob::from("a 1 -1\n"), true).unwrap_err();
        assert_eq!(PhraseDbError::MissingPragma, err);
        assert!(SortedPhraseDb::new(Blob::from("a 1 -1\n"), false).is_ok());
    }

    #[test]
    fn construction_rejects_empty_buffer() {
        let err = SortedPhraseDb::new(Blob::from(Vec::new()), false).unwrap_err();
        assert_eq!(PhraseDbError::EmptyBuffer, err);
    }

    #[test]
    fn finds_all_rows_sharing_a_prefix_in_file_order() {
        let binding = db();
        let rows = binding.find_rows(b"b ");
        let rows: Vec<&str> = rows
            .iter()
            .map(|r| std::str::from_utf8(r).unwrap())
            .collect();
        assert_eq!(vec!["b 2 -2", "b 3 -3", "b 4 -4"], rows);
    }

    #[test]
    fn first_matching_line_is_really_the_first() {
        let db = db();
        let offset = db.find_first_matching_line(b"b ").unwrap();
        let data = &SORTED_DATA[SORTED_PRAGMA_HEADER.len()..];
        assert!(data[offset..].starts_with("b 2"));
    }

    #[test]
    fn missing_key_yields_no_rows() {
        assert!(db().find_rows(b"z ").is_empty());
        assert!(db().find_first_matching_line(b"z ").is_none());
    }

    #[test]
    fn empty_key_matches_from_the_start() {
        assert_eq!(Some(0), db().find_first_matching_line(b""));
    }

    #[test]
    fn reverse_find_scans_the_value_column() {
        let binding = db();
        let rows = binding.reverse_find_rows(b"3 ");
        let rows: Vec<&str> = rows
            .iter()
            .map(|r| std::str::from_utf8(r).unwrap())
            .collect();
        assert_eq!(vec!["b 3 -3"], rows);
    }

    #[test]
    fn works_against_a_real_mapped_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SORTED_DATA.as_bytes()).unwrap();
        file.flush().unwrap();

        let blob = Blob::open(file.path()).unwrap();
        let db = SortedPhraseDb::new(blob, true).unwrap();
        assert_eq!(1, db.find_rows(b"c ").len());
    }
}
