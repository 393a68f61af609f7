//! Code-point oriented string helpers.
//!
//! Readings and candidate values are handled as whole Unicode code points
//! in several places, notably when interleaving a phrase prefix with its
//! per-character readings. These helpers keep that logic in one place and
//! define the crate-wide policy for invalid UTF-8: truncate at the first
//! invalid sequence, never abort.

/// Returns the number of Unicode code points in `s`.
pub fn code_point_count(s: &str) -> usize {
    s.chars().count()
}

/// Returns the prefix of `s` that contains at most `n` code points.
pub fn substring_to_code_points(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Interprets `bytes` as UTF-8, stopping at the first invalid sequence.
///
/// Rows sliced out of a memory-mapped phrase file are expected to be valid
/// UTF-8; a corrupt file yields a truncated view instead of an error.
pub fn str_from_bytes_truncating(bytes: &[u8]) -> &str {
    match std::str::from_utf8(bytes) {
        Ok(s) => s,
        Err(err) => {
            std::str::from_utf8(&bytes[..err.valid_up_to()]).unwrap_or_default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_code_points_not_bytes() {
        assert_eq!(0, code_point_count(""));
        assert_eq!(3, code_point_count("高科技"));
        assert_eq!(4, code_point_count("ㄇㄧㄥˊ"));
    }

    #[test]
    fn substring_stops_at_code_point_boundary() {
        assert_eq!("高科", substring_to_code_points("高科技", 2));
        assert_eq!("高科技", substring_to_code_points("高科技", 10));
        assert_eq!("", substring_to_code_points("高科技", 0));
    }

    #[test]
    fn invalid_utf8_is_truncated_not_rejected() {
        assert_eq!("ab", str_from_bytes_truncating(b"ab\xffcd"));
        assert_eq!("", str_from_bytes_truncating(b"\xff"));
        assert_eq!("個", str_from_bytes_truncating("個".as_bytes()));
    }
}
