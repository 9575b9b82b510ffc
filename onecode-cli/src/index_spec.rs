//! Parses the `view --index` argument: a comma-separated list of object
//! index slices, each written `T i` (one object) or `T i-j` (inclusive
//! range).

use onecode_core::error::{OneError, Result};

/// One parsed slice: the object type character, and the inclusive
/// `[start, end]` object ordinal range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRange {
    /// The object type this range applies to.
    pub type_char: char,
    /// First object ordinal, inclusive.
    pub start: i64,
    /// Last object ordinal, inclusive.
    pub end: i64,
}

/// Parse `"A 0-9,A 20,B 3-3"` into a list of [`IndexRange`]s.
pub fn parse(spec: &str) -> Result<Vec<IndexRange>> {
    spec.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_one)
        .collect()
}

fn parse_one(token: &str) -> Result<IndexRange> {
    let err = || OneError::logic(format!("malformed index slice '{token}' (expected 'T i' or 'T i-j')"));
    let mut parts = token.split_whitespace();
    let type_tok = parts.next().ok_or_else(err)?;
    let range_tok = parts.next().ok_or_else(err)?;
    if parts.next().is_some() || type_tok.chars().count() != 1 {
        return Err(err());
    }
    let type_char = type_tok.chars().next().ok_or_else(err)?;

    let (start, end) = match range_tok.split_once('-') {
        Some((a, b)) => (a.parse::<i64>().map_err(|_| err())?, b.parse::<i64>().map_err(|_| err())?),
        None => {
            let i = range_tok.parse::<i64>().map_err(|_| err())?;
            (i, i)
        }
    };
    if end < start {
        return Err(err());
    }
    Ok(IndexRange { type_char, start, end })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_object() {
        let ranges = parse("A 5").unwrap();
        assert_eq!(ranges, vec![IndexRange { type_char: 'A', start: 5, end: 5 }]);
    }

    #[test]
    fn range_and_list() {
        let ranges = parse("A 0-9, B 2-4").unwrap();
        assert_eq!(
            ranges,
            vec![
                IndexRange { type_char: 'A', start: 0, end: 9 },
                IndexRange { type_char: 'B', start: 2, end: 4 },
            ]
        );
    }

    #[test]
    fn rejects_malformed_tokens() {
        assert!(parse("A").is_err());
        assert!(parse("AA 5").is_err());
        assert!(parse("A 9-2").is_err());
    }
}
