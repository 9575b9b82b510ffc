//! Bootstrap line types: the fixed, non-alphabetic meta-records every
//! container file uses for its header and footer, plus the grammar used to
//! parse schema text itself.
//!
//! These field signatures are constructed directly as Rust literals rather
//! than bootstrapped by writing a schema-text block to a temp file and
//! re-parsing it through the general file reader — there's no reason to
//! round-trip through the parser just to build a table that's fixed at
//! compile time.

use crate::types::{LineTypeDef, OneType};
use std::collections::HashMap;

fn def(type_char: char, fields: &[OneType], comment: &str) -> LineTypeDef {
    LineTypeDef {
        type_char,
        fields: fields.to_vec(),
        comment: Some(comment.to_string()),
        is_object: false,
        is_group: false,
    }
}

/// The header/footer meta-record line types, keyed by their one-character
/// identifier. These are universal: every container file uses them
/// regardless of its own schema's filetype, and they are never subject to
/// the "must be alphabetic" rule that applies to user record types.
///
/// Field signatures match the fixed set every container implementation
/// agrees on for these meta-records.
pub fn header_footer_info() -> HashMap<char, LineTypeDef> {
    use OneType::{Char, Int, StringList};
    let mut m = HashMap::new();
    let mut ins = |d: LineTypeDef| {
        m.insert(d.type_char, d);
    };
    ins(def('1', &[OneType::String, Int, Int], "first line: 3-letter type, major, minor version"));
    ins(def('2', &[OneType::String], "subtype: 3-letter subtype"));
    ins(def('#', &[Char, Int], "linetype, count"));
    ins(def('@', &[Char, Int], "linetype, list max"));
    ins(def('+', &[Char, Int], "linetype, list total"));
    ins(def('%', &[Char, Char, Char, Int], "group, #/+, linetype, value"));
    ins(def('!', &[StringList], "provenance: program, version, command, date"));
    ins(def('<', &[OneType::String, Int], "reference: filename, object count"));
    ins(def('>', &[OneType::String], "deferred: filename"));
    ins(def('~', &[Char, Char, StringList], "embedded schema linetype definition"));
    ins(def('.', &[], "blank line, anywhere in file"));
    ins(def('$', &[Int], "binary file - goto footer: isBigEndian"));
    ins(def('^', &[], "binary file: end of footer designation"));
    ins(def('-', &[Int], "binary file: offset of start of footer"));
    ins(def('&', &[OneType::IntList], "binary file: object index"));
    ins(def('*', &[OneType::IntList], "binary file: group index"));
    ins(def(';', &[Char, OneType::String], "binary file: list codec"));
    ins(def('/', &[OneType::String], "binary file: comment"));
    m
}

/// True if `c` is one of the fixed meta-record line types of
/// [`header_footer_info`] rather than a user-declared record type.
pub fn is_meta_type(c: char) -> bool {
    matches!(
        c,
        '1' | '2' | '#' | '@' | '+' | '%' | '!' | '<' | '>' | '~' | '.' | '$' | '^' | '-' | '&' | '*' | ';' | '/'
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_field_is_int() {
        let m = header_footer_info();
        assert_eq!(m[&'%'].fields[3], OneType::Int);
    }

    #[test]
    fn meta_types_cover_header_and_footer() {
        assert!(is_meta_type('1'));
        assert!(is_meta_type('&'));
        assert!(!is_meta_type('A'));
        assert!(!is_meta_type('z'));
    }
}
