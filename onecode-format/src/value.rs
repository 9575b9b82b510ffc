//! The current-record value model: one scalar slot per declared field, plus
//! the out-of-band list payload for the (at most one) list-like field.

use onecode_schema::OneType;

/// One fixed-field value. List-like fields (`STRING`, `DNA`, `*_LIST`) store
/// their *length* here as `Int`; the actual list payload lives in
/// [`ListValue`] on the owning [`Record`], never duplicated.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// `INT` field, or the length of a list-like field.
    Int(i64),
    /// `REAL` field.
    Real(f64),
    /// `CHAR` field.
    Char(u8),
}

impl FieldValue {
    /// The integer value, if this slot holds one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The real value, if this slot holds one.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            FieldValue::Real(v) => Some(*v),
            _ => None,
        }
    }

    /// The character value, if this slot holds one.
    pub fn as_char(&self) -> Option<u8> {
        match self {
            FieldValue::Char(v) => Some(*v),
            _ => None,
        }
    }

    fn default_for(ty: OneType) -> Self {
        match ty {
            OneType::Real => FieldValue::Real(0.0),
            OneType::Char => FieldValue::Char(0),
            _ => FieldValue::Int(0),
        }
    }
}

/// The list payload of a record's one list-like field (if any).
#[derive(Debug, Clone, PartialEq)]
pub enum ListValue {
    /// No list field, or a zero-length list.
    None,
    /// `STRING` or `DNA`: raw bytes.
    Bytes(Vec<u8>),
    /// `INT_LIST`.
    Ints(Vec<i64>),
    /// `REAL_LIST`.
    Reals(Vec<f64>),
    /// `STRING_LIST`: one buffer per string.
    Strings(Vec<Vec<u8>>),
}

impl ListValue {
    /// Number of elements (bases, ints, reals, or strings).
    pub fn len(&self) -> usize {
        match self {
            ListValue::None => 0,
            ListValue::Bytes(b) => b.len(),
            ListValue::Ints(v) => v.len(),
            ListValue::Reals(v) => v.len(),
            ListValue::Strings(v) => v.len(),
        }
    }

    /// True if the list is empty (including "no list field at all").
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total byte length contributed to the line type's running `total`
    /// count: for `STRING_LIST` this is the sum of every string's length,
    /// for everything else it is `len()`.
    pub fn total_len(&self) -> i64 {
        match self {
            ListValue::Strings(v) => v.iter().map(|s| s.len() as i64).sum(),
            other => other.len() as i64,
        }
    }

    /// View as a byte slice (`STRING`/`DNA`/Huffman-compressible lists).
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            ListValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// View as an int slice (`INT_LIST`).
    pub fn as_ints(&self) -> Option<&[i64]> {
        match self {
            ListValue::Ints(v) => Some(v),
            _ => None,
        }
    }

    /// View as a real slice (`REAL_LIST`).
    pub fn as_reals(&self) -> Option<&[f64]> {
        match self {
            ListValue::Reals(v) => Some(v),
            _ => None,
        }
    }

    /// View as a string list (`STRING_LIST`).
    pub fn as_strings(&self) -> Option<&[Vec<u8>]> {
        match self {
            ListValue::Strings(v) => Some(v),
            _ => None,
        }
    }
}

/// The current record: line type, fixed fields, list payload, and any
/// comment buffered onto it by a trailing `/` meta-line.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// One-character line type identifier.
    pub line_type: char,
    /// Ordered fixed-field values, matching the line type's field signature.
    pub fields: Vec<FieldValue>,
    /// The list-like field's payload, if the line type has one.
    pub list: ListValue,
    /// Comment text buffered from a following `/` meta-record, if any.
    pub comment: Option<Vec<u8>>,
}

impl Record {
    /// A zeroed record for a line type with the given field signature.
    pub fn new(line_type: char, field_types: &[OneType]) -> Self {
        Self {
            line_type,
            fields: field_types.iter().map(|&t| FieldValue::default_for(t)).collect(),
            list: ListValue::None,
            comment: None,
        }
    }
}
