//! ASCII record encoding: one record per line, fields separated by single
//! spaces, the line type character leading.

use crate::value::{FieldValue, ListValue, Record};
use onecode_core::error::{OneError, Result};
use onecode_schema::{LineTypeDef, OneType};
use std::io::Write;

/// Render one record as an ASCII line (without the trailing newline).
/// `list_field_index` is `def.list_field_index()` for this record's line
/// type: the position whose `Int` length field is followed by list content.
pub fn encode(record: &Record, list_field_index: Option<usize>) -> String {
    let mut out = String::new();
    out.push(record.line_type);
    for (i, field) in record.fields.iter().enumerate() {
        out.push(' ');
        match field {
            FieldValue::Int(v) => {
                out.push_str(&v.to_string());
                if Some(i) == list_field_index {
                    push_list_tail(&mut out, &record.list);
                }
            }
            FieldValue::Real(v) => out.push_str(&format_real(*v)),
            FieldValue::Char(c) => out.push(*c as char),
        }
    }
    if let Some(comment) = &record.comment {
        out.push(' ');
        out.push_str(&String::from_utf8_lossy(comment));
    }
    out
}

fn push_list_tail(out: &mut String, list: &ListValue) {
    match list {
        ListValue::None => {}
        ListValue::Bytes(b) => {
            out.push(' ');
            out.push_str(&String::from_utf8_lossy(b));
        }
        ListValue::Ints(v) => {
            for x in v {
                out.push(' ');
                out.push_str(&x.to_string());
            }
        }
        ListValue::Reals(v) => {
            for x in v {
                out.push(' ');
                out.push_str(&format_real(*x));
            }
        }
        ListValue::Strings(v) => {
            for s in v {
                out.push(' ');
                out.push_str(&s.len().to_string());
                out.push(' ');
                out.push_str(&String::from_utf8_lossy(s));
            }
        }
    }
}

fn format_real(v: f64) -> String {
    if v == v.trunc() && v.is_finite() {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}

/// Write one record's ASCII line, terminated by `\n`.
pub fn write<W: Write>(w: &mut W, record: &Record, list_field_index: Option<usize>) -> Result<()> {
    let line = encode(record, list_field_index);
    w.write_all(line.as_bytes())?;
    w.write_all(b"\n")?;
    Ok(())
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn skip_one_space(&mut self) {
        if self.pos < self.bytes.len() && self.bytes[self.pos] == b' ' {
            self.pos += 1;
        }
    }

    fn read_token(&mut self) -> &'a [u8] {
        self.skip_one_space();
        let start = self.pos;
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b' ' {
            self.pos += 1;
        }
        &self.bytes[start..self.pos]
    }

    fn read_int(&mut self) -> Result<i64> {
        let tok = self.read_token();
        std::str::from_utf8(tok)
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(|| OneError::logic("bad INT token"))
    }

    fn read_real(&mut self) -> Result<f64> {
        let tok = self.read_token();
        std::str::from_utf8(tok)
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(|| OneError::logic("bad REAL token"))
    }

    fn read_char(&mut self) -> Result<u8> {
        let tok = self.read_token();
        tok.first().copied().ok_or_else(|| OneError::logic("bad CHAR token"))
    }

    fn read_exact_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.skip_one_space();
        if self.pos + n > self.bytes.len() {
            return Err(OneError::logic("truncated STRING/DNA bytes"));
        }
        let out = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn remainder_as_comment(&mut self) -> Option<Vec<u8>> {
        self.skip_one_space();
        if self.pos >= self.bytes.len() {
            return None;
        }
        Some(self.bytes[self.pos..].to_vec())
    }
}

/// Parse one ASCII record line (without the line type character or
/// trailing newline) against `def`.
pub fn parse(line_type: char, body: &[u8], def: &LineTypeDef) -> Result<Record> {
    let mut cur = Cursor::new(body);
    let mut record = Record::new(line_type, &def.fields);

    for (i, &ty) in def.fields.iter().enumerate() {
        match ty {
            OneType::Int => record.fields[i] = FieldValue::Int(cur.read_int()?),
            OneType::Real => record.fields[i] = FieldValue::Real(cur.read_real()?),
            OneType::Char => record.fields[i] = FieldValue::Char(cur.read_char()?),
            OneType::String | OneType::Dna => {
                let len = cur.read_int()?;
                record.fields[i] = FieldValue::Int(len);
                let bytes = cur.read_exact_bytes(len as usize)?;
                record.list = ListValue::Bytes(bytes.to_vec());
            }
            OneType::IntList => {
                let len = cur.read_int()?;
                record.fields[i] = FieldValue::Int(len);
                let mut v = Vec::with_capacity(len as usize);
                for _ in 0..len {
                    v.push(cur.read_int()?);
                }
                record.list = ListValue::Ints(v);
            }
            OneType::RealList => {
                let len = cur.read_int()?;
                record.fields[i] = FieldValue::Int(len);
                let mut v = Vec::with_capacity(len as usize);
                for _ in 0..len {
                    v.push(cur.read_real()?);
                }
                record.list = ListValue::Reals(v);
            }
            OneType::StringList => {
                let len = cur.read_int()?;
                record.fields[i] = FieldValue::Int(len);
                let mut v = Vec::with_capacity(len as usize);
                for _ in 0..len {
                    let slen = cur.read_int()?;
                    v.push(cur.read_exact_bytes(slen as usize)?.to_vec());
                }
                record.list = ListValue::Strings(v);
            }
        }
    }

    record.comment = cur.remainder_as_comment();
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use onecode_schema::LineTypeDef;

    fn def(fields: Vec<OneType>) -> LineTypeDef {
        LineTypeDef {
            type_char: 'B',
            fields,
            comment: None,
            is_object: false,
            is_group: false,
        }
    }

    #[test]
    fn s1_int_and_string_roundtrip() {
        let a = Record {
            line_type: 'A',
            fields: vec![FieldValue::Int(42)],
            list: ListValue::None,
            comment: None,
        };
        assert_eq!(encode(&a, None), "A 42");

        let mut b = Record::new('B', &[OneType::String]);
        b.fields[0] = FieldValue::Int(5);
        b.list = ListValue::Bytes(b"hello".to_vec());
        assert_eq!(encode(&b, Some(0)), "B 5 hello");

        let parsed = parse('B', b"5 hello", &def(vec![OneType::String])).unwrap();
        assert_eq!(parsed.list.as_bytes(), Some(&b"hello"[..]));
    }

    #[test]
    fn int_list_roundtrip() {
        let d = def(vec![OneType::IntList]);
        let parsed = parse('B', b"3 1 -2 300", &d).unwrap();
        assert_eq!(parsed.list.as_ints(), Some(&[1i64, -2, 300][..]));
    }

    #[test]
    fn string_list_roundtrip() {
        let d = def(vec![OneType::StringList]);
        let parsed = parse('B', b"2 3 foo 3 bar", &d).unwrap();
        assert_eq!(parsed.list.as_strings().unwrap(), &[b"foo".to_vec(), b"bar".to_vec()]);
    }

    #[test]
    fn trailing_comment_is_buffered() {
        let d = def(vec![OneType::Int]);
        let parsed = parse('B', b"7 a trailing note", &d).unwrap();
        assert_eq!(parsed.comment.as_deref(), Some(&b"a trailing note"[..]));
    }

    #[test]
    fn empty_list_roundtrips() {
        let d = def(vec![OneType::IntList]);
        let parsed = parse('B', b"0", &d).unwrap();
        assert_eq!(parsed.list.as_ints(), Some(&[][..]));
    }
}
