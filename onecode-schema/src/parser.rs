//! Parser for schema text: the `P/S/O/G/D` directive grammar.
//!
//! Every token in a schema line is itself length-prefixed the same way a
//! `STRING` field is on an ordinary record line (a decimal length, a space,
//! then exactly that many bytes) — schema text is just an ASCII-encoded
//! container body read against the bootstrap grammar. Rather than routing
//! parsing through the full record engine (a C-ism, see
//! `onecode-schema::bootstrap`), this module parses each line directly.

use crate::schema::{FiletypeBlock, Schema};
use crate::types::OneType;
use onecode_core::error::{OneError, Result};

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
    line: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8], line: usize) -> Self {
        Self { bytes, pos: 0, line }
    }

    fn err(&self, message: impl Into<String>) -> OneError {
        OneError::schema(self.line, message)
    }

    fn skip_spaces(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos] == b' ' {
            self.pos += 1;
        }
    }

    fn rest(&self) -> &'a [u8] {
        &self.bytes[self.pos..]
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    /// Read a decimal integer token, stopping at the next space or EOL.
    fn read_int(&mut self) -> Result<i64> {
        self.skip_spaces();
        let start = self.pos;
        if self.pos < self.bytes.len() && (self.bytes[self.pos] == b'-' || self.bytes[self.pos] == b'+') {
            self.pos += 1;
        }
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.err("expected integer token"));
        }
        std::str::from_utf8(&self.bytes[start..self.pos])
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(|| self.err("malformed integer token"))
    }

    /// Read exactly `len` bytes after a single separating space.
    fn read_fixed_string(&mut self, len: usize) -> Result<&'a str> {
        if self.pos < self.bytes.len() && self.bytes[self.pos] == b' ' {
            self.pos += 1;
        }
        if self.pos + len > self.bytes.len() {
            return Err(self.err("truncated length-prefixed string"));
        }
        let s = std::str::from_utf8(&self.bytes[self.pos..self.pos + len])
            .map_err(|_| self.err("non-UTF8 bytes in schema string"))?;
        self.pos += len;
        Ok(s)
    }

    /// Read a single non-whitespace character token.
    fn read_char(&mut self) -> Result<char> {
        self.skip_spaces();
        if self.pos >= self.bytes.len() {
            return Err(self.err("expected a one-character token"));
        }
        let c = self.bytes[self.pos] as char;
        self.pos += 1;
        Ok(c)
    }

    /// Whatever trailing, non-empty text remains after a separating space
    /// becomes this line's comment.
    fn trailing_comment(&mut self) -> Option<String> {
        self.skip_spaces();
        if self.is_empty() {
            return None;
        }
        let raw = std::str::from_utf8(self.rest()).ok()?.trim();
        let raw = raw.strip_prefix("# ").unwrap_or(raw).strip_prefix('#').unwrap_or(raw);
        let raw = raw.trim();
        (!raw.is_empty()).then(|| raw.to_string())
    }
}

fn read_field_list(cur: &mut Cursor<'_>) -> Result<Vec<OneType>> {
    let n = cur.read_int()? as usize;
    if n > crate::types::MAX_FIELDS {
        return Err(cur.err(format!("line type has {n} fields, exceeding the {} field maximum", crate::types::MAX_FIELDS)));
    }
    let mut fields = Vec::with_capacity(n);
    for _ in 0..n {
        let len = cur.read_int()? as usize;
        let name = cur.read_fixed_string(len)?;
        let ty = OneType::from_name(name).ok_or_else(|| cur.err(format!("unknown field type '{name}'")))?;
        fields.push(ty);
    }
    Ok(fields)
}

/// Parse a complete schema text into a [`Schema`] of chained filetype
/// blocks. Blank lines and lines beginning with `.` are ignored.
pub fn parse_text(text: &str) -> Result<Schema> {
    let mut schema = Schema::new();
    let mut current: Option<FiletypeBlock> = None;

    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = raw_line.trim_end();
        if trimmed.is_empty() || trimmed.starts_with('.') {
            continue;
        }
        let bytes = trimmed.as_bytes();
        let directive = bytes[0] as char;
        let mut cur = Cursor::new(&bytes[1..], line_no);

        match directive {
            'P' => {
                if let Some(block) = current.take() {
                    schema.blocks.push(block);
                }
                let len = cur.read_int()? as usize;
                let name = cur.read_fixed_string(len)?;
                if name.is_empty() {
                    return Err(OneError::schema(line_no, "primary name must have at least one letter"));
                }
                current = Some(FiletypeBlock::new(name));
            }
            'S' => {
                let len = cur.read_int()? as usize;
                let name = cur.read_fixed_string(len)?;
                if name.is_empty() {
                    return Err(OneError::schema(line_no, "secondary name must have at least one letter"));
                }
                let block = current
                    .as_mut()
                    .ok_or_else(|| OneError::schema(line_no, "'S' directive before any 'P' directive"))?;
                block.secondary.push(name.to_string());
            }
            'O' | 'G' | 'D' => {
                let c = cur.read_char()?;
                let fields = read_field_list(&mut cur)?;
                let comment = cur.trailing_comment();
                let block = current
                    .as_mut()
                    .ok_or_else(|| OneError::schema(line_no, format!("'{directive}' directive before any 'P' directive")))?;
                match directive {
                    'O' => block.declare_object(c, fields, comment),
                    'G' => block.declare_group(c, fields, comment),
                    _ => block.declare_record(c, fields, comment),
                }
                .map_err(|e| retag_line(e, line_no))?;
            }
            other => {
                return Err(OneError::schema(line_no, format!("unrecognized schema directive '{other}'")));
            }
        }
    }

    if let Some(block) = current.take() {
        schema.blocks.push(block);
    }

    if schema.blocks.is_empty() {
        return Err(OneError::schema(0, "schema text declares no filetype"));
    }

    Ok(schema)
}

fn retag_line(err: OneError, line: usize) -> OneError {
    match err {
        OneError::Schema { message, .. } => OneError::schema(line, message),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s1_schema_text() {
        let text = "P 3 tst\nO A 1 3 INT\nD B 1 6 STRING\n";
        let schema = parse_text(text).unwrap();
        assert_eq!(schema.blocks.len(), 1);
        let block = &schema.blocks[0];
        assert_eq!(block.primary, "tst");
        assert_eq!(block.object_type, Some('A'));
        assert_eq!(block.line_types[&'B'].fields, vec![OneType::String]);
    }

    #[test]
    fn multiple_filetypes_chain() {
        let text = "P 3 one\nO A 1 3 INT\nP 3 two\nO B 1 3 INT\n";
        let schema = parse_text(text).unwrap();
        assert_eq!(schema.blocks.len(), 2);
        assert_eq!(schema.blocks[1].primary, "two");
    }

    #[test]
    fn object_type_is_optional() {
        let text = "P 3 tst\nD B 1 6 STRING\n";
        let schema = parse_text(text).unwrap();
        assert_eq!(schema.blocks[0].object_type, None);
    }

    #[test]
    fn group_type_must_start_with_int() {
        let text = "P 3 tst\nO A 1 3 INT\nG g 1 6 STRING\n";
        assert!(parse_text(text).is_err());
    }

    #[test]
    fn secondary_names_and_comments() {
        let text = "P 3 tst\nS 4 alt1\nO A 1 3 INT  a comment\n";
        let schema = parse_text(text).unwrap();
        assert_eq!(schema.blocks[0].secondary, vec!["alt1".to_string()]);
        assert_eq!(schema.blocks[0].line_types[&'A'].comment.as_deref(), Some("a comment"));
    }

    #[test]
    fn blank_and_dot_lines_are_skipped() {
        let text = "P 3 tst\n\n.\nO A 1 3 INT\n";
        let schema = parse_text(text).unwrap();
        assert_eq!(schema.blocks.len(), 1);
    }
}
