//! The container reader state machine: **opening** → **header**
//! → **body** → **closed**. Every line — header, footer, or body — is read
//! through one low-level primitive that peeks the first byte's top bit to
//! tell ASCII from binary, mirroring the reference implementation's
//! `oneReadLine` dispatch.
//!
//! For a binary file, the trailing 8-byte offset names the blank line that
//! separates the body from the footer; it is kept as `body_end` so
//! `read_line` treats reaching it as end of file rather than peeking into
//! the footer's own `#`/`;`/`&`/`*`/`^` records.

use crate::binary;
use crate::index::{GroupIndex, ObjectIndex};
use crate::line_info::{ListCodecState, LineInfo};
use crate::provenance::{Deferred, Provenance, Reference};
use crate::value::Record;
use onecode_core::error::{OneError, Result};
use onecode_huffman::HuffmanCodec;
use onecode_schema::{bootstrap, FiletypeBlock, LineTypeDef, OneType, Schema, MAJOR, MINOR};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Reader lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Header,
    Body,
    Closed,
}

/// An open container file for reading.
pub struct Reader<R> {
    path: PathBuf,
    inner: R,
    state: State,
    meta: HashMap<char, LineTypeDef>,
    schema_block: FiletypeBlock,
    external_schema: Option<Schema>,
    line_info: HashMap<char, LineInfo>,

    /// Primary file type name, e.g. `"seq"`.
    pub file_type: String,
    /// Optional subtype.
    pub subtype: Option<String>,
    /// Major version found in the file.
    pub major: u32,
    /// Minor version found in the file.
    pub minor: u32,
    /// True for a binary-encoded file.
    pub is_binary: bool,
    /// True if the binary file was produced on a big-endian machine.
    pub is_file_big_endian: bool,
    /// Free-form header comment text (`.` lines carrying text).
    pub header_text: Vec<String>,
    /// Provenance entries declared in the header.
    pub provenance: Vec<Provenance>,
    /// Reference entries declared in the header.
    pub references: Vec<Reference>,
    /// Deferred-reference entries declared in the header.
    pub deferred: Vec<Deferred>,

    object_index: ObjectIndex,
    group_index: GroupIndex,

    /// Absolute offset of the blank line separating the body from the
    /// footer, for binary files with a footer. `read_line` treats reaching
    /// this offset as end of file rather than peeking into footer records.
    body_end: Option<u64>,

    /// The first body record, read during header parsing before the caller
    /// could possibly have asked for it; handed out by the first `read_line`.
    pending_first: Option<Record>,
    /// The record most recently yielded by `read_line`.
    current: Option<Record>,
    current_line_no: u64,
}

impl Reader<BufReader<File>> {
    /// Open `path` for reading. `schema`, if given, must be compatible with
    /// the file's own (possibly inline) schema; `type_hint` names the
    /// primary file type to assume for a bare file with no `1` line.
    pub fn open(path: impl AsRef<Path>, schema: Option<&Schema>, type_hint: Option<&str>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| OneError::open(path, e.to_string()))?;
        Self::from_reader(path.to_path_buf(), BufReader::new(file), schema, type_hint)
    }
}

impl<R: BufRead + Seek> Reader<R> {
    /// Build a reader over an already-open [`BufRead`] + [`Seek`] source.
    /// `path` is used only for error messages.
    pub fn from_reader(path: PathBuf, inner: R, schema: Option<&Schema>, type_hint: Option<&str>) -> Result<Self> {
        let mut reader = Reader {
            path,
            inner,
            state: State::Header,
            meta: bootstrap::header_footer_info(),
            schema_block: FiletypeBlock::new(type_hint.unwrap_or("")),
            external_schema: schema.cloned(),
            line_info: HashMap::new(),
            file_type: type_hint.unwrap_or("").to_string(),
            subtype: None,
            major: MAJOR,
            minor: MINOR,
            is_binary: false,
            is_file_big_endian: cfg!(target_endian = "big"),
            header_text: Vec::new(),
            provenance: Vec::new(),
            references: Vec::new(),
            deferred: Vec::new(),
            object_index: ObjectIndex::default(),
            group_index: GroupIndex::default(),
            body_end: None,
            pending_first: None,
            current: None,
            current_line_no: 0,
        };
        reader.read_header()?;
        Ok(reader)
    }

    fn perr(&self, message: impl Into<String>) -> OneError {
        OneError::parse(&self.path, self.current_line_no, message)
    }

    /// Peek the next record's line type, consuming exactly the 1 byte
    /// needed to know it. Returns `(line_type, is_binary, compressed)`;
    /// `compressed` is only meaningful when `is_binary` is true.
    fn peek_line_type(&mut self) -> Result<Option<(char, bool, bool)>> {
        let mut byte = [0u8; 1];
        match self.inner.read(&mut byte)? {
            0 => Ok(None),
            _ => {
                self.current_line_no += 1;
                if byte[0] & 0x80 != 0 {
                    let (c, compressed) = binary::decode_opcode(byte[0])?;
                    Ok(Some((c, true, compressed)))
                } else {
                    Ok(Some((byte[0] as char, false, false)))
                }
            }
        }
    }

    /// Undo the 1-byte peek: both ASCII and binary peeks consume exactly
    /// one byte, so rewinding by one byte always suffices.
    fn push_back(&mut self) -> Result<()> {
        self.inner.seek(SeekFrom::Current(-1))?;
        self.current_line_no -= 1;
        Ok(())
    }

    fn def_for(&self, c: char) -> Option<LineTypeDef> {
        self.meta.get(&c).cloned().or_else(|| self.line_info.get(&c).map(|li| li.def.clone()))
    }

    fn codec_for(&self, c: char) -> Option<ListCodecState> {
        self.line_info.get(&c).and_then(|li| li.list_codec.clone())
    }

    fn finish_record(&mut self, c: char, is_binary: bool, compressed: bool) -> Result<Record> {
        let def = self.def_for(c).ok_or_else(|| self.perr(format!("unknown line type '{c}'")))?;
        if is_binary {
            let codec = self.codec_for(c);
            let offset = self.inner.stream_position().unwrap_or(0);
            binary::read(&mut self.inner, &def, compressed, codec.as_ref())
                .map_err(|e| OneError::binary(&self.path, offset, e.to_string()))
        } else {
            let mut buf = Vec::new();
            self.inner.read_until(b'\n', &mut buf)?;
            if buf.last() == Some(&b'\n') {
                buf.pop();
            }
            crate::ascii::parse(c, &buf, &def).map_err(|e| self.perr(e.to_string()))
        }
    }

    fn rebuild_line_info(&mut self) {
        for (c, def) in &self.schema_block.line_types {
            self.line_info.entry(*c).or_insert_with(|| LineInfo::new(def.clone()));
        }
    }

    fn merge_embedded_type(&mut self, def: LineTypeDef) -> Result<()> {
        if let Some(existing) = self.schema_block.line_types.get(&def.type_char) {
            if existing.fields != def.fields {
                return Err(OneError::schema_mismatch(format!(
                    "embedded schema for line type '{}' conflicts with the supplied schema",
                    def.type_char
                )));
            }
            return Ok(());
        }
        match (def.is_object, def.is_group) {
            (true, _) => self.schema_block.declare_object(def.type_char, def.fields, def.comment)?,
            (_, true) => self.schema_block.declare_group(def.type_char, def.fields, def.comment)?,
            _ => self.schema_block.declare_record(def.type_char, def.fields, def.comment)?,
        }
        self.rebuild_line_info();
        Ok(())
    }

    fn apply_given_count(&mut self, target: char, kind: char, value: i64) {
        if let Some(li) = self.line_info.get_mut(&target) {
            match kind {
                '#' => li.given.count = value,
                '@' => li.given.max = value,
                '+' => li.given.total = value,
                _ => {}
            }
        }
    }

    fn dispatch_header_record(&mut self, c: char, rec: Record) -> Result<()> {
        match c {
            '1' => {
                self.file_type = String::from_utf8_lossy(rec.list.as_bytes().unwrap_or(&[])).into_owned();
                self.major = rec.fields[1].as_int().unwrap_or(0) as u32;
                self.minor = rec.fields[2].as_int().unwrap_or(0) as u32;
                if self.major != MAJOR || self.minor > MINOR {
                    return Err(OneError::version(&self.path, self.major, self.minor));
                }
                if let Some(schema) = &self.external_schema {
                    match schema.find(&self.file_type) {
                        Some(block) => self.schema_block = block.clone(),
                        None => {
                            return Err(OneError::schema_mismatch(format!(
                                "supplied schema has no filetype block named '{}'",
                                self.file_type
                            )))
                        }
                    }
                } else {
                    self.schema_block = FiletypeBlock::new(self.file_type.clone());
                }
                self.rebuild_line_info();
            }
            '2' => self.subtype = Some(String::from_utf8_lossy(rec.list.as_bytes().unwrap_or(&[])).into_owned()),
            '!' => {
                let strs = rec.list.as_strings().ok_or_else(|| self.perr("malformed provenance record"))?;
                if strs.len() != 4 {
                    return Err(self.perr("provenance record must have 4 strings"));
                }
                self.provenance.push(Provenance {
                    program: String::from_utf8_lossy(&strs[0]).into_owned(),
                    version: String::from_utf8_lossy(&strs[1]).into_owned(),
                    command: String::from_utf8_lossy(&strs[2]).into_owned(),
                    date: String::from_utf8_lossy(&strs[3]).into_owned(),
                });
            }
            '<' => {
                let filename = String::from_utf8_lossy(rec.list.as_bytes().unwrap_or(&[])).into_owned();
                let count = rec.fields[1].as_int().unwrap_or(0);
                self.references.push(Reference { filename, count });
            }
            '>' => {
                let filename = String::from_utf8_lossy(rec.list.as_bytes().unwrap_or(&[])).into_owned();
                self.deferred.push(Deferred { filename });
            }
            '~' => {
                let target = rec.fields[0].as_char().ok_or_else(|| self.perr("bad '~' target char"))? as char;
                let directive = rec.fields[1].as_char().ok_or_else(|| self.perr("bad '~' directive char"))? as char;
                let names = rec.list.as_strings().ok_or_else(|| self.perr("malformed '~' field list"))?;
                let mut fields = Vec::with_capacity(names.len());
                for n in names {
                    let name = String::from_utf8_lossy(n);
                    fields.push(OneType::from_name(&name).ok_or_else(|| self.perr(format!("unknown field type '{name}'")))?);
                }
                let def = LineTypeDef {
                    type_char: target,
                    fields,
                    comment: rec.comment.map(|c| String::from_utf8_lossy(&c).into_owned()),
                    is_object: directive == 'O',
                    is_group: directive == 'G',
                };
                self.merge_embedded_type(def)?;
            }
            '.' => {
                if let Some(comment) = rec.comment {
                    self.header_text.push(String::from_utf8_lossy(&comment).into_owned());
                }
            }
            '#' | '@' | '+' => {
                let target = rec.fields[0].as_char().ok_or_else(|| self.perr("bad count-record char"))? as char;
                let value = rec.fields[1].as_int().ok_or_else(|| self.perr("bad count-record value"))?;
                self.apply_given_count(target, c, value);
            }
            '%' => { /* per-group given counts: informational only, not required for body parsing */ }
            ';' => {
                let target = rec.fields[0].as_char().ok_or_else(|| self.perr("bad codec target char"))? as char;
                let bytes = rec.list.as_bytes().ok_or_else(|| self.perr("malformed codec record"))?;
                let codec = HuffmanCodec::deserialize(bytes)?;
                if let Some(li) = self.line_info.get_mut(&target) {
                    li.list_codec = Some(ListCodecState::Huffman(codec));
                    li.is_use_list_codec = true;
                }
            }
            '&' => self.object_index = ObjectIndex(rec.list.as_ints().unwrap_or(&[]).iter().map(|&v| v as u64).collect()),
            '*' => self.group_index = GroupIndex(rec.list.as_ints().unwrap_or(&[]).to_vec()),
            '$' => {
                self.is_binary = true;
                self.is_file_big_endian = rec.fields[0].as_int().unwrap_or(0) == 1;
                self.jump_to_footer_and_back()?;
            }
            '^' | '-' => {}
            _ => {}
        }
        Ok(())
    }

    fn jump_to_footer_and_back(&mut self) -> Result<()> {
        let body_start = self.inner.stream_position()?;
        self.inner.seek(SeekFrom::End(-8))?;
        let mut raw = [0u8; 8];
        self.inner.read_exact(&mut raw)?;
        if self.is_file_big_endian != cfg!(target_endian = "big") {
            raw.reverse();
        }
        let footer_offset = u64::from_le_bytes(raw);
        // `footer_offset` names the blank line preceding the footer, per
        // ONElib-v1.c; that line also marks where the body ends.
        self.body_end = Some(footer_offset);
        self.inner.seek(SeekFrom::Start(footer_offset))?;
        let mut separator = [0u8; 1];
        self.inner.read_exact(&mut separator)?;

        loop {
            match self.peek_line_type()? {
                None => break,
                Some((c, is_bin, compressed)) => {
                    let rec = self.finish_record(c, is_bin, compressed)?;
                    if c == '^' {
                        break;
                    }
                    self.dispatch_header_record(c, rec)?;
                }
            }
        }
        self.inner.seek(SeekFrom::Start(body_start))?;
        Ok(())
    }

    fn read_header(&mut self) -> Result<()> {
        self.rebuild_line_info();
        loop {
            let Some((c, is_bin, compressed)) = self.peek_line_type()? else {
                self.state = State::Body;
                return Ok(());
            };
            if self.meta.contains_key(&c) {
                let rec = self.finish_record(c, is_bin, compressed)?;
                self.dispatch_header_record(c, rec)?;
                continue;
            }
            if self.line_info.contains_key(&c) {
                let rec = self.finish_record(c, is_bin, compressed)?;
                self.pending_first = Some(rec);
                self.state = State::Body;
                return Ok(());
            }
            return Err(self.perr(format!("line type '{c}' not declared by the file's schema")));
        }
    }

    /// True once the stream has reached the blank line separating the body
    /// from the footer (binary files only; always `false` for ASCII files).
    fn at_body_end(&mut self) -> Result<bool> {
        match self.body_end {
            Some(end) => Ok(self.inner.stream_position()? >= end),
            None => Ok(false),
        }
    }

    /// Read the next body record. Returns `None` at end of file. A
    /// trailing `/` comment record is absorbed onto the record it follows.
    pub fn read_line(&mut self) -> Result<Option<char>> {
        if self.state == State::Closed {
            return Err(OneError::logic("read_line called on a closed reader"));
        }

        let mut record = if let Some(rec) = self.pending_first.take() {
            rec
        } else if self.at_body_end()? {
            self.state = State::Closed;
            return Ok(None);
        } else {
            let Some((c, is_bin, compressed)) = self.peek_line_type()? else {
                self.state = State::Closed;
                return Ok(None);
            };
            self.finish_record(c, is_bin, compressed)?
        };

        loop {
            if self.at_body_end()? {
                break;
            }
            let Some((c, is_bin, compressed)) = self.peek_line_type()? else { break };
            if c != '/' {
                self.push_back()?;
                break;
            }
            let comment_rec = self.finish_record(c, is_bin, compressed)?;
            record.comment = comment_rec.list.as_bytes().map(|b| b.to_vec());
        }

        let list_len = self
            .line_info
            .get(&record.line_type)
            .and_then(|li| li.def.list_field_index())
            .and_then(|idx| record.fields.get(idx))
            .and_then(|f| f.as_int())
            .unwrap_or(0);
        let is_group_type = self.line_info.get(&record.line_type).map(|li| li.def.is_group).unwrap_or(false);
        if let Some(li) = self.line_info.get_mut(&record.line_type) {
            li.record_occurrence(list_len);
        }
        if is_group_type {
            for other in self.line_info.values_mut() {
                other.close_group_segment();
            }
        }

        let line_type = record.line_type;
        self.current = Some(record);
        Ok(Some(line_type))
    }

    /// The record most recently yielded by [`Reader::read_line`].
    pub fn current(&self) -> Option<&Record> {
        self.current.as_ref()
    }

    /// Seek to object `i` (0-based). The next `read_line` yields that
    /// object record. Only valid for binary files with a footer index.
    pub fn goto_object(&mut self, i: i64) -> Result<bool> {
        if !self.is_binary {
            return Err(OneError::logic("goto_object is only valid on binary files"));
        }
        let offset = self.object_index.offset_of(i)?;
        self.inner.seek(SeekFrom::Start(offset))?;
        self.pending_first = None;
        self.current = None;
        self.state = State::Body;
        Ok(true)
    }

    /// Seek to the first object of group `i`; returns that group's width
    /// (number of objects). Only valid for binary files with a footer index.
    pub fn goto_group(&mut self, i: i64) -> Result<i64> {
        if !self.is_binary {
            return Err(OneError::logic("goto_group is only valid on binary files"));
        }
        let (start, width) = self.group_index.group_at(i)?;
        self.goto_object(start)?;
        Ok(width)
    }

    /// The line type's accumulated counts so far (count/max/total).
    pub fn counts(&self, line_type: char) -> Option<(i64, i64, i64)> {
        self.line_info.get(&line_type).map(|li| (li.accum.count, li.accum.max, li.accum.total))
    }

    /// The line type's declared (header/footer) counts, if any were given.
    pub fn given_counts(&self, line_type: char) -> Option<(i64, i64, i64)> {
        self.line_info.get(&line_type).map(|li| (li.given.count, li.given.max, li.given.total))
    }

    /// This file's resolved schema: one block for [`Reader::file_type`],
    /// with every line type this file actually declares (inline `~` lines
    /// merged in). Used to open an output file that inherits an input's
    /// schema (`onecode view`'s copy/subset mode).
    pub fn schema(&self) -> Schema {
        Schema {
            blocks: vec![self.schema_block.clone()],
        }
    }

    /// Check `schema` against this file's own resolved schema. See
    /// [`onecode_schema::Schema::check_compatible`] for the compatibility
    /// rule; `required` controls whether a mismatch is fatal or merely
    /// reported back to the caller.
    pub fn check_schema(&self, schema: &Schema, required: bool) -> Result<()> {
        schema.check_compatible(&self.schema(), required)
    }

    /// Every non-meta line type this file's schema declares, in the same
    /// canonical order [`onecode_schema::FiletypeBlock::write_text`] uses.
    pub fn declared_line_types(&self) -> Vec<char> {
        self.schema_block.line_types.keys().copied().collect()
    }

    /// Current byte offset in the underlying stream; used by `onecode stat
    /// --usage` to tally per-line-type byte consumption between records.
    pub fn stream_position(&mut self) -> Result<u64> {
        Ok(self.inner.stream_position()?)
    }

    /// Consume and close the reader.
    pub fn close(mut self) -> Result<()> {
        self.state = State::Closed;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary;
    use crate::value::{FieldValue, ListValue};
    use onecode_schema::Schema;
    use std::io::Cursor;

    fn sample_schema() -> Schema {
        Schema::from_text("P 3 seq\nO A 1 3 INT\nD B 1 6 STRING\n").unwrap()
    }

    fn ascii_bytes(lines: &[&str]) -> Vec<u8> {
        let mut out = Vec::new();
        for l in lines {
            out.extend_from_slice(l.as_bytes());
            out.push(b'\n');
        }
        out
    }

    #[test]
    fn s1_reads_ascii_header_and_body() {
        let bytes = ascii_bytes(&["1 3 seq 1 0", "A 5", "A 7", "B 5 hello"]);
        let schema = sample_schema();
        let mut r = Reader::from_reader(PathBuf::from("<mem>"), Cursor::new(bytes), Some(&schema), None).unwrap();
        assert_eq!(r.file_type, "seq");
        assert_eq!(r.read_line().unwrap(), Some('A'));
        assert_eq!(r.current().unwrap().fields[0].as_int(), Some(5));
        assert_eq!(r.read_line().unwrap(), Some('A'));
        assert_eq!(r.read_line().unwrap(), Some('B'));
        assert_eq!(r.current().unwrap().list.as_bytes(), Some(&b"hello"[..]));
        assert_eq!(r.read_line().unwrap(), None);
    }

    #[test]
    fn check_schema_accepts_compatible_and_rejects_incompatible() {
        let bytes = ascii_bytes(&["1 3 seq 1 0", "A 5", "B 5 hello"]);
        let schema = sample_schema();
        let mut r = Reader::from_reader(PathBuf::from("<mem>"), Cursor::new(bytes), Some(&schema), None).unwrap();
        r.read_line().unwrap();

        assert!(r.check_schema(&schema, true).is_ok());

        let other = Schema::from_text("P 3 seq\nO A 1 6 STRING\n").unwrap();
        assert!(r.check_schema(&other, true).is_err());
        assert!(r.check_schema(&other, false).unwrap_err().is_recoverable());
    }

    #[test]
    fn trailing_comment_attaches_to_preceding_record() {
        let bytes = ascii_bytes(&["1 3 seq 1 0", "A 5", "/ 9 a comment"]);
        let schema = sample_schema();
        let mut r = Reader::from_reader(PathBuf::from("<mem>"), Cursor::new(bytes), Some(&schema), None).unwrap();
        assert_eq!(r.read_line().unwrap(), Some('A'));
        assert_eq!(r.current().unwrap().comment.as_deref(), Some(&b"a comment"[..]));
        assert_eq!(r.read_line().unwrap(), None);
    }

    #[test]
    fn s2_reads_binary_header_footer_and_index() {
        let def_a = LineTypeDef {
            type_char: 'A',
            fields: vec![OneType::Int],
            comment: None,
            is_object: true,
            is_group: false,
        };

        let mut body = Vec::new();
        let rec0 = Record {
            line_type: 'A',
            fields: vec![FieldValue::Int(10)],
            list: ListValue::None,
            comment: None,
        };
        let rec1 = Record {
            line_type: 'A',
            fields: vec![FieldValue::Int(20)],
            list: ListValue::None,
            comment: None,
        };
        let off0 = body.len() as u64;
        binary::write(&mut body, &rec0, &def_a, None, false).unwrap();
        let off1 = body.len() as u64;
        binary::write(&mut body, &rec1, &def_a, None, false).unwrap();

        let mut file = Vec::new();
        file.extend_from_slice(b"1 3 seq 1 0\n");
        file.extend_from_slice(b"~ A O 1 3 INT\n");
        file.extend_from_slice(b"$ 0\n");
        let body_start = file.len() as u64;
        file.extend_from_slice(&body);

        let footer_offset = file.len() as u64;
        file.extend_from_slice(b"\n");
        file.extend_from_slice(b"# A 2\n");
        let idx_rec = Record {
            line_type: '&',
            fields: vec![FieldValue::Int(2)],
            list: ListValue::Ints(vec![(body_start + off0) as i64, (body_start + off1) as i64]),
            comment: None,
        };
        let idx_def = LineTypeDef {
            type_char: '&',
            fields: vec![OneType::IntList],
            comment: None,
            is_object: false,
            is_group: false,
        };
        binary::write(&mut file, &idx_rec, &idx_def, None, false).unwrap();
        file.extend_from_slice(b"^\n");
        file.extend_from_slice(&footer_offset.to_le_bytes());

        let mut r = Reader::from_reader(PathBuf::from("<mem>"), Cursor::new(file), None, Some("seq")).unwrap();
        assert!(r.is_binary);
        assert_eq!(r.read_line().unwrap(), Some('A'));
        assert_eq!(r.current().unwrap().fields[0].as_int(), Some(10));
        assert_eq!(r.read_line().unwrap(), Some('A'));
        assert_eq!(r.current().unwrap().fields[0].as_int(), Some(20));
        assert_eq!(r.read_line().unwrap(), None);

        assert!(r.goto_object(0).unwrap());
        assert_eq!(r.read_line().unwrap(), Some('A'));
        assert_eq!(r.current().unwrap().fields[0].as_int(), Some(10));
        assert_eq!(r.given_counts('A'), Some((2, 0, 0)));
    }
}
