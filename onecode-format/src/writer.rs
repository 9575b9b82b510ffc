//! The container writer state machine: **open** → **body** →
//! **finalising** → **closed**. A [`Writer`] buffers every body record (and
//! the header metadata accumulated alongside it) in memory and defers all
//! sink I/O to [`Writer::close`], which renders the header, copies the
//! buffered body, and — for binary files — appends the footer and its
//! trailing offset. This sidesteps rewriting a variable-width ASCII header
//! in place once final counts are known, and lets the binary and ASCII
//! paths share one record-encoding path all the way through.
//!
//! Header records (`1`, `2`, `!`, `<`, `>`, `~`, `.`, and the count lines)
//! are always ASCII text, even in a binary file — only the body, plus the
//! footer's codec tables and indexes, switch to binary encoding once the
//! `$` marker is written. This mirrors [`crate::reader::Reader`]'s own
//! per-record dispatch, which decides ASCII vs. binary by peeking each
//! record's leading byte rather than by a file-wide mode switch.
//!
//! A binary body is followed by a single blank line before the footer
//! begins; the trailing 8-byte offset names that blank line, not the first
//! footer record. [`crate::reader::Reader`] uses it as the body's end
//! boundary so a plain `read_line` loop stops there instead of wandering
//! into the footer's own records. The object index recorded while writing
//! is body-relative (the body is buffered before the header's final length
//! is known) and gets rebased to absolute file offsets here at `close`,
//! the same way [`crate::parallel::merge_and_write`] rebases each sibling's.

use crate::ascii;
use crate::binary;
use crate::index::{GroupIndex, ObjectIndex};
use crate::line_info::{ListCodecState, LineInfo, DEFAULT_CODEC_TRAINING_SIZE};
use crate::parallel::Fanout;
use crate::provenance::{Deferred, Provenance, Reference};
use crate::value::{FieldValue, ListValue, Record};
use onecode_core::error::{OneError, Result};
use onecode_schema::{bootstrap, FiletypeBlock, LineTypeDef, OneType, Schema, MAJOR, MINOR};
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

/// Writer lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Finalising,
    Closed,
}

/// An open container file for writing.
pub struct Writer<W> {
    sink: W,
    state: State,
    meta: HashMap<char, LineTypeDef>,
    schema_block: FiletypeBlock,
    line_info: HashMap<char, LineInfo>,

    file_type: String,
    subtype: Option<String>,
    is_binary: bool,
    header_text: Vec<String>,
    provenance: Vec<Provenance>,
    references: Vec<Reference>,
    deferred: Vec<Deferred>,
    /// Once a body record has been written, header-only fields are locked.
    body_started: bool,
    /// If set on an ASCII writer, `close` emits no header at all.
    no_ascii_header: bool,

    body: Vec<u8>,
    object_index: ObjectIndex,
    group_index: GroupIndex,

    fanout: Option<Arc<Fanout>>,
}

impl<W: Write> Writer<W> {
    /// Open a writer for `file_type` against `schema`, writing into `sink`.
    /// `schema` must declare a filetype block named `file_type`.
    pub fn new(sink: W, schema: &Schema, file_type: &str, subtype: Option<&str>, is_binary: bool) -> Result<Self> {
        Self::with_fanout_opt(sink, schema, file_type, subtype, is_binary, None)
    }

    /// Open a writer whose per-line-type Huffman training is coordinated
    /// through `fanout` rather than trained locally.
    pub fn with_fanout(sink: W, schema: &Schema, file_type: &str, subtype: Option<&str>, is_binary: bool, fanout: Arc<Fanout>) -> Result<Self> {
        Self::with_fanout_opt(sink, schema, file_type, subtype, is_binary, Some(fanout))
    }

    fn with_fanout_opt(
        sink: W,
        schema: &Schema,
        file_type: &str,
        subtype: Option<&str>,
        is_binary: bool,
        fanout: Option<Arc<Fanout>>,
    ) -> Result<Self> {
        let schema_block = schema
            .find(file_type)
            .cloned()
            .ok_or_else(|| OneError::schema_mismatch(format!("schema has no filetype block named '{file_type}'")))?;
        let line_info = rebuild_line_info(&schema_block);
        Ok(Writer {
            sink,
            state: State::Open,
            meta: bootstrap::header_footer_info(),
            schema_block,
            line_info,
            file_type: file_type.to_string(),
            subtype: subtype.map(str::to_string),
            is_binary,
            header_text: Vec::new(),
            provenance: Vec::new(),
            references: Vec::new(),
            deferred: Vec::new(),
            body_started: false,
            no_ascii_header: false,
            body: Vec::new(),
            object_index: ObjectIndex::default(),
            group_index: GroupIndex::default(),
            fanout,
        })
    }

    /// Suppress the ASCII header entirely on close. No-op for
    /// binary writers, which always need the `$` marker and footer.
    pub fn set_no_ascii_header(&mut self, value: bool) {
        self.no_ascii_header = value;
    }

    fn require_header_open(&self) -> Result<()> {
        if self.state != State::Open {
            return Err(OneError::logic("writer is not open"));
        }
        if self.body_started {
            return Err(OneError::logic("cannot add header metadata after the first body record"));
        }
        Ok(())
    }

    /// Record one `!` provenance entry. Must precede the first body record.
    pub fn add_provenance(&mut self, program: &str, version: &str, command: &str, date: &str) -> Result<()> {
        self.require_header_open()?;
        self.provenance.push(Provenance {
            program: program.to_string(),
            version: version.to_string(),
            command: command.to_string(),
            date: date.to_string(),
        });
        Ok(())
    }

    /// Record one `<` reference entry. Must precede the first body record.
    pub fn add_reference(&mut self, filename: &str, count: i64) -> Result<()> {
        self.require_header_open()?;
        self.references.push(Reference {
            filename: filename.to_string(),
            count,
        });
        Ok(())
    }

    /// Record one `>` deferred-reference entry. Must precede the first body record.
    pub fn add_deferred(&mut self, filename: &str) -> Result<()> {
        self.require_header_open()?;
        self.deferred.push(Deferred { filename: filename.to_string() });
        Ok(())
    }

    /// Copy every provenance entry of `src` onto this writer, in order.
    /// Must precede the first body record.
    pub fn inherit_provenance(&mut self, src: &[Provenance]) -> Result<()> {
        for p in src {
            self.add_provenance(&p.program, &p.version, &p.command, &p.date)?;
        }
        Ok(())
    }

    /// Copy every reference entry of `src` onto this writer, in order.
    /// Must precede the first body record.
    pub fn inherit_reference(&mut self, src: &[Reference]) -> Result<()> {
        for r in src {
            self.add_reference(&r.filename, r.count)?;
        }
        Ok(())
    }

    /// Copy every deferred-reference entry of `src` onto this writer, in
    /// order. Must precede the first body record.
    pub fn inherit_deferred(&mut self, src: &[Deferred]) -> Result<()> {
        for d in src {
            self.add_deferred(&d.filename)?;
        }
        Ok(())
    }

    /// Append one line of free-form header text (a `.` record). Must
    /// precede the first body record.
    pub fn add_header_text(&mut self, text: &str) -> Result<()> {
        self.require_header_open()?;
        self.header_text.push(text.to_string());
        Ok(())
    }

    /// Write one body record. `fields` must match the line type's declared
    /// signature; the list-like field's length is computed from `list` and
    /// overwrites whatever `fields` supplied at that position.
    pub fn write_line(&mut self, line_type: char, mut fields: Vec<FieldValue>, list: ListValue) -> Result<()> {
        if self.state != State::Open {
            return Err(OneError::logic("writer is not open"));
        }
        let def = self
            .line_info
            .get(&line_type)
            .map(|li| li.def.clone())
            .ok_or_else(|| OneError::logic(format!("line type '{line_type}' not declared by this file's schema")))?;
        if fields.len() != def.fields.len() {
            return Err(OneError::logic(format!(
                "line type '{line_type}' expects {} fields, got {}",
                def.fields.len(),
                fields.len()
            )));
        }

        let list_idx = def.list_field_index();
        if let Some(i) = list_idx {
            fields[i] = FieldValue::Int(list.len() as i64);
        }
        let record = Record {
            line_type,
            fields,
            list,
            comment: None,
        };
        let list_len = list_idx.and_then(|i| record.fields.get(i)).and_then(|f| f.as_int()).unwrap_or(0);

        if def.is_object {
            self.object_index.0.push(self.body.len() as u64);
        }
        if def.is_group {
            self.group_index.0.push(self.object_index.0.len() as i64);
        }

        {
            let Writer { line_info, body, .. } = self;
            let li = line_info.get(&line_type).expect("looked up above");
            if self.is_binary {
                binary::write(body, &record, &def, li.list_codec.as_ref(), li.is_use_list_codec)?;
            } else {
                ascii::write(body, &record, list_idx)?;
            }
        }

        let li = self.line_info.get_mut(&line_type).expect("looked up above");
        li.record_occurrence(list_len);
        if def.is_group {
            for other in self.line_info.values_mut() {
                other.close_group_segment();
            }
        }

        if self.is_binary {
            if let Some(bytes) = trainable_bytes(&def, &record.list) {
                self.train(line_type, &bytes)?;
            }
        }

        self.body_started = true;
        Ok(())
    }

    fn train(&mut self, line_type: char, bytes: &[u8]) -> Result<()> {
        match self.fanout.clone() {
            Some(fanout) => {
                if let Some(codec) = fanout.train(line_type, bytes)? {
                    if let Some(li) = self.line_info.get_mut(&line_type) {
                        li.list_codec = Some(ListCodecState::Huffman(codec));
                        li.is_use_list_codec = true;
                    }
                }
            }
            None => {
                if let Some(li) = self.line_info.get_mut(&line_type) {
                    li.train(bytes, DEFAULT_CODEC_TRAINING_SIZE);
                }
            }
        }
        Ok(())
    }

    /// Attach a standalone `/` comment record right after the last body
    /// record written.
    pub fn write_comment(&mut self, text: &[u8]) -> Result<()> {
        if self.state != State::Open {
            return Err(OneError::logic("writer is not open"));
        }
        let def = self.meta[&'/'].clone();
        let record = Record {
            line_type: '/',
            fields: vec![FieldValue::Int(text.len() as i64)],
            list: ListValue::Bytes(text.to_vec()),
            comment: None,
        };
        if self.is_binary {
            binary::write(&mut self.body, &record, &def, None, false)?;
        } else {
            ascii::write(&mut self.body, &record, def.list_field_index())?;
        }
        self.body_started = true;
        Ok(())
    }

    /// Split this writer into its buffered parts for a parallel merge
    /// discarding its own (never-used) sink.
    pub fn into_parts(mut self) -> SiblingParts {
        self.state = State::Closed;
        SiblingParts {
            schema_block: self.schema_block,
            file_type: self.file_type,
            subtype: self.subtype,
            is_binary: self.is_binary,
            header_text: self.header_text,
            provenance: self.provenance,
            references: self.references,
            deferred: self.deferred,
            line_info: self.line_info,
            object_index: self.object_index,
            group_index: self.group_index,
            body: self.body,
        }
    }

    /// Render the header (and, for binary files, the footer) and flush
    /// everything to the sink, consuming the writer.
    pub fn close(mut self) -> Result<W> {
        if self.state == State::Closed {
            return Err(OneError::logic("writer already closed"));
        }
        self.state = State::Finalising;
        if self.schema_block.group_type.is_some() && self.group_index.0.last() != Some(&(self.object_index.0.len() as i64)) {
            self.group_index.0.push(self.object_index.0.len() as i64);
        }

        let header = if self.no_ascii_header && !self.is_binary {
            Vec::new()
        } else {
            render_header(
                &self.schema_block,
                &self.meta,
                &self.file_type,
                self.subtype.as_deref(),
                self.is_binary,
                &self.provenance,
                &self.references,
                &self.deferred,
                &self.header_text,
                &self.line_info,
            )?
        };
        self.sink.write_all(&header)?;
        self.sink.write_all(&self.body)?;

        if self.is_binary {
            // Object offsets accumulated in `write_line` are body-relative
            // (the body is buffered in isolation until now); rebase them to
            // absolute file offsets before they go into the footer index,
            // matching what `parallel::merge_and_write` already does for
            // each sibling's contribution.
            let footer_start = (header.len() + self.body.len()) as u64;
            let object_index = ObjectIndex(self.object_index.0.iter().map(|&off| off + header.len() as u64).collect());
            self.sink.write_all(b"\n")?;
            let footer = render_footer(&self.meta, &self.line_info, &self.schema_block, &object_index, &self.group_index)?;
            self.sink.write_all(&footer)?;
            self.sink.write_all(&footer_start.to_le_bytes())?;
        }

        self.state = State::Closed;
        Ok(self.sink)
    }
}

/// One sibling writer's buffered output, ready for [`crate::parallel`] to
/// rebase and concatenate with the others.
pub struct SiblingParts {
    pub(crate) schema_block: FiletypeBlock,
    pub(crate) file_type: String,
    pub(crate) subtype: Option<String>,
    pub(crate) is_binary: bool,
    pub(crate) header_text: Vec<String>,
    pub(crate) provenance: Vec<Provenance>,
    pub(crate) references: Vec<Reference>,
    pub(crate) deferred: Vec<Deferred>,
    pub(crate) line_info: HashMap<char, LineInfo>,
    pub(crate) object_index: ObjectIndex,
    pub(crate) group_index: GroupIndex,
    pub(crate) body: Vec<u8>,
}

fn rebuild_line_info(schema_block: &FiletypeBlock) -> HashMap<char, LineInfo> {
    schema_block.line_types.iter().map(|(c, def)| (*c, LineInfo::new(def.clone()))).collect()
}

/// Huffman-trainable raw bytes for a record's list, if its declared type
/// uses the Huffman codec (`STRING`, `REAL_LIST`; never `INT_LIST`,
/// `STRING_LIST` or `DNA`, per [`OneType::uses_huffman_codec`]).
fn trainable_bytes(def: &LineTypeDef, list: &ListValue) -> Option<Vec<u8>> {
    let ty = def.list_field_type()?;
    if !ty.uses_huffman_codec() {
        return None;
    }
    match (ty, list) {
        (OneType::String, ListValue::Bytes(b)) => Some(b.clone()),
        (OneType::RealList, ListValue::Reals(v)) => Some(v.iter().flat_map(|r| r.to_le_bytes()).collect()),
        _ => None,
    }
}

fn ascii_record<W: Write>(w: &mut W, def: &LineTypeDef, fields: Vec<FieldValue>, list: ListValue, comment: Option<Vec<u8>>) -> Result<()> {
    let record = Record {
        line_type: def.type_char,
        fields,
        list,
        comment,
    };
    ascii::write(w, &record, def.list_field_index())
}

/// Canonical `~` emission order for one filetype block's embedded schema:
/// group type, lowercase records, object type, uppercase records — matching
/// [`FiletypeBlock::write_text`]'s canonical export order.
fn tilde_order(block: &FiletypeBlock) -> Vec<char> {
    let mut out = Vec::with_capacity(block.line_types.len());
    if let Some(c) = block.group_type {
        out.push(c);
    }
    for c in 'a'..='z' {
        if Some(c) != block.group_type && Some(c) != block.object_type && block.line_types.contains_key(&c) {
            out.push(c);
        }
    }
    if let Some(c) = block.object_type {
        out.push(c);
    }
    for c in 'A'..='Z' {
        if Some(c) != block.object_type && block.line_types.contains_key(&c) {
            out.push(c);
        }
    }
    out
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn render_header(
    schema_block: &FiletypeBlock,
    meta: &HashMap<char, LineTypeDef>,
    file_type: &str,
    subtype: Option<&str>,
    is_binary: bool,
    provenance: &[Provenance],
    references: &[Reference],
    deferred: &[Deferred],
    header_text: &[String],
    line_info: &HashMap<char, LineInfo>,
) -> Result<Vec<u8>> {
    let mut out = Vec::new();

    ascii_record(
        &mut out,
        &meta[&'1'],
        vec![FieldValue::Int(file_type.len() as i64), FieldValue::Int(MAJOR as i64), FieldValue::Int(MINOR as i64)],
        ListValue::Bytes(file_type.as_bytes().to_vec()),
        None,
    )?;
    if let Some(sub) = subtype {
        ascii_record(&mut out, &meta[&'2'], vec![FieldValue::Int(sub.len() as i64)], ListValue::Bytes(sub.as_bytes().to_vec()), None)?;
    }

    for p in provenance {
        ascii_record(
            &mut out,
            &meta[&'!'],
            vec![FieldValue::Int(4)],
            ListValue::Strings(vec![
                p.program.as_bytes().to_vec(),
                p.version.as_bytes().to_vec(),
                p.command.as_bytes().to_vec(),
                p.date.as_bytes().to_vec(),
            ]),
            None,
        )?;
    }
    for r in references {
        ascii_record(
            &mut out,
            &meta[&'<'],
            vec![FieldValue::Int(r.filename.len() as i64), FieldValue::Int(r.count)],
            ListValue::Bytes(r.filename.as_bytes().to_vec()),
            None,
        )?;
    }
    for d in deferred {
        ascii_record(&mut out, &meta[&'>'], vec![FieldValue::Int(d.filename.len() as i64)], ListValue::Bytes(d.filename.as_bytes().to_vec()), None)?;
    }

    for c in tilde_order(schema_block) {
        let def = &schema_block.line_types[&c];
        let directive = if def.is_group {
            b'G'
        } else if def.is_object {
            b'O'
        } else {
            b'D'
        };
        let names: Vec<Vec<u8>> = def.fields.iter().map(|f| f.name().as_bytes().to_vec()).collect();
        ascii_record(
            &mut out,
            &meta[&'~'],
            vec![FieldValue::Char(c as u8), FieldValue::Char(directive), FieldValue::Int(names.len() as i64)],
            ListValue::Strings(names),
            def.comment.as_ref().map(|s| s.as_bytes().to_vec()),
        )?;
    }

    for text in header_text {
        ascii_record(&mut out, &meta[&'.'], vec![], ListValue::None, Some(text.as_bytes().to_vec()))?;
    }

    if is_binary {
        ascii_record(&mut out, &meta[&'$'], vec![FieldValue::Int(0)], ListValue::None, None)?;
    } else {
        write_counts(&mut out, meta, schema_block, line_info)?;
    }

    Ok(out)
}

fn write_counts<W: Write>(w: &mut W, meta: &HashMap<char, LineTypeDef>, schema_block: &FiletypeBlock, line_info: &HashMap<char, LineInfo>) -> Result<()> {
    for c in schema_block.line_types.keys() {
        let Some(li) = line_info.get(c) else { continue };
        if li.accum.count == 0 {
            continue;
        }
        ascii_record(w, &meta[&'#'], vec![FieldValue::Char(*c as u8), FieldValue::Int(li.accum.count)], ListValue::None, None)?;
        if li.accum.max > 0 {
            ascii_record(w, &meta[&'@'], vec![FieldValue::Char(*c as u8), FieldValue::Int(li.accum.max)], ListValue::None, None)?;
        }
        if li.accum.total > 0 {
            ascii_record(w, &meta[&'+'], vec![FieldValue::Char(*c as u8), FieldValue::Int(li.accum.total)], ListValue::None, None)?;
        }
    }
    if let Some(group_char) = schema_block.group_type {
        for c in schema_block.line_types.keys() {
            if Some(*c) == schema_block.group_type {
                continue;
            }
            let Some(li) = line_info.get(c) else { continue };
            if li.group_max_count > 0 {
                ascii_record(
                    w,
                    &meta[&'%'],
                    vec![FieldValue::Char(group_char as u8), FieldValue::Char(b'#'), FieldValue::Char(*c as u8), FieldValue::Int(li.group_max_count)],
                    ListValue::None,
                    None,
                )?;
            }
            if li.group_max_total > 0 {
                ascii_record(
                    w,
                    &meta[&'%'],
                    vec![FieldValue::Char(group_char as u8), FieldValue::Char(b'+'), FieldValue::Char(*c as u8), FieldValue::Int(li.group_max_total)],
                    ListValue::None,
                    None,
                )?;
            }
        }
    }
    Ok(())
}

pub(crate) fn render_footer(
    meta: &HashMap<char, LineTypeDef>,
    line_info: &HashMap<char, LineInfo>,
    schema_block: &FiletypeBlock,
    object_index: &ObjectIndex,
    group_index: &GroupIndex,
) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    write_counts(&mut out, meta, schema_block, line_info)?;

    for (c, li) in line_info {
        if let (true, Some(ListCodecState::Huffman(codec))) = (li.is_use_list_codec, &li.list_codec) {
            let bytes = codec.serialize();
            let rec = Record {
                line_type: ';',
                fields: vec![FieldValue::Char(*c as u8), FieldValue::Int(bytes.len() as i64)],
                list: ListValue::Bytes(bytes),
                comment: None,
            };
            binary::write(&mut out, &rec, &meta[&';'], None, false)?;
        }
    }

    if !object_index.0.is_empty() {
        let rec = Record {
            line_type: '&',
            fields: vec![FieldValue::Int(object_index.0.len() as i64)],
            list: ListValue::Ints(object_index.0.iter().map(|&v| v as i64).collect()),
            comment: None,
        };
        binary::write(&mut out, &rec, &meta[&'&'], None, false)?;
    }
    if !group_index.0.is_empty() {
        let rec = Record {
            line_type: '*',
            fields: vec![FieldValue::Int(group_index.0.len() as i64)],
            list: ListValue::Ints(group_index.0.clone()),
            comment: None,
        };
        binary::write(&mut out, &rec, &meta[&'*'], None, false)?;
    }

    ascii_record(&mut out, &meta[&'^'], vec![], ListValue::None, None)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use onecode_schema::Schema;

    fn sample_schema() -> Schema {
        Schema::from_text("P 3 seq\nO A 1 3 INT\nD B 1 6 STRING\n").unwrap()
    }

    #[test]
    fn s1_writes_ascii_round_trip() {
        let schema = sample_schema();
        let mut w = Writer::new(Vec::new(), &schema, "seq", None, false).unwrap();
        w.write_line('A', vec![FieldValue::Int(0)], ListValue::None).unwrap();
        w.write_line('A', vec![FieldValue::Int(0)], ListValue::None).unwrap();
        w.write_line('B', vec![FieldValue::Int(0)], ListValue::Bytes(b"hello".to_vec())).unwrap();
        let bytes = w.close().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("1 3 seq 1 1\n"));
        assert!(text.contains("B 5 hello"));
        assert!(text.contains("# A 2"));
    }

    #[test]
    fn s2_writes_binary_with_footer_index() {
        let schema = sample_schema();
        let mut w = Writer::new(Vec::new(), &schema, "seq", None, true).unwrap();
        w.write_line('A', vec![FieldValue::Int(10)], ListValue::None).unwrap();
        w.write_line('A', vec![FieldValue::Int(20)], ListValue::None).unwrap();
        let bytes = w.close().unwrap();

        let mut r = crate::reader::Reader::from_reader(std::path::PathBuf::from("<mem>"), std::io::Cursor::new(bytes), None, Some("seq")).unwrap();
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

    #[test]
    fn object_index_offsets_are_absolute_and_body_stops_before_footer() {
        let schema = sample_schema();
        let mut w = Writer::new(Vec::new(), &schema, "seq", None, true).unwrap();
        w.add_provenance("onecode", "0.1.0", "onecode test", "2026-01-01").unwrap();
        w.write_line('A', vec![FieldValue::Int(10)], ListValue::None).unwrap();
        w.write_line('A', vec![FieldValue::Int(20)], ListValue::None).unwrap();
        let bytes = w.close().unwrap();

        // The header (version line + provenance + schema + `$` marker) is
        // non-empty, so a body-relative offset of 0 would land inside it.
        let mut r = crate::reader::Reader::from_reader(std::path::PathBuf::from("<mem>"), std::io::Cursor::new(bytes.clone()), None, Some("seq")).unwrap();
        assert!(r.goto_object(0).unwrap());
        assert_eq!(r.read_line().unwrap(), Some('A'));
        assert_eq!(r.current().unwrap().fields[0].as_int(), Some(10));

        // Sequential read must stop at end of body, never peeking into the
        // footer's `#`/`&`/`^` records or the trailing 8-byte offset.
        let mut r2 = crate::reader::Reader::from_reader(std::path::PathBuf::from("<mem>"), std::io::Cursor::new(bytes), None, Some("seq")).unwrap();
        let mut seen = Vec::new();
        while let Some(c) = r2.read_line().unwrap() {
            seen.push(c);
        }
        assert_eq!(seen, vec!['A', 'A']);
    }

    #[test]
    fn header_metadata_locks_after_first_body_record() {
        let schema = sample_schema();
        let mut w = Writer::new(Vec::new(), &schema, "seq", None, false).unwrap();
        w.add_provenance("onecode", "0.1.0", "onecode test", "2026-01-01").unwrap();
        w.write_line('A', vec![FieldValue::Int(0)], ListValue::None).unwrap();
        assert!(w.add_provenance("late", "1.0", "late", "later").is_err());
    }

    #[test]
    fn inherit_copies_provenance_reference_and_deferred() {
        let schema = sample_schema();
        let mut w = Writer::new(Vec::new(), &schema, "seq", None, false).unwrap();
        w.inherit_provenance(&[Provenance {
            program: "onecode".into(),
            version: "0.1.0".into(),
            command: "onecode test".into(),
            date: "2026-01-01".into(),
        }])
        .unwrap();
        w.inherit_reference(&[Reference {
            filename: "in.1seq".into(),
            count: 3,
        }])
        .unwrap();
        w.inherit_deferred(&[Deferred { filename: "out.1seq".into() }]).unwrap();
        w.write_line('A', vec![FieldValue::Int(0)], ListValue::None).unwrap();
        let bytes = w.close().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("! 4 7 onecode"));
        assert!(text.contains("< 7 in.1seq 3"));
        assert!(text.contains("> 8 out.1seq"));
    }

    #[test]
    fn no_ascii_header_suppresses_header_entirely() {
        let schema = sample_schema();
        let mut w = Writer::new(Vec::new(), &schema, "seq", None, false).unwrap();
        w.set_no_ascii_header(true);
        w.write_line('A', vec![FieldValue::Int(0)], ListValue::None).unwrap();
        let bytes = w.close().unwrap();
        assert_eq!(bytes, b"A 0\n");
    }

    #[test]
    fn unknown_line_type_is_rejected() {
        let schema = sample_schema();
        let mut w = Writer::new(Vec::new(), &schema, "seq", None, false).unwrap();
        assert!(w.write_line('Z', vec![], ListValue::None).is_err());
    }
}
