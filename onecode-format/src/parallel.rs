//! Parallel multi-writer fan-out: `n` sibling writers share
//! Huffman codec training through a small amount of [`Mutex`]-guarded
//! state, then hand their buffered output to [`merge_and_write`], which
//! rebases each sibling's object/group index by the byte length and object
//! count of every sibling before it and concatenates their bodies in order.

use crate::index::{GroupIndex, ObjectIndex};
use crate::line_info::DEFAULT_CODEC_TRAINING_SIZE;
use crate::writer::{render_footer, render_header, SiblingParts, Writer};
use onecode_core::error::{OneError, Result};
use onecode_huffman::HuffmanCodec;
use onecode_schema::Schema;
use rayon::prelude::*;
use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};

enum SharedCodec {
    Training(HuffmanCodec, u64),
    Built(HuffmanCodec),
}

/// Coordinates Huffman codec training across sibling writers opened by
/// [`write_parallel`]. Every sibling forwards its list bytes here instead
/// of training a private codec; once the shared histogram for a line type
/// crosses [`crate::line_info::DEFAULT_CODEC_TRAINING_SIZE`], the table is
/// built once and handed to every caller from then on.
pub struct Fanout {
    shared: Mutex<HashMap<char, SharedCodec>>,
    threshold: u64,
}

impl Fanout {
    /// A fresh coordinator with the default training threshold.
    pub fn new() -> Arc<Self> {
        Self::with_threshold(DEFAULT_CODEC_TRAINING_SIZE)
    }

    /// A fresh coordinator that builds its tables once `threshold` list
    /// bytes have been seen for a line type.
    pub fn with_threshold(threshold: u64) -> Arc<Self> {
        Arc::new(Self {
            shared: Mutex::new(HashMap::new()),
            threshold,
        })
    }

    /// Forward `bytes` to the shared histogram for `line_type`. Returns the
    /// built codec once training is complete, `None` while still training.
    /// No-op (beyond returning the already-built codec) once built.
    pub fn train(&self, line_type: char, bytes: &[u8]) -> Result<Option<HuffmanCodec>> {
        let mut guard = self.shared.lock().map_err(|_| OneError::logic("fanout codec lock poisoned"))?;
        let entry = guard.entry(line_type).or_insert_with(|| SharedCodec::Training(HuffmanCodec::new(), 0));
        match entry {
            SharedCodec::Built(codec) => Ok(Some(codec.clone())),
            SharedCodec::Training(codec, tally) => {
                codec.add_sample(bytes)?;
                *tally += bytes.len() as u64;
                if *tally > self.threshold {
                    codec.build(true)?;
                    let built = codec.clone();
                    *entry = SharedCodec::Built(built.clone());
                    Ok(Some(built))
                } else {
                    Ok(None)
                }
            }
        }
    }
}

/// Open `n` sibling writers sharing one [`Fanout`], run `work` against each
/// (by index), then merge and flush them to `sink` in sibling order.
///
/// `work` is called once per sibling, concurrently; a sibling that returns
/// `Err` aborts the whole fan-out once every thread has finished (matching
/// the non-parallel [`Writer::write_line`]'s own fail-fast behaviour, just
/// deferred to a join point).
pub fn write_parallel<W, F>(sink: W, schema: &Schema, file_type: &str, subtype: Option<&str>, is_binary: bool, n: usize, work: F) -> Result<W>
where
    W: Write,
    F: Fn(usize, &mut Writer<Vec<u8>>) -> Result<()> + Sync,
{
    let fanout = Fanout::new();
    let mut writers = Vec::with_capacity(n);
    for _ in 0..n {
        writers.push(Writer::with_fanout(Vec::new(), schema, file_type, subtype, is_binary, fanout.clone())?);
    }

    // Each sibling's work is independent aside from the shared `fanout`
    // handle, so the fan-out itself is a plain `par_iter` map, the same
    // shape as a block-parallel compressor: heavy per-item work runs
    // concurrently, the sequential part (concatenation) happens after.
    let results: Vec<Result<Writer<Vec<u8>>>> = writers
        .into_par_iter()
        .enumerate()
        .map(|(i, mut w)| work(i, &mut w).map(|_| w))
        .collect();

    let mut parts = Vec::with_capacity(results.len());
    for (i, r) in results.into_iter().enumerate() {
        match r {
            Ok(w) => parts.push(w.into_parts()),
            Err(e) => return Err(OneError::logic(format!("sibling writer {i} failed: {e}"))),
        }
    }
    merge_and_write(sink, parts)
}

/// Rebase and concatenate the buffered output of `parts` (in order) into
/// one finished container written to `sink`.
pub fn merge_and_write<W: Write>(mut sink: W, parts: Vec<SiblingParts>) -> Result<W> {
    let primary = parts.first().ok_or_else(|| OneError::logic("write_parallel needs at least one sibling"))?;
    let is_binary = primary.is_binary;
    let schema_block = primary.schema_block.clone();
    let meta = onecode_schema::bootstrap::header_footer_info();

    let mut merged = HashMap::new();
    for (c, def) in &schema_block.line_types {
        merged.insert(*c, crate::line_info::LineInfo::new(def.clone()));
    }
    for part in &parts {
        for (c, li) in &part.line_info {
            let m = merged.get_mut(c).expect("sibling schema matches primary");
            m.accum.count += li.accum.count;
            m.accum.total += li.accum.total;
            if li.accum.max > m.accum.max {
                m.accum.max = li.accum.max;
            }
            if li.group_max_count > m.group_max_count {
                m.group_max_count = li.group_max_count;
            }
            if li.group_max_total > m.group_max_total {
                m.group_max_total = li.group_max_total;
            }
            if li.is_use_list_codec && !m.is_use_list_codec {
                m.list_codec = li.list_codec.clone();
                m.is_use_list_codec = true;
            }
        }
    }

    let header = render_header(
        &schema_block,
        &meta,
        &primary.file_type,
        primary.subtype.as_deref(),
        is_binary,
        &primary.provenance,
        &primary.references,
        &primary.deferred,
        &primary.header_text,
        &merged,
    )?;
    sink.write_all(&header)?;

    let mut object_index = ObjectIndex::default();
    let mut group_index = GroupIndex::default();
    let mut byte_cursor = header.len() as u64;
    let mut object_cursor: i64 = 0;
    for part in &parts {
        for &off in &part.object_index.0 {
            object_index.0.push(byte_cursor + off);
        }
        for &g in &part.group_index.0 {
            group_index.0.push(object_cursor + g);
        }
        sink.write_all(&part.body)?;
        byte_cursor += part.body.len() as u64;
        object_cursor += part.object_index.0.len() as i64;
    }
    if schema_block.group_type.is_some() {
        group_index.0.push(object_cursor);
    }

    if is_binary {
        let footer_start = byte_cursor;
        sink.write_all(b"\n")?;
        let footer = render_footer(&meta, &merged, &schema_block, &object_index, &group_index)?;
        sink.write_all(&footer)?;
        sink.write_all(&footer_start.to_le_bytes())?;
    }

    Ok(sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{FieldValue, ListValue};
    use onecode_schema::Schema;

    fn sample_schema() -> Schema {
        Schema::from_text("P 3 seq\nO A 1 3 INT\nG B 1 3 INT\n").unwrap()
    }

    #[test]
    fn s6_parallel_write_concatenates_in_sibling_order() {
        let schema = sample_schema();
        let sink = write_parallel(Vec::new(), &schema, "seq", None, true, 4, |i, w| {
            w.write_line('B', vec![FieldValue::Int(0)], ListValue::None)?;
            for n in 0..1000i64 {
                w.write_line('A', vec![FieldValue::Int(i as i64 * 1000 + n)], ListValue::None)?;
            }
            Ok(())
        })
        .unwrap();

        let mut r = crate::reader::Reader::from_reader(std::path::PathBuf::from("<mem>"), std::io::Cursor::new(sink), None, Some("seq")).unwrap();
        let mut seen = Vec::new();
        while let Some(c) = r.read_line().unwrap() {
            if c == 'A' {
                seen.push(r.current().unwrap().fields[0].as_int().unwrap());
            }
        }
        assert_eq!(seen.len(), 4000);
        for (sib, chunk) in seen.chunks(1000).enumerate() {
            for (n, &v) in chunk.iter().enumerate() {
                assert_eq!(v, sib as i64 * 1000 + n as i64);
            }
        }
        assert_eq!(r.given_counts('A'), Some((4000, 0, 0)));
    }

    #[test]
    fn fanout_builds_once_and_reuses_codec() {
        let fanout = Fanout::with_threshold(8);
        assert!(fanout.train('B', b"abcd").unwrap().is_none());
        let built = fanout.train('B', b"efghij").unwrap();
        assert!(built.is_some());
        let again = fanout.train('B', b"more").unwrap();
        assert!(again.is_some());
    }
}
