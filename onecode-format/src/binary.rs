//! Binary record encoding: one opcode byte (high bit set,
//! 6-bit line-type index, low bit "list is Huffman-compressed"), fixed
//! fields in declared order, then the list body if the line type carries
//! a non-empty list.

use crate::line_info::ListCodecState;
use crate::value::{FieldValue, ListValue, Record};
use onecode_core::error::{OneError, Result};
use onecode_core::traits::ListCodec;
use onecode_core::varint;
use onecode_schema::{LineTypeDef, OneType};
use std::io::{Read, Write};

/// Binary opcode index for the fixed, non-alphabetic meta-record types that
/// can appear inside a binary body or footer (`;`, `&`, `*`, `/`, `.`),
/// taken verbatim from `ONElib-v1.c`'s `binaryTypePack` assignment.
pub fn meta_index(c: char) -> Option<u8> {
    match c {
        ';' => Some(52),
        '&' => Some(53),
        '*' => Some(54),
        '/' => Some(55),
        '.' => Some(56),
        _ => None,
    }
}

fn char_for_index(index: u8) -> Option<char> {
    match index {
        0..=25 => Some((b'A' + index) as char),
        26..=51 => Some((b'a' + (index - 26)) as char),
        52 => Some(';'),
        53 => Some('&'),
        54 => Some('*'),
        55 => Some('/'),
        56 => Some('.'),
        _ => None,
    }
}

/// Index for an alphabetic line type (`A..Z` -> 0..26, `a..z` -> 26..52),
/// or a fixed meta-record type.
pub fn index_for_char(c: char) -> Option<u8> {
    if c.is_ascii_uppercase() {
        Some(c as u8 - b'A')
    } else if c.is_ascii_lowercase() {
        Some(26 + (c as u8 - b'a'))
    } else {
        meta_index(c)
    }
}

/// Decode an opcode byte into (line type char, "list is Huffman-compressed").
pub fn decode_opcode(opcode: u8) -> Result<(char, bool)> {
    if opcode & 0x80 == 0 {
        return Err(OneError::binary("<binary-record>", 0, format!("opcode {opcode:#04x} missing high bit")));
    }
    let index = (opcode & 0x7F) >> 1;
    let compressed = opcode & 1 != 0;
    let c = char_for_index(index).ok_or_else(|| OneError::binary("<binary-record>", 0, format!("unknown opcode index {index}")))?;
    Ok((c, compressed))
}

/// Build the opcode byte for `line_type`, base packed per
/// [`onecode_schema::LineTypeDef::binary_opcode_base`] or [`meta_index`],
/// with the low bit set iff `compressed`.
pub fn encode_opcode_for(line_type: char, compressed: bool) -> Result<u8> {
    let index = index_for_char(line_type).ok_or_else(|| OneError::logic(format!("line type '{line_type}' has no binary opcode")))?;
    Ok(((index << 1) | 0x80) | (compressed as u8))
}

fn write_i64_width<W: Write>(w: &mut W, value: i64, width: usize) -> Result<()> {
    let bytes = value.to_le_bytes();
    w.write_all(&bytes[..width])?;
    Ok(())
}

fn read_i64_width<R: Read>(r: &mut R, width: usize) -> Result<i64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf[..width])?;
    let sign_extend = buf[width - 1] & 0x80 != 0;
    if sign_extend {
        for b in buf.iter_mut().skip(width) {
            *b = 0xFF;
        }
    }
    Ok(i64::from_le_bytes(buf))
}

/// Narrow a difference-transformed `INT_LIST` to its minimum byte width
/// (1..8), writing the width byte followed by the narrowed little-endian
/// differences. The first element is kept as-is (not a difference).
fn write_int_list_body<W: Write>(w: &mut W, values: &[i64]) -> Result<()> {
    if values.is_empty() {
        return Ok(());
    }
    varint::write(w, values[0])?;
    let diffs: Vec<i64> = values.windows(2).map(|p| p[1] - p[0]).collect();

    let mut width = 1usize;
    for &d in &diffs {
        for w_try in width..=8 {
            let lower = if w_try == 8 { i64::MIN } else { -(1i64 << (w_try * 8 - 1)) };
            let upper = if w_try == 8 { i64::MAX } else { (1i64 << (w_try * 8 - 1)) - 1 };
            if d >= lower && d <= upper {
                width = width.max(w_try);
                break;
            }
        }
    }
    w.write_all(&[width as u8])?;
    for d in diffs {
        write_i64_width(w, d, width)?;
    }
    Ok(())
}

fn read_int_list_body<R: Read>(r: &mut R, len: usize) -> Result<Vec<i64>> {
    if len == 0 {
        return Ok(Vec::new());
    }
    let first = varint::read(r)?;
    let mut width_buf = [0u8; 1];
    r.read_exact(&mut width_buf)?;
    let width = width_buf[0] as usize;
    let mut out = Vec::with_capacity(len);
    out.push(first);
    for _ in 1..len {
        let diff = read_i64_width(r, width)?;
        out.push(out.last().unwrap() + diff);
    }
    Ok(out)
}

fn write_string_list_body<W: Write>(w: &mut W, strings: &[Vec<u8>]) -> Result<()> {
    for s in strings {
        varint::write(w, s.len() as i64)?;
        w.write_all(s)?;
    }
    Ok(())
}

fn read_string_list_body<R: Read>(r: &mut R, len: usize) -> Result<Vec<Vec<u8>>> {
    let mut out = Vec::with_capacity(len);
    for _ in 0..len {
        let slen = varint::read(r)?;
        let mut buf = vec![0u8; slen as usize];
        r.read_exact(&mut buf)?;
        out.push(buf);
    }
    Ok(out)
}

/// Write one record in binary form. `def` supplies the field signature and
/// list role; `codec` is the line type's active list codec state, if any.
pub fn write<W: Write>(w: &mut W, record: &Record, def: &LineTypeDef, codec: Option<&ListCodecState>, codec_active: bool) -> Result<()> {
    let list_idx = def.list_field_index();
    let list_ty = def.list_field_type();
    let compressed = codec_active && list_ty.map(|t| t.uses_huffman_codec()).unwrap_or(false);

    let opcode = encode_opcode_for(record.line_type, compressed)?;
    w.write_all(&[opcode])?;

    for field in &record.fields {
        match field {
            FieldValue::Real(v) => w.write_all(&v.to_le_bytes())?,
            FieldValue::Char(c) => w.write_all(&[*c])?,
            FieldValue::Int(v) => varint::write(w, *v)?,
        }
    }

    if let (Some(idx), Some(ty)) = (list_idx, list_ty) {
        let len = record.fields[idx].as_int().unwrap_or(0);
        if len > 0 {
            match ty {
                OneType::IntList => {
                    let values = record.list.as_ints().ok_or_else(|| OneError::logic("INT_LIST record missing int payload"))?;
                    write_int_list_body(w, values)?;
                }
                OneType::StringList => {
                    let strings = record.list.as_strings().ok_or_else(|| OneError::logic("STRING_LIST record missing payload"))?;
                    write_string_list_body(w, strings)?;
                }
                OneType::Dna => {
                    let ListCodecState::Dna(dna) = codec.ok_or_else(|| OneError::logic("DNA line type missing codec"))? else {
                        return Err(OneError::logic("DNA line type codec is not the DNA codec"));
                    };
                    let bytes = record.list.as_bytes().ok_or_else(|| OneError::logic("DNA record missing byte payload"))?;
                    let encoded = dna.encode(bytes)?;
                    w.write_all(&encoded.payload)?;
                }
                OneType::String | OneType::RealList => {
                    let raw = raw_bytes_of(&record.list, ty)?;
                    if compressed {
                        let ListCodecState::Huffman(huff) = codec.ok_or_else(|| OneError::logic("missing Huffman codec"))? else {
                            return Err(OneError::logic("list codec is not Huffman"));
                        };
                        let encoded = huff.encode(&raw)?;
                        varint::write(w, encoded.n_bits as i64)?;
                        w.write_all(&encoded.payload)?;
                    } else {
                        varint::write(w, 8 * raw.len() as i64)?;
                        w.write_all(&raw)?;
                    }
                }
                OneType::Int | OneType::Real | OneType::Char => unreachable!("not list types"),
            }
        }
    }
    Ok(())
}

fn raw_bytes_of(list: &ListValue, ty: OneType) -> Result<Vec<u8>> {
    match (ty, list) {
        (OneType::String, ListValue::Bytes(b)) => Ok(b.clone()),
        (OneType::RealList, ListValue::Reals(v)) => Ok(v.iter().flat_map(|r| r.to_le_bytes()).collect()),
        _ => Err(OneError::logic("list payload does not match declared field type")),
    }
}

fn bytes_to_reals(bytes: &[u8]) -> Vec<f64> {
    bytes.chunks_exact(8).map(|c| f64::from_le_bytes(c.try_into().unwrap())).collect()
}

/// Read one binary record body for `def` given the just-consumed opcode's
/// (line type, compressed) pair.
pub fn read<R: Read>(r: &mut R, def: &LineTypeDef, compressed: bool, codec: Option<&ListCodecState>) -> Result<Record> {
    let mut record = Record::new(def.type_char, &def.fields);
    let list_idx = def.list_field_index();
    let list_ty = def.list_field_type();

    for (i, &ty) in def.fields.iter().enumerate() {
        record.fields[i] = match ty {
            OneType::Real => {
                let mut b = [0u8; 8];
                r.read_exact(&mut b)?;
                FieldValue::Real(f64::from_le_bytes(b))
            }
            OneType::Char => {
                let mut b = [0u8; 1];
                r.read_exact(&mut b)?;
                FieldValue::Char(b[0])
            }
            _ => FieldValue::Int(varint::read(r)?),
        };
    }

    if let (Some(idx), Some(ty)) = (list_idx, list_ty) {
        let len = record.fields[idx].as_int().unwrap_or(0) as usize;
        if len > 0 {
            record.list = match ty {
                OneType::IntList => ListValue::Ints(read_int_list_body(r, len)?),
                OneType::StringList => ListValue::Strings(read_string_list_body(r, len)?),
                OneType::Dna => {
                    let ListCodecState::Dna(dna) = codec.ok_or_else(|| OneError::logic("DNA line type missing codec"))? else {
                        return Err(OneError::logic("DNA line type codec is not the DNA codec"));
                    };
                    let n_bytes = len.div_ceil(4);
                    let mut buf = vec![0u8; n_bytes];
                    r.read_exact(&mut buf)?;
                    ListValue::Bytes(dna.decode(&buf, 2 * len as u64, len)?)
                }
                OneType::String | OneType::RealList => {
                    let n_bits = varint::read(r)? as u64;
                    let n_elts_bytes = if ty == OneType::RealList { len * 8 } else { len };
                    let raw = if compressed {
                        let ListCodecState::Huffman(huff) = codec.ok_or_else(|| OneError::logic("missing Huffman codec"))? else {
                            return Err(OneError::logic("list codec is not Huffman"));
                        };
                        let n_payload_bytes = n_bits.div_ceil(8) as usize;
                        let mut payload = vec![0u8; n_payload_bytes];
                        r.read_exact(&mut payload)?;
                        huff.decode(&payload, n_bits, n_elts_bytes)?
                    } else {
                        let n_payload_bytes = (n_bits / 8) as usize;
                        let mut payload = vec![0u8; n_payload_bytes];
                        r.read_exact(&mut payload)?;
                        payload
                    };
                    if ty == OneType::RealList {
                        ListValue::Reals(bytes_to_reals(&raw))
                    } else {
                        ListValue::Bytes(raw)
                    }
                }
                OneType::Int | OneType::Real | OneType::Char => unreachable!("not list types"),
            };
        }
    }

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use onecode_schema::LineTypeDef;

    #[test]
    fn opcode_roundtrip_alphabetic() {
        for c in ('A'..='Z').chain('a'..='z') {
            let opcode = encode_opcode_for(c, false).unwrap();
            let (decoded, compressed) = decode_opcode(opcode).unwrap();
            assert_eq!(decoded, c);
            assert!(!compressed);
        }
    }

    #[test]
    fn opcode_compressed_bit() {
        let opcode = encode_opcode_for('A', true).unwrap();
        let (c, compressed) = decode_opcode(opcode).unwrap();
        assert_eq!(c, 'A');
        assert!(compressed);
    }

    #[test]
    fn meta_opcodes_match_reference_indices() {
        assert_eq!(meta_index(';'), Some(52));
        assert_eq!(meta_index('&'), Some(53));
        assert_eq!(meta_index('*'), Some(54));
        assert_eq!(meta_index('/'), Some(55));
        assert_eq!(meta_index('.'), Some(56));
    }

    fn def(type_char: char, fields: Vec<OneType>) -> LineTypeDef {
        LineTypeDef {
            type_char,
            fields,
            comment: None,
            is_object: false,
            is_group: false,
        }
    }

    #[test]
    fn s2_int_record_roundtrip() {
        let d = def('A', vec![OneType::Int]);
        let rec = Record {
            line_type: 'A',
            fields: vec![FieldValue::Int(42)],
            list: ListValue::None,
            comment: None,
        };
        let mut buf = Vec::new();
        write(&mut buf, &rec, &d, None, false).unwrap();
        let opcode = buf[0];
        let (c, compressed) = decode_opcode(opcode).unwrap();
        assert_eq!(c, 'A');
        let decoded = read(&mut &buf[1..], &d, compressed, None).unwrap();
        assert_eq!(decoded.fields[0].as_int(), Some(42));
    }

    #[test]
    fn int_list_differencing_roundtrip() {
        let d = def('B', vec![OneType::IntList]);
        let mut rec = Record::new('B', &d.fields);
        rec.fields[0] = FieldValue::Int(4);
        rec.list = ListValue::Ints(vec![100, 105, 90, 1_000_000]);
        let mut buf = Vec::new();
        write(&mut buf, &rec, &d, None, false).unwrap();
        let (_, compressed) = decode_opcode(buf[0]).unwrap();
        let decoded = read(&mut &buf[1..], &d, compressed, None).unwrap();
        assert_eq!(decoded.list.as_ints(), Some(&[100i64, 105, 90, 1_000_000][..]));
    }

    #[test]
    fn string_list_ascii_form_roundtrip() {
        let d = def('B', vec![OneType::StringList]);
        let mut rec = Record::new('B', &d.fields);
        rec.fields[0] = FieldValue::Int(2);
        rec.list = ListValue::Strings(vec![b"foo".to_vec(), b"barbaz".to_vec()]);
        let mut buf = Vec::new();
        write(&mut buf, &rec, &d, None, false).unwrap();
        let (_, compressed) = decode_opcode(buf[0]).unwrap();
        let decoded = read(&mut &buf[1..], &d, compressed, None).unwrap();
        assert_eq!(decoded.list.as_strings().unwrap(), &[b"foo".to_vec(), b"barbaz".to_vec()]);
    }

    #[test]
    fn dna_list_roundtrip() {
        use onecode_dna::DnaCodec;
        let d = def('B', vec![OneType::Dna]);
        let mut rec = Record::new('B', &d.fields);
        let seq = b"acgtacgtacg";
        rec.fields[0] = FieldValue::Int(seq.len() as i64);
        rec.list = ListValue::Bytes(seq.to_vec());
        let codec_state = ListCodecState::Dna(DnaCodec);
        let mut buf = Vec::new();
        write(&mut buf, &rec, &d, Some(&codec_state), false).unwrap();
        let (_, compressed) = decode_opcode(buf[0]).unwrap();
        let decoded = read(&mut &buf[1..], &d, compressed, Some(&codec_state)).unwrap();
        assert_eq!(decoded.list.as_bytes(), Some(&seq[..]));
    }

    #[test]
    fn huffman_string_roundtrip() {
        use onecode_huffman::HuffmanCodec;
        let d = def('B', vec![OneType::String]);
        let mut codec = HuffmanCodec::new();
        codec.add_sample(b"abcabcabcabc").unwrap();
        codec.build(true).unwrap();
        let codec_state = ListCodecState::Huffman(codec);

        let mut rec = Record::new('B', &d.fields);
        let s = b"abcabc";
        rec.fields[0] = FieldValue::Int(s.len() as i64);
        rec.list = ListValue::Bytes(s.to_vec());
        let mut buf = Vec::new();
        write(&mut buf, &rec, &d, Some(&codec_state), true).unwrap();
        let (_, compressed) = decode_opcode(buf[0]).unwrap();
        assert!(compressed);
        let decoded = read(&mut &buf[1..], &d, compressed, Some(&codec_state)).unwrap();
        assert_eq!(decoded.list.as_bytes(), Some(&s[..]));
    }

    #[test]
    fn empty_list_roundtrips() {
        let d = def('B', vec![OneType::IntList]);
        let mut rec = Record::new('B', &d.fields);
        rec.fields[0] = FieldValue::Int(0);
        let mut buf = Vec::new();
        write(&mut buf, &rec, &d, None, false).unwrap();
        let (_, compressed) = decode_opcode(buf[0]).unwrap();
        let decoded = read(&mut &buf[1..], &d, compressed, None).unwrap();
        assert_eq!(decoded.list.as_ints(), Some(&[][..]));
    }
}
