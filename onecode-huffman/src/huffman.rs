//! Adaptive, length-limited Huffman codec for 8-bit symbol lists.
//!
//! Mirrors the lifecycle of a line type's list codec: a fresh codec
//! accumulates a histogram ([`CodecState::Filled`]), then [`HuffmanCodec::build`]
//! freezes it into a code table ([`CodecState::Coded`]). A codec loaded via
//! [`HuffmanCodec::deserialize`] starts directly in `Coded` state with no
//! histogram, matching a table shared read-only across sibling writers.

use crate::package_merge::{build_lengths, canonical_codes};
use onecode_core::bitstream::{BitReader, BitWriter};
use onecode_core::error::{OneError, Result};
use onecode_core::traits::{EncodedList, ListCodec};
use std::io::{Read, Write};

/// Maximum Huffman code length, in bits.
pub const MAX_CODE_LENGTH: u8 = 12;

/// Lifecycle state of a [`HuffmanCodec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecState {
    /// Zeroed histogram, no code table.
    Empty,
    /// One or more samples added, no code table yet.
    Filled,
    /// A code table has been built (or loaded); histogram updates are forbidden.
    Coded,
}

#[derive(Debug, Clone)]
enum Node {
    Leaf(u16),
    Branch(Option<Box<Node>>, Option<Box<Node>>),
}

/// An adaptive Huffman list codec over the 256-symbol byte alphabet.
#[derive(Debug, Clone)]
pub struct HuffmanCodec {
    state: CodecState,
    hist: [u64; 256],
    code_lens: [u8; 256],
    code_vals: [u16; 256],
    escape_symbol: Option<u8>,
    decode_root: Option<Box<Node>>,
    /// Endianness of the machine that built/serialised this table.
    creator_is_big: bool,
}

const ESCAPE_INDEX: u16 = 256;

impl Default for HuffmanCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl HuffmanCodec {
    /// Create an empty codec with a zeroed histogram.
    pub fn new() -> Self {
        Self {
            state: CodecState::Empty,
            hist: [0u64; 256],
            code_lens: [0u8; 256],
            code_vals: [0u16; 256],
            escape_symbol: None,
            decode_root: None,
            creator_is_big: cfg!(target_endian = "big"),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> CodecState {
        self.state
    }

    /// Add a sample to the histogram. Forbidden once [`CodecState::Coded`].
    pub fn add_sample(&mut self, bytes: &[u8]) -> Result<()> {
        if self.state == CodecState::Coded {
            return Err(OneError::logic("cannot add samples to a coded Huffman codec"));
        }
        for &b in bytes {
            self.hist[b as usize] += 1;
        }
        self.state = CodecState::Filled;
        Ok(())
    }

    /// Merge another codec's histogram into this one (cross-thread training).
    pub fn merge_histogram(&mut self, other: &HuffmanCodec) -> Result<()> {
        if self.state == CodecState::Coded {
            return Err(OneError::logic("cannot merge into a coded Huffman codec"));
        }
        if other.state == CodecState::Coded {
            return Err(OneError::logic("cannot merge a coded codec's histogram"));
        }
        for i in 0..256 {
            self.hist[i] += other.hist[i];
        }
        if self.state == CodecState::Empty && self.hist.iter().any(|&c| c > 0) {
            self.state = CodecState::Filled;
        }
        Ok(())
    }

    /// Total number of samples accumulated in the histogram.
    pub fn sample_count(&self) -> u64 {
        self.hist.iter().sum()
    }

    /// Build the code table via package-merge. If `partial` and at least
    /// one byte has zero count, the lowest-valued zero-count byte is
    /// elected as an escape code for symbols absent from the table.
    pub fn build(&mut self, partial: bool) -> Result<()> {
        if self.state == CodecState::Coded {
            return Err(OneError::logic("codec already built"));
        }

        let mut present: Vec<(u8, u64)> = (0u32..256)
            .filter_map(|s| {
                let s = s as u8;
                let w = self.hist[s as usize];
                (w > 0).then_some((s, w))
            })
            .collect();

        let escape_symbol = if partial {
            (0u32..256)
                .map(|s| s as u8)
                .find(|&s| self.hist[s as usize] == 0)
        } else {
            None
        };

        if let Some(esc) = escape_symbol {
            // Give the escape pseudo-symbol a small, non-zero weight so it
            // participates in package-merge like any other symbol.
            present.push((esc, 1));
        }

        if present.is_empty() {
            return Err(OneError::logic("cannot build a Huffman table with no symbols"));
        }

        let weights: Vec<u64> = present.iter().map(|&(_, w)| w).collect();
        let lengths = build_lengths(&weights, MAX_CODE_LENGTH);
        let codes = canonical_codes(&lengths);

        self.code_lens = [0u8; 256];
        self.code_vals = [0u16; 256];
        for (i, &(sym, _)) in present.iter().enumerate() {
            self.code_lens[sym as usize] = lengths[i];
            self.code_vals[sym as usize] = codes[i];
        }
        self.escape_symbol = escape_symbol;
        self.state = CodecState::Coded;
        self.rebuild_decode_trie();
        Ok(())
    }

    fn rebuild_decode_trie(&mut self) {
        let mut root: Option<Box<Node>> = None;
        for sym in 0..256usize {
            let len = self.code_lens[sym];
            if len == 0 {
                continue;
            }
            insert(&mut root, self.code_vals[sym], len, sym as u16);
        }
        if let Some(esc) = self.escape_symbol {
            let len = self.code_lens[esc as usize];
            insert(&mut root, self.code_vals[esc as usize], len, ESCAPE_INDEX);
        }
        self.decode_root = root;
    }

    fn needs_escape(&self, byte: u8) -> bool {
        self.code_lens[byte as usize] == 0 || self.escape_symbol == Some(byte)
    }

    fn encode_bits<W: Write>(&self, input: &[u8], writer: &mut BitWriter<W>) -> Result<()> {
        for &byte in input {
            if self.needs_escape(byte) {
                let esc = self
                    .escape_symbol
                    .ok_or_else(|| OneError::logic(format!("byte {byte:#04x} has no Huffman code and no escape is configured")))?;
                write_code(writer, self.code_vals[esc as usize], self.code_lens[esc as usize])?;
                write_code(writer, byte as u16, 8)?;
            } else {
                write_code(writer, self.code_vals[byte as usize], self.code_lens[byte as usize])?;
            }
        }
        Ok(())
    }

    fn bit_length(&self, input: &[u8]) -> Option<u64> {
        let mut total = 0u64;
        for &byte in input {
            if self.needs_escape(byte) {
                let esc = self.escape_symbol?;
                total += self.code_lens[esc as usize] as u64 + 8;
            } else {
                total += self.code_lens[byte as usize] as u64;
            }
        }
        Some(total)
    }

    /// Serialised size in bytes: always fixed and known statically.
    pub const SERIALIZED_SIZE: usize = 1 + 4 + 4 + 256 * (1 + 2);

    /// Serialise the code table: endian flag, escape symbol/length, then
    /// one (length byte, code value) pair per of the 256 symbols.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::SERIALIZED_SIZE);
        out.push(self.creator_is_big as u8);

        let (esc_code, esc_len): (i32, i32) = match self.escape_symbol {
            Some(s) => (s as i32, self.code_lens[s as usize] as i32),
            None => (-1, -1),
        };
        push_i32(&mut out, esc_code, self.creator_is_big);
        push_i32(&mut out, esc_len, self.creator_is_big);

        for sym in 0..256usize {
            let len = self.code_lens[sym];
            out.push(len);
            if len > 0 || self.escape_symbol == Some(sym as u8) {
                push_u16(&mut out, self.code_vals[sym], self.creator_is_big);
            }
        }
        out
    }

    /// Deserialise a code table, byte-flipping multi-byte fields if the
    /// serialising machine's endianness differs from this one's.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let mut r = bytes;
        let mut flag = [0u8; 1];
        r.read_exact(&mut flag)
            .map_err(|_| OneError::binary("<huffman-codec>", 0, "truncated codec table"))?;
        let creator_is_big = flag[0] != 0;
        let native_is_big = cfg!(target_endian = "big");
        let flip = creator_is_big != native_is_big;

        let esc_code = read_i32(&mut r, flip)?;
        let esc_len = read_i32(&mut r, flip)?;

        let mut code_lens = [0u8; 256];
        let mut code_vals = [0u16; 256];
        for sym in 0..256usize {
            let mut b = [0u8; 1];
            r.read_exact(&mut b)
                .map_err(|_| OneError::binary("<huffman-codec>", sym as u64, "truncated codec table"))?;
            code_lens[sym] = b[0];
            let has_code = b[0] > 0 || esc_code == sym as i32;
            if has_code {
                code_vals[sym] = read_u16(&mut r, flip)?;
            }
        }

        let escape_symbol = (esc_code >= 0).then_some(esc_code as u8);
        debug_assert!(escape_symbol.map(|s| code_lens[s as usize] as i32 == esc_len).unwrap_or(true));

        let mut codec = Self {
            state: CodecState::Coded,
            hist: [0u64; 256],
            code_lens,
            code_vals,
            escape_symbol,
            decode_root: None,
            creator_is_big: native_is_big,
        };
        codec.rebuild_decode_trie();
        Ok(codec)
    }
}

fn insert(node: &mut Option<Box<Node>>, code: u16, len: u8, symbol: u16) {
    if len == 0 {
        *node = Some(Box::new(Node::Leaf(symbol)));
        return;
    }
    let branch = node.get_or_insert_with(|| Box::new(Node::Branch(None, None)));
    if let Node::Branch(zero, one) = branch.as_mut() {
        let bit = (code >> (len - 1)) & 1;
        let child = if bit == 0 { zero } else { one };
        insert(child, code, len - 1, symbol);
    }
}

fn write_code<W: Write>(writer: &mut BitWriter<W>, code: u16, len: u8) -> Result<()> {
    for i in (0..len).rev() {
        writer.write_bit((code >> i) & 1 != 0)?;
    }
    Ok(())
}

fn push_i32(out: &mut Vec<u8>, v: i32, big: bool) {
    let bytes = if big { v.to_be_bytes() } else { v.to_le_bytes() };
    out.extend_from_slice(&bytes);
}

fn push_u16(out: &mut Vec<u8>, v: u16, big: bool) {
    let bytes = if big { v.to_be_bytes() } else { v.to_le_bytes() };
    out.extend_from_slice(&bytes);
}

fn read_i32(r: &mut &[u8], flip: bool) -> Result<i32> {
    let mut b = [0u8; 4];
    r.read_exact(&mut b)
        .map_err(|_| OneError::binary("<huffman-codec>", 0, "truncated codec table"))?;
    if flip {
        b.reverse();
    }
    Ok(i32::from_le_bytes(b))
}

fn read_u16(r: &mut &[u8], flip: bool) -> Result<u16> {
    let mut b = [0u8; 2];
    r.read_exact(&mut b)
        .map_err(|_| OneError::binary("<huffman-codec>", 0, "truncated codec table"))?;
    if flip {
        b.reverse();
    }
    Ok(u16::from_le_bytes(b))
}

impl ListCodec for HuffmanCodec {
    fn encode(&self, input: &[u8]) -> Result<EncodedList> {
        if self.state != CodecState::Coded {
            return Err(OneError::logic("Huffman codec has no code table"));
        }

        let coded_bits = self.bit_length(input);
        let literal_bits = 8 * (1 + input.len() as u64);
        let use_literal = match coded_bits {
            Some(bits) => bits >= literal_bits,
            None => true,
        };

        if use_literal {
            let mut payload = Vec::with_capacity(1 + input.len());
            payload.push(0xFF);
            payload.extend_from_slice(input);
            return Ok(EncodedList {
                payload,
                n_bits: literal_bits,
            });
        }

        let mut buf = Vec::new();
        {
            let mut bw = BitWriter::new(&mut buf);
            self.encode_bits(input, &mut bw)?;
            bw.flush()?;
        }
        Ok(EncodedList {
            payload: buf,
            n_bits: coded_bits.unwrap(),
        })
    }

    fn decode(&self, payload: &[u8], n_bits: u64, expected_len: usize) -> Result<Vec<u8>> {
        let literal_bits = 8 * (1 + expected_len as u64);
        if n_bits == literal_bits && payload.first() == Some(&0xFF) {
            if payload.len() < 1 + expected_len {
                return Err(OneError::binary("<huffman-payload>", 0, "truncated literal fallback"));
            }
            return Ok(payload[1..1 + expected_len].to_vec());
        }

        let root = self
            .decode_root
            .as_ref()
            .ok_or_else(|| OneError::logic("Huffman codec has no code table"))?;

        let mut out = Vec::with_capacity(expected_len);
        let mut reader = BitReader::new(payload);
        while out.len() < expected_len {
            let mut node = root.as_ref();
            loop {
                match node {
                    Node::Leaf(ESCAPE_INDEX) => {
                        let raw = reader.read_bits(8)? as u8;
                        out.push(raw);
                        break;
                    }
                    Node::Leaf(sym) => {
                        out.push(*sym as u8);
                        break;
                    }
                    Node::Branch(zero, one) => {
                        let bit = reader.read_bit()?;
                        let next = if bit { one } else { zero };
                        node = next
                            .as_deref()
                            .ok_or_else(|| OneError::binary("<huffman-payload>", reader.bit_position(), "invalid Huffman code"))?;
                    }
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s4_full_build_roundtrip() {
        let mut codec = HuffmanCodec::new();
        codec.add_sample(&[b'a'; 60]).unwrap();
        codec.add_sample(&[b'b'; 30]).unwrap();
        codec.add_sample(&[b'c'; 10]).unwrap();
        codec.build(false).unwrap();

        let input = b"abracadabra";
        let encoded = codec.encode(input).unwrap();
        let decoded = codec.decode(&encoded.payload, encoded.n_bits, input.len()).unwrap();
        assert_eq!(decoded, input);
    }

    #[test]
    fn s4_partial_escape_roundtrip() {
        let mut codec = HuffmanCodec::new();
        codec.add_sample(&[b'a'; 60]).unwrap();
        codec.add_sample(&[b'b'; 30]).unwrap();
        codec.add_sample(&[b'c'; 10]).unwrap();
        codec.build(true).unwrap();

        let input = b"abxy";
        let encoded = codec.encode(input).unwrap();
        let decoded = codec.decode(&encoded.payload, encoded.n_bits, input.len()).unwrap();
        assert_eq!(decoded, input);
    }

    #[test]
    fn literal_fallback_on_incompressible_input() {
        let mut codec = HuffmanCodec::new();
        // Flat histogram over all 256 bytes forces ~8-bit codes on average,
        // so any single sample is effectively incompressible and some are
        // inflated by package-merge's length limiting: fabricate a case by
        // building a codec trained only on 'a' and asking it (partial) to
        // encode a long escape-heavy string.
        codec.add_sample(b"a").unwrap();
        codec.build(true).unwrap();
        let input: Vec<u8> = (0..20).map(|i| b'b' + i).collect();
        let encoded = codec.encode(&input).unwrap();
        assert_eq!(encoded.payload[0], 0xFF);
        let decoded = codec.decode(&encoded.payload, encoded.n_bits, input.len()).unwrap();
        assert_eq!(decoded, input);
    }

    #[test]
    fn empty_list_roundtrips() {
        let mut codec = HuffmanCodec::new();
        codec.add_sample(b"a").unwrap();
        codec.build(false).unwrap();
        let encoded = codec.encode(&[]).unwrap();
        let decoded = codec.decode(&encoded.payload, encoded.n_bits, 0).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn serialize_roundtrip_preserves_codes() {
        let mut codec = HuffmanCodec::new();
        codec.add_sample(&[b'a'; 60]).unwrap();
        codec.add_sample(&[b'b'; 30]).unwrap();
        codec.add_sample(&[b'c'; 10]).unwrap();
        codec.build(true).unwrap();

        let bytes = codec.serialize();
        assert_eq!(bytes.len(), HuffmanCodec::SERIALIZED_SIZE);
        let loaded = HuffmanCodec::deserialize(&bytes).unwrap();

        let input = b"abxycabba";
        let encoded = codec.encode(input).unwrap();
        let decoded = loaded.decode(&encoded.payload, encoded.n_bits, input.len()).unwrap();
        assert_eq!(decoded, input);
    }

    #[test]
    fn max_code_length_respected_under_skew() {
        let mut codec = HuffmanCodec::new();
        for s in 0u8..64 {
            let weight = 1u64 << (s as u64 % 40).min(30);
            codec.add_sample(&vec![s; weight as usize]).unwrap();
        }
        codec.build(false).unwrap();
        assert!(codec.code_lens.iter().all(|&l| l <= MAX_CODE_LENGTH));
    }
}
