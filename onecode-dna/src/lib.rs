//! # onecode-dna
//!
//! Fixed 2-bit nucleotide codec: `{a,c,g,t} -> {0,1,2,3}`, four bases per
//! byte, little-endian within the byte (the first base in a packed byte
//! occupies the low 2 bits). Any byte other than `{a,c,g,t}` (case folded)
//! packs to 0. This codec never trains and never serialises; it is used
//! unconditionally by every line type whose list field is declared `DNA`.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

use onecode_core::error::{OneError, Result};
use onecode_core::traits::{EncodedList, ListCodec};

const BASES: [u8; 4] = [b'a', b'c', b'g', b't'];

fn code_of(base: u8) -> u8 {
    match base.to_ascii_lowercase() {
        b'a' => 0,
        b'c' => 1,
        b'g' => 2,
        b't' => 3,
        _ => 0,
    }
}

/// Pack a sequence of base characters into 2-bit codes, 4 per byte.
pub fn pack(bases: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; bases.len().div_ceil(4)];
    for (i, &base) in bases.iter().enumerate() {
        let code = code_of(base);
        out[i / 4] |= code << ((i % 4) * 2);
    }
    out
}

/// Unpack `n` bases from a 2-bit packed buffer into lower-case ASCII.
pub fn unpack(packed: &[u8], n: usize) -> Result<Vec<u8>> {
    if packed.len() < n.div_ceil(4) {
        return Err(OneError::binary("<dna-list>", 0, "truncated DNA payload"));
    }
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let byte = packed[i / 4];
        let code = (byte >> ((i % 4) * 2)) & 0x3;
        out.push(BASES[code as usize]);
    }
    Ok(out)
}

/// Reverse-complement a packed DNA sequence of `n` bases.
///
/// Equivalent to unpacking, reversing, complementing (`a<->t`, `c<->g`)
/// and repacking, but expressed directly so callers never need to
/// round-trip through ASCII themselves.
pub fn reverse_complement_packed(packed: &[u8], n: usize) -> Result<Vec<u8>> {
    let bases = unpack(packed, n)?;
    let rc: Vec<u8> = bases
        .iter()
        .rev()
        .map(|&b| match b {
            b'a' => b't',
            b't' => b'a',
            b'c' => b'g',
            b'g' => b'c',
            other => other,
        })
        .collect();
    Ok(pack(&rc))
}

/// The DNA list codec, usable anywhere a [`ListCodec`] is expected.
#[derive(Debug, Clone, Copy, Default)]
pub struct DnaCodec;

impl ListCodec for DnaCodec {
    fn encode(&self, input: &[u8]) -> Result<EncodedList> {
        let payload = pack(input);
        Ok(EncodedList {
            payload,
            n_bits: 2 * input.len() as u64,
        })
    }

    fn decode(&self, payload: &[u8], _n_bits: u64, expected_len: usize) -> Result<Vec<u8>> {
        unpack(payload, expected_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s5_pack_unpack_roundtrip() {
        let seq = b"acgtacgtacg";
        let packed = pack(seq);
        assert_eq!(packed.len(), 3);
        let unpacked = unpack(&packed, seq.len()).unwrap();
        assert_eq!(unpacked, seq);
    }

    #[test]
    fn s5_reverse_complement() {
        let seq = b"acgtacgtacg";
        let packed = pack(seq);
        let rc_packed = reverse_complement_packed(&packed, seq.len()).unwrap();
        let rc = unpack(&rc_packed, seq.len()).unwrap();
        assert_eq!(rc, b"cgtacgtacgt");
    }

    #[test]
    fn non_acgt_bytes_map_to_a() {
        let packed = pack(b"aNgt");
        let unpacked = unpack(&packed, 4).unwrap();
        assert_eq!(unpacked, b"aagt");
    }

    #[test]
    fn uppercase_folds_to_lowercase_codes() {
        let packed_upper = pack(b"ACGT");
        let packed_lower = pack(b"acgt");
        assert_eq!(packed_upper, packed_lower);
    }

    #[test]
    fn empty_sequence() {
        let packed = pack(b"");
        assert!(packed.is_empty());
        let unpacked = unpack(&packed, 0).unwrap();
        assert!(unpacked.is_empty());
    }
}
