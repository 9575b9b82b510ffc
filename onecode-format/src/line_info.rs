//! Per-line-type state held open for the lifetime of one file handle:
//! declared (`given`) vs. accumulated (`accum`) counts, group bookkeeping,
//! and the optional list codec.

use onecode_dna::DnaCodec;
use onecode_huffman::HuffmanCodec;
use onecode_schema::LineTypeDef;

/// Default number of list bytes a line type accumulates before its Huffman
/// codec is built and training stops (`ONElib-v1.c`'s
/// `codecTrainingSize = 100000`).
pub const DEFAULT_CODEC_TRAINING_SIZE: u64 = 100_000;

/// Declared vs. accumulated record/list counts for one line type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    /// Number of records of this type.
    pub count: i64,
    /// Largest single list length seen.
    pub max: i64,
    /// Sum of list lengths seen.
    pub total: i64,
}

impl Counts {
    fn record(&mut self, list_len: i64) {
        self.count += 1;
        self.total += list_len;
        if list_len > self.max {
            self.max = list_len;
        }
    }
}

/// The active list codec for a line type, if any.
#[derive(Debug, Clone)]
pub enum ListCodecState {
    /// DNA uses the fixed 2-bit packer unconditionally; it never trains.
    Dna(DnaCodec),
    /// Every other compressible list type starts untrained and is built
    /// once enough bytes have been accumulated.
    Huffman(HuffmanCodec),
}

/// Per-line-type state held by an open [`crate::reader::Reader`] or
/// [`crate::writer::Writer`].
#[derive(Debug, Clone)]
pub struct LineInfo {
    /// Schema definition: field signature, object/group role, comment.
    pub def: LineTypeDef,
    /// Counts declared in the header (`given.count > 0` when present).
    pub given: Counts,
    /// Counts accumulated so far while reading or writing.
    pub accum: Counts,
    /// `accum.count` at the most recent group boundary, for per-group maxima.
    pub g_count_start: i64,
    /// `accum.total` at the most recent group boundary.
    pub g_total_start: i64,
    /// Largest per-group count/total seen across group boundaries so far.
    pub group_max_count: i64,
    /// Largest per-group list total seen across group boundaries so far.
    pub group_max_total: i64,
    /// The list codec, if this line type's list field is compressible.
    pub list_codec: Option<ListCodecState>,
    /// `true` once `list_codec` has a built code table and is in active use.
    pub is_use_list_codec: bool,
    /// Bytes forwarded to the codec's histogram since the file was opened;
    /// compared against the training threshold.
    pub list_tack: u64,
}

impl LineInfo {
    /// Build fresh per-file state for a line type definition.
    pub fn new(def: LineTypeDef) -> Self {
        let list_codec = def.list_field_type().and_then(|ty| {
            if ty == onecode_schema::OneType::Dna {
                Some(ListCodecState::Dna(DnaCodec))
            } else if ty.uses_huffman_codec() {
                Some(ListCodecState::Huffman(HuffmanCodec::new()))
            } else {
                None
            }
        });
        let is_use_list_codec = matches!(list_codec, Some(ListCodecState::Dna(_)));
        Self {
            def,
            given: Counts::default(),
            accum: Counts::default(),
            g_count_start: 0,
            g_total_start: 0,
            group_max_count: 0,
            group_max_total: 0,
            list_codec,
            is_use_list_codec,
            list_tack: 0,
        }
    }

    /// Record one occurrence of this line type with the given list length.
    pub fn record_occurrence(&mut self, list_len: i64) {
        self.accum.record(list_len);
    }

    /// Close out a group segment: fold `accum.count/.total` deltas since
    /// the last boundary into the running group maxima, then reset the
    /// boundary markers.
    pub fn close_group_segment(&mut self) {
        let count_delta = self.accum.count - self.g_count_start;
        let total_delta = self.accum.total - self.g_total_start;
        if count_delta > self.group_max_count {
            self.group_max_count = count_delta;
        }
        if total_delta > self.group_max_total {
            self.group_max_total = total_delta;
        }
        self.g_count_start = self.accum.count;
        self.g_total_start = self.accum.total;
    }

    /// Forward `bytes` to the Huffman histogram and training counter;
    /// builds the code table once the threshold is crossed. No-op for
    /// line types without a Huffman codec (DNA, or non-compressible).
    pub fn train(&mut self, bytes: &[u8], threshold: u64) {
        if self.is_use_list_codec {
            return;
        }
        if let Some(ListCodecState::Huffman(codec)) = &mut self.list_codec {
            let _ = codec.add_sample(bytes);
            self.list_tack += bytes.len() as u64;
            if self.list_tack > threshold {
                let _ = codec.build(true);
                self.is_use_list_codec = true;
            }
        }
    }
}
