//! # onecode-huffman
//!
//! Length-limited (≤12-bit) adaptive Huffman coding over an 8-bit symbol
//! alphabet, with histogram training, an optional escape code for symbols
//! absent from the training corpus, and endian-safe table serialisation.
//!
//! This is the `listCodec` used by every non-DNA compressible list field;
//! see [`onecode_core::traits::ListCodec`] for the shared encode/decode seam.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

mod package_merge;

pub mod huffman;

pub use huffman::{CodecState, HuffmanCodec, MAX_CODE_LENGTH};
