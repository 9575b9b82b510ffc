//! # onecode-format
//!
//! The container file format itself, built on top of `onecode-core`'s
//! primitives and `onecode-schema`'s field signatures:
//!
//! - [`value`]: the current-record value model ([`value::Record`]).
//! - [`line_info`]: per-line-type declared/accumulated counts, group
//!   bookkeeping, and list codec state.
//! - [`ascii`] / [`binary`]: the two record encodings.
//! - [`index`]: the binary footer's random-access object/group indexes.
//! - [`provenance`]: header entries describing a file's lineage.
//! - [`reader`]: the open → header → body → closed reader state machine.
//! - [`writer`]: the open → body → finalising → closed writer state machine.
//! - [`parallel`]: cooperative multi-writer fan-out sharing codec training.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod ascii;
pub mod binary;
pub mod index;
pub mod line_info;
pub mod parallel;
pub mod provenance;
pub mod reader;
pub mod value;
pub mod writer;

pub use index::{GroupIndex, ObjectIndex};
pub use line_info::{LineInfo, DEFAULT_CODEC_TRAINING_SIZE};
pub use parallel::{write_parallel, Fanout};
pub use provenance::{Deferred, Provenance, Reference};
pub use reader::Reader;
pub use value::{FieldValue, ListValue, Record};
pub use writer::{SiblingParts, Writer};
