//! Provenance, reference and deferred-reference header entries.

/// One `!` provenance record: a program invocation that produced or
/// touched this file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    /// Producing program name.
    pub program: String,
    /// Producing program version.
    pub version: String,
    /// Command line (or equivalent) used.
    pub command: String,
    /// ISO-8601-like timestamp.
    pub date: String,
}

/// One `<` reference record: an input file this file was derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Referenced file's path.
    pub filename: String,
    /// Object count consumed from that file.
    pub count: i64,
}

/// One `>` deferred-reference record: a promised future output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deferred {
    /// Promised output file's path.
    pub filename: String,
}
