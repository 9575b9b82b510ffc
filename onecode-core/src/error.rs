//! Error taxonomy shared by every onecode crate.
//!
//! Unrecoverable conditions propagate through `?` and are reported by the
//! CLI with a one-line diagnostic; only [`OneError::Index`] and a
//! `SchemaMismatch` built with `required = false` are meant to be
//! inspected and recovered from by a caller instead of treated as fatal.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The error type returned by every fallible onecode operation.
#[derive(Debug, Error)]
pub enum OneError {
    /// The file could not be opened: missing, empty, or not a recognised container.
    #[error("cannot open {path}: {message}")]
    Open {
        /// Path that failed to open.
        path: PathBuf,
        /// Human-readable cause.
        message: String,
    },

    /// Major version mismatch, or minor version newer than this implementation.
    #[error("{path}: incompatible version {major}.{minor}")]
    Version {
        /// File path.
        path: PathBuf,
        /// Major version found in the file.
        major: u32,
        /// Minor version found in the file.
        minor: u32,
    },

    /// A binary file's endianness cannot be reconciled with the reader's.
    #[error("{path}: endian mismatch (file is {file_big}, reader expects native)")]
    Endian {
        /// File path.
        path: PathBuf,
        /// Whether the file was produced on a big-endian machine.
        file_big: bool,
    },

    /// Malformed schema text: duplicate line type, bad directive, etc.
    #[error("schema error at line {line}: {message}")]
    Schema {
        /// 1-based line number within the schema text.
        line: usize,
        /// Description of the problem.
        message: String,
    },

    /// The schema presented by a caller is incompatible with the file's schema.
    #[error("schema mismatch: {message}")]
    SchemaMismatch {
        /// Description of the incompatibility.
        message: String,
        /// Whether the mismatch is fatal (`true`) or merely reported to the caller.
        required: bool,
    },

    /// Malformed ASCII record.
    #[error("{path}:{line}: parse error: {message}")]
    Parse {
        /// File path.
        path: PathBuf,
        /// 1-based line number.
        line: u64,
        /// Description of the parse failure.
        message: String,
    },

    /// Malformed binary record: bad opcode, inconsistent list length, truncated payload.
    #[error("{path}: binary error at offset {offset}: {message}")]
    Binary {
        /// File path.
        path: PathBuf,
        /// Byte offset of the offending record.
        offset: u64,
        /// Description of the problem.
        message: String,
    },

    /// `goto_object`/`goto_group` on an unindexed file, or index out of range.
    #[error("index error: {message}")]
    Index {
        /// Description of the problem.
        message: String,
    },

    /// Short write, write after finalise, provenance added after header, thread misuse.
    #[error("write error: {message}")]
    Write {
        /// Description of the problem.
        message: String,
    },

    /// Caller-side contract violation (e.g. wrong-typed field accessor).
    #[error("logic error: {message}")]
    Logic {
        /// Description of the violated contract.
        message: String,
    },

    /// I/O error from the underlying reader/writer.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result alias used throughout the onecode crates.
pub type Result<T> = std::result::Result<T, OneError>;

impl OneError {
    /// Build an [`OneError::Open`].
    pub fn open(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Open {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Build an [`OneError::Version`].
    pub fn version(path: impl Into<PathBuf>, major: u32, minor: u32) -> Self {
        Self::Version {
            path: path.into(),
            major,
            minor,
        }
    }

    /// Build an [`OneError::Endian`].
    pub fn endian(path: impl Into<PathBuf>, file_big: bool) -> Self {
        Self::Endian {
            path: path.into(),
            file_big,
        }
    }

    /// Build an [`OneError::Schema`].
    pub fn schema(line: usize, message: impl Into<String>) -> Self {
        Self::Schema {
            line,
            message: message.into(),
        }
    }

    /// Build a fatal [`OneError::SchemaMismatch`].
    pub fn schema_mismatch(message: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            message: message.into(),
            required: true,
        }
    }

    /// Build a non-fatal [`OneError::SchemaMismatch`].
    pub fn schema_mismatch_optional(message: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            message: message.into(),
            required: false,
        }
    }

    /// Build an [`OneError::Parse`].
    pub fn parse(path: impl Into<PathBuf>, line: u64, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            line,
            message: message.into(),
        }
    }

    /// Build an [`OneError::Binary`].
    pub fn binary(path: impl Into<PathBuf>, offset: u64, message: impl Into<String>) -> Self {
        Self::Binary {
            path: path.into(),
            offset,
            message: message.into(),
        }
    }

    /// Build an [`OneError::Index`].
    pub fn index(message: impl Into<String>) -> Self {
        Self::Index {
            message: message.into(),
        }
    }

    /// Build an [`OneError::Write`].
    pub fn write(message: impl Into<String>) -> Self {
        Self::Write {
            message: message.into(),
        }
    }

    /// Build an [`OneError::Logic`].
    pub fn logic(message: impl Into<String>) -> Self {
        Self::Logic {
            message: message.into(),
        }
    }

    /// True for the two conditions meant to be inspected and recovered from
    /// rather than treated as fatal: index errors, and schema mismatches
    /// marked non-required.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Index { .. })
            || matches!(self, Self::SchemaMismatch { required: false, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_classification() {
        assert!(OneError::index("out of range").is_recoverable());
        assert!(OneError::schema_mismatch_optional("different object type").is_recoverable());
        assert!(!OneError::schema_mismatch("different object type").is_recoverable());
        assert!(!OneError::logic("wrong field type").is_recoverable());
    }

    #[test]
    fn display_includes_context() {
        let err = OneError::parse("x.1seq", 42, "bad INT token");
        assert!(err.to_string().contains("42"));
        assert!(err.to_string().contains("bad INT token"));
    }
}
