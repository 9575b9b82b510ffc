//! Schema values: filetype blocks, compatibility checking, canonical export.

use crate::types::{LineTypeDef, OneType};
use onecode_core::error::{OneError, Result};
use std::collections::BTreeMap;
use std::path::Path;

/// One filetype block: a primary name, its secondary aliases, and the line
/// types it declares.
#[derive(Debug, Clone)]
pub struct FiletypeBlock {
    /// Canonical name, e.g. `"seq"`.
    pub primary: String,
    /// Alias names accepted in place of `primary` when matching a file.
    pub secondary: Vec<String>,
    /// Line types keyed by their one-character identifier.
    pub line_types: BTreeMap<char, LineTypeDef>,
    /// The object line type, if declared.
    pub object_type: Option<char>,
    /// The group line type, if declared.
    pub group_type: Option<char>,
}

impl FiletypeBlock {
    /// Start an empty block for the given primary name.
    pub fn new(primary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            secondary: Vec::new(),
            line_types: BTreeMap::new(),
            object_type: None,
            group_type: None,
        }
    }

    /// Maximum field count across every declared line type; used to
    /// pre-size record buffers.
    pub fn max_fields(&self) -> usize {
        self.line_types.values().map(|lt| lt.fields.len()).max().unwrap_or(0)
    }

    /// Whether `name` names this block, either as primary or as an alias.
    pub fn matches_name(&self, name: &str) -> bool {
        self.primary == name || self.secondary.iter().any(|s| s == name)
    }

    fn add_line_type(&mut self, def: LineTypeDef) -> Result<()> {
        if self.line_types.contains_key(&def.type_char) {
            return Err(OneError::schema(0, format!("duplicate line type '{}'", def.type_char)));
        }
        if !def.type_char.is_ascii_alphabetic() {
            return Err(OneError::schema(
                0,
                format!("line type '{}' must be alphabetic", def.type_char),
            ));
        }
        if def.is_object {
            if self.object_type.is_some() {
                return Err(OneError::schema(0, "object type redefined"));
            }
            self.object_type = Some(def.type_char);
        }
        if def.is_group {
            if self.group_type.is_some() {
                return Err(OneError::schema(0, "group type redefined"));
            }
            if def.fields.first() != Some(&OneType::Int) {
                return Err(OneError::schema(0, "group type's first field must be INT"));
            }
            self.group_type = Some(def.type_char);
        }
        self.line_types.insert(def.type_char, def);
        Ok(())
    }

    /// Declare `c` as an ordinary record line type.
    pub fn declare_record(&mut self, c: char, fields: Vec<OneType>, comment: Option<String>) -> Result<()> {
        self.add_line_type(LineTypeDef {
            type_char: c,
            fields,
            comment,
            is_object: false,
            is_group: false,
        })
    }

    /// Declare `c` as the object line type.
    pub fn declare_object(&mut self, c: char, fields: Vec<OneType>, comment: Option<String>) -> Result<()> {
        self.add_line_type(LineTypeDef {
            type_char: c,
            fields,
            comment,
            is_object: true,
            is_group: false,
        })
    }

    /// Declare `c` as the group line type.
    pub fn declare_group(&mut self, c: char, fields: Vec<OneType>, comment: Option<String>) -> Result<()> {
        self.add_line_type(LineTypeDef {
            type_char: c,
            fields,
            comment,
            is_object: false,
            is_group: true,
        })
    }

    /// Render this block as schema-text directives in the canonical
    /// export order: group type, lowercase record types, object type,
    /// uppercase record types.
    pub fn write_text(&self, out: &mut String) {
        out.push_str(&format!("P {} {}\n", self.primary.len(), self.primary));
        for alias in &self.secondary {
            out.push_str(&format!("S {} {}\n", alias.len(), alias));
        }

        if let Some(c) = self.group_type {
            write_directive(out, 'G', c, &self.line_types[&c]);
        }
        for c in 'a'..='z' {
            if Some(c) == self.group_type || Some(c) == self.object_type {
                continue;
            }
            if let Some(def) = self.line_types.get(&c) {
                write_directive(out, 'D', c, def);
            }
        }
        if let Some(c) = self.object_type {
            write_directive(out, 'O', c, &self.line_types[&c]);
        }
        for c in 'A'..='Z' {
            if Some(c) == self.object_type {
                continue;
            }
            if let Some(def) = self.line_types.get(&c) {
                write_directive(out, 'D', c, def);
            }
        }
    }

    /// Check compatibility with `other`: same primary type, same object and
    /// group type characters (where both declare one), and matching field
    /// signatures for every line type both blocks declare.
    pub fn is_compatible_with(&self, other: &FiletypeBlock) -> Result<()> {
        if self.primary != other.primary {
            return Err(OneError::schema_mismatch(format!(
                "primary type '{}' does not match '{}'",
                self.primary, other.primary
            )));
        }
        if let (Some(a), Some(b)) = (self.object_type, other.object_type) {
            if a != b {
                return Err(OneError::schema_mismatch(format!(
                    "object type '{a}' does not match '{b}'"
                )));
            }
        }
        if let (Some(a), Some(b)) = (self.group_type, other.group_type) {
            if a != b {
                return Err(OneError::schema_mismatch(format!(
                    "group type '{a}' does not match '{b}'"
                )));
            }
        }
        for (c, def) in &self.line_types {
            if let Some(other_def) = other.line_types.get(c) {
                if def.fields != other_def.fields {
                    return Err(OneError::schema_mismatch(format!(
                        "line type '{c}' field signature does not match"
                    )));
                }
            }
        }
        Ok(())
    }
}

fn write_directive(out: &mut String, directive: char, c: char, def: &LineTypeDef) {
    out.push(directive);
    out.push(' ');
    out.push(c);
    out.push(' ');
    out.push_str(&def.fields.len().to_string());
    for f in &def.fields {
        out.push(' ');
        out.push_str(&f.name().len().to_string());
        out.push(' ');
        out.push_str(f.name());
    }
    if let Some(comment) = &def.comment {
        out.push_str("  # ");
        out.push_str(comment);
    }
    out.push('\n');
}

/// A schema: a chained sequence of filetype blocks parsed from one source.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    /// The blocks declared in this schema, in declaration order.
    pub blocks: Vec<FiletypeBlock>,
}

impl Schema {
    /// An empty schema with no blocks.
    pub fn new() -> Self {
        Self::default()
    }

    /// A schema containing a single empty block for `(primary, _)`, used
    /// when a file must be interpreted purely from its own inline schema.
    pub fn dynamic(primary: impl Into<String>) -> Self {
        Self {
            blocks: vec![FiletypeBlock::new(primary)],
        }
    }

    /// Find the block whose primary or secondary name is `name`.
    pub fn find(&self, name: &str) -> Option<&FiletypeBlock> {
        self.blocks.iter().find(|b| b.matches_name(name))
    }

    /// Render every block as schema text in canonical order.
    pub fn write_text(&self) -> String {
        let mut out = String::new();
        for block in &self.blocks {
            block.write_text(&mut out);
        }
        out
    }

    /// Parse a schema from in-memory text (the `P/S/O/G/D` directive
    /// grammar).
    pub fn from_text(text: &str) -> Result<Self> {
        crate::parser::parse_text(text)
    }

    /// Parse a schema from a file on disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| OneError::open(path, format!("cannot read schema file: {e}")))?;
        Self::from_text(&text)
    }

    /// Check `self` (typically the schema a caller supplied) against
    /// `file_schema` (typically the schema parsed from a file's own
    /// header). Schemas are compatible iff every block matched by primary
    /// name agrees on object/group type and on the field signature of
    /// every line type present in both.
    ///
    /// When `required` is `true`, a mismatch is returned as a fatal
    /// [`OneError::SchemaMismatch`]; when `false`, the same condition is
    /// returned as a non-fatal, caller-inspectable variant
    /// ([`OneError::is_recoverable`]).
    pub fn check_compatible(&self, file_schema: &Schema, required: bool) -> Result<()> {
        for block in &self.blocks {
            match file_schema.find(&block.primary) {
                Some(other) => {
                    if let Err(e) = block.is_compatible_with(other) {
                        return Err(demote(e, required));
                    }
                }
                None => {
                    return Err(demote(
                        OneError::schema_mismatch(format!("file has no filetype block named '{}'", block.primary)),
                        required,
                    ));
                }
            }
        }
        Ok(())
    }
}

fn demote(err: OneError, required: bool) -> OneError {
    match err {
        OneError::SchemaMismatch { message, .. } if !required => OneError::schema_mismatch_optional(message),
        other => other,
    }
}
