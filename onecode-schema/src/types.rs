//! Field types and line-type definitions.

/// The eight field types a line type's fields may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OneType {
    /// Signed integer, varint-encoded in binary.
    Int,
    /// IEEE-754 double.
    Real,
    /// Single non-whitespace character.
    Char,
    /// Counted byte string (the only list-like scalar besides the *_LIST types).
    String,
    /// Counted nucleotide string, 2-bit packed in binary.
    Dna,
    /// List of INT.
    IntList,
    /// List of REAL.
    RealList,
    /// List of counted strings.
    StringList,
}

impl OneType {
    /// Canonical schema-text name, as written after a field's length prefix.
    pub fn name(self) -> &'static str {
        match self {
            OneType::Int => "INT",
            OneType::Real => "REAL",
            OneType::Char => "CHAR",
            OneType::String => "STRING",
            OneType::Dna => "DNA",
            OneType::IntList => "INT_LIST",
            OneType::RealList => "REAL_LIST",
            OneType::StringList => "STRING_LIST",
        }
    }

    /// Parse a schema-text type name.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "INT" => OneType::Int,
            "REAL" => OneType::Real,
            "CHAR" => OneType::Char,
            "STRING" => OneType::String,
            "DNA" => OneType::Dna,
            "INT_LIST" => OneType::IntList,
            "REAL_LIST" => OneType::RealList,
            "STRING_LIST" => OneType::StringList,
            _ => return None,
        })
    }

    /// True for the types that may appear at most once per field signature:
    /// `STRING`, `DNA`, and the three `*_LIST` types.
    pub fn is_list_like(self) -> bool {
        matches!(
            self,
            OneType::String | OneType::Dna | OneType::IntList | OneType::RealList | OneType::StringList
        )
    }

    /// True for list-like types whose element bytes are Huffman-compressible
    /// (everything except `DNA`, which uses the fixed 2-bit codec instead).
    pub fn is_huffman_compressible(self) -> bool {
        self.is_list_like() && !matches!(self, OneType::Dna)
    }

    /// True for the two list types whose binary list body is an adaptive
    /// Huffman-coded (or verbatim-fallback) raw byte blob: `STRING`, whose
    /// bytes are the string itself, and `REAL_LIST`, whose bytes are its
    /// elements' raw IEEE-754 representation. `INT_LIST` has its own
    /// varint-difference encoding, `STRING_LIST` its own ASCII-form
    /// encoding, and `DNA` the fixed 2-bit packer — none of those three
    /// ever go through the Huffman codec.
    pub fn uses_huffman_codec(self) -> bool {
        matches!(self, OneType::String | OneType::RealList)
    }
}

/// Maximum number of fields in one line type's signature.
pub const MAX_FIELDS: usize = 32;

/// Definition of one line type: its field signature, role, and documentation.
#[derive(Debug, Clone)]
pub struct LineTypeDef {
    /// The one-character line type identifier.
    pub type_char: char,
    /// Ordered field signature.
    pub fields: Vec<OneType>,
    /// Free-form documentation attached in the schema text.
    pub comment: Option<String>,
    /// Whether this line type is the filetype's object type.
    pub is_object: bool,
    /// Whether this line type is the filetype's group type.
    pub is_group: bool,
}

impl LineTypeDef {
    /// Index of the single list-like field, if any.
    pub fn list_field_index(&self) -> Option<usize> {
        self.fields.iter().position(|t| t.is_list_like())
    }

    /// The type of the list-like field, if any.
    pub fn list_field_type(&self) -> Option<OneType> {
        self.list_field_index().map(|i| self.fields[i])
    }

    /// Binary opcode for this line type.
    ///
    /// Alphabetic types pack to `((index) << 1) | 0x80`, where index is
    /// `0..26` for `A..Z` and `26..52` for `a..z` (the ordering the
    /// reference implementation's `binaryTypePack` assignment uses); the
    /// low bit is reserved to flag "list is Huffman-compressed" and is
    /// filled in by the writer per record, not stored here.
    pub fn binary_opcode_base(&self) -> Option<u8> {
        let c = self.type_char;
        let index = if c.is_ascii_uppercase() {
            Some((c as u8) - b'A')
        } else if c.is_ascii_lowercase() {
            Some(26 + (c as u8) - b'a')
        } else {
            None
        };
        index.map(|i| (i << 1) | 0x80)
    }
}
