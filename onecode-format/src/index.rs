//! Object and group random-access indexes. Only produced for, and only
//! usable with, binary files.

use onecode_core::error::{OneError, Result};

/// Absolute byte offsets, one per object record written to a binary file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectIndex(pub Vec<u64>);

impl ObjectIndex {
    /// Number of indexed objects.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if no objects are indexed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Byte offset of object `i`, or an [`OneError::Index`] if out of range.
    pub fn offset_of(&self, i: i64) -> Result<u64> {
        if i < 0 || i as usize >= self.0.len() {
            return Err(OneError::index(format!("object index {i} out of range (0..{})", self.0.len())));
        }
        Ok(self.0[i as usize])
    }
}

/// Object ordinals, one per group record plus a terminating sentinel equal
/// to the final object count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupIndex(pub Vec<i64>);

impl GroupIndex {
    /// Number of actual groups (the index has one extra terminating entry).
    pub fn len(&self) -> usize {
        self.0.len().saturating_sub(1)
    }

    /// True if no groups are indexed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The object ordinal at which group `i` starts, and its width
    /// (`group_index[i+1] - group_index[i]`).
    pub fn group_at(&self, i: i64) -> Result<(i64, i64)> {
        if i < 0 || (i as usize) + 1 >= self.0.len() {
            return Err(OneError::index(format!("group index {i} out of range (0..{})", self.len())));
        }
        let start = self.0[i as usize];
        let width = self.0[i as usize + 1] - start;
        Ok((start, width))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_index_bounds() {
        let idx = ObjectIndex(vec![10, 20, 30]);
        assert_eq!(idx.offset_of(1).unwrap(), 20);
        assert!(idx.offset_of(3).is_err());
        assert!(idx.offset_of(-1).is_err());
    }

    #[test]
    fn group_index_width() {
        let idx = GroupIndex(vec![0, 4, 9]);
        assert_eq!(idx.len(), 2);
        assert_eq!(idx.group_at(0).unwrap(), (0, 4));
        assert_eq!(idx.group_at(1).unwrap(), (4, 5));
        assert!(idx.group_at(2).is_err());
    }
}
