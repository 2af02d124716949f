//! Bitmask over a table's column ordinals.

use std::fmt;

use smallvec::{SmallVec, smallvec};

const WORD: usize = 64;

/// A set of column ordinals for one table.
///
/// `Clone` but not `Copy`. Copies are explicit `.clone()` calls and
/// mutation happens in place through `&mut`.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct FieldSet {
    bits: SmallVec<[u64; 2]>,
    len: usize,
}

impl FieldSet {
    /// An empty set for a table with `len` columns.
    pub fn new(len: usize) -> Self {
        Self {
            bits: smallvec![0; len.div_ceil(WORD)],
            len,
        }
    }

    /// Every column of a table with `len` columns.
    pub fn all(len: usize) -> Self {
        let mut set = Self::new(len);
        for word in set.bits.iter_mut() {
            *word = u64::MAX;
        }
        set.clear_tail();
        set
    }

    /// A set with the given ordinals. Out-of-range ordinals are ignored.
    pub fn from_indices(len: usize, indices: impl IntoIterator<Item = usize>) -> Self {
        let mut set = Self::new(len);
        for index in indices {
            set.insert(index);
        }
        set
    }

    /// Add an ordinal. Returns `true` if it was not already present.
    pub fn insert(&mut self, index: usize) -> bool {
        if index >= self.len {
            return false;
        }
        let (word, mask) = (index / WORD, 1u64 << (index % WORD));
        let added = self.bits[word] & mask == 0;
        self.bits[word] |= mask;
        added
    }

    /// Remove an ordinal. Returns `true` if it was present.
    pub fn remove(&mut self, index: usize) -> bool {
        if index >= self.len {
            return false;
        }
        let (word, mask) = (index / WORD, 1u64 << (index % WORD));
        let present = self.bits[word] & mask != 0;
        self.bits[word] &= !mask;
        present
    }

    /// Check membership.
    pub fn contains(&self, index: usize) -> bool {
        index < self.len && self.bits[index / WORD] & (1u64 << (index % WORD)) != 0
    }

    /// Number of columns the set ranges over.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Number of ordinals in the set.
    pub fn count(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Check if no ordinal is set.
    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|w| *w == 0)
    }

    /// Set ordinals in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).filter(move |i| self.contains(*i))
    }

    /// Ordinals in either set.
    pub fn union(&self, other: &FieldSet) -> FieldSet {
        self.combine(other, |a, b| a | b)
    }

    /// Ordinals in `self` but not in `other`.
    pub fn difference(&self, other: &FieldSet) -> FieldSet {
        self.combine(other, |a, b| a & !b)
    }

    fn combine(&self, other: &FieldSet, op: impl Fn(u64, u64) -> u64) -> FieldSet {
        let mut out = FieldSet::new(self.len.max(other.len));
        for (i, word) in out.bits.iter_mut().enumerate() {
            let a = self.bits.get(i).copied().unwrap_or(0);
            let b = other.bits.get(i).copied().unwrap_or(0);
            *word = op(a, b);
        }
        out.clear_tail();
        out
    }

    fn clear_tail(&mut self) {
        let rem = self.len % WORD;
        if rem != 0 {
            if let Some(last) = self.bits.last_mut() {
                *last &= (1u64 << rem) - 1;
            }
        }
    }
}

impl fmt::Debug for FieldSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl Extend<usize> for FieldSet {
    fn extend<I: IntoIterator<Item = usize>>(&mut self, iter: I) {
        for index in iter {
            self.insert(index);
        }
    }
}
