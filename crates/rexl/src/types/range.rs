//! Inclusive integer ranges produced by the `..` operator.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A lazy, restartable sequence of integers inclusive on both ends.
///
/// `(2..5)` iterates `2, 3, 4, 5`; `(5..2)` iterates `5, 4, 3, 2`. Two ranges
/// with the same bounds are equal and hash identically; no element storage is
/// ever allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntRange {
    pub from: i64,
    pub to: i64,
}

impl IntRange {
    #[must_use]
    pub fn new(from: i64, to: i64) -> Self {
        Self { from, to }
    }

    /// `end - start + 1` on the iteration axis, so `(a..a)` has size 1.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.from.abs_diff(self.to) + 1
    }

    #[must_use]
    pub fn contains(&self, v: i64) -> bool {
        let (lo, hi) = if self.from <= self.to {
            (self.from, self.to)
        } else {
            (self.to, self.from)
        };
        lo <= v && v <= hi
    }

    /// A fresh iterator; the range itself is never consumed.
    #[must_use]
    pub fn iter(&self) -> IntRangeIter {
        IntRangeIter {
            next: Some(self.from),
            to: self.to,
            descending: self.from > self.to,
        }
    }
}

impl fmt::Display for IntRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}..{})", self.from, self.to)
    }
}

impl IntoIterator for &IntRange {
    type Item = i64;
    type IntoIter = IntRangeIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iteration state for one pass over an [`IntRange`].
#[derive(Debug, Clone)]
pub struct IntRangeIter {
    next: Option<i64>,
    to: i64,
    descending: bool,
}

impl Iterator for IntRangeIter {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        let current = self.next?;
        self.next = if current == self.to {
            None
        } else if self.descending {
            current.checked_sub(1)
        } else {
            current.checked_add(1)
        };
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = match self.next {
            Some(next) => (next.abs_diff(self.to) + 1) as usize,
            None => 0,
        };
        (remaining, Some(remaining))
    }
}
