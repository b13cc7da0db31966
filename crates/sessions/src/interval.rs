//! Closed integer intervals and a self-coalescing interval collection.

use crate::error::{Result, SessionError};

/// A closed range `[begin, end]` of byte positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    begin: u64,
    end: u64,
}

impl Interval {
    /// Create an interval, failing if `begin` is past `end`.
    pub fn new(begin: u64, end: u64) -> Result<Self> {
        if begin > end {
            return Err(SessionError::InvalidInterval { begin, end });
        }
        Ok(Self { begin, end })
    }

    pub fn begin(&self) -> u64 {
        self.begin
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    /// Whether the two intervals share no point. Symmetric.
    pub fn is_disjoint(&self, other: &Interval) -> bool {
        self.end < other.begin || other.end < self.begin
    }

    /// Smallest interval covering both `self` and `other`.
    ///
    /// Only meaningful when the two are not disjoint; callers must check
    /// [`Interval::is_disjoint`] first.
    pub fn merge(&self, other: &Interval) -> Interval {
        Interval {
            begin: self.begin.min(other.begin),
            end: self.end.max(other.end),
        }
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{};{}]", self.begin, self.end)
    }
}

/// An unordered collection of intervals that coalesces overlapping or
/// touching members on every insert.
///
/// Disjoint members stay separate; a blob download is only complete once
/// the set has collapsed to a single interval spanning the whole payload.
#[derive(Debug, Clone, Default)]
pub struct IntervalSet {
    intervals: Vec<Interval>,
}

impl IntervalSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an interval, folding every overlapping member into it.
    ///
    /// One left-to-right pass: disjoint members are kept, overlapping ones
    /// are merged into a running accumulator that is appended at the end.
    /// Because the accumulator only grows, chains of mutually-overlapping
    /// members are merged transitively regardless of storage order.
    pub fn add(&mut self, interval: Interval) {
        let mut kept = Vec::with_capacity(self.intervals.len() + 1);
        let mut acc = interval;
        for current in self.intervals.drain(..) {
            if current.is_disjoint(&acc) {
                kept.push(current);
            } else {
                acc = acc.merge(&current);
            }
        }
        kept.push(acc);
        self.intervals = kept;
    }

    /// Drop every interval.
    pub fn clear(&mut self) {
        self.intervals.clear();
    }

    pub fn as_slice(&self) -> &[Interval] {
        &self.intervals
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }
}
