use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use bson::{doc, Bson, Document};

use crate::CoordUInt;

/// An inclusive range of values of a numeric document field: `lower <= value <= upper`.
///
/// A range with `lower > upper` is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyRange {
    pub lower: i64,
    pub upper: i64,
}

/// The slice of a [`KeyRange`] read by one replica.
///
/// The slice starts at `lower` (inclusive) and ends at `upper`, which is inclusive only for the
/// last slice of the range. Consecutive slices share the boundary so that fractional values
/// between two integers are read exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeySplit {
    pub lower: i64,
    pub upper: i64,
    pub upper_inclusive: bool,
}

impl KeyRange {
    pub fn new(lower: i64, upper: i64) -> Self {
        Self { lower, upper }
    }

    pub fn is_empty(&self) -> bool {
        self.lower > self.upper
    }

    /// Number of integer values inside the range.
    pub fn len(&self) -> u128 {
        if self.is_empty() {
            0
        } else {
            (self.upper as i128 - self.lower as i128 + 1) as u128
        }
    }

    /// The slice of the range assigned to replica `index` out of `peers`.
    ///
    /// The range is divided in `peers` contiguous slices of the same width (the last may be
    /// shorter). Replicas past the end of the range get `None`.
    pub fn split(&self, index: CoordUInt, peers: CoordUInt) -> Option<KeySplit> {
        if self.is_empty() || index >= peers {
            return None;
        }
        let n = self.len() as i128;
        let peers = peers as i128;
        let chunk_size = (n + peers - 1) / peers;
        let start = self.lower as i128 + index as i128 * chunk_size;
        if start > self.upper as i128 {
            return None;
        }
        let end = start + chunk_size;
        // start and end are inside [lower, upper] here, the casts are lossless
        if end > self.upper as i128 {
            Some(KeySplit {
                lower: start as i64,
                upper: self.upper,
                upper_inclusive: true,
            })
        } else {
            Some(KeySplit {
                lower: start as i64,
                upper: end as i64,
                upper_inclusive: false,
            })
        }
    }

    /// All the non-empty slices of the range for `peers` replicas.
    pub fn splits(&self, peers: CoordUInt) -> Vec<KeySplit> {
        (0..peers).filter_map(|i| self.split(i, peers)).collect()
    }

    pub fn contains(&self, value: &Bson) -> bool {
        !self.is_empty()
            && KeySplit {
                lower: self.lower,
                upper: self.upper,
                upper_inclusive: true,
            }
            .contains(value)
    }
}

impl From<std::ops::RangeInclusive<i64>> for KeyRange {
    fn from(range: std::ops::RangeInclusive<i64>) -> Self {
        Self::new(*range.start(), *range.end())
    }
}

impl Display for KeyRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.lower, self.upper)
    }
}

impl KeySplit {
    /// Whether a value of the key field falls inside this slice.
    ///
    /// Only numeric values are considered: documents with a value of another type never match.
    pub fn contains(&self, value: &Bson) -> bool {
        self.above_lower(value) && self.below_upper(value)
    }

    /// Whether a document whose key resolves to `values` is selected by [`KeySplit::filter`].
    ///
    /// A key that resolves to many values (an array, or a path through an array of documents)
    /// matches when some value satisfies the lower bound and some value, possibly another one,
    /// satisfies the upper bound.
    pub fn matches(&self, values: &[&Bson]) -> bool {
        values.iter().any(|v| self.above_lower(v)) && values.iter().any(|v| self.below_upper(v))
    }

    fn above_lower(&self, value: &Bson) -> bool {
        match value {
            Bson::Int32(v) => *v as i64 >= self.lower,
            Bson::Int64(v) => *v >= self.lower,
            // false for NaN
            Bson::Double(v) => *v >= self.lower as f64,
            _ => false,
        }
    }

    fn below_upper(&self, value: &Bson) -> bool {
        match (as_int(value), value) {
            (Some(v), _) if self.upper_inclusive => v <= self.upper,
            (Some(v), _) => v < self.upper,
            (None, Bson::Double(v)) if self.upper_inclusive => *v <= self.upper as f64,
            (None, Bson::Double(v)) => *v < self.upper as f64,
            _ => false,
        }
    }

    /// The query filter selecting the documents of this slice.
    pub fn filter(&self, key: &str) -> Document {
        let upper_op = if self.upper_inclusive { "$lte" } else { "$lt" };
        doc! {
            key: {
                "$gte": self.lower,
                upper_op: self.upper,
            }
        }
    }
}

impl Display for KeySplit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let close = if self.upper_inclusive { ']' } else { ')' };
        write!(f, "[{}, {}{}", self.lower, self.upper, close)
    }
}

/// Total order of the numeric values of a key, used to sort the documents of a slice.
///
/// Non numeric values are never compared since they are filtered out before sorting.
pub(crate) fn compare_keys(a: &Bson, b: &Bson) -> Ordering {
    match (as_int(a), as_int(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        _ => as_float(a)
            .partial_cmp(&as_float(b))
            .unwrap_or(Ordering::Equal),
    }
}

fn as_int(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(v) => Some(*v as i64),
        Bson::Int64(v) => Some(*v),
        _ => None,
    }
}

fn as_float(value: &Bson) -> f64 {
    match value {
        Bson::Int32(v) => *v as f64,
        Bson::Int64(v) => *v as f64,
        Bson::Double(v) => *v,
        _ => f64::NAN,
    }
}
