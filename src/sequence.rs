use std::fmt::{Display, Formatter};

/// Position of a frame in its peer's stream. Sequence numbers are a single
/// byte on the wire, so 0 follows after 255.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct SequenceNumber(u8);

impl Display for SequenceNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl SequenceNumber {
    pub const ZERO: SequenceNumber = SequenceNumber(0);

    pub fn from_raw(value: u8) -> Self {
        Self(value)
    }

    pub fn to_raw(&self) -> u8 {
        self.0
    }

    pub fn next(&self) -> SequenceNumber {
        SequenceNumber(self.0.wrapping_add(1))
    }

    /// Serial-number comparison with a half-window of 128: a sequence counts
    /// as ahead of `other` if it is at most 127 increments in front of it,
    /// and behind otherwise.
    pub fn relative_to(&self, other: SequenceNumber) -> SequenceRelation {
        match self.0.wrapping_sub(other.0) {
            0 => SequenceRelation::Equal,
            1..=127 => SequenceRelation::Ahead,
            _ => SequenceRelation::Behind,
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum SequenceRelation {
    Equal,
    Ahead,
    Behind,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use super::*;

    #[rstest]
    #[case::zero(0, 1)]
    #[case::middle(100, 101)]
    #[case::wrap(255, 0)]
    fn test_next(#[case] raw: u8, #[case] expected: u8) {
        assert_eq!(SequenceNumber::from_raw(raw).next(), SequenceNumber::from_raw(expected));
    }

    #[rstest]
    #[case::equal(5, 5, SequenceRelation::Equal)]
    #[case::equal_zero(0, 0, SequenceRelation::Equal)]
    #[case::ahead_by_one(6, 5, SequenceRelation::Ahead)]
    #[case::ahead_max(132, 5, SequenceRelation::Ahead)]
    #[case::ahead_across_wrap(1, 200, SequenceRelation::Ahead)]
    #[case::behind_by_one(4, 5, SequenceRelation::Behind)]
    #[case::behind_min(133, 5, SequenceRelation::Behind)]
    #[case::behind_across_wrap(200, 1, SequenceRelation::Behind)]
    fn test_relative_to(#[case] seq: u8, #[case] other: u8, #[case] expected: SequenceRelation) {
        let actual = SequenceNumber::from_raw(seq).relative_to(SequenceNumber::from_raw(other));
        assert_eq!(actual, expected);
    }
}
