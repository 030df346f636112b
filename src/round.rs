//! Round numbers for bags.
//!
//! A [`Round`] is the logical sequence number of one bag on one port. It is not
//! wall-clock time: round `n` is the `n`-th bag an output port has produced, and
//! the `n`-th bag an input port has received. Output ports number their bags
//! themselves starting at [`Round::FIRST`]; input ports learn the round from the
//! `Open` event and check that it follows the previous one.

use std::fmt;

/// Sequence number of a bag on a port.
///
/// Totally ordered, with [`Round::FIRST`] as the minimum. Used to correlate the
/// bags of one iteration across all input ports of an operator.
#[derive(
  Clone, Copy, Debug, Default, Eq, Hash, PartialEq, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct Round(pub u64);

impl Round {
  /// The first round on every port.
  pub const FIRST: Round = Round(0);

  /// Creates a round from a raw value.
  #[inline]
  pub const fn new(n: u64) -> Self {
    Self(n)
  }

  /// Returns the raw u64 value.
  #[inline]
  pub const fn as_u64(self) -> u64 {
    self.0
  }

  /// Returns the round that follows this one.
  #[inline]
  pub const fn next(self) -> Self {
    Self(self.0 + 1)
  }

  /// Returns the round expected after `last`, or [`Round::FIRST`] if no round was seen yet.
  #[inline]
  pub fn following(last: Option<Round>) -> Self {
    last.map_or(Self::FIRST, Round::next)
  }
}

impl fmt::Display for Round {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "r{}", self.0)
  }
}

impl From<u64> for Round {
  fn from(n: u64) -> Self {
    Self(n)
  }
}
