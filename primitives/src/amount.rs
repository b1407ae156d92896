use {
  serde::{Deserialize, Serialize},
  std::{
    fmt::{Debug, Display},
    ops::Add,
    str::FromStr,
  },
  thiserror::Error,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
  #[error("Empty amount")]
  Empty,

  #[error("Invalid character {0:?} in amount")]
  InvalidCharacter(char),

  #[error("Amount has more than {} fractional digits", Amount::DECIMALS)]
  TooPrecise,

  #[error("Amount does not fit in 128 bits")]
  Overflow,
}

/// A fixed-point token amount.
///
/// On-chain balances are integers expressed in the smallest unit of the
/// token, with 18 decimal places per whole currency unit. This type keeps
/// the raw integer and converts from and to human-readable decimal strings,
/// so that `"12.5"` is `12_500_000_000_000_000_000` base units.
#[derive(
  Copy,
  Clone,
  Default,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
)]
pub struct Amount(u128);

impl Amount {
  pub const DECIMALS: u32 = 18;
  pub const ZERO: Amount = Amount(0);

  const SCALE: u128 = 10u128.pow(Self::DECIMALS);

  pub const fn from_base_units(units: u128) -> Self {
    Self(units)
  }

  pub const fn base_units(&self) -> u128 {
    self.0
  }

  /// Whole currency units, for example `Amount::from_units(100)` is
  /// one hundred dollars of a stable token.
  pub fn from_units(units: u64) -> Self {
    Self(units as u128 * Self::SCALE)
  }

  pub fn is_zero(&self) -> bool {
    self.0 == 0
  }

  /// Lossy conversion to floating point currency units.
  pub fn as_f64(&self) -> f64 {
    self.0 as f64 / Self::SCALE as f64
  }

  /// `self / other` as a floating point ratio, or None when dividing
  /// by zero. The ratio is not clamped, so it may exceed 1.0.
  pub fn ratio(&self, other: Amount) -> Option<f64> {
    if other.is_zero() {
      return None;
    }
    Some(self.0 as f64 / other.0 as f64)
  }

  pub fn checked_add(self, other: Amount) -> Option<Amount> {
    self.0.checked_add(other.0).map(Amount)
  }
}

impl Add for Amount {
  type Output = Amount;

  fn add(self, rhs: Self) -> Self::Output {
    Amount(self.0.saturating_add(rhs.0))
  }
}

impl Display for Amount {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let whole = self.0 / Self::SCALE;
    let fraction = self.0 % Self::SCALE;
    if fraction == 0 {
      return write!(f, "{whole}");
    }

    let digits = format!("{fraction:018}");
    write!(f, "{whole}.{}", digits.trim_end_matches('0'))
  }
}

impl Debug for Amount {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "amount({self})")
  }
}

impl FromStr for Amount {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let s = s.trim();
    if s.is_empty() || s == "." {
      return Err(Error::Empty);
    }

    let (whole, fraction) = match s.split_once('.') {
      Some((whole, fraction)) => (whole, fraction),
      None => (s, ""),
    };

    if fraction.len() > Self::DECIMALS as usize {
      return Err(Error::TooPrecise);
    }

    let mut units: u128 = 0;
    for c in whole.chars().chain(fraction.chars()) {
      let digit = c.to_digit(10).ok_or(Error::InvalidCharacter(c))?;
      units = units
        .checked_mul(10)
        .and_then(|u| u.checked_add(digit as u128))
        .ok_or(Error::Overflow)?;
    }

    let padding = Self::DECIMALS - fraction.len() as u32;
    units
      .checked_mul(10u128.pow(padding))
      .map(Amount)
      .ok_or(Error::Overflow)
  }
}
