//! The node identifier space.
//!
//! A [`Guid`] is an unsigned integer in `[0, 2^B)` where `B` is the hash
//! width the overlay was built with (160 bits by default, to match
//! Chord-style overlays). All width-dependent operations go through a
//! [`GuidSpace`] carried explicitly in configuration; there is no global
//! width state.

use num_bigint::{BigUint, RandBigInt};
use num_traits::{Num, One, Zero};
use rand::rngs::SmallRng;

use crate::error::{CoreError, Result};

/// A point in the identifier space.
///
/// Ordering and equality follow the numeric value. The width is a property
/// of the [`GuidSpace`], not of the value, so fixed-width byte conversion
/// lives on the space.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Guid(BigUint);

impl Guid {
    /// Zero, the lowest identifier.
    #[must_use]
    pub fn zero() -> Self {
        Self(BigUint::zero())
    }

    /// Builds a GUID from a small integer, mostly for tests and offsets.
    #[must_use]
    pub fn from_u64(value: u64) -> Self {
        Self(BigUint::from(value))
    }

    /// Parses the decimal-string wire form.
    ///
    /// Returns `None` for anything that is not a base-10 unsigned integer.
    #[must_use]
    pub fn from_dec_str(text: &str) -> Option<Self> {
        BigUint::from_str_radix(text, 10).ok().map(Self)
    }

    /// Interprets big-endian bytes as an identifier.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(BigUint::from_bytes_be(bytes))
    }

    /// Returns a copy shifted up by `offset`.
    #[must_use]
    pub fn add_offset(&self, offset: &BigUint) -> Self {
        Self(&self.0 + offset)
    }

    /// The first digits of the decimal form, for compact log lines.
    #[must_use]
    pub fn short(&self) -> String {
        let full = self.0.to_string();
        full.chars().take(12).collect()
    }

    pub(crate) fn value(&self) -> &BigUint {
        &self.0
    }

    pub(crate) fn from_value(value: BigUint) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for Guid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Debug for Guid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Guid({})", self.short())
    }
}

/// The identifier space: everything that depends on the hash width.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GuidSpace {
    bits: u32,
}

impl GuidSpace {
    /// Creates a space of `bits` width.
    ///
    /// The width must be a multiple of 8 (identifiers travel as whole bytes)
    /// and at least 64 bits.
    pub fn new(bits: u32) -> Result<Self> {
        if bits < 64 || bits % 8 != 0 {
            return Err(CoreError::InvalidGuidSize(bits));
        }
        Ok(Self { bits })
    }

    /// Width in bits.
    #[must_use]
    pub const fn size_bits(&self) -> u32 {
        self.bits
    }

    /// Width in bytes.
    #[must_use]
    pub const fn size_bytes(&self) -> usize {
        (self.bits / 8) as usize
    }

    /// `2^bits`, one past the highest identifier.
    #[must_use]
    pub fn upper_bound(&self) -> BigUint {
        BigUint::one() << self.bits
    }

    /// The highest identifier in the space.
    #[must_use]
    pub fn maximum(&self) -> Guid {
        Guid(self.upper_bound() - BigUint::one())
    }

    /// Uniformly random identifier in `[0, 2^bits)`.
    #[must_use]
    pub fn random(&self, rng: &mut SmallRng) -> Guid {
        Guid(rng.gen_biguint_below(&self.upper_bound()))
    }

    /// Uniformly random identifier in `[lo, hi)`.
    ///
    /// `lo` must be strictly below `hi`; both must fit the space.
    #[must_use]
    pub fn random_between(&self, rng: &mut SmallRng, lo: &Guid, hi: &Guid) -> Guid {
        Guid(rng.gen_biguint_range(&lo.0, &hi.0))
    }

    /// Fixed-width big-endian byte form, zero-padded on the left.
    #[must_use]
    pub fn to_bytes(&self, guid: &Guid) -> Vec<u8> {
        let raw = guid.0.to_bytes_be();
        let width = self.size_bytes();
        let mut out = vec![0u8; width];
        let start = width.saturating_sub(raw.len());
        out[start..].copy_from_slice(&raw[raw.len().saturating_sub(width)..]);
        out
    }
}

impl Default for GuidSpace {
    /// The 160-bit default used by the Chord overlay.
    fn default() -> Self {
        Self { bits: 160 }
    }
}
