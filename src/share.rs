//! Secret shares and the two parties holding them.

use std::ops::{BitXor, BitXorAssign};

use rand::Rng;
use serde::{Deserialize, Serialize};

/// One party's half of an XOR sharing of a value of at most 64 bits.
///
/// Only the low `width` bits of a share are meaningful, where `width` is the width of the column
/// the share belongs to. Bits above the width are ignored by every primitive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Share(pub u64);

impl BitXor for Share {
    type Output = Self;

    fn bitxor(self, rhs: Self) -> Self::Output {
        Share(self.0 ^ rhs.0)
    }
}

impl BitXorAssign for Share {
    fn bitxor_assign(&mut self, rhs: Self) {
        self.0 ^= rhs.0;
    }
}

impl Share {
    /// Clears all bits at or above `width`.
    pub fn masked(self, width: u32) -> Share {
        Share(self.0 & mask(width))
    }

    /// The share of bit `i` of the shared value, as a 1-bit share.
    pub fn bit(self, i: u32) -> Share {
        Share((self.0 >> i) & 1)
    }

    /// Expands a 1-bit share into a share of all-zeros or all-ones.
    pub(crate) fn spread(self) -> Share {
        Share(0u64.wrapping_sub(self.0 & 1))
    }
}

/// All-ones in the low `width` bits.
pub fn mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1 << width) - 1
    }
}

/// Splits a plaintext value of the given width into two random shares.
pub fn split(value: u64, width: u32, rng: &mut impl Rng) -> (Share, Share) {
    let r = rng.random::<u64>() & mask(width);
    (Share(r), Share((value ^ r) & mask(width)))
}

/// Reconstructs a plaintext value of the given width from both shares.
pub fn combine(a: Share, b: Share, width: u32) -> u64 {
    (a.0 ^ b.0) & mask(width)
}

/// One of the two computing parties.
///
/// `P0` is the party that applies public constants: a constant `c` is shared as `c` held by `P0`
/// and `0` held by `P1`, so that NOT and XOR with a constant are local operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Party {
    /// The first party.
    P0,
    /// The second party.
    P1,
}

impl Party {
    /// The index of the party, as used by the [`crate::channel::Channel`].
    pub fn index(self) -> usize {
        match self {
            Party::P0 => 0,
            Party::P1 => 1,
        }
    }

    /// The party with the given index, if there is one.
    pub fn from_index(i: usize) -> Option<Party> {
        match i {
            0 => Some(Party::P0),
            1 => Some(Party::P1),
            _ => None,
        }
    }

    /// The other party.
    pub fn other(self) -> Party {
        match self {
            Party::P0 => Party::P1,
            Party::P1 => Party::P0,
        }
    }

    /// This party's share of the public constant `value`.
    pub fn constant(self, value: u64) -> Share {
        match self {
            Party::P0 => Share(value),
            Party::P1 => Share(0),
        }
    }

    /// This party's share of the public arithmetic constant `value`.
    pub(crate) fn arith_constant(self, value: u64) -> u64 {
        self.constant(value).0
    }

    /// Negates a 1-bit share locally.
    pub fn not(self, bit: Share) -> Share {
        bit ^ self.constant(1)
    }
}
