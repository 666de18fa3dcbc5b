//! Correlated randomness (Beaver triples) for the secure AND and multiplication rounds.
//!
//! The engine only needs a [`TripleSource`]: for every round tag, both parties must obtain
//! matching halves of `n` triples. [`SeededDealer`] simulates a trusted dealer: both parties
//! hold the same key and derive the triples of a tag deterministically from it, so no
//! preprocessing messages are needed.
//!
//! A party holding the dealer key can compute the other party's triple halves, so this is only
//! suitable for simulation, tests and benchmarks. A deployment plugs in a source backed by
//! oblivious transfer instead.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::{share::Party, tags::Tag};

/// One party's half of a correlated triple.
///
/// For AND triples the halves satisfy `(a0 ^ a1) & (b0 ^ b1) == c0 ^ c1`, for multiplication
/// triples `(a0 + a1) * (b0 + b1) == c0 + c1` (mod 2^64).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Triple {
    /// Share of the first random factor.
    pub a: u64,
    /// Share of the second random factor.
    pub b: u64,
    /// Share of the product.
    pub c: u64,
}

/// A source of correlated randomness, one batch per round tag.
pub trait TripleSource: Send + Sync {
    /// `n` bitwise AND triples (64 independent bit triples each) for the round `tag`.
    fn and_triples(&self, tag: Tag, n: usize) -> Vec<Triple>;

    /// `n` multiplication triples mod 2^64 for the round `tag`.
    fn mul_triples(&self, tag: Tag, n: usize) -> Vec<Triple>;
}

#[derive(Debug, Clone, Copy)]
enum Kind {
    And = 1,
    Mul = 2,
}

/// A simulated trusted dealer, see the [module docs](self).
#[derive(Debug, Clone)]
pub struct SeededDealer {
    party: Party,
    key: [u8; 32],
}

impl SeededDealer {
    /// The dealer handle of `party`, using a key shared by both parties.
    pub fn new(party: Party, key: [u8; 32]) -> Self {
        Self { party, key }
    }

    /// Matching dealer handles for both parties, derived from a seed.
    pub fn pair(seed: u64) -> (Self, Self) {
        let key = *blake3::hash(&seed.to_le_bytes()).as_bytes();
        (Self::new(Party::P0, key), Self::new(Party::P1, key))
    }

    /// Matching dealer handles for both parties, with a fresh random key.
    pub fn random_pair() -> (Self, Self) {
        let key: [u8; 32] = rand::random();
        (Self::new(Party::P0, key), Self::new(Party::P1, key))
    }

    fn rng(&self, kind: Kind, tag: Tag) -> ChaCha20Rng {
        let mut hasher = blake3::Hasher::new_keyed(&self.key);
        hasher.update(&[kind as u8]);
        hasher.update(&tag.to_le_bytes());
        ChaCha20Rng::from_seed(*hasher.finalize().as_bytes())
    }

    fn triples(
        &self,
        kind: Kind,
        tag: Tag,
        n: usize,
        correct: impl Fn([u64; 5]) -> u64,
    ) -> Vec<Triple> {
        let mut rng = self.rng(kind, tag);
        (0..n)
            .map(|_| {
                let r: [u64; 5] = rng.random();
                let [a0, b0, c0, a1, b1] = r;
                match self.party {
                    Party::P0 => Triple {
                        a: a0,
                        b: b0,
                        c: c0,
                    },
                    Party::P1 => Triple {
                        a: a1,
                        b: b1,
                        c: correct(r),
                    },
                }
            })
            .collect()
    }
}

impl TripleSource for SeededDealer {
    fn and_triples(&self, tag: Tag, n: usize) -> Vec<Triple> {
        self.triples(Kind::And, tag, n, |[a0, b0, c0, a1, b1]| {
            ((a0 ^ a1) & (b0 ^ b1)) ^ c0
        })
    }

    fn mul_triples(&self, tag: Tag, n: usize) -> Vec<Triple> {
        self.triples(Kind::Mul, tag, n, |[a0, b0, c0, a1, b1]| {
            a0.wrapping_add(a1)
                .wrapping_mul(b0.wrapping_add(b1))
                .wrapping_sub(c0)
        })
    }
}
