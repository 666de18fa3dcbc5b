//! Message tags and the allocator that hands them out.
//!
//! Every round of a primitive call exchanges exactly one message per party, identified by a
//! [`Tag`]. Both parties must agree on the tag of every round, and two calls that might run at
//! the same time must never share one. The [`TagAllocator`] makes this explicit:
//!
//! - serial composition passes `&mut TagAllocator` from one call to the next, each call taking
//!   the tags it needs;
//! - parallel composition first [`reserve`](TagAllocator::reserve)s one bounded range per branch,
//!   sized by the branch's tag stride, and hands each branch its own allocator.
//!
//! An allocator is not `Clone`, so a range can only be consumed once. Asking a bounded range for
//! more tags than it holds is an error instead of a silent collision.
//!
//! Tags also seed the correlated randomness of each round (see [`crate::dealer`]), so they must
//! be unique over the whole lifetime of a dealer, not only among concurrent calls.

use crate::Error;

/// Identifies the messages of one round of one primitive call.
pub type Tag = u64;

/// Hands out unique tags from a half-open range `next..end`.
#[derive(Debug, PartialEq, Eq)]
pub struct TagAllocator {
    next: Tag,
    end: Tag,
}

impl Default for TagAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl TagAllocator {
    /// An allocator covering the whole tag space.
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// An allocator covering all tags from `base` upwards.
    ///
    /// Queries that share a dealer should start from disjoint bases.
    pub fn starting_at(base: Tag) -> Self {
        Self {
            next: base,
            end: Tag::MAX,
        }
    }

    /// The next tag that would be handed out.
    pub fn peek(&self) -> Tag {
        self.next
    }

    /// Number of tags left in this range.
    pub fn remaining(&self) -> u64 {
        self.end - self.next
    }

    /// Carves the next `stride` tags out of this range as a separate allocator.
    pub fn reserve(&mut self, stride: u64) -> Result<TagAllocator, Error> {
        let available = self.remaining();
        if stride > available {
            return Err(Error::TagsExhausted {
                requested: stride,
                available,
            });
        }
        let sub = TagAllocator {
            next: self.next,
            end: self.next + stride,
        };
        self.next += stride;
        Ok(sub)
    }

    /// Reserves `parts` consecutive sibling ranges of `stride` tags each.
    pub fn split(&mut self, parts: usize, stride: u64) -> Result<Vec<TagAllocator>, Error> {
        (0..parts).map(|_| self.reserve(stride)).collect()
    }

    /// Takes a single tag.
    pub fn next_tag(&mut self) -> Result<Tag, Error> {
        Ok(self.reserve(1)?.next)
    }
}
