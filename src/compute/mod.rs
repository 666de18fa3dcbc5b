//! The primitive layer: secure operations on columns of shares.
//!
//! All primitives are semi-honest two-party GMW over 64-bit words. Boolean values are XOR
//! shares ([`Share`]), arithmetic values are additive shares mod 2^64 (`u64`). XOR and NOT are
//! local; every AND (and every multiplication) costs one round with a Beaver triple from the
//! context's [`crate::dealer::TripleSource`].
//!
//! Every primitive is batched: it takes whole columns and splits them into chunks of
//! [`EngineConfig::batch_size`](crate::EngineConfig::batch_size) elements. Each chunk reserves
//! its own tag range, and the chunks run concurrently (at most
//! [`EngineConfig::parallelism`](crate::EngineConfig::parallelism) at once). The number of tags
//! a call consumes is given by the matching `*_tag_stride` method of
//! [`EngineConfig`](crate::EngineConfig) and depends only on the input length and width.

mod arith;
mod boolean;

use std::{future::Future, ops::Range};

use futures::{StreamExt, TryStreamExt, stream};

use crate::{
    Error,
    channel::{Channel, recv_vec_from, send_to},
    protocol::Context,
    share::{Share, mask},
    tags::{Tag, TagAllocator},
};

pub(crate) fn check_len(a: usize, b: usize) -> Result<(), Error> {
    if a == b {
        Ok(())
    } else {
        Err(Error::LengthMismatch(a, b))
    }
}

impl<C: Channel> Context<C> {
    /// Sends this party's words for round `tag` and receives the other party's.
    pub(crate) async fn exchange(
        &self,
        tag: Tag,
        phase: &str,
        mine: &[u64],
    ) -> Result<Vec<u64>, Error> {
        let other = self.party().other().index();
        send_to(self.channel(), other, tag, phase, &mine).await?;
        Ok(recv_vec_from(self.channel(), other, tag, phase, mine.len()).await?)
    }

    /// Splits `0..len` into chunks and runs `job` on each, with a private range of `rounds`
    /// tags per chunk, concatenating the results in order.
    pub(crate) async fn chunked<T, F, Fut>(
        &self,
        tags: &mut TagAllocator,
        len: usize,
        rounds: u64,
        job: F,
    ) -> Result<Vec<T>, Error>
    where
        F: Fn(Range<usize>, TagAllocator) -> Fut,
        Fut: Future<Output = Result<Vec<T>, Error>>,
    {
        let batch = self.config().batch_size.max(1);
        let mut jobs = Vec::with_capacity(len.div_ceil(batch));
        for start in (0..len).step_by(batch) {
            let end = (start + batch).min(len);
            jobs.push(job(start..end, tags.reserve(rounds)?));
        }
        let parts: Vec<Vec<T>> = stream::iter(jobs)
            .buffered(self.config().parallelism.max(1))
            .try_collect()
            .await?;
        Ok(parts.into_iter().flatten().collect())
    }

    /// Reveals boolean shares of `width`-bit values to both parties.
    pub async fn open(
        &self,
        tags: &mut TagAllocator,
        x: &[Share],
        width: u32,
    ) -> Result<Vec<u64>, Error> {
        if x.is_empty() {
            return Ok(vec![]);
        }
        let tag = tags.next_tag()?;
        let mine: Vec<u64> = x.iter().map(|s| s.0).collect();
        let theirs = self.exchange(tag, "open", &mine).await?;
        Ok(mine
            .iter()
            .zip(&theirs)
            .map(|(a, b)| (a ^ b) & mask(width))
            .collect())
    }

    /// Reveals arithmetic shares to both parties.
    pub async fn open_arith(&self, tags: &mut TagAllocator, x: &[u64]) -> Result<Vec<u64>, Error> {
        if x.is_empty() {
            return Ok(vec![]);
        }
        let tag = tags.next_tag()?;
        let theirs = self.exchange(tag, "open arithmetic", x).await?;
        Ok(x.iter()
            .zip(&theirs)
            .map(|(a, b)| a.wrapping_add(*b))
            .collect())
    }
}
