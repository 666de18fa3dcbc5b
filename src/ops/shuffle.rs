//! Oblivious routing of rows into buckets by a secret bucket tag.

use futures::future::try_join_all;
use tracing::{Level, debug, instrument};

use crate::{
    Error, channel::Channel, config::EngineConfig, protocol::Context, share::Share,
    tags::TagAllocator, view::View,
};

impl View {
    /// Upper bound on the tags consumed by [`View::butterfly`] on this view.
    pub(crate) fn butterfly_tag_stride(&self, config: &EngineConfig) -> u64 {
        let (rows, cols) = (self.row_num(), self.col_num());
        let per_layer = config.select_tag_stride(rows * (cols - 1))
            + config.bucket_count() as u64 * View::compact_tag_stride(config, rows, cols);
        u64::from(config.bucket_bits) * per_layer
    }

    /// Routes every valid row into one of `2^bucket_bits` buckets, by the low bits of the
    /// bucket tag in column `tag_col`.
    ///
    /// Layer `l` merges the buckets `2^l` apart. Every row of a merged pair is selected into
    /// both buckets of the pair, and bit `bucket_bits - l - 1` of its tag decides in which one
    /// it stays valid. Each bucket is compacted after every layer, which reveals its size.
    /// Rows with equal tags always end up in the same bucket.
    #[instrument(level = Level::DEBUG, skip_all, fields(rows = self.row_num()), err)]
    pub(crate) async fn butterfly<C: Channel>(
        self,
        ctx: &Context<C>,
        tags: &mut TagAllocator,
        tag_col: usize,
    ) -> Result<Vec<View>, Error> {
        let config = ctx.config();
        let bits = config.bucket_bits;
        let count = config.bucket_count();
        let (rows, cols) = (self.row_num(), self.col_num());
        let padding = self.padding_index();
        let routed: Vec<usize> = (0..cols).filter(|c| *c != padding).collect();
        let widths: Vec<u32> = self.fields().iter().map(|f| f.width).collect();

        let mut buckets = vec![self.empty_like(); count];
        buckets[0] = self;
        for layer in 0..bits {
            let stride = 1usize << layer;
            let bit = bits - layer - 1;
            let pairs: Vec<(usize, usize)> = (0..count)
                .step_by(2 * stride)
                .flat_map(|base| (base..base + stride).map(move |lo| (lo, lo + stride)))
                .collect();

            let mut cond = vec![];
            let mut values = vec![];
            for &(lo, hi) in &pairs {
                for &c in &routed {
                    for b in [lo, hi] {
                        let bucket_tags = buckets[b].col(tag_col);
                        cond.extend(bucket_tags.iter().map(|t| t.bit(bit)));
                        values.extend_from_slice(buckets[b].col(c));
                    }
                }
            }
            let zeros = vec![Share(0); values.len()];
            let stay = ctx.select(tags, &cond, &zeros, &values).await?;

            let mut next: Vec<View> = buckets.iter().map(View::empty_like).collect();
            let mut offset = 0;
            for &(lo, hi) in &pairs {
                let n = buckets[lo].row_num() + buckets[hi].row_num();
                let mut kept = vec![vec![Share(0); n]; cols];
                let mut moved = kept.clone();
                for &c in &routed {
                    for r in 0..n {
                        let (v, s) = (values[offset + r], stay[offset + r]);
                        kept[c][r] = s.masked(widths[c]);
                        moved[c][r] = (v ^ s).masked(widths[c]);
                    }
                    offset += n;
                }
                next[lo] = buckets[lo].with_columns(kept);
                next[hi] = buckets[hi].with_columns(moved);
            }

            let compact_stride = View::compact_tag_stride(config, rows, cols);
            let ranges = tags.split(count, compact_stride)?;
            buckets = try_join_all(next.into_iter().zip(ranges).map(
                |(bucket, mut tags)| async move { bucket.clear_invalid_entries(ctx, &mut tags).await },
            ))
            .await?;
        }
        let sizes: Vec<usize> = buckets.iter().map(View::row_num).collect();
        debug!(?sizes, "routed rows into buckets");
        Ok(buckets)
    }
}
