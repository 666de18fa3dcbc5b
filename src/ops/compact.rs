//! Oblivious compaction: dropping invalid rows while revealing only how many remain.

use tracing::{Level, debug, instrument};

use crate::{
    Error,
    channel::Channel,
    config::EngineConfig,
    protocol::Context,
    tags::TagAllocator,
    view::{VALID_COL_NAME, View},
};

use super::{SortKey, sort::sort_tag_stride};

impl View {
    /// Upper bound on the tags consumed by compacting `rows` rows of `cols` columns.
    pub(crate) fn compact_tag_stride(config: &EngineConfig, rows: usize, cols: usize) -> u64 {
        sort_tag_stride(config, rows, &[1], cols)
            + config.bool_to_arith_tag_stride(rows)
            + config.open_tag_stride()
    }

    /// Removes all rows whose validity bit is 0.
    ///
    /// Sorts valid rows to the front, then reveals the number of valid rows (and nothing else)
    /// by summing arithmetic shares of the validity bits, and truncates the view to that count.
    #[instrument(level = Level::DEBUG, skip_all, fields(rows = self.row_num()), err)]
    pub async fn clear_invalid_entries<C: Channel>(
        self,
        ctx: &Context<C>,
        tags: &mut TagAllocator,
    ) -> Result<View, Error> {
        let rows = self.row_num();
        if rows == 0 {
            return Ok(self);
        }
        let mut view = self
            .sort(ctx, tags, &[SortKey::desc(VALID_COL_NAME)])
            .await?;
        let valid = ctx.bool_to_arith(tags, view.valid()).await?;
        let local = valid.iter().fold(0u64, |sum, v| sum.wrapping_add(*v));
        let count = ctx
            .open_arith(tags, &[local])
            .await?
            .first()
            .copied()
            .unwrap_or_default();
        let kept = usize::try_from(count)
            .ok()
            .filter(|kept| *kept <= rows)
            .ok_or(Error::InvalidRevealedCount { count, rows })?;
        view.truncate(kept);
        debug!(rows, kept, "compacted view");
        Ok(view)
    }
}
